//! Progress indicators for the rdeploy CLI.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Start a spinner with a message. Drawn on stderr and hidden when it is not a terminal.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Remove the spinner line.
pub fn finish_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}
