use std::time::Duration;

use crate::error::Result;
use crate::types::{CommandOutput, Invocation};

pub mod process;

pub use process::ProcessTransport;

/// Transport trait for the local process boundary.
///
/// This trait abstracts how external tools are discovered and run, allowing us to:
/// - Shell out to the real `which`, `sshpass` and `ssh`
/// - Script every outcome (missing tool, timeout, exit codes) in tests
pub trait Transport {
    /// Check whether a tool is installed locally.
    fn tool_exists(&self, tool: &str) -> bool;

    /// Run with inherited stdio and no timeout, returning the exit code.
    fn run_interactive(&self, invocation: &Invocation) -> Result<i32>;

    /// Run with captured output. When `timeout` elapses the child is killed
    /// and [`Error::Timeout`](crate::Error::Timeout) is returned.
    fn run_captured(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn tool_exists(&self, tool: &str) -> bool {
        (**self).tool_exists(tool)
    }

    fn run_interactive(&self, invocation: &Invocation) -> Result<i32> {
        (**self).run_interactive(invocation)
    }

    fn run_captured(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        (**self).run_captured(invocation, timeout)
    }
}
