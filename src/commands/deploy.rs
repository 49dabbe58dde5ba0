use anyhow::Result;
use colored::Colorize;
use indicatif::ProgressBar;
use sshkit::command::{forwarded_invocation, key_invocation};
use sshkit::{
    AttemptKind, AttemptObserver, Completion, DeployPlan, Error, HostKeyPolicy, ProcessTransport,
    Sequencer,
};

use crate::Context;
use crate::cli::DeployArgs;
use crate::commands::load_plan;
use crate::progress;
use crate::ui;

const TOTAL_STEPS: usize = 3;

/// Run the deployment and return the process exit code.
pub fn run(ctx: &Context, args: DeployArgs) -> Result<i32> {
    let plan = load_plan(ctx, &args.target)?;

    if !ctx.quiet {
        print_summary(&plan);
    }

    if args.dry_run {
        dry_run(&plan);
        return Ok(0);
    }

    let mut observer = TerminalObserver::new(&plan, ctx.quiet, ctx.verbose);
    let completion = Sequencer::new(ProcessTransport::new(), &plan).run(&mut observer);

    match &completion {
        Completion::Deployed {
            attempt,
            exit_code,
            output,
        } => {
            match outcome_line(ctx.quiet, *attempt, *exit_code) {
                Some(Ok(line)) => ui::success(&line),
                Some(Err(line)) => ui::error(&line),
                None => {}
            }
            if let Some(output) = output {
                print!("{output}");
            }
        }
        Completion::Manual(manual) => {
            if !ctx.quiet {
                ui::header("Automated deployment not available");
                ui::dim("Neither sshpass nor an SSH key could complete the deployment.");
                ui::dim("Follow these steps to deploy by hand:");
                println!();
            }
            print!("{manual}");
        }
    }

    log::info!(
        "Run ended with {} (exit {})",
        completion.attempt(),
        completion.exit_code()
    );
    Ok(completion.exit_code())
}

/// Status line for a finished automated attempt, `Err` when it failed.
/// Quiet runs print only the remote output.
fn outcome_line(
    quiet: bool,
    attempt: AttemptKind,
    exit_code: i32,
) -> Option<std::result::Result<String, String>> {
    if quiet {
        None
    } else if exit_code == 0 {
        Some(Ok(format!("Deployment finished via {attempt}")))
    } else {
        Some(Err(format!(
            "{attempt} deployment exited with status {exit_code}"
        )))
    }
}

fn print_summary(plan: &DeployPlan) {
    ui::banner();
    println!();
    ui::info(&format!("Connecting to {}", plan.endpoint.host));
    ui::kv("User", &plan.endpoint.user);
    if plan.endpoint.has_custom_port() {
        ui::kv("Port", &plan.endpoint.port.to_string());
    }
    ui::kv("Script", plan.script.as_str());
    ui::kv("Host keys", plan.host_keys.as_str());
    println!();

    if plan.host_keys == HostKeyPolicy::AcceptAny {
        ui::warn("Host key verification is disabled (use --strict-host-keys to enable)");
    }
    if plan.script.is_insecure() {
        ui::warn("Script is fetched over plain HTTP");
    }
    ui::dim("Requires sshpass or a configured SSH key");
}

fn dry_run(plan: &DeployPlan) {
    ui::header("Dry run");

    ui::step(1, TOTAL_STEPS, "Password authentication");
    match forwarded_invocation(plan) {
        Ok(invocation) => {
            ui::dim(&format!("if `{}` is installed:", plan.helper));
            ui::dim(&invocation.to_string());
            ui::dim(&format!(
                "on failure: {}",
                plan.forwarded_exit.as_str()
            ));
        }
        Err(e) => ui::dim(&format!("skipped: {e}")),
    }

    ui::step(2, TOTAL_STEPS, "SSH key authentication");
    ui::dim(&key_invocation(plan).to_string());
    ui::dim(&format!("timeout: {}s", plan.key_timeout.as_secs()));

    ui::step(3, TOTAL_STEPS, "Manual instructions");
    println!();
    let manual = Sequencer::new(ProcessTransport::new(), plan).manual_instructions();
    print!("{manual}");
}

/// Prints one line per attempt and spins while the key-based attempt waits.
struct TerminalObserver<'a> {
    plan: &'a DeployPlan,
    quiet: bool,
    verbose: u8,
    spinner: Option<ProgressBar>,
}

impl<'a> TerminalObserver<'a> {
    fn new(plan: &'a DeployPlan, quiet: bool, verbose: u8) -> Self {
        Self {
            plan,
            quiet,
            verbose,
            spinner: None,
        }
    }

    fn stop_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            progress::finish_clear(&pb);
        }
    }

    fn step_number(attempt: AttemptKind) -> usize {
        match attempt {
            AttemptKind::ForwardedCredential => 1,
            AttemptKind::KeyBased => 2,
            AttemptKind::Manual => 3,
        }
    }
}

impl AttemptObserver for TerminalObserver<'_> {
    fn attempt_started(&mut self, attempt: AttemptKind) {
        if self.quiet {
            return;
        }
        println!();
        ui::step(
            Self::step_number(attempt),
            TOTAL_STEPS,
            &format!("Trying {attempt}..."),
        );

        match attempt {
            AttemptKind::ForwardedCredential => {
                if let Ok(invocation) = forwarded_invocation(self.plan) {
                    ui::dim(&invocation.to_string());
                }
            }
            AttemptKind::KeyBased => {
                self.spinner = Some(progress::spinner(&format!(
                    "Waiting up to {}s for {}",
                    self.plan.key_timeout.as_secs(),
                    self.plan.endpoint.destination()
                )));
            }
            AttemptKind::Manual => {}
        }
    }

    fn attempt_failed(&mut self, attempt: AttemptKind, error: &Error) {
        self.stop_spinner();
        if self.quiet {
            return;
        }
        let kind = error.kind();
        println!(
            "{} {} {}",
            "✗".red(),
            format!("{attempt}:").bold(),
            error
        );
        if self.verbose > 0 {
            ui::dim(&format!("{}: {}", kind.description(), kind.advice()));
        }
    }

    fn attempt_succeeded(&mut self, _attempt: AttemptKind) {
        self.stop_spinner();
    }
}
