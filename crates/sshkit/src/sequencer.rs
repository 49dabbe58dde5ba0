//! Deployment attempt sequencer.
//!
//! Runs the three procedures strictly in order:
//!
//! 1. Forwarded-credential execution (`sshpass` + `ssh`, no timeout)
//! 2. Key-based execution (`ssh` with password auth disabled, bounded wait)
//! 3. Manual instructions (cannot fail)
//!
//! Each failure is caught where it happens, reported to the observer and
//! turned into "try the next one". The first terminal path is returned as a
//! [`Completion`]; nothing runs after it.

use crate::backend::Transport;
use crate::command::{forwarded_invocation, key_invocation, remote_command};
use crate::error::{Error, Result};
use crate::instructions::ManualInstructions;
use crate::types::{AttemptKind, DeployPlan, ForwardedExitPolicy};

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// An automated attempt finished the run
    Deployed {
        attempt: AttemptKind,
        exit_code: i32,
        /// Captured remote output (key-based only; forwarded runs inherit stdio)
        output: Option<String>,
    },
    /// Both automated attempts fell through
    Manual(ManualInstructions),
}

impl Completion {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Completion::Deployed { exit_code, .. } => *exit_code,
            Completion::Manual(_) => 0,
        }
    }

    /// The attempt that ended the run.
    pub fn attempt(&self) -> AttemptKind {
        match self {
            Completion::Deployed { attempt, .. } => *attempt,
            Completion::Manual(_) => AttemptKind::Manual,
        }
    }
}

/// Progress callback for sequencer runs.
pub trait AttemptObserver {
    /// Called before an attempt does anything
    fn attempt_started(&mut self, attempt: AttemptKind);

    /// Called when an attempt falls through to the next one
    fn attempt_failed(&mut self, attempt: AttemptKind, error: &Error);

    /// Called when an attempt ends the run
    fn attempt_succeeded(&mut self, attempt: AttemptKind);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl AttemptObserver for NoopObserver {
    fn attempt_started(&mut self, _attempt: AttemptKind) {}
    fn attempt_failed(&mut self, _attempt: AttemptKind, _error: &Error) {}
    fn attempt_succeeded(&mut self, _attempt: AttemptKind) {}
}

/// Runs a [`DeployPlan`] through a [`Transport`].
pub struct Sequencer<'a, T: Transport> {
    transport: T,
    plan: &'a DeployPlan,
}

impl<'a, T: Transport> Sequencer<'a, T> {
    pub fn new(transport: T, plan: &'a DeployPlan) -> Self {
        Self { transport, plan }
    }

    /// Run until one attempt terminates the run.
    pub fn run(&self, observer: &mut dyn AttemptObserver) -> Completion {
        if let Some(done) = self.step(AttemptKind::ForwardedCredential, observer, |s| {
            s.try_forwarded()
        }) {
            return done;
        }

        if let Some(done) = self.step(AttemptKind::KeyBased, observer, |s| s.try_key_based()) {
            return done;
        }

        observer.attempt_started(AttemptKind::Manual);
        let manual = self.manual_instructions();
        observer.attempt_succeeded(AttemptKind::Manual);
        Completion::Manual(manual)
    }

    /// Instructions for the manual fallback.
    pub fn manual_instructions(&self) -> ManualInstructions {
        let command = remote_command(&self.plan.script, &self.plan.interpreter);
        ManualInstructions::new(&self.plan.endpoint, &command, &self.plan.docs)
    }

    fn step<F>(
        &self,
        attempt: AttemptKind,
        observer: &mut dyn AttemptObserver,
        f: F,
    ) -> Option<Completion>
    where
        F: FnOnce(&Self) -> Result<Completion>,
    {
        observer.attempt_started(attempt);
        match f(self) {
            Ok(done) => {
                log::debug!("{attempt} attempt ended the run (exit {})", done.exit_code());
                observer.attempt_succeeded(attempt);
                Some(done)
            }
            Err(e) => {
                log::debug!("{attempt} attempt fell through: {e}");
                observer.attempt_failed(attempt, &e);
                None
            }
        }
    }

    fn try_forwarded(&self) -> Result<Completion> {
        let invocation = forwarded_invocation(self.plan)?;

        if !self.transport.tool_exists(&self.plan.helper) {
            return Err(Error::ToolNotFound(self.plan.helper.clone()));
        }

        let code = self.transport.run_interactive(&invocation)?;
        if code != 0 && self.plan.forwarded_exit == ForwardedExitPolicy::FallThrough {
            return Err(Error::from_exit(code, ""));
        }

        Ok(Completion::Deployed {
            attempt: AttemptKind::ForwardedCredential,
            exit_code: code,
            output: None,
        })
    }

    fn try_key_based(&self) -> Result<Completion> {
        let invocation = key_invocation(self.plan);
        let output = self
            .transport
            .run_captured(&invocation, Some(self.plan.key_timeout))?;

        if !output.success() {
            return Err(Error::from_exit(output.code, &output.stderr));
        }

        Ok(Completion::Deployed {
            attempt: AttemptKind::KeyBased,
            exit_code: 0,
            output: Some(output.stdout),
        })
    }
}
