//! # sshkit
//!
//! Run a hosted deployment script on a remote server over SSH, trying
//! progressively less automated methods until one works.
//!
//! ## Attempts
//!
//! 1. **Forwarded credential**: `sshpass -e ssh ...` with the password in
//!    the helper's environment. Stdio is inherited and there is no timeout.
//! 2. **Key-based**: `ssh -o PasswordAuthentication=no ...` with output
//!    captured and a bounded wait.
//! 3. **Manual**: render copy-paste instructions. Cannot fail.
//!
//! On the remote side the command is always
//! `curl -fsSL <script-url> | <interpreter>`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sshkit::{DeployPlan, Endpoint, NoopObserver, ProcessTransport, ScriptRef, Secret, Sequencer};
//!
//! let endpoint = Endpoint::new("203.0.113.7", "root").with_secret(Secret::new("hunter2"));
//! let script = ScriptRef::parse("https://example.com/deploy.sh")?;
//! let plan = DeployPlan::new(endpoint, script);
//!
//! let completion = Sequencer::new(ProcessTransport::new(), &plan).run(&mut NoopObserver);
//! std::process::exit(completion.exit_code());
//! # Ok::<(), sshkit::Error>(())
//! ```
//!
//! ## Trust model
//!
//! [`HostKeyPolicy::AcceptAny`] (the default) disables host key checking,
//! and the fetched script runs without integrity verification. Use
//! [`HostKeyPolicy::Strict`] when the host is already in `known_hosts`.

pub mod backend;
pub mod command;
pub mod error;
pub mod instructions;
pub mod sequencer;
pub mod types;

pub use backend::{ProcessTransport, Transport};
pub use error::{Error, FailureKind, Result};
pub use instructions::ManualInstructions;
pub use sequencer::{AttemptObserver, Completion, NoopObserver, Sequencer};
pub use types::{
    AttemptKind, CommandOutput, DeployPlan, DocLink, Endpoint, ForwardedExitPolicy, HostKeyPolicy,
    Invocation, ScriptRef, Secret,
};
