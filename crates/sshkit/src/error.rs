//! Error types for remote deployment attempts.
//!
//! Every automated attempt can fail in one of a handful of ways. The
//! sequencer never propagates these: it classifies them, reports them to
//! its observer and moves on to the next attempt.

use std::time::Duration;
use thiserror::Error;

/// Exit code `ssh` uses for its own failures (connection, auth, protocol).
pub const SSH_FAILURE_EXIT_CODE: i32 = 255;

/// Failure taxonomy of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A required local tool is not installed
    ToolNotFound,
    /// The SSH session could not be established or authenticated
    ConnectionOrAuthFailure,
    /// The bounded wait elapsed before the remote command finished
    Timeout,
    /// The remote command ran and exited non-zero
    NonZeroRemoteExit,
    /// Anything else (missing secret, local I/O failure)
    Other,
}

impl FailureKind {
    /// Short user-facing description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ToolNotFound => "Tool not available",
            Self::ConnectionOrAuthFailure => "Connection or authentication failed",
            Self::Timeout => "Timed out",
            Self::NonZeroRemoteExit => "Remote command failed",
            Self::Other => "Unexpected error",
        }
    }

    /// Actionable advice for this kind of failure.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::ToolNotFound => "Install the missing tool or use another method",
            Self::ConnectionOrAuthFailure => {
                "Check the host address, the user and that your key or password is accepted"
            }
            Self::Timeout => "Raise the key-based timeout or check network latency",
            Self::NonZeroRemoteExit => "Inspect the remote output; the deploy script itself failed",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while attempting a remote deployment.
#[derive(Debug, Error)]
pub enum Error {
    /// Local tool is not installed or not on PATH
    #[error("{0} not found on PATH")]
    ToolNotFound(String),

    /// ssh itself failed (exit code 255)
    #[error("connection or authentication failed (exit {code}): {stderr}")]
    ConnectionFailed {
        /// Exit code reported by ssh
        code: i32,
        /// Captured standard error, empty when stdio was inherited
        stderr: String,
    },

    /// The bounded wait elapsed and the child was killed
    #[error("{program} did not finish within {}s", .after.as_secs_f64())]
    Timeout {
        /// Program that was killed
        program: String,
        /// Bound that elapsed
        after: Duration,
    },

    /// The remote command exited non-zero
    #[error("remote command exited with status {code}: {stderr}")]
    RemoteExit {
        /// Exit code of the remote command
        code: i32,
        /// Captured standard error, empty when stdio was inherited
        stderr: String,
    },

    /// No password configured for forwarded-credential execution
    #[error("no password configured")]
    MissingSecret,

    /// Script reference is not a usable URL
    #[error("invalid script URL '{url}': {reason}")]
    InvalidScriptUrl {
        /// Rejected value
        url: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error into the attempt failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::ToolNotFound(_) => FailureKind::ToolNotFound,
            Error::ConnectionFailed { .. } => FailureKind::ConnectionOrAuthFailure,
            Error::Timeout { .. } => FailureKind::Timeout,
            Error::RemoteExit { .. } => FailureKind::NonZeroRemoteExit,
            _ => FailureKind::Other,
        }
    }

    /// Build the error for a non-zero ssh exit.
    ///
    /// ssh reserves 255 for its own failures; any other code came from the
    /// remote command.
    pub fn from_exit(code: i32, stderr: &str) -> Self {
        let stderr = stderr.trim().to_string();
        if code == SSH_FAILURE_EXIT_CODE {
            Error::ConnectionFailed { code, stderr }
        } else {
            Error::RemoteExit { code, stderr }
        }
    }
}

/// Result type for deployment operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_exit_ssh_failure() {
        let err = Error::from_exit(255, "Permission denied (publickey).\n");
        assert_eq!(err.kind(), FailureKind::ConnectionOrAuthFailure);
        assert!(err.to_string().contains("Permission denied (publickey)."));
    }

    #[test]
    fn test_from_exit_remote_failure() {
        let err = Error::from_exit(22, "curl: (22) The requested URL returned error: 404");
        assert_eq!(err.kind(), FailureKind::NonZeroRemoteExit);
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::ToolNotFound("sshpass".into()).kind(),
            FailureKind::ToolNotFound
        );
        let timeout = Error::Timeout {
            program: "ssh".into(),
            after: Duration::from_secs(5),
        };
        assert_eq!(timeout.kind(), FailureKind::Timeout);
        assert_eq!(timeout.to_string(), "ssh did not finish within 5s");
        assert_eq!(Error::MissingSecret.kind(), FailureKind::Other);
    }

    #[test]
    fn test_every_kind_has_advice() {
        for kind in [
            FailureKind::ToolNotFound,
            FailureKind::ConnectionOrAuthFailure,
            FailureKind::Timeout,
            FailureKind::NonZeroRemoteExit,
            FailureKind::Other,
        ] {
            assert!(!kind.description().is_empty());
            assert!(!kind.advice().is_empty());
        }
    }
}
