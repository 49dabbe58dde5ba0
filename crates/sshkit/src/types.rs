//! Core types for deployment attempts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::command::shell_quote;
use crate::error::{Error, Result};

/// Default SSH port. `-p` is only emitted for other ports.
pub const DEFAULT_PORT: u16 = 22;

/// Default login user.
pub const DEFAULT_USER: &str = "root";

/// Default interpreter the fetched script is piped into.
pub const DEFAULT_INTERPRETER: &str = "bash";

/// Default bound on the key-based attempt.
pub const DEFAULT_KEY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default credential-forwarding helper.
pub const DEFAULT_HELPER: &str = "sshpass";

/// Default remote-execution tool.
pub const DEFAULT_SSH: &str = "ssh";

// ============================================================================
// Secret
// ============================================================================

/// An authentication secret.
///
/// `Debug` is masked; the raw value is only reachable through [`Secret::expose`].
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The cleartext value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ============================================================================
// Endpoint & script reference
// ============================================================================

/// Target host, login and optional password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub secret: Option<Secret>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            secret: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret).filter(|s| !s.is_empty());
        self
    }

    /// `user@host` destination as ssh expects it.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Whether the port differs from the ssh default.
    pub fn has_custom_port(&self) -> bool {
        self.port != DEFAULT_PORT
    }
}

/// URL of the script the remote host fetches and runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRef(String);

impl ScriptRef {
    /// Validate a script URL.
    ///
    /// The URL is embedded unquoted in the remote command and inside single
    /// quotes in the manual one-liner, so whitespace and `'` are rejected.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let invalid = |reason| Error::InvalidScriptUrl {
            url: url.to_string(),
            reason,
        };

        if url.is_empty() {
            return Err(invalid("URL is empty"));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(invalid("URL must start with https:// or http://"));
        }
        if url.chars().any(char::is_whitespace) {
            return Err(invalid("URL must not contain whitespace"));
        }
        if url.contains('\'') {
            return Err(invalid("URL must not contain single quotes"));
        }

        Ok(Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the script is fetched over plain HTTP.
    pub fn is_insecure(&self) -> bool {
        self.0.starts_with("http://")
    }
}

impl fmt::Display for ScriptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Policies
// ============================================================================

/// How the remote host's identity is verified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Accept any host key and never record it
    #[default]
    AcceptAny,
    /// Require the host key to already be in known_hosts
    Strict,
}

impl HostKeyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AcceptAny => "accept-any",
            Self::Strict => "strict",
        }
    }
}

/// What happens when the forwarding helper is present but the remote
/// command exits non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForwardedExitPolicy {
    /// Report the failure and continue with key-based execution
    #[default]
    FallThrough,
    /// Stop and exit with the helper's exit code
    Terminate,
}

impl ForwardedExitPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FallThrough => "fall-through",
            Self::Terminate => "terminate",
        }
    }
}

// ============================================================================
// Attempts
// ============================================================================

/// The three deployment procedures, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    ForwardedCredential,
    KeyBased,
    Manual,
}

impl AttemptKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ForwardedCredential => "password (sshpass)",
            Self::KeyBased => "SSH key",
            Self::Manual => "manual instructions",
        }
    }
}

impl fmt::Display for AttemptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A pointer to external documentation printed with the manual instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocLink {
    pub label: String,
    pub path: String,
}

impl DocLink {
    pub fn new(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }

    /// Documentation shipped next to the deploy scripts.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Full documentation", "DEPLOY_INSTRUCTIONS.md"),
            Self::new("Quick guide", "DEPLOY_NOW.md"),
        ]
    }
}

// ============================================================================
// Process boundary
// ============================================================================

/// One external process: program, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables. Values are secrets and never displayed.
    pub env: Vec<(String, Secret)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: Secret) -> Self {
        self.env.push((key.into(), value));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, _) in &self.env {
            write!(f, "{key}=*** ")?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Everything the sequencer needs for one run.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub endpoint: Endpoint,
    pub script: ScriptRef,
    pub interpreter: String,
    pub host_keys: HostKeyPolicy,
    pub forwarded_exit: ForwardedExitPolicy,
    /// Bound on the key-based attempt
    pub key_timeout: Duration,
    /// Credential-forwarding helper program
    pub helper: String,
    /// Remote-execution program
    pub ssh: String,
    pub docs: Vec<DocLink>,
}

impl DeployPlan {
    /// Plan with default policies and tools.
    pub fn new(endpoint: Endpoint, script: ScriptRef) -> Self {
        Self {
            endpoint,
            script,
            interpreter: DEFAULT_INTERPRETER.to_string(),
            host_keys: HostKeyPolicy::default(),
            forwarded_exit: ForwardedExitPolicy::default(),
            key_timeout: DEFAULT_KEY_TIMEOUT,
            helper: DEFAULT_HELPER.to_string(),
            ssh: DEFAULT_SSH.to_string(),
            docs: DocLink::defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_masked() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.expose(), "hunter2");

        let endpoint = Endpoint::new("10.0.0.1", "root").with_secret(secret);
        assert!(!format!("{endpoint:?}").contains("hunter2"));
    }

    #[test]
    fn test_empty_secret_is_dropped() {
        let endpoint = Endpoint::new("10.0.0.1", "root").with_secret(Secret::new(""));
        assert!(endpoint.secret.is_none());
    }

    #[test]
    fn test_endpoint_destination() {
        let endpoint = Endpoint::new("deploy.example.com", "ops");
        assert_eq!(endpoint.destination(), "ops@deploy.example.com");
        assert!(!endpoint.has_custom_port());
        assert!(endpoint.with_port(2222).has_custom_port());
    }

    #[test]
    fn test_script_ref_accepts_https() {
        let script = ScriptRef::parse("  https://example.com/deploy.sh ").unwrap();
        assert_eq!(script.as_str(), "https://example.com/deploy.sh");
        assert!(!script.is_insecure());
        assert!(ScriptRef::parse("http://example.com/a.sh").unwrap().is_insecure());
    }

    #[test]
    fn test_script_ref_rejects_bad_urls() {
        for bad in [
            "",
            "example.com/deploy.sh",
            "ftp://example.com/deploy.sh",
            "https://example.com/a b.sh",
            "https://example.com/it's.sh",
        ] {
            let err = ScriptRef::parse(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidScriptUrl { .. }), "{bad}");
        }
    }

    #[test]
    fn test_policy_defaults() {
        assert_eq!(HostKeyPolicy::default(), HostKeyPolicy::AcceptAny);
        assert_eq!(ForwardedExitPolicy::default(), ForwardedExitPolicy::FallThrough);
    }

    #[test]
    fn test_policy_serde_names() {
        #[derive(Deserialize)]
        struct Policies {
            host_keys: HostKeyPolicy,
            forwarded_exit: ForwardedExitPolicy,
        }

        let parsed: Policies =
            toml::from_str("host_keys = \"strict\"\nforwarded_exit = \"terminate\"").unwrap();
        assert_eq!(parsed.host_keys, HostKeyPolicy::Strict);
        assert_eq!(parsed.forwarded_exit, ForwardedExitPolicy::Terminate);
        assert_eq!(parsed.host_keys.as_str(), "strict");
        assert_eq!(parsed.forwarded_exit.as_str(), "terminate");
    }

    #[test]
    fn test_invocation_display_hides_env() {
        let invocation = Invocation::new("sshpass")
            .arg("-e")
            .args(["ssh", "root@10.0.0.1", "curl -fsSL https://x/y.sh | bash"])
            .env("SSHPASS", Secret::new("hunter2"));

        let shown = invocation.to_string();
        assert_eq!(
            shown,
            "SSHPASS=*** sshpass -e ssh root@10.0.0.1 'curl -fsSL https://x/y.sh | bash'"
        );
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_plan_defaults() {
        let plan = DeployPlan::new(
            Endpoint::new("10.0.0.1", DEFAULT_USER),
            ScriptRef::parse("https://example.com/deploy.sh").unwrap(),
        );
        assert_eq!(plan.interpreter, "bash");
        assert_eq!(plan.key_timeout, Duration::from_secs(5));
        assert_eq!(plan.helper, "sshpass");
        assert_eq!(plan.ssh, "ssh");
        assert_eq!(plan.docs.len(), 2);
    }
}
