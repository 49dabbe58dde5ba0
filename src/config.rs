//! Layered deployment configuration.
//!
//! Values are resolved as: CLI flag > environment variable (through clap's
//! `env` support) > `config.toml` > built-in default. Nothing secret is
//! compiled into the binary.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sshkit::types::{DEFAULT_HELPER, DEFAULT_INTERPRETER, DEFAULT_SSH, DEFAULT_USER};
use sshkit::{
    DeployPlan, DocLink, Endpoint, ForwardedExitPolicy, HostKeyPolicy, ScriptRef, Secret,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{ForwardedFailureArg, TargetArgs};
use crate::paths;

// ============================================================================
// File Schema
// ============================================================================

/// Contents of `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub script: ScriptSection,

    #[serde(default)]
    pub ssh: SshSection,

    /// Documentation pointers printed with manual instructions
    #[serde(default)]
    pub docs: Option<Vec<DocLink>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<Secret>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptSection {
    pub url: Option<String>,
    pub interpreter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshSection {
    pub host_keys: Option<HostKeyPolicy>,
    pub on_forwarded_failure: Option<ForwardedExitPolicy>,
    pub key_timeout_secs: Option<u64>,
    /// Credential-forwarding helper (default: sshpass)
    pub helper: Option<String>,
    /// ssh binary (default: ssh)
    pub program: Option<String>,
}

impl FileConfig {
    /// Parse a config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Load the config file.
    ///
    /// An explicit path must exist. The default path is optional: a missing
    /// file yields an empty config so everything can come from flags and env.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf)> {
        if let Some(path) = explicit {
            return Ok((Self::from_path(path)?, path.to_path_buf()));
        }

        let path = paths::config_file()?;
        if path.exists() {
            log::debug!("Loading config from {}", path.display());
            Ok((Self::from_path(&path)?, path))
        } else {
            log::debug!("No config file at {}, using flags and env only", path.display());
            Ok((Self::default(), path))
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Merge flags over the file config into a [`DeployPlan`].
pub fn resolve(file: &FileConfig, args: &TargetArgs) -> Result<DeployPlan> {
    let host = args
        .host
        .clone()
        .or_else(|| file.server.host.clone())
        .filter(|h| !h.trim().is_empty())
        .context("No server configured. Use --host, RDEPLOY_HOST or [server].host")?;

    let user = args
        .user
        .clone()
        .or_else(|| file.server.user.clone())
        .unwrap_or_else(|| DEFAULT_USER.to_string());

    let mut endpoint = Endpoint::new(host.trim(), user);
    if let Some(port) = args.port.or(file.server.port) {
        if port == 0 {
            bail!("Port must be between 1 and 65535");
        }
        endpoint = endpoint.with_port(port);
    }
    if let Some(secret) = args
        .password
        .clone()
        .map(Secret::new)
        .or_else(|| file.server.password.clone())
    {
        endpoint = endpoint.with_secret(secret);
    }

    let url = args
        .script_url
        .clone()
        .or_else(|| file.script.url.clone())
        .context("No script URL configured. Use --script-url, RDEPLOY_SCRIPT_URL or [script].url")?;
    let script = ScriptRef::parse(&url)?;

    let mut plan = DeployPlan::new(endpoint, script);

    plan.interpreter = args
        .interpreter
        .clone()
        .or_else(|| file.script.interpreter.clone())
        .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string());

    plan.host_keys = if args.strict_host_keys {
        HostKeyPolicy::Strict
    } else {
        file.ssh.host_keys.unwrap_or_default()
    };

    plan.forwarded_exit = match args.on_forwarded_failure {
        Some(ForwardedFailureArg::FallThrough) => ForwardedExitPolicy::FallThrough,
        Some(ForwardedFailureArg::Terminate) => ForwardedExitPolicy::Terminate,
        None => file.ssh.on_forwarded_failure.unwrap_or_default(),
    };

    if let Some(secs) = args.key_timeout.or(file.ssh.key_timeout_secs) {
        if secs == 0 {
            bail!("Key-based timeout must be at least 1 second");
        }
        plan.key_timeout = Duration::from_secs(secs);
    }

    plan.helper = file
        .ssh
        .helper
        .clone()
        .unwrap_or_else(|| DEFAULT_HELPER.to_string());
    plan.ssh = file
        .ssh
        .program
        .clone()
        .unwrap_or_else(|| DEFAULT_SSH.to_string());

    if let Some(docs) = &file.docs {
        plan.docs = docs.clone();
    }

    Ok(plan)
}

// ============================================================================
// Display
// ============================================================================

/// Printable view of a resolved plan. The password is never included.
#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: &'static str,
    pub script_url: String,
    pub interpreter: String,
    pub host_keys: HostKeyPolicy,
    pub on_forwarded_failure: ForwardedExitPolicy,
    pub key_timeout_secs: u64,
    pub helper: String,
    pub ssh: String,
    pub docs: Vec<DocLink>,
}

impl From<&DeployPlan> for ConfigView {
    fn from(plan: &DeployPlan) -> Self {
        Self {
            host: plan.endpoint.host.clone(),
            port: plan.endpoint.port,
            user: plan.endpoint.user.clone(),
            password: if plan.endpoint.secret.is_some() {
                "***"
            } else {
                "(not set)"
            },
            script_url: plan.script.to_string(),
            interpreter: plan.interpreter.clone(),
            host_keys: plan.host_keys,
            on_forwarded_failure: plan.forwarded_exit,
            key_timeout_secs: plan.key_timeout.as_secs(),
            helper: plan.helper.clone(),
            ssh: plan.ssh.clone(),
            docs: plan.docs.clone(),
        }
    }
}

/// Template written by `rdeploy config init`
pub const TEMPLATE: &str = r#"# rdeploy configuration
#
# Every value can be overridden per run with a flag or an environment
# variable (RDEPLOY_HOST, RDEPLOY_PORT, RDEPLOY_USER, RDEPLOY_PASSWORD,
# RDEPLOY_SCRIPT_URL). Prefer RDEPLOY_PASSWORD over storing the password here.

[server]
host = "203.0.113.7"
# port = 22
user = "root"
# password = ""

[script]
url = "https://example.com/deploy-server-side.sh"
# interpreter = "bash"

[ssh]
# accept-any: skip host key verification (StrictHostKeyChecking=no)
# strict:     require the host key in known_hosts
host_keys = "accept-any"
# fall-through: if sshpass runs but the deploy fails, try the SSH key next
# terminate:    stop and exit with sshpass's exit code
on_forwarded_failure = "fall-through"
key_timeout_secs = 5

# [[docs]]
# label = "Full documentation"
# path = "DEPLOY_INSTRUCTIONS.md"
"#;
