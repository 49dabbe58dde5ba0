use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rdeploy")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Deploy a hosted script to a server over SSH", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/rdeploy/config.toml)
    #[arg(short, long, global = true, value_name = "PATH", env = "RDEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the deployment: password, then SSH key, then manual instructions
    Deploy(DeployArgs),

    /// Print manual deployment instructions without connecting
    Instructions(TargetArgs),

    /// Check local tools and configuration
    Doctor(DoctorArgs),

    /// Manage the config file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Target
// ============================================================================

/// Per-run overrides of the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Server address
    #[arg(long, env = "RDEPLOY_HOST")]
    pub host: Option<String>,

    /// SSH port
    #[arg(long, env = "RDEPLOY_PORT")]
    pub port: Option<u16>,

    /// Login user
    #[arg(short, long, env = "RDEPLOY_USER")]
    pub user: Option<String>,

    /// Password for sshpass
    #[arg(long, env = "RDEPLOY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// URL of the script the server fetches and runs
    #[arg(long, env = "RDEPLOY_SCRIPT_URL")]
    pub script_url: Option<String>,

    /// Interpreter the script is piped into on the server
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Require the server's host key to be in known_hosts
    #[arg(long)]
    pub strict_host_keys: bool,

    /// Seconds to wait for key-based deployment
    #[arg(long, value_name = "SECS")]
    pub key_timeout: Option<u64>,

    /// What to do when sshpass runs but the deployment fails
    #[arg(long, value_enum)]
    pub on_forwarded_failure: Option<ForwardedFailureArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ForwardedFailureArg {
    /// Try SSH key authentication next
    FallThrough,
    /// Stop and exit with sshpass's exit code
    Terminate,
}

// ============================================================================
// Deploy / Doctor
// ============================================================================

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Show what would run without connecting
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Also check that the script URL is reachable
    #[arg(long)]
    pub online: bool,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration (password masked)
    Show {
        #[command(flatten)]
        target: TargetArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ConfigFormatArg,
    },

    /// Print the config file path
    Path,

    /// Write a commented config template
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ConfigFormatArg {
    Toml,
    Json,
}
