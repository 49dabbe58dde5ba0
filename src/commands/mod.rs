pub mod config;
pub mod deploy;
pub mod doctor;
pub mod instructions;

use anyhow::Result;
use sshkit::DeployPlan;

use crate::Context;
use crate::cli::TargetArgs;
use crate::config::{self as settings, FileConfig};

/// Load the config file and merge the per-run flags over it.
pub fn load_plan(ctx: &Context, args: &TargetArgs) -> Result<DeployPlan> {
    let (file, path) = FileConfig::load(ctx.config.as_deref())?;
    log::debug!("Resolving deployment target (config: {})", path.display());
    settings::resolve(&file, args)
}
