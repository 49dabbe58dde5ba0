use anyhow::{Context as _, Result, bail};
use std::fs;

use crate::Context;
use crate::cli::{ConfigCommand, ConfigFormatArg, TargetArgs};
use crate::commands::load_plan;
use crate::config::{ConfigView, TEMPLATE};
use crate::paths;
use crate::ui;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { target, format } => show(ctx, &target, format),
        ConfigCommand::Path => path(ctx),
        ConfigCommand::Init { force } => init(ctx, force),
    }
}

fn show(ctx: &Context, target: &TargetArgs, format: ConfigFormatArg) -> Result<()> {
    let plan = load_plan(ctx, target)?;
    let view = ConfigView::from(&plan);

    let rendered = match format {
        ConfigFormatArg::Toml => toml::to_string_pretty(&view)?,
        ConfigFormatArg::Json => serde_json::to_string_pretty(&view)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn path(ctx: &Context) -> Result<()> {
    let path = match &ctx.config {
        Some(path) => path.clone(),
        None => paths::config_file()?,
    };
    println!("{}", path.display());
    Ok(())
}

fn init(ctx: &Context, force: bool) -> Result<()> {
    let path = match &ctx.config {
        Some(path) => path.clone(),
        None => paths::config_file()?,
    };

    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Could not create {}", dir.display()))?;
    }
    fs::write(&path, TEMPLATE).with_context(|| format!("Could not write {}", path.display()))?;

    if !ctx.quiet {
        ui::success(&format!("Wrote {}", path.display()));
        ui::dim("Edit [server] and [script], then run 'rdeploy doctor'");
    }
    Ok(())
}
