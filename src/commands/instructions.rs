use anyhow::Result;
use sshkit::{ProcessTransport, Sequencer};

use crate::Context;
use crate::cli::TargetArgs;
use crate::commands::load_plan;

pub fn run(ctx: &Context, args: TargetArgs) -> Result<()> {
    let plan = load_plan(ctx, &args)?;
    let manual = Sequencer::new(ProcessTransport::new(), &plan).manual_instructions();
    print!("{manual}");
    Ok(())
}
