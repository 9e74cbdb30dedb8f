//! `stackform plan` - dry-run reconciliation of spec files

use anyhow::Result;
use stackkit::PollConfig;

use crate::Context;
use crate::cli::PlanArgs;
use crate::spec_file;

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let specs = spec_file::load_all(&args.files)?;
    let reconciler = super::reconciler(&args.provider, PollConfig::default())?;

    log::info!("Planning {} stack(s)", specs.len());
    let reports = super::run_all(&reconciler, &specs, true, usize::from(args.jobs))?;
    super::finish(ctx, "Plan", &reports, args.provider.json)
}
