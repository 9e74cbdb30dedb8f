//! `stackform describe` - report stacks by name without changing them

use anyhow::Result;
use stackkit::{DesiredSpec, PollConfig, TargetState};

use crate::Context;
use crate::cli::DescribeArgs;

pub fn run(ctx: &Context, args: &DescribeArgs) -> Result<()> {
    let specs: Vec<DesiredSpec> = args
        .names
        .iter()
        .map(|name| DesiredSpec::new(name, TargetState::Described))
        .collect();

    let reconciler = super::reconciler(&args.provider, PollConfig::default())?;
    let reports = super::run_all(&reconciler, &specs, false, usize::from(args.jobs))?;
    super::finish(ctx, "Stacks", &reports, args.provider.json)
}
