//! `stackform apply` - converge stacks to their spec files

use anyhow::Result;
use stackkit::PollConfig;
use std::time::Duration;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::spec_file;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let specs = spec_file::load_all(&args.files)?;
    if args.dry_run && !ctx.quiet && !args.provider.json {
        ui::warn("Dry run: no stacks will be changed");
    }

    let reconciler = super::reconciler(&args.provider, poll_config(args))?
        .with_interrupt(super::interrupt_flag()?);

    log::info!(
        "{} {} stack(s)",
        if args.dry_run { "Checking" } else { "Applying" },
        specs.len()
    );
    let reports = super::run_all(&reconciler, &specs, args.dry_run, usize::from(args.jobs))?;

    let title = if args.dry_run { "Apply (dry run)" } else { "Apply" };
    super::finish(ctx, title, &reports, args.provider.json)
}

fn poll_config(args: &ApplyArgs) -> PollConfig {
    PollConfig {
        interval: Duration::from_secs(args.poll_interval.max(1)),
        max_wait: (args.max_wait > 0).then(|| Duration::from_secs(args.max_wait)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn apply_args(extra: &[&str]) -> ApplyArgs {
        let mut argv = vec!["stackform", "apply", "stacks.toml"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Apply(args) => args,
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_poll_config_defaults() {
        assert_eq!(poll_config(&apply_args(&[])), PollConfig::default());
    }

    #[test]
    fn test_zero_max_wait_polls_forever() {
        let poll = poll_config(&apply_args(&["--max-wait", "0", "--poll-interval", "10"]));
        assert_eq!(poll.max_wait, None);
        assert_eq!(poll.interval, Duration::from_secs(10));
    }
}
