//! Command implementations
//!
//! - `plan` - Preview changes for spec files
//! - `apply` - Converge stacks to spec files
//! - `describe` - Show stacks by name

pub mod apply;
pub mod describe;
pub mod plan;

use anyhow::{Context as AnyhowContext, Result, bail};
use rayon::prelude::*;
use serde::Serialize;
use stackkit::{
    DesiredSpec, OperationResult, PollConfig, Reconciler, ReconcilerConfig, RetryConfig,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Context;
use crate::cli::ProviderArgs;
use crate::paths;
use crate::sandbox::SandboxProvider;
use crate::ui;

/// Outcome of one stack within a run
#[derive(Debug, Serialize)]
pub struct StackReport {
    pub name: String,
    #[serde(flatten)]
    pub result: Option<OperationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StackReport {
    fn new(name: &str, outcome: stackkit::Result<OperationResult>) -> Self {
        match outcome {
            Ok(result) => Self {
                name: name.to_string(),
                result: Some(result),
                error: None,
            },
            Err(e) => {
                log::warn!("Stack {name}: {}", e.category().description());
                Self {
                    name: name.to_string(),
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Whether the stack errored or its operation ended in failure
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.result.as_ref().is_some_and(|r| r.failed)
    }

    fn is_changed(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.changed)
    }
}

/// Build a reconciler over the sandbox provider
pub fn reconciler(args: &ProviderArgs, poll: PollConfig) -> Result<Reconciler<SandboxProvider>> {
    let state_dir = match &args.state_dir {
        Some(dir) => dir.clone(),
        None => paths::state_dir()?,
    };
    log::debug!("Using sandbox state in {}", state_dir.display());

    let config = ReconcilerConfig {
        retry: RetryConfig {
            max_attempts: args.retries.max(1),
            ..RetryConfig::default()
        },
        poll,
    };
    Ok(Reconciler::new(SandboxProvider::new(state_dir), config))
}

/// Flag raised by Ctrl-C so running polls stop waiting
pub fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set interrupt handler")?;
    Ok(flag)
}

/// Reconcile specs in parallel, keeping input order in the reports
pub fn run_all(
    reconciler: &Reconciler<SandboxProvider>,
    specs: &[DesiredSpec],
    dry_run: bool,
    jobs: usize,
) -> Result<Vec<StackReport>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    Ok(pool.install(|| {
        specs
            .par_iter()
            .map(|spec| StackReport::new(&spec.name, reconciler.reconcile(spec, dry_run)))
            .collect()
    }))
}

/// Print reports and fail the command if any stack failed
pub fn finish(ctx: &Context, title: &str, reports: &[StackReport], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
    } else {
        print_reports(ctx, title, reports);
    }

    let failed = reports.iter().filter(|r| r.is_failure()).count();
    if failed > 0 {
        bail!("{failed} of {} stack(s) failed", reports.len());
    }
    Ok(())
}

fn print_reports(ctx: &Context, title: &str, reports: &[StackReport]) {
    if !ctx.quiet {
        ui::header(title);
    }

    for report in reports {
        match (&report.result, &report.error) {
            (_, Some(error)) => ui::error(&format!("{}: {error}", report.name)),
            (Some(result), None) => {
                if ctx.quiet && !result.changed && !result.failed {
                    continue;
                }
                ui::stack_result(&report.name, result, ctx.verbose > 0);
            }
            (None, None) => {}
        }
    }

    if !ctx.quiet {
        let failed = reports.iter().filter(|r| r.is_failure()).count();
        let changed = reports
            .iter()
            .filter(|r| r.is_changed() && !r.is_failure())
            .count();
        println!();
        println!(
            "{}",
            ui::summary(changed, reports.len() - changed - failed, failed)
        );
    }
}
