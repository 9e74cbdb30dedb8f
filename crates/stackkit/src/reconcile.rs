//! Top-level reconciliation of one stack spec

use crate::driver::LifecycleDriver;
use crate::error::Result;
use crate::observer::StackObserver;
use crate::planner;
use crate::provider::Provider;
use crate::retry::{BackoffRetrier, Sleeper, ThreadSleeper};
use crate::types::{DesiredSpec, OperationResult, PollConfig, RetryConfig, TargetState};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Tunables for one reconciler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilerConfig {
    pub retry: RetryConfig,
    pub poll: PollConfig,
}

/// Converges stacks described by [`DesiredSpec`]s through a [`Provider`].
///
/// Every call observes the stack afresh; nothing is cached between calls,
/// so one reconciler can serve many specs, including from several threads
/// for different stack names.
pub struct Reconciler<P: Provider> {
    provider: P,
    retrier: BackoffRetrier,
    poll: PollConfig,
    interrupt: Arc<AtomicBool>,
}

impl<P: Provider> Reconciler<P> {
    /// Create a reconciler that sleeps the calling thread between attempts
    pub fn new(provider: P, config: ReconcilerConfig) -> Self {
        Self::with_sleeper(provider, config, Arc::new(ThreadSleeper))
    }

    /// Create a reconciler with a custom sleeper
    pub fn with_sleeper(provider: P, config: ReconcilerConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            provider,
            retrier: BackoffRetrier::new(config.retry, sleeper),
            poll: config.poll,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop polling once `flag` is set
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// The underlying provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn observer(&self) -> StackObserver<'_, P> {
        StackObserver::new(&self.provider, &self.retrier)
    }

    fn driver(&self) -> LifecycleDriver<'_, P> {
        LifecycleDriver::new(&self.provider, &self.retrier, self.poll.clone())
            .with_interrupt(self.interrupt.clone())
    }

    /// Report what `apply` would do without changing anything
    pub fn check(&self, spec: &DesiredSpec) -> Result<OperationResult> {
        spec.validate()?;
        let observed = self.observer().observe(&spec.name)?;
        let (changed, output) = planner::report(spec, &observed);

        log::debug!("Checked stack {}: {output}", spec.name);

        let result = if changed {
            OperationResult::changed(output)
        } else {
            OperationResult::unchanged(output)
        };
        Ok(result.with_outputs(observed.outputs))
    }

    /// Converge the remote stack to the spec
    pub fn apply(&self, spec: &DesiredSpec) -> Result<OperationResult> {
        spec.validate()?;
        let observed = self.observer().observe(&spec.name)?;

        if spec.state == TargetState::Described {
            return Ok(if observed.exists {
                OperationResult::unchanged("Stack is only being described")
                    .with_outputs(observed.outputs)
            } else {
                OperationResult {
                    failed: true,
                    ..OperationResult::unchanged("Stack doesn't exist")
                }
            });
        }

        let action = planner::plan(spec, &observed);
        log::debug!("Planned {action:?} for stack {}", spec.name);

        if !action.is_mutation() {
            return Ok(if spec.state == TargetState::Absent {
                OperationResult::unchanged("Stack not found.")
            } else {
                OperationResult::unchanged("Stack is up to date.").with_outputs(observed.outputs)
            });
        }

        self.driver()
            .with_known_stack_id(observed.stack_id)
            .execute(&action, spec)
    }

    /// Run `check` or `apply`
    pub fn reconcile(&self, spec: &DesiredSpec, dry_run: bool) -> Result<OperationResult> {
        if dry_run {
            self.check(spec)
        } else {
            self.apply(spec)
        }
    }
}
