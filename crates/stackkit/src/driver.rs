//! Lifecycle driver - issues mutations and waits for them to finish
//!
//! After the provider accepts a create, update or delete, the driver polls
//! the stack status until it reaches a terminal state for that operation.
//! The provider gives no "delete complete" status: a delete is done when the
//! stack that was seen during polling stops being found.

use crate::error::{Error, ErrorCategory, Result};
use crate::planner::Action;
use crate::provider::{Provider, StackRequest};
use crate::retry::{BackoffRetrier, Sleeper};
use crate::types::{DesiredSpec, Operation, OperationResult, PollConfig};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Terminal state of a poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Status reached `{OP}_COMPLETE`
    Success,
    /// Provider rolled the operation back
    RolledBack,
    /// Status reached `{OP}_FAILED`
    Failed,
    /// Stack vanished after being seen
    Deleted,
    /// Stack was never seen
    StackNotFound,
    /// `max_wait` elapsed
    TimedOut,
    /// Caller asked to stop waiting
    Interrupted,
}

impl PollOutcome {
    /// Classify a status string for an operation, `None` if not terminal
    pub fn from_status(operation: Operation, status: &str) -> Option<Self> {
        let op = operation.as_str();

        if status == format!("{op}_COMPLETE") {
            Some(Self::Success)
        } else if status == "ROLLBACK_COMPLETE" || status == format!("{op}_ROLLBACK_COMPLETE") {
            Some(Self::RolledBack)
        } else if status == format!("{op}_FAILED") {
            Some(Self::Failed)
        } else {
            None
        }
    }

    /// Convert to the caller-facing result
    pub fn into_result(self, operation: Operation, events: Vec<String>) -> OperationResult {
        let result = match self {
            Self::Success => OperationResult::changed(format!("Stack {operation} complete")),
            Self::RolledBack => {
                OperationResult::failed(format!("Problem with {operation}. Rollback complete"))
            }
            Self::Failed => OperationResult::failed(format!("Stack {operation} failed")),
            Self::Deleted => OperationResult::changed("Stack Deleted"),
            Self::StackNotFound => OperationResult::changed("Stack Not Found"),
            Self::TimedOut => {
                OperationResult::failed(format!("Timed out waiting for stack {operation}"))
            }
            Self::Interrupted => {
                OperationResult::failed(format!("Stopped waiting for stack {operation}"))
            }
        };
        result.with_events(events)
    }
}

/// Carries out planned actions against the provider.
pub struct LifecycleDriver<'a, P: Provider + ?Sized> {
    provider: &'a P,
    retrier: &'a BackoffRetrier,
    poll: PollConfig,
    interrupt: Arc<AtomicBool>,
    known_stack_id: Option<String>,
}

impl<'a, P: Provider + ?Sized> LifecycleDriver<'a, P> {
    pub fn new(provider: &'a P, retrier: &'a BackoffRetrier, poll: PollConfig) -> Self {
        Self {
            provider,
            retrier,
            poll,
            interrupt: Arc::new(AtomicBool::new(false)),
            known_stack_id: None,
        }
    }

    /// Treat the stack as already seen by the poll loop.
    ///
    /// Pass the id from the observation that planned the action, so a stack
    /// that is gone by the first poll counts as deleted rather than never found.
    pub fn with_known_stack_id(mut self, stack_id: Option<String>) -> Self {
        self.known_stack_id = stack_id;
        self
    }

    /// Abandon polling once `flag` is set. The remote operation keeps running.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Execute an action for a spec and wait for it to settle.
    pub fn execute(&self, action: &Action, spec: &DesiredSpec) -> Result<OperationResult> {
        match action {
            Action::NoOp => Ok(OperationResult::unchanged("No changes required.")),
            Action::Create => self.create(spec),
            Action::Update { .. } => self.update(spec),
            Action::Delete => self.delete(&spec.name),
        }
    }

    fn create(&self, spec: &DesiredSpec) -> Result<OperationResult> {
        let request = StackRequest::from_spec(spec);

        match self.retrier.invoke(|| self.provider.create_stack(&request)) {
            Ok(()) => {
                log::info!("Creating stack {}", spec.name);
                self.wait_with_outputs(&spec.name, Operation::Create)
            }
            Err(Error::Provider(e)) if e.category() == ErrorCategory::AlreadyExists => {
                log::info!("Stack {} already exists, updating instead", spec.name);
                self.update(spec)
            }
            Err(e) => Err(mutation_error(Operation::Create, &spec.name, e)),
        }
    }

    fn update(&self, spec: &DesiredSpec) -> Result<OperationResult> {
        let request = StackRequest::from_spec(spec);

        match self.retrier.invoke(|| self.provider.update_stack(&request)) {
            Ok(()) => {
                log::info!("Updating stack {}", spec.name);
                self.wait_with_outputs(&spec.name, Operation::Update)
            }
            Err(Error::Provider(e)) if e.category() == ErrorCategory::NoUpdates => {
                log::info!("Stack {} has no updates to perform", spec.name);
                Ok(OperationResult::unchanged("Stack is already up-to-date."))
            }
            Err(e) => Err(mutation_error(Operation::Update, &spec.name, e)),
        }
    }

    fn delete(&self, name: &str) -> Result<OperationResult> {
        match self.retrier.invoke(|| self.provider.delete_stack(name)) {
            Ok(()) => {
                log::info!("Deleting stack {name}");
                self.wait(name, Operation::Delete)
            }
            Err(e) if e.is_not_found() => Ok(OperationResult::unchanged("Stack not found.")),
            Err(e) => Err(mutation_error(Operation::Delete, name, e)),
        }
    }

    /// Wait for a create or update, then attach the stack outputs
    fn wait_with_outputs(&self, name: &str, operation: Operation) -> Result<OperationResult> {
        let result = self.wait(name, operation)?;
        let outputs = self.current_outputs(name)?;
        Ok(result.with_outputs(outputs))
    }

    fn current_outputs(&self, name: &str) -> Result<BTreeMap<String, String>> {
        match self.retrier.invoke(|| self.provider.describe_stack(name)) {
            Ok(description) => Ok(description.outputs),
            Err(e) if e.is_not_found() => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Poll the stack until it reaches a terminal state for `operation`.
    ///
    /// Backoff after throttled polls counts towards `max_wait` along with the
    /// poll interval.
    pub fn wait(&self, name: &str, operation: Operation) -> Result<OperationResult> {
        let mut last_stack_id = self.known_stack_id.clone();
        let clock = Arc::new(ElapsedSleeper::new(self.retrier.sleeper().clone()));
        let retrier = BackoffRetrier::new(self.retrier.config().clone(), clock.clone());

        loop {
            if self.interrupt.load(Ordering::SeqCst) {
                log::warn!("Stopped waiting for stack {name}; the {operation} continues remotely");
                return Ok(PollOutcome::Interrupted.into_result(operation, Vec::new()));
            }

            match retrier.invoke(|| self.provider.describe_stack(name)) {
                Ok(description) => {
                    log::debug!("Stack {name} is {}", description.status);
                    let outcome = PollOutcome::from_status(operation, &description.status);
                    last_stack_id = Some(description.stack_id);

                    if let Some(outcome) = outcome {
                        log::info!("Stack {name} finished {operation}: {outcome:?}");
                        let events = self.events(last_stack_id.as_deref().unwrap_or(name));
                        return Ok(outcome.into_result(operation, events));
                    }
                }
                Err(e) if e.is_not_found() => {
                    return Ok(match &last_stack_id {
                        Some(stack_id) => {
                            log::info!("Stack {name} no longer exists");
                            PollOutcome::Deleted.into_result(operation, self.events(stack_id))
                        }
                        None => PollOutcome::StackNotFound.into_result(operation, Vec::new()),
                    });
                }
                Err(e) => return Err(e),
            }

            if let Some(max_wait) = self.poll.max_wait
                && clock.elapsed() >= max_wait
            {
                log::warn!(
                    "Gave up on stack {name} after {}s",
                    clock.elapsed().as_secs()
                );
                return Ok(PollOutcome::TimedOut.into_result(operation, Vec::new()));
            }

            clock.sleep(self.poll.interval);
        }
    }

    /// Event history rendered for display; empty when it cannot be fetched
    fn events(&self, stack_id: &str) -> Vec<String> {
        match self.retrier.invoke(|| self.provider.describe_events(stack_id)) {
            Ok(events) => events.iter().map(ToString::to_string).collect(),
            Err(e) => {
                log::warn!("Could not fetch events for {stack_id}: {e}");
                Vec::new()
            }
        }
    }
}

/// Sleeper that adds up the time it was asked to sleep
struct ElapsedSleeper {
    inner: Arc<dyn Sleeper>,
    slept_ms: AtomicU64,
}

impl ElapsedSleeper {
    fn new(inner: Arc<dyn Sleeper>) -> Self {
        Self {
            inner,
            slept_ms: AtomicU64::new(0),
        }
    }

    fn elapsed(&self) -> Duration {
        Duration::from_millis(self.slept_ms.load(Ordering::SeqCst))
    }
}

impl Sleeper for ElapsedSleeper {
    fn sleep(&self, duration: Duration) {
        self.inner.sleep(duration);
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.slept_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

fn mutation_error(operation: Operation, name: &str, error: Error) -> Error {
    match error {
        Error::Provider(source) => Error::Mutation {
            operation,
            name: name.to_string(),
            source,
        },
        other => other,
    }
}
