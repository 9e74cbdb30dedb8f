//! # stackkit
//!
//! Declarative reconciliation of infrastructure stacks.
//!
//! A stack is a named deployment built from a template document and a set of
//! string parameters. This crate compares a desired spec against what the
//! remote provider reports and drives the provider until the two agree.
//!
//! ## Core Concepts
//!
//! - **DesiredSpec**: What the stack should look like (present, absent or described)
//! - **ObservedState**: What the provider currently reports
//! - **Action**: The plan that converges one into the other
//! - **Provider**: The seam to the remote system; every call goes through a
//!   [`BackoffRetrier`] that retries throttled requests
//!
//! ## Example
//!
//! ```ignore
//! use stackkit::{DesiredSpec, Reconciler, ReconcilerConfig, TargetState};
//! use serde_json::json;
//!
//! let reconciler = Reconciler::new(my_provider, ReconcilerConfig::default());
//!
//! let spec = DesiredSpec::new("web", TargetState::Present)
//!     .with_body(json!({"Resources": {"Bucket": {"Type": "AWS::S3::Bucket"}}}))
//!     .with_parameter("Env", "prod");
//!
//! // Dry run first
//! let preview = reconciler.check(&spec)?;
//! println!("{}", preview.output);
//!
//! let result = reconciler.apply(&spec)?;
//! assert!(!result.failed);
//! ```

pub mod diff;
pub mod driver;
pub mod error;
pub mod observer;
pub mod params;
pub mod planner;
pub mod provider;
pub mod reconcile;
pub mod retry;
pub mod types;

#[cfg(test)]
mod testing;

pub use diff::{Change, ChangeEntry, ChangeReport, diff_documents};
pub use driver::{LifecycleDriver, PollOutcome};
pub use error::{Error, ErrorCategory, ProviderError, ProviderResult, Result};
pub use observer::StackObserver;
pub use params::{ParameterChange, ParameterDelta, diff_parameters};
pub use planner::{Action, TemplateDrift, plan, report};
pub use provider::{Provider, RequestTemplate, StackDescription, StackEvent, StackRequest};
pub use reconcile::{Reconciler, ReconcilerConfig};
pub use retry::{BackoffRetrier, Sleeper, ThreadSleeper};
pub use types::{
    DesiredSpec, ObservedState, Operation, OperationResult, PollConfig, RetryConfig, TargetState,
    TemplateSource,
};
