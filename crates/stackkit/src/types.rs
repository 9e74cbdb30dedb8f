//! Core types for stack reconciliation

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Capability acknowledged on every create and update.
pub const DEFAULT_CAPABILITY: &str = "CAPABILITY_IAM";

/// Lifecycle state the caller wants the stack to be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    /// Stack exists and matches the spec
    #[default]
    Present,
    /// Stack does not exist
    Absent,
    /// Read-only: report the stack without changing it
    Described,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetState::Present => write!(f, "present"),
            TargetState::Absent => write!(f, "absent"),
            TargetState::Described => write!(f, "described"),
        }
    }
}

/// Where the desired template comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// Template document supplied inline
    Body(Value),
    /// Template stored remotely, referenced by location
    Url(String),
}

/// The declared stack a caller wants to converge to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredSpec {
    /// Stack name, unique per provider
    pub name: String,
    /// Target lifecycle state
    #[serde(default)]
    pub state: TargetState,
    /// Template, required when `state` is present
    #[serde(default)]
    pub template: Option<TemplateSource>,
    /// Template parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Tags applied at creation
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    /// Raw stack policy document
    #[serde(default)]
    pub stack_policy: Option<String>,
    /// Keep failed resources instead of rolling back
    #[serde(default)]
    pub disable_rollback: bool,
    /// Capabilities acknowledged on create and update
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,
}

fn default_capabilities() -> Vec<String> {
    vec![DEFAULT_CAPABILITY.to_string()]
}

impl DesiredSpec {
    /// Create a spec with the given name and state and no template
    pub fn new(name: impl Into<String>, state: TargetState) -> Self {
        Self {
            name: name.into(),
            state,
            template: None,
            parameters: BTreeMap::new(),
            tags: None,
            stack_policy: None,
            disable_rollback: false,
            capabilities: default_capabilities(),
        }
    }

    /// Set an inline template body
    pub fn with_body(mut self, body: Value) -> Self {
        self.template = Some(TemplateSource::Body(body));
        self
    }

    /// Set a template location
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.template = Some(TemplateSource::Url(url.into()));
        self
    }

    /// Add a template parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Inline template body, if any
    pub fn template_body(&self) -> Option<&Value> {
        match &self.template {
            Some(TemplateSource::Body(body)) => Some(body),
            _ => None,
        }
    }

    /// Check the spec invariants before any remote call
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidSpec("stack name must not be empty".into()));
        }

        if self.state == TargetState::Present && self.template.is_none() {
            return Err(Error::InvalidSpec(format!(
                "stack {} is present but has neither a template body nor a template url",
                self.name
            )));
        }

        if let Some(TemplateSource::Url(url)) = &self.template
            && url.trim().is_empty()
        {
            return Err(Error::InvalidSpec(format!(
                "stack {} has an empty template url",
                self.name
            )));
        }

        Ok(())
    }
}

/// Snapshot of a stack as the provider reports it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    /// Whether the stack exists
    pub exists: bool,
    /// Provider-assigned stack id
    pub stack_id: Option<String>,
    /// Current template document
    pub template: Option<Value>,
    /// Current parameters
    pub parameters: BTreeMap<String, String>,
    /// Current outputs
    pub outputs: BTreeMap<String, String>,
    /// Provider status code, e.g. `CREATE_COMPLETE`
    pub status: Option<String>,
}

impl ObservedState {
    /// State of a stack that does not exist
    pub fn absent() -> Self {
        Self::default()
    }
}

/// Mutating operation on a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Status prefix the provider uses for this operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one reconciliation call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether remote state changed (or would change, in dry-run)
    pub changed: bool,
    /// Whether the remote operation ended in a failure state
    pub failed: bool,
    /// Human-readable summary
    pub output: String,
    /// Stack event history captured at completion
    #[serde(default)]
    pub events: Vec<String>,
    /// Stack outputs
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

impl OperationResult {
    /// A result with no remote change
    pub fn unchanged(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    /// A result where remote state changed
    pub fn changed(output: impl Into<String>) -> Self {
        Self {
            changed: true,
            output: output.into(),
            ..Default::default()
        }
    }

    /// A changed result whose remote operation failed
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            changed: true,
            failed: true,
            output: output.into(),
            ..Default::default()
        }
    }

    /// Attach the event trail
    pub fn with_events(mut self, events: Vec<String>) -> Self {
        self.events = events;
        self
    }

    /// Attach stack outputs
    pub fn with_outputs(mut self, outputs: BTreeMap<String, String>) -> Self {
        self.outputs = outputs;
        self
    }
}

/// Configuration for retrying throttled calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryConfig {
    /// Create a retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(300),
        }
    }

    /// Delay before retry `attempt` (0-indexed: 0 is the first retry).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// A config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Configuration for waiting on an accepted mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between status polls
    pub interval: Duration,
    /// Give up after sleeping this long in total, throttling backoff included;
    /// `None` polls forever
    pub max_wait: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: Some(Duration::from_secs(3600)),
        }
    }
}
