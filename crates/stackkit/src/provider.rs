//! Remote provisioning service interface
//!
//! The engine talks to the provisioning service only through [`Provider`].
//! Implementations translate these calls to a concrete API.

use crate::error::ProviderResult;
use crate::types::{DesiredSpec, TemplateSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A stack as returned by the describe call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    pub stack_id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// One entry of a stack's event history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    pub timestamp: String,
    pub resource_type: String,
    pub logical_id: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl fmt::Display for StackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StackEvent {} {} {}",
            self.resource_type, self.logical_id, self.status
        )?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

/// Template as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestTemplate {
    /// Serialized template document
    Body(String),
    /// Remote template location
    Url(String),
}

/// Payload of a create or update call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRequest {
    pub name: String,
    pub template: Option<RequestTemplate>,
    pub parameters: BTreeMap<String, String>,
    pub tags: Option<BTreeMap<String, String>>,
    pub stack_policy: Option<String>,
    pub disable_rollback: bool,
    pub capabilities: Vec<String>,
}

impl StackRequest {
    /// Build the wire request for a desired spec
    pub fn from_spec(spec: &DesiredSpec) -> Self {
        let template = spec.template.as_ref().map(|source| match source {
            TemplateSource::Body(body) => RequestTemplate::Body(body.to_string()),
            TemplateSource::Url(url) => RequestTemplate::Url(url.clone()),
        });

        Self {
            name: spec.name.clone(),
            template,
            parameters: spec.parameters.clone(),
            tags: spec.tags.clone(),
            stack_policy: spec.stack_policy.clone(),
            disable_rollback: spec.disable_rollback,
            capabilities: spec.capabilities.clone(),
        }
    }
}

/// Remote provisioning API
///
/// Every method is a single round trip. Retrying, polling and error
/// classification are the engine's job, not the provider's.
pub trait Provider: Send + Sync {
    /// Describe a stack by name
    fn describe_stack(&self, name: &str) -> ProviderResult<StackDescription>;

    /// Fetch the raw template body of an existing stack
    fn get_template(&self, name: &str) -> ProviderResult<String>;

    /// Fetch the event history of a stack, oldest first
    ///
    /// Accepts a stack id so history stays reachable after deletion.
    fn describe_events(&self, stack_id: &str) -> ProviderResult<Vec<StackEvent>>;

    /// Start creating a stack
    fn create_stack(&self, request: &StackRequest) -> ProviderResult<()>;

    /// Start updating a stack
    fn update_stack(&self, request: &StackRequest) -> ProviderResult<()>;

    /// Start deleting a stack
    fn delete_stack(&self, name: &str) -> ProviderResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TargetState;
    use serde_json::json;

    #[test]
    fn test_event_display() {
        let mut event = StackEvent {
            timestamp: "2024-01-01T00:00:00Z".into(),
            resource_type: "AWS::CloudFormation::Stack".into(),
            logical_id: "web".into(),
            status: "CREATE_COMPLETE".into(),
            reason: None,
        };
        assert_eq!(
            event.to_string(),
            "StackEvent AWS::CloudFormation::Stack web CREATE_COMPLETE"
        );

        event.reason = Some("User Initiated".into());
        assert!(event.to_string().ends_with("CREATE_COMPLETE (User Initiated)"));
    }

    #[test]
    fn test_request_from_spec() {
        let spec = DesiredSpec::new("web", TargetState::Present)
            .with_body(json!({"A": 1}))
            .with_parameter("KeyName", "ops");
        let request = StackRequest::from_spec(&spec);

        assert_eq!(request.name, "web");
        assert_eq!(request.template, Some(RequestTemplate::Body(r#"{"A":1}"#.into())));
        assert_eq!(request.parameters.get("KeyName").unwrap(), "ops");
        assert_eq!(request.capabilities, vec!["CAPABILITY_IAM".to_string()]);
    }
}
