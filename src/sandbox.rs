//! Directory-backed stack provider
//!
//! Stores each stack as `<state_dir>/stacks/<name>.json` and its event
//! history as `<state_dir>/events/<stack id>.json`, so history stays
//! readable after the stack is deleted. Every operation completes at once
//! and answers errors the way the hosted service phrases them, so specs can
//! be rehearsed locally before they run against a real account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackkit::{
    Provider, ProviderError, ProviderResult, RequestTemplate, StackDescription, StackEvent,
    StackRequest,
};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";
const VALIDATION_ERROR: &str = "ValidationError";
const INTERNAL_FAILURE: &str = "InternalFailure";
const MAX_NAME_LEN: usize = 128;

/// A stack as persisted in the state directory
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredStack {
    stack_id: String,
    name: String,
    status: String,
    template: String,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    stack_policy: Option<String>,
    #[serde(default)]
    disable_rollback: bool,
    #[serde(default)]
    capabilities: Vec<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl StoredStack {
    fn description(&self) -> StackDescription {
        StackDescription {
            stack_id: self.stack_id.clone(),
            name: self.name.clone(),
            status: self.status.clone(),
            status_reason: None,
            parameters: self.parameters.clone(),
            outputs: outputs(&self.template, &self.parameters),
        }
    }
}

/// Provider that keeps stacks in local files
pub struct SandboxProvider {
    root: PathBuf,
}

impl SandboxProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn stack_path(&self, name: &str) -> PathBuf {
        self.root.join("stacks").join(format!("{}.json", file_key(name)))
    }

    fn events_path(&self, stack_id: &str) -> PathBuf {
        self.root
            .join("events")
            .join(format!("{}.json", file_key(stack_id)))
    }

    fn load(&self, name: &str) -> ProviderResult<Option<StoredStack>> {
        check_name(name)?;
        let path = self.stack_path(name);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| internal(&path, &e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(internal(&path, &e)),
        }
    }

    fn require(&self, name: &str) -> ProviderResult<StoredStack> {
        self.load(name)?
            .ok_or_else(|| ProviderError::stack_missing(name))
    }

    fn save(&self, stack: &StoredStack) -> ProviderResult<()> {
        write_json(&self.stack_path(&stack.name), stack)?;
        log::debug!("Saved sandbox stack {} ({})", stack.name, stack.status);
        Ok(())
    }

    fn load_events(&self, stack_id: &str) -> ProviderResult<Option<Vec<StackEvent>>> {
        let path = self.events_path(stack_id);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| internal(&path, &e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(internal(&path, &e)),
        }
    }

    fn record(&self, stack_id: &str, new_events: Vec<StackEvent>) -> ProviderResult<()> {
        let mut events = self.load_events(stack_id)?.unwrap_or_default();
        events.extend(new_events);
        write_json(&self.events_path(stack_id), &events)
    }

    /// Resolve the template of a request to its body text
    fn template_text(&self, template: &RequestTemplate) -> ProviderResult<String> {
        let text = match template {
            RequestTemplate::Body(body) => body.clone(),
            RequestTemplate::Url(url) => {
                let Some(path) = url.strip_prefix("file://") else {
                    return Err(ProviderError::new(
                        VALIDATION_ERROR,
                        format!("TemplateURL must be a file:// location in the sandbox: {url}"),
                    ));
                };
                fs::read_to_string(path).map_err(|e| {
                    ProviderError::new(
                        VALIDATION_ERROR,
                        format!("Template could not be read from {url}: {e}"),
                    )
                })?
            }
        };

        serde_json::from_str::<Value>(&text).map_err(|e| {
            ProviderError::new(VALIDATION_ERROR, format!("Template format error: {e}"))
        })?;
        Ok(text)
    }
}

impl Provider for SandboxProvider {
    fn describe_stack(&self, name: &str) -> ProviderResult<StackDescription> {
        Ok(self.require(name)?.description())
    }

    fn get_template(&self, name: &str) -> ProviderResult<String> {
        Ok(self.require(name)?.template)
    }

    fn describe_events(&self, stack_id: &str) -> ProviderResult<Vec<StackEvent>> {
        self.load_events(stack_id)?.ok_or_else(|| {
            ProviderError::new(
                VALIDATION_ERROR,
                format!("Stack [{stack_id}] does not exist"),
            )
        })
    }

    fn create_stack(&self, request: &StackRequest) -> ProviderResult<()> {
        if self.load(&request.name)?.is_some() {
            return Err(ProviderError::new(
                stackkit::error::ALREADY_EXISTS_CODE,
                format!("Stack [{}] already exists", request.name),
            ));
        }

        let Some(template) = &request.template else {
            return Err(ProviderError::new(
                VALIDATION_ERROR,
                "Either TemplateBody or TemplateURL must be specified",
            ));
        };
        let template = self.template_text(template)?;

        let now = Utc::now();
        let stack = StoredStack {
            stack_id: format!("sandbox:stack/{}/{}", request.name, now.timestamp_millis()),
            name: request.name.clone(),
            status: "CREATE_COMPLETE".to_string(),
            template,
            parameters: request.parameters.clone(),
            tags: request.tags.clone(),
            stack_policy: request.stack_policy.clone(),
            disable_rollback: request.disable_rollback,
            capabilities: request.capabilities.clone(),
            created_at: now,
            updated_at: None,
        };

        self.save(&stack)?;
        self.record(&stack.stack_id, lifecycle_events(&stack, "CREATE", now))?;
        log::info!("Sandbox created stack {}", stack.name);
        Ok(())
    }

    fn update_stack(&self, request: &StackRequest) -> ProviderResult<()> {
        let mut stack = self.require(&request.name)?;

        let template = match &request.template {
            Some(template) => self.template_text(template)?,
            None => stack.template.clone(),
        };

        let same_template = serde_json::from_str::<Value>(&template).ok()
            == serde_json::from_str::<Value>(&stack.template).ok();
        if same_template && request.parameters == stack.parameters {
            return Err(ProviderError::new(
                VALIDATION_ERROR,
                "No updates are to be performed.",
            ));
        }

        let now = Utc::now();
        stack.template = template;
        stack.parameters = request.parameters.clone();
        stack.tags = request.tags.clone();
        stack.stack_policy = request.stack_policy.clone();
        stack.disable_rollback = request.disable_rollback;
        stack.capabilities = request.capabilities.clone();
        stack.status = "UPDATE_COMPLETE".to_string();
        stack.updated_at = Some(now);

        self.save(&stack)?;
        self.record(&stack.stack_id, lifecycle_events(&stack, "UPDATE", now))?;
        log::info!("Sandbox updated stack {}", stack.name);
        Ok(())
    }

    fn delete_stack(&self, name: &str) -> ProviderResult<()> {
        let Some(stack) = self.load(name)? else {
            log::debug!("Sandbox delete of missing stack {name}");
            return Ok(());
        };

        let now = Utc::now();
        self.record(&stack.stack_id, lifecycle_events(&stack, "DELETE", now))?;

        let path = self.stack_path(name);
        fs::remove_file(&path).map_err(|e| internal(&path, &e))?;
        log::info!("Sandbox deleted stack {name}");
        Ok(())
    }
}

/// Events for one completed operation: the stack, each resource, the stack again
fn lifecycle_events(stack: &StoredStack, operation: &str, at: DateTime<Utc>) -> Vec<StackEvent> {
    let timestamp = at.to_rfc3339();
    let event = |resource_type: &str, logical_id: &str, status: String| StackEvent {
        timestamp: timestamp.clone(),
        resource_type: resource_type.to_string(),
        logical_id: logical_id.to_string(),
        status,
        reason: None,
    };

    let mut events = vec![event(
        STACK_RESOURCE_TYPE,
        &stack.name,
        format!("{operation}_IN_PROGRESS"),
    )];

    if let Ok(template) = serde_json::from_str::<Value>(&stack.template)
        && let Some(resources) = template.get("Resources").and_then(Value::as_object)
    {
        for (logical_id, resource) in resources {
            let resource_type = resource
                .get("Type")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            events.push(event(
                resource_type,
                logical_id,
                format!("{operation}_COMPLETE"),
            ));
        }
    }

    events.push(event(
        STACK_RESOURCE_TYPE,
        &stack.name,
        format!("{operation}_COMPLETE"),
    ));
    events
}

/// Outputs declared by the template, with `Ref`s to parameters resolved
fn outputs(template: &str, parameters: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let Ok(template) = serde_json::from_str::<Value>(template) else {
        return BTreeMap::new();
    };
    let Some(declared) = template.get("Outputs").and_then(Value::as_object) else {
        return BTreeMap::new();
    };

    declared
        .iter()
        .filter_map(|(key, output)| {
            let value = match output.get("Value")? {
                Value::String(s) => s.clone(),
                Value::Object(map) => map
                    .get("Ref")
                    .and_then(Value::as_str)
                    .and_then(|name| parameters.get(name))
                    .cloned()
                    .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
                other => other.to_string(),
            };
            Some((key.clone(), value))
        })
        .collect()
}

/// Names must match `[A-Za-z][-A-Za-z0-9]*`, so each one maps to its own file
fn check_name(name: &str) -> ProviderResult<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
        && name.len() <= MAX_NAME_LEN;

    if valid {
        Ok(())
    } else {
        Err(ProviderError::new(
            VALIDATION_ERROR,
            format!(
                "1 validation error detected: Value '{name}' at 'stackName' failed to satisfy \
                 constraint: Member must satisfy regular expression pattern: \
                 [a-zA-Z][-a-zA-Z0-9]*"
            ),
        ))
    }
}

/// Stack ids as safe file names
///
/// Ids are `sandbox:stack/<name>/<millis>` and names never contain `_`, so
/// distinct ids stay distinct.
fn file_key(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> ProviderResult<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| internal(dir, &e))?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|e| internal(path, &e))?;
    fs::write(path, content).map_err(|e| internal(path, &e))
}

fn internal(path: &Path, error: &dyn std::fmt::Display) -> ProviderError {
    ProviderError::new(INTERNAL_FAILURE, format!("{}: {error}", path.display()))
}
