//! Reconciliation planner - decides what to do with a stack
//!
//! The plan is a pure function of the desired spec and one observation.
//! Dry-run reporting goes through the same decision so `check` and `apply`
//! can never disagree about whether a stack has drifted.

use crate::diff::{ChangeReport, diff_documents};
use crate::params::{ParameterDelta, diff_parameters};
use crate::types::{DesiredSpec, ObservedState, TargetState, TemplateSource};
use serde_json::{Map, Value, json};

/// How the desired template relates to the deployed one
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateDrift {
    Unchanged,
    Changed(ChangeReport),
    /// Template is referenced by location and cannot be compared locally
    Unverifiable(String),
}

impl TemplateDrift {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// Action required to converge a stack
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    NoOp,
    Create,
    Update {
        template: TemplateDrift,
        parameters: ParameterDelta,
    },
    Delete,
}

impl Action {
    /// Whether carrying out this action mutates remote state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

/// Decide the action for a desired spec against an observation
pub fn plan(desired: &DesiredSpec, observed: &ObservedState) -> Action {
    match (desired.state, observed.exists) {
        (TargetState::Present, false) => Action::Create,
        (TargetState::Present, true) => {
            let template = template_drift(desired, observed);
            let parameters = diff_parameters(&observed.parameters, &desired.parameters);

            if template.is_unchanged() && parameters.is_empty() {
                Action::NoOp
            } else {
                Action::Update {
                    template,
                    parameters,
                }
            }
        }
        (TargetState::Absent, true) => Action::Delete,
        (TargetState::Absent, false) | (TargetState::Described, _) => Action::NoOp,
    }
}

fn template_drift(desired: &DesiredSpec, observed: &ObservedState) -> TemplateDrift {
    let body = match &desired.template {
        Some(TemplateSource::Body(body)) => body,
        Some(TemplateSource::Url(url)) => return TemplateDrift::Unverifiable(url.clone()),
        None => return TemplateDrift::Unchanged,
    };

    let current = observed.template.as_ref().unwrap_or(&Value::Null);

    // Cheap equality check before building a report
    if current == body {
        return TemplateDrift::Unchanged;
    }

    TemplateDrift::Changed(diff_documents(current, body))
}

/// Render the pending changes of an update as a JSON list
///
/// Template drift comes first (`{"Template": ...}` or `{"TemplateURL": ...}`),
/// followed by the parameter delta when it is not empty.
pub fn describe_changes(template: &TemplateDrift, parameters: &ParameterDelta) -> Value {
    let mut reasons = Vec::new();

    match template {
        TemplateDrift::Unchanged => {}
        TemplateDrift::Changed(report) => reasons.push(json!({ "Template": report.to_value() })),
        TemplateDrift::Unverifiable(url) => {
            reasons.push(json!({ "TemplateURL": format!("{url} (not compared locally)") }));
        }
    }

    if !parameters.is_empty() {
        let delta: Map<String, Value> = parameters
            .iter()
            .map(|(key, change)| (key.clone(), json!({ "from": change.from, "to": change.to })))
            .collect();
        reasons.push(Value::Object(delta));
    }

    Value::Array(reasons)
}

/// Dry-run report: would anything change, and what
pub fn report(desired: &DesiredSpec, observed: &ObservedState) -> (bool, String) {
    match (desired.state, observed.exists) {
        (TargetState::Described, _) => (false, "Stack is only being described".into()),
        (TargetState::Absent, true) => (true, "Stack will be deleted.".into()),
        (TargetState::Absent, false) => (false, "Stack is missing.".into()),
        (TargetState::Present, false) => (true, "Stack would be created.".into()),
        (TargetState::Present, true) => match plan(desired, observed) {
            Action::Update {
                template,
                parameters,
            } => (
                true,
                format!(
                    "Stack would be updated, changes: {}",
                    describe_changes(&template, &parameters)
                ),
            ),
            _ => (false, "Stack is up to date.".into()),
        },
    }
}
