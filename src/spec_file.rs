//! Stack spec files
//!
//! A spec file lists one or more stacks, in TOML or JSON:
//!
//! ```toml
//! [[stacks]]
//! name = "web"
//! template = "templates/web.json"
//!
//! [stacks.parameters]
//! Env = "prod"
//! Replicas = 3
//! ```
//!
//! File references (`template`, `stack_policy`) are resolved relative to the
//! spec file. Templates must be JSON documents.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use stackkit::{DesiredSpec, TargetState};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpecFile {
    #[serde(default)]
    stacks: Vec<StackEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StackEntry {
    name: String,
    #[serde(default)]
    state: TargetState,
    template: Option<String>,
    template_url: Option<String>,
    #[serde(default)]
    parameters: BTreeMap<String, Value>,
    tags: Option<BTreeMap<String, String>>,
    stack_policy: Option<String>,
    #[serde(default)]
    disable_rollback: bool,
    capabilities: Option<Vec<String>>,
}

impl StackEntry {
    fn into_spec(self, base: &Path) -> Result<DesiredSpec> {
        let mut spec = DesiredSpec::new(&self.name, self.state);

        match (self.template, self.template_url) {
            (Some(_), Some(_)) => {
                bail!(
                    "Stack '{}' sets both template and template_url",
                    self.name
                )
            }
            (Some(template), None) => {
                let path = resolve(base, &template);
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read template: {}", path.display()))?;
                let body: Value = serde_json::from_str(&content).with_context(|| {
                    format!("Template is not valid JSON: {}", path.display())
                })?;
                spec = spec.with_body(body);
            }
            (None, Some(url)) => spec = spec.with_url(url),
            (None, None) => {}
        }

        for (key, value) in self.parameters {
            let value = parameter_string(&value)
                .with_context(|| format!("Stack '{}' parameter '{key}'", self.name))?;
            spec = spec.with_parameter(key, value);
        }

        if let Some(policy) = self.stack_policy {
            let path = resolve(base, &policy);
            spec.stack_policy = Some(
                fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read stack policy: {}", path.display()))?,
            );
        }

        spec.tags = self.tags;
        spec.disable_rollback = self.disable_rollback;
        if let Some(capabilities) = self.capabilities {
            spec.capabilities = capabilities;
        }

        Ok(spec)
    }
}

/// Parameter values are sent as strings; lists become comma-delimited
fn parameter_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(items) => items
            .iter()
            .map(parameter_string)
            .collect::<Result<Vec<_>>>()
            .map(|parts| parts.join(",")),
        Value::Null | Value::Object(_) => bail!("expected a string, number, bool or list"),
    }
}

fn resolve(base: &Path, reference: &str) -> PathBuf {
    let path = paths::expand(reference);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Load every stack declared in one spec file
pub fn load(path: &Path) -> Result<Vec<DesiredSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read spec file: {}", path.display()))?;

    let file: SpecFile = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Failed to parse spec file: {}", path.display()))?,
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse spec file: {}", path.display()))?,
        _ => bail!(
            "Unsupported spec file format: {} (expected .toml or .json)",
            path.display()
        ),
    };

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let specs = file
        .stacks
        .into_iter()
        .map(|entry| entry.into_spec(base))
        .collect::<Result<Vec<_>>>()?;

    log::debug!("Loaded {} stack(s) from {}", specs.len(), path.display());
    Ok(specs)
}

/// Load several spec files, rejecting stack names declared twice
pub fn load_all(paths: &[PathBuf]) -> Result<Vec<DesiredSpec>> {
    let mut seen = HashSet::new();
    let mut specs = Vec::new();

    for path in paths {
        for spec in load(path)? {
            if !seen.insert(spec.name.clone()) {
                bail!(
                    "Stack '{}' is declared more than once (again in {})",
                    spec.name,
                    path.display()
                );
            }
            specs.push(spec);
        }
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackkit::TemplateSource;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        write(&dir, "web.json", r#"{"Resources": {"Bucket": {"Type": "AWS::S3::Bucket"}}}"#);
        write(&dir, "policy.json", r#"{"Statement": []}"#);
        let path = write(
            &dir,
            "stacks.toml",
            r#"
[[stacks]]
name = "web"
template = "web.json"
stack_policy = "policy.json"
disable_rollback = true

[stacks.parameters]
Env = "prod"
Replicas = 3
Public = false
Zones = ["a", "b"]

[stacks.tags]
team = "platform"

[[stacks]]
name = "old"
state = "absent"
"#,
        );

        let specs = load(&path).unwrap();
        assert_eq!(specs.len(), 2);

        let web = &specs[0];
        assert_eq!(web.state, TargetState::Present);
        assert_eq!(
            web.template_body(),
            Some(&json!({"Resources": {"Bucket": {"Type": "AWS::S3::Bucket"}}}))
        );
        assert_eq!(web.parameters.get("Replicas").unwrap(), "3");
        assert_eq!(web.parameters.get("Public").unwrap(), "false");
        assert_eq!(web.parameters.get("Zones").unwrap(), "a,b");
        assert_eq!(web.stack_policy.as_deref(), Some(r#"{"Statement": []}"#));
        assert_eq!(web.tags.as_ref().unwrap().get("team").unwrap(), "platform");
        assert!(web.disable_rollback);
        assert_eq!(web.capabilities, vec!["CAPABILITY_IAM".to_string()]);

        assert_eq!(specs[1].state, TargetState::Absent);
        assert!(specs[1].template.is_none());
    }

    #[test]
    fn test_load_json_with_url() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "stacks.json",
            r#"{"stacks": [{"name": "api", "template_url": "file:///srv/api.json", "capabilities": []}]}"#,
        );

        let specs = load(&path).unwrap();
        assert_eq!(
            specs[0].template,
            Some(TemplateSource::Url("file:///srv/api.json".into()))
        );
        assert!(specs[0].capabilities.is_empty());
    }

    #[test]
    fn test_template_and_url_are_exclusive() {
        let dir = TempDir::new().unwrap();
        write(&dir, "web.json", "{}");
        let path = write(
            &dir,
            "stacks.toml",
            "[[stacks]]\nname = \"web\"\ntemplate = \"web.json\"\ntemplate_url = \"file:///web.json\"\n",
        );

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("both template and template_url"));
    }

    #[test]
    fn test_yaml_template_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "web.yaml", "Resources: {}\n");
        let path = write(
            &dir,
            "stacks.toml",
            "[[stacks]]\nname = \"web\"\ntemplate = \"web.yaml\"\n",
        );

        assert!(load(&path).is_err());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "stacks.yml", "stacks: []\n");

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported spec file format"));
    }

    #[test]
    fn test_nested_parameter_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "stacks.json",
            r#"{"stacks": [{"name": "web", "state": "absent", "parameters": {"P": {"a": 1}}}]}"#,
        );

        assert!(load(&path).is_err());
    }

    #[test]
    fn test_duplicate_names_across_files() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.toml", "[[stacks]]\nname = \"web\"\nstate = \"absent\"\n");
        let b = write(&dir, "b.toml", "[[stacks]]\nname = \"web\"\nstate = \"described\"\n");

        let err = load_all(&[a.clone(), b]).unwrap_err();
        assert!(err.to_string().contains("declared more than once"));

        assert_eq!(load_all(&[a]).unwrap().len(), 1);
    }
}
