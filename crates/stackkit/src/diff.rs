//! Structural diff of template documents
//!
//! Templates are compared as JSON trees. Mapping nodes are walked key by key;
//! lists and scalars are leaves.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Rendered form of [`Change::ChildDiffWithoutChanges`]
pub const CHILD_DIFF_SENTINEL: &str = "child diff but no changes found";

/// What happened to a single key
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Key only exists in the target
    Added,
    /// Key only exists in the current document
    Removed,
    /// Leaf value changed
    Changed { from: Value, to: Value },
    /// Sub-document changed
    Nested(ChangeReport),
    /// Sub-documents compared unequal but no differing key was found.
    /// Should not happen; reported instead of dropped so it stays visible.
    ChildDiffWithoutChanges,
}

/// A change at one path
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    /// Key of the change, relative to the enclosing report
    pub path: String,
    pub change: Change,
}

/// Ordered list of changes between two documents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeReport {
    entries: Vec<ChangeEntry>,
}

impl ChangeReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, path: &str, change: Change) {
        self.entries.push(ChangeEntry {
            path: path.to_string(),
            change,
        });
    }

    /// Whether the documents were equal
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in key order
    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    /// Look up the change recorded for a key
    pub fn get(&self, path: &str) -> Option<&Change> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| &e.change)
    }

    /// Count leaf changes, descending into nested reports
    pub fn total_changes(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match &e.change {
                Change::Nested(child) => child.total_changes(),
                _ => 1,
            })
            .sum()
    }

    /// Render as a JSON object: `{"Key": "Added" | "Removed" | "Changed from X to Y" | {...}}`
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for entry in &self.entries {
            let rendered = match &entry.change {
                Change::Added => Value::String("Added".into()),
                Change::Removed => Value::String("Removed".into()),
                Change::Changed { from, to } => Value::String(format!(
                    "Changed from {} to {}",
                    display_leaf(from),
                    display_leaf(to)
                )),
                Change::Nested(child) => child.to_value(),
                Change::ChildDiffWithoutChanges => Value::String(CHILD_DIFF_SENTINEL.into()),
            };
            map.insert(entry.path.clone(), rendered);
        }
        Value::Object(map)
    }
}

impl fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

/// Strings print bare, everything else as compact JSON
fn display_leaf(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compute the structural diff from `current` to `target`.
///
/// Keys are visited in sorted order of the union of both mappings. Equal
/// values produce no entry. Unequal mappings are diffed recursively and
/// reported as a nested report under their key.
///
/// Lists are compared as whole values: a list that differs in one element
/// is reported as a single `Changed` entry, not element by element.
///
/// If either side is not a mapping, unequal documents produce one `Changed`
/// entry at the empty path.
pub fn diff_documents(current: &Value, target: &Value) -> ChangeReport {
    match (current, target) {
        (Value::Object(current), Value::Object(target)) => diff_maps(current, target),
        _ if current == target => ChangeReport::new(),
        _ => {
            let mut report = ChangeReport::new();
            report.push(
                "",
                Change::Changed {
                    from: current.clone(),
                    to: target.clone(),
                },
            );
            report
        }
    }
}

fn diff_maps(current: &Map<String, Value>, target: &Map<String, Value>) -> ChangeReport {
    let keys: BTreeSet<&String> = current.keys().chain(target.keys()).collect();
    let mut report = ChangeReport::new();

    for key in keys {
        match (current.get(key), target.get(key)) {
            (None, Some(_)) => report.push(key, Change::Added),
            (Some(_), None) => report.push(key, Change::Removed),
            (Some(from), Some(to)) if from != to => {
                if let (Value::Object(from), Value::Object(to)) = (from, to) {
                    let child = diff_maps(from, to);
                    if child.is_empty() {
                        report.push(key, Change::ChildDiffWithoutChanges);
                    } else {
                        report.push(key, Change::Nested(child));
                    }
                } else {
                    report.push(
                        key,
                        Change::Changed {
                            from: from.clone(),
                            to: to.clone(),
                        },
                    );
                }
            }
            _ => {}
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Value {
        json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Parameters": {"KeyName": {"Type": "String"}},
            "Resources": {
                "Bucket": {
                    "Type": "AWS::S3::Bucket",
                    "Properties": {"BucketName": "logs", "Tags": [{"Key": "a", "Value": "1"}]}
                }
            }
        })
    }

    #[test]
    fn test_equal_documents_produce_empty_report() {
        let report = diff_documents(&template(), &template());
        assert!(report.is_empty());
        assert_eq!(report.to_value(), json!({}));
    }

    #[test]
    fn test_added_leaf_key() {
        let mut target = template();
        target["Description"] = json!("web tier");

        let report = diff_documents(&template(), &target);
        assert_eq!(report.len(), 1);
        assert_eq!(report.get("Description"), Some(&Change::Added));
    }

    #[test]
    fn test_removed_leaf_key() {
        let mut target = template();
        target.as_object_mut().unwrap().remove("AWSTemplateFormatVersion");

        let report = diff_documents(&template(), &target);
        assert_eq!(report.len(), 1);
        assert_eq!(report.get("AWSTemplateFormatVersion"), Some(&Change::Removed));
    }

    #[test]
    fn test_nested_change_is_reported_under_outer_key() {
        let mut target = template();
        target["Resources"]["Bucket"]["Properties"]["BucketName"] = json!("audit");

        let report = diff_documents(&template(), &target);
        assert_eq!(report.len(), 1);

        let Some(Change::Nested(resources)) = report.get("Resources") else {
            panic!("expected nested report for Resources");
        };
        let Some(Change::Nested(bucket)) = resources.get("Bucket") else {
            panic!("expected nested report for Bucket");
        };
        let Some(Change::Nested(properties)) = bucket.get("Properties") else {
            panic!("expected nested report for Properties");
        };
        assert_eq!(
            properties.get("BucketName"),
            Some(&Change::Changed {
                from: json!("logs"),
                to: json!("audit"),
            })
        );
        assert_eq!(report.total_changes(), 1);
    }

    #[test]
    fn test_lists_compare_as_whole_values() {
        let mut target = template();
        target["Resources"]["Bucket"]["Properties"]["Tags"] =
            json!([{"Key": "a", "Value": "2"}]);

        let report = diff_documents(&template(), &target);
        assert_eq!(
            report.to_value(),
            json!({"Resources": {"Bucket": {"Properties": {
                "Tags": r#"Changed from [{"Key":"a","Value":"1"}] to [{"Key":"a","Value":"2"}]"#
            }}}})
        );
    }

    #[test]
    fn test_mapping_replaced_by_scalar_is_changed() {
        let current = json!({"Outputs": {"Url": {"Value": "x"}}});
        let target = json!({"Outputs": "none"});

        let report = diff_documents(&current, &target);
        assert!(matches!(report.get("Outputs"), Some(Change::Changed { .. })));
    }

    #[test]
    fn test_entries_are_sorted_by_key() {
        let current = json!({"b": 1, "d": 1});
        let target = json!({"a": 1, "b": 2, "c": 1});

        let report = diff_documents(&current, &target);
        let paths: Vec<&str> = report.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b", "c", "d"]);
        assert_eq!(
            report.to_string(),
            r#"{"a":"Added","b":"Changed from 1 to 2","c":"Added","d":"Removed"}"#
        );
    }

    #[test]
    fn test_child_diff_without_changes_renders_sentinel() {
        let mut report = ChangeReport::new();
        report.push("Resources", Change::ChildDiffWithoutChanges);

        assert_eq!(report.total_changes(), 1);
        assert_eq!(
            report.to_value(),
            json!({"Resources": "child diff but no changes found"})
        );
    }

    #[test]
    fn test_non_mapping_documents() {
        assert!(diff_documents(&json!([1, 2]), &json!([1, 2])).is_empty());

        let report = diff_documents(&json!([1]), &json!([2]));
        assert_eq!(report.len(), 1);
        assert_eq!(report.entries()[0].path, "");
    }
}
