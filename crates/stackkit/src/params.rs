//! Parameter drift detection

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Change of a single parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterChange {
    /// Current value, `None` when the target introduces the key
    pub from: Option<String>,
    /// Desired value
    pub to: String,
}

/// Parameter changes keyed by parameter name
pub type ParameterDelta = BTreeMap<String, ParameterChange>;

/// Compare current stack parameters with the desired ones.
///
/// Keys that only exist in `current` are not reported: the template default
/// applies to them and cannot be known here. Keys that only exist in
/// `target` are reported with `from: None`.
pub fn diff_parameters(
    current: &BTreeMap<String, String>,
    target: &BTreeMap<String, String>,
) -> ParameterDelta {
    let mut delta = ParameterDelta::new();

    for (key, from) in current {
        if let Some(to) = target.get(key)
            && to != from
        {
            delta.insert(
                key.clone(),
                ParameterChange {
                    from: Some(from.clone()),
                    to: to.clone(),
                },
            );
        }
    }

    for (key, to) in target {
        if !current.contains_key(key) {
            delta.insert(
                key.clone(),
                ParameterChange {
                    from: None,
                    to: to.clone(),
                },
            );
        }
    }

    delta
}
