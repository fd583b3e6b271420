use serde_json::Value;
use std::collections::BTreeSet;

const PREFIX: &str = "${trialParameters.";

/// The placeholder token the service substitutes for a trial parameter.
pub fn placeholder(trial_parameter: &str) -> String {
    format!("{}{}}}", PREFIX, trial_parameter)
}

/// All trial parameter names referenced as `${trialParameters.<name>}`
/// anywhere in the string values of `manifest`.
pub fn placeholders(manifest: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect(manifest, &mut found);
    found
}

fn collect(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => scan(s, found),
        Value::Array(items) => items.iter().for_each(|item| collect(item, found)),
        Value::Object(map) => map.values().for_each(|item| collect(item, found)),
        _ => {}
    }
}

fn scan(mut rest: &str, found: &mut BTreeSet<String>) {
    while let Some(start) = rest.find(PREFIX) {
        let after = &rest[start + PREFIX.len()..];
        match after.find('}') {
            Some(end) => {
                found.insert(after[..end].to_string());
                rest = &after[end + 1..];
            }
            // unterminated, the service would not substitute it either
            None => break,
        }
    }
}
