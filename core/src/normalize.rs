//! Coercion of loosely-typed build fields into their canonical form.

use serde_json::Value;

use crate::types::Build;

impl Build {
    /// Move the raw wire fields into the public ones.
    ///
    /// Raw fields are consumed as they are converted, so a second call is a
    /// no-op. Properties are folded into the map with later duplicates
    /// winning.
    pub fn normalize(&mut self) {
        if let Some(raw) = self.raw_number.take() {
            self.number = loose_string(raw);
        }
        if let Some(raw) = self.raw_default_branch.take() {
            self.default_branch = loose_bool(&raw);
        }
        if let Some(raw) = self.raw_personal.take() {
            self.personal = loose_bool(&raw);
        }
        if let Some(tags) = self.raw_tags.take() {
            self.tags = tags.tag.into_iter().map(|t| t.name).collect();
        }
        if let Some(list) = self.raw_properties.take() {
            self.properties.extend(list.into_map());
        }
        if let Some(changes) = self.raw_changes.take() {
            self.changes_href = changes.href;
        }
    }
}

fn loose_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn loose_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
