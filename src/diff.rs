use serde_json::{Map, Value};

use crate::changes::{ChangeCategory, ChangeRecord};
use crate::fields::ExtractedFields;
use crate::hash::Hash;

pub struct Differ;

impl Differ {
    const MAX_PREVIEW_PROPS: usize = 3;

    /// Field-by-field comparison of two extractions. The same routine serves
    /// both the "hash differs" path and the defensive "hash matches" recheck.
    pub fn diff_fields(old: &ExtractedFields, new: &ExtractedFields) -> Vec<ChangeRecord> {
        let mut changes = Vec::new();

        let literal_fields: [(&str, &Option<String>, &Option<String>, ChangeCategory); 5] = [
            ("Title", &old.title, &new.title, ChangeCategory::OnPage),
            (
                "Meta Description",
                &old.meta_description,
                &new.meta_description,
                ChangeCategory::OnPage,
            ),
            ("H1", &old.h1, &new.h1, ChangeCategory::OnPage),
            ("Canonical", &old.canonical, &new.canonical, ChangeCategory::Technical),
            ("Robots", &old.robots, &new.robots, ChangeCategory::Technical),
        ];

        for (label, before, after, category) in literal_fields {
            if before != after {
                changes.push(ChangeRecord::new(label, before.clone(), after.clone(), category));
            }
        }

        changes.extend(Self::diff_json_ld(old.json_ld.as_ref(), new.json_ld.as_ref()));

        changes
    }

    /// A `null` payload counts as absent on either side.
    pub fn diff_json_ld(old: Option<&Value>, new: Option<&Value>) -> Vec<ChangeRecord> {
        let old = old.filter(|v| !v.is_null());
        let new = new.filter(|v| !v.is_null());

        match (old, new) {
            (None, None) => Vec::new(),
            (None, Some(added)) => vec![Self::whole_schema_change("Added", added, false)],
            (Some(removed), None) => vec![Self::whole_schema_change("Removed", removed, true)],
            (Some(old), Some(new)) => {
                if Hash::canonicalize(old) == Hash::canonicalize(new) {
                    Vec::new()
                } else {
                    Self::diff_json_ld_structure(old, new)
                }
            }
        }
    }

    /// Positional walk over both payloads, normalized to arrays. Elements
    /// present on one side only become Added/Removed records; elements
    /// present on both are compared key by key.
    fn diff_json_ld_structure(old: &Value, new: &Value) -> Vec<ChangeRecord> {
        let old_items = Self::as_items(old);
        let new_items = Self::as_items(new);
        let mut changes = Vec::new();

        for i in 0..old_items.len().max(new_items.len()) {
            match (old_items.get(i), new_items.get(i)) {
                (Some(before), Some(after)) => {
                    changes.extend(Self::diff_schema_item(before, after));
                }
                (None, Some(after)) => {
                    changes.push(Self::whole_schema_change("Added", after, false));
                }
                (Some(before), None) => {
                    changes.push(Self::whole_schema_change("Removed", before, true));
                }
                (None, None) => {}
            }
        }

        changes
    }

    fn diff_schema_item(before: &Value, after: &Value) -> Vec<ChangeRecord> {
        let type_name = Self::schema_type(after)
            .or_else(|| Self::schema_type(before))
            .unwrap_or_else(|| "Unknown".to_owned());

        let (before_map, after_map) = match (before.as_object(), after.as_object()) {
            (Some(b), Some(a)) => (b, a),
            _ => {
                if Hash::canonicalize(before) == Hash::canonicalize(after) {
                    return Vec::new();
                }
                return vec![ChangeRecord::new(
                    format!("Schema: {}", type_name),
                    Some(Self::pretty(before)),
                    Some(Self::pretty(after)),
                    ChangeCategory::Schema,
                )];
            }
        };

        let mut changes = Vec::new();
        for key in Self::union_keys(before_map, after_map) {
            let old_value = before_map.get(key);
            let new_value = after_map.get(key);

            let differs = match (old_value, new_value) {
                (Some(o), Some(n)) => Hash::canonicalize(o) != Hash::canonicalize(n),
                (None, None) => false,
                _ => true,
            };
            if !differs {
                continue;
            }

            changes.push(ChangeRecord::new(
                format!("Schema: {} - {}", type_name, Self::humanize_key(key)),
                old_value.and_then(Self::format_value),
                new_value.and_then(Self::format_value),
                ChangeCategory::Schema,
            ));
        }

        changes
    }

    /// Old keys in their order, then keys only the new side has. `@context`
    /// is never compared.
    fn union_keys<'a>(before: &'a Map<String, Value>, after: &'a Map<String, Value>) -> Vec<&'a str> {
        let mut keys: Vec<&str> = before.keys().map(String::as_str).collect();
        for key in after.keys() {
            if !before.contains_key(key) {
                keys.push(key.as_str());
            }
        }
        keys.retain(|k| *k != "@context");
        keys
    }

    fn whole_schema_change(action: &str, value: &Value, removed: bool) -> ChangeRecord {
        let field = match Self::schema_type(value) {
            Some(type_name) => format!("Schema: {} ({})", action, type_name),
            None => format!("Schema: {}", action),
        };
        let pretty = Some(Self::pretty(value));
        let (old, new) = if removed { (pretty, None) } else { (None, pretty) };

        ChangeRecord::new(field, old, new, ChangeCategory::Schema)
    }

    fn as_items(value: &Value) -> Vec<&Value> {
        match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// `@type` of an object (string or list of strings). For an array the
    /// distinct types of its elements, in order.
    pub fn schema_type(value: &Value) -> Option<String> {
        match value {
            Value::Object(map) => match map.get("@type")? {
                Value::String(s) => Some(s.clone()),
                Value::Array(types) => {
                    let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                    if names.is_empty() {
                        None
                    } else {
                        Some(names.join(", "))
                    }
                }
                _ => None,
            },
            Value::Array(items) => {
                let mut names: Vec<String> = Vec::new();
                for name in items.iter().filter_map(Self::schema_type) {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
                if names.is_empty() {
                    None
                } else {
                    Some(names.join(", "))
                }
            }
            _ => None,
        }
    }

    /// `datePublished` → `Date Published`, `@id` → `Id`, `price_currency` → `Price Currency`.
    pub fn humanize_key(key: &str) -> String {
        let key = key.trim_start_matches('@');
        let mut words: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut prev: Option<char> = None;

        for c in key.chars() {
            if c == '_' || c == '-' || c == ' ' {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                prev = None;
                continue;
            }
            let boundary = c.is_uppercase()
                && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(c);
            prev = Some(c);
        }
        if !current.is_empty() {
            words.push(current);
        }

        words
            .iter()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Human-oriented rendering of a JSON-LD value. `null` renders as absent.
    pub fn format_value(value: &Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|item| Self::format_value(item).unwrap_or_else(|| "null".to_owned()))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Value::Object(map) => {
                let mut parts: Vec<String> = map
                    .iter()
                    .take(Self::MAX_PREVIEW_PROPS)
                    .map(|(k, v)| {
                        let rendered = Self::format_value(v).unwrap_or_else(|| "null".to_owned());
                        format!("{}: {}", k, rendered)
                    })
                    .collect();
                if map.len() > Self::MAX_PREVIEW_PROPS {
                    parts.push("...".to_owned());
                }
                Some(format!("{{{}}}", parts.join(", ")))
            }
        }
    }

    fn pretty(value: &Value) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    }
}
