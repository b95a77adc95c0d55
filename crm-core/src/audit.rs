//! Field-level change detection for the audit log

use serde::Serialize;
use serde_json::{Map, Value};

/// Fields that change on every write and are never audited.
const IGNORED_FIELDS: &[&str] = &["created_at", "updated_at"];

/// One changed top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Serialize an entity into a JSON object for diffing.
/// Non-object serializations yield an empty map.
pub fn to_object<T: Serialize>(entity: &T) -> Map<String, Value> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Compare two serialized versions of an entity. Fields are reported in
/// sorted order; a field present on only one side is reported with `None`
/// on the other.
pub fn diff_fields<T: Serialize>(before: &T, after: &T) -> Vec<FieldChange> {
    diff_objects(&to_object(before), &to_object(after))
}

pub fn diff_objects(before: &Map<String, Value>, after: &Map<String, Value>) -> Vec<FieldChange> {
    let mut fields: Vec<&String> = before.keys().chain(after.keys()).collect();
    fields.sort();
    fields.dedup();

    fields
        .into_iter()
        .filter(|field| !IGNORED_FIELDS.contains(&field.as_str()))
        .filter_map(|field| {
            let old_value = before.get(field).filter(|v| !v.is_null()).cloned();
            let new_value = after.get(field).filter(|v| !v.is_null()).cloned();
            (old_value != new_value).then(|| FieldChange {
                field: field.clone(),
                old_value,
                new_value,
            })
        })
        .collect()
}
