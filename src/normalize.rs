use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::table::Table;

/// Separator placed between parent and child keys of nested objects.
pub const KEY_SEPARATOR: &str = ".";

// Rentman embeds references as resource paths ("/project/123").
static PATH_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\w+/").unwrap());

/// Flattens records into a table and strips resource path prefixes from
/// string values.
///
/// Nested objects become dotted columns (`{"a": {"b": 1}}` → `a.b`); arrays
/// are kept as values. A record that is not an object becomes a single
/// `value` column.
pub fn normalize(records: &[Value]) -> Table {
    Table::from_pairs(records.iter().map(|record| {
        let mut row = Vec::new();
        match record {
            Value::Object(map) => {
                for (key, value) in map {
                    flatten_into(key.clone(), value, &mut row);
                }
            }
            other => row.push(("value".to_string(), strip_prefixes(other))),
        }
        row
    }))
}

fn flatten_into(prefix: String, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(format!("{}{}{}", prefix, KEY_SEPARATOR, key), child, out);
            }
        }
        other => out.push((prefix, strip_prefixes(other))),
    }
}

fn strip_prefixes(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_path_prefix(s)),
        other => other.clone(),
    }
}

/// Removes every `/<word>/` segment, so `"/project/123"` becomes `"123"`.
pub fn strip_path_prefix(s: &str) -> String {
    PATH_PREFIX.replace_all(s, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn strips_resource_paths() {
        assert_eq!(strip_path_prefix("/project/123"), "123");
        assert_eq!(strip_path_prefix("/contactpersons/9"), "9");
        assert_eq!(strip_path_prefix("plain text"), "plain text");
        assert_eq!(strip_path_prefix("123"), "123");
    }

    #[test]
    fn flattens_nested_objects() {
        let records = vec![json!({
            "id": 1,
            "project": "/projects/77",
            "custom": {"field_1": "x", "inner": {"deep": true}},
            "tags": ["a", "b"],
        })];
        let table = normalize(&records);

        assert_eq!(
            table.columns(),
            ["id", "project", "custom.field_1", "custom.inner.deep", "tags"]
        );
        assert_eq!(table.value(0, "project"), Some(&json!("77")));
        assert_eq!(table.value(0, "custom.inner.deep"), Some(&json!(true)));
        assert_eq!(table.value(0, "tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn empty_input_has_no_columns() {
        let table = normalize(&[]);
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
    }

    #[test]
    fn empty_nested_object_produces_no_column() {
        let table = normalize(&[json!({"id": 1, "custom": {}})]);
        assert_eq!(table.columns(), ["id"]);
    }

    #[test]
    fn missing_fields_become_null() {
        let table = normalize(&[json!({"id": 1, "name": "a"}), json!({"id": 2})]);
        assert_eq!(table.value(1, "name"), Some(&Value::Null));
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let records = vec![
            json!({"id": 1, "creator": "/crew/4", "location": {"city": "Ghent"}}),
            json!({"id": 2, "creator": null}),
        ];
        assert_eq!(normalize(&records), normalize(&records));
    }

    #[test]
    fn scalar_records_use_value_column() {
        let table = normalize(&[json!("/files/3")]);
        assert_eq!(table.columns(), ["value"]);
        assert_eq!(table.value(0, "value"), Some(&json!("3")));
    }
}
