use serde_json::Value;

use crate::table::Table;

pub const DEFAULT_DISPLAY_COLUMN: &str = "displayname";
pub const DEFAULT_KEY_COLUMN: &str = "id";

/// A lookup key after type coercion.
///
/// Collection rows carry numeric `id`s while references arrive as strings
/// once their path prefix is stripped (`"/crew/5"` becomes `"5"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKey {
    Int(i64),
    Text(String),
}

impl ItemKey {
    /// Parses an id cell. Digit-only strings become integers; `null`, floats,
    /// booleans and containers are not usable as keys.
    pub fn parse(id: &Value) -> Option<Self> {
        match id {
            Value::Number(n) => n.as_i64().map(ItemKey::Int),
            Value::String(s) => Some(Self::from_text(s)),
            _ => None,
        }
    }

    pub fn from_text(s: &str) -> Self {
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = s.parse::<i64>() {
                return ItemKey::Int(n);
            }
        }
        ItemKey::Text(s.to_string())
    }

    fn matches(&self, cell: &Value) -> bool {
        match (self, cell) {
            (ItemKey::Int(k), Value::Number(n)) => n.as_i64() == Some(*k),
            (ItemKey::Text(k), Value::String(s)) => k == s,
            _ => false,
        }
    }
}

impl From<i64> for ItemKey {
    fn from(n: i64) -> Self {
        ItemKey::Int(n)
    }
}

impl From<&str> for ItemKey {
    fn from(s: &str) -> Self {
        ItemKey::from_text(s)
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKey::Int(n) => write!(f, "{}", n),
            ItemKey::Text(s) => f.write_str(s),
        }
    }
}

/// Outcome of a display-name lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Value),
    /// No row has this key.
    Missing(ItemKey),
    /// The table lacks the key or display column.
    NoColumn(String),
    /// The id could not be turned into a key.
    InvalidKey,
}

impl Lookup {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }
}

/// Finds the first row whose `key_column` equals `key` and returns its
/// `display_column` cell.
pub fn lookup_display_name(
    key: &ItemKey,
    table: &Table,
    display_column: &str,
    key_column: &str,
) -> Lookup {
    let Some(mut keys) = table.column(key_column) else {
        return Lookup::NoColumn(key_column.to_string());
    };
    if !table.has_column(display_column) {
        return Lookup::NoColumn(display_column.to_string());
    }

    match keys.position(|cell| key.matches(cell)) {
        Some(row) => match table.value(row, display_column) {
            Some(v) => Lookup::Found(v.clone()),
            None => Lookup::NoColumn(display_column.to_string()),
        },
        None => {
            tracing::debug!(
                "ID [{}] not found in table for field={} sourcefield={}",
                key,
                display_column,
                key_column
            );
            Lookup::Missing(key.clone())
        }
    }
}

/// Resolves `id` to its display value, or `None` when it cannot be found.
pub fn resolve_display_name(
    id: &Value,
    table: &Table,
    display_column: &str,
    key_column: &str,
) -> Option<Value> {
    let key = ItemKey::parse(id)?;
    lookup_display_name(&key, table, display_column, key_column).into_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn crew() -> Table {
        Table::from_pairs(vec![
            vec![
                ("id".to_string(), json!(42)),
                ("displayname".to_string(), json!("Alice")),
            ],
            vec![
                ("id".to_string(), json!(43)),
                ("displayname".to_string(), json!("Bob")),
            ],
            vec![
                ("id".to_string(), json!(42)),
                ("displayname".to_string(), json!("Alice (duplicate)")),
            ],
        ])
    }

    #[test]
    fn numeric_string_matches_integer_key() {
        let table = crew();
        assert_eq!(
            resolve_display_name(&json!("42"), &table, DEFAULT_DISPLAY_COLUMN, DEFAULT_KEY_COLUMN),
            Some(json!("Alice"))
        );
        assert_eq!(
            resolve_display_name(&json!(43), &table, DEFAULT_DISPLAY_COLUMN, DEFAULT_KEY_COLUMN),
            Some(json!("Bob"))
        );
    }

    #[test]
    fn absent_id_is_reported_as_missing() {
        let table = crew();
        assert_eq!(
            lookup_display_name(&ItemKey::from(99), &table, "displayname", "id"),
            Lookup::Missing(ItemKey::Int(99))
        );
        assert_eq!(
            resolve_display_name(&json!(99), &table, "displayname", "id"),
            None
        );
    }

    #[test]
    fn unusable_ids_yield_none() {
        let table = crew();
        for id in [json!(null), json!(4.5), json!(true), json!([42]), json!({"id": 42})] {
            assert_eq!(resolve_display_name(&id, &table, "displayname", "id"), None);
        }
        assert_eq!(ItemKey::parse(&json!(null)), None);
    }

    #[test]
    fn text_keys_only_match_strings() {
        let table = Table::from_pairs(vec![vec![
            ("code".to_string(), json!("A-1")),
            ("name".to_string(), json!("Stage")),
        ]]);
        assert_eq!(
            lookup_display_name(&ItemKey::from("A-1"), &table, "name", "code"),
            Lookup::Found(json!("Stage"))
        );
        assert_eq!(ItemKey::from("-5"), ItemKey::Text("-5".to_string()));
    }

    #[test]
    fn missing_columns() {
        let table = crew();
        assert_eq!(
            lookup_display_name(&ItemKey::Int(42), &table, "displayname", "uuid"),
            Lookup::NoColumn("uuid".to_string())
        );
        assert_eq!(
            lookup_display_name(&ItemKey::Int(42), &table, "label", "id"),
            Lookup::NoColumn("label".to_string())
        );
        assert_eq!(
            resolve_display_name(&json!(42), &Table::new(), "displayname", "id"),
            None
        );
    }

    #[test]
    fn key_display() {
        assert_eq!(ItemKey::Int(7).to_string(), "7");
        assert_eq!(ItemKey::Text("x".into()).to_string(), "x");
    }
}
