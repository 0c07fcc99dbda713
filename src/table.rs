use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::lookup::resolve_display_name;
use crate::util::value_to_plain_string;

/// Rows of flattened API records sharing one column set.
///
/// Columns are ordered by first appearance; a row that lacks a column holds
/// `null` there. Row order is the order the API returned records in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// A borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    cells: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.cells[i])
    }

    pub fn cells(&self) -> &'a [Value] {
        self.cells
    }
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from rows of `(column, value)` pairs.
    pub fn from_pairs<I, R>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (String, Value)>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut sparse: Vec<Vec<(usize, Value)>> = Vec::new();

        for row in rows {
            let mut cells = Vec::new();
            for (column, value) in row {
                let i = match index.get(&column) {
                    Some(&i) => i,
                    None => {
                        let i = columns.len();
                        index.insert(column.clone(), i);
                        columns.push(column);
                        i
                    }
                };
                cells.push((i, value));
            }
            sparse.push(cells);
        }

        let width = columns.len();
        let rows = sparse
            .into_iter()
            .map(|cells| {
                let mut dense = vec![Value::Null; width];
                for (i, value) in cells {
                    dense[i] = value;
                }
                dense
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.rows.iter().map(|cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let i = self.column_index(column)?;
        self.rows.get(row).map(|cells| &cells[i])
    }

    /// All values of `column` in row order, or `None` if the column does not exist.
    pub fn column(&self, column: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let i = self.column_index(column)?;
        Some(self.rows.iter().map(move |cells| &cells[i]))
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Appends `other`'s rows, widening both sides to the union of columns.
    pub fn append(&mut self, other: Table) {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }

        let mut mapping = Vec::with_capacity(other.columns.len());
        for column in other.columns {
            match self.column_index(&column) {
                Some(i) => mapping.push(i),
                None => {
                    mapping.push(self.columns.len());
                    self.columns.push(column);
                }
            }
        }

        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, Value::Null);
        }
        for cells in other.rows {
            let mut dense = vec![Value::Null; width];
            for (value, &i) in cells.into_iter().zip(&mapping) {
                dense[i] = value;
            }
            self.rows.push(dense);
        }
    }

    /// Concatenates tables in order; the result's rows are renumbered from zero.
    pub fn concat<I>(tables: I) -> Table
    where
        I: IntoIterator<Item = Table>,
    {
        let mut out = Table::new();
        for table in tables {
            out.append(table);
        }
        out
    }

    /// Distinct non-null values of `column`, in first-seen order.
    pub fn unique_values(&self, column: &str) -> Vec<Value> {
        let Some(values) = self.column(column) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        values
            .filter(|v| !v.is_null())
            .filter(|v| seen.insert(v.to_string()))
            .cloned()
            .collect()
    }

    /// Distinct values of `column` joined with commas, ready for
    /// [`Client::batch_fetch_and_normalize`](crate::Client::batch_fetch_and_normalize).
    pub fn ids_csv(&self, column: &str) -> String {
        self.unique_values(column)
            .iter()
            .filter_map(value_to_plain_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Rewrites every cell of `column`. Returns `false` if the column is absent.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> bool
    where
        F: FnMut(&Value) -> Value,
    {
        let Some(i) = self.column_index(column) else {
            return false;
        };
        for row in &mut self.rows {
            row[i] = f(&row[i]);
        }
        true
    }

    /// Replaces ids in `column` with the matching `display_column` value from
    /// `lookup`. Ids that cannot be resolved become `null`.
    pub fn resolve_column(
        &mut self,
        column: &str,
        lookup: &Table,
        display_column: &str,
        key_column: &str,
    ) -> bool {
        self.map_column(column, |id| {
            resolve_display_name(id, lookup, display_column, key_column).unwrap_or(Value::Null)
        })
    }

    /// Drops the UTC offset from RFC 3339 timestamps, keeping wall-clock time.
    ///
    /// Returns the number of cells rewritten.
    pub fn strip_timezones(&mut self) -> usize {
        let mut changed = 0;
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                let Value::String(s) = cell else { continue };
                if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
                    *cell = Value::String(
                        dt.naive_local()
                            .format("%Y-%m-%dT%H:%M:%S%.f")
                            .to_string(),
                    );
                    changed += 1;
                }
            }
        }
        changed
    }

    /// One JSON object per row, every column present.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|cells| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(cells.iter().cloned())
                    .collect()
            })
            .collect()
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        let records: Vec<Value> = self.to_records().into_iter().map(Value::Object).collect();
        serde_json::to_string_pretty(&records)
    }
}
