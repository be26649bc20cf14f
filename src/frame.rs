//! In-memory column store threaded through every stage.
//!
//! A [`Table`] owns its columns; stages borrow it and build a new table rather
//! than editing the caller's copy. All columns always have the same length.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    data::Value,
    error::ConfigError,
    schema::ColumnType,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub datatype: ColumnType,
    pub values: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: ColumnType, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            datatype,
            values,
        }
    }

    /// Builds a numeric column, keeping integer storage when every value is whole.
    pub fn numeric(name: impl Into<String>, prefer_integer: bool, values: Vec<Option<f64>>) -> Self {
        let whole = values
            .iter()
            .flatten()
            .all(|v| v.fract() == 0.0 && v.abs() < 9.0e15);
        let (datatype, cells) = if prefer_integer && whole {
            (
                ColumnType::Integer,
                values
                    .into_iter()
                    .map(|v| v.map(|f| Value::Integer(f as i64)))
                    .collect(),
            )
        } else {
            (
                ColumnType::Float,
                values
                    .into_iter()
                    .map(|v| v.filter(|f| !f.is_nan()).map(Value::Float))
                    .collect(),
            )
        };
        Self::new(name, datatype, cells)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Numeric view of the column; non-numeric cells read as missing.
    pub fn as_f64(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|v| v.as_ref().and_then(Value::as_f64))
            .collect()
    }

    fn take(&self, indices: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            datatype: self.datatype,
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }
}

/// Row and column counts, reported before and after every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shape {
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ConfigError::DuplicateColumn(column.name.clone()));
            }
        }
        if let Some(first) = columns.first()
            && let Some(bad) = columns.iter().find(|c| c.len() != first.len())
        {
            return Err(ConfigError::RaggedColumns {
                column: bad.name.clone(),
                expected: first.len(),
                found: bad.len(),
            });
        }
        Ok(Self { columns })
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> Shape {
        Shape {
            rows: self.row_count(),
            columns: self.column_count(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|idx| &self.columns[idx])
    }

    pub fn require(&self, name: &str) -> Result<&Column, ConfigError> {
        self.column(name)
            .ok_or_else(|| ConfigError::UnknownColumn(name.to_string()))
    }

    pub fn row(&self, index: usize) -> Vec<Option<Value>> {
        self.columns
            .iter()
            .map(|c| c.values.get(index).cloned().flatten())
            .collect()
    }

    /// Projection onto `names`, in the order given.
    pub fn select(&self, names: &[String]) -> Result<Self, ConfigError> {
        let columns = names
            .iter()
            .map(|name| self.require(name).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(columns)
    }

    /// Keeps the rows at `indices`, in that order.
    pub fn take_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
        }
    }

    /// Keeps the rows whose mask entry is `true`; order is preserved.
    pub fn filter_rows(&self, mask: &[bool]) -> Self {
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(idx, keep)| keep.then_some(idx))
            .collect();
        self.take_rows(&indices)
    }

    /// Replaces columns by name, keeping their positions.
    pub(crate) fn with_replaced(&self, replacements: Vec<Column>) -> Self {
        let mut columns = self.columns.clone();
        for replacement in replacements {
            if let Some(slot) = columns.iter_mut().find(|c| c.name == replacement.name) {
                *slot = replacement;
            }
        }
        Self { columns }
    }

    /// Replaces column `name` with `expanded` at the same position.
    pub(crate) fn with_expanded(&self, name: &str, expanded: Vec<Column>) -> Self {
        let mut columns = Vec::with_capacity(self.columns.len() + expanded.len());
        let mut pending = Some(expanded);
        for column in &self.columns {
            if column.name == name {
                if let Some(parts) = pending.take() {
                    columns.extend(parts);
                }
            } else {
                columns.push(column.clone());
            }
        }
        Self { columns }
    }

    pub fn missing_total(&self) -> usize {
        self.columns.iter().map(Column::missing_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(name: &str, values: &[i64]) -> Column {
        Column::new(
            name,
            ColumnType::Integer,
            values.iter().map(|v| Some(Value::Integer(*v))).collect(),
        )
    }

    #[test]
    fn new_rejects_duplicate_and_ragged_columns() {
        let dup = Table::new(vec![ints("a", &[1]), ints("a", &[2])]);
        assert!(matches!(dup, Err(ConfigError::DuplicateColumn(name)) if name == "a"));

        let ragged = Table::new(vec![ints("a", &[1, 2]), ints("b", &[1])]);
        assert!(matches!(ragged, Err(ConfigError::RaggedColumns { .. })));
    }

    #[test]
    fn filter_rows_preserves_order() {
        let table = Table::new(vec![ints("a", &[1, 2, 3, 4])]).unwrap();
        let filtered = table.filter_rows(&[true, false, true, true]);
        assert_eq!(
            filtered.column("a").unwrap().values,
            vec![
                Some(Value::Integer(1)),
                Some(Value::Integer(3)),
                Some(Value::Integer(4))
            ]
        );
    }

    #[test]
    fn numeric_column_keeps_integers_when_whole() {
        let col = Column::numeric("x", true, vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(col.datatype, ColumnType::Integer);
        let col = Column::numeric("x", true, vec![Some(1.5), None]);
        assert_eq!(col.datatype, ColumnType::Float);
    }

    #[test]
    fn with_expanded_inserts_in_place() {
        let table = Table::new(vec![ints("a", &[1]), ints("b", &[2]), ints("c", &[3])]).unwrap();
        let expanded = table.with_expanded("b", vec![ints("b_1", &[0]), ints("b_2", &[1])]);
        assert_eq!(expanded.column_names(), vec!["a", "b_1", "b_2", "c"]);
    }
}
