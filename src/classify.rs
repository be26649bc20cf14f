//! Column kinds derived from declared storage types.

use std::fmt;

use serde::Serialize;

use crate::{error::ConfigError, frame::Table, schema::ColumnType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Datetime,
    Text,
}

impl ColumnKind {
    pub fn of(datatype: ColumnType) -> Self {
        match datatype {
            ColumnType::Integer | ColumnType::Float => ColumnKind::Numeric,
            ColumnType::Categorical | ColumnType::Boolean => ColumnKind::Categorical,
            ColumnType::Date | ColumnType::DateTime => ColumnKind::Datetime,
            ColumnType::String => ColumnKind::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Datetime => "datetime",
            ColumnKind::Text => "text",
        }
    }

    pub fn is_string_valued(&self) -> bool {
        matches!(self, ColumnKind::Categorical | ColumnKind::Text)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed split of a column selection. Every selected column lands in exactly
/// one list; lists keep table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPartition {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub datetime: Vec<String>,
    pub text: Vec<String>,
}

impl ColumnPartition {
    /// Partitions `selection` (or every column when `selection` is empty).
    pub fn of(table: &Table, selection: &[String]) -> Result<Self, ConfigError> {
        for name in selection {
            table.require(name)?;
        }
        let mut partition = Self::default();
        for column in table.columns() {
            if !selection.is_empty() && !selection.contains(&column.name) {
                continue;
            }
            let bucket = match ColumnKind::of(column.datatype) {
                ColumnKind::Numeric => &mut partition.numeric,
                ColumnKind::Categorical => &mut partition.categorical,
                ColumnKind::Datetime => &mut partition.datetime,
                ColumnKind::Text => &mut partition.text,
            };
            bucket.push(column.name.clone());
        }
        Ok(partition)
    }

    pub fn of_kind(&self, kind: ColumnKind) -> &[String] {
        match kind {
            ColumnKind::Numeric => &self.numeric,
            ColumnKind::Categorical => &self.categorical,
            ColumnKind::Datetime => &self.datetime,
            ColumnKind::Text => &self.text,
        }
    }

    /// Categorical and text columns, in table order.
    pub fn string_valued(&self, table: &Table) -> Vec<String> {
        table
            .columns()
            .iter()
            .filter(|c| {
                [ColumnKind::Categorical, ColumnKind::Text]
                    .iter()
                    .any(|kind| self.of_kind(*kind).contains(&c.name))
            })
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Column names of `table` whose kind is `kind`.
pub fn columns_of_kind(table: &Table, kind: ColumnKind) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| ColumnKind::of(c.datatype) == kind)
        .map(|c| c.name.clone())
        .collect()
}
