//! Categorical encoders.
//!
//! Categories are the distinct display strings of a column's present values,
//! sorted lexically. Label and ordinal encoding replace the column in place;
//! one-hot and binary encoding expand it into several integer columns at the
//! original position. Missing cells encode as missing.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    str::FromStr,
};

use log::{debug, info};

use crate::{
    classify::ColumnPartition,
    data::Value,
    error::{ConfigError, StageError},
    frame::{Column, Table},
    schema::ColumnType,
    stage::{Notice, StageName, StageOutcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMethod {
    Label,
    OneHot,
    Ordinal,
    Binary,
}

impl EncodeMethod {
    pub const SUPPORTED: &'static [&'static str] = &["label", "onehot", "ordinal", "binary"];

    pub fn as_str(&self) -> &'static str {
        match self {
            EncodeMethod::Label => "label",
            EncodeMethod::OneHot => "onehot",
            EncodeMethod::Ordinal => "ordinal",
            EncodeMethod::Binary => "binary",
        }
    }
}

impl fmt::Display for EncodeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodeMethod {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();
        match normalized.as_str() {
            "label" => Ok(EncodeMethod::Label),
            "onehot" | "dummy" => Ok(EncodeMethod::OneHot),
            "ordinal" => Ok(EncodeMethod::Ordinal),
            "binary" => Ok(EncodeMethod::Binary),
            _ => Err(ConfigError::UnsupportedMethod {
                stage: StageName::Encode,
                name: value.to_string(),
                supported: Self::SUPPORTED.join(", "),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeConfig {
    pub method: EncodeMethod,
    /// Explicit category order per column for ordinal encoding.
    pub order: HashMap<String, Vec<String>>,
}

impl EncodeConfig {
    pub fn new(method: EncodeMethod) -> Self {
        Self {
            method,
            order: HashMap::new(),
        }
    }

    pub fn with_order(mut self, column: impl Into<String>, order: Vec<String>) -> Self {
        self.order.insert(column.into(), order);
        self
    }
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self::new(EncodeMethod::Label)
    }
}

fn cell_key(value: &Option<Value>) -> Option<String> {
    value.as_ref().map(Value::as_display)
}

fn categories(column: &Column) -> Vec<String> {
    column
        .values
        .iter()
        .filter_map(cell_key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn codes(column: &Column, order: &[String]) -> Result<Vec<Option<i64>>, ConfigError> {
    let lookup: HashMap<&str, i64> = order
        .iter()
        .enumerate()
        .map(|(idx, value)| (value.as_str(), idx as i64))
        .collect();
    column
        .values
        .iter()
        .map(|cell| match cell_key(cell) {
            None => Ok(None),
            Some(key) => lookup.get(key.as_str()).copied().map(Some).ok_or_else(|| {
                ConfigError::InvalidParameter {
                    parameter: "order",
                    reason: format!(
                        "value '{key}' of column '{}' is missing from the category order",
                        column.name
                    ),
                }
            }),
        })
        .collect()
}

fn integer_column(name: String, values: Vec<Option<i64>>) -> Column {
    Column::new(
        name,
        ColumnType::Integer,
        values.into_iter().map(|v| v.map(Value::Integer)).collect(),
    )
}

/// Number of bit columns needed for `k` categories.
fn bit_width(k: usize) -> usize {
    if k <= 2 {
        1
    } else {
        (usize::BITS - (k - 1).leading_zeros()) as usize
    }
}

fn one_hot(column: &Column) -> Vec<Column> {
    let categories = categories(column);
    let keys: Vec<Option<String>> = column.values.iter().map(cell_key).collect();
    categories
        .iter()
        .skip(1)
        .map(|category| {
            let indicator = keys
                .iter()
                .map(|key| key.as_ref().map(|k| i64::from(k == category)))
                .collect();
            integer_column(format!("{}_{category}", column.name), indicator)
        })
        .collect()
}

fn binary(column: &Column) -> Result<Vec<Column>, ConfigError> {
    let categories = categories(column);
    let codes = codes(column, &categories)?;
    let width = bit_width(categories.len());
    Ok((0..width)
        .map(|bit| {
            let shift = width - 1 - bit;
            let values = codes.iter().map(|code| code.map(|c| (c >> shift) & 1)).collect();
            integer_column(format!("{}_bit{bit}", column.name), values)
        })
        .collect())
}

fn check_names(working: &Table, original: &str, generated: &[Column]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for column in generated {
        let clashes = column.name != original && working.column(&column.name).is_some();
        if clashes || !seen.insert(column.name.as_str()) {
            return Err(ConfigError::NameCollision(column.name.clone()));
        }
    }
    Ok(())
}

/// Encodes the selected categorical and text columns. Either every column is
/// encoded or the input is left as it was.
pub fn encode(
    table: &Table,
    columns: &[String],
    config: &EncodeConfig,
) -> Result<StageOutcome, StageError> {
    let partition = ColumnPartition::of(table, columns)?;
    let targets = partition.string_valued(table);
    if targets.is_empty() {
        return Ok(StageOutcome::Skipped(Notice::NoMatchingColumns {
            stage: StageName::Encode,
            expected: "categorical",
        }));
    }
    let method = config.method;
    let mut working = table.clone();
    let mut added = 0usize;
    for name in &targets {
        let column = working.require(name)?.clone();
        match method {
            EncodeMethod::Label | EncodeMethod::Ordinal => {
                let order = match (method, config.order.get(name)) {
                    (EncodeMethod::Ordinal, Some(order)) => order.clone(),
                    _ => categories(&column),
                };
                let encoded = integer_column(name.clone(), codes(&column, &order)?);
                debug!("Column '{name}': {} categories", order.len());
                working = working.with_replaced(vec![encoded]);
            }
            EncodeMethod::OneHot | EncodeMethod::Binary => {
                let expanded = if method == EncodeMethod::OneHot {
                    one_hot(&column)
                } else {
                    binary(&column)?
                };
                check_names(&working, name, &expanded)?;
                debug!("Column '{name}': expanded into {} column(s)", expanded.len());
                added += expanded.len();
                working = working.with_expanded(name, expanded);
            }
        }
    }
    info!("Encoded {} column(s) using '{method}'", targets.len());
    let summary = match method {
        EncodeMethod::OneHot | EncodeMethod::Binary => format!(
            "Encoded {} column(s) with {method} into {added} column(s)",
            targets.len()
        ),
        _ => format!("Encoded {} column(s) with {method}", targets.len()),
    };
    Ok(StageOutcome::applied(working, summary))
}
