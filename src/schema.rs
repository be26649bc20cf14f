//! Schema model, type inference and YAML persistence.
//!
//! A [`Schema`] records the declared storage type of every column. The engine
//! never guesses types from content: kinds are derived from these declarations
//! (see [`crate::classify`]). Inference happens once, at load time, by sampling
//! raw rows and picking the narrowest type every non-placeholder value fits.
//!
//! ## Inference order
//!
//! boolean → integer → float → date → datetime → categorical → string.
//! A column is categorical when it holds at most
//! [`CATEGORICAL_MAX_DISTINCT`] distinct values and no more distinct values
//! than half of its non-empty cells.

use std::{collections::HashSet, fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::data::{parse_boolean, parse_naive_date, parse_naive_datetime};

pub const CURRENT_SCHEMA_VERSION: &str = "1.0";
pub const CATEGORICAL_MAX_DISTINCT: usize = 20;
pub const DEFAULT_SAMPLE_ROWS: usize = 2000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Categorical,
    Integer,
    Float,
    Boolean,
    Date,
    #[serde(alias = "timestamp")]
    DateTime,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Categorical => "categorical",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "string",
            "categorical",
            "integer",
            "float",
            "boolean",
            "date",
            "datetime",
        ]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "text" | "object" => Ok(ColumnType::String),
            "categorical" | "category" => Ok(ColumnType::Categorical),
            "integer" | "int" => Ok(ColumnType::Integer),
            "float" | "double" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "datetime" | "date-time" | "timestamp" => Ok(ColumnType::DateTime),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub datatype: ColumnType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default = "Schema::default_has_headers")]
    pub has_headers: bool,
}

impl Schema {
    pub fn from_headers(headers: &[String]) -> Self {
        let columns = headers
            .iter()
            .map(|name| ColumnMeta {
                name: name.clone(),
                datatype: ColumnType::String,
            })
            .collect();
        Schema {
            columns,
            schema_version: None,
            has_headers: true,
        }
    }

    pub const fn default_has_headers() -> bool {
        true
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn validate_headers(&self, headers: &[String]) -> Result<()> {
        if headers.len() != self.columns.len() {
            return Err(anyhow!(
                "Header length mismatch: schema expects {} column(s) but file contains {}",
                self.columns.len(),
                headers.len()
            ));
        }
        for (idx, column) in self.columns.iter().enumerate() {
            let name = headers.get(idx).map(|s| s.trim()).unwrap_or_default();
            if name != column.name {
                return Err(anyhow!(
                    "Header mismatch at position {}: expected '{}' but found '{}'",
                    idx + 1,
                    column.name,
                    name
                ));
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut schema = self.clone();
        if schema.schema_version.is_none() {
            schema.schema_version = Some(CURRENT_SCHEMA_VERSION.to_string());
        }
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, &schema).context("Writing schema YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema: Schema = serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
        let mut seen = HashSet::new();
        for column in &schema.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(anyhow!("Schema declares column '{}' twice", column.name));
            }
        }
        Ok(schema)
    }
}

/// Tokens that stand for "no value" in exported spreadsheets.
pub fn is_placeholder_token(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    matches!(
        lowered.as_str(),
        "na" | "n/a" | "n.a." | "null" | "none" | "nan" | "missing"
    ) || (!lowered.is_empty() && lowered.chars().all(|c| c == '-'))
}

#[derive(Debug, Clone, Default)]
struct TypeCandidate {
    non_empty: usize,
    boolean_matches: usize,
    integer_matches: usize,
    float_matches: usize,
    date_matches: usize,
    datetime_matches: usize,
    distinct: HashSet<String>,
    distinct_overflow: bool,
}

impl TypeCandidate {
    fn update(&mut self, value: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() || is_placeholder_token(trimmed) {
            return;
        }
        self.non_empty += 1;

        if !self.distinct_overflow {
            self.distinct.insert(trimmed.to_string());
            if self.distinct.len() > CATEGORICAL_MAX_DISTINCT {
                self.distinct_overflow = true;
                self.distinct.clear();
            }
        }

        if parse_boolean(trimmed).is_some() {
            self.boolean_matches += 1;
        } else if trimmed.parse::<i64>().is_ok() {
            self.integer_matches += 1;
        } else if trimmed.parse::<f64>().is_ok_and(|f| f.is_finite()) {
            self.float_matches += 1;
        } else if parse_naive_date(trimmed).is_ok() {
            self.date_matches += 1;
        } else if parse_naive_datetime(trimmed).is_ok() {
            self.datetime_matches += 1;
        }
    }

    fn decide(&self) -> ColumnType {
        let total = self.non_empty;
        if total == 0 {
            return ColumnType::String;
        }
        if self.boolean_matches == total {
            ColumnType::Boolean
        } else if self.integer_matches == total {
            ColumnType::Integer
        } else if self.integer_matches + self.float_matches == total {
            ColumnType::Float
        } else if self.date_matches == total {
            ColumnType::Date
        } else if self.date_matches + self.datetime_matches == total {
            ColumnType::DateTime
        } else if !self.distinct_overflow && self.distinct.len() * 2 <= total {
            ColumnType::Categorical
        } else {
            ColumnType::String
        }
    }
}

/// Infers declared types from raw rows. `sample_rows == 0` scans every row.
pub fn infer_schema_from_rows<I>(headers: &[String], rows: I, sample_rows: usize) -> Schema
where
    I: IntoIterator<Item = Vec<Option<String>>>,
{
    let mut candidates = vec![TypeCandidate::default(); headers.len()];
    for (processed, row) in rows.into_iter().enumerate() {
        if sample_rows > 0 && processed >= sample_rows {
            break;
        }
        for (idx, value) in row.into_iter().enumerate().take(headers.len()) {
            if let Some(value) = value {
                candidates[idx].update(&value);
            }
        }
    }
    let columns = headers
        .iter()
        .zip(&candidates)
        .map(|(header, candidate)| ColumnMeta {
            name: header.clone(),
            datatype: candidate.decide(),
        })
        .collect();
    Schema {
        columns,
        schema_version: None,
        has_headers: true,
    }
}
