use std::{
    fmt,
    hash::{Hash, Hasher},
};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

/// A single typed cell. Missing cells are represented as `Option<Value>::None`
/// by the surrounding column, never as a variant here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

// Floats are never NaN: `parse_typed_value` and the numeric writers map NaN to a
// missing cell, so equality is reflexive.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => {
                let normalized = if *f == 0.0 { 0.0f64 } else { *f };
                normalized.to_bits().hash(state);
            }
            Value::Boolean(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
            Value::DateTime(dt) => dt.hash(state),
        }
    }
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Numeric view used by the statistics helpers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Calendar date of a temporal value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" => Some(true),
        "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Result<Option<Value>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = match ty {
        ColumnType::String | ColumnType::Categorical => Value::String(value.to_string()),
        ColumnType::Integer => {
            let parsed: i64 = trimmed
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as integer"))?;
            Value::Integer(parsed)
        }
        ColumnType::Float => {
            let parsed: f64 = trimmed
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as float"))?;
            if parsed.is_nan() {
                return Ok(None);
            }
            Value::Float(parsed)
        }
        ColumnType::Boolean => match trimmed {
            "1" => Value::Boolean(true),
            "0" => Value::Boolean(false),
            other => match parse_boolean(other) {
                Some(flag) => Value::Boolean(flag),
                None => bail!("Failed to parse '{value}' as boolean"),
            },
        },
        ColumnType::Date => Value::Date(parse_naive_date(trimmed)?),
        ColumnType::DateTime => match parse_naive_datetime(trimmed) {
            Ok(parsed) => Value::DateTime(parsed),
            Err(_) => {
                let date = parse_naive_date(trimmed)
                    .with_context(|| format!("Failed to parse '{value}' as datetime"))?;
                Value::DateTime(date.and_time(chrono::NaiveTime::MIN))
            }
        },
    };
    Ok(Some(parsed))
}

/// Converts a JSON scalar into a typed cell for the declared column type.
pub fn value_from_json(value: &serde_json::Value, ty: &ColumnType) -> Result<Option<Value>> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => parse_typed_value(s, ty),
        serde_json::Value::Bool(b) => match ty {
            ColumnType::Boolean => Ok(Some(Value::Boolean(*b))),
            _ => parse_typed_value(&b.to_string(), ty),
        },
        serde_json::Value::Number(n) => parse_typed_value(&n.to_string(), ty),
        other => Err(anyhow!("Nested JSON value {other} cannot be stored in a cell")),
    }
}
