use std::{fmt, str::FromStr};

use log::{debug, info};

use crate::{
    classify::ColumnPartition,
    error::{ComputationFailure, ConfigError, StageError},
    frame::{Column, Table},
    stage::{Notice, StageName, StageOutcome},
    stats,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMethod {
    Standard,
    MinMax,
    Robust,
    MaxAbs,
}

impl ScaleMethod {
    pub const SUPPORTED: &'static [&'static str] = &["standard", "minmax", "robust", "maxabs"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleMethod::Standard => "standard",
            ScaleMethod::MinMax => "minmax",
            ScaleMethod::Robust => "robust",
            ScaleMethod::MaxAbs => "maxabs",
        }
    }
}

impl fmt::Display for ScaleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleMethod {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();
        match normalized.as_str() {
            "standard" | "zscore" => Ok(ScaleMethod::Standard),
            "minmax" => Ok(ScaleMethod::MinMax),
            "robust" => Ok(ScaleMethod::Robust),
            "maxabs" => Ok(ScaleMethod::MaxAbs),
            _ => Err(ConfigError::UnsupportedMethod {
                stage: StageName::Scale,
                name: value.to_string(),
                supported: Self::SUPPORTED.join(", "),
            }),
        }
    }
}

/// Fitted `(x - center) / scale` transform for one column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scaler {
    center: f64,
    scale: f64,
}

impl Scaler {
    fn fit(method: ScaleMethod, values: &[f64]) -> Option<Self> {
        let (center, spread) = match method {
            ScaleMethod::Standard => (stats::mean(values)?, stats::population_std(values)?),
            ScaleMethod::MinMax => {
                let (lo, hi) = stats::min_max(values)?;
                (lo, hi - lo)
            }
            ScaleMethod::Robust => {
                let q1 = stats::quantile(values, 0.25)?;
                let q3 = stats::quantile(values, 0.75)?;
                (stats::median(values)?, q3 - q1)
            }
            ScaleMethod::MaxAbs => {
                let (lo, hi) = stats::min_max(values)?;
                (0.0, lo.abs().max(hi.abs()))
            }
        };
        let scale = if spread == 0.0 || !spread.is_finite() {
            1.0
        } else {
            spread
        };
        Some(Self { center, scale })
    }

    fn apply(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }
}

/// Rescales the selected numeric columns. Output columns are float; missing
/// cells stay missing.
pub fn scale(
    table: &Table,
    columns: &[String],
    method: ScaleMethod,
) -> Result<StageOutcome, StageError> {
    let partition = ColumnPartition::of(table, columns)?;
    if partition.numeric.is_empty() {
        return Ok(StageOutcome::Skipped(Notice::NoMatchingColumns {
            stage: StageName::Scale,
            expected: "numeric",
        }));
    }
    let mut replacements = Vec::with_capacity(partition.numeric.len());
    for name in &partition.numeric {
        let values = table.require(name)?.as_f64();
        let scaler = Scaler::fit(method, &stats::observed(&values)).ok_or_else(|| {
            StageError::computation(StageName::Scale, name, ComputationFailure::NoObservedValues)
        })?;
        debug!(
            "Column '{name}': center {} scale {}",
            scaler.center, scaler.scale
        );
        let scaled = values.into_iter().map(|v| v.map(|x| scaler.apply(x))).collect();
        replacements.push(Column::numeric(name.clone(), false, scaled));
    }
    let count = replacements.len();
    info!("Scaled {count} column(s) using '{method}'");
    Ok(StageOutcome::applied(
        table.with_replaced(replacements),
        format!("Scaled {count} column(s) with {method}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, schema::ColumnType};

    fn table(values: &[Option<i64>]) -> Table {
        Table::new(vec![Column::new(
            "x",
            ColumnType::Integer,
            values.iter().map(|v| v.map(Value::Integer)).collect(),
        )])
        .unwrap()
    }

    fn scaled(values: &[Option<i64>], method: ScaleMethod) -> Vec<Option<f64>> {
        let outcome = scale(&table(values), &["x".to_string()], method).unwrap();
        outcome.table().unwrap().column("x").unwrap().as_f64()
    }

    #[test]
    fn minmax_maps_into_unit_interval() {
        let out = scaled(&[Some(2), None, Some(4), Some(6)], ScaleMethod::MinMax);
        assert_eq!(out, vec![Some(0.0), None, Some(0.5), Some(1.0)]);
    }

    #[test]
    fn standard_uses_population_std() {
        let out = scaled(&[Some(1), Some(3)], ScaleMethod::Standard);
        assert_eq!(out, vec![Some(-1.0), Some(1.0)]);
    }

    #[test]
    fn robust_and_maxabs() {
        let out = scaled(&[Some(1), Some(2), Some(3), Some(4), Some(5)], ScaleMethod::Robust);
        assert_eq!(out[2], Some(0.0));
        assert_eq!(out[4], Some(1.0));
        let out = scaled(&[Some(-4), Some(2)], ScaleMethod::MaxAbs);
        assert_eq!(out, vec![Some(-1.0), Some(0.5)]);
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let out = scaled(&[Some(7), Some(7)], ScaleMethod::MinMax);
        assert_eq!(out, vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn output_is_float_storage() {
        let outcome = scale(&table(&[Some(1), Some(2)]), &["x".to_string()], ScaleMethod::MinMax)
            .unwrap();
        let column = outcome.table().unwrap().column("x").unwrap().clone();
        assert_eq!(column.datatype, ColumnType::Float);
    }

    #[test]
    fn all_missing_column_fails() {
        let err = scale(&table(&[None, None]), &["x".to_string()], ScaleMethod::Standard)
            .unwrap_err();
        assert!(!err.is_config());
    }

    #[test]
    fn method_names_are_normalised() {
        assert_eq!("Min-Max".parse::<ScaleMethod>().unwrap(), ScaleMethod::MinMax);
        assert!("log".parse::<ScaleMethod>().is_err());
    }
}
