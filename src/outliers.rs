use std::{fmt, str::FromStr};

use log::{debug, info};

use crate::{
    classify::ColumnPartition,
    error::{ComputationFailure, ConfigError, StageError},
    frame::Table,
    stage::{Notice, StageName, StageOutcome},
    stats,
};

pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 3.0;
pub const DEFAULT_IQR_THRESHOLD: f64 = 1.5;
pub const DEFAULT_QUANTILES: (f64, f64) = (0.05, 0.95);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierMethod {
    ZScore,
    Iqr,
    Quantile,
}

impl OutlierMethod {
    pub const SUPPORTED: &'static [&'static str] = &["zscore", "iqr", "quantile"];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutlierMethod::ZScore => "zscore",
            OutlierMethod::Iqr => "iqr",
            OutlierMethod::Quantile => "quantile",
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlierMethod {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zscore" | "z-score" | "z_score" => Ok(OutlierMethod::ZScore),
            "iqr" => Ok(OutlierMethod::Iqr),
            "quantile" | "percentile" => Ok(OutlierMethod::Quantile),
            _ => Err(ConfigError::UnsupportedMethod {
                stage: StageName::Outliers,
                name: value.to_string(),
                supported: Self::SUPPORTED.join(", "),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierConfig {
    pub method: OutlierMethod,
    /// zscore / iqr multiplier; the method default when absent.
    pub threshold: Option<f64>,
    /// Lower and upper quantile for the `quantile` method.
    pub quantiles: Option<(f64, f64)>,
}

impl OutlierConfig {
    pub fn new(method: OutlierMethod) -> Self {
        Self {
            method,
            threshold: None,
            quantiles: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    fn threshold(&self) -> Result<f64, ConfigError> {
        let threshold = self.threshold.unwrap_or(match self.method {
            OutlierMethod::ZScore => DEFAULT_ZSCORE_THRESHOLD,
            _ => DEFAULT_IQR_THRESHOLD,
        });
        if threshold.is_finite() && threshold > 0.0 {
            Ok(threshold)
        } else {
            Err(ConfigError::InvalidParameter {
                parameter: "threshold",
                reason: format!("{threshold} must be a positive number"),
            })
        }
    }

    fn quantiles(&self) -> Result<(f64, f64), ConfigError> {
        let (lower, upper) = self.quantiles.unwrap_or(DEFAULT_QUANTILES);
        if (0.0..=1.0).contains(&lower) && (0.0..=1.0).contains(&upper) && lower < upper {
            Ok((lower, upper))
        } else {
            Err(ConfigError::InvalidParameter {
                parameter: "quantiles",
                reason: format!("({lower}, {upper}) must satisfy 0 <= lower < upper <= 1"),
            })
        }
    }
}

/// Inclusive bounds a value must fall within to be kept.
fn column_bounds(
    name: &str,
    values: &[f64],
    config: &OutlierConfig,
) -> Result<Option<(f64, f64)>, StageError> {
    if values.is_empty() {
        return Ok(None);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let bounds = match config.method {
        OutlierMethod::ZScore => {
            let threshold = config.threshold()?;
            let mean = stats::mean(values).unwrap_or_default();
            let std = stats::population_std(values).unwrap_or_default();
            if std == 0.0 {
                return Err(StageError::computation(
                    StageName::Outliers,
                    name,
                    ComputationFailure::ZeroVariance,
                ));
            }
            (mean - threshold * std, mean + threshold * std)
        }
        OutlierMethod::Iqr => {
            let threshold = config.threshold()?;
            let q1 = stats::quantile_sorted(&sorted, 0.25);
            let q3 = stats::quantile_sorted(&sorted, 0.75);
            let iqr = q3 - q1;
            (q1 - threshold * iqr, q3 + threshold * iqr)
        }
        OutlierMethod::Quantile => {
            let (lower, upper) = config.quantiles()?;
            (
                stats::quantile_sorted(&sorted, lower),
                stats::quantile_sorted(&sorted, upper),
            )
        }
    };
    Ok(Some(bounds))
}

/// Drops every row in which any selected numeric column falls outside its
/// bounds. Missing cells never mark a row.
pub fn handle_outliers(
    table: &Table,
    columns: &[String],
    config: &OutlierConfig,
) -> Result<StageOutcome, StageError> {
    let partition = ColumnPartition::of(table, columns)?;
    match config.method {
        OutlierMethod::Quantile => {
            config.quantiles()?;
        }
        _ => {
            config.threshold()?;
        }
    }
    if partition.numeric.is_empty() {
        return Ok(StageOutcome::Skipped(Notice::NoMatchingColumns {
            stage: StageName::Outliers,
            expected: "numeric",
        }));
    }

    let mut keep = vec![true; table.row_count()];
    for name in &partition.numeric {
        let values = table.require(name)?.as_f64();
        let Some((lower, upper)) = column_bounds(name, &stats::observed(&values), config)? else {
            continue;
        };
        debug!("Column '{name}': keeping values within [{lower}, {upper}]");
        for (slot, value) in keep.iter_mut().zip(&values) {
            if let Some(v) = value
                && (*v < lower || *v > upper)
            {
                *slot = false;
            }
        }
    }

    let removed = keep.iter().filter(|k| !**k).count();
    if removed == 0 {
        info!(
            "No outliers found by '{}' across {} column(s)",
            config.method,
            partition.numeric.len()
        );
        return Ok(StageOutcome::Skipped(Notice::NoOutliers));
    }
    let filtered = table.filter_rows(&keep);
    info!(
        "Removed {removed} outlier row(s) using '{}': {} -> {}",
        config.method,
        table.row_count(),
        filtered.row_count()
    );
    Ok(StageOutcome::applied(
        filtered,
        format!("Removed {removed} outlier row(s) with {}", config.method),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, frame::Column, schema::ColumnType};

    fn table(values: &[Option<f64>]) -> Table {
        Table::new(vec![Column::new(
            "x",
            ColumnType::Float,
            values.iter().map(|v| v.map(Value::Float)).collect(),
        )])
        .unwrap()
    }

    fn select() -> Vec<String> {
        vec!["x".to_string()]
    }

    #[test]
    fn zscore_drops_extreme_rows() {
        let mut values: Vec<Option<f64>> = (0..20).map(|i| Some(10.0 + (i % 3) as f64)).collect();
        values.push(Some(1000.0));
        values.push(None);
        let input = table(&values);
        let outcome = handle_outliers(&input, &select(), &OutlierConfig::new(OutlierMethod::ZScore))
            .unwrap();
        let output = outcome.table().unwrap();
        assert_eq!(output.row_count(), 21);
        assert!(!output.column("x").unwrap().values.contains(&Some(Value::Float(1000.0))));
    }

    #[test]
    fn zero_variance_zscore_is_a_computation_failure() {
        let input = table(&[Some(1.0), Some(1.0)]);
        let err = handle_outliers(&input, &select(), &OutlierConfig::new(OutlierMethod::ZScore))
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::Computation {
                failure: ComputationFailure::ZeroVariance,
                ..
            }
        ));
    }

    #[test]
    fn quantile_keeps_inner_band() {
        let values: Vec<Option<f64>> = (1..=11).map(|i| Some(i as f64)).collect();
        let mut config = OutlierConfig::new(OutlierMethod::Quantile);
        config.quantiles = Some((0.1, 0.9));
        let outcome = handle_outliers(&table(&values), &select(), &config).unwrap();
        let kept = outcome.table().unwrap().column("x").unwrap().as_f64();
        assert_eq!(kept.first().copied().flatten(), Some(2.0));
        assert_eq!(kept.last().copied().flatten(), Some(10.0));
    }

    #[test]
    fn invalid_parameters_are_config_errors() {
        let input = table(&[Some(1.0)]);
        let config = OutlierConfig::new(OutlierMethod::Iqr).with_threshold(-1.0);
        assert!(handle_outliers(&input, &select(), &config).unwrap_err().is_config());
        let mut config = OutlierConfig::new(OutlierMethod::Quantile);
        config.quantiles = Some((0.9, 0.1));
        assert!(handle_outliers(&input, &select(), &config).unwrap_err().is_config());
        assert!("tukey".parse::<OutlierMethod>().is_err());
    }

    #[test]
    fn text_only_selection_is_a_notice() {
        let input = Table::new(vec![Column::new("name", ColumnType::String, vec![None])]).unwrap();
        let outcome = handle_outliers(
            &input,
            &["name".to_string()],
            &OutlierConfig::new(OutlierMethod::Iqr),
        )
        .unwrap();
        assert!(matches!(
            outcome,
            StageOutcome::Skipped(Notice::NoMatchingColumns { .. })
        ));
    }
}
