//! Missing-value imputation.
//!
//! Numeric and string-valued columns are filled independently within one call:
//! numeric columns follow [`ImputeConfig::strategy`], categorical and text
//! columns follow [`ImputeConfig::categorical_strategy`] (most frequent value
//! unless a constant fill is requested). Datetime columns are left alone.
//!
//! The neighbour and iterative strategies only consider the numeric columns of
//! the selection as coordinates and predictors.

use std::{fmt, str::FromStr};

use log::{debug, info};

use crate::{
    classify::ColumnPartition,
    data::{Value, parse_typed_value},
    error::{ComputationFailure, ConfigError, StageError},
    frame::{Column, Table},
    frequency,
    schema::ColumnType,
    stage::{Notice, StageName, StageOutcome},
    stats,
};

pub const DEFAULT_NEIGHBORS: usize = 5;
pub const DEFAULT_MAX_ROUNDS: usize = 10;
pub const DEFAULT_TOLERANCE: f64 = 1e-3;
const RIDGE_ALPHA: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeStrategy {
    Mean,
    Median,
    MostFrequent,
    Constant,
    Knn,
    Iterative,
}

impl ImputeStrategy {
    pub const SUPPORTED: &'static [&'static str] = &[
        "mean",
        "median",
        "most_frequent",
        "constant",
        "knn",
        "iterative",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImputeStrategy::Mean => "mean",
            ImputeStrategy::Median => "median",
            ImputeStrategy::MostFrequent => "most_frequent",
            ImputeStrategy::Constant => "constant",
            ImputeStrategy::Knn => "knn",
            ImputeStrategy::Iterative => "iterative",
        }
    }
}

impl fmt::Display for ImputeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImputeStrategy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "mean" => Ok(ImputeStrategy::Mean),
            "median" => Ok(ImputeStrategy::Median),
            "most_frequent" | "mode" => Ok(ImputeStrategy::MostFrequent),
            "constant" => Ok(ImputeStrategy::Constant),
            "knn" => Ok(ImputeStrategy::Knn),
            "iterative" => Ok(ImputeStrategy::Iterative),
            _ => Err(ConfigError::UnsupportedMethod {
                stage: StageName::Impute,
                name: value.to_string(),
                supported: Self::SUPPORTED.join(", "),
            }),
        }
    }
}

/// Strategy for categorical and text columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalStrategy {
    MostFrequent,
    Constant,
}

impl FromStr for CategoricalStrategy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "most_frequent" | "mode" => Ok(CategoricalStrategy::MostFrequent),
            "constant" => Ok(CategoricalStrategy::Constant),
            _ => Err(ConfigError::UnsupportedMethod {
                stage: StageName::Impute,
                name: value.to_string(),
                supported: "most_frequent, constant".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImputeConfig {
    pub strategy: ImputeStrategy,
    /// Overrides the categorical strategy implied by `strategy`.
    pub categorical_strategy: Option<CategoricalStrategy>,
    pub fill_value: Option<String>,
    pub neighbors: usize,
    pub max_rounds: usize,
    pub tolerance: f64,
}

impl Default for ImputeConfig {
    fn default() -> Self {
        Self::new(ImputeStrategy::Mean)
    }
}

impl ImputeConfig {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            categorical_strategy: None,
            fill_value: None,
            neighbors: DEFAULT_NEIGHBORS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_fill_value(mut self, fill_value: impl Into<String>) -> Self {
        self.fill_value = Some(fill_value.into());
        self
    }

    pub fn effective_categorical_strategy(&self) -> CategoricalStrategy {
        self.categorical_strategy.unwrap_or(match self.strategy {
            ImputeStrategy::Constant => CategoricalStrategy::Constant,
            _ => CategoricalStrategy::MostFrequent,
        })
    }

    fn fill_literal(&self, strategy: &str) -> Result<&str, ConfigError> {
        self.fill_value
            .as_deref()
            .ok_or_else(|| ConfigError::MissingFillValue {
                stage: StageName::Impute,
                strategy: strategy.to_string(),
            })
    }

    fn validate(&self, has_numeric: bool, has_text: bool) -> Result<Option<f64>, ConfigError> {
        if self.neighbors == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "neighbors",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "max_rounds",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "tolerance",
                reason: format!("{} is not a non-negative number", self.tolerance),
            });
        }
        if has_text && self.effective_categorical_strategy() == CategoricalStrategy::Constant {
            self.fill_literal("constant")?;
        }
        if has_numeric && self.strategy == ImputeStrategy::Constant {
            let literal = self.fill_literal(self.strategy.as_str())?;
            let number = literal
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ConfigError::InvalidParameter {
                    parameter: "fill_value",
                    reason: format!("'{literal}' is not a number for numeric columns"),
                })?;
            return Ok(Some(number));
        }
        Ok(None)
    }
}

/// Fills missing cells of the selected numeric, categorical and text columns.
pub fn impute(
    table: &Table,
    columns: &[String],
    config: &ImputeConfig,
) -> Result<StageOutcome, StageError> {
    let partition = ColumnPartition::of(table, columns)?;
    let numeric = partition.numeric.clone();
    let text = partition.string_valued(table);
    if numeric.is_empty() && text.is_empty() {
        return Ok(StageOutcome::Skipped(Notice::NoMatchingColumns {
            stage: StageName::Impute,
            expected: "numeric or categorical",
        }));
    }
    let incomplete = |names: &[String]| -> Vec<String> {
        names
            .iter()
            .filter(|name| table.column(name).is_some_and(|c| c.missing_count() > 0))
            .cloned()
            .collect()
    };
    let numeric_targets = incomplete(&numeric);
    let text_targets = incomplete(&text);
    // Each kind checks the fill literal only when it has gaps to fill.
    let numeric_fill = config.validate(!numeric_targets.is_empty(), !text_targets.is_empty())?;
    if numeric_targets.is_empty() && text_targets.is_empty() {
        info!("No missing values in {} selected column(s)", numeric.len() + text.len());
        return Ok(StageOutcome::Skipped(Notice::NoMissingValues));
    }

    let mut replacements = Vec::new();
    if !numeric_targets.is_empty() {
        replacements.extend(impute_numeric(
            table,
            &numeric,
            &numeric_targets,
            config,
            numeric_fill,
        )?);
    }
    for name in &text_targets {
        let column = table.require(name)?;
        replacements.push(impute_categorical(column, config)?);
    }

    let filled: usize = replacements
        .iter()
        .filter_map(|c| table.column(&c.name))
        .map(Column::missing_count)
        .sum();
    let imputed = table.with_replaced(replacements);
    let touched = numeric_targets.len() + text_targets.len();
    info!(
        "Imputed {filled} missing cell(s) across {touched} column(s) using '{}'",
        config.strategy
    );
    Ok(StageOutcome::applied(
        imputed,
        format!(
            "Filled {filled} missing cell(s) in {touched} column(s) with {}",
            config.strategy
        ),
    ))
}

fn impute_numeric(
    table: &Table,
    numeric: &[String],
    targets: &[String],
    config: &ImputeConfig,
    constant: Option<f64>,
) -> Result<Vec<Column>, StageError> {
    let filled = match config.strategy {
        ImputeStrategy::Knn => {
            let matrix = numeric_matrix(table, numeric)?;
            knn_fill(&matrix, numeric, targets, config.neighbors)?
        }
        ImputeStrategy::Iterative => {
            let matrix = numeric_matrix(table, numeric)?;
            iterative_fill(&matrix, numeric, targets, config)?
        }
        strategy => targets
            .iter()
            .map(|name| {
                let column = table.require(name)?;
                let fill = simple_statistic(column, strategy, constant)?;
                debug!("Column '{name}': filling with {fill}");
                Ok(column
                    .as_f64()
                    .into_iter()
                    .map(|v| Some(v.unwrap_or(fill)))
                    .collect())
            })
            .collect::<Result<Vec<Vec<Option<f64>>>, StageError>>()?,
    };
    targets
        .iter()
        .zip(filled)
        .map(|(name, values)| {
            let original = table.require(name)?;
            Ok(Column::numeric(
                name.clone(),
                original.datatype == ColumnType::Integer,
                values,
            ))
        })
        .collect()
}

fn simple_statistic(
    column: &Column,
    strategy: ImputeStrategy,
    constant: Option<f64>,
) -> Result<f64, StageError> {
    let observed = stats::observed(&column.as_f64());
    let statistic = match strategy {
        ImputeStrategy::Constant => constant,
        ImputeStrategy::Median => stats::median(&observed),
        ImputeStrategy::MostFrequent => {
            frequency::most_frequent(&column.values).and_then(|v| v.as_f64())
        }
        _ => stats::mean(&observed),
    };
    statistic.ok_or_else(|| {
        StageError::computation(
            StageName::Impute,
            &column.name,
            ComputationFailure::NoObservedValues,
        )
    })
}

fn impute_categorical(column: &Column, config: &ImputeConfig) -> Result<Column, StageError> {
    let fill = match config.effective_categorical_strategy() {
        CategoricalStrategy::MostFrequent => frequency::most_frequent(&column.values)
            .ok_or_else(|| {
                StageError::computation(
                    StageName::Impute,
                    &column.name,
                    ComputationFailure::NoObservedValues,
                )
            })?,
        CategoricalStrategy::Constant => {
            let literal = config.fill_literal("constant")?;
            parse_typed_value(literal, &column.datatype)
                .ok()
                .flatten()
                .ok_or_else(|| ConfigError::InvalidParameter {
                    parameter: "fill_value",
                    reason: format!(
                        "'{literal}' is not a valid {} value for column '{}'",
                        column.datatype, column.name
                    ),
                })?
        }
    };
    debug!("Column '{}': filling with '{fill}'", column.name);
    let values = column
        .values
        .iter()
        .map(|v| Some(v.clone().unwrap_or_else(|| fill.clone())))
        .collect::<Vec<Option<Value>>>();
    Ok(Column::new(column.name.clone(), column.datatype, values))
}

/// Row-major numeric view of `names`.
fn numeric_matrix(table: &Table, names: &[String]) -> Result<Vec<Vec<Option<f64>>>, StageError> {
    let columns = names
        .iter()
        .map(|name| table.require(name).map(Column::as_f64))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((0..table.row_count())
        .map(|row| columns.iter().map(|c| c[row]).collect())
        .collect())
}

/// Euclidean distance over the coordinates present in both rows, scaled up by
/// the share of coordinates that had to be skipped.
fn nan_euclidean(left: &[Option<f64>], right: &[Option<f64>]) -> Option<f64> {
    let mut present = 0usize;
    let mut sum = 0.0;
    for (a, b) in left.iter().zip(right) {
        if let (Some(a), Some(b)) = (a, b) {
            present += 1;
            sum += (a - b).powi(2);
        }
    }
    (present > 0).then(|| (sum * left.len() as f64 / present as f64).sqrt())
}

fn knn_fill(
    matrix: &[Vec<Option<f64>>],
    names: &[String],
    targets: &[String],
    neighbors: usize,
) -> Result<Vec<Vec<Option<f64>>>, StageError> {
    let mut output = Vec::with_capacity(targets.len());
    for target in targets {
        let col = names.iter().position(|n| n == target).unwrap_or_default();
        let column: Vec<Option<f64>> = matrix.iter().map(|row| row[col]).collect();
        let fallback = stats::mean(&stats::observed(&column)).ok_or_else(|| {
            StageError::computation(StageName::Impute, target, ComputationFailure::NoObservedValues)
        })?;
        let donors: Vec<usize> = (0..matrix.len()).filter(|&r| column[r].is_some()).collect();
        let mut filled = column.clone();
        for (row, slot) in filled.iter_mut().enumerate() {
            if slot.is_some() {
                continue;
            }
            let mut ranked: Vec<(f64, usize)> = donors
                .iter()
                .filter_map(|&d| nan_euclidean(&matrix[row], &matrix[d]).map(|dist| (dist, d)))
                .collect();
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let picked: Vec<f64> = ranked
                .iter()
                .take(neighbors)
                .filter_map(|&(_, d)| column[d])
                .collect();
            *slot = Some(stats::mean(&picked).unwrap_or(fallback));
        }
        debug!("Column '{target}': filled from up to {neighbors} neighbour(s)");
        output.push(filled);
    }
    Ok(output)
}

fn iterative_fill(
    matrix: &[Vec<Option<f64>>],
    names: &[String],
    targets: &[String],
    config: &ImputeConfig,
) -> Result<Vec<Vec<Option<f64>>>, StageError> {
    let width = names.len();
    let mut means = Vec::with_capacity(width);
    for (col, name) in names.iter().enumerate() {
        let observed: Vec<f64> = matrix.iter().filter_map(|row| row[col]).collect();
        let mean = stats::mean(&observed).ok_or_else(|| {
            StageError::computation(StageName::Impute, name, ComputationFailure::NoObservedValues)
        })?;
        means.push(mean);
    }
    let mut current: Vec<Vec<f64>> = matrix
        .iter()
        .map(|row| row.iter().zip(&means).map(|(v, m)| v.unwrap_or(*m)).collect())
        .collect();
    let scale = matrix
        .iter()
        .flatten()
        .flatten()
        .fold(0.0f64, |acc, v| acc.max(v.abs()));

    let mut order: Vec<(usize, usize)> = targets
        .iter()
        .filter_map(|t| names.iter().position(|n| n == t))
        .map(|col| (matrix.iter().filter(|row| row[col].is_none()).count(), col))
        .collect();
    order.sort();

    for round in 1..=config.max_rounds {
        let mut largest_change = 0.0f64;
        for &(_, target) in &order {
            let predictors: Vec<usize> = (0..width).filter(|&c| c != target).collect();
            let (train_x, train_y): (Vec<Vec<f64>>, Vec<f64>) = matrix
                .iter()
                .enumerate()
                .filter_map(|(r, row)| {
                    row[target].map(|y| (predictors.iter().map(|&c| current[r][c]).collect(), y))
                })
                .unzip();
            let model = RidgeModel::fit(&train_x, &train_y).ok_or_else(|| {
                StageError::computation(
                    StageName::Impute,
                    &names[target],
                    ComputationFailure::SingularSystem,
                )
            })?;
            for (r, row) in matrix.iter().enumerate() {
                if row[target].is_some() {
                    continue;
                }
                let features: Vec<f64> = predictors.iter().map(|&c| current[r][c]).collect();
                let predicted = model.predict(&features);
                largest_change = largest_change.max((predicted - current[r][target]).abs());
                current[r][target] = predicted;
            }
        }
        debug!("Iterative imputation round {round}: largest change {largest_change}");
        if largest_change < config.tolerance * scale {
            break;
        }
    }

    Ok(order_back(targets, names, &current))
}

fn order_back(targets: &[String], names: &[String], current: &[Vec<f64>]) -> Vec<Vec<Option<f64>>> {
    targets
        .iter()
        .map(|t| {
            let col = names.iter().position(|n| n == t).unwrap_or_default();
            current.iter().map(|row| Some(row[col])).collect()
        })
        .collect()
}

/// Ridge regression on centred data with an unpenalised intercept.
struct RidgeModel {
    intercept: f64,
    coefficients: Vec<f64>,
    feature_means: Vec<f64>,
}

impl RidgeModel {
    fn fit(x: &[Vec<f64>], y: &[f64]) -> Option<Self> {
        let y_mean = stats::mean(y)?;
        let width = x.first().map_or(0, Vec::len);
        let feature_means: Vec<f64> = (0..width)
            .map(|c| x.iter().map(|row| row[c]).sum::<f64>() / x.len() as f64)
            .collect();
        if width == 0 {
            return Some(Self {
                intercept: y_mean,
                coefficients: Vec::new(),
                feature_means,
            });
        }
        let mut gram = vec![vec![0.0; width]; width];
        let mut moment = vec![0.0; width];
        for (row, target) in x.iter().zip(y) {
            let centred: Vec<f64> = row.iter().zip(&feature_means).map(|(v, m)| v - m).collect();
            for i in 0..width {
                moment[i] += centred[i] * (target - y_mean);
                for j in 0..width {
                    gram[i][j] += centred[i] * centred[j];
                }
            }
        }
        for (i, row) in gram.iter_mut().enumerate() {
            row[i] += RIDGE_ALPHA;
        }
        let coefficients = solve_linear_system(gram, moment)?;
        Some(Self {
            intercept: y_mean,
            coefficients,
            feature_means,
        })
    }

    fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + features
                .iter()
                .zip(&self.feature_means)
                .zip(&self.coefficients)
                .map(|((x, m), b)| (x - m) * b)
                .sum::<f64>()
    }
}

/// Gaussian elimination with partial pivoting. `None` when the system is
/// singular.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                let pivot_term = a[col][k];
                a[row][k] -= factor * pivot_term;
            }
            let pivot_rhs = b[col];
            b[row] -= factor * pivot_rhs;
        }
    }
    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[row][row];
    }
    solution.iter().all(|v| v.is_finite()).then_some(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(name: &str, values: &[Option<i64>]) -> Column {
        Column::new(
            name,
            ColumnType::Integer,
            values.iter().map(|v| v.map(Value::Integer)).collect(),
        )
    }

    fn floats(name: &str, values: &[Option<f64>]) -> Column {
        Column::new(
            name,
            ColumnType::Float,
            values.iter().map(|v| v.map(Value::Float)).collect(),
        )
    }

    fn labels(name: &str, values: &[Option<&str>]) -> Column {
        Column::new(
            name,
            ColumnType::Categorical,
            values
                .iter()
                .map(|v| v.map(|s| Value::String(s.to_string())))
                .collect(),
        )
    }

    fn all(table: &Table) -> Vec<String> {
        table.column_names()
    }

    #[test]
    fn mean_fill_promotes_to_float_when_needed() {
        let table = Table::new(vec![ints("age", &[Some(20), None, Some(25)])]).unwrap();
        let outcome = impute(&table, &all(&table), &ImputeConfig::default()).unwrap();
        let column = outcome.table().unwrap().column("age").unwrap().clone();
        assert_eq!(column.datatype, ColumnType::Float);
        assert_eq!(column.values[1], Some(Value::Float(22.5)));
    }

    #[test]
    fn median_fill_keeps_integer_storage() {
        let table = Table::new(vec![ints("age", &[Some(20), None, Some(30), Some(40)])]).unwrap();
        let config = ImputeConfig::new(ImputeStrategy::Median);
        let outcome = impute(&table, &all(&table), &config).unwrap();
        let column = outcome.table().unwrap().column("age").unwrap().clone();
        assert_eq!(column.datatype, ColumnType::Integer);
        assert_eq!(column.values[1], Some(Value::Integer(30)));
    }

    #[test]
    fn categorical_columns_use_most_frequent_alongside_mean() {
        let table = Table::new(vec![
            ints("age", &[Some(10), None, Some(20)]),
            labels("city", &[Some("X"), Some("X"), None]),
        ])
        .unwrap();
        let outcome = impute(&table, &all(&table), &ImputeConfig::default()).unwrap();
        let output = outcome.table().unwrap();
        assert_eq!(output.column("age").unwrap().values[1], Some(Value::Integer(15)));
        assert_eq!(
            output.column("city").unwrap().values[2],
            Some(Value::String("X".into()))
        );
    }

    #[test]
    fn complete_columns_are_a_notice() {
        let table = Table::new(vec![ints("age", &[Some(1), Some(2)])]).unwrap();
        let outcome = impute(&table, &all(&table), &ImputeConfig::default()).unwrap();
        assert_eq!(outcome, StageOutcome::Skipped(Notice::NoMissingValues));
    }

    #[test]
    fn constant_without_fill_value_is_a_config_error() {
        let table = Table::new(vec![ints("age", &[Some(1), None])]).unwrap();
        let config = ImputeConfig::new(ImputeStrategy::Constant);
        let err = impute(&table, &all(&table), &config).unwrap_err();
        assert!(matches!(
            err,
            StageError::Config(ConfigError::MissingFillValue { .. })
        ));
    }

    #[test]
    fn constant_fill_applies_to_both_kinds() {
        let table = Table::new(vec![
            ints("age", &[Some(1), None]),
            labels("city", &[None, Some("Y")]),
        ])
        .unwrap();
        let config = ImputeConfig::new(ImputeStrategy::Constant).with_fill_value("0");
        let outcome = impute(&table, &all(&table), &config).unwrap();
        let output = outcome.table().unwrap();
        assert_eq!(output.column("age").unwrap().values[1], Some(Value::Integer(0)));
        assert_eq!(
            output.column("city").unwrap().values[0],
            Some(Value::String("0".into()))
        );
    }

    #[test]
    fn constant_text_fill_ignores_complete_numeric_columns() {
        let table = Table::new(vec![
            ints("age", &[Some(1), Some(2), Some(3)]),
            labels("city", &[Some("X"), None, Some("Y")]),
        ])
        .unwrap();
        let config = ImputeConfig::new(ImputeStrategy::Constant).with_fill_value("unknown");
        let outcome = impute(&table, &all(&table), &config).unwrap();
        let output = outcome.table().unwrap();
        assert_eq!(output.column("age"), table.column("age"));
        assert_eq!(
            output.column("city").unwrap().values[1],
            Some(Value::String("unknown".into()))
        );
    }

    #[test]
    fn constant_without_fill_value_is_a_notice_on_complete_columns() {
        let table = Table::new(vec![ints("age", &[Some(1), Some(2)])]).unwrap();
        let config = ImputeConfig::new(ImputeStrategy::Constant);
        let outcome = impute(&table, &all(&table), &config).unwrap();
        assert_eq!(outcome, StageOutcome::Skipped(Notice::NoMissingValues));
    }

    #[test]
    fn unsupported_strategy_names_are_rejected() {
        let err = "average".parse::<ImputeStrategy>().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedMethod { .. }));
        assert_eq!("most-frequent".parse::<ImputeStrategy>().unwrap(), ImputeStrategy::MostFrequent);
    }

    #[test]
    fn knn_uses_nearest_rows() {
        let table = Table::new(vec![
            floats("x", &[Some(1.0), Some(2.0), Some(10.0), Some(1.5)]),
            floats("y", &[Some(10.0), Some(20.0), Some(100.0), None]),
        ])
        .unwrap();
        let mut config = ImputeConfig::new(ImputeStrategy::Knn);
        config.neighbors = 2;
        let outcome = impute(&table, &all(&table), &config).unwrap();
        let y = outcome.table().unwrap().column("y").unwrap().as_f64();
        assert_eq!(y[3], Some(15.0));
    }

    #[test]
    fn iterative_recovers_linear_relationship() {
        let table = Table::new(vec![
            floats("x", &[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0)]),
            floats("y", &[Some(2.0), Some(4.0), Some(6.0), Some(8.0), Some(10.0), None]),
        ])
        .unwrap();
        let config = ImputeConfig::new(ImputeStrategy::Iterative);
        let outcome = impute(&table, &all(&table), &config).unwrap();
        let y = outcome.table().unwrap().column("y").unwrap().as_f64();
        let predicted = y[5].unwrap();
        assert!(predicted > 9.0 && predicted < 12.0, "predicted {predicted}");
    }

    #[test]
    fn all_missing_column_is_a_computation_failure() {
        let table = Table::new(vec![floats("x", &[None, None])]).unwrap();
        let err = impute(&table, &all(&table), &ImputeConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            StageError::Computation {
                failure: ComputationFailure::NoObservedValues,
                ..
            }
        ));
    }

    #[test]
    fn linear_solver_handles_pivoting_and_singularity() {
        let solved = solve_linear_system(vec![vec![0.0, 1.0], vec![2.0, 0.0]], vec![3.0, 4.0]);
        assert_eq!(solved, Some(vec![2.0, 3.0]));
        assert!(solve_linear_system(vec![vec![1.0, 2.0], vec![2.0, 4.0]], vec![1.0, 2.0]).is_none());
    }
}
