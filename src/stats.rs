use chrono::{DateTime, Datelike, NaiveDate, Utc};
use log::info;
use serde::Serialize;

use crate::{
    classify::ColumnKind,
    data::Value,
    dedupe,
    frame::{Column, Shape, Table},
    frequency::{self, ValueCount},
    schema::ColumnType,
};

/// Observed (non-missing) values of a numeric view.
pub fn observed(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(quantile_sorted(&sorted, q))
}

pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Population standard deviation (divides by `n`).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.max(0.0).sqrt())
}

/// Sample standard deviation (divides by `n - 1`), as shown in profiles.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.max(0.0).sqrt())
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnOverview {
    pub name: String,
    pub datatype: ColumnType,
    pub kind: ColumnKind,
    pub missing: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetOverview {
    pub shape: Shape,
    pub columns: Vec<ColumnOverview>,
    pub duplicate_rows: usize,
    pub missing_cells: usize,
}

impl DatasetOverview {
    pub fn of(table: &Table) -> Self {
        let columns = table
            .columns()
            .iter()
            .map(|c| ColumnOverview {
                name: c.name.clone(),
                datatype: c.datatype,
                kind: ColumnKind::of(c.datatype),
                missing: c.missing_count(),
            })
            .collect();
        Self {
            shape: table.shape(),
            columns,
            duplicate_rows: dedupe::count_duplicates(table),
            missing_cells: table.missing_total(),
        }
    }
}

/// Describe-style summary of a numeric or temporal column. Temporal values
/// are summarised as days (dates) or seconds (datetimes) and rendered back.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub datatype: ColumnType,
    pub count: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
}

impl ColumnSummary {
    pub fn of(column: &Column) -> Option<Self> {
        let metrics: Vec<Option<f64>> = match ColumnKind::of(column.datatype) {
            ColumnKind::Numeric => column.as_f64(),
            ColumnKind::Datetime => column
                .values
                .iter()
                .map(|v| v.as_ref().and_then(value_to_metric))
                .collect(),
            _ => return None,
        };
        let values = observed(&metrics);
        let bounds = min_max(&values);
        Some(Self {
            name: column.name.clone(),
            datatype: column.datatype,
            count: values.len(),
            missing: column.missing_count(),
            min: bounds.map(|(lo, _)| lo),
            max: bounds.map(|(_, hi)| hi),
            mean: mean(&values),
            median: median(&values),
            std_dev: sample_std(&values),
        })
    }

    pub fn render_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.count.to_string(),
            self.missing.to_string(),
            self.format_metric(self.min),
            self.format_metric(self.max),
            self.format_metric(self.mean),
            self.format_metric(self.median),
            self.std_dev
                .map(|v| format_spread(v, self.datatype))
                .unwrap_or_default(),
        ]
    }

    fn format_metric(&self, metric: Option<f64>) -> String {
        metric
            .map(|value| format_metric(value, self.datatype))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub overview: DatasetOverview,
    pub summaries: Vec<ColumnSummary>,
    pub frequencies: Vec<(String, Vec<ValueCount>)>,
}

/// Overview, numeric/temporal summaries and the `top` most frequent values of
/// every categorical or text column.
pub fn profile(table: &Table, top: usize) -> Profile {
    let overview = DatasetOverview::of(table);
    let summaries: Vec<ColumnSummary> =
        table.columns().iter().filter_map(ColumnSummary::of).collect();
    let frequencies = table
        .columns()
        .iter()
        .filter(|c| ColumnKind::of(c.datatype).is_string_valued())
        .map(|c| {
            let mut counts = frequency::value_counts(&c.values);
            if top > 0 {
                counts.truncate(top);
            }
            (c.name.clone(), counts)
        })
        .collect();
    info!(
        "Profiled {} row(s) x {} column(s); {} summary column(s)",
        overview.shape.rows,
        overview.shape.columns,
        summaries.len()
    );
    Profile {
        overview,
        summaries,
        frequencies,
    }
}

pub const SUMMARY_HEADERS: [&str; 8] = [
    "column", "count", "missing", "min", "max", "mean", "median", "std_dev",
];

fn value_to_metric(value: &Value) -> Option<f64> {
    match value {
        Value::Date(d) => Some(d.num_days_from_ce() as f64),
        Value::DateTime(dt) => Some(dt.and_utc().timestamp() as f64),
        other => other.as_f64(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

fn format_metric(value: f64, datatype: ColumnType) -> String {
    match datatype {
        ColumnType::Date => NaiveDate::from_num_days_from_ce_opt(value.round() as i32)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        ColumnType::DateTime => {
            if !value.is_finite() {
                return String::new();
            }
            DateTime::<Utc>::from_timestamp(value.round() as i64, 0)
                .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default()
        }
        _ => format_number(value),
    }
}

fn format_spread(value: f64, datatype: ColumnType) -> String {
    match datatype {
        ColumnType::Date => format!("{} days", format_number(value)),
        ColumnType::DateTime => format!("{} seconds", format_number(value)),
        _ => format_number(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_interpolates_linearly() {
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(quantile(&values, 0.25), Some(2.0));
        assert_eq!(quantile(&values, 0.75), Some(4.0));
        assert_eq!(quantile(&[1.0, 2.0], 0.5), Some(1.5));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn population_and_sample_std_differ() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(population_std(&values), Some(2.0));
        let sample = sample_std(&values).unwrap();
        assert!((sample - 2.138_089_935).abs() < 1e-6);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn date_summary_renders_calendar_dates() {
        let column = Column::new(
            "joined",
            ColumnType::Date,
            vec![
                Some(Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())),
                None,
                Some(Value::Date(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())),
            ],
        );
        let summary = ColumnSummary::of(&column).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.missing, 1);
        let row = summary.render_row();
        assert_eq!(row[3], "2024-01-01");
        assert_eq!(row[5], "2024-01-02");
    }

    #[test]
    fn text_columns_have_no_numeric_summary() {
        let column = Column::new("name", ColumnType::String, vec![None]);
        assert!(ColumnSummary::of(&column).is_none());
    }
}
