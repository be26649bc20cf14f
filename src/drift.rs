//! Distribution drift between a reference table and a current table.
//!
//! Numeric columns are compared with the two-sample Kolmogorov-Smirnov test,
//! categorical and text columns with the Jensen-Shannon distance of their value
//! frequencies. The dataset drifts when enough of the compared columns do.

use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;

use crate::{
    classify::ColumnKind,
    frame::{Column, Table},
    stats,
};

pub const DEFAULT_P_VALUE_THRESHOLD: f64 = 0.05;
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 0.1;
pub const DEFAULT_DRIFT_SHARE: f64 = 0.5;

pub trait DriftDetector {
    fn detect(&self, reference: &Table, current: &Table) -> Result<DriftReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftTest {
    KolmogorovSmirnov,
    JensenShannon,
}

impl DriftTest {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftTest::KolmogorovSmirnov => "ks",
            DriftTest::JensenShannon => "jensen-shannon",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDrift {
    pub column: String,
    pub kind: ColumnKind,
    pub test: DriftTest,
    /// KS statistic or Jensen-Shannon distance.
    pub statistic: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    pub threshold: f64,
    pub drifted: bool,
}

impl ColumnDrift {
    pub fn render_row(&self) -> Vec<String> {
        vec![
            self.column.clone(),
            self.kind.to_string(),
            self.test.as_str().to_string(),
            format!("{:.4}", self.statistic),
            self.p_value.map(|p| format!("{p:.4}")).unwrap_or_default(),
            if self.drifted { "yes" } else { "no" }.to_string(),
        ]
    }
}

pub const DRIFT_HEADERS: [&str; 6] = ["column", "kind", "test", "statistic", "p_value", "drift"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub dataset_drift: bool,
    pub drifted_columns: usize,
    pub compared_columns: usize,
    pub drift_share: f64,
    pub columns: Vec<ColumnDrift>,
}

impl DriftReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing drift report")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticalDriftDetector {
    pub p_value_threshold: f64,
    pub distance_threshold: f64,
    /// Share of drifted columns at which the dataset counts as drifted.
    pub drift_share: f64,
}

impl Default for StatisticalDriftDetector {
    fn default() -> Self {
        Self {
            p_value_threshold: DEFAULT_P_VALUE_THRESHOLD,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            drift_share: DEFAULT_DRIFT_SHARE,
        }
    }
}

impl StatisticalDriftDetector {
    fn compare(&self, reference: &Column, current: &Column) -> Option<ColumnDrift> {
        let kind = ColumnKind::of(reference.datatype);
        if ColumnKind::of(current.datatype) != kind {
            debug!(
                "Skipping '{}': kind changed from {kind} to {}",
                reference.name,
                ColumnKind::of(current.datatype)
            );
            return None;
        }
        match kind {
            ColumnKind::Numeric => {
                let reference_values = stats::observed(&reference.as_f64());
                let current_values = stats::observed(&current.as_f64());
                let statistic = ks_statistic(&reference_values, &current_values)?;
                let p_value = ks_p_value(statistic, reference_values.len(), current_values.len());
                Some(ColumnDrift {
                    column: reference.name.clone(),
                    kind,
                    test: DriftTest::KolmogorovSmirnov,
                    statistic,
                    p_value: Some(p_value),
                    threshold: self.p_value_threshold,
                    drifted: p_value < self.p_value_threshold,
                })
            }
            ColumnKind::Categorical | ColumnKind::Text => {
                let distance = jensen_shannon_distance(
                    &display_counts(reference),
                    &display_counts(current),
                )?;
                Some(ColumnDrift {
                    column: reference.name.clone(),
                    kind,
                    test: DriftTest::JensenShannon,
                    statistic: distance,
                    p_value: None,
                    threshold: self.distance_threshold,
                    drifted: distance >= self.distance_threshold,
                })
            }
            ColumnKind::Datetime => None,
        }
    }
}

impl DriftDetector for StatisticalDriftDetector {
    fn detect(&self, reference: &Table, current: &Table) -> Result<DriftReport> {
        let columns: Vec<ColumnDrift> = reference
            .columns()
            .iter()
            .filter_map(|column| match current.column(&column.name) {
                Some(other) => self.compare(column, other),
                None => {
                    debug!("Skipping '{}': absent from current data", column.name);
                    None
                }
            })
            .collect();
        if columns.is_empty() {
            bail!("Reference and current data share no comparable columns");
        }
        let drifted_columns = columns.iter().filter(|c| c.drifted).count();
        let drift_share = drifted_columns as f64 / columns.len() as f64;
        let report = DriftReport {
            dataset_drift: drift_share >= self.drift_share,
            drifted_columns,
            compared_columns: columns.len(),
            drift_share,
            columns,
        };
        info!(
            "Drift in {} of {} column(s); dataset drift: {}",
            report.drifted_columns, report.compared_columns, report.dataset_drift
        );
        Ok(report)
    }
}

fn display_counts(column: &Column) -> HashMap<String, usize> {
    column.values.iter().flatten().map(|v| v.as_display()).counts()
}

/// Largest gap between the two empirical distribution functions.
pub fn ks_statistic(reference: &[f64], current: &[f64]) -> Option<f64> {
    if reference.is_empty() || current.is_empty() {
        return None;
    }
    let a: Vec<f64> = reference.iter().copied().sorted_by(f64::total_cmp).collect();
    let b: Vec<f64> = current.iter().copied().sorted_by(f64::total_cmp).collect();
    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j, mut d) = (0usize, 0usize, 0.0f64);
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n - j as f64 / m).abs());
    }
    Some(d)
}

/// Asymptotic two-sided p-value of the KS statistic `d` for sample sizes
/// `n` and `m`.
pub fn ks_p_value(d: f64, n: usize, m: usize) -> f64 {
    let effective = ((n * m) as f64 / (n + m) as f64).sqrt();
    let lambda = (effective + 0.12 + 0.11 / effective) * d;
    kolmogorov_survival(lambda)
}

fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let exponent = -2.0 * lambda * lambda;
    let mut sum = 0.0;
    let mut sign = 1.0;
    let mut previous = 0.0f64;
    for j in 1..=100 {
        let j = j as f64;
        let term = sign * 2.0 * (exponent * j * j).exp();
        sum += term;
        if term.abs() <= 1e-3 * previous || term.abs() <= 1e-8 * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    1.0
}

/// Jensen-Shannon distance (natural log) between two frequency tables.
pub fn jensen_shannon_distance(
    reference: &HashMap<String, usize>,
    current: &HashMap<String, usize>,
) -> Option<f64> {
    let reference_total: usize = reference.values().sum();
    let current_total: usize = current.values().sum();
    if reference_total == 0 || current_total == 0 {
        return None;
    }
    let divergence: f64 = reference
        .keys()
        .chain(current.keys())
        .unique()
        .map(|key| {
            let p = reference.get(key).copied().unwrap_or(0) as f64 / reference_total as f64;
            let q = current.get(key).copied().unwrap_or(0) as f64 / current_total as f64;
            let m = (p + q) / 2.0;
            0.5 * kl_term(p, m) + 0.5 * kl_term(q, m)
        })
        .sum();
    Some(divergence.max(0.0).sqrt())
}

fn kl_term(p: f64, m: f64) -> f64 {
    if p > 0.0 { p * (p / m).ln() } else { 0.0 }
}
