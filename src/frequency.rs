use std::collections::HashMap;

use serde::Serialize;

use crate::data::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: Value,
    pub count: usize,
    /// Share of the non-missing cells, in percent.
    pub percent: f64,
}

impl ValueCount {
    pub fn render_row(&self, column: &str) -> Vec<String> {
        vec![
            column.to_string(),
            self.value.as_display(),
            self.count.to_string(),
            format!("{:.2}%", self.percent),
        ]
    }
}

/// Counts of every present value, most frequent first. Equal counts keep the
/// order in which the values were first encountered.
pub fn value_counts(values: &[Option<Value>]) -> Vec<ValueCount> {
    let mut counts: HashMap<&Value, (usize, usize)> = HashMap::new();
    let mut total = 0usize;
    for (idx, value) in values.iter().enumerate() {
        if let Some(value) = value {
            total += 1;
            counts.entry(value).or_insert((idx, 0)).1 += 1;
        }
    }
    let mut items: Vec<(&Value, (usize, usize))> = counts.into_iter().collect();
    items.sort_by(|a, b| b.1.1.cmp(&a.1.1).then_with(|| a.1.0.cmp(&b.1.0)));
    items
        .into_iter()
        .map(|(value, (_, count))| ValueCount {
            value: value.clone(),
            count,
            percent: count as f64 / total as f64 * 100.0,
        })
        .collect()
}

/// The mode of the present values; ties go to the first encountered value.
pub fn most_frequent(values: &[Option<Value>]) -> Option<Value> {
    value_counts(values).into_iter().next().map(|vc| vc.value)
}

pub const FREQUENCY_HEADERS: [&str; 4] = ["column", "value", "count", "percent"];
