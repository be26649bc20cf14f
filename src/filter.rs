//! Type-aware row filtering.
//!
//! Each [`ColumnFilter`] turns one column into a boolean row mask; a
//! [`PredicateSet`] keeps one mask per column and keeps the rows for which
//! every mask is `true`. Missing cells never match.
//!
//! Command-line syntax (one expression per `--filter`):
//!
//! | expression              | predicate                        |
//! |-------------------------|----------------------------------|
//! | `age=18..30`            | inclusive numeric range          |
//! | `joined=2024-01-01..`   | inclusive date range, open end   |
//! | `city in Paris\|Lyon`   | set membership                   |
//! | `name contains ann`     | case-insensitive substring       |
//! | `name startswith An`    | prefix                           |
//! | `name endswith son`     | suffix                           |
//! | `name == Ann`           | exact match                      |
//! | `code matches [A-Z]\d+` | regex anchored at the cell start |

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, info};
use regex::Regex;

use crate::{
    classify::ColumnKind,
    data::{Value, parse_naive_date},
    error::ConfigError,
    frame::{Column, Table},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Contains,
    StartsWith,
    EndsWith,
    Exact,
    Regex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Range { min: f64, max: f64 },
    DateRange { start: NaiveDate, end: NaiveDate },
    OneOf(Vec<String>),
    Text { mode: TextMatch, pattern: String },
}

impl Predicate {
    fn expected_kind(&self) -> ColumnKind {
        match self {
            Predicate::Range { .. } => ColumnKind::Numeric,
            Predicate::DateRange { .. } => ColumnKind::Datetime,
            Predicate::OneOf(_) => ColumnKind::Categorical,
            Predicate::Text { .. } => ColumnKind::Text,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Predicate::Range { min, max } if min > max || min.is_nan() || max.is_nan() => {
                Err(ConfigError::InvalidParameter {
                    parameter: "range",
                    reason: format!("lower bound {min} exceeds upper bound {max}"),
                })
            }
            Predicate::DateRange { start, end } if start > end => {
                Err(ConfigError::InvalidParameter {
                    parameter: "date range",
                    reason: format!("start {start} is after end {end}"),
                })
            }
            _ => Ok(()),
        }
    }

    /// Row mask over `column`. Fails when the predicate does not fit the
    /// column's kind.
    pub fn mask(&self, column: &Column) -> Result<Vec<bool>, ConfigError> {
        let kind = ColumnKind::of(column.datatype);
        if kind != self.expected_kind() {
            return Err(ConfigError::KindMismatch {
                operation: "filter",
                column: column.name.clone(),
                kind,
                expected: self.expected_kind().as_str(),
            });
        }
        self.validate()?;
        let mask = match self {
            Predicate::Range { min, max } => column
                .values
                .iter()
                .map(|v| {
                    v.as_ref()
                        .and_then(Value::as_f64)
                        .is_some_and(|x| x >= *min && x <= *max)
                })
                .collect(),
            Predicate::DateRange { start, end } => column
                .values
                .iter()
                .map(|v| {
                    v.as_ref()
                        .and_then(Value::as_date)
                        .is_some_and(|d| d >= *start && d <= *end)
                })
                .collect(),
            Predicate::OneOf(allowed) => column
                .values
                .iter()
                .map(|v| {
                    v.as_ref()
                        .is_some_and(|value| allowed.iter().any(|a| *a == value.as_display()))
                })
                .collect(),
            Predicate::Text { mode, pattern } => {
                let matcher = TextMatcher::new(*mode, pattern)?;
                column
                    .values
                    .iter()
                    .map(|v| v.as_ref().is_some_and(|value| matcher.matches(&value.as_display())))
                    .collect()
            }
        };
        Ok(mask)
    }
}

enum TextMatcher {
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Exact(String),
    Regex(Regex),
}

impl TextMatcher {
    fn new(mode: TextMatch, pattern: &str) -> Result<Self, ConfigError> {
        Ok(match mode {
            TextMatch::Contains => TextMatcher::Contains(pattern.to_lowercase()),
            TextMatch::StartsWith => TextMatcher::StartsWith(pattern.to_string()),
            TextMatch::EndsWith => TextMatcher::EndsWith(pattern.to_string()),
            TextMatch::Exact => TextMatcher::Exact(pattern.to_string()),
            TextMatch::Regex => {
                let anchored = format!("^(?:{pattern})");
                let regex = Regex::new(&anchored).map_err(|err| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: err.to_string(),
                })?;
                TextMatcher::Regex(regex)
            }
        })
    }

    fn matches(&self, cell: &str) -> bool {
        match self {
            TextMatcher::Contains(needle) => cell.to_lowercase().contains(needle.as_str()),
            TextMatcher::StartsWith(prefix) => cell.starts_with(prefix.as_str()),
            TextMatcher::EndsWith(suffix) => cell.ends_with(suffix.as_str()),
            TextMatcher::Exact(expected) => cell == expected,
            TextMatcher::Regex(regex) => regex.is_match(cell),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub column: String,
    pub predicate: Predicate,
}

impl ColumnFilter {
    pub fn new(column: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            column: column.into(),
            predicate,
        }
    }
}

/// One row mask per filtered column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateSet {
    masks: BTreeMap<String, Vec<bool>>,
}

impl PredicateSet {
    pub fn build(table: &Table, filters: &[ColumnFilter]) -> Result<Self, ConfigError> {
        let mut masks: BTreeMap<String, Vec<bool>> = BTreeMap::new();
        for filter in filters {
            let column = table.require(&filter.column)?;
            let mask = filter.predicate.mask(column)?;
            debug!(
                "Filter on '{}' matches {} of {} row(s)",
                filter.column,
                mask.iter().filter(|m| **m).count(),
                mask.len()
            );
            match masks.get_mut(&filter.column) {
                Some(existing) => existing
                    .iter_mut()
                    .zip(mask)
                    .for_each(|(slot, keep)| *slot &= keep),
                None => {
                    masks.insert(filter.column.clone(), mask);
                }
            }
        }
        Ok(Self { masks })
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.masks.keys().map(String::as_str)
    }

    /// AND of every mask; all `true` when there are no masks.
    pub fn combined(&self, rows: usize) -> Vec<bool> {
        let mut combined = vec![true; rows];
        for mask in self.masks.values() {
            for (slot, keep) in combined.iter_mut().zip(mask) {
                *slot &= *keep;
            }
        }
        combined
    }

    pub fn apply(&self, table: &Table) -> Table {
        if self.is_empty() {
            return table.clone();
        }
        table.filter_rows(&self.combined(table.row_count()))
    }
}

/// Keeps the rows matching every filter, in their original order.
pub fn apply_filters(table: &Table, filters: &[ColumnFilter]) -> Result<Table, ConfigError> {
    let set = PredicateSet::build(table, filters)?;
    let filtered = set.apply(table);
    if !set.is_empty() {
        info!(
            "Filtered {} -> {} row(s) on {}",
            table.row_count(),
            filtered.row_count(),
            set.columns().join(", ")
        );
    }
    Ok(filtered)
}

pub fn parse_filters(filters: &[String]) -> Result<Vec<ColumnFilter>> {
    filters.iter().map(|f| parse_filter(f)).collect()
}

fn parse_filter(filter: &str) -> Result<ColumnFilter> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty filter expression"));
    }

    // The operator that appears first wins, so values may contain keywords.
    let lowered = trimmed.to_ascii_lowercase();
    let operator = [
        (" contains ", Some(TextMatch::Contains)),
        (" startswith ", Some(TextMatch::StartsWith)),
        (" endswith ", Some(TextMatch::EndsWith)),
        (" matches ", Some(TextMatch::Regex)),
        ("==", Some(TextMatch::Exact)),
        (" in ", None),
    ]
    .into_iter()
    .filter_map(|(needle, mode)| lowered.find(needle).map(|idx| (idx, needle.len(), mode)))
    .min_by_key(|(idx, _, _)| *idx);

    if let Some((idx, len, mode)) = operator {
        let column = trimmed[..idx].trim();
        let right = unquote(trimmed[idx + len..].trim());
        let predicate = match mode {
            Some(mode) => Predicate::Text {
                mode,
                pattern: right.to_string(),
            },
            None => Predicate::OneOf(
                right
                    .split('|')
                    .map(|v| unquote(v.trim()).to_string())
                    .collect(),
            ),
        };
        return Ok(ColumnFilter::new(column_name(column, filter)?, predicate));
    }

    if let Some((column, right)) = trimmed.split_once('=')
        && let Some((lower, upper)) = right.split_once("..")
    {
        let predicate = parse_range(lower.trim(), upper.trim())
            .ok_or_else(|| anyhow!("Range bounds in '{trimmed}' must both be numbers or dates"))?;
        return Ok(ColumnFilter::new(column_name(column.trim(), filter)?, predicate));
    }

    Err(anyhow!("Failed to parse filter expression '{trimmed}'"))
}

fn parse_range(lower: &str, upper: &str) -> Option<Predicate> {
    let number = |raw: &str, open: f64| -> Option<f64> {
        if raw.is_empty() {
            Some(open)
        } else {
            raw.parse::<f64>().ok().filter(|v| !v.is_nan())
        }
    };
    if let (Some(min), Some(max)) = (
        number(lower, f64::NEG_INFINITY),
        number(upper, f64::INFINITY),
    ) && !(lower.is_empty() && upper.is_empty())
    {
        return Some(Predicate::Range { min, max });
    }
    let date = |raw: &str, open: NaiveDate| -> Option<NaiveDate> {
        if raw.is_empty() {
            Some(open)
        } else {
            parse_naive_date(raw).ok()
        }
    };
    Some(Predicate::DateRange {
        start: date(lower, NaiveDate::MIN)?,
        end: date(upper, NaiveDate::MAX)?,
    })
}

fn column_name<'a>(column: &'a str, filter: &str) -> Result<&'a str> {
    if column.is_empty() {
        Err(anyhow!("Filter '{filter}' does not name a column"))
    } else {
        Ok(unquote(column))
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn table() -> Table {
        let text = |values: &[&str]| -> Vec<Option<Value>> {
            values
                .iter()
                .map(|v| (!v.is_empty()).then(|| Value::String(v.to_string())))
                .collect()
        };
        Table::new(vec![
            Column::new(
                "age",
                ColumnType::Integer,
                vec![
                    Some(Value::Integer(15)),
                    Some(Value::Integer(22)),
                    None,
                    Some(Value::Integer(30)),
                ],
            ),
            Column::new("city", ColumnType::Categorical, text(&["X", "Y", "X", ""])),
            Column::new("name", ColumnType::String, text(&["Anna", "bob", "Annette", "Carl"])),
            Column::new(
                "joined",
                ColumnType::DateTime,
                vec![
                    Some(Value::DateTime(
                        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
                    )),
                    None,
                    Some(Value::DateTime(
                        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(23, 0, 0).unwrap(),
                    )),
                    Some(Value::DateTime(
                        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
                    )),
                ],
            ),
        ])
        .unwrap()
    }

    fn names(table: &Table) -> Vec<String> {
        table
            .column("name")
            .unwrap()
            .values
            .iter()
            .map(|v| v.as_ref().map(Value::as_display).unwrap_or_default())
            .collect()
    }

    #[test]
    fn parses_every_expression_form() {
        let parsed = parse_filters(&[
            "age=18..30".to_string(),
            "joined=2024-01-01..".to_string(),
            "city in X|'Y'".to_string(),
            "name contains ann".to_string(),
            "name == Carl".to_string(),
            "name matches A.*".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed[0].predicate, Predicate::Range { min: 18.0, max: 30.0 });
        assert!(matches!(parsed[1].predicate, Predicate::DateRange { .. }));
        assert_eq!(
            parsed[2].predicate,
            Predicate::OneOf(vec!["X".to_string(), "Y".to_string()])
        );
        assert_eq!(parsed[3].column, "name");
        assert!(matches!(
            parsed[4].predicate,
            Predicate::Text { mode: TextMatch::Exact, .. }
        ));
        assert!(parse_filter("age > 3").is_err());
        assert!(parse_filter("age=a..b").is_err());
    }

    #[test]
    fn first_operator_wins_over_keywords_in_the_value() {
        let parsed = parse_filter("title == Made in Italy").unwrap();
        assert_eq!(parsed.column, "title");
        assert_eq!(
            parsed.predicate,
            Predicate::Text {
                mode: TextMatch::Exact,
                pattern: "Made in Italy".into(),
            }
        );
        let parsed = parse_filter("note contains a == b").unwrap();
        assert_eq!(parsed.column, "note");
        assert!(matches!(
            parsed.predicate,
            Predicate::Text { mode: TextMatch::Contains, ref pattern } if pattern == "a == b"
        ));
    }

    #[test]
    fn predicates_combine_with_and() {
        let filters = parse_filters(&["age=18..40".to_string(), "city in X|Y".to_string()]).unwrap();
        let filtered = apply_filters(&table(), &filters).unwrap();
        assert_eq!(names(&filtered), vec!["bob"]);
    }

    #[test]
    fn contains_is_case_insensitive_and_regex_is_anchored() {
        let contains = parse_filters(&["name contains ANN".to_string()]).unwrap();
        assert_eq!(names(&apply_filters(&table(), &contains).unwrap()), vec!["Anna", "Annette"]);
        let regex = parse_filters(&["name matches nn".to_string()]).unwrap();
        assert!(apply_filters(&table(), &regex).unwrap().row_count() == 0);
    }

    #[test]
    fn datetime_range_compares_calendar_dates() {
        let filters = parse_filters(&["joined=2024-01-01..2024-03-01".to_string()]).unwrap();
        assert_eq!(names(&apply_filters(&table(), &filters).unwrap()), vec!["Anna", "Annette"]);
    }

    #[test]
    fn predicate_must_fit_column_kind() {
        let filters = parse_filters(&["name=1..2".to_string()]).unwrap();
        let err = apply_filters(&table(), &filters).unwrap_err();
        assert!(matches!(err, ConfigError::KindMismatch { .. }));
        let bad_regex = vec![ColumnFilter::new(
            "name",
            Predicate::Text {
                mode: TextMatch::Regex,
                pattern: "(".into(),
            },
        )];
        assert!(matches!(
            apply_filters(&table(), &bad_regex),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn no_filters_returns_table_unchanged() {
        let input = table();
        assert_eq!(apply_filters(&input, &[]).unwrap(), input);
    }
}
