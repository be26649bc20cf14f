use std::collections::HashSet;

use log::{debug, info};

use crate::{
    data::Value,
    frame::Table,
    stage::{Notice, StageOutcome},
};

/// Row positions to keep: the first occurrence of every distinct row. Missing
/// cells compare equal to each other.
fn first_occurrences(table: &Table) -> Vec<usize> {
    let mut seen: HashSet<Vec<Option<Value>>> = HashSet::with_capacity(table.row_count());
    (0..table.row_count())
        .filter(|&idx| seen.insert(table.row(idx)))
        .collect()
}

pub fn count_duplicates(table: &Table) -> usize {
    table.row_count() - first_occurrences(table).len()
}

/// Drops repeated rows, keeping the first occurrence and the survivors' order.
pub fn deduplicate(table: &Table) -> StageOutcome {
    let before = table.row_count();
    let keep = first_occurrences(table);
    if keep.len() == before {
        info!("No duplicate rows across {before} row(s)");
        return StageOutcome::Skipped(Notice::NoDuplicates);
    }
    let removed = before - keep.len();
    debug!("Keeping {} of {before} row(s)", keep.len());
    let deduplicated = table.take_rows(&keep);
    info!("Removed {removed} duplicate row(s)");
    StageOutcome::applied(
        deduplicated,
        format!("Removed {removed} duplicate row(s): {before} -> {}", keep.len()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{frame::Column, schema::ColumnType};

    fn table(ids: &[Option<i64>], names: &[&str]) -> Table {
        Table::new(vec![
            Column::new(
                "id",
                ColumnType::Integer,
                ids.iter().map(|v| v.map(Value::Integer)).collect(),
            ),
            Column::new(
                "name",
                ColumnType::String,
                names.iter().map(|v| Some(Value::String(v.to_string()))).collect(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn keeps_first_occurrence_in_order() {
        let input = table(
            &[Some(1), Some(2), Some(1), None, None],
            &["a", "b", "a", "c", "c"],
        );
        let outcome = deduplicate(&input);
        let output = outcome.table().unwrap();
        assert_eq!(output.row_count(), 3);
        assert_eq!(
            output.column("id").unwrap().values,
            vec![Some(Value::Integer(1)), Some(Value::Integer(2)), None]
        );
        assert_eq!(count_duplicates(&input), 2);
    }

    #[test]
    fn unique_rows_are_a_notice() {
        let input = table(&[Some(1), Some(1)], &["a", "b"]);
        assert_eq!(deduplicate(&input), StageOutcome::Skipped(Notice::NoDuplicates));
    }

    #[test]
    fn empty_table_has_no_duplicates() {
        let outcome = deduplicate(&Table::default());
        assert!(!outcome.is_applied());
    }
}
