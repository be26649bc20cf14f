//! Fixed-width text tables for terminal output.

use std::{borrow::Cow, fmt::Write as _};

use crate::frame::Table;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

pub fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// First `limit` rows of `table` as display strings; missing cells are blank.
pub fn preview_rows(table: &Table, limit: usize) -> Vec<Vec<String>> {
    (0..table.row_count().min(limit))
        .map(|row| {
            table
                .row(row)
                .iter()
                .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default())
                .collect()
        })
        .collect()
}

pub fn render_preview(table: &Table, limit: usize) -> String {
    render_table(&table.column_names(), &preview_rows(table, limit))
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (value, width) in values.iter().zip(widths) {
        let sanitized = sanitize_cell(value);
        let padding = width.saturating_sub(display_width(sanitized.as_ref()));
        let mut cell = sanitized.into_owned();
        cell.push_str(&" ".repeat(padding));
        cells.push(cell);
    }
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, frame::Column, schema::ColumnType};

    #[test]
    fn columns_are_padded_to_the_widest_cell() {
        let rendered = render_table(
            &headers(&["name", "n"]),
            &[
                vec!["alpha".into(), "1".into()],
                vec!["b".into(), "22".into()],
            ],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "name   n");
        assert_eq!(lines[1], "-----  ---");
        assert_eq!(lines[2], "alpha  1");
        assert_eq!(lines[3], "b      22");
    }

    #[test]
    fn control_characters_and_ansi_codes_do_not_break_alignment() {
        assert_eq!(display_width("\u{1b}[31mred\u{1b}[0m"), 3);
        assert_eq!(sanitize_cell("a\tb\nc"), "a b c");
    }

    #[test]
    fn preview_stops_at_limit_and_blanks_missing() {
        let table = Table::new(vec![Column::new(
            "x",
            ColumnType::Integer,
            vec![Some(Value::Integer(1)), None, Some(Value::Integer(3))],
        )])
        .unwrap();
        assert_eq!(
            preview_rows(&table, 2),
            vec![vec!["1".to_string()], vec![String::new()]]
        );
    }
}
