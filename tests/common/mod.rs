#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use data_wrangler::{
    data::Value,
    frame::{Column, Table},
    schema::ColumnType,
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

pub fn integers(name: &str, values: &[Option<i64>]) -> Column {
    Column::new(
        name,
        ColumnType::Integer,
        values.iter().map(|v| v.map(Value::Integer)).collect(),
    )
}

pub fn floats(name: &str, values: &[Option<f64>]) -> Column {
    Column::new(
        name,
        ColumnType::Float,
        values.iter().map(|v| v.map(Value::Float)).collect(),
    )
}

pub fn categories(name: &str, values: &[Option<&str>]) -> Column {
    Column::new(
        name,
        ColumnType::Categorical,
        values
            .iter()
            .map(|v| v.map(|s| Value::String(s.to_string())))
            .collect(),
    )
}

pub fn table(columns: Vec<Column>) -> Table {
    Table::new(columns).expect("well-formed table")
}

/// People fixture: `age` has a gap and `city` repeats.
pub fn people() -> Table {
    table(vec![
        integers("age", &[Some(25), None, Some(40)]),
        categories("city", &[Some("X"), Some("Y"), Some("X")]),
    ])
}

pub fn column_f64(table: &Table, name: &str) -> Vec<Option<f64>> {
    table.column(name).expect("column present").as_f64()
}
