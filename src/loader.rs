//! Loading tables from CSV or JSON and writing them back as CSV.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    data::{Value, parse_typed_value, value_from_json},
    frame::{Column, Table},
    io_utils,
    schema::{self, DEFAULT_SAMPLE_ROWS, Schema, is_placeholder_token},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::Json,
            _ => InputFormat::Csv,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    /// Declared types; inferred from the data when absent.
    pub schema: Option<Schema>,
    pub sample_rows: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: encoding_rs::UTF_8,
            schema: None,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

/// Header row plus raw cells; blank and placeholder cells are `None`.
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

fn raw_cell(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty() && !is_placeholder_token(trimmed)).then(|| value.to_string())
}

fn read_csv(text: &str, delimiter: u8) -> Result<RawTable> {
    let mut reader = io_utils::csv_reader(text, delimiter);
    let headers: Vec<String> = reader
        .headers()
        .context("Reading CSV header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        rows.push(record.iter().map(raw_cell).collect());
    }
    Ok(RawTable { headers, rows })
}

fn json_records(text: &str) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    let parsed: serde_json::Value = serde_json::from_str(text).context("Parsing JSON input")?;
    let serde_json::Value::Array(items) = parsed else {
        bail!("JSON input must be an array of objects");
    };
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(anyhow!("JSON element {idx} is {other}, expected an object")),
        })
        .collect()
}

fn json_headers(records: &[serde_json::Map<String, serde_json::Value>]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

fn json_raw_cell(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => raw_cell(s),
        other => Some(other.to_string()),
    }
}

fn resolve_schema(options: &LoadOptions, raw: &RawTable) -> Result<Schema> {
    match &options.schema {
        Some(schema) => {
            schema.validate_headers(&raw.headers)?;
            Ok(schema.clone())
        }
        None => Ok(schema::infer_schema_from_rows(
            &raw.headers,
            raw.rows.iter().cloned(),
            options.sample_rows,
        )),
    }
}

fn typed_columns<F>(schema: &Schema, row_count: usize, mut cell: F) -> Result<Table>
where
    F: FnMut(usize, usize) -> Result<Option<Value>>,
{
    let mut columns = Vec::with_capacity(schema.columns.len());
    for (col_idx, meta) in schema.columns.iter().enumerate() {
        let values = (0..row_count)
            .map(|row| {
                cell(row, col_idx).with_context(|| {
                    format!("Row {}, column '{}' ({})", row + 2, meta.name, meta.datatype)
                })
            })
            .collect::<Result<Vec<_>>>()?;
        columns.push(Column::new(meta.name.clone(), meta.datatype, values));
    }
    Table::new(columns).map_err(Into::into)
}

/// Loads a table, inferring the schema unless one is supplied.
pub fn load_table(path: &Path, options: &LoadOptions) -> Result<Table> {
    let text = io_utils::read_text(path, options.encoding)?;
    let table = match InputFormat::from_path(path) {
        InputFormat::Csv => {
            let delimiter = io_utils::resolve_delimiter(Some(path), options.delimiter);
            debug!(
                "Reading {path:?} as CSV with delimiter '{}'",
                io_utils::printable_delimiter(delimiter)
            );
            let raw = read_csv(&text, delimiter)?;
            let schema = resolve_schema(options, &raw)?;
            typed_columns(&schema, raw.rows.len(), |row, col| {
                match raw.rows[row].get(col).cloned().flatten() {
                    Some(value) => parse_typed_value(&value, &schema.columns[col].datatype),
                    None => Ok(None),
                }
            })?
        }
        InputFormat::Json => {
            debug!("Reading {path:?} as a JSON array");
            let records = json_records(&text)?;
            let headers = json_headers(&records);
            let raw = RawTable {
                rows: records
                    .iter()
                    .map(|r| headers.iter().map(|h| json_raw_cell(r.get(h))).collect())
                    .collect(),
                headers,
            };
            let schema = resolve_schema(options, &raw)?;
            typed_columns(&schema, records.len(), |row, col| {
                if raw.rows[row][col].is_none() {
                    return Ok(None);
                }
                let key = &schema.columns[col].name;
                match records[row].get(key) {
                    Some(value) => value_from_json(value, &schema.columns[col].datatype),
                    None => Ok(None),
                }
            })?
        }
    };
    info!(
        "Loaded {} row(s) x {} column(s) from {path:?}",
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Infers a schema without building the typed table.
pub fn infer_schema(path: &Path, options: &LoadOptions) -> Result<Schema> {
    let text = io_utils::read_text(path, options.encoding)?;
    let raw = match InputFormat::from_path(path) {
        InputFormat::Csv => read_csv(
            &text,
            io_utils::resolve_delimiter(Some(path), options.delimiter),
        )?,
        InputFormat::Json => {
            let records = json_records(&text)?;
            let headers = json_headers(&records);
            RawTable {
                rows: records
                    .iter()
                    .map(|r| headers.iter().map(|h| json_raw_cell(r.get(h))).collect())
                    .collect(),
                headers,
            }
        }
    };
    Ok(schema::infer_schema_from_rows(
        &raw.headers,
        raw.rows,
        options.sample_rows,
    ))
}

/// CSV text for `table`; missing cells are written as empty fields.
pub fn table_to_csv(table: &Table, delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer
        .write_record(table.column_names())
        .context("Writing CSV header")?;
    for row in 0..table.row_count() {
        let record: Vec<String> = table
            .row(row)
            .iter()
            .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default())
            .collect();
        writer
            .write_record(&record)
            .with_context(|| format!("Writing row {}", row + 2))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing CSV output: {}", err.error()))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

pub fn write_table(
    table: &Table,
    path: Option<&Path>,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<()> {
    let delimiter = io_utils::resolve_delimiter(path, delimiter);
    let text = table_to_csv(table, delimiter)?;
    io_utils::write_text(path, &text, encoding)?;
    if let Some(path) = path.filter(|p| !io_utils::is_dash(p)) {
        info!(
            "Wrote {} row(s) x {} column(s) to {path:?}",
            table.row_count(),
            table.column_count()
        );
    }
    Ok(())
}
