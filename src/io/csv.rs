//! Delimited-data reader/writer collaborator.
//!
//! The execution core passes byte streams in and structured [`Table`]s out;
//! delimiter and quoting details stay inside this module. Serialization is
//! canonical (comma-delimited, `\n` terminated, header row first), so
//! `serialize(parse(bytes)) == bytes` holds for input already in canonical
//! form — the round-trip property the batch pipeline is tested against.

use crate::table::Table;
use crate::value::Value;
use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::{File, create_dir_all};
use std::io::{Read, Write};
use std::path::Path;

/// Parse a delimited byte stream into a table.
///
/// The first record is the header and names the columns. Every subsequent
/// record must have the same width; ragged input is a parse error. Cells
/// come out as [`Value::Str`] — the reader interprets structure, not types.
pub fn parse(bytes: &[u8]) -> Result<Table> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let headers = reader.headers().context("read header row")?.clone();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("parse record #{}", row + 1))?;
        if record.len() != headers.len() {
            bail!(
                "record #{} has {} fields, header has {}",
                row + 1,
                record.len(),
                headers.len()
            );
        }
        for (col, field) in record.iter().enumerate() {
            columns[col].push(Value::Str(field.to_string()));
        }
    }

    let mut table = Table::new();
    for (name, cells) in headers.iter().zip(columns) {
        table.push_column(name, cells)?;
    }
    Ok(table)
}

/// Serialize a table to canonical delimited bytes.
///
/// Cell values must be scalar (string, integer, float, bool); bytes and
/// nested mappings have no delimited representation and are rejected, as is
/// a table whose columns disagree on row count.
pub fn serialize(table: &Table) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(table.columns().iter().map(|c| c.name.as_str()))
        .context("write header row")?;

    for row in 0..table.num_rows() {
        let mut record = Vec::with_capacity(table.num_columns());
        for column in table.columns() {
            // A mutated column can fall out of step with the row count.
            let Some(cell) = column.cells.get(row) else {
                bail!("table is ragged: column `{}` has no row {row}", column.name);
            };
            record.push(cell_text(cell, &column.name, row)?);
        }
        writer.write_record(&record).with_context(|| format!("write record #{}", row + 1))?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flush serialized table: {e}"))
}

fn cell_text(value: &Value, column: &str, row: usize) -> Result<String> {
    Ok(match value {
        Value::Str(s) => s.clone(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Bytes(_) | Value::Map(_) => {
            bail!("cell ({row}, `{column}`) is not a scalar value")
        }
    })
}

/// Read and parse one file into a table.
pub fn read_table(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .with_context(|| format!("open {}", path.display()))?;
    parse(&bytes).with_context(|| format!("parse {}", path.display()))
}

/// Serialize and persist one table, creating parent directories as needed.
///
/// Returns the number of data rows written.
pub fn write_table(path: impl AsRef<Path>, table: &Table) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let bytes = serialize(table)?;
    File::create(path)
        .and_then(|mut f| f.write_all(&bytes))
        .with_context(|| format!("create {}", path.display()))?;
    Ok(table.num_rows())
}
