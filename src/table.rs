//! In-memory tabular data.
//!
//! A [`Table`] is an ordered sequence of named columns with a uniform row
//! count. Cells are [`Value`]s; the CSV collaborator produces string cells
//! and transform operations may replace them with richer values. A table is
//! exclusively owned by its batch job until it is handed to the writer.

use crate::value::Value;
use anyhow::{Result, bail};

/// One named column, cells in row order.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Value>,
}

/// Ordered named columns, row count uniform across all of them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. The first column fixes the row count; later columns
    /// must match it.
    pub fn push_column(&mut self, name: impl Into<String>, cells: Vec<Value>) -> Result<()> {
        let name = name.into();
        if let Some(first) = self.columns.first()
            && first.cells.len() != cells.len()
        {
            bail!(
                "column `{name}` has {} rows, table has {}",
                cells.len(),
                first.cells.len()
            );
        }
        self.columns.push(Column { name, cells });
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Rename a column in place.
    pub fn rename_column(&mut self, from: &str, to: impl Into<String>) -> Result<()> {
        match self.columns.iter_mut().find(|c| c.name == from) {
            Some(col) => {
                col.name = to.into();
                Ok(())
            }
            None => bail!("no column named `{from}`"),
        }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Cell at `(row, column)` if both are in range.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.cells.get(row))
    }
}
