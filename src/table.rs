//! In-memory table produced by the loader and consumed by the renderer.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// One cell value.
///
/// `Missing` marks an empty field or a position past the end of a short
/// record. It is kept apart from `Text` until [`Table::fill_missing`]
/// normalises it just before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Missing,
}

impl Cell {
    /// Build a cell from a raw field; empty fields become [`Cell::Missing`].
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Cell::Missing
        } else {
            Cell::Text(field.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Canonical text of the cell. Every value reaching the renderer goes
    /// through here.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Text(s) => Cow::Borrowed(s),
            Cell::Missing => Cow::Borrowed(""),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Ordered columns plus ordered rows.
///
/// Every row has exactly `columns.len()` cells; [`Table::push_row`] pads or
/// rejects to keep it that way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row, padding short rows with [`Cell::Missing`].
    ///
    /// Returns the row back if it has more cells than there are columns.
    pub fn push_row(&mut self, mut row: Vec<Cell>) -> Result<(), Vec<Cell>> {
        if row.len() > self.columns.len() {
            return Err(row);
        }
        row.resize(self.columns.len(), Cell::Missing);
        self.rows.push(row);
        Ok(())
    }

    /// Replace every missing cell with empty text.
    pub fn fill_missing(&mut self) {
        for cell in self.rows.iter_mut().flatten() {
            if cell.is_missing() {
                *cell = Cell::Text(String::new());
            }
        }
    }

    pub fn missing_count(&self) -> usize {
        self.rows.iter().flatten().filter(|c| c.is_missing()).count()
    }
}

/// Lightweight description of a loaded table, returned by [`crate::inspect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSummary {
    pub columns: Vec<String>,
    pub row_count: usize,
    /// Encoding that decoded the file, e.g. `"utf-8"`.
    pub encoding: String,
    /// Delimiter that split the fields.
    pub delimiter: String,
    /// `true` when rows past the cap were dropped.
    pub truncated: bool,
}
