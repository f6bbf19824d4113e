use crate::error::{ReconciliationError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix spreadsheet readers give to header cells that were left blank.
pub const PLACEHOLDER_PREFIX: &str = "Unnamed";

static EMPTY: Cell = Cell::Empty;

/// A single typed spreadsheet value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    /// Absent value (blank cell, null, NaN in the source)
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Grouping key for identifier columns such as the project code.
    ///
    /// Integral numbers are rendered without a fractional part so that a code
    /// stored as `1001` in one sheet matches `"1001"` in the other.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(format_number(*n)),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(n) => write!(f, "{}", format_number(*n)),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Number(f64::from(value))
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Number)
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

pub fn is_placeholder_column(name: &str) -> bool {
    name.starts_with(PLACEHOLDER_PREFIX)
}

/// Column-oriented view over a parsed spreadsheet: a header plus rows of
/// cells, every row exactly as wide as the header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
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

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Appends a row, padding it with empty cells up to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) -> Result<()> {
        if row.len() > self.columns.len() {
            return Err(ReconciliationError::InvalidTable(format!(
                "row {} has {} cells but the header has {} columns",
                self.rows.len() + 1,
                row.len(),
                self.columns.len()
            )));
        }
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| ReconciliationError::MissingColumn(name.to_string()))
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY)
    }

    /// Looks a cell up by column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: Cell) {
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *slot = value;
        }
    }

    /// Replaces the named column in place, or appends it when absent.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(ReconciliationError::InvalidTable(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Removes the `Unnamed…` columns spreadsheet parsing leaves behind and
    /// returns their names.
    pub fn drop_placeholder_columns(&mut self) -> Vec<String> {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !is_placeholder_column(c))
            .collect();

        if keep.iter().all(|k| *k) {
            return Vec::new();
        }

        let mut dropped = Vec::new();
        let mut columns = Vec::with_capacity(self.columns.len());
        for (name, kept) in self.columns.drain(..).zip(&keep) {
            if *kept {
                columns.push(name);
            } else {
                dropped.push(name);
            }
        }
        self.columns = columns;

        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.retain(|_| *flags.next().unwrap_or(&true));
        }

        debug!("Dropped placeholder columns: {:?}", dropped);
        dropped
    }

    /// Reads a numeric cell, treating empty as zero.
    pub(crate) fn number_at(&self, row: usize, column: usize) -> Result<f64> {
        match self.cell(row, column) {
            Cell::Empty => Ok(0.0),
            Cell::Number(n) => Ok(*n),
            Cell::Text(s) => Err(self.invalid_value(row, column, format!("expected a number, found '{}'", s))),
        }
    }

    /// Reads an integral cell such as a fiscal year or period number.
    pub(crate) fn integer_at(&self, row: usize, column: usize) -> Result<Option<i64>> {
        match self.cell(row, column) {
            Cell::Empty => Ok(None),
            Cell::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(Some(*n as i64)),
            Cell::Number(n) => {
                Err(self.invalid_value(row, column, format!("expected an integer, found {}", n)))
            }
            Cell::Text(s) => s.trim().parse::<i64>().map(Some).map_err(|_| {
                self.invalid_value(row, column, format!("expected an integer, found '{}'", s))
            }),
        }
    }

    pub(crate) fn key_at(&self, row: usize, column: usize) -> Option<String> {
        self.cell(row, column).as_key()
    }

    fn invalid_value(&self, row: usize, column: usize, details: String) -> ReconciliationError {
        ReconciliationError::InvalidValue {
            column: self.columns.get(column).cloned().unwrap_or_default(),
            row: row + 1,
            details,
        }
    }
}
