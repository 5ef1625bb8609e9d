use anyhow::{anyhow, Context as _, Result};
use calamine::{Data, Range, Reader as _};
use std::{borrow::Cow, collections::HashMap, fmt, io::Cursor};

/// Value of a non-empty cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    /// Text form used for keyword comparison.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Text(text) => Cow::Borrowed(text.as_str()),
            CellValue::Number(number) => Cow::Owned(number.to_string()),
            CellValue::Bool(value) => Cow::Owned(value.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// A grid of cells addressed by 1-based `(row, column)`.
pub trait Sheet {
    /// Number of rows and columns in the declared range, `None` for an empty sheet.
    fn extent(&self) -> Option<(u32, u32)>;

    /// `None` for cells that are empty or outside the declared range.
    fn cell(&self, row: u32, column: u32) -> Option<&CellValue>;
}

/// Sparse in-memory sheet. The declared range always starts at `A1` and grows
/// to cover the furthest cell that was set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    cells: HashMap<(u32, u32), CellValue>,
    rows: u32,
    columns: u32,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, row: u32, column: u32, value: impl Into<CellValue>) {
        assert!(row >= 1 && column >= 1, "Cell coordinates are 1-based");
        self.rows = self.rows.max(row);
        self.columns = self.columns.max(column);
        self.cells.insert((row, column), value.into());
    }

    pub fn with_cell(mut self, row: u32, column: u32, value: impl Into<CellValue>) -> Self {
        self.set(row, column, value);
        self
    }

    /// Widens the declared range without adding cells.
    pub fn with_extent(mut self, rows: u32, columns: u32) -> Self {
        self.rows = self.rows.max(rows);
        self.columns = self.columns.max(columns);
        self
    }

    fn from_range(range: &Range<Data>) -> Self {
        let mut grid = Grid::new();
        let (Some((start_row, start_column)), Some((end_row, end_column))) =
            (range.start(), range.end())
        else {
            return grid;
        };
        for (row, column, data) in range.cells() {
            if let Some(value) = cell_value(data) {
                grid.set(
                    start_row + row as u32 + 1,
                    start_column + column as u32 + 1,
                    value,
                );
            }
        }
        grid.with_extent(end_row + 1, end_column + 1)
    }
}

impl Sheet for Grid {
    fn extent(&self) -> Option<(u32, u32)> {
        if self.rows == 0 || self.columns == 0 {
            None
        } else {
            Some((self.rows, self.columns))
        }
    }

    fn cell(&self, row: u32, column: u32) -> Option<&CellValue> {
        self.cells.get(&(row, column))
    }
}

fn cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::Int(value) => Some(CellValue::Number(*value as f64)),
        Data::Float(value) => Some(CellValue::Number(*value)),
        Data::String(value) => Some(CellValue::Text(value.clone())),
        Data::Bool(value) => Some(CellValue::Bool(*value)),
        Data::DateTime(value) => Some(CellValue::Number(value.as_f64())),
        Data::DateTimeIso(value) | Data::DurationIso(value) => {
            Some(CellValue::Text(value.clone()))
        }
        Data::Error(error) => Some(CellValue::Text(error.to_string())),
    }
}

/// Decodes the first worksheet of an xlsx/xls workbook.
pub fn decode_first_sheet(content: Vec<u8>) -> Result<Grid> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(content))
        .context("Failed to open workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("Workbook has no worksheets"))?
        .context("Failed to read first worksheet")?;
    Ok(Grid::from_range(&range))
}
