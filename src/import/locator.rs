use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::sheet::{CellValue, Sheet};

/// How the target cell of a report is found. All indices are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LookupPolicy {
    /// Always read the same cell.
    Fixed { row: u32, column: u32 },
    /// Find the row whose `row_search_column` cell reads `row_keyword` and the
    /// column whose `column_search_row` cell reads `column_keyword`, then read
    /// their intersection.
    Keyword {
        row_keyword: String,
        row_search_column: u32,
        column_keyword: String,
        column_search_row: u32,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("row keyword {keyword:?} not found in column {}", column_letters(*.column))]
    RowKeywordNotFound { keyword: String, column: u32 },
    #[error("column keyword {keyword:?} not found in row {row}")]
    ColumnKeywordNotFound { keyword: String, row: u32 },
    #[error("invalid cell coordinate (row {row}, column {column})")]
    InvalidCoordinate { row: u32, column: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocatedCell {
    pub row: u32,
    pub column: u32,
    pub address: String,
    /// `None` if the resolved cell is empty.
    pub value: Option<CellValue>,
}

pub fn locate(sheet: &impl Sheet, policy: &LookupPolicy) -> Result<LocatedCell, LookupError> {
    let (row, column) = match policy {
        LookupPolicy::Fixed { row, column } => {
            if *row == 0 || *column == 0 {
                return Err(LookupError::InvalidCoordinate {
                    row: *row,
                    column: *column,
                });
            }
            (*row, *column)
        }
        LookupPolicy::Keyword {
            row_keyword,
            row_search_column,
            column_keyword,
            column_search_row,
        } => {
            let row = find_row_index(sheet, row_keyword, *row_search_column).ok_or_else(|| {
                LookupError::RowKeywordNotFound {
                    keyword: row_keyword.clone(),
                    column: *row_search_column,
                }
            })?;
            let column = find_col_index(sheet, column_keyword, *column_search_row).ok_or_else(
                || LookupError::ColumnKeywordNotFound {
                    keyword: column_keyword.clone(),
                    row: *column_search_row,
                },
            )?;
            (row, column)
        }
    };
    Ok(LocatedCell {
        row,
        column,
        address: cell_address(row, column),
        value: sheet.cell(row, column).cloned(),
    })
}

/// First row whose cell in `search_column` reads exactly `keyword` after trimming.
pub fn find_row_index(sheet: &impl Sheet, keyword: &str, search_column: u32) -> Option<u32> {
    let (rows, _) = sheet.extent()?;
    (1..=rows).find(|row| cell_matches(sheet, *row, search_column, keyword))
}

/// First column whose cell in `search_row` reads exactly `keyword` after trimming.
pub fn find_col_index(sheet: &impl Sheet, keyword: &str, search_row: u32) -> Option<u32> {
    let (_, columns) = sheet.extent()?;
    (1..=columns).find(|column| cell_matches(sheet, search_row, *column, keyword))
}

fn cell_matches(sheet: &impl Sheet, row: u32, column: u32, keyword: &str) -> bool {
    sheet
        .cell(row, column)
        .map(|value| value.as_text().trim() == keyword)
        .unwrap_or(false)
}

/// `1 -> A`, `26 -> Z`, `27 -> AA`.
pub fn column_letters(column: u32) -> String {
    let mut letters = Vec::new();
    let mut remaining = column;
    while remaining > 0 {
        let digit = (remaining - 1) % 26;
        letters.push(char::from(b'A' + digit as u8));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

pub fn cell_address(row: u32, column: u32) -> String {
    format!("{}{row}", column_letters(column))
}
