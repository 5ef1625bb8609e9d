use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use super::{
    amount::{parse_amount, AmountError},
    locator::{locate, LookupError},
    sheet::Sheet,
    ImportSettings,
};
use crate::db::{Provenance, Record, RecordId, MANUAL_RECORD_TITLE};
use crate::format::format_number;

/// Why a file can't be imported.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("failed to read spreadsheet: {0}")]
    Unreadable(String),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("could not infer date from filename")]
    NoDate,
}

/// What was extracted from one file, whether it succeeded or not.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePreview {
    pub filename: String,
    pub date: Option<NaiveDate>,
    /// `None` if the target cell couldn't be resolved.
    pub cell_address: Option<String>,
    pub amount: Result<Decimal, ExtractError>,
}

impl FilePreview {
    pub fn failed(filename: String, date: Option<NaiveDate>, error: ExtractError) -> Self {
        Self {
            filename,
            date,
            cell_address: None,
            amount: Err(error),
        }
    }

    pub fn is_importable(&self) -> bool {
        self.amount.is_ok()
    }

    pub fn error(&self) -> Option<&ExtractError> {
        self.amount.as_ref().err()
    }

    pub fn formatted_amount(&self) -> Option<String> {
        self.amount.as_ref().ok().map(|amount| format_number(amount.abs()))
    }

    /// Turns a successful preview into a new file record.
    pub fn into_record(self) -> Result<Record, ExtractError> {
        let amount = self.amount?;
        let date = self.date.ok_or(ExtractError::NoDate)?;
        Ok(Record::new(
            RecordId::generate(),
            self.filename.clone(),
            date,
            amount,
            Provenance::File {
                filename: self.filename,
                cell_position: self.cell_address.unwrap_or_default(),
            },
        ))
    }
}

/// Locates and parses the target figure of an already decoded report.
pub fn preview_sheet(filename: &str, sheet: &impl Sheet, settings: &ImportSettings) -> FilePreview {
    let date = settings
        .pattern
        .extract_date(filename, settings.reference_year);
    let located = match locate(sheet, &settings.lookup) {
        Ok(located) => located,
        Err(err) => return FilePreview::failed(filename.to_string(), date, err.into()),
    };
    let amount = parse_amount(located.value.as_ref())
        .map_err(ExtractError::from)
        .and_then(|amount| date.map(|_| amount).ok_or(ExtractError::NoDate));
    FilePreview {
        filename: filename.to_string(),
        date,
        cell_address: Some(located.address),
        amount,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EntryKind {
    Income,
    Expense,
}

#[derive(Debug, Clone)]
pub struct ManualEntry {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub description: Option<String>,
}

/// Expenses are always stored as negative amounts; income keeps the typed sign.
pub fn build_manual_record(entry: ManualEntry) -> Record {
    let amount = match entry.kind {
        EntryKind::Income => entry.amount,
        EntryKind::Expense => -entry.amount.abs(),
    };
    let description = entry
        .description
        .map(|description| description.trim().to_string())
        .filter(|description| !description.is_empty());
    let title = description
        .clone()
        .unwrap_or_else(|| MANUAL_RECORD_TITLE.to_string());
    Record::new(
        RecordId::generate(),
        title,
        entry.date,
        amount,
        Provenance::Manual { description },
    )
}
