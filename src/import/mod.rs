use anyhow::Result;
use chrono::{Datelike as _, Local};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

mod amount;
mod builder;
mod filename_date;
mod locator;
mod sheet;

pub use amount::{parse_amount, parse_amount_or_zero, parse_amount_str, AmountError};
pub use builder::{
    build_manual_record, preview_sheet, EntryKind, ExtractError, FilePreview, ManualEntry,
};
pub use filename_date::{extract_date, extract_date_with_source, FilenamePattern};
pub use locator::{
    cell_address, column_letters, find_col_index, find_row_index, locate, LocatedCell,
    LookupError, LookupPolicy,
};
pub use sheet::{decode_first_sheet, CellValue, Grid, Sheet};

use crate::config::Settings;
use crate::db::{claimed_filenames, Record};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// Settings for one import batch, fixed when the batch starts.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub pattern: FilenamePattern,
    pub lookup: LookupPolicy,
    pub reference_year: i32,
}

impl ImportSettings {
    /// `year` overrides the reference year, which defaults to the current year.
    pub fn new(settings: &Settings, year: Option<i32>) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            pattern: settings.filename_pattern()?,
            lookup: settings.lookup.clone(),
            reference_year: year.unwrap_or_else(|| Local::now().year()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStatus {
    Valid,
    NotSpreadsheet,
    InvalidName,
    AlreadyImported,
    DuplicateInBatch,
}

impl CandidateStatus {
    pub fn reason(self) -> Option<&'static str> {
        match self {
            CandidateStatus::Valid => None,
            CandidateStatus::NotSpreadsheet => Some("not an Excel file"),
            CandidateStatus::InvalidName => Some("filename does not match pattern"),
            CandidateStatus::AlreadyImported => Some("file already imported"),
            CandidateStatus::DuplicateInBatch => Some("file selected twice"),
        }
    }
}

/// A file selected for import, before it is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub filename: String,
    pub size: Option<u64>,
    pub status: CandidateStatus,
}

impl Candidate {
    pub fn is_valid(&self) -> bool {
        self.status == CandidateStatus::Valid
    }

    pub fn file_type(&self) -> &'static str {
        if is_spreadsheet(&self.filename) {
            "Excel file"
        } else {
            "unknown file type"
        }
    }
}

fn is_spreadsheet(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

pub fn filename_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Classifies selected files. Only valid candidates are read later on.
pub fn screen_candidates(
    files: impl IntoIterator<Item = (PathBuf, Option<u64>)>,
    pattern: &FilenamePattern,
    existing: &[Record],
) -> Vec<Candidate> {
    let imported = claimed_filenames(existing);
    let mut staged: HashSet<String> = HashSet::new();
    files
        .into_iter()
        .map(|(path, size)| {
            let filename = filename_of(&path);
            let status = if !is_spreadsheet(&filename) {
                CandidateStatus::NotSpreadsheet
            } else if !pattern.is_match(&filename) {
                CandidateStatus::InvalidName
            } else if imported.contains(filename.as_str()) {
                CandidateStatus::AlreadyImported
            } else if !staged.insert(filename.clone()) {
                CandidateStatus::DuplicateInBatch
            } else {
                CandidateStatus::Valid
            };
            Candidate {
                path,
                filename,
                size,
                status,
            }
        })
        .collect()
}

/// Reads, decodes and evaluates every valid candidate concurrently. A failing
/// file only fails its own preview. `on_done` runs as each file finishes.
pub async fn preview_candidates(
    candidates: &[Candidate],
    settings: &ImportSettings,
    on_done: impl Fn(&FilePreview),
) -> Vec<FilePreview> {
    let on_done = &on_done;
    join_all(
        candidates
            .iter()
            .filter(|candidate| candidate.is_valid())
            .map(|candidate| async move {
                let preview = preview_file(&candidate.path, &candidate.filename, settings).await;
                on_done(&preview);
                preview
            }),
    )
    .await
}

async fn preview_file(path: &Path, filename: &str, settings: &ImportSettings) -> FilePreview {
    let unreadable = |reason: String| {
        log::warn!("Failed to read {}: {reason}", path.display());
        FilePreview::failed(
            filename.to_string(),
            settings
                .pattern
                .extract_date(filename, settings.reference_year),
            ExtractError::Unreadable(reason),
        )
    };
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(err) => return unreadable(err.to_string()),
    };
    match tokio::task::spawn_blocking(move || decode_first_sheet(content)).await {
        Ok(Ok(grid)) => preview_sheet(filename, &grid, settings),
        Ok(Err(err)) => unreadable(format!("{err:#}")),
        Err(err) => unreadable(err.to_string()),
    }
}

/// Sum of all amounts that would be imported, `None` if it overflows.
pub fn preview_total(previews: &[FilePreview]) -> Option<Decimal> {
    previews
        .iter()
        .filter_map(|preview| preview.amount.as_ref().ok())
        .try_fold(Decimal::ZERO, |sum, amount| sum.checked_add(*amount))
}

/// New records for every importable preview, in preview order.
pub fn importable_records(previews: Vec<FilePreview>) -> Vec<Record> {
    previews
        .into_iter()
        .filter_map(|preview| preview.into_record().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::db::testutils::file_record;

    fn pattern() -> FilenamePattern {
        FilenamePattern::new(r"(\d+)月(\d+)日财报\.xlsx").unwrap()
    }

    fn settings() -> ImportSettings {
        ImportSettings {
            pattern: pattern(),
            lookup: LookupPolicy::Fixed { row: 2, column: 3 },
            reference_year: 2023,
        }
    }

    fn files(names: &[&str]) -> Vec<(PathBuf, Option<u64>)> {
        names
            .iter()
            .map(|name| (PathBuf::from("/reports").join(name), Some(2048)))
            .collect()
    }

    #[test]
    fn screening_classifies_files() {
        let existing = vec![file_record("1", "8月5日财报.xlsx", 2023, 8, 5, "12500")];
        let candidates = screen_candidates(
            files(&[
                "8月6日财报.xlsx",
                "8月5日财报.xlsx",
                "notes.txt",
                "季度调整.xlsx",
                "8月6日财报.xlsx",
                "8月7日财报.XLSX",
            ]),
            &pattern(),
            &existing,
        );
        let statuses: Vec<CandidateStatus> =
            candidates.iter().map(|candidate| candidate.status).collect();
        assert_eq!(
            vec![
                CandidateStatus::Valid,
                CandidateStatus::AlreadyImported,
                CandidateStatus::NotSpreadsheet,
                CandidateStatus::InvalidName,
                CandidateStatus::DuplicateInBatch,
                CandidateStatus::InvalidName,
            ],
            statuses
        );
        assert_eq!("8月6日财报.xlsx", candidates[0].filename);
        assert_eq!("Excel file", candidates[0].file_type());
        assert_eq!("unknown file type", candidates[2].file_type());
        assert_eq!(Some("file already imported"), candidates[1].status.reason());
        assert_eq!(None, candidates[0].status.reason());
    }

    #[test]
    fn same_name_twice_yields_one_valid_candidate() {
        let candidates = screen_candidates(
            files(&["8月5日财报.xlsx", "8月5日财报.xlsx"]),
            &pattern(),
            &[],
        );
        assert_eq!(1, candidates.iter().filter(|c| c.is_valid()).count());
    }

    #[test]
    fn reference_year_defaults_to_current_year() {
        let settings = ImportSettings::new(&Settings::default(), None).unwrap();
        assert_eq!(Local::now().year(), settings.reference_year);
        let settings = ImportSettings::new(&Settings::default(), Some(2020)).unwrap();
        assert_eq!(2020, settings.reference_year);
    }

    #[tokio::test]
    async fn unreadable_files_fail_individually() {
        let tempdir = tempfile::tempdir().unwrap();
        let garbage = tempdir.path().join("8月5日财报.xlsx");
        std::fs::write(&garbage, "not a workbook").unwrap();
        let missing = tempdir.path().join("8月6日财报.xlsx");

        let candidates =
            screen_candidates(vec![(garbage, None), (missing, None)], &pattern(), &[]);
        let done = AtomicUsize::new(0);
        let previews = preview_candidates(&candidates, &settings(), |_| {
            done.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        assert_eq!(2, done.load(Ordering::SeqCst));
        assert_eq!(2, previews.len());
        for preview in &previews {
            assert!(matches!(preview.error(), Some(ExtractError::Unreadable(_))));
        }
        assert_eq!(chrono::NaiveDate::from_ymd_opt(2023, 8, 5), previews[0].date);
        assert!(importable_records(previews).is_empty());
    }

    #[tokio::test]
    async fn failing_file_does_not_affect_the_rest_of_the_batch() {
        let tempdir = tempfile::tempdir().unwrap();
        let good = tempdir.path().join("8月5日财报.xlsx");
        std::fs::write(&good, include_bytes!("testdata/report.xlsx")).unwrap();
        let garbage = tempdir.path().join("8月6日财报.xlsx");
        std::fs::write(&garbage, "not a workbook").unwrap();

        let candidates =
            screen_candidates(vec![(garbage, None), (good, None)], &pattern(), &[]);
        let previews = preview_candidates(&candidates, &settings(), |_| {}).await;

        assert_eq!(2, previews.len());
        assert!(matches!(previews[0].error(), Some(ExtractError::Unreadable(_))));
        assert_eq!("8月5日财报.xlsx", previews[1].filename);
        assert_eq!(Some("C2".to_string()), previews[1].cell_address);
        assert_eq!(Ok(Decimal::new(125005, 1)), previews[1].amount);

        let records = importable_records(previews);
        assert_eq!(1, records.len());
        assert_eq!(Some("8月5日财报.xlsx"), records[0].filename());
        assert_eq!(Decimal::new(125005, 1), records[0].amount());
    }

    #[test]
    fn preview_total_overflow_is_none() {
        let huge = |name: &str| FilePreview {
            filename: name.to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2023, 8, 5),
            cell_address: Some("C2".to_string()),
            amount: Ok(Decimal::MAX),
        };
        assert_eq!(
            None,
            preview_total(&[huge("8月5日财报.xlsx"), huge("8月6日财报.xlsx")])
        );
    }

    #[test]
    fn totals_and_records_skip_failures() {
        let ok = |name: &str, cell: &str| {
            preview_sheet(name, &Grid::new().with_cell(2, 3, cell), &settings())
        };
        let previews = vec![
            ok("8月5日财报.xlsx", "12,500"),
            ok("8月6日财报.xlsx", "未知"),
            ok("8月7日财报.xlsx", "-200.5"),
        ];
        assert_eq!(Some(Decimal::new(122995, 1)), preview_total(&previews));

        let records = importable_records(previews);
        let names: Vec<&str> = records.iter().map(|r| r.title()).collect();
        assert_eq!(vec!["8月5日财报.xlsx", "8月7日财报.xlsx"], names);
    }
}
