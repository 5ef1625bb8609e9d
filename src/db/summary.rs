use chrono::{Datelike as _, NaiveDate};
use rust_decimal::Decimal;

use super::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TimeRange {
    Month,
    Quarter,
    Year,
    All,
}

impl TimeRange {
    /// First day included in the range, `None` for [TimeRange::All].
    pub fn start(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            TimeRange::Month => today.with_day(1),
            TimeRange::Quarter => {
                let first_month = (today.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(today.year(), first_month, 1)
            }
            TimeRange::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1),
            TimeRange::All => None,
        }
    }

    pub fn filter<'a>(self, records: &'a [Record], today: NaiveDate) -> Vec<&'a Record> {
        let start = self.start(today);
        records
            .iter()
            .filter(|record| start.map(|start| record.date() >= start).unwrap_or(true))
            .collect()
    }
}

/// Signed sum of the amounts, `None` if it overflows.
pub fn total<'a>(records: impl IntoIterator<Item = &'a Record>) -> Option<Decimal> {
    records
        .into_iter()
        .try_fold(Decimal::ZERO, |sum, record| sum.checked_add(record.amount()))
}
