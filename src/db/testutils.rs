use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::record::{Provenance, Record, RecordId};

pub fn file_record(id: &str, filename: &str, year: i32, month: u32, day: u32, amount: &str) -> Record {
    Record::new(
        RecordId::new(id.to_string()),
        filename.to_string(),
        NaiveDate::from_ymd_opt(year, month, day).unwrap(),
        Decimal::from_str(amount).unwrap(),
        Provenance::File {
            filename: filename.to_string(),
            cell_position: "C2".to_string(),
        },
    )
}

pub fn manual_record(id: &str, title: &str, year: i32, month: u32, day: u32, amount: &str) -> Record {
    Record::new(
        RecordId::new(id.to_string()),
        title.to_string(),
        NaiveDate::from_ymd_opt(year, month, day).unwrap(),
        Decimal::from_str(amount).unwrap(),
        Provenance::Manual {
            description: Some(title.to_string()),
        },
    )
}

pub fn ids(records: &[Record]) -> Vec<&str> {
    records.iter().map(|record| record.id().as_str()).collect()
}
