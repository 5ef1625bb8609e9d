use anyhow::{anyhow, Error};
use chrono::{NaiveDate, NaiveTime, Utc};
use rand::Rng as _;
use rust_decimal::Decimal;
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::format::format_number;

const ID_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 7;

pub const MANUAL_RECORD_TITLE: &str = "Manually added record";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Millisecond timestamp followed by a random base-36 suffix, so ids
    /// created within the same millisecond still differ.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| char::from(ID_SUFFIX_ALPHABET[rng.gen_range(0..ID_SUFFIX_ALPHABET.len())]))
            .collect();
        Self(format!("{}{suffix}", Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Manual,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    Manual {
        description: Option<String>,
    },
    File {
        filename: String,
        cell_position: String,
    },
}

impl Provenance {
    pub fn source(&self) -> Source {
        match self {
            Provenance::Manual { .. } => Source::Manual,
            Provenance::File { .. } => Source::File,
        }
    }
}

/// One ledger entry. Positive amounts are income, negative amounts expenses.
/// The epoch timestamp and the formatted amount are always derived from
/// `date` and `amount`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(into = "StoredRecord", try_from = "StoredRecord")]
pub struct Record {
    id: RecordId,
    title: String,
    date: NaiveDate,
    amount: Decimal,
    provenance: Provenance,
}

impl Record {
    pub fn new(
        id: RecordId,
        title: String,
        date: NaiveDate,
        amount: Decimal,
        provenance: Provenance,
    ) -> Self {
        Self {
            id,
            title,
            date,
            amount,
            provenance,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Milliseconds since the epoch at midnight UTC of `date`.
    pub fn timestamp(&self) -> i64 {
        self.date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn formatted_amount(&self) -> String {
        format_number(self.amount.abs())
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn source(&self) -> Source {
        self.provenance.source()
    }

    /// Name of the imported file for file records.
    pub fn filename(&self) -> Option<&str> {
        match &self.provenance {
            Provenance::File { filename, .. } => Some(filename),
            Provenance::Manual { .. } => None,
        }
    }
}

/// On-disk shape of a record.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    id: RecordId,
    title: String,
    date: NaiveDate,
    #[serde(default, deserialize_with = "ignore_derived")]
    timestamp: Option<i64>,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    #[serde(default, deserialize_with = "ignore_derived")]
    formatted_amount: Option<String>,
    source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cell_position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

/// Derived fields are recomputed from `date` and `amount`, so whatever was
/// stored for them is skipped, whatever its type.
fn ignore_derived<'de, D: Deserializer<'de>, T>(deserializer: D) -> Result<Option<T>, D::Error> {
    IgnoredAny::deserialize(deserializer)?;
    Ok(None)
}

impl From<Record> for StoredRecord {
    fn from(record: Record) -> Self {
        let timestamp = Some(record.timestamp());
        let formatted_amount = Some(record.formatted_amount());
        let source = record.source();
        let (filename, cell_position, description) = match record.provenance {
            Provenance::Manual { description } => (None, None, description),
            Provenance::File {
                filename,
                cell_position,
            } => (Some(filename), Some(cell_position), None),
        };
        Self {
            id: record.id,
            title: record.title,
            date: record.date,
            timestamp,
            amount: record.amount,
            formatted_amount,
            source,
            filename,
            cell_position,
            description,
        }
    }
}

impl TryFrom<StoredRecord> for Record {
    type Error = Error;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let provenance = match stored.source {
            Source::Manual => Provenance::Manual {
                description: stored.description,
            },
            Source::File => Provenance::File {
                filename: stored
                    .filename
                    .ok_or_else(|| anyhow!("File record {} has no filename", stored.id))?,
                cell_position: stored.cell_position.unwrap_or_default(),
            },
        };
        Ok(Record {
            id: stored.id,
            title: stored.title,
            date: stored.date,
            amount: stored.amount,
            provenance,
        })
    }
}
