use std::collections::{hash_map::Entry, HashMap, HashSet};

use super::record::{Record, RecordId};

#[derive(Debug)]
pub struct BatchOutcome {
    /// The new ledger: accepted candidates first, then the previous records.
    pub ledger: Vec<Record>,
    pub accepted: Vec<RecordId>,
    /// Candidates whose filename was already claimed.
    pub duplicates: Vec<Record>,
}

/// Filenames of all file records in `records`.
pub fn claimed_filenames(records: &[Record]) -> HashSet<&str> {
    records.iter().filter_map(Record::filename).collect()
}

/// Prepends `candidates` to `existing`. A file candidate is rejected if its
/// filename is already used by a file record in `existing` or by an earlier
/// candidate of the same batch.
pub fn import_batch(candidates: Vec<Record>, existing: Vec<Record>) -> BatchOutcome {
    let mut claimed: HashSet<String> = claimed_filenames(&existing)
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut accepted = Vec::with_capacity(candidates.len());
    let mut duplicates = Vec::new();
    for candidate in candidates {
        let is_new = match candidate.filename() {
            Some(filename) => claimed.insert(filename.to_string()),
            None => true,
        };
        if is_new {
            accepted.push(candidate);
        } else {
            duplicates.push(candidate);
        }
    }

    let accepted_ids = accepted.iter().map(|record| record.id().clone()).collect();
    accepted.extend(existing);
    BatchOutcome {
        ledger: accepted,
        accepted: accepted_ids,
        duplicates,
    }
}

/// Merges `incoming` into `existing` by record id. Records from `incoming`
/// replace existing records with the same id in place; new ids are appended
/// in the order they arrive.
pub fn merge_by_identity(incoming: Vec<Record>, existing: Vec<Record>) -> Vec<Record> {
    let mut merged: Vec<Record> = Vec::with_capacity(existing.len() + incoming.len());
    let mut positions: HashMap<RecordId, usize> = HashMap::new();
    for record in existing.into_iter().chain(incoming) {
        match positions.entry(record.id().clone()) {
            Entry::Occupied(entry) => {
                merged[*entry.get()] = record;
            }
            Entry::Vacant(entry) => {
                entry.insert(merged.len());
                merged.push(record);
            }
        }
    }
    merged
}

pub fn delete_by_id(id: &RecordId, mut existing: Vec<Record>) -> Vec<Record> {
    existing.retain(|record| record.id() != id);
    existing
}
