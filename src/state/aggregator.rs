use crate::extract::Record;
use std::collections::HashSet;

/// Collects records in completion order
///
/// No deduplication happens by default: a record reachable through two
/// navigation paths is stored twice. With dedupe enabled, records whose
/// identity was already collected are dropped.
#[derive(Debug)]
pub struct ResultAggregator<R> {
    records: Vec<R>,
    seen: Option<HashSet<String>>,
    duplicates: u64,
}

impl<R: Record> ResultAggregator<R> {
    pub fn new(dedupe: bool) -> Self {
        Self {
            records: Vec::new(),
            seen: dedupe.then(HashSet::new),
            duplicates: 0,
        }
    }

    /// Adds one record, returning false if it was dropped as a duplicate
    pub fn push(&mut self, record: R) -> bool {
        if let Some(seen) = self.seen.as_mut() {
            if !seen.insert(record.identity()) {
                self.duplicates += 1;
                return false;
            }
        }
        self.records.push(record);
        true
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = R>) {
        for record in records {
            self.push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records dropped by the dedupe consumer
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Final record set, in arrival order
    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}
