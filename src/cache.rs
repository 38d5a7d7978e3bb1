use std::collections::BTreeMap;

use crate::types::Candidate;

/// Results of slow directory searches, keyed by directory path.
///
/// Lives for the lifetime of the session. Entries never expire; they are
/// replaced by a later search of the same directory or removed on request.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: BTreeMap<String, Vec<Candidate>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact-string lookup
    pub fn get(&self, directory: &str) -> Option<&[Candidate]> {
        self.entries.get(directory).map(Vec::as_slice)
    }

    pub fn put(&mut self, directory: impl Into<String>, candidates: Vec<Candidate>) {
        let directory = directory.into();
        tracing::debug!(%directory, count = candidates.len(), "caching directory results");
        self.entries.insert(directory, candidates);
    }

    /// Remove one entry. Returns whether it existed.
    pub fn clear(&mut self, directory: &str) -> bool {
        self.entries.remove(directory).is_some()
    }

    /// Remove every entry. Returns how many there were.
    pub fn clear_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Cached directories in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
