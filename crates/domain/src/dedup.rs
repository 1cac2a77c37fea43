//! Bounded, insertion-ordered history of already-notified item identifiers

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of identifiers remembered per subscriber
pub const DEFAULT_HISTORY_CAP: usize = 50;

/// FIFO set of identifiers a subscriber has already been notified about.
///
/// Oldest identifiers sit at the front and are evicted first once the
/// history grows past its cap. All operations take and return the history by
/// value so the only way state changes is through an explicit persist step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupHistory {
    ids: VecDeque<String>,
}

impl DedupHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from identifiers ordered oldest first
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the identifier has already been notified
    pub fn seen(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    /// Record an identifier, evicting the oldest entries beyond `cap`.
    ///
    /// Appending an identifier that is already present leaves its original
    /// position untouched.
    pub fn append(mut self, id: impl Into<String>, cap: usize) -> Self {
        let id = id.into();
        if !self.seen(&id) {
            self.ids.push_back(id);
        }
        self.trim(cap)
    }

    /// Drop the oldest identifiers until at most `cap` remain
    pub fn trim(mut self, cap: usize) -> Self {
        while self.ids.len() > cap {
            self.ids.pop_front();
        }
        self
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}
