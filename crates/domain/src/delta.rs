//! Delta engine - compares a fresh snapshot against persisted subscriber state
//!
//! Two strategies share one interface:
//! - [`KeywordDelta`] filters news items by keyword and reports the ones whose
//!   identifier is not in the subscriber's dedup history.
//! - [`FullListDelta`] diffs a follow list against the previous snapshot and
//!   reports additions and removals.

use std::collections::HashSet;

use crate::model::{Item, SubscriberState, WatchConfig};

/// Comparison mode selected by the shape of a watch configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaMode {
    /// New iff the identifier is not in the dedup history
    IdentifierSet,
    /// Additions and removals relative to the prior snapshot
    FullList,
}

/// Changes detected for one subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    /// First successful observation of a subject; seeds state without
    /// per-item alerts
    Initialized { snapshot: Vec<Item> },
    /// Items that appeared or disappeared since the last observation
    Changes {
        new_items: Vec<Item>,
        removed_items: Vec<Item>,
    },
}

impl Delta {
    /// Whether there is nothing to notify or persist
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Initialized { .. } => false,
            Self::Changes {
                new_items,
                removed_items,
            } => new_items.is_empty() && removed_items.is_empty(),
        }
    }

    pub fn new_items(&self) -> &[Item] {
        match self {
            Self::Changes { new_items, .. } => new_items,
            Self::Initialized { .. } => &[],
        }
    }

    pub fn removed_items(&self) -> &[Item] {
        match self {
            Self::Changes { removed_items, .. } => removed_items,
            Self::Initialized { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    #[error("Snapshot source returned no items")]
    EmptySnapshot,
}

/// A snapshot comparison strategy
pub trait DeltaStrategy: Send + Sync {
    fn mode(&self) -> DeltaMode;

    /// Compare `snapshot` against `state`. Items are reported in snapshot
    /// order; removed items in prior-snapshot order.
    fn compute(&self, snapshot: &[Item], state: &SubscriberState) -> Result<Delta, DeltaError>;
}

/// Identifier-set strategy for keyword watches
#[derive(Debug, Clone)]
pub struct KeywordDelta {
    keywords: Vec<String>,
}

impl KeywordDelta {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Case-insensitive match of any keyword against the item's display text
    pub fn matches(&self, item: &Item) -> bool {
        let text = item.display_text().to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

impl DeltaStrategy for KeywordDelta {
    fn mode(&self) -> DeltaMode {
        DeltaMode::IdentifierSet
    }

    fn compute(&self, snapshot: &[Item], state: &SubscriberState) -> Result<Delta, DeltaError> {
        if snapshot.is_empty() {
            return Err(DeltaError::EmptySnapshot);
        }

        let mut emitted = HashSet::new();
        let new_items = snapshot
            .iter()
            .filter(|item| self.matches(item))
            .filter(|item| !state.notified.seen(&item.id))
            .filter(|item| emitted.insert(item.id.as_str()))
            .cloned()
            .collect();

        Ok(Delta::Changes {
            new_items,
            removed_items: vec![],
        })
    }
}

/// Full-list strategy for follow watches
#[derive(Debug, Clone, Copy, Default)]
pub struct FullListDelta;

impl DeltaStrategy for FullListDelta {
    fn mode(&self) -> DeltaMode {
        DeltaMode::FullList
    }

    fn compute(&self, snapshot: &[Item], state: &SubscriberState) -> Result<Delta, DeltaError> {
        if snapshot.is_empty() {
            return Err(DeltaError::EmptySnapshot);
        }

        let current = dedup_by_id(snapshot);

        if state.prior_snapshot.is_empty() {
            return Ok(Delta::Initialized { snapshot: current });
        }

        let prior_ids: HashSet<&str> = state
            .prior_snapshot
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        let current_ids: HashSet<&str> = current.iter().map(|i| i.id.as_str()).collect();

        let new_items = current
            .iter()
            .filter(|i| !prior_ids.contains(i.id.as_str()))
            .cloned()
            .collect();

        let removed_items = dedup_by_id(&state.prior_snapshot)
            .into_iter()
            .filter(|i| !current_ids.contains(i.id.as_str()))
            .collect();

        Ok(Delta::Changes {
            new_items,
            removed_items,
        })
    }
}

/// Select the strategy matching a watch configuration
pub fn strategy_for(watch: &WatchConfig) -> Box<dyn DeltaStrategy> {
    match watch {
        WatchConfig::Keywords(keywords) => Box::new(KeywordDelta::new(keywords)),
        WatchConfig::Follow { .. } => Box::new(FullListDelta),
    }
}

/// Compute the delta for a subscriber's watch configuration
pub fn compute_delta(
    snapshot: &[Item],
    state: &SubscriberState,
    watch: &WatchConfig,
) -> Result<Delta, DeltaError> {
    strategy_for(watch).compute(snapshot, state)
}

/// Keep the first occurrence of each identifier, preserving order
pub fn dedup_by_id(items: &[Item]) -> Vec<Item> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|i| seen.insert(i.id.as_str()))
        .cloned()
        .collect()
}
