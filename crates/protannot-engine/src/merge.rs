//! Priority-preserving identifier merge
//!
//! Ids from the primary list keep their relative order and come first;
//! previously unseen ids from the secondary list follow in their own order.
//! The first occurrence of an id wins, including its source, rank and
//! metrics. The rule is priority-preserving, not score-preserving, so a
//! strong secondary hit never jumps ahead of a weak primary one, and
//! argument order matters at every call site.

use crate::model::{EvidenceHit, EvidenceList};
use serde::Serialize;
use std::collections::HashSet;

/// Ordered, duplicate-free identifiers with first-seen provenance
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergedIdSet {
    entries: Vec<EvidenceHit>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl MergedIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every unseen id of `hits`, in order
    pub fn extend_with<'a>(&mut self, hits: impl IntoIterator<Item = &'a EvidenceHit>) {
        for hit in hits {
            if self.seen.insert(hit.id.clone()) {
                self.entries.push(hit.clone());
            }
        }
    }

    pub fn entries(&self) -> &[EvidenceHit] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|h| h.id.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&EvidenceList> for MergedIdSet {
    fn from(list: &EvidenceList) -> Self {
        let mut set = MergedIdSet::new();
        set.extend_with(list);
        set
    }
}

impl<'a> IntoIterator for &'a MergedIdSet {
    type Item = &'a EvidenceHit;
    type IntoIter = std::slice::Iter<'a, EvidenceHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl PartialEq for MergedIdSet {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

/// Merge `primary` then `secondary`. Not commutative.
pub fn merge(primary: &EvidenceList, secondary: &EvidenceList) -> MergedIdSet {
    let mut set = MergedIdSet::from(primary);
    set.extend_with(secondary);
    set
}

/// Left fold of [`merge`] over `lists`, earliest list has highest priority
pub fn merge_all<'a>(lists: impl IntoIterator<Item = &'a EvidenceList>) -> MergedIdSet {
    let mut set = MergedIdSet::new();
    for list in lists {
        set.extend_with(list);
    }
    set
}
