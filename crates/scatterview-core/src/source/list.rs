use std::collections::HashSet;

use crate::error::{Result, ScanviewError};

/// Explicitly ordered, duplicate-free sequence of scan identifiers.
///
/// Position in the list is the scan index used for image selection and for
/// the x-axis of the accumulated statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanList {
    ids: Vec<String>,
}

impl ScanList {
    /// Build from identifiers in source order. Later duplicates are dropped.
    pub fn new(ids: impl IntoIterator<Item = String>) -> Self {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self { ids }
    }

    /// Build with lexicographic order, for sources whose listing order is
    /// not guaranteed.
    pub fn sorted(ids: impl IntoIterator<Item = String>) -> Self {
        let mut list = Self::new(ids);
        list.ids.sort();
        list
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&str> {
        self.ids
            .get(index)
            .map(String::as_str)
            .ok_or(ScanviewError::IndexOutOfRange {
                index,
                total: self.ids.len(),
            })
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|x| x == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.ids.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }

    /// Merge a fresh listing into this one without reordering known scans.
    ///
    /// Identifiers still present keep their relative order, vanished ones are
    /// dropped, and new ones are appended in the order `fresh` lists them.
    pub fn reconcile(&self, fresh: &ScanList) -> ScanList {
        let current: HashSet<&str> = fresh.iter().collect();
        let known: HashSet<&str> = self.iter().collect();

        let kept = self.iter().filter(|id| current.contains(id));
        let added = fresh.iter().filter(|id| !known.contains(id));
        ScanList {
            ids: kept.chain(added).map(str::to_string).collect(),
        }
    }
}

impl From<ScanList> for Vec<String> {
    fn from(list: ScanList) -> Self {
        list.ids
    }
}
