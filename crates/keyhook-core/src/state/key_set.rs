// Keyhook Key Sets
// Sorted scan-code sets used for pressed-state tracking and chord lookups

use std::collections::BTreeSet;

use crate::key::ScanCode;

/// A set of scan codes that always iterates in ascending order.
///
/// Sorted iteration means a set can be turned straight into a transition
/// table chord without re-sorting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeySet {
    codes: BTreeSet<ScanCode>,
}

impl KeySet {
    /// Create a new empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a code, returns false if it was already present
    pub fn insert(&mut self, code: ScanCode) -> bool {
        self.codes.insert(code)
    }

    /// Remove a code, returns false if it was absent
    pub fn remove(&mut self, code: ScanCode) -> bool {
        self.codes.remove(&code)
    }

    pub fn contains(&self, code: ScanCode) -> bool {
        self.codes.contains(&code)
    }

    pub fn clear(&mut self) {
        self.codes.clear();
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Codes in ascending order
    pub fn iter(&self) -> impl Iterator<Item = ScanCode> + '_ {
        self.codes.iter().copied()
    }

    /// Codes in ascending order, collected
    pub fn to_vec(&self) -> Vec<ScanCode> {
        self.iter().collect()
    }

    /// Codes in `self` but not in `other`, ascending
    pub fn difference<'a>(&'a self, other: &'a KeySet) -> impl Iterator<Item = ScanCode> + 'a {
        self.codes.difference(&other.codes).copied()
    }

    /// Sorted chord made of these codes plus `extra`
    pub fn chord_with(&self, extra: ScanCode) -> Vec<ScanCode> {
        let mut codes = self.codes.clone();
        codes.insert(extra);
        codes.into_iter().collect()
    }
}

impl FromIterator<ScanCode> for KeySet {
    fn from_iter<I: IntoIterator<Item = ScanCode>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a ScanCode;
    type IntoIter = std::collections::btree_set::Iter<'a, ScanCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.codes.iter()
    }
}
