//! Stable two-way mapping between items and dense integer indices.

use std::hash::Hash;
use std::ops::Index;

use rustc_hash::FxHashMap;

/// Assigns each distinct item the next free index on first sight. Indices never change once
/// assigned, so a lookup built once can be shared by reference with every downstream component.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T: Eq + Hash> {
    item_to_index: FxHashMap<T, usize>,
    index_to_item: Vec<T>,
}
impl<T: Eq + Hash + Clone> Lookup<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            item_to_index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            index_to_item: Vec::with_capacity(capacity),
        }
    }

    /// Returns the index of `item`, assigning a new one if the item has not been seen.
    pub fn intern(&mut self, item: &T) -> usize {
        if let Some(&index) = self.item_to_index.get(item) {
            return index;
        }
        let index = self.index_to_item.len();
        self.item_to_index.insert(item.clone(), index);
        self.index_to_item.push(item.clone());
        index
    }

    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.item_to_index.get(item).copied()
    }

    pub fn item_at(&self, index: usize) -> Option<&T> {
        self.index_to_item.get(index)
    }

    pub fn len(&self) -> usize {
        self.index_to_item.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_item.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.index_to_item
    }
}

impl<T: Eq + Hash + Clone> Default for Lookup<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T: Eq + Hash> Index<usize> for Lookup<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.index_to_item
            .get(index)
            .unwrap_or_else(|| panic!("no item at index {index}"))
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for Lookup<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut lookup = Lookup::default();
        for item in iter {
            lookup.intern(&item);
        }
        lookup
    }
}
