//! String-keyed hash table used for globals, method tables, and instance fields.

use std::rc::Rc;

use ahash::AHashMap;

use super::Value;

/// A hash map from string keys to values. Keys compare by content.
#[derive(Debug, Clone)]
pub struct Table<V = Value> {
    entries: AHashMap<Rc<str>, V>,
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Insert or overwrite `key`. Returns true if the key was not present before.
    pub fn set(&mut self, key: Rc<str>, value: V) -> bool {
        self.entries.insert(key, value).is_none()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Empty the table and hand back its values.
    pub fn take_values(&mut self) -> Vec<V> {
        self.entries.drain().map(|(_, value)| value).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &V)> {
        self.entries.iter()
    }
}

impl<V: Clone> Table<V> {
    /// Copy every entry of `from` into this table, overwriting existing keys.
    pub fn add_all(&mut self, from: &Table<V>) {
        for (key, value) in from.iter() {
            self.entries.insert(key.clone(), value.clone());
        }
    }
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}
