//! Ordered, duplicate-key string map shared by headers, parameters and cookies.
//!
//! Entries are appended to a slot vector and never moved. Deleting an entry
//! turns its slot into a tombstone instead of compacting the storage, so an
//! index returned by [`OrderedMultiMap::find_key`] stays valid for the whole
//! life of the map. Callers rely on that to walk every occurrence of a name:
//!
//! ```
//! use stubnet::http::multimap::OrderedMultiMap;
//!
//! let mut map = OrderedMultiMap::new();
//! map.add("Accept", "text/html");
//! map.add("Accept", "application/json");
//!
//! let mut values = Vec::new();
//! let mut pos = map.find_key("Accept", 0);
//! while let Some(i) = pos {
//!     values.push(map.value_at(i).unwrap());
//!     pos = map.find_key("Accept", i + 1);
//! }
//! assert_eq!(values, ["text/html", "application/json"]);
//! ```
//!
//! Names are compared exactly. Higher-level types that want case-insensitive
//! lookups (see [`FakeRequest`](crate::http::request::FakeRequest)) normalize
//! the names before storing them.

use indexmap::IndexMap;

use crate::error::{Result, StubError};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    value: String,
}

#[derive(Debug, Clone, Default)]
pub struct OrderedMultiMap {
    // `None` marks a tombstone.
    slots: Vec<Option<Entry>>,
    live: usize,
}

impl OrderedMultiMap {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(16),
            live: 0,
        }
    }

    /// Drops every slot, tombstones included.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.live = 0;
    }

    /// Index of the first live entry named `key` at or after `offset`.
    pub fn find_key(&self, key: &str, offset: usize) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .skip(offset)
            .find_map(|(i, slot)| match slot {
                Some(entry) if entry.key == key => Some(i),
                _ => None,
            })
    }

    pub fn get(&self, key: &str, offset: usize) -> Option<&str> {
        self.find_key(key, offset).and_then(|i| self.value_at(i))
    }

    /// Value stored at a raw slot index, `None` for tombstones and out-of-range indices.
    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.slots
            .get(index)
            .and_then(|slot| slot.as_ref())
            .map(|entry| entry.value.as_str())
    }

    /// Every live value of `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        let mut values = Vec::new();
        let mut pos = self.find_key(key, 0);
        while let Some(i) = pos {
            if let Some(value) = self.value_at(i) {
                values.push(value);
            }
            pos = self.find_key(key, i + 1);
        }
        values
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find_key(key, 0).is_some()
    }

    pub fn add(&mut self, key: &str, value: &str) {
        self.slots.push(Some(Entry {
            key: key.to_string(),
            value: value.to_string(),
        }));
        self.live += 1;
    }

    /// Tombstones every live entry for `key`, then appends the new pair.
    pub fn add_unique(&mut self, key: &str, value: &str) {
        let mut pos = self.find_key(key, 0);
        while let Some(i) = pos {
            self.delete(key, i);
            pos = self.find_key(key, i);
        }

        self.add(key, value);
    }

    /// Overwrites the first live `key` at or after `offset` in place, or appends when there is none.
    pub fn update(&mut self, key: &str, value: &str, offset: usize) {
        match self.find_key(key, offset) {
            Some(i) => {
                if let Some(entry) = self.slots[i].as_mut() {
                    entry.value = value.to_string();
                }
            }
            None => self.add(key, value),
        }
    }

    /// Tombstones the first live `key` at or after `offset`. The slot is kept.
    pub fn delete(&mut self, key: &str, offset: usize) {
        if let Some(i) = self.find_key(key, offset) {
            self.slots[i] = None;
            self.live -= 1;
        }
    }

    /// Live keys in insertion order, repeated once per live occurrence.
    pub fn keys(&self) -> Keys<'_> {
        Keys {
            slots: self.slots.iter(),
        }
    }

    /// Live `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.slots
            .iter()
            .flatten()
            .map(|entry| (entry.key.as_str(), entry.value.as_str()))
    }

    /// Number of live entries.
    pub fn size(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots ever appended, tombstones included.
    pub fn raw_len(&self) -> usize {
        self.slots.len()
    }

    /// Read-only name -> values projection of the live entries.
    pub fn as_map(&self) -> ReadOnlyMultiMap {
        let mut entries: IndexMap<String, Vec<String>> = IndexMap::new();
        for (key, value) in self.iter() {
            entries
                .entry(key.to_string())
                .or_default()
                .push(value.to_string());
        }
        ReadOnlyMultiMap { entries }
    }
}

/// Iterator over the live keys of an [`OrderedMultiMap`].
///
/// A clone continues from the same position. Call [`OrderedMultiMap::keys`]
/// again to restart from the first slot.
#[derive(Debug, Clone)]
pub struct Keys<'a> {
    slots: std::slice::Iter<'a, Option<Entry>>,
}

impl<'a> Iterator for Keys<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.slots.by_ref().flatten().map(|entry| entry.key.as_str()).next()
    }
}

/// Immutable view returned by [`OrderedMultiMap::as_map`].
///
/// Keys keep first-seen order and each key maps to its values in insertion
/// order. The mutators exist so code written against a mutable map API gets a
/// typed refusal instead of silently mutating a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOnlyMultiMap {
    entries: IndexMap<String, Vec<String>>,
}

impl ReadOnlyMultiMap {
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn contains_value(&self, values: &[String]) -> bool {
        self.entries.values().any(|v| v.as_slice() == values)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn put(&mut self, _key: &str, _values: Vec<String>) -> Result<Option<Vec<String>>> {
        Err(StubError::UnsupportedOperation("put on a read-only map"))
    }

    pub fn put_all(&mut self, _other: &ReadOnlyMultiMap) -> Result<()> {
        Err(StubError::UnsupportedOperation("put_all on a read-only map"))
    }

    pub fn remove(&mut self, _key: &str) -> Result<Option<Vec<String>>> {
        Err(StubError::UnsupportedOperation("remove on a read-only map"))
    }

    pub fn clear(&mut self) -> Result<()> {
        Err(StubError::UnsupportedOperation("clear on a read-only map"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrences(map: &OrderedMultiMap, key: &str) -> Vec<usize> {
        let mut found = Vec::new();
        let mut pos = map.find_key(key, 0);
        while let Some(i) = pos {
            found.push(i);
            pos = map.find_key(key, i + 1);
        }
        found
    }

    #[test]
    fn find_key_walks_every_occurrence_in_order() {
        let mut map = OrderedMultiMap::new();
        map.add("a", "1");
        map.add("b", "2");
        map.add("a", "3");
        map.add("a", "4");

        assert_eq!(occurrences(&map, "a"), vec![0, 2, 3]);
        assert_eq!(map.get_all("a"), vec!["1", "3", "4"]);
        assert_eq!(map.find_key("missing", 0), None);
        assert_eq!(map.find_key("a", 4), None);
    }

    #[test]
    fn add_unique_leaves_one_live_occurrence() {
        let mut map = OrderedMultiMap::new();
        map.add("k", "1");
        map.add("other", "x");
        map.add("k", "2");
        map.add_unique("k", "3");

        let first = map.find_key("k", 0).unwrap();
        assert_eq!(map.find_key("k", first + 1), None);
        assert_eq!(map.get("k", 0), Some("3"));
        assert_eq!(map.size(), 2);
        assert_eq!(map.raw_len(), 4);
    }

    #[test]
    fn delete_tombstones_without_shrinking() {
        let mut map = OrderedMultiMap::new();
        map.add("k", "1");
        map.add("k", "2");

        map.delete("k", 0);

        assert_eq!(occurrences(&map, "k"), vec![1]);
        assert_eq!(map.size(), 1);
        assert_eq!(map.raw_len(), 2);
        assert_eq!(map.value_at(0), None);

        // a missing key is a no-op
        map.delete("nope", 0);
        assert_eq!(map.size(), 1);
    }

    #[test]
    fn delete_during_walk_keeps_indices_stable() {
        let mut map = OrderedMultiMap::new();
        for v in ["1", "2", "3", "4"] {
            map.add("x", v);
        }

        let mut seen = Vec::new();
        let mut pos = map.find_key("x", 0);
        while let Some(i) = pos {
            seen.push(map.value_at(i).unwrap().to_string());
            // drop every other occurrence ahead of the cursor
            map.delete("x", i + 1);
            pos = map.find_key("x", i + 1);
        }

        assert_eq!(seen, vec!["1", "3"]);
        assert_eq!(map.get_all("x"), vec!["1", "3"]);
        assert_eq!(map.raw_len(), 4);
    }

    #[test]
    fn update_overwrites_in_place_or_appends() {
        let mut map = OrderedMultiMap::new();
        map.add("a", "1");
        map.add("b", "2");
        map.add("a", "3");

        map.update("a", "updated", 1);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![("a", "1"), ("b", "2"), ("a", "updated")]);

        map.update("c", "new", 0);
        assert_eq!(map.find_key("c", 0), Some(3));
        assert_eq!(map.size(), 4);
    }

    #[test]
    fn keys_skip_tombstones_and_keep_duplicates() {
        let mut map = OrderedMultiMap::new();
        map.add("a", "1");
        map.add("b", "2");
        map.add("a", "3");
        map.delete("b", 0);

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "a"]);
        // a fresh call restarts from the beginning
        assert_eq!(map.keys().count(), 2);
    }

    #[test]
    fn clear_resets_storage() {
        let mut map = OrderedMultiMap::new();
        map.add("a", "1");
        map.delete("a", 0);
        map.clear();

        assert!(map.is_empty());
        assert_eq!(map.raw_len(), 0);
    }

    #[test]
    fn as_map_groups_live_values_by_first_seen_key() {
        let mut map = OrderedMultiMap::new();
        map.add("b", "1");
        map.add("a", "2");
        map.add("b", "3");
        map.add("a", "4");
        map.delete("a", 0);

        let view = map.as_map();
        assert_eq!(view.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(view.get("b").unwrap(), ["1".to_string(), "3".to_string()]);
        assert_eq!(view.get("a").unwrap(), ["4".to_string()]);
        assert!(view.contains_value(&["4".to_string()]));
    }

    #[test]
    fn as_map_omits_fully_deleted_keys() {
        let mut map = OrderedMultiMap::new();
        map.add("gone", "1");
        map.add("kept", "2");
        map.delete("gone", 0);

        let view = map.as_map();
        assert!(!view.contains_key("gone"));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn as_map_rejects_every_mutation() {
        let mut map = OrderedMultiMap::new();
        map.add("a", "1");
        let mut view = map.as_map();
        let other = view.clone();

        assert!(matches!(view.put("b", vec![]), Err(StubError::UnsupportedOperation(_))));
        assert!(matches!(view.remove("a"), Err(StubError::UnsupportedOperation(_))));
        assert!(matches!(view.clear(), Err(StubError::UnsupportedOperation(_))));
        assert!(matches!(view.put_all(&other), Err(StubError::UnsupportedOperation(_))));
        assert_eq!(view, other);
    }
}
