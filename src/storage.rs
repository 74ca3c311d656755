use std::collections::HashMap;

use crate::key::Key;

/// The local key/value store: exactly the keys this node currently owns.
///
/// Entries arrive through a direct `Put` on the owner or through a migration
/// hand-off from a neighbor; they leave when a new predecessor takes over part
/// of the node's arc or on an explicit remove. There is no eviction.
#[derive(Clone, Debug, Default)]
pub struct Storage {
    data: HashMap<String, String>,
}

impl Storage {
    /// Constructs a new, empty `Storage`.
    pub fn new() -> Self {
        Storage {
            data: HashMap::new(),
        }
    }

    /// Inserts a key-value pair, replacing any previous value.
    pub fn insert(&mut self, key: String, value: String) {
        self.data.insert(key, value);
    }

    /// Returns the value associated with `key`, if any.
    pub fn get(&self, key: &str) -> Option<&String> {
        self.data.get(key)
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.data.remove(key)
    }

    /// Removes `key` only if it still maps to `value`, returning whether an
    /// entry was removed. Migration deletes through this after the remote
    /// write is acknowledged, so a value overwritten in the meantime is kept
    /// for the next hand-off instead of being dropped.
    pub fn remove_if_equals(&mut self, key: &str, value: &str) -> bool {
        match self.data.get(key) {
            Some(current) if current == value => {
                self.data.remove(key);
                true
            },
            _ => false,
        }
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a snapshot of the entries whose hashed key satisfies
    /// `predicate`. Migration works on such a snapshot so the store is never
    /// locked across a network round-trip, and deletes an entry only after the
    /// remote write is acknowledged.
    pub fn entries_where<F>(&self, predicate: F) -> Vec<(String, String)>
    where
        F: Fn(&Key) -> bool,
    {
        self.data
            .iter()
            .filter(|(k, _)| predicate(&Key::hash(k.as_bytes())))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Storage;

    #[test]
    fn test_insert_get_remove() {
        let mut storage = Storage::new();
        assert!(storage.is_empty());

        storage.insert(String::from("k"), String::from("v1"));
        storage.insert(String::from("k"), String::from("v2"));
        assert_eq!(storage.get("k"), Some(&String::from("v2")));
        assert_eq!(storage.len(), 1);

        assert_eq!(storage.remove("k"), Some(String::from("v2")));
        assert_eq!(storage.get("k"), None);
    }

    #[test]
    fn test_remove_if_equals_keeps_overwritten_value() {
        let mut storage = Storage::new();
        storage.insert(String::from("k"), String::from("v1"));

        // the stored value changed after the snapshot was taken
        storage.insert(String::from("k"), String::from("v2"));
        assert!(!storage.remove_if_equals("k", "v1"));
        assert_eq!(storage.get("k"), Some(&String::from("v2")));

        assert!(storage.remove_if_equals("k", "v2"));
        assert_eq!(storage.get("k"), None);
        assert!(!storage.remove_if_equals("k", "v2"));
    }

    #[test]
    fn test_entries_where_partitions_by_hash() {
        let mut storage = Storage::new();
        for i in 0..16 {
            storage.insert(format!("key-{}", i), format!("value-{}", i));
        }

        let all = storage.entries_where(|_| true);
        let none = storage.entries_where(|_| false);
        assert_eq!(all.len(), 16);
        assert!(none.is_empty());

        let odd_first_byte = storage.entries_where(|hash| hash.0[0] % 2 == 1);
        let even_first_byte = storage.entries_where(|hash| hash.0[0] % 2 == 0);
        assert_eq!(odd_first_byte.len() + even_first_byte.len(), 16);
    }
}
