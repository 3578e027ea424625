//! Specialized collection types

pub use slotmap::{new_key_type, SlotMap};

/// Ordered arena: slot map storage plus the insertion order of its keys
///
/// Iteration and teardown follow acquisition order, which a bare slot map
/// does not guarantee once slots get reused.
#[derive(Debug)]
pub struct OrderedArena<K: slotmap::Key, T> {
    items: SlotMap<K, T>,
    order: Vec<K>,
}

impl<K: slotmap::Key, T> OrderedArena<K, T> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            items: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    /// Insert an item and return its key
    pub fn insert(&mut self, item: T) -> K {
        let key = self.items.insert(item);
        self.order.push(key);
        key
    }

    /// Remove an item by key
    pub fn remove(&mut self, key: K) -> Option<T> {
        let item = self.items.remove(key)?;
        self.order.retain(|k| *k != key);
        Some(item)
    }

    /// Get an item by key
    pub fn get(&self, key: K) -> Option<&T> {
        self.items.get(key)
    }

    /// Get a mutable reference to an item by key
    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.items.get_mut(key)
    }

    /// Number of live items
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the arena holds no items
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate items in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.order.iter().map(move |k| (*k, &self.items[*k]))
    }

    /// Iterate items mutably, in slot order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.items.values_mut()
    }

    /// Remove every item, newest first, and hand them back in that order
    pub fn drain_reverse(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.order.len());
        while let Some(key) = self.order.pop() {
            if let Some(item) = self.items.remove(key) {
                drained.push(item);
            }
        }
        drained
    }
}

impl<K: slotmap::Key, T> Default for OrderedArena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
