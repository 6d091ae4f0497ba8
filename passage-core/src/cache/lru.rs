//! LRU (Least Recently Used) cache with per-entry TTL
//!
//! O(1) get/insert: a HashMap indexes an arena of nodes threaded into a
//! doubly-linked list ordered by last access (head = most recent).
//! Expired entries are dropped lazily on lookup and by `purge_expired`.

use super::traits::{Cache, CacheEntry, Lookup};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Node in the LRU linked list
struct LruNode<K, V> {
    key: K,
    entry: CacheEntry<V>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// LRU Cache with configurable capacity
pub struct LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    capacity: usize,
    map: HashMap<K, usize>,
    nodes: Vec<Option<LruNode<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new LRU cache with the given capacity (at least one entry)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_list: Vec::new(),
        }
    }

    /// Move a node to the front of the list (most recently used)
    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return; // Already at front
        }

        // Get the node's prev and next indices before making mutable borrows
        let (prev_idx, next_idx) = if let Some(node) = &self.nodes[idx] {
            (node.prev, node.next)
        } else {
            return;
        };

        // Remove from current position
        if let Some(prev_idx) = prev_idx {
            if let Some(prev_node) = &mut self.nodes[prev_idx] {
                prev_node.next = next_idx;
            }
        }

        if let Some(next_idx) = next_idx {
            if let Some(next_node) = &mut self.nodes[next_idx] {
                next_node.prev = prev_idx;
            }
        }

        if self.tail == Some(idx) {
            self.tail = prev_idx;
        }

        // Insert at front
        let old_head = self.head;
        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = old_head;
        }

        if let Some(old_head_idx) = old_head {
            if let Some(old_head_node) = &mut self.nodes[old_head_idx] {
                old_head_node.prev = Some(idx);
            }
        }

        self.head = Some(idx);

        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    /// Entries in arena order, expired ones included, without touching them
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.nodes.iter().flatten().map(|node| (&node.key, &node.entry.value))
    }

    /// Remove the least recently used item (tail)
    fn evict_lru(&mut self) -> Option<(K, V)> {
        let tail_idx = self.tail?;

        let node = self.nodes[tail_idx].take()?;
        self.map.remove(&node.key);
        self.free_list.push(tail_idx);

        if let Some(prev_idx) = node.prev {
            if let Some(prev_node) = &mut self.nodes[prev_idx] {
                prev_node.next = None;
            }
            self.tail = Some(prev_idx);
        } else {
            self.head = None;
            self.tail = None;
        }

        Some((node.key, node.entry.value))
    }

    /// Get a node index, either from free list or by allocating new
    fn get_node_index(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }
}

impl<K, V> Cache<K, V> for LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    fn lookup(&mut self, key: &K) -> Lookup<'_, V> {
        let Some(&idx) = self.map.get(key) else {
            return Lookup::Miss;
        };

        let expired = match &self.nodes[idx] {
            Some(node) => node.entry.is_expired_at(Instant::now()),
            None => return Lookup::Miss,
        };
        if expired {
            self.remove(key);
            return Lookup::Expired;
        }

        self.move_to_front(idx);
        match &self.nodes[idx] {
            Some(node) => Lookup::Hit(&node.entry.value),
            None => Lookup::Miss,
        }
    }

    fn insert(&mut self, key: K, value: V, ttl: Duration) -> Option<K> {
        // Overwrite in place: fresh value, fresh expiry, most recent
        if let Some(&idx) = self.map.get(&key) {
            if let Some(node) = &mut self.nodes[idx] {
                node.entry = CacheEntry::new(value, ttl);
            }
            self.move_to_front(idx);
            return None;
        }

        let evicted =
            if self.map.len() >= self.capacity { self.evict_lru().map(|(k, _)| k) } else { None };

        // Insert new node
        let idx = self.get_node_index();
        let entry = CacheEntry::new(value, ttl);

        self.nodes[idx] = Some(LruNode {
            key: key.clone(),
            entry,
            prev: None,
            next: self.head,
        });

        if let Some(old_head) = self.head {
            if let Some(old_head_node) = &mut self.nodes[old_head] {
                old_head_node.prev = Some(idx);
            }
        }

        self.head = Some(idx);

        if self.tail.is_none() {
            self.tail = Some(idx);
        }

        self.map.insert(key, idx);
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        let node = self.nodes[idx].take()?;

        if let Some(prev_idx) = node.prev {
            if let Some(prev_node) = &mut self.nodes[prev_idx] {
                prev_node.next = node.next;
            }
        } else {
            self.head = node.next;
        }

        if let Some(next_idx) = node.next {
            if let Some(next_node) = &mut self.nodes[next_idx] {
                next_node.prev = node.prev;
            }
        } else {
            self.tail = node.prev;
        }

        self.free_list.push(idx);
        Some(node.entry.value)
    }

    fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<K> = self
            .nodes
            .iter()
            .flatten()
            .filter(|node| node.entry.is_expired_at(now))
            .map(|node| node.key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
