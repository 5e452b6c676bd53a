// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-lived per-actor interaction state: open date prompts and "not a
//! brief" confirmation tokens.
//!
//! Both live in memory only; a restart simply forgets them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a date prompt stays open.
pub const POSTPONE_TTL: Duration = Duration::from_secs(120);

/// How long the "really delete?" step stays valid.
pub const DELETE_CONFIRM_TTL: Duration = Duration::from_secs(10);

/// Result of looking up an entry that may have expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Active(V),
    /// The entry was present but past its deadline. It has been removed.
    Expired(V),
    Absent,
}

/// A map whose entries lapse `ttl` after insertion.
#[derive(Debug)]
pub struct ExpiringMap<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (V, Instant)>>,
}

impl<K: Eq + Hash, V: Clone> ExpiringMap<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, (V, Instant)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace, returning the previous value (expired or not).
    pub fn insert_at(&self, key: K, value: V, now: Instant) -> Option<V> {
        self.lock()
            .insert(key, (value, now + self.ttl))
            .map(|(v, _)| v)
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.insert_at(key, value, Instant::now())
    }

    pub fn lookup_at(&self, key: &K, now: Instant) -> Lookup<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            None => Lookup::Absent,
            Some((value, expires)) if *expires > now => Lookup::Active(value.clone()),
            Some(_) => match entries.remove(key) {
                Some((value, _)) => Lookup::Expired(value),
                None => Lookup::Absent,
            },
        }
    }

    pub fn lookup(&self, key: &K) -> Lookup<V> {
        self.lookup_at(key, Instant::now())
    }

    /// Remove and return the entry only if it is still active.
    pub fn take_at(&self, key: &K, now: Instant) -> Option<V> {
        let (value, expires) = self.lock().remove(key)?;
        (expires > now).then_some(value)
    }

    pub fn take(&self, key: &K) -> Option<V> {
        self.take_at(key, Instant::now())
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|(v, _)| v)
    }

    /// Drop everything past its deadline.
    pub fn purge_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, (_, expires)| *expires > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An open date prompt for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPostpone {
    pub order_id: i64,
    pub chat_id: i64,
    pub topic_id: Option<i64>,
    /// The prompt message, so its buttons can be removed afterwards.
    pub prompt_message_id: Option<i64>,
}

impl PendingPostpone {
    pub fn is_in(&self, chat_id: i64, topic_id: Option<i64>) -> bool {
        self.chat_id == chat_id && self.topic_id == topic_id
    }
}

/// All interaction state, shared between the action handlers and the
/// message router.
#[derive(Debug)]
pub struct PendingState {
    /// Keyed by the actor who opened the prompt.
    pub postpones: ExpiringMap<i64, PendingPostpone>,
    /// Keyed by (actor, order).
    pub delete_confirmations: ExpiringMap<(i64, i64), ()>,
}

impl Default for PendingState {
    fn default() -> Self {
        Self {
            postpones: ExpiringMap::new(POSTPONE_TTL),
            delete_confirmations: ExpiringMap::new(DELETE_CONFIRM_TTL),
        }
    }
}

impl PendingState {
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.postpones.purge_at(now) + self.delete_confirmations.purge_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let map = ExpiringMap::new(Duration::from_secs(10));
        let t0 = Instant::now();
        map.insert_at(1, "a", t0);

        assert_eq!(map.lookup_at(&1, t0 + Duration::from_secs(9)), Lookup::Active("a"));
        assert_eq!(map.lookup_at(&1, t0 + Duration::from_secs(10)), Lookup::Expired("a"));
        // Expired lookups remove the entry.
        assert_eq!(map.lookup_at(&1, t0), Lookup::Absent);
    }

    #[test]
    fn take_consumes_only_active_entries() {
        let map = ExpiringMap::new(Duration::from_secs(10));
        let t0 = Instant::now();
        map.insert_at((1, 2), (), t0);
        assert_eq!(map.take_at(&(1, 2), t0 + Duration::from_secs(1)), Some(()));
        assert_eq!(map.take_at(&(1, 2), t0), None);

        map.insert_at((1, 2), (), t0);
        assert_eq!(map.take_at(&(1, 2), t0 + Duration::from_secs(11)), None);
        assert!(map.is_empty());
    }

    #[test]
    fn insert_replaces_previous_prompt() {
        let state = PendingState::default();
        let first = PendingPostpone {
            order_id: 1,
            chat_id: -1,
            topic_id: None,
            prompt_message_id: Some(10),
        };
        let second = PendingPostpone {
            order_id: 2,
            ..first
        };
        assert_eq!(state.postpones.insert(5, first), None);
        assert_eq!(state.postpones.insert(5, second), Some(first));
        assert_eq!(state.postpones.lookup(&5), Lookup::Active(second));
    }

    #[test]
    fn purge_drops_expired() {
        let map = ExpiringMap::new(Duration::from_secs(1));
        let t0 = Instant::now();
        map.insert_at(1, 1, t0);
        map.insert_at(2, 2, t0 + Duration::from_secs(5));
        assert_eq!(map.purge_at(t0 + Duration::from_secs(2)), 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn scope_check() {
        let p = PendingPostpone {
            order_id: 1,
            chat_id: -5,
            topic_id: Some(3),
            prompt_message_id: None,
        };
        assert!(p.is_in(-5, Some(3)));
        assert!(!p.is_in(-5, None));
    }
}
