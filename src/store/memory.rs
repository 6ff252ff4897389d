//! In-process fence store backed by `DashMap`.
//!
//! Suitable for tests and for running the beat and the worker pool inside one
//! process. Expiry is evaluated lazily on access.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::store::{FenceStore, StoreResult};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// In-memory store with per-key TTL.
#[derive(Default)]
pub struct MemoryStore {
    values: DashMap<String, StoredValue>,
    sets: DashMap<String, HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let value = match self.values.get(key) {
            Some(stored) if !stored.is_expired() => Some(stored.value.clone()),
            _ => None,
        };
        if value.is_none() {
            self.values.remove_if(key, |_, stored| stored.is_expired());
        }
        value
    }

    fn insert_if_absent(&self, key: &str, value: String, ttl: Option<Duration>) -> bool {
        match self.values.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(StoredValue::new(value, ttl));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, ttl));
                true
            }
        }
    }
}

#[async_trait]
impl FenceStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<()> {
        self.values
            .insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        Ok(self.insert_if_absent(key, value, ttl))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let value = self
            .values
            .remove(key)
            .is_some_and(|(_, stored)| !stored.is_expired());
        let set = self.sets.remove(key).is_some();
        Ok(value || set)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.live_value(key).is_some() || self.sets.contains_key(key))
    }

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>> {
        Ok(self
            .sets
            .get(key)
            .map(|members| members.value().clone())
            .unwrap_or_default())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> StoreResult<()> {
        if let Some(mut members) = self.sets.get_mut(key) {
            members.remove(member);
        }
        self.sets.remove_if(key, |_, members| members.is_empty());
        Ok(())
    }

    async fn try_lock(&self, name: &str, token: &str, ttl: Duration) -> StoreResult<bool> {
        Ok(self.insert_if_absent(name, token.to_string(), Some(ttl)))
    }

    async fn extend_lock(&self, name: &str, token: &str, ttl: Duration) -> StoreResult<bool> {
        match self.values.get_mut(name) {
            Some(mut stored) if !stored.is_expired() && stored.value == token => {
                stored.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unlock(&self, name: &str, token: &str) -> StoreResult<bool> {
        Ok(self
            .values
            .remove_if(name, |_, stored| {
                !stored.is_expired() && stored.value == token
            })
            .is_some())
    }

    async fn lock_token(&self, name: &str) -> StoreResult<Option<String>> {
        Ok(self.live_value(name))
    }
}
