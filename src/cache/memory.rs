use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{CacheError, CacheStore};

/// In-memory cache store.
///
/// Backs `--dry-run` mode and the test suite. Optionally keeps a journal of
/// every mutating call so ordering guarantees (flush before the first match
/// write on rollover) can be asserted, and can simulate an outage so
/// connectivity-failure paths are reachable without a real Redis.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
    journaling: bool,
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
    journal: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// A store that records every mutating operation, for ordering assertions.
    #[allow(dead_code)]
    pub fn journaling() -> Self {
        MemoryStore {
            journaling: true,
            ..MemoryStore::default()
        }
    }

    /// Simulate the store being unreachable; every call fails until cleared.
    #[allow(dead_code)]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Mutating operations recorded so far, oldest first.
    #[allow(dead_code)]
    pub fn journal(&self) -> Vec<String> {
        self.inner.lock().unwrap().journal.clone()
    }

    fn check_online(&self) -> Result<(), CacheError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable("simulated outage".into()))
        } else {
            Ok(())
        }
    }

    fn record(&self, inner: &mut Inner, entry: String) {
        if self.journaling {
            inner.journal.push(entry);
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_online()?;
        Ok(self.inner.lock().unwrap().strings.get(key).cloned())
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.check_online()?;
        let mut inner = self.inner.lock().unwrap();
        self.record(&mut inner, format!("set_string {}={}", key, value));
        inner.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_hash_field(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>, CacheError> {
        self.check_online()?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .hashes
            .get(key)
            .and_then(|h| h.get(field))
            .cloned())
    }

    async fn set_hash_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), CacheError> {
        self.check_online()?;
        let mut inner = self.inner.lock().unwrap();
        self.record(&mut inner, format!("set_hash_field {}.{}", key, field));
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn add_set_member(&self, set: &str, member: &str) -> Result<(), CacheError> {
        self.check_online()?;
        let mut inner = self.inner.lock().unwrap();
        self.record(&mut inner, format!("add_set_member {}+={}", set, member));
        inner
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn remove_set_member(&self, set: &str, member: &str) -> Result<(), CacheError> {
        self.check_online()?;
        let mut inner = self.inner.lock().unwrap();
        self.record(&mut inner, format!("remove_set_member {}-={}", set, member));
        if let Some(members) = inner.sets.get_mut(set) {
            members.remove(member);
        }
        Ok(())
    }

    async fn list_set_members(&self, set: &str) -> Result<HashSet<String>, CacheError> {
        self.check_online()?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sets
            .get(set)
            .cloned()
            .unwrap_or_default())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.check_online()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.strings.contains_key(key) || inner.hashes.contains_key(key))
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        self.check_online()?;
        let mut inner = self.inner.lock().unwrap();
        self.record(&mut inner, "flush_all".to_string());
        inner.strings.clear();
        inner.hashes.clear();
        inner.sets.clear();
        Ok(())
    }
}
