//! In-process [`LeaseStore`].
//!
//! Backs single-instance deployments and every test in the workspace.
//! Expiry is tracked with `tokio::time::Instant` and applied lazily on
//! access, so a paused tokio clock drives lease expiry deterministically.
//! Transactions are all-or-nothing: ops are staged against a copy of the
//! touched keys and written back only if every op succeeds.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::StoreError;
use crate::traits::{LeaseStore, TxOp};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn string(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: Value::Str(value.to_string()),
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Look up a key, dropping it first if its expiry has passed.
fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    let now = Instant::now();
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

/// Apply one op to the staged view of a key.
fn apply(slot: &mut Option<Entry>, op: &TxOp) -> Result<(), StoreError> {
    match op {
        TxOp::Set { value, ttl, .. } => {
            *slot = Some(Entry::string(value, *ttl));
        }
        TxOp::Delete { .. } => {
            *slot = None;
        }
        TxOp::ListPush { key, value } => match slot {
            Some(Entry { value: Value::List(items), .. }) => items.push_back(value.clone()),
            Some(_) => return Err(StoreError::WrongType(key.clone())),
            None => {
                *slot = Some(Entry {
                    value: Value::List(VecDeque::from([value.clone()])),
                    expires_at: None,
                });
            }
        },
        TxOp::ListRemove { key, value } => match slot {
            Some(Entry { value: Value::List(items), .. }) => {
                items.retain(|v| v != value);
                if items.is_empty() {
                    *slot = None;
                }
            }
            Some(_) => return Err(StoreError::WrongType(key.clone())),
            None => {}
        },
    }
    Ok(())
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), Entry::string(value, ttl));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        if live(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::string(value, ttl));
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        Ok(live(&mut entries, key).is_some() && entries.remove(key).is_some())
    }

    async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let matches = matches!(
            live(&mut entries, key),
            Some(Entry { value: Value::Str(s), .. }) if s.as_str() == value
        );
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, e| !e.is_expired(now));
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn list_head(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            Some(Entry { value: Value::List(items), .. }) => Ok(items.front().cloned()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            Some(Entry { value: Value::List(items), .. }) => Ok(items.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn transact(&self, ops: Vec<TxOp>) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;

        let mut staged: HashMap<String, Option<Entry>> = HashMap::new();
        let mut failures = Vec::new();
        for (i, op) in ops.iter().enumerate() {
            let key = op.key();
            if !staged.contains_key(key) {
                let current = live(&mut entries, key).cloned();
                staged.insert(key.to_string(), current);
            }
            if let Some(slot) = staged.get_mut(key) {
                if let Err(e) = apply(slot, op) {
                    failures.push(format!("op {i}: {e}"));
                }
            }
        }

        if !failures.is_empty() {
            return Err(StoreError::Transaction(failures.join("; ")));
        }

        for (key, slot) in staged {
            match slot {
                Some(entry) => {
                    entries.insert(key, entry);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
