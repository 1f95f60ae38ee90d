use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// One operation inside a [`LeaseStore::transact`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOp {
    /// Write a string value, replacing any previous value and expiry.
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    Delete {
        key: String,
    },
    /// Append to the tail of a list, creating it if needed.
    ListPush {
        key: String,
        value: String,
    },
    /// Remove every occurrence of `value` from a list.
    ListRemove {
        key: String,
        value: String,
    },
}

impl TxOp {
    pub fn key(&self) -> &str {
        match self {
            TxOp::Set { key, .. }
            | TxOp::Delete { key }
            | TxOp::ListPush { key, .. }
            | TxOp::ListRemove { key, .. } => key,
        }
    }
}

/// Shared key/value store with expiring entries, lists, and multi-key
/// transactions.
///
/// This is the single source of truth for every service instance. Keys
/// written with a TTL disappear on their own; callers never run eviction.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Unconditional write. `ttl = None` makes the key persistent.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Create the key only if it does not exist. Returns whether it was created.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete the key only if it currently holds `value`.
    async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Every live key starting with `prefix`, in store-defined order.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn list_head(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// The whole list, head first.
    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Apply all operations as one transaction.
    ///
    /// An `Err` means at least one operation failed. Whether the others
    /// were applied depends on the backend; see the implementation docs.
    async fn transact(&self, ops: Vec<TxOp>) -> Result<(), StoreError>;

    /// Backend name for logs and health output.
    fn backend_name(&self) -> &str;
}

/// Blanket implementation so `Arc<dyn LeaseStore>` can be used directly.
#[async_trait]
impl<T: LeaseStore + ?Sized> LeaseStore for Arc<T> {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        (**self).set(key, value, ttl).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        (**self).set_if_absent(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }

    async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        (**self).delete_if_equals(key, value).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).scan_prefix(prefix).await
    }

    async fn list_head(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).list_head(key).await
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        (**self).list_range(key).await
    }

    async fn transact(&self, ops: Vec<TxOp>) -> Result<(), StoreError> {
        (**self).transact(ops).await
    }

    fn backend_name(&self) -> &str {
        (**self).backend_name()
    }
}
