use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use reckon_core::store::{DocumentStore, StoreError, TxnOps};

/// How many times a transaction closure is re-run on conflicting
/// concurrent writes before the whole operation fails with `Conflict`.
const MAX_TX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
struct Versioned {
    value: Value,
    version: u64,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, HashMap<String, Versioned>>,
    next_version: u64,
}

/// In-process document store with optimistic transactions. Every
/// document carries a version; a transaction records the versions it
/// read and commits only if none changed underneath it, otherwise the
/// closure is re-run against fresh state.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn write_now(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut inner = self.lock_write()?;
        inner.next_version += 1;
        let version = inner.next_version;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), Versioned { value, version });
        Ok(())
    }

    fn lock_read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    fn lock_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

enum BufferedWrite {
    Set(String, String, Value),
    Delete(String, String),
}

struct MemTxn<'a> {
    store: &'a MemoryStore,
    /// Versions observed by reads; `None` records that the document was
    /// absent when read.
    reads: HashMap<(String, String), Option<u64>>,
    writes: Vec<BufferedWrite>,
}

impl MemTxn<'_> {
    fn pending(&self, collection: &str, key: &str) -> Option<Option<Value>> {
        for w in self.writes.iter().rev() {
            match w {
                BufferedWrite::Set(c, k, v) if c == collection && k == key => {
                    return Some(Some(v.clone()))
                }
                BufferedWrite::Delete(c, k) if c == collection && k == key => return Some(None),
                _ => {}
            }
        }
        None
    }
}

impl TxnOps for MemTxn<'_> {
    fn get_raw(&mut self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        // Read-your-writes within the transaction.
        if let Some(buffered) = self.pending(collection, key) {
            return Ok(buffered);
        }

        let inner = self.store.lock_read()?;
        let doc = inner
            .collections
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned();

        self.reads
            .entry((collection.to_string(), key.to_string()))
            .or_insert(doc.as_ref().map(|d| d.version));

        Ok(doc.map(|d| d.value))
    }

    fn set_raw(&mut self, collection: &str, key: &str, doc: Value) {
        self.writes.push(BufferedWrite::Set(
            collection.to_string(),
            key.to_string(),
            doc,
        ));
    }

    fn delete(&mut self, collection: &str, key: &str) {
        self.writes
            .push(BufferedWrite::Delete(collection.to_string(), key.to_string()));
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.lock_read()?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|c| c.get(key))
            .map(|d| d.value.clone()))
    }

    async fn set(&self, collection: &str, key: &str, doc: Value) -> Result<(), StoreError> {
        self.write_now(collection, key, doc)
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock_write()?;
        if let Some(coll) = inner.collections.get_mut(collection) {
            coll.remove(key);
        }
        Ok(())
    }

    async fn query_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let inner = self.lock_read()?;
        let mut out = Vec::new();
        if let Some(coll) = inner.collections.get(collection) {
            for (key, doc) in coll {
                if doc.value.get(field) == Some(value) {
                    out.push((key.clone(), doc.value.clone()));
                }
            }
        }
        Ok(out)
    }

    async fn run_transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send,
        F: Fn(&mut dyn TxnOps) -> Result<T, StoreError> + Send + Sync,
    {
        for attempt in 0..MAX_TX_ATTEMPTS {
            let mut txn = MemTxn {
                store: self,
                reads: HashMap::new(),
                writes: Vec::new(),
            };

            let out = f(&mut txn)?;
            let MemTxn { reads, writes, .. } = txn;

            let mut inner = self.lock_write()?;

            let clean = reads.iter().all(|((coll, key), observed)| {
                let current = inner
                    .collections
                    .get(coll)
                    .and_then(|c| c.get(key))
                    .map(|d| d.version);
                current == *observed
            });

            if !clean {
                tracing::debug!("Transaction conflict, attempt {}", attempt + 1);
                continue;
            }

            for w in writes {
                match w {
                    BufferedWrite::Set(coll, key, value) => {
                        inner.next_version += 1;
                        let version = inner.next_version;
                        inner
                            .collections
                            .entry(coll)
                            .or_default()
                            .insert(key, Versioned { value, version });
                    }
                    BufferedWrite::Delete(coll, key) => {
                        if let Some(c) = inner.collections.get_mut(&coll) {
                            c.remove(&key);
                        }
                    }
                }
            }

            return Ok(out);
        }

        Err(StoreError::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn get_set_delete_roundtrip() {
        let store = MemoryStore::new();
        store.set("c", "k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("c", "k").await.unwrap(), Some(json!({"a": 1})));
        store.delete("c", "k").await.unwrap();
        assert_eq!(store.get("c", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_of_absent_document_is_not_an_error() {
        let store = MemoryStore::new();
        store.delete("c", "missing").await.unwrap();
    }

    #[tokio::test]
    async fn query_field_matches_top_level_values() {
        let store = MemoryStore::new();
        store.set("txs", "a", json!({"uid": "u1"})).await.unwrap();
        store.set("txs", "b", json!({"uid": "u2"})).await.unwrap();
        store.set("txs", "c", json!({"uid": "u1"})).await.unwrap();

        let mut hits = store.query_field("txs", "uid", &json!("u1")).await.unwrap();
        hits.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "a");
    }

    #[tokio::test]
    async fn transaction_commits_all_writes_atomically() {
        let store = MemoryStore::new();
        store
            .run_transaction(|tx| {
                tx.set_raw("c", "one", json!(1));
                tx.set_raw("c", "two", json!(2));
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(store.get("c", "one").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get("c", "two").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn aborted_transaction_writes_nothing() {
        let store = MemoryStore::new();
        let res: Result<(), StoreError> = store
            .run_transaction(|tx| {
                tx.set_raw("c", "k", json!(1));
                Err(StoreError::Backend("boom".to_string()))
            })
            .await;

        assert!(res.is_err());
        assert_eq!(store.get("c", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn conflicting_write_triggers_retry() {
        let store = MemoryStore::new();
        store.set("c", "counter", json!(0)).await.unwrap();

        let attempts = AtomicUsize::new(0);
        store
            .run_transaction(|tx| {
                let seen = tx.get_raw("c", "counter")?;
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    // Simulate a concurrent writer landing between our
                    // read and our commit.
                    store.write_now("c", "counter", json!(100))?;
                }
                let n = seen.and_then(|v| v.as_i64()).unwrap_or(0);
                tx.set_raw("c", "counter", json!(n + 1));
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        // Second attempt read the concurrent value.
        assert_eq!(store.get("c", "counter").await.unwrap(), Some(json!(101)));
    }

    #[tokio::test]
    async fn retries_exhaust_into_conflict() {
        let store = MemoryStore::new();
        store.set("c", "k", json!(0)).await.unwrap();

        let res: Result<(), StoreError> = store
            .run_transaction(|tx| {
                let _ = tx.get_raw("c", "k")?;
                // Every attempt races with another writer.
                store.write_now("c", "k", json!("smash"))?;
                tx.set_raw("c", "k", json!(1));
                Ok(())
            })
            .await;

        assert!(matches!(res, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn read_your_writes_inside_transaction() {
        let store = MemoryStore::new();
        store
            .run_transaction(|tx| {
                tx.set_raw("c", "k", json!("new"));
                assert_eq!(tx.get_raw("c", "k")?, Some(json!("new")));
                tx.delete("c", "k");
                assert_eq!(tx.get_raw("c", "k")?, None);
                Ok(())
            })
            .await
            .unwrap();
    }
}
