use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Collection names used across the engine. Balance and transaction
/// documents are keyed so that one user's state never contends with
/// another's.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    pub const PACKAGES: &str = "packages";
    pub const BALANCES: &str = "balances";
    pub const TRANSACTIONS: &str = "transactions";
    pub const AUDIT: &str = "audit";
    pub const FILINGS: &str = "filings";
    pub const FILING_STATUS: &str = "filing-status";
    pub const FILING_REPORTS: &str = "filing-reports";
    pub const FILING_DATA: &str = "filing-data";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {0}/{1}")]
    NotFound(String, String),

    #[error("Conflicting concurrent write, retries exhausted")]
    Conflict,

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Operations available inside a store transaction. Reads are snapshot
/// reads recorded against the document version; writes are buffered and
/// commit atomically, or not at all.
pub trait TxnOps {
    fn get_raw(&mut self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;
    fn set_raw(&mut self, collection: &str, key: &str, doc: Value);
    fn delete(&mut self, collection: &str, key: &str);
}

/// Typed read inside a transaction. Documents are validated into structs
/// at this boundary, not inside business logic.
pub fn txn_get<T: DeserializeOwned>(
    tx: &mut dyn TxnOps,
    collection: &str,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match tx.get_raw(collection, key)? {
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
        None => Ok(None),
    }
}

/// Typed buffered write inside a transaction.
pub fn txn_set<T: Serialize>(
    tx: &mut dyn TxnOps,
    collection: &str,
    key: &str,
    doc: &T,
) -> Result<(), StoreError> {
    tx.set_raw(collection, key, serde_json::to_value(doc)?);
    Ok(())
}

/// The document store contract.
///
/// `run_transaction` executes the closure against a transactional view.
/// The store re-runs the closure when a conflicting concurrent write is
/// detected at commit, so the closure must be a pure function of its
/// transactional reads. A closure returning `Err` aborts without retry.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, collection: &str, key: &str, doc: Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError>;

    /// All documents in a collection whose top-level `field` equals
    /// `value`, with their keys.
    async fn query_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError>;

    async fn run_transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send,
        F: Fn(&mut dyn TxnOps) -> Result<T, StoreError> + Send + Sync;

    async fn get_doc<T>(&self, collection: &str, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
        Self: Sized,
    {
        match self.get(collection, key).await? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    async fn put_doc<T>(&self, collection: &str, key: &str, doc: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
        Self: Sized,
    {
        self.set(collection, key, serde_json::to_value(doc)?).await
    }
}
