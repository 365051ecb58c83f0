use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::LedgerTransaction;
use reckon_core::store::{collections, DocumentStore, StoreError};

/// An audit trail entry: a snapshot of a ledger transaction or a bare
/// lifecycle event. Owned by the audit subsystem; nothing mutates one
/// after it is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<LedgerTransaction>,
}

impl AuditRecord {
    /// Mirror of a ledger transaction, written under the transaction id
    /// so ledger and audit records correlate 1:1.
    pub fn transaction_record(tx: &LedgerTransaction) -> Self {
        Self {
            time: tx.time,
            kind: serde_json::to_value(tx.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "order".to_string()),
            uid: tx.uid.clone(),
            email: Some(tx.email.clone()),
            reference: None,
            transaction: Some(tx.clone()),
        }
    }

    /// A bare lifecycle event (signup, package allocation and the like).
    pub fn event_record(
        kind: &str,
        uid: &str,
        email: Option<&str>,
        reference: Option<&str>,
    ) -> Self {
        Self {
            time: Utc::now(),
            kind: kind.to_string(),
            uid: uid.to_string(),
            email: email.map(str::to_string),
            reference: reference.map(str::to_string),
            transaction: None,
        }
    }
}

/// Append-only mirror of every financial event. Best-effort: a failed
/// audit write is logged and never rolls back the ledger operation it
/// describes.
pub struct Audit<S> {
    store: Arc<S>,
}

impl<S> Clone for Audit<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: DocumentStore> Audit<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Insert a record; the id defaults to a fresh opaque identifier.
    pub async fn write(&self, record: &AuditRecord, id: Option<&str>) -> Result<(), StoreError> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.store.put_doc(collections::AUDIT, &id, record).await
    }

    /// Mirror a ledger transaction under its own id, swallowing (but
    /// logging) any failure.
    pub async fn mirror(&self, tx: &LedgerTransaction, tid: &str) {
        let record = AuditRecord::transaction_record(tx);
        if let Err(e) = self.write(&record, Some(tid)).await {
            tracing::warn!("Audit mirror failed for transaction {}: {}", tid, e);
        }
    }
}
