use std::collections::HashMap;
use std::sync::Arc;

use crate::models::LedgerTransaction;
use reckon_catalog::Catalog;
use reckon_core::store::{collections, txn_get, txn_set, DocumentStore, StoreError};
use reckon_shared::{CreditBalance, FilingKind};

/// Per-kind balance changes, summed quantities with price ignored.
pub type Deltas = HashMap<FilingKind, i64>;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The balance would go negative, or exceed the permitted cap.
    #[error("Insufficient credit: {0}")]
    InsufficientCredit(String),

    /// Store transaction retries exhausted; the whole operation is safe
    /// to retry.
    #[error("Conflicting concurrent update, retry the operation")]
    Conflict,

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => LedgerError::Conflict,
            other => LedgerError::Store(other),
        }
    }
}

/// Outcome of an idempotent settlement.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Applied(CreditBalance),
    /// The transaction was already complete; the balance was not touched.
    AlreadyApplied,
}

enum Outcome<T> {
    Ok(T),
    Insufficient(String),
}

/// The credit ledger. The only writer of balance documents: every
/// mutation is a single read-check-write store transaction covering the
/// balance and the associated ledger transaction record, so no partial
/// state is ever visible.
pub struct CreditLedger<S> {
    store: Arc<S>,
    catalog: Catalog,
}

impl<S> Clone for CreditLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

impl<S: DocumentStore> CreditLedger<S> {
    pub fn new(store: Arc<S>, catalog: Catalog) -> Self {
        Self { store, catalog }
    }

    pub async fn balance(&self, uid: &str) -> Result<CreditBalance, LedgerError> {
        Ok(self
            .store
            .get_doc(collections::BALANCES, uid)
            .await?
            .unwrap_or_default())
    }

    /// Atomically apply `deltas` to the user's balance and write the
    /// ledger transaction record under `tid`. Aborts, writing nothing,
    /// if any kind would leave `0..=permitted`.
    pub async fn apply(
        &self,
        uid: &str,
        tid: &str,
        deltas: &Deltas,
        record: &LedgerTransaction,
    ) -> Result<CreditBalance, LedgerError> {
        let catalog = self.catalog.clone();
        let uid = uid.to_string();
        let tid = tid.to_string();
        let deltas = deltas.clone();
        let record = record.clone();

        let outcome = self
            .store
            .run_transaction(move |tx| {
                let mut balance: CreditBalance =
                    txn_get(tx, collections::BALANCES, &uid)?.unwrap_or_default();

                if let Err(reason) = apply_checked(&catalog, &mut balance, &deltas) {
                    return Ok(Outcome::Insufficient(reason));
                }

                txn_set(tx, collections::BALANCES, &uid, &balance)?;
                txn_set(tx, collections::TRANSACTIONS, &tid, &record)?;
                Ok(Outcome::Ok(balance))
            })
            .await?;

        match outcome {
            Outcome::Ok(balance) => Ok(balance),
            Outcome::Insufficient(reason) => Err(LedgerError::InsufficientCredit(reason)),
        }
    }

    /// As [`apply`], but a no-op on the balance when the transaction
    /// record under `tid` is already complete. The completeness check
    /// runs inside the same store transaction as the balance write, so a
    /// redelivered payment event can never credit twice.
    pub async fn apply_once(
        &self,
        uid: &str,
        tid: &str,
        deltas: &Deltas,
        record: &LedgerTransaction,
    ) -> Result<Settlement, LedgerError> {
        let catalog = self.catalog.clone();
        let uid = uid.to_string();
        let tid = tid.to_string();
        let deltas = deltas.clone();
        let record = record.clone();

        let outcome = self
            .store
            .run_transaction(move |tx| {
                let existing: Option<LedgerTransaction> =
                    txn_get(tx, collections::TRANSACTIONS, &tid)?;

                if existing.as_ref().map(|t| t.complete).unwrap_or(false) {
                    return Ok(Outcome::Ok(Settlement::AlreadyApplied));
                }

                let mut balance: CreditBalance =
                    txn_get(tx, collections::BALANCES, &uid)?.unwrap_or_default();

                if let Err(reason) = apply_checked(&catalog, &mut balance, &deltas) {
                    return Ok(Outcome::Insufficient(reason));
                }

                txn_set(tx, collections::BALANCES, &uid, &balance)?;
                txn_set(tx, collections::TRANSACTIONS, &tid, &record)?;
                Ok(Outcome::Ok(Settlement::Applied(balance)))
            })
            .await?;

        match outcome {
            Outcome::Ok(settlement) => Ok(settlement),
            Outcome::Insufficient(reason) => Err(LedgerError::InsufficientCredit(reason)),
        }
    }

    /// Capacity-check `deltas` against the current balance and write the
    /// transaction record, without touching the balance. Used at order
    /// creation, before any money has moved.
    pub async fn record_pending(
        &self,
        uid: &str,
        tid: &str,
        deltas: &Deltas,
        record: &LedgerTransaction,
    ) -> Result<(), LedgerError> {
        let catalog = self.catalog.clone();
        let uid = uid.to_string();
        let tid = tid.to_string();
        let deltas = deltas.clone();
        let record = record.clone();

        let outcome = self
            .store
            .run_transaction(move |tx| {
                let mut balance: CreditBalance =
                    txn_get(tx, collections::BALANCES, &uid)?.unwrap_or_default();

                if let Err(reason) = apply_checked(&catalog, &mut balance, &deltas) {
                    return Ok(Outcome::Insufficient(reason));
                }

                // The candidate balance is discarded: nothing is paid
                // for yet. Only the transaction record lands.
                txn_set(tx, collections::TRANSACTIONS, &tid, &record)?;
                Ok(Outcome::Ok(()))
            })
            .await?;

        match outcome {
            Outcome::Ok(()) => Ok(()),
            Outcome::Insufficient(reason) => Err(LedgerError::InsufficientCredit(reason)),
        }
    }
}

/// Apply `deltas` to `balance`, or report why it cannot be done. Checks
/// both directions: no balance may go negative, none may exceed its cap.
fn apply_checked(
    catalog: &Catalog,
    balance: &mut CreditBalance,
    deltas: &Deltas,
) -> Result<(), String> {
    for (&kind, &delta) in deltas {
        let current = balance.get(kind);
        let next = current + delta;

        if next < 0 {
            return Err(format!("No {} credits available", kind));
        }

        if next > catalog.permitted(kind) {
            return Err("That would exceed your maximum permitted".to_string());
        }

        balance.set(kind, next);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LedgerTransaction, TransactionStatus};
    use chrono::Utc;
    use reckon_store::MemoryStore;

    fn filing_tx(uid: &str) -> LedgerTransaction {
        LedgerTransaction::filing_consumption(
            uid,
            "user@example.com",
            None,
            "VAT Q1",
            "f1",
            FilingKind::Vat,
            Utc::now(),
        )
    }

    fn ledger() -> CreditLedger<MemoryStore> {
        CreditLedger::new(Arc::new(MemoryStore::new()), Catalog::default())
    }

    #[tokio::test]
    async fn apply_writes_balance_and_record_together() {
        let ledger = ledger();
        let deltas = Deltas::from([(FilingKind::Vat, 3)]);

        let bal = ledger
            .apply("u1", "t1", &deltas, &filing_tx("u1"))
            .await
            .unwrap();
        assert_eq!(bal.get(FilingKind::Vat), 3);
        assert_eq!(ledger.balance("u1").await.unwrap().get(FilingKind::Vat), 3);
    }

    #[tokio::test]
    async fn consumption_below_zero_is_rejected_without_writes() {
        let ledger = ledger();
        let deltas = Deltas::from([(FilingKind::Vat, -1)]);

        let err = ledger
            .apply("u1", "t1", &deltas, &filing_tx("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientCredit(_)));
        assert_eq!(ledger.balance("u1").await.unwrap().get(FilingKind::Vat), 0);
    }

    #[tokio::test]
    async fn cap_overflow_aborts_the_whole_write() {
        let ledger = ledger();
        ledger
            .apply(
                "u1",
                "t1",
                &Deltas::from([(FilingKind::Vat, 9)]),
                &filing_tx("u1"),
            )
            .await
            .unwrap();

        // 9 + 2 > 10 permitted; neither kind may land.
        let err = ledger
            .apply(
                "u1",
                "t2",
                &Deltas::from([(FilingKind::Vat, 2), (FilingKind::Corptax, 1)]),
                &filing_tx("u1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientCredit(_)));

        let bal = ledger.balance("u1").await.unwrap();
        assert_eq!(bal.get(FilingKind::Vat), 9);
        assert_eq!(bal.get(FilingKind::Corptax), 0);
    }

    #[tokio::test]
    async fn apply_once_is_idempotent() {
        let ledger = ledger();
        let deltas = Deltas::from([(FilingKind::Vat, 3)]);
        let mut record = filing_tx("u1");
        record.status = TransactionStatus::Complete;
        record.complete = true;

        let first = ledger
            .apply_once("u1", "t1", &deltas, &record)
            .await
            .unwrap();
        assert!(matches!(first, Settlement::Applied(_)));

        let second = ledger
            .apply_once("u1", "t1", &deltas, &record)
            .await
            .unwrap();
        assert_eq!(second, Settlement::AlreadyApplied);
        assert_eq!(ledger.balance("u1").await.unwrap().get(FilingKind::Vat), 3);
    }

    #[tokio::test]
    async fn record_pending_leaves_balance_untouched() {
        let ledger = ledger();
        ledger
            .record_pending(
                "u1",
                "t1",
                &Deltas::from([(FilingKind::Vat, 5)]),
                &filing_tx("u1"),
            )
            .await
            .unwrap();

        assert_eq!(ledger.balance("u1").await.unwrap().get(FilingKind::Vat), 0);
    }

    #[tokio::test]
    async fn record_pending_still_enforces_caps() {
        let ledger = ledger();
        let err = ledger
            .record_pending(
                "u1",
                "t1",
                &Deltas::from([(FilingKind::Vat, 11)]),
                &filing_tx("u1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientCredit(_)));
    }
}
