use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{FilingRecord, FilingState, FilingStatus};
use reckon_catalog::Catalog;
use reckon_core::store::{collections, DocumentStore, StoreError};
use reckon_core::submission::{
    FilingRenderer, Obligation, SubmissionError, TaxAuthorityClient, VatReturn,
};
use reckon_ledger::{Audit, CreditLedger, Deltas, LedgerError, LedgerTransaction};
use reckon_shared::FilingKind;

#[derive(Debug, thiserror::Error)]
pub enum FilingError {
    #[error("Filing not found: {0}")]
    NotFound(String),

    #[error("Not a VAT filing")]
    NotVat,

    #[error("No open obligation is due on {0}")]
    NoObligation(String),

    #[error("Can only move errored or pending filings back to draft")]
    InvalidState,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// The VAT submission saga.
///
/// A submission is a chain of steps with one money move in the middle:
/// one VAT credit is consumed atomically through the ledger before the
/// return goes to the tax authority. If anything after the consumption
/// fails, a reversing transaction refunds the credit, so the net balance
/// effect of a failed submission is always zero. Every step appends to a
/// log that is persisted to the filing status document win or lose.
pub struct VatSubmission<S> {
    store: Arc<S>,
    ledger: CreditLedger<S>,
    audit: Audit<S>,
    authority: Arc<dyn TaxAuthorityClient>,
    renderer: Arc<dyn FilingRenderer>,
}

impl<S> Clone for VatSubmission<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            audit: self.audit.clone(),
            authority: self.authority.clone(),
            renderer: self.renderer.clone(),
        }
    }
}

impl<S: DocumentStore> VatSubmission<S> {
    pub fn new(
        store: Arc<S>,
        catalog: Catalog,
        authority: Arc<dyn TaxAuthorityClient>,
        renderer: Arc<dyn FilingRenderer>,
    ) -> Self {
        Self {
            ledger: CreditLedger::new(store.clone(), catalog),
            audit: Audit::new(store.clone()),
            store,
            authority,
            renderer,
        }
    }

    pub async fn get_filing(&self, uid: &str, fid: &str) -> Result<FilingRecord, FilingError> {
        self.store
            .get_doc(collections::FILINGS, fid)
            .await?
            .filter(|f: &FilingRecord| f.uid == uid)
            .ok_or_else(|| FilingError::NotFound(fid.to_string()))
    }

    pub async fn put_filing(&self, fid: &str, record: &FilingRecord) -> Result<(), FilingError> {
        Ok(self.store.put_doc(collections::FILINGS, fid, record).await?)
    }

    pub async fn get_filings(&self, uid: &str) -> Result<Vec<(String, FilingRecord)>, FilingError> {
        let docs = self
            .store
            .query_field(
                collections::FILINGS,
                "uid",
                &serde_json::Value::String(uid.to_string()),
            )
            .await?;

        let mut out = Vec::with_capacity(docs.len());
        for (fid, doc) in docs {
            let record = serde_json::from_value(doc).map_err(StoreError::Serialization)?;
            out.push((fid, record));
        }
        Ok(out)
    }

    pub async fn get_status(&self, uid: &str, fid: &str) -> Result<Option<FilingStatus>, FilingError> {
        self.get_filing(uid, fid).await?;
        Ok(self.store.get_doc(collections::FILING_STATUS, fid).await?)
    }

    pub async fn get_report(&self, uid: &str, fid: &str) -> Result<Option<String>, FilingError> {
        self.get_filing(uid, fid).await?;
        Ok(self.store.get_doc(collections::FILING_REPORTS, fid).await?)
    }

    /// Start a submission. The balance is prechecked so an obviously
    /// hopeless request fails fast with no writes; the saga itself runs
    /// detached, and the caller polls the status document.
    pub async fn submit(&self, uid: &str, email: &str, fid: &str) -> Result<(), FilingError> {
        let record = self.get_filing(uid, fid).await?;

        if record.kind != FilingKind::Vat {
            return Err(FilingError::NotVat);
        }

        let balance = self.ledger.balance(uid).await?;
        if balance.get(FilingKind::Vat) < 1 {
            return Err(LedgerError::InsufficientCredit(format!(
                "No {} credits available",
                FilingKind::Vat
            ))
            .into());
        }

        let saga = self.clone();
        let uid = uid.to_string();
        let email = email.to_string();
        let fid = fid.to_string();
        tokio::spawn(async move {
            saga.execute(&uid, &email, &fid).await;
        });

        Ok(())
    }

    /// Run the saga to completion, persisting the outcome. Errors end up
    /// in the status document, not back at a caller.
    pub async fn execute(&self, uid: &str, email: &str, fid: &str) {
        let mut log = Vec::new();

        let outcome = self.attempt(uid, email, fid, &mut log).await;

        let success = outcome.is_ok();
        match &outcome {
            Ok(()) => log.push("Submission complete".to_string()),
            Err(e) => {
                tracing::error!("Filing {} submission failed: {}", fid, e);
                log.push(format!("Submission failed: {}", e));
            }
        }

        let status = FilingStatus {
            time: Utc::now(),
            success,
            log,
        };
        if let Err(e) = self
            .store
            .put_doc(collections::FILING_STATUS, fid, &status)
            .await
        {
            tracing::error!("Failed to persist status for filing {}: {}", fid, e);
        }

        let state = if success {
            FilingState::Published
        } else {
            FilingState::Errored
        };
        if let Err(e) = self.set_state(fid, state).await {
            tracing::error!("Failed to persist state for filing {}: {}", fid, e);
        }
    }

    async fn attempt(
        &self,
        uid: &str,
        email: &str,
        fid: &str,
        log: &mut Vec<String>,
    ) -> Result<(), FilingError> {
        let record = self.get_filing(uid, fid).await?;

        self.clear_artifacts(fid).await?;
        self.set_state(fid, FilingState::Pending).await?;
        log.push(format!("Submission started for {}", record.label));

        let obligations = self.authority.get_open_obligations().await?;
        let obligation = obligations
            .into_iter()
            .find(|o| o.due == record.due)
            .ok_or_else(|| FilingError::NoObligation(record.due.clone()))?;
        log.push(format!(
            "Matched open obligation, period key {}",
            obligation.period_key
        ));

        // External work happens before any money moves.
        let html = self.renderer.render(uid, fid, FilingKind::Vat).await?;
        let figures = self.renderer.extract(&html)?;
        log.push("Rendered filing and extracted computed figures".to_string());

        let consumption = LedgerTransaction::filing_consumption(
            uid,
            email,
            record.company.clone(),
            &record.label,
            fid,
            FilingKind::Vat,
            Utc::now(),
        );
        let tid = Uuid::new_v4().to_string();
        self.ledger
            .apply(uid, &tid, &Deltas::from([(FilingKind::Vat, -1)]), &consumption)
            .await?;
        self.audit.mirror(&consumption, &tid).await;
        log.push("Consumed one VAT filing credit".to_string());

        // From here on a failure must give the credit back.
        match self.finish(fid, &obligation, &html, &figures, log).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.compensate(uid, consumption, log).await;
                Err(e)
            }
        }
    }

    async fn finish(
        &self,
        fid: &str,
        obligation: &Obligation,
        html: &str,
        figures: &HashMap<String, f64>,
        log: &mut Vec<String>,
    ) -> Result<(), FilingError> {
        self.store
            .put_doc(collections::FILING_REPORTS, fid, &html)
            .await?;
        self.store
            .put_doc(collections::FILING_DATA, fid, figures)
            .await?;
        log.push("Stored filing report".to_string());

        let rtn = build_vat_return(&obligation.period_key, figures)?;
        self.authority.submit_vat_return(&rtn).await?;
        log.push(format!(
            "Submitted VAT return for period {}",
            rtn.period_key
        ));

        Ok(())
    }

    /// Give the consumed credit back and leave a cancelled reversing
    /// entry next to the consumption in the ledger.
    async fn compensate(
        &self,
        uid: &str,
        consumption: LedgerTransaction,
        log: &mut Vec<String>,
    ) {
        let reversal = consumption.into_reversal("VAT filing, resulted in error");
        let tid = Uuid::new_v4().to_string();

        match self
            .ledger
            .apply(uid, &tid, &Deltas::from([(FilingKind::Vat, 1)]), &reversal)
            .await
        {
            Ok(_) => {
                self.audit.mirror(&reversal, &tid).await;
                log.push("Refunded the consumed filing credit".to_string());
            }
            Err(e) => {
                // The credit stays consumed; this needs eyes.
                tracing::error!("Credit refund failed for {}: {}", uid, e);
                log.push(format!("Credit refund failed: {}", e));
            }
        }
    }

    /// Remove artifacts of any previous attempt. Deleting what is not
    /// there is fine, so re-running this is harmless.
    async fn clear_artifacts(&self, fid: &str) -> Result<(), FilingError> {
        self.store.delete(collections::FILING_STATUS, fid).await?;
        self.store.delete(collections::FILING_REPORTS, fid).await?;
        self.store.delete(collections::FILING_DATA, fid).await?;
        Ok(())
    }

    async fn set_state(&self, fid: &str, state: FilingState) -> Result<(), FilingError> {
        let mut record: FilingRecord = self
            .store
            .get_doc(collections::FILINGS, fid)
            .await?
            .ok_or_else(|| FilingError::NotFound(fid.to_string()))?;
        record.state = state;
        self.put_filing(fid, &record).await
    }

    /// Take a stuck or failed filing back to draft so it can be edited
    /// and resubmitted. Published filings stay published.
    pub async fn move_to_draft(&self, uid: &str, fid: &str) -> Result<(), FilingError> {
        let mut record = self.get_filing(uid, fid).await?;

        match record.state {
            FilingState::Errored | FilingState::Pending => {
                record.state = FilingState::Draft;
                self.put_filing(fid, &record).await
            }
            FilingState::Draft | FilingState::Published => Err(FilingError::InvalidState),
        }
    }
}

/// Assemble the nine-box return from the figures extracted out of the
/// rendered document. A missing box is an extraction failure, not a zero.
fn build_vat_return(
    period_key: &str,
    figures: &HashMap<String, f64>,
) -> Result<VatReturn, SubmissionError> {
    let get = |tag: &str| {
        figures
            .get(tag)
            .copied()
            .ok_or_else(|| SubmissionError::Extraction(format!("Missing figure: {}", tag)))
    };

    Ok(VatReturn {
        period_key: period_key.to_string(),
        finalised: true,
        vat_due_sales: get("VatDueSales")?,
        vat_due_acquisitions: get("VatDueAcquisitions")?,
        total_vat_due: get("TotalVatDue")?,
        vat_reclaimed_curr_period: get("VatReclaimedCurrPeriod")?,
        net_vat_due: get("NetVatDue")?,
        total_value_sales_ex_vat: get("TotalValueSalesExVAT")?,
        total_value_purchases_ex_vat: get("TotalValuePurchasesExVAT")?,
        total_value_goods_supplied_ex_vat: get("TotalValueGoodsSuppliedExVAT")?,
        total_acquisitions_ex_vat: get("TotalAcquisitionsExVAT")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockRenderer, MockTaxAuthority};
    use reckon_ledger::{TransactionStatus, TransactionType};
    use reckon_store::MemoryStore;

    const DUE: &str = "2026-05-07";

    fn obligation() -> Obligation {
        Obligation {
            period_key: "26A1".to_string(),
            start: "2026-01-01".to_string(),
            end: "2026-03-31".to_string(),
            due: DUE.to_string(),
        }
    }

    fn saga(authority: MockTaxAuthority) -> (Arc<MemoryStore>, VatSubmission<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let saga = VatSubmission::new(
            store.clone(),
            Catalog::default(),
            Arc::new(authority),
            Arc::new(MockRenderer),
        );
        (store, saga)
    }

    async fn seed_filing(saga: &VatSubmission<MemoryStore>, fid: &str) {
        saga.put_filing(
            fid,
            &FilingRecord {
                uid: "u1".to_string(),
                company: Some("12874000".to_string()),
                kind: FilingKind::Vat,
                label: "VAT Q1 2026".to_string(),
                due: DUE.to_string(),
                state: FilingState::Draft,
            },
        )
        .await
        .unwrap();
    }

    async fn seed_credits(saga: &VatSubmission<MemoryStore>, count: i64) {
        let tx = LedgerTransaction::filing_consumption(
            "u1",
            "u1@example.com",
            None,
            "seed",
            "seed",
            FilingKind::Vat,
            Utc::now(),
        );
        saga.ledger
            .apply("u1", "seed", &Deltas::from([(FilingKind::Vat, count)]), &tx)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn no_credits_fails_fast_without_writes() {
        let (store, saga) = saga(MockTaxAuthority::new(vec![obligation()]));
        seed_filing(&saga, "f1").await;

        let err = saga.submit("u1", "u1@example.com", "f1").await.unwrap_err();
        assert!(matches!(
            err,
            FilingError::Ledger(LedgerError::InsufficientCredit(_))
        ));

        let record = saga.get_filing("u1", "f1").await.unwrap();
        assert_eq!(record.state, FilingState::Draft);
        assert!(store
            .get_doc::<FilingStatus>(collections::FILING_STATUS, "f1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn successful_submission_consumes_one_credit() {
        let (store, saga) = saga(MockTaxAuthority::new(vec![obligation()]));
        seed_filing(&saga, "f1").await;
        seed_credits(&saga, 2).await;

        saga.execute("u1", "u1@example.com", "f1").await;

        assert_eq!(
            saga.ledger.balance("u1").await.unwrap().get(FilingKind::Vat),
            1
        );

        let record = saga.get_filing("u1", "f1").await.unwrap();
        assert_eq!(record.state, FilingState::Published);

        let status = saga.get_status("u1", "f1").await.unwrap().unwrap();
        assert!(status.success);
        assert!(status.log.iter().any(|l| l.contains("26A1")));
        assert_eq!(status.log.last().unwrap(), "Submission complete");

        assert!(saga.get_report("u1", "f1").await.unwrap().is_some());
        assert!(store
            .get_doc::<HashMap<String, f64>>(collections::FILING_DATA, "f1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn authority_failure_refunds_the_credit() {
        let (store, saga) = saga(MockTaxAuthority::failing(vec![obligation()]));
        seed_filing(&saga, "f1").await;
        seed_credits(&saga, 2).await;

        saga.execute("u1", "u1@example.com", "f1").await;

        // Net zero balance change.
        assert_eq!(
            saga.ledger.balance("u1").await.unwrap().get(FilingKind::Vat),
            2
        );

        let record = saga.get_filing("u1", "f1").await.unwrap();
        assert_eq!(record.state, FilingState::Errored);

        let status = saga.get_status("u1", "f1").await.unwrap().unwrap();
        assert!(!status.success);
        assert!(status
            .log
            .iter()
            .any(|l| l.contains("Refunded the consumed filing credit")));

        // Both the consumption and the cancelled reversal stay in the
        // ledger.
        let txs = store
            .query_field(
                collections::TRANSACTIONS,
                "uid",
                &serde_json::json!("u1"),
            )
            .await
            .unwrap();
        let filings: Vec<LedgerTransaction> = txs
            .into_iter()
            .filter(|(tid, _)| tid != "seed")
            .map(|(_, v)| serde_json::from_value(v).unwrap())
            .collect();
        assert_eq!(filings.len(), 2);
        assert!(filings
            .iter()
            .all(|t| t.kind == TransactionType::Filing));
        assert!(filings
            .iter()
            .any(|t| t.status == TransactionStatus::Complete && t.order.items[0].quantity == -1));
        assert!(filings
            .iter()
            .any(|t| t.status == TransactionStatus::Cancelled && t.order.items[0].quantity == 0));
    }

    #[tokio::test]
    async fn unmatched_due_date_errors_before_any_consumption() {
        let (_, saga) = saga(MockTaxAuthority::new(vec![]));
        seed_filing(&saga, "f1").await;
        seed_credits(&saga, 1).await;

        saga.execute("u1", "u1@example.com", "f1").await;

        assert_eq!(
            saga.ledger.balance("u1").await.unwrap().get(FilingKind::Vat),
            1
        );
        let record = saga.get_filing("u1", "f1").await.unwrap();
        assert_eq!(record.state, FilingState::Errored);
        let status = saga.get_status("u1", "f1").await.unwrap().unwrap();
        assert!(status.log.iter().any(|l| l.contains(DUE)));
    }

    #[tokio::test]
    async fn resubmission_clears_the_previous_status() {
        let (_, saga) = saga(MockTaxAuthority::new(vec![obligation()]));
        seed_filing(&saga, "f1").await;
        seed_credits(&saga, 2).await;

        // First attempt fails before consumption (no obligations yet is
        // simulated by a bad due date), leaving an errored status.
        let mut record = saga.get_filing("u1", "f1").await.unwrap();
        record.due = "1999-01-01".to_string();
        saga.put_filing("f1", &record).await.unwrap();
        saga.execute("u1", "u1@example.com", "f1").await;
        assert!(!saga.get_status("u1", "f1").await.unwrap().unwrap().success);

        saga.move_to_draft("u1", "f1").await.unwrap();
        let mut record = saga.get_filing("u1", "f1").await.unwrap();
        record.due = DUE.to_string();
        saga.put_filing("f1", &record).await.unwrap();

        saga.execute("u1", "u1@example.com", "f1").await;
        assert!(saga.get_status("u1", "f1").await.unwrap().unwrap().success);
    }

    #[tokio::test]
    async fn move_to_draft_only_from_errored_or_pending() {
        let (_, saga) = saga(MockTaxAuthority::new(vec![obligation()]));
        seed_filing(&saga, "f1").await;

        // Draft already; nothing to undo.
        assert!(matches!(
            saga.move_to_draft("u1", "f1").await,
            Err(FilingError::InvalidState)
        ));

        seed_credits(&saga, 1).await;
        saga.execute("u1", "u1@example.com", "f1").await;
        let record = saga.get_filing("u1", "f1").await.unwrap();
        assert_eq!(record.state, FilingState::Published);
        assert!(matches!(
            saga.move_to_draft("u1", "f1").await,
            Err(FilingError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn non_vat_filing_is_rejected() {
        let (_, saga) = saga(MockTaxAuthority::new(vec![obligation()]));
        saga.put_filing(
            "f1",
            &FilingRecord {
                uid: "u1".to_string(),
                company: None,
                kind: FilingKind::Corptax,
                label: "CT 2026".to_string(),
                due: DUE.to_string(),
                state: FilingState::Draft,
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            saga.submit("u1", "u1@example.com", "f1").await,
            Err(FilingError::NotVat)
        ));
    }

    #[test]
    fn missing_figure_is_an_extraction_error() {
        let figures = HashMap::from([("VatDueSales".to_string(), 100.0)]);
        assert!(matches!(
            build_vat_return("26A1", &figures),
            Err(SubmissionError::Extraction(_))
        ));
    }
}
