use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::VerificationFailure;
use crate::models::{CardEvent, CommerceSettings};
use crate::verifier::{order_deltas, verify_order, InvalidOrder};
use reckon_catalog::Catalog;
use reckon_core::payment::{CardPaymentAdapter, PaymentError};
use reckon_core::store::{collections, DocumentStore, StoreError};
use reckon_ledger::{
    Audit, AuditRecord, CreditLedger, Deltas, LedgerError, LedgerTransaction, PaymentDetail,
    PaymentMethod, Settlement, TransactionStatus,
};
use reckon_offer::{Offer, OfferBuilder};
use reckon_shared::{BillingProfile, FilingKind, Order, OrderItem, Package, Referrals};

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error(transparent)]
    Invalid(#[from] InvalidOrder),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Verification(#[from] VerificationFailure),

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Unknown referral: {0}")]
    UnknownReferral(String),
}

/// The card purchase workflow: offer, order creation, payment intent,
/// webhook reconciliation. Balances only move when the processor says
/// money did.
pub struct OrderWorkflow<S> {
    store: Arc<S>,
    catalog: Catalog,
    ledger: CreditLedger<S>,
    audit: Audit<S>,
    card: Arc<dyn CardPaymentAdapter>,
    settings: CommerceSettings,
}

impl<S> Clone for OrderWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            catalog: self.catalog.clone(),
            ledger: self.ledger.clone(),
            audit: self.audit.clone(),
            card: self.card.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: DocumentStore> OrderWorkflow<S> {
    pub fn new(
        store: Arc<S>,
        catalog: Catalog,
        card: Arc<dyn CardPaymentAdapter>,
        settings: CommerceSettings,
    ) -> Self {
        Self {
            ledger: CreditLedger::new(store.clone(), catalog.clone()),
            audit: Audit::new(store.clone()),
            store,
            catalog,
            card,
            settings,
        }
    }

    pub fn ledger(&self) -> &CreditLedger<S> {
        &self.ledger
    }

    async fn current_package(&self, uid: &str) -> Result<Option<Package>, OrderError> {
        Ok(self.store.get_doc(collections::PACKAGES, uid).await?)
    }

    async fn billing_profile(&self, uid: &str) -> Result<BillingProfile, OrderError> {
        Ok(self
            .store
            .get_doc(collections::PROFILES, uid)
            .await?
            .unwrap_or_default())
    }

    /// The purchasable-quantity/price table for this user right now.
    pub async fn get_offer(&self, uid: &str) -> Result<Offer, OrderError> {
        let balance = self.ledger.balance(uid).await?;
        let package = self.current_package(uid).await?;
        Ok(OfferBuilder::new(self.catalog.clone()).build(
            &balance,
            package.as_ref(),
            self.settings.vat_rate,
            Utc::now(),
        ))
    }

    /// Verify a client-submitted order, capacity-check its deltas and
    /// record a `created` transaction. The balance is untouched: money
    /// has not moved yet.
    pub async fn create_order(
        &self,
        uid: &str,
        email: &str,
        order: Order,
    ) -> Result<String, OrderError> {
        let now = Utc::now();
        let package = self.current_package(uid).await?;

        verify_order(
            &order,
            &self.catalog,
            package.as_ref(),
            self.settings.vat_rate,
            now,
        )?;

        let deltas = order_deltas(&order);
        let billing = self.billing_profile(uid).await?;

        let record = LedgerTransaction::order(
            uid,
            email,
            billing,
            &self.settings.seller_name,
            &self.settings.seller_vat_number,
            PaymentDetail {
                method: PaymentMethod::CreditCard,
                processor: "Stripe".to_string(),
                payment_id: None,
                currency: Some("gbp".to_string()),
                status: None,
                amount: None,
            },
            order,
            now,
        );

        let tid = Uuid::new_v4().to_string();
        let result = self.ledger.record_pending(uid, &tid, &deltas, &record).await;

        // Mirrored whether or not the capacity check passed; the audit
        // trail records the attempt either way.
        self.audit.mirror(&record, &tid).await;

        result?;
        tracing::info!("Order {} created for {}", tid, uid);
        Ok(tid)
    }

    /// Ask the card processor for a payment intent for the order total
    /// and move the transaction to `pending`. Returns the client secret.
    pub async fn create_payment(
        &self,
        uid: &str,
        tid: &str,
        email: &str,
    ) -> Result<String, OrderError> {
        let mut tx: LedgerTransaction = self
            .store
            .get_doc(collections::TRANSACTIONS, tid)
            .await?
            .filter(|t: &LedgerTransaction| t.uid == uid)
            .ok_or_else(|| OrderError::NotFound(tid.to_string()))?;

        let metadata = HashMap::from([
            ("transaction".to_string(), tid.to_string()),
            ("uid".to_string(), uid.to_string()),
        ]);

        let intent = self
            .card
            .create_intent(tx.order.total, "gbp", email, metadata)
            .await?;

        if let Some(payment) = tx.payment.as_mut() {
            payment.payment_id = Some(intent.id.clone());
        }
        tx.status = TransactionStatus::Pending;

        self.store.put_doc(collections::TRANSACTIONS, tid, &tx).await?;
        self.audit.mirror(&tx, tid).await;

        Ok(intent.client_secret)
    }

    /// Reconcile a card processor webhook event against the
    /// transaction. A `Succeeded` event applies the balance deltas
    /// through the ledger; applying it twice is a balance no-op.
    pub async fn handle_card_event(
        &self,
        uid: &str,
        tid: &str,
        event: CardEvent,
    ) -> Result<(), OrderError> {
        let mut tx: LedgerTransaction = self
            .store
            .get_doc(collections::TRANSACTIONS, tid)
            .await?
            .filter(|t: &LedgerTransaction| t.uid == uid)
            .ok_or_else(|| OrderError::NotFound(tid.to_string()))?;

        let (status, processor_status) = match event {
            CardEvent::Created => (TransactionStatus::Created, "created"),
            CardEvent::Canceled => (TransactionStatus::Cancelled, "cancelled"),
            CardEvent::PaymentFailed => (TransactionStatus::Failed, "failed"),
            CardEvent::Processing => (TransactionStatus::Pending, "processing"),
            CardEvent::Succeeded => (TransactionStatus::Complete, "complete"),
        };

        tx.status = status;
        if let Some(payment) = tx.payment.as_mut() {
            payment.status = Some(processor_status.to_string());
        }

        if event == CardEvent::Succeeded {
            tx.complete = true;
            let deltas = order_deltas(&tx.order);

            match self.ledger.apply_once(uid, tid, &deltas, &tx).await? {
                Settlement::Applied(balance) => {
                    tracing::info!("Order {} complete, balance now {:?}", tid, balance);
                }
                Settlement::AlreadyApplied => {
                    tracing::info!("Duplicate succeeded event for {}, balance untouched", tid);
                }
            }
        } else {
            self.store.put_doc(collections::TRANSACTIONS, tid, &tx).await?;
        }

        self.audit.mirror(&tx, tid).await;
        Ok(())
    }

    /// Complete an order that costs nothing to the user: verified like
    /// any other, then the deltas and the `complete` transaction land in
    /// one ledger operation.
    pub async fn complete_free_order(
        &self,
        uid: &str,
        email: &str,
        order: Order,
    ) -> Result<String, OrderError> {
        let now = Utc::now();
        let package = self.current_package(uid).await?;

        verify_order(
            &order,
            &self.catalog,
            package.as_ref(),
            self.settings.vat_rate,
            now,
        )?;

        let deltas = order_deltas(&order);
        let billing = self.billing_profile(uid).await?;

        let mut record = LedgerTransaction::order(
            uid,
            email,
            billing,
            &self.settings.seller_name,
            &self.settings.seller_vat_number,
            PaymentDetail {
                method: PaymentMethod::Free,
                processor: "Free transaction".to_string(),
                payment_id: None,
                currency: None,
                status: Some("complete".to_string()),
                amount: None,
            },
            order,
            now,
        );
        record.status = TransactionStatus::Complete;
        record.complete = true;

        let tid = Uuid::new_v4().to_string();
        let result = self.ledger.apply(uid, &tid, &deltas, &record).await;

        self.audit.mirror(&record, &tid).await;

        result?;
        Ok(tid)
    }

    /// Adopt a referral package: it becomes the user's current package
    /// and its join-up credits land on the balance as a free completed
    /// transaction.
    pub async fn adopt_package(
        &self,
        uid: &str,
        email: &str,
        referral_id: &str,
    ) -> Result<Package, OrderError> {
        let now = Utc::now();
        let package = Referrals::new()
            .get_package(referral_id, now)
            .ok_or_else(|| OrderError::UnknownReferral(referral_id.to_string()))?;

        self.store
            .put_doc(collections::PACKAGES, uid, &package)
            .await?;

        let mut deltas = Deltas::new();
        let mut items = Vec::new();
        for kind in FilingKind::ALL {
            let credits = package.join_up_credits.get(kind);
            if credits > 0 {
                deltas.insert(kind, credits);
                items.push(OrderItem {
                    kind,
                    description: format!("{} join-up credits", package.id),
                    quantity: credits,
                    amount: 0,
                    discount: 0,
                });
            }
        }

        if !deltas.is_empty() {
            let billing = self.billing_profile(uid).await?;
            let mut record = LedgerTransaction::order(
                uid,
                email,
                billing,
                &self.settings.seller_name,
                &self.settings.seller_vat_number,
                PaymentDetail {
                    method: PaymentMethod::Free,
                    processor: "Join-up credits".to_string(),
                    payment_id: None,
                    currency: None,
                    status: Some("complete".to_string()),
                    amount: None,
                },
                Order {
                    items,
                    subtotal: 0,
                    vat_rate: 0.0,
                    vat: 0,
                    total: 0,
                },
                now,
            );
            record.status = TransactionStatus::Complete;
            record.complete = true;

            let tid = Uuid::new_v4().to_string();
            let result = self.ledger.apply(uid, &tid, &deltas, &record).await;
            self.audit.mirror(&record, &tid).await;
            result?;
        }

        let event = AuditRecord::event_record("package", uid, Some(email), Some(&package.id));
        if let Err(e) = self.audit.write(&event, None).await {
            tracing::warn!("Audit write failed for package adoption by {}: {}", uid, e);
        }

        tracing::info!("User {} adopted package {}", uid, package.id);
        Ok(package)
    }

    pub async fn get_transaction(
        &self,
        uid: &str,
        tid: &str,
    ) -> Result<LedgerTransaction, OrderError> {
        self.store
            .get_doc(collections::TRANSACTIONS, tid)
            .await?
            .filter(|t: &LedgerTransaction| t.uid == uid)
            .ok_or_else(|| OrderError::NotFound(tid.to_string()))
    }

    pub async fn get_transactions(
        &self,
        uid: &str,
    ) -> Result<Vec<(String, LedgerTransaction)>, OrderError> {
        let docs = self
            .store
            .query_field(
                collections::TRANSACTIONS,
                "uid",
                &serde_json::Value::String(uid.to_string()),
            )
            .await?;

        let mut out = Vec::with_capacity(docs.len());
        for (tid, doc) in docs {
            let tx = serde_json::from_value(doc).map_err(StoreError::Serialization)?;
            out.push((tid, tx));
        }
        Ok(out)
    }
}
