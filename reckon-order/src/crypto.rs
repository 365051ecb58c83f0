use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Sha256, Sha512};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::CommerceSettings;
use crate::verifier::{order_deltas, verify_order};
use crate::workflow::OrderError;
use reckon_catalog::Catalog;
use reckon_core::payment::{CryptoPayment, CryptoPaymentAdapter};
use reckon_core::store::{collections, DocumentStore, StoreError};
use reckon_ledger::{
    Audit, CreditLedger, LedgerTransaction, PaymentDetail, PaymentMethod, Settlement,
    TransactionStatus,
};
use reckon_shared::{BillingProfile, Order, Package};

type HmacSha512 = Hmac<Sha512>;
type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum VerificationFailure {
    #[error("IPN body is not valid JSON")]
    MalformedBody,

    #[error("IPN signature is not valid hex")]
    MalformedSignature,

    #[error("IPN signature key rejected")]
    InvalidKey,

    #[error("IPN signature does not match")]
    BadSignature,
}

/// Canonical form the crypto processor signs: the JSON object
/// re-serialized compact with keys sorted.
fn canonical_body(body: &[u8]) -> Result<(Value, String), VerificationFailure> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| VerificationFailure::MalformedBody)?;
    // serde_json's default map ordering is sorted, so re-serializing
    // yields the canonical form regardless of wire key order.
    let canonical =
        serde_json::to_string(&value).map_err(|_| VerificationFailure::MalformedBody)?;
    Ok((value, canonical))
}

/// Verify an IPN callback's HMAC-SHA512 signature in constant time and
/// return the parsed body. The signature covers the canonical
/// sorted-key serialization, not the raw bytes.
pub fn verify_ipn_signature(
    secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<Value, VerificationFailure> {
    let (value, canonical) = canonical_body(body)?;

    let expected = hex::decode(signature).map_err(|_| VerificationFailure::MalformedSignature)?;

    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| VerificationFailure::InvalidKey)?;
    mac.update(canonical.as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| VerificationFailure::BadSignature)?;

    Ok(value)
}

/// Verify a card processor webhook signature header of the form
/// `t=<unix seconds>,v1=<hex digest>`, where the digest is HMAC-SHA256
/// over `"{t}.{body}"`.
pub fn verify_card_signature(
    secret: &str,
    body: &[u8],
    header: &str,
) -> Result<(), VerificationFailure> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signature = Some(v),
            _ => {}
        }
    }
    let (Some(t), Some(sig)) = (timestamp, signature) else {
        return Err(VerificationFailure::MalformedSignature);
    };

    let expected = hex::decode(sig).map_err(|_| VerificationFailure::MalformedSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerificationFailure::InvalidKey)?;
    mac.update(t.as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| VerificationFailure::BadSignature)
}

/// The fields of an IPN callback the workflow acts on. The processor
/// sends more; the rest is covered by the signature and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct IpnEvent {
    pub order_id: String,
    pub payment_status: String,
    #[serde(default)]
    pub payment_id: Option<Value>,
    #[serde(default)]
    pub pay_amount: Option<f64>,
}

impl IpnEvent {
    /// The processor sends payment ids as numbers or strings.
    pub fn payment_id_string(&self) -> Option<String> {
        match &self.payment_id {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        }
    }
}

/// The crypto purchase workflow. Orders are created and paid through
/// the crypto processor; the balance moves only on a signed `finished`
/// IPN callback.
pub struct CryptoWorkflow<S> {
    store: Arc<S>,
    catalog: Catalog,
    ledger: CreditLedger<S>,
    audit: Audit<S>,
    crypto: Arc<dyn CryptoPaymentAdapter>,
    settings: CommerceSettings,
    ipn_secret: String,
    ipn_url: String,
}

impl<S> Clone for CryptoWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            catalog: self.catalog.clone(),
            ledger: self.ledger.clone(),
            audit: self.audit.clone(),
            crypto: self.crypto.clone(),
            settings: self.settings.clone(),
            ipn_secret: self.ipn_secret.clone(),
            ipn_url: self.ipn_url.clone(),
        }
    }
}

impl<S: DocumentStore> CryptoWorkflow<S> {
    pub fn new(
        store: Arc<S>,
        catalog: Catalog,
        crypto: Arc<dyn CryptoPaymentAdapter>,
        settings: CommerceSettings,
        ipn_secret: String,
        ipn_url: String,
    ) -> Self {
        Self {
            ledger: CreditLedger::new(store.clone(), catalog.clone()),
            audit: Audit::new(store.clone()),
            store,
            catalog,
            crypto,
            settings,
            ipn_secret,
            ipn_url,
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

    /// Verify the order, record it, and open a payment with the crypto
    /// processor payable in `pay_currency`. Returns the transaction id
    /// and the payment details the client needs to pay.
    pub async fn create_payment(
        &self,
        uid: &str,
        email: &str,
        order: Order,
        pay_currency: &str,
    ) -> Result<(String, CryptoPayment), OrderError> {
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
        let total = order.total;

        let mut record = LedgerTransaction::order(
            uid,
            email,
            billing,
            &self.settings.seller_name,
            &self.settings.seller_vat_number,
            PaymentDetail {
                method: PaymentMethod::Crypto,
                processor: "NowPayments".to_string(),
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
        self.audit.mirror(&record, &tid).await;
        result?;

        // Totals are stored in minor units; the processor wants major.
        let payment = self
            .crypto
            .create_payment(
                total as f64 / 100.0,
                "gbp",
                pay_currency,
                &tid,
                &self.ipn_url,
            )
            .await?;

        if let Some(p) = record.payment.as_mut() {
            p.payment_id = Some(payment.payment_id.clone());
            p.amount = Some(payment.pay_amount);
        }
        record.status = TransactionStatus::Pending;
        self.store
            .put_doc(collections::TRANSACTIONS, &tid, &record)
            .await?;
        self.audit.mirror(&record, &tid).await;

        tracing::info!("Crypto payment {} opened for order {}", payment.payment_id, tid);
        Ok((tid, payment))
    }

    /// Verify and reconcile an IPN callback. A `finished` status applies
    /// the deltas through the ledger; redelivery is a balance no-op.
    pub async fn handle_ipn(&self, body: &[u8], signature: &str) -> Result<(), OrderError> {
        let value = verify_ipn_signature(&self.ipn_secret, body, signature)?;
        let event: IpnEvent =
            serde_json::from_value(value).map_err(StoreError::Serialization)?;

        let tid = event.order_id.clone();
        let mut tx: LedgerTransaction = self
            .store
            .get_doc(collections::TRANSACTIONS, &tid)
            .await?
            .ok_or_else(|| OrderError::NotFound(tid.clone()))?;

        if let Some(p) = tx.payment.as_mut() {
            p.status = Some(event.payment_status.clone());
            if let Some(id) = event.payment_id_string() {
                p.payment_id = Some(id);
            }
            if let Some(amount) = event.pay_amount {
                p.amount = Some(amount);
            }
        }

        match event.payment_status.as_str() {
            "finished" => {
                tx.status = TransactionStatus::Complete;
                tx.complete = true;
                let uid = tx.uid.clone();
                let deltas = order_deltas(&tx.order);

                match self.ledger.apply_once(&uid, &tid, &deltas, &tx).await? {
                    Settlement::Applied(balance) => {
                        tracing::info!("Crypto order {} complete, balance now {:?}", tid, balance);
                    }
                    Settlement::AlreadyApplied => {
                        tracing::info!("Duplicate finished IPN for {}, balance untouched", tid);
                    }
                }
            }
            "failed" | "refunded" | "expired" => {
                if !tx.complete {
                    tx.status = TransactionStatus::Failed;
                }
                self.store
                    .put_doc(collections::TRANSACTIONS, &tid, &tx)
                    .await?;
            }
            // created, waiting, confirming, confirmed, sending,
            // partially_paid: still in flight.
            _ => {
                if !tx.complete {
                    tx.status = TransactionStatus::Pending;
                }
                self.store
                    .put_doc(collections::TRANSACTIONS, &tid, &tx)
                    .await?;
            }
        }

        self.audit.mirror(&tx, &tid).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockCryptoAdapter;
    use reckon_shared::{FilingKind, OrderItem};
    use reckon_store::MemoryStore;

    const SECRET: &str = "ipn-secret";

    fn sign(body: &str) -> String {
        let value: Value = serde_json::from_str(body).unwrap();
        let canonical = serde_json::to_string(&value).unwrap();
        let mut mac = HmacSha512::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_verifies() {
        let body = r#"{"order_id":"t1","payment_status":"finished"}"#;
        let sig = sign(body);
        verify_ipn_signature(SECRET, body.as_bytes(), &sig).unwrap();
    }

    #[test]
    fn signature_survives_key_reordering() {
        // Signed canonical form has sorted keys; the wire body arrives
        // with keys in another order.
        let canonical = r#"{"order_id":"t1","payment_status":"finished"}"#;
        let reordered = r#"{"payment_status":"finished","order_id":"t1"}"#;
        let sig = sign(canonical);
        verify_ipn_signature(SECRET, reordered.as_bytes(), &sig).unwrap();
    }

    #[test]
    fn tampered_body_is_rejected() {
        let body = r#"{"order_id":"t1","payment_status":"waiting"}"#;
        let sig = sign(body);
        let tampered = r#"{"order_id":"t1","payment_status":"finished"}"#;
        assert!(matches!(
            verify_ipn_signature(SECRET, tampered.as_bytes(), &sig),
            Err(VerificationFailure::BadSignature)
        ));
    }

    #[test]
    fn garbage_signature_is_rejected() {
        let body = r#"{"order_id":"t1"}"#;
        assert!(matches!(
            verify_ipn_signature(SECRET, body.as_bytes(), "not-hex"),
            Err(VerificationFailure::MalformedSignature)
        ));
    }

    fn card_sign(secret: &str, t: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(t.as_bytes());
        mac.update(b".");
        mac.update(body);
        format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn card_signature_verifies() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let header = card_sign("whsec_1", "1756166400", body);
        verify_card_signature("whsec_1", body, &header).unwrap();
    }

    #[test]
    fn card_signature_over_tampered_body_is_rejected() {
        let header = card_sign("whsec_1", "1756166400", b"{}");
        assert!(matches!(
            verify_card_signature("whsec_1", b"{ }", &header),
            Err(VerificationFailure::BadSignature)
        ));
    }

    #[test]
    fn card_signature_header_without_v1_is_malformed() {
        assert!(matches!(
            verify_card_signature("whsec_1", b"{}", "t=1756166400"),
            Err(VerificationFailure::MalformedSignature)
        ));
    }

    fn settings() -> CommerceSettings {
        CommerceSettings {
            seller_name: "Reckon Ltd".to_string(),
            seller_vat_number: "GB123456789".to_string(),
            vat_rate: 0.2,
        }
    }

    fn workflow() -> CryptoWorkflow<MemoryStore> {
        CryptoWorkflow::new(
            Arc::new(MemoryStore::new()),
            Catalog::default(),
            Arc::new(MockCryptoAdapter),
            settings(),
            SECRET.to_string(),
            "https://api.example.com/callback/crypto".to_string(),
        )
    }

    fn vat_order(quantity: i64) -> Order {
        let catalog = Catalog::default();
        let product = catalog.get(FilingKind::Vat).unwrap();
        let p = reckon_catalog::PricingEngine::new().price(product, quantity, None, Utc::now());
        let vat = (p.price as f64 * 0.2).round() as i64;
        Order {
            items: vec![OrderItem {
                kind: FilingKind::Vat,
                description: "VAT return".to_string(),
                quantity,
                amount: p.price,
                discount: p.discount,
            }],
            subtotal: p.price,
            vat_rate: 0.2,
            vat,
            total: p.price + vat,
        }
    }

    fn ipn(tid: &str, status: &str) -> (String, String) {
        let body = serde_json::json!({
            "order_id": tid,
            "payment_status": status,
            "payment_id": 4522192101u64,
            "pay_amount": 0.0123,
        })
        .to_string();
        let sig = sign(&body);
        (body, sig)
    }

    #[tokio::test]
    async fn finished_ipn_credits_once() {
        let wf = workflow();
        let (tid, payment) = wf
            .create_payment("u1", "u1@example.com", vat_order(3), "btc")
            .await
            .unwrap();
        assert!(!payment.payment_id.is_empty());
        assert_eq!(
            wf.ledger().balance("u1").await.unwrap().get(FilingKind::Vat),
            0
        );

        let (body, sig) = ipn(&tid, "finished");
        wf.handle_ipn(body.as_bytes(), &sig).await.unwrap();
        wf.handle_ipn(body.as_bytes(), &sig).await.unwrap();

        assert_eq!(
            wf.ledger().balance("u1").await.unwrap().get(FilingKind::Vat),
            3
        );
    }

    #[tokio::test]
    async fn failed_ipn_marks_the_transaction_failed() {
        let wf = workflow();
        let (tid, _) = wf
            .create_payment("u1", "u1@example.com", vat_order(2), "btc")
            .await
            .unwrap();

        let (body, sig) = ipn(&tid, "failed");
        wf.handle_ipn(body.as_bytes(), &sig).await.unwrap();

        let tx: LedgerTransaction = wf
            .store
            .get_doc(collections::TRANSACTIONS, &tid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(
            wf.ledger().balance("u1").await.unwrap().get(FilingKind::Vat),
            0
        );
    }

    #[tokio::test]
    async fn bad_signature_changes_nothing() {
        let wf = workflow();
        let (tid, _) = wf
            .create_payment("u1", "u1@example.com", vat_order(2), "btc")
            .await
            .unwrap();

        let body = serde_json::json!({
            "order_id": tid,
            "payment_status": "finished",
        })
        .to_string();

        let err = wf.handle_ipn(body.as_bytes(), &hex::encode([0u8; 64])).await;
        assert!(matches!(
            err,
            Err(OrderError::Verification(VerificationFailure::BadSignature))
        ));
        assert_eq!(
            wf.ledger().balance("u1").await.unwrap().get(FilingKind::Vat),
            0
        );
    }

    #[tokio::test]
    async fn waiting_ipn_keeps_the_transaction_pending() {
        let wf = workflow();
        let (tid, _) = wf
            .create_payment("u1", "u1@example.com", vat_order(1), "btc")
            .await
            .unwrap();

        let (body, sig) = ipn(&tid, "waiting");
        wf.handle_ipn(body.as_bytes(), &sig).await.unwrap();

        let tx: LedgerTransaction = wf
            .store
            .get_doc(collections::TRANSACTIONS, &tid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.payment.unwrap().payment_id.unwrap(), "4522192101");
    }
}
