use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider failure: {0}")]
    Provider(String),

    #[error("Payment request rejected: {0}")]
    Rejected(String),
}

/// A payment intent created with the card processor. The `id` is the
/// processor's identifier; the client secret goes back to the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Card payment processor contract (Stripe-shaped).
#[async_trait]
pub trait CardPaymentAdapter: Send + Sync {
    /// Create a payment intent for `amount` minor units of `currency`.
    /// `metadata` is echoed back on webhook events and must carry the
    /// ledger transaction id.
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        receipt_email: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, PaymentError>;
}

/// A payment opened with the crypto processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoPayment {
    pub payment_id: String,
    pub pay_currency: String,
    pub pay_amount: f64,
    pub pay_address: Option<String>,
}

/// Crypto payment processor contract (IPN-driven).
#[async_trait]
pub trait CryptoPaymentAdapter: Send + Sync {
    /// Open a payment for `amount` expressed in major units of
    /// `from_currency`, payable in `to_currency`. The processor calls
    /// `callback_url` with signed IPN events as the payment progresses.
    async fn create_payment(
        &self,
        amount: f64,
        from_currency: &str,
        to_currency: &str,
        order_id: &str,
        callback_url: &str,
    ) -> Result<CryptoPayment, PaymentError>;
}
