use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use reckon_core::payment::{
    CardPaymentAdapter, CryptoPayment, CryptoPaymentAdapter, PaymentError, PaymentIntent,
};

/// Card adapter that approves every intent. Stands in for the real
/// processor in development and tests.
pub struct MockCardAdapter;

#[async_trait]
impl CardPaymentAdapter for MockCardAdapter {
    async fn create_intent(
        &self,
        amount: i64,
        _currency: &str,
        receipt_email: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, PaymentError> {
        let id = format!("pi_{}", Uuid::new_v4().simple());
        tracing::debug!(
            "Mock card intent {} for {} minor units to {} ({:?})",
            id,
            amount,
            receipt_email,
            metadata
        );
        Ok(PaymentIntent {
            client_secret: format!("{}_secret", id),
            id,
        })
    }
}

/// Crypto adapter that opens a payment without talking to anyone.
pub struct MockCryptoAdapter;

#[async_trait]
impl CryptoPaymentAdapter for MockCryptoAdapter {
    async fn create_payment(
        &self,
        amount: f64,
        from_currency: &str,
        to_currency: &str,
        order_id: &str,
        _callback_url: &str,
    ) -> Result<CryptoPayment, PaymentError> {
        let payment_id = Uuid::new_v4().simple().to_string();
        tracing::debug!(
            "Mock crypto payment {} for {} {} payable in {} (order {})",
            payment_id,
            amount,
            from_currency,
            to_currency,
            order_id
        );
        Ok(CryptoPayment {
            payment_id,
            pay_currency: to_currency.to_string(),
            // A fixed toy rate; real quotes come from the processor.
            pay_amount: amount / 10_000.0,
            pay_address: Some("mock-pay-address".to_string()),
        })
    }
}
