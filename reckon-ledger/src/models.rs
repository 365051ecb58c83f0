use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reckon_shared::{BillingProfile, FilingKind, Order, OrderItem};

/// What kind of balance-affecting event a ledger transaction records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Order,
    Filing,
    Refund,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Created,
    Pending,
    Complete,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    #[serde(rename = "credit-card")]
    CreditCard,
    #[serde(rename = "crypto")]
    Crypto,
    #[serde(rename = "free")]
    Free,
}

/// How a transaction was (or will be) paid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentDetail {
    pub method: PaymentMethod,
    pub processor: String,
    /// The processor's external payment id, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Processor-reported status string, recorded verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

/// An immutable-once-complete record of a balance-affecting event.
/// Billing details are snapshotted from the profile at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub complete: bool,
    pub time: DateTime<Utc>,
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<BillingProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_vat_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentDetail>,
    /// Company number, for filing transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Filing label and id, for filing transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filing_id: Option<String>,
    pub order: Order,
}

impl LedgerTransaction {
    /// A purchase transaction in its initial `created` state.
    pub fn order(
        uid: &str,
        email: &str,
        billing: BillingProfile,
        seller_name: &str,
        seller_vat_number: &str,
        payment: PaymentDetail,
        order: Order,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: TransactionType::Order,
            status: TransactionStatus::Created,
            complete: false,
            time,
            uid: uid.to_string(),
            email: email.to_string(),
            billing: Some(billing),
            seller_name: Some(seller_name.to_string()),
            seller_vat_number: Some(seller_vat_number.to_string()),
            payment: Some(payment),
            company: None,
            filing: None,
            filing_id: None,
            order,
        }
    }

    /// A consumption transaction for one filing credit, written
    /// `complete` in the same atomic operation as the balance decrement.
    pub fn filing_consumption(
        uid: &str,
        email: &str,
        company: Option<String>,
        label: &str,
        filing_id: &str,
        kind: FilingKind,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: TransactionType::Filing,
            status: TransactionStatus::Complete,
            complete: true,
            time,
            uid: uid.to_string(),
            email: email.to_string(),
            billing: None,
            seller_name: None,
            seller_vat_number: None,
            payment: None,
            company,
            filing: Some(label.to_string()),
            filing_id: Some(filing_id.to_string()),
            order: Order {
                items: vec![OrderItem {
                    kind,
                    description: format!("{} filing credit", kind.as_str().to_uppercase()),
                    quantity: -1,
                    amount: 0,
                    discount: 0,
                }],
                subtotal: 0,
                vat_rate: 0.0,
                vat: 0,
                total: 0,
            },
        }
    }

    /// Rewrite this transaction as the reversing record left behind when
    /// a filing failed after its credit was consumed.
    pub fn into_reversal(mut self, description: &str) -> Self {
        self.status = TransactionStatus::Cancelled;
        self.complete = false;
        if let Some(item) = self.order.items.first_mut() {
            item.quantity = 0;
            item.description = description.to_string();
        }
        self
    }
}
