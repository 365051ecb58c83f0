use serde::{Deserialize, Serialize};

use crate::kinds::FilingKind;

/// One line of a client-submitted order. Everything in here is untrusted
/// and is re-derived server-side before acceptance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub kind: FilingKind,
    pub description: String,
    pub quantity: i64,
    /// Price for the whole line, minor currency units.
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub discount: i64,
}

/// A client-submitted order for filing credits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub subtotal: i64,
    #[serde(default)]
    pub vat_rate: f64,
    #[serde(default)]
    pub vat: i64,
    #[serde(default)]
    pub total: i64,
}
