use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use reckon_shared::FilingKind;

/// One purchasable quantity with its batch price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OfferLine {
    pub quantity: i64,
    pub price: i64,
    pub discount: i64,
}

/// The price ladder offered for one filing kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindOffer {
    pub description: String,
    /// How many more credits this user may buy.
    pub permitted: i64,
    pub min_purchase: i64,
    pub offer: Vec<OfferLine>,
    /// Package discount annotation, e.g. "LAUNCHPAD 20%".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<String>,
}

/// What a user may currently buy. Derived on every request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub offer: HashMap<FilingKind, KindOffer>,
    pub vat_rate: f64,
}
