use serde::{Deserialize, Serialize};

/// Billing details held on the user profile. A copy is frozen into every
/// ledger transaction at creation time so later profile edits never
/// rewrite financial history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BillingProfile {
    pub name: String,
    pub address: Vec<String>,
    pub city: String,
    pub county: String,
    pub country: String,
    pub postcode: String,
    pub email: String,
    pub tel: String,
    pub vat_number: String,
}
