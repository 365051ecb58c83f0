use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use reckon_shared::FilingKind;

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("Figure extraction failed: {0}")]
    Extraction(String),
}

/// An open obligation reported by the tax authority. Due dates are
/// compared as strings, exactly as configured on the filing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obligation {
    #[serde(rename = "periodKey")]
    pub period_key: String,
    pub start: String,
    pub end: String,
    pub due: String,
}

/// The nine-box VAT return submitted to the authority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VatReturn {
    #[serde(rename = "periodKey")]
    pub period_key: String,
    pub finalised: bool,
    #[serde(rename = "vatDueSales")]
    pub vat_due_sales: f64,
    #[serde(rename = "vatDueAcquisitions")]
    pub vat_due_acquisitions: f64,
    #[serde(rename = "totalVatDue")]
    pub total_vat_due: f64,
    #[serde(rename = "vatReclaimedCurrPeriod")]
    pub vat_reclaimed_curr_period: f64,
    #[serde(rename = "netVatDue")]
    pub net_vat_due: f64,
    #[serde(rename = "totalValueSalesExVAT")]
    pub total_value_sales_ex_vat: f64,
    #[serde(rename = "totalValuePurchasesExVAT")]
    pub total_value_purchases_ex_vat: f64,
    #[serde(rename = "totalValueGoodsSuppliedExVAT")]
    pub total_value_goods_supplied_ex_vat: f64,
    #[serde(rename = "totalAcquisitionsExVAT")]
    pub total_acquisitions_ex_vat: f64,
}

/// Tax authority client contract. Raises on transport or auth failure;
/// the filing saga compensates.
#[async_trait]
pub trait TaxAuthorityClient: Send + Sync {
    async fn get_open_obligations(&self) -> Result<Vec<Obligation>, SubmissionError>;

    async fn submit_vat_return(&self, rtn: &VatReturn) -> Result<(), SubmissionError>;
}

/// Renders a filing into an iXBRL document and extracts the computed
/// figures from it.
#[async_trait]
pub trait FilingRenderer: Send + Sync {
    async fn render(
        &self,
        uid: &str,
        filing_id: &str,
        kind: FilingKind,
    ) -> Result<String, SubmissionError>;

    /// Flatten a rendered document into its computed `{tag: value}` map.
    fn extract(&self, html: &str) -> Result<HashMap<String, f64>, SubmissionError>;
}
