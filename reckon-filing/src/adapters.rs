use async_trait::async_trait;
use std::collections::HashMap;

use reckon_core::submission::{
    FilingRenderer, Obligation, SubmissionError, TaxAuthorityClient, VatReturn,
};
use reckon_shared::FilingKind;

/// Tax authority that serves a fixed obligation list and accepts (or,
/// when configured, rejects) every return. Stands in for the real
/// gateway in development and tests.
pub struct MockTaxAuthority {
    obligations: Vec<Obligation>,
    reject: bool,
}

impl MockTaxAuthority {
    pub fn new(obligations: Vec<Obligation>) -> Self {
        Self {
            obligations,
            reject: false,
        }
    }

    /// An authority whose submission endpoint always fails.
    pub fn failing(obligations: Vec<Obligation>) -> Self {
        Self {
            obligations,
            reject: true,
        }
    }
}

#[async_trait]
impl TaxAuthorityClient for MockTaxAuthority {
    async fn get_open_obligations(&self) -> Result<Vec<Obligation>, SubmissionError> {
        Ok(self.obligations.clone())
    }

    async fn submit_vat_return(&self, rtn: &VatReturn) -> Result<(), SubmissionError> {
        if self.reject {
            return Err(SubmissionError::Rejected(
                "The submission gateway refused the return".to_string(),
            ));
        }
        tracing::debug!("Mock submission accepted for period {}", rtn.period_key);
        Ok(())
    }
}

/// Renderer producing a canned document with a full set of boxes.
pub struct MockRenderer;

#[async_trait]
impl FilingRenderer for MockRenderer {
    async fn render(
        &self,
        uid: &str,
        filing_id: &str,
        kind: FilingKind,
    ) -> Result<String, SubmissionError> {
        Ok(format!(
            "<html data-uid=\"{}\" data-filing=\"{}\" data-kind=\"{}\"></html>",
            uid, filing_id, kind
        ))
    }

    fn extract(&self, _html: &str) -> Result<HashMap<String, f64>, SubmissionError> {
        Ok(HashMap::from([
            ("VatDueSales".to_string(), 1250.0),
            ("VatDueAcquisitions".to_string(), 0.0),
            ("TotalVatDue".to_string(), 1250.0),
            ("VatReclaimedCurrPeriod".to_string(), 330.0),
            ("NetVatDue".to_string(), 920.0),
            ("TotalValueSalesExVAT".to_string(), 6250.0),
            ("TotalValuePurchasesExVAT".to_string(), 1650.0),
            ("TotalValueGoodsSuppliedExVAT".to_string(), 0.0),
            ("TotalAcquisitionsExVAT".to_string(), 0.0),
        ]))
    }
}
