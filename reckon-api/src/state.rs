use std::sync::Arc;

use reckon_catalog::Catalog;
use reckon_core::payment::{CardPaymentAdapter, CryptoPaymentAdapter};
use reckon_core::submission::{FilingRenderer, TaxAuthorityClient};
use reckon_filing::VatSubmission;
use reckon_order::{CommerceSettings, CryptoWorkflow, OrderWorkflow};
use reckon_store::MemoryStore;

/// Everything a handler needs, pre-wired. The workflows share one store
/// and one catalog; handlers never touch the store directly.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderWorkflow<MemoryStore>,
    pub crypto: CryptoWorkflow<MemoryStore>,
    pub filings: VatSubmission<MemoryStore>,
    /// Secret for the card processor's webhook signature header.
    pub card_webhook_key: String,
}

impl AppState {
    pub fn new(
        store: Arc<MemoryStore>,
        catalog: Catalog,
        settings: CommerceSettings,
        card: Arc<dyn CardPaymentAdapter>,
        crypto: Arc<dyn CryptoPaymentAdapter>,
        authority: Arc<dyn TaxAuthorityClient>,
        renderer: Arc<dyn FilingRenderer>,
        card_webhook_key: String,
        ipn_secret: String,
        ipn_url: String,
    ) -> Self {
        Self {
            orders: OrderWorkflow::new(
                store.clone(),
                catalog.clone(),
                card,
                settings.clone(),
            ),
            crypto: CryptoWorkflow::new(
                store.clone(),
                catalog.clone(),
                crypto,
                settings,
                ipn_secret,
                ipn_url,
            ),
            filings: VatSubmission::new(store, catalog, authority, renderer),
            card_webhook_key,
        }
    }
}
