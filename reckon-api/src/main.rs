use std::net::SocketAddr;
use std::sync::Arc;

use reckon_api::{app, AppState};
use reckon_catalog::Catalog;
use reckon_filing::adapters::{MockRenderer, MockTaxAuthority};
use reckon_order::adapters::{MockCardAdapter, MockCryptoAdapter};
use reckon_order::CommerceSettings;
use reckon_store::MemoryStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "reckon_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = reckon_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Reckon API on port {}", config.server.port);

    let store = Arc::new(MemoryStore::new());

    let settings = CommerceSettings {
        seller_name: config.commerce.seller_name.clone(),
        seller_vat_number: config.commerce.seller_vat_number.clone(),
        vat_rate: config.commerce.vat_rate(),
    };

    // Mock processor and authority adapters; real ones implement the
    // same core traits and drop in here.
    let state = AppState::new(
        store,
        Catalog::default(),
        settings,
        Arc::new(MockCardAdapter),
        Arc::new(MockCryptoAdapter),
        Arc::new(MockTaxAuthority::new(Vec::new())),
        Arc::new(MockRenderer),
        config.card.webhook_key.clone(),
        config.crypto.ipn_secret.clone(),
        config.crypto.ipn_url.clone(),
    );

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
