use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod filings;
pub mod offers;
pub mod orders;
pub mod state;
pub mod webhooks;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/v1/users/{uid}/offer", get(offers::get_offer))
        .route("/v1/users/{uid}/package", post(orders::adopt_package))
        .route("/v1/users/{uid}/orders", post(orders::create_order))
        .route(
            "/v1/users/{uid}/orders/free",
            post(orders::complete_free_order),
        )
        .route(
            "/v1/users/{uid}/orders/crypto",
            post(orders::create_crypto_payment),
        )
        .route(
            "/v1/users/{uid}/orders/{tid}/payment",
            post(orders::create_payment),
        )
        .route(
            "/v1/users/{uid}/transactions",
            get(orders::list_transactions),
        )
        .route(
            "/v1/users/{uid}/transactions/{tid}",
            get(orders::get_transaction),
        )
        .route(
            "/v1/users/{uid}/filings/{fid}/submit",
            post(filings::submit_filing),
        )
        .route(
            "/v1/users/{uid}/filings/{fid}/status",
            get(filings::filing_status),
        )
        .route(
            "/v1/users/{uid}/filings/{fid}/draft",
            post(filings::move_to_draft),
        )
        .route("/v1/webhooks/payments/card", post(webhooks::card_webhook))
        .route(
            "/v1/webhooks/payments/crypto/{uid}",
            post(webhooks::crypto_webhook),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
