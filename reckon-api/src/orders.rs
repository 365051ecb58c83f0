use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;
use reckon_core::payment::CryptoPayment;
use reckon_ledger::LedgerTransaction;
use reckon_shared::{Order, Package};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub email: String,
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub transaction: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCryptoPaymentRequest {
    pub email: String,
    pub order: Order,
    pub pay_currency: String,
}

#[derive(Debug, Serialize)]
pub struct CreateCryptoPaymentResponse {
    pub transaction: String,
    #[serde(flatten)]
    pub payment: CryptoPayment,
}

#[derive(Debug, Serialize)]
pub struct TransactionSummary {
    pub id: String,
    #[serde(flatten)]
    pub transaction: LedgerTransaction,
}

/// POST /v1/users/{uid}/orders
/// Verify and record an order; no money moves yet.
pub async fn create_order(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let tid = state.orders.create_order(&uid, &req.email, req.order).await?;
    Ok(Json(CreateOrderResponse { transaction: tid }))
}

/// POST /v1/users/{uid}/orders/free
/// Complete a zero-cost order immediately.
pub async fn complete_free_order(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let tid = state
        .orders
        .complete_free_order(&uid, &req.email, req.order)
        .await?;
    Ok(Json(CreateOrderResponse { transaction: tid }))
}

/// POST /v1/users/{uid}/orders/{tid}/payment
/// Open a card payment for a recorded order.
pub async fn create_payment(
    State(state): State<AppState>,
    Path((uid, tid)): Path<(String, String)>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, AppError> {
    let client_secret = state.orders.create_payment(&uid, &tid, &req.email).await?;
    Ok(Json(CreatePaymentResponse { client_secret }))
}

/// POST /v1/users/{uid}/orders/crypto
/// Record an order and open a crypto payment for it in one step.
pub async fn create_crypto_payment(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(req): Json<CreateCryptoPaymentRequest>,
) -> Result<Json<CreateCryptoPaymentResponse>, AppError> {
    let (tid, payment) = state
        .crypto
        .create_payment(&uid, &req.email, req.order, &req.pay_currency)
        .await?;
    Ok(Json(CreateCryptoPaymentResponse {
        transaction: tid,
        payment,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AdoptPackageRequest {
    pub email: String,
    pub referral: String,
}

/// POST /v1/users/{uid}/package
/// Adopt a referral package and receive its join-up credits.
pub async fn adopt_package(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(req): Json<AdoptPackageRequest>,
) -> Result<Json<Package>, AppError> {
    let package = state
        .orders
        .adopt_package(&uid, &req.email, &req.referral)
        .await?;
    Ok(Json(package))
}

/// GET /v1/users/{uid}/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<Vec<TransactionSummary>>, AppError> {
    let txs = state.orders.get_transactions(&uid).await?;
    Ok(Json(
        txs.into_iter()
            .map(|(id, transaction)| TransactionSummary { id, transaction })
            .collect(),
    ))
}

/// GET /v1/users/{uid}/transactions/{tid}
pub async fn get_transaction(
    State(state): State<AppState>,
    Path((uid, tid)): Path<(String, String)>,
) -> Result<Json<LedgerTransaction>, AppError> {
    let tx = state.orders.get_transaction(&uid, &tid).await?;
    Ok(Json(tx))
}
