use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;
use reckon_order::{verify_card_signature, CardEvent};

/// The slice of a card processor event the engine acts on.
#[derive(Debug, Deserialize)]
pub struct CardWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: CardWebhookData,
}

#[derive(Debug, Deserialize)]
pub struct CardWebhookData {
    pub object: CardWebhookObject,
}

#[derive(Debug, Deserialize)]
pub struct CardWebhookObject {
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

/// POST /v1/webhooks/payments/card
/// Card processor event delivery, authenticated by the signed
/// stripe-signature header over the raw body. Event types the engine
/// does not act on are acknowledged and dropped, so the processor
/// stops retrying.
pub async fn card_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::UnauthorizedError("Missing stripe-signature header".to_string())
        })?;

    verify_card_signature(&state.card_webhook_key, &body, signature)
        .map_err(|e| AppError::UnauthorizedError(e.to_string()))?;

    let event: CardWebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Malformed event: {}", e)))?;

    let Some(card_event) = CardEvent::parse(&event.event_type) else {
        tracing::info!("Ignoring card event type {}", event.event_type);
        return Ok(StatusCode::OK);
    };

    let metadata = &event.data.object.metadata;
    let tid = metadata
        .get("transaction")
        .ok_or_else(|| AppError::ValidationError("Event has no transaction id".to_string()))?;
    let uid = metadata
        .get("uid")
        .ok_or_else(|| AppError::ValidationError("Event has no uid".to_string()))?;

    state.orders.handle_card_event(uid, tid, card_event).await?;
    Ok(StatusCode::OK)
}

/// POST /v1/webhooks/payments/crypto/{uid}
/// Crypto processor IPN delivery, authenticated by the x-ipn-sig HMAC
/// header over the raw body.
pub async fn crypto_webhook(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get("x-ipn-sig")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::UnauthorizedError("Missing x-ipn-sig header".to_string()))?;

    tracing::debug!("IPN delivery for {}", uid);
    state.crypto.handle_ipn(&body, signature).await?;
    Ok(StatusCode::OK)
}
