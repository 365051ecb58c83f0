use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::AppError;
use crate::state::AppState;
use reckon_offer::Offer;

/// GET /v1/users/{uid}/offer
/// The quantity/price ladder this user can buy right now.
pub async fn get_offer(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<Offer>, AppError> {
    let offer = state.orders.get_offer(&uid).await?;
    Ok(Json(offer))
}
