use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::errors::{AppError, AppResult};
use crate::models::CustomerIdentity;
use crate::state::AppState;
use crate::store::CUSTOMER_IDENTITY;

// GET /api/session/:client/identity
pub async fn get_identity(
    State(state): State<Arc<AppState>>,
    Path(client): Path<String>,
) -> AppResult<Json<CustomerIdentity>> {
    state
        .store
        .get(&client, &CUSTOMER_IDENTITY)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no saved customer identity".to_string()))
}

// DELETE /api/session/:client
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Path(client): Path<String>,
) -> AppResult<StatusCode> {
    state.store.clear_scope(&client)?;
    tracing::info!(client = %client, "customer session cleared");
    Ok(StatusCode::NO_CONTENT)
}
