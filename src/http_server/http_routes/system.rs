use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State, response::IntoResponse};
use serde_json::json;

use crate::http_server::error::{ApiError, ApiResponse, Report};
use crate::http_server::state::AppState;
use crate::services::credentials::CredentialMap;

pub async fn get_cookies(State(app_state): State<Arc<AppState>>) -> Json<CredentialMap> {
    Json(app_state.credentials.snapshot().as_ref().clone())
}

/// Replace every stored credential with the posted map.
pub async fn set_cookies(
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, Report> {
    let credentials: CredentialMap = match serde_json::from_slice(&body) {
        Ok(credentials) => credentials,
        Err(e) => {
            log::debug!("Rejected credential update: {}", e);
            return Ok(ApiError::bad_request("Invalid JSON").into_response());
        }
    };

    log::info!(
        "Updating credentials for {} sources in {}",
        credentials.len(),
        app_state.credentials.path().display()
    );
    app_state.credentials.update(credentials)?;
    Ok(ApiResponse::success(json!({ "status": "ok" })).into_response())
}
