//! HTTP request handlers.

use super::types::RegisterResponse;
use super::AppState;
use crate::alias::RegisterRequest;
use crate::error::AliasError;
use axum::{body::Bytes, extract::State, Json};
use tracing::warn;

/// Register a new alias.
///
/// The body is parsed here rather than through the `Json` extractor so that
/// malformed input surfaces as an `AliasError`.
pub async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RegisterResponse>, AliasError> {
    let request: RegisterRequest = serde_json::from_slice(&body)?;

    let registration = state.registrar.register(request).await.map_err(|e| {
        if e.status_and_code().0.is_server_error() {
            warn!("Registration failed: {}", e);
        }
        e
    })?;

    Ok(Json(RegisterResponse {
        success: true,
        email: registration.email,
        expiry: registration.expiry,
    }))
}

/// Catch-all for unknown paths and methods.
pub async fn not_found() -> AliasError {
    AliasError::NotFound
}
