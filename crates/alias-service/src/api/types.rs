//! API response types.

use serde::Serialize;

/// Response after a successful registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub email: String,
    pub expiry: String,
}
