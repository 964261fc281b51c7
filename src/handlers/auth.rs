//! Bearer-token authentication for the fulfilment routes.
//!
//! Only the SHA-256 digest of the admin token is kept, and presented tokens
//! are compared against it in constant time.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{AppState, ErrorResponse};

/// Authentication result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    /// Token accepted
    Authenticated,
    /// No Authorization header
    MissingHeader,
    /// Header present but not `Bearer <token>`
    InvalidFormat,
    /// Token did not match
    InvalidToken,
}

impl AuthResult {
    /// Whether the request may proceed
    pub fn is_ok(&self) -> bool {
        matches!(self, AuthResult::Authenticated)
    }

    fn message(&self) -> &'static str {
        match self {
            AuthResult::Authenticated => "",
            AuthResult::MissingHeader => "Missing Authorization header",
            AuthResult::InvalidFormat => {
                "Invalid Authorization format. Expected: Bearer <token>"
            }
            AuthResult::InvalidToken => "Invalid token",
        }
    }
}

/// Admin token verifier
#[derive(Clone)]
pub struct AdminAuth {
    token_hash: [u8; 32],
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth").finish_non_exhaustive()
    }
}

impl AdminAuth {
    /// Create a verifier for `token`
    pub fn new(token: &SecretString) -> Self {
        Self {
            token_hash: hash_token(token.expose_secret()),
        }
    }

    /// Check an `Authorization` header value
    pub fn authenticate(&self, auth_header: Option<&str>) -> AuthResult {
        let Some(header) = auth_header else {
            return AuthResult::MissingHeader;
        };

        let token = match header.strip_prefix("Bearer ") {
            Some(t) => t.trim(),
            None => return AuthResult::InvalidFormat,
        };

        if token.is_empty() {
            return AuthResult::InvalidFormat;
        }

        if constant_time_compare(&self.token_hash, &hash_token(token)) {
            AuthResult::Authenticated
        } else {
            warn!("Invalid admin token attempt");
            AuthResult::InvalidToken
        }
    }
}

fn hash_token(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Constant-time byte comparison
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Middleware rejecting requests without a valid admin bearer token
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(admin) = &state.admin else {
        debug!("Admin routes disabled");
        return StatusCode::NOT_FOUND.into_response();
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let result = admin.authenticate(auth_header);
    if !result.is_ok() {
        let body = ErrorResponse {
            success: false,
            error: result.message().to_string(),
        };
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    next.run(request).await
}
