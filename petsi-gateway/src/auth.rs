//! Authentication module for the PETSI gateway.
//!
//! Issues and validates HS256 JWT bearer tokens.

use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use petsi_common::validation::MAX_TOKEN_EXPIRE_MINUTES;
use petsi_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authentication state shared across requests.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: Arc<String>,
    pub token_expiry_secs: u64,
}

impl AuthState {
    /// Create a new auth state with the given JWT secret. The lifetime is
    /// capped at [`MAX_TOKEN_EXPIRE_MINUTES`].
    pub fn new(jwt_secret: impl Into<String>, token_expiry_secs: u64) -> Self {
        Self {
            jwt_secret: Arc::new(jwt_secret.into()),
            token_expiry_secs: token_expiry_secs.min(MAX_TOKEN_EXPIRE_MINUTES * 60),
        }
    }

    /// Generate a new JWT token for a user.
    pub fn generate_token(&self, username: &str) -> Result<String> {
        let now = chrono::Utc::now().timestamp() as usize;
        let exp = now.saturating_add(self.token_expiry_secs as usize);

        let claims = Claims {
            sub: username.to_string(),
            exp,
            iat: now,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| Error::Internal(format!("failed to sign token: {e}")))
    }

    /// Validate a JWT token and return the claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| Error::Unauthorized(format!("Invalid token: {e}")))?;

        Ok(token_data.claims)
    }
}

/// User info extracted from a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
}

/// Authentication middleware.
///
/// Requires `Authorization: Bearer <jwt>`; on success the request carries
/// an [`AuthUser`] extension.
pub async fn auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    let claims = auth_state.validate_token(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        ApiError::unauthorized("Invalid token")
    })?;

    request.extensions_mut().insert(AuthUser {
        username: claims.sub,
    });
    Ok(next.run(request).await)
}
