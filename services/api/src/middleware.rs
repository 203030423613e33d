//! Authentication middleware for JWT token validation

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use rides::models::User;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, warn};

use crate::{error::ApiError, state::AppState};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// External identity of the caller
    pub sub: String,
    /// Issued at time
    #[serde(default)]
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Verification material for RS256 bearer tokens
#[derive(Clone)]
pub struct AuthConfig {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthConfig {
    /// Load the public key from `JWT_PUBLIC_KEY`, either inline PEM or a file path
    pub fn from_env() -> Result<Self, String> {
        let public_key = env::var("JWT_PUBLIC_KEY")
            .map_err(|_| "JWT_PUBLIC_KEY environment variable not set".to_string())?;

        // If the public key looks like a file path, read from file (try CWD, then crate root)
        let public_key = if public_key.starts_with("-----BEGIN") {
            public_key
        } else {
            std::fs::read_to_string(&public_key)
                .or_else(|_| {
                    let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
                    path.push(&public_key);
                    std::fs::read_to_string(path)
                })
                .map_err(|e| format!("Failed to read public key file: {}", e))?
                .trim()
                .to_string()
        };

        Self::from_rsa_pem(&public_key)
    }

    pub fn from_rsa_pem(public_key: &str) -> Result<Self, String> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key.as_bytes())
            .map_err(|e| format!("Failed to create decoding key: {}", e))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
    }
}

/// The resolved caller, inserted into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Authentication middleware
///
/// Verifies the bearer token and resolves its subject to a user record.
/// Unknown subjects are reported as not found.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let claims = state.auth.verify(bearer.token()).map_err(|e| {
        warn!("Failed to validate token: {}", e);
        ApiError::Unauthorized
    })?;

    let user = state.rides.resolve_user(&claims.sub).await?;
    debug!("Authenticated {} as user {}", claims.sub, user.id);

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}
