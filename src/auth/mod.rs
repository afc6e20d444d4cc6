//! Authentication: password digests, bearer tokens and the admin pre-shared key.
//!
//! Bearer tokens are HS256 JWTs whose subject is the member's NRA. Handlers get
//! verified [`Claims`] through an extractor and pass them on explicitly.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::Member;
use crate::AppState;

/// Header name for the admin API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// JWT claims identifying an authenticated member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Member NRA, the stable identifying number
    pub sub: String,
    pub name: String,
    pub role: String,
    /// Expiration timestamp (UNIX time)
    pub exp: usize,
}

impl Claims {
    pub fn nra(&self) -> &str {
        &self.sub
    }
}

/// Signing material and lifetime for bearer tokens.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: i64,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_minutes,
        }
    }

    /// Issue a bearer token for `member`.
    pub fn issue_token(&self, member: &Member) -> Result<String, AppError> {
        let exp = chrono::Utc::now() + chrono::Duration::minutes(self.ttl_minutes);
        let claims = Claims {
            sub: member.nra.clone(),
            name: member.name.clone(),
            role: member.role.as_str().to_string(),
            exp: exp.timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            tracing::error!("Token generation failed: {:?}", e);
            AppError::Internal(format!("Token generation failed: {}", e))
        })
    }

    /// Verify signature and expiry of a bearer token.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

/// Single-use login token handed out at registration: 64 hex characters.
pub fn generate_login_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Compare a password against a stored digest. A malformed digest counts as a mismatch.
pub fn verify_password(digest: &str, password: &str) -> bool {
    bcrypt::verify(password, digest).unwrap_or(false)
}

impl FromRequestParts<AppState> for Claims {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Authorization header is required".to_string()))?;

        let token = header_value
            .to_str()
            .ok()
            .and_then(|s| s.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AppError::Unauthorized("Invalid authorization header format".to_string())
            })?;

        state.tokens.verify_token(token.trim())
    }
}

/// Admin key layer for the administrative member routes.
pub async fn admin_key_layer(
    expected_key: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no admin key is configured, allow all requests (dev mode)
    let Some(expected) = expected_key else {
        return next.run(request).await;
    };

    let headers = request.headers();
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
        .map(|s| s.trim().to_string());

    match provided {
        Some(provided_key) if constant_time_compare(&provided_key, &expected) => {
            next.run(request).await
        }
        Some(_) => AppError::Unauthorized("Invalid API key".to_string()).into_response(),
        None => AppError::Unauthorized("Missing or invalid API key".to_string()).into_response(),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
