//! Bearer token authentication
//!
//! Tokens are issued elsewhere; this side only verifies the HS256 signature
//! and expiry and turns the claims into a [`Principal`].

use crate::error::AppError;
use crate::models::{Principal, UserKind};
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub role: String,
    pub name: String,
    #[serde(rename = "schoolId")]
    pub school_id: Uuid,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Principal, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token validation failed");
            AppError::Unauthorized
        })?;
        let claims = data.claims;
        let role = claims
            .role
            .parse::<UserKind>()
            .ok()
            .filter(UserKind::is_role)
            .ok_or_else(|| {
                tracing::debug!(role = %claims.role, "token carries unsupported role");
                AppError::Unauthorized
            })?;
        Ok(Principal {
            id: claims.id,
            role,
            name: claims.name,
            school_id: claims.school_id,
        })
    }
}

/// Token from `Authorization: Bearer ...`
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn authenticate(req: &HttpRequest, token: Option<String>) -> Result<Principal, AppError> {
    let validator = req
        .app_data::<web::Data<JwtValidator>>()
        .ok_or_else(|| {
            tracing::error!("JwtValidator missing from app data");
            AppError::Internal
        })?;
    let token = token.ok_or(AppError::TokenMissing)?;
    validator.verify(&token)
}

/// Extractor for handlers that require an authenticated caller
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req, bearer_token(req)).map(AuthenticatedUser))
    }
}
