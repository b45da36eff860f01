use actix_web::{HttpMessage, HttpRequest};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    env_config::JwtConfig,
    error::{AppError, Res},
};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UserMetadata {
    pub full_name: Option<String>,
    pub display_name: Option<String>,
}

/// Claims of an access token issued by the auth backend.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    /// The user id.
    pub sub: Uuid,
    pub exp: usize,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

impl JwtClaims {
    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Name shown next to chat messages: profile name, then the email local part.
    pub fn display_name(&self) -> String {
        let metadata = self.user_metadata.as_ref();
        [
            metadata.and_then(|m| m.display_name.as_deref()),
            metadata.and_then(|m| m.full_name.as_deref()),
            self.email.as_deref().and_then(|e| e.split('@').next()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map_or_else(|| "Anonymous".to_string(), str::to_string)
    }
}

/// Extracts claims object from JWT token.
/// Requires the JWT configuration (secret and expected audience).
pub fn validate_jwt(token: &str, config: &JwtConfig) -> Res<JwtClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.audience.as_str()]);

    let token_data = jsonwebtoken::decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

/// Claims stored on the request by the extractor middleware, if the token was valid.
pub fn optional_claims(req: &HttpRequest) -> Option<JwtClaims> {
    match req.extensions().get::<Res<JwtClaims>>() {
        Some(Ok(claims)) => Some(claims.clone()),
        Some(Err(e)) => {
            log::debug!("Ignoring invalid token: {}", e);
            None
        }
        None => None,
    }
}

pub fn require_claims(req: &HttpRequest) -> Res<JwtClaims> {
    match req.extensions().get::<Res<JwtClaims>>() {
        Some(Ok(claims)) => Ok(claims.clone()),
        Some(Err(_)) => Err(AppError::Unauthorized("Invalid token".to_string())),
        None => Err(AppError::Unauthorized(
            "No authorization token provided".to_string(),
        )),
    }
}
