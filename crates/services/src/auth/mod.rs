use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use bailbook_config::SessionSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod permissions;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing session")]
    MissingSession,
    #[error("Session expired")]
    SessionExpired,
    #[error("Invalid session: {0}")]
    InvalidSession(String),
}

/// Session token claims; `sub` is the identity-provider uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

pub struct AuthService {
    settings: SessionSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(settings: SessionSettings) -> Self {
        let encoding_key = EncodingKey::from_secret(settings.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(settings.secret.as_bytes());
        Self {
            settings,
            encoding_key,
            decoding_key,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.settings.cookie_name
    }

    /// Signs a session for `uid`. Only trusted callers (the ops CLI, the
    /// identity exchange in front of this service, tests) mint sessions.
    pub fn issue(&self, uid: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: uid.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.settings.ttl_secs as i64)).timestamp(),
            iss: self.settings.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidSession(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.settings.issuer]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::SessionExpired,
                _ => AuthError::InvalidSession(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }
}
