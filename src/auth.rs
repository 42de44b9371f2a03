//! Bearer token authentication
//!
//! HS256 JWTs carrying the caller's user id, role and account number.
//! Tokens are minted by the login service; this crate only verifies them
//! (and issues them in tests).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::{OperationContext, Role};

/// Token lifetime for issued tokens
const TOKEN_TTL_HOURS: i64 = 24;

/// JWT claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Internal user id, as a decimal string
    pub userid: String,
    pub idrole: Role,
    #[serde(default)]
    pub acc_number: Option<String>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.userid
            .parse()
            .map_err(|_| AuthError::InvalidToken(format!("bad userid claim: {}", self.userid)))
    }

    /// Build the request context for these claims
    pub fn context(&self) -> Result<OperationContext, AuthError> {
        let context = OperationContext::new(self.user_id()?, self.idrole);
        Ok(match &self.acc_number {
            Some(account) => context.with_account_number(account.clone()),
            None => context,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
}

impl JwtService {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        }
    }

    /// Sign a token for `user_id`
    pub fn issue(
        &self,
        user_id: i64,
        role: Role,
        account_number: Option<&str>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            userid: user_id.to_string(),
            idrole: role,
            acc_number: account_number.map(str::to_string),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Check signature, expiry and issuer
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}
