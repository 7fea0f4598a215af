use chrono::Duration;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::error::AppError;

/// Represents the claims encoded within a session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the user's id.
    pub sub: String,
    /// Issuance timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// How validation of a session token failed.
///
/// The distinction exists for logging; callers surface all three uniformly
/// as an authentication failure.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    /// The token was well-formed and correctly signed but `exp` has passed.
    Expired,
    /// The token could not be parsed or its signature did not verify.
    Malformed,
    /// Any other validation failure: wrong algorithm, missing or non-uuid
    /// subject.
    Invalid,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::Malformed => write!(f, "token is malformed"),
            TokenError::Invalid => write!(f, "token is invalid"),
        }
    }
}

/// Issues and validates signed session tokens.
///
/// Tokens are signed with a single symmetric algorithm (HS256) fixed by this
/// service. The algorithm a presented token claims for itself is never
/// trusted: validation pins HS256, so a token asserting any other algorithm
/// is rejected outright. Expiry is checked against the injected [`Clock`],
/// not the library's wall-clock, which keeps expiry tests deterministic.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(secret: &str, expiry_minutes: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.to_string(),
            ttl: Duration::minutes(expiry_minutes),
            clock,
        }
    }

    /// Issues a session token for the given user id, expiring after the
    /// configured TTL.
    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = self.clock.now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::InternalServerError(format!("failed to sign token: {}", e)))
    }

    /// Verifies a session token and returns its subject.
    pub fn validate(&self, token: &str) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is checked below against the injected clock instead.
        validation.validate_exp = false;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed,
            _ => TokenError::Invalid,
        })?;

        if self.clock.now().timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::Invalid)
    }
}
