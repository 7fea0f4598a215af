use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;

use crate::auth::clock::Clock;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the signed state between the redirect and the
/// callback.
pub const STATE_COOKIE_NAME: &str = "oauth_state";

const STATE_SEPARATOR: char = '.';

/// How long a signed state is honored after issuance.
pub const STATE_WINDOW_SECS: i64 = 600;

#[derive(Debug, PartialEq, Eq)]
pub enum StateError {
    /// The token does not have the `nonce.timestamp.signature` layout, or
    /// the timestamp field is not a number.
    InvalidFormat,
    /// The signature does not match: the token was tampered with or signed
    /// under a different key.
    InvalidMac,
    /// The token is older than the allowed window.
    Expired,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StateError::InvalidFormat => write!(f, "invalid state format"),
            StateError::InvalidMac => write!(f, "invalid state MAC (tampered?)"),
            StateError::Expired => write!(f, "state expired"),
        }
    }
}

/// Signs and verifies the CSRF state binding an OAuth redirect to its
/// callback.
///
/// The token is `nonce.timestamp.hex(HMAC-SHA256(nonce "." timestamp))`.
/// Signing the timestamp bounds the window in which a captured state is
/// useful, without any server-side record of in-flight attempts. The
/// protector itself is stateless: single use is the caller's job, enforced
/// by discarding the cookie carrier after verification.
#[derive(Clone)]
pub struct StateProtector {
    secret: Vec<u8>,
    clock: Arc<dyn Clock>,
}

impl StateProtector {
    /// Panics on an empty key: that is a configuration error and must stop
    /// the process at construction time, not surface per-request.
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Self {
        assert!(
            !secret.is_empty(),
            "OAuth state signing secret cannot be empty"
        );
        Self {
            secret: secret.as_bytes().to_vec(),
            clock,
        }
    }

    /// Generates a timestamped, HMAC-signed state string for the nonce.
    pub fn sign(&self, nonce: &str) -> String {
        let timestamp = self.clock.now().timestamp();
        let message = format!("{}{}{}", nonce, STATE_SEPARATOR, timestamp);

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        format!("{}{}{}", message, STATE_SEPARATOR, signature)
    }

    /// Checks signature and expiry, returning the original nonce.
    ///
    /// The caller compares the returned nonce against the value it generated
    /// when the flow started, carried back on an independent channel.
    pub fn verify(&self, signed_state: &str) -> Result<String, StateError> {
        let parts: Vec<&str> = signed_state.split(STATE_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(StateError::InvalidFormat);
        }

        let (nonce, timestamp_str, received_signature) = (parts[0], parts[1], parts[2]);

        let message = format!("{}{}{}", nonce, STATE_SEPARATOR, timestamp_str);
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());

        let signature = hex::decode(received_signature).map_err(|_| StateError::InvalidMac)?;
        // verify_slice is a constant-time comparison.
        mac.verify_slice(&signature).map_err(|_| StateError::InvalidMac)?;

        let timestamp: i64 = timestamp_str.parse().map_err(|_| StateError::InvalidFormat)?;
        let age = self.clock.now().timestamp() - timestamp;
        if age > STATE_WINDOW_SECS {
            return Err(StateError::Expired);
        }

        Ok(nonce.to_string())
    }
}
