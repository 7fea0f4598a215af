use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user identity record.
///
/// A user is reachable by at least one authentication method at all times:
/// either `password_hash` is non-empty (credential signup) or `external_id`
/// is set (Google sign-in). Accounts created through the credential path
/// start unverified; accounts created or linked through Google are verified,
/// because the provider's `verified_email` assertion is checked first.
///
/// `password_hash` and `external_id` never appear in serialized output.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: uuid::Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub email_verified: bool,
    /// The identity provider's subject id (a Google account id), when linked.
    #[serde(skip_serializing, default)]
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
