//! User persistence boundary.
//!
//! The authentication subsystem only ever touches users through the
//! [`UserStore`] trait, so the resolver can be exercised against the
//! in-memory implementation while the server runs on Postgres. Uniqueness
//! of username, email, and external id is enforced by the store itself;
//! callers attempt the write and interpret [`StoreError::Conflict`] rather
//! than pre-checking, which would leave a gap under concurrent requests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

use crate::models::User;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

#[derive(Debug)]
pub enum StoreError {
    /// A unique constraint (username, email, or external id) was violated.
    Conflict,
    NotFound,
    Database(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::Conflict => write!(f, "resource conflict"),
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::Database(msg) => write!(f, "database error: {}", msg),
        }
    }
}

/// Fields for creating a user row. Ids and timestamps are server-set.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Empty for accounts created through the identity-provider path.
    pub password_hash: String,
    pub email_verified: bool,
    pub external_id: Option<String>,
}

/// Partial update applied when linking an external identity. `None` fields
/// are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email_verified: Option<bool>,
    pub external_id: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError>;
    async fn update(&self, id: Uuid, changes: UserUpdate) -> Result<User, StoreError>;
}
