use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::User;
use crate::store::{NewUser, StoreError, UserStore, UserUpdate};

/// In-memory `UserStore` with the same unique constraints as the Postgres
/// implementation. Used for hermetic tests; mutation counters let tests
/// assert exactly how many writes an operation performed.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    /// Seeds a user directly, bypassing the resolver. Panics on a constraint
    /// violation since that is a broken test fixture, not a runtime path.
    pub fn seed(&self, user: User) {
        let mut users = self.users.lock().unwrap();
        assert!(
            !Self::violates_unique(&users, &user.username, &user.email, user.external_id.as_deref()),
            "seeded user violates a unique constraint"
        );
        users.push(user);
    }

    fn violates_unique(
        users: &[User],
        username: &str,
        email: &str,
        external_id: Option<&str>,
    ) -> bool {
        users.iter().any(|u| {
            u.username == username
                || u.email == email
                || (external_id.is_some() && u.external_id.as_deref() == external_id)
        })
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if Self::violates_unique(&users, &user.username, &user.email, user.external_id.as_deref())
        {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            email_verified: user.email_verified,
            external_id: user.external_id,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| u.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn update(&self, id: Uuid, changes: UserUpdate) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();

        if let Some(ref external_id) = changes.external_id {
            if users
                .iter()
                .any(|u| u.id != id && u.external_id.as_deref() == Some(external_id.as_str()))
            {
                return Err(StoreError::Conflict);
            }
        }

        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(verified) = changes.email_verified {
            user.email_verified = verified;
        }
        if let Some(external_id) = changes.external_id {
            user.external_id = Some(external_id);
        }
        user.updated_at = Utc::now();
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(user.clone())
    }
}
