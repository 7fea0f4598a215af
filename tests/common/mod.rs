#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use taskhub::auth::clock::FixedClock;
use taskhub::auth::oauth::{ExternalProfile, IdentityClient, IdentityError};
use taskhub::auth::state::StateProtector;
use taskhub::auth::{AuthService, TokenService};
use taskhub::config::{Config, JwtConfig, OAuthConfig};
use taskhub::models::User;
use taskhub::store::MemoryUserStore;

pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const STATE_SECRET: &str = "integration-state-secret";
pub const COOKIE_NAME: &str = "taskhub_token";
pub const FRONTEND_URL: &str = "http://localhost:3000";

/// Identity provider stub: either hands back a fixed profile or fails at a
/// chosen step.
pub enum StubBehavior {
    Succeed(ExternalProfile),
    FailExchange,
    FailProfile,
}

pub struct StubIdentityClient {
    behavior: StubBehavior,
}

impl StubIdentityClient {
    pub fn returning(profile: ExternalProfile) -> Self {
        Self {
            behavior: StubBehavior::Succeed(profile),
        }
    }

    pub fn failing_exchange() -> Self {
        Self {
            behavior: StubBehavior::FailExchange,
        }
    }

    pub fn failing_profile() -> Self {
        Self {
            behavior: StubBehavior::FailProfile,
        }
    }
}

#[async_trait]
impl IdentityClient for StubIdentityClient {
    fn consent_url(&self, state: &str) -> String {
        format!("https://accounts.google.com/o/oauth2/auth?state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        match self.behavior {
            StubBehavior::FailExchange => Err(IdentityError::Exchange("stub refusal".into())),
            _ => Ok(format!("access-token-for-{}", code)),
        }
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<ExternalProfile, IdentityError> {
        match &self.behavior {
            StubBehavior::Succeed(profile) => Ok(profile.clone()),
            StubBehavior::FailProfile => Err(IdentityError::Profile("stub refusal".into())),
            StubBehavior::FailExchange => Err(IdentityError::Profile("unreachable".into())),
        }
    }
}

pub fn profile(id: &str, email: &str, name: &str, verified: bool) -> ExternalProfile {
    ExternalProfile {
        id: id.to_string(),
        email: email.to_string(),
        verified_email: verified,
        name: name.to_string(),
    }
}

/// A fully wired resolver over in-memory collaborators, with handles on the
/// pieces tests need to poke: the store (mutation counters), the clock
/// (expiry), and signer copies for forging inputs.
pub struct TestAuth {
    pub store: Arc<MemoryUserStore>,
    pub clock: Arc<FixedClock>,
    pub tokens: TokenService,
    pub state: StateProtector,
    pub auth: Arc<AuthService>,
}

pub fn auth_with(identity: StubIdentityClient) -> TestAuth {
    let store = Arc::new(MemoryUserStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ));
    let tokens = TokenService::new(JWT_SECRET, 60, clock.clone());
    let state = StateProtector::new(STATE_SECRET, clock.clone());
    let auth = Arc::new(AuthService::new(
        store.clone(),
        Arc::new(identity),
        tokens.clone(),
        state.clone(),
    ));
    TestAuth {
        store,
        clock,
        tokens,
        state,
        auth,
    }
}

/// Seeds a user row directly into the store, bypassing the resolver.
pub fn seed_user(
    store: &MemoryUserStore,
    username: &str,
    email: &str,
    password_hash: &str,
    external_id: Option<&str>,
) -> User {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        email_verified: false,
        external_id: external_id.map(str::to_string),
        created_at: now,
        updated_at: now,
    };
    store.seed(user.clone());
    user
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        server_port: 8080,
        server_host: "127.0.0.1".to_string(),
        frontend_url: FRONTEND_URL.to_string(),
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            expiry_minutes: 60,
            cookie_name: COOKIE_NAME.to_string(),
            cookie_secure: false,
        },
        oauth: OAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_url: "http://localhost:8080/auth/oauth/callback".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string(), "profile".to_string()],
            state_secret: STATE_SECRET.to_string(),
        },
    }
}
