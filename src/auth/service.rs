//! Account resolution: signup, password login, and identity-provider
//! callback handling.
//!
//! All state lives in the user store; every operation here is a single
//! request/response pass over it. Uniqueness races are resolved by the
//! store's constraints: the resolver writes first and interprets a
//! conflict, it never pre-checks.

use log::{error, warn};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::oauth::{ExternalProfile, IdentityClient};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::state::{StateError, StateProtector};
use crate::auth::token::TokenService;
use crate::auth::{LoginRequest, SignupRequest};
use crate::error::AppError;
use crate::models::User;
use crate::store::{NewUser, StoreError, UserStore, UserUpdate};

/// Failure surface of the OAuth callback, kept apart from [`AppError`] so
/// the handler can choose a redirect error code without string matching.
#[derive(Debug)]
pub enum OAuthCallbackError {
    /// The signed state failed verification.
    State(StateError),
    /// The state verified, but its nonce does not match the one returned on
    /// the query string.
    StateMismatch,
    /// State checks passed; the exchange or account resolution failed.
    Auth(AppError),
}

impl OAuthCallbackError {
    /// Error code carried on the failure redirect back to the frontend.
    pub fn redirect_code(&self) -> &'static str {
        match self {
            OAuthCallbackError::State(StateError::Expired) => "state_expired",
            OAuthCallbackError::State(_) => "state_invalid",
            OAuthCallbackError::StateMismatch => "state_mismatch",
            OAuthCallbackError::Auth(AppError::Conflict(_)) => "auth_conflict",
            OAuthCallbackError::Auth(_) => "auth_failed",
        }
    }
}

pub struct AuthService {
    store: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityClient>,
    tokens: TokenService,
    state: StateProtector,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityClient>,
        tokens: TokenService,
        state: StateProtector,
    ) -> Self {
        Self {
            store,
            identity,
            tokens,
            state,
        }
    }

    /// Creates a credential account. The new user starts unverified.
    pub async fn signup(&self, request: SignupRequest) -> Result<User, AppError> {
        request.validate()?;

        let password_hash = hash_password(&request.password)?;
        let result = self
            .store
            .create(NewUser {
                username: request.username,
                email: request.email.clone(),
                password_hash,
                email_verified: false,
                external_id: None,
            })
            .await;

        match result {
            Ok(user) => Ok(user),
            Err(StoreError::Conflict) => {
                // The store reports one generic conflict. A follow-up read by
                // email names the offending field: if the email is taken the
                // conflict was on email, otherwise on username. Under a
                // concurrent signup this can name the wrong field, never
                // produce a wrong outcome.
                match self.store.get_by_email(&request.email).await {
                    Ok(Some(_)) => Err(AppError::Conflict("email already exists".into())),
                    Ok(None) => Err(AppError::Conflict("username already exists".into())),
                    Err(e) => {
                        error!("conflict disambiguation read failed: {}", e);
                        Err(e.into())
                    }
                }
            }
            Err(e) => {
                error!("failed to create user: {}", e);
                Err(e.into())
            }
        }
    }

    /// Authenticates with email and password, returning a session token and
    /// the user. Which of email or password was wrong is never revealed.
    pub async fn login(&self, request: LoginRequest) -> Result<(String, User), AppError> {
        request.validate()?;

        let user = match self.store.get_by_email(&request.email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return Err(AppError::Unauthorized("invalid email or password".into()));
            }
            Err(e) => {
                error!("failed to look up user by email: {}", e);
                return Err(e.into());
            }
        };

        if user.password_hash.is_empty() {
            if user.external_id.is_some() {
                // Same status as bad credentials; only the message steers.
                return Err(AppError::Unauthorized(
                    "this account uses Google sign-in, please log in with Google".into(),
                ));
            }
            error!(
                "user {} has neither a password hash nor an external identity",
                user.id
            );
            return Err(AppError::InternalServerError(
                "account error, please contact support".into(),
            ));
        }

        if !verify_password(&request.password, &user.password_hash) {
            return Err(AppError::Unauthorized("invalid email or password".into()));
        }

        let token = self.tokens.issue(user.id)?;
        Ok((token, user))
    }

    /// Starts an OAuth flow for a freshly generated nonce. Returns the
    /// signed state for the cookie carrier and the provider consent URL,
    /// which carries the bare nonce as its `state` parameter.
    pub fn begin_oauth(&self, nonce: &str) -> (String, String) {
        (self.state.sign(nonce), self.identity.consent_url(nonce))
    }

    /// Completes an OAuth flow: verifies the signed state from the cookie
    /// against the nonce echoed on the query string, exchanges the code,
    /// and resolves the asserted profile to a local account.
    pub async fn oauth_callback(
        &self,
        signed_state: &str,
        received_state: &str,
        code: &str,
    ) -> Result<(String, User), OAuthCallbackError> {
        let nonce = self.state.verify(signed_state).map_err(|e| {
            warn!("OAuth state verification failed: {}", e);
            OAuthCallbackError::State(e)
        })?;

        if received_state.is_empty() || received_state != nonce {
            warn!("OAuth state mismatch");
            return Err(OAuthCallbackError::StateMismatch);
        }

        let access_token = self.identity.exchange_code(code).await.map_err(|e| {
            warn!("identity provider code exchange failed: {}", e);
            OAuthCallbackError::Auth(AppError::Unauthorized(
                "identity provider exchange failed".into(),
            ))
        })?;

        let profile = self.identity.fetch_profile(&access_token).await.map_err(|e| {
            warn!("identity provider profile fetch failed: {}", e);
            OAuthCallbackError::Auth(AppError::Unauthorized(
                "could not fetch identity profile".into(),
            ))
        })?;

        self.resolve_external_profile(profile)
            .await
            .map_err(OAuthCallbackError::Auth)
    }

    /// Maps a provider-asserted profile to a local account, in order:
    /// returning user by external id, linkable account by email, otherwise a
    /// new identity-provider-only account.
    async fn resolve_external_profile(
        &self,
        profile: ExternalProfile,
    ) -> Result<(String, User), AppError> {
        if !profile.verified_email {
            return Err(AppError::Unauthorized(
                "identity provider email is not verified".into(),
            ));
        }

        let returning = self
            .store
            .get_by_external_id(&profile.id)
            .await
            .map_err(|e| {
                error!("failed to look up user by external id: {}", e);
                AppError::from(e)
            })?;
        if let Some(user) = returning {
            let token = self.tokens.issue(user.id)?;
            return Ok((token, user));
        }

        let by_email = self.store.get_by_email(&profile.email).await.map_err(|e| {
            error!("failed to look up user by email: {}", e);
            AppError::from(e)
        })?;
        if let Some(user) = by_email {
            return match user.external_id.as_deref() {
                Some(existing) if existing != profile.id => {
                    warn!(
                        "user {} email is bound to a different external identity",
                        user.id
                    );
                    Err(AppError::Conflict(
                        "email already linked to a different account".into(),
                    ))
                }
                Some(_) => {
                    let token = self.tokens.issue(user.id)?;
                    Ok((token, user))
                }
                None => {
                    // Same verified email on an unlinked credential account:
                    // link rather than duplicate.
                    let linked = self
                        .store
                        .update(
                            user.id,
                            UserUpdate {
                                email_verified: Some(true),
                                external_id: Some(profile.id.clone()),
                            },
                        )
                        .await
                        .map_err(|e| {
                            error!("failed to link external identity: {}", e);
                            AppError::from(e)
                        })?;
                    let token = self.tokens.issue(linked.id)?;
                    Ok((token, linked))
                }
            };
        }

        let created = self
            .store
            .create(NewUser {
                username: derive_username(&profile),
                email: profile.email.clone(),
                password_hash: String::new(),
                email_verified: true,
                external_id: Some(profile.id.clone()),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict => {
                    AppError::Conflict("a conflicting account was created concurrently".into())
                }
                other => {
                    error!("failed to create user from external profile: {}", other);
                    AppError::from(other)
                }
            })?;

        let token = self.tokens.issue(created.id)?;
        Ok((token, created))
    }

    /// Validates a session token and resolves its subject to a live user.
    /// A valid token whose subject no longer exists is an authentication
    /// failure, not a server error.
    pub async fn authenticate(&self, token: &str) -> Result<User, AppError> {
        let user_id = self.tokens.validate(token).map_err(|e| {
            warn!("session token rejected: {}", e);
            AppError::Unauthorized("invalid or expired token".into())
        })?;

        match self.store.get_by_id(user_id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(AppError::Unauthorized(
                "user associated with token not found".into(),
            )),
            Err(e) => {
                error!("failed to fetch user for a valid token: {}", e);
                Err(e.into())
            }
        }
    }

    /// Fetches the current user for an already-authenticated subject id.
    pub async fn user_by_id(&self, id: Uuid) -> Result<User, AppError> {
        match self.store.get_by_id(id).await? {
            Some(user) => Ok(user),
            None => Err(AppError::Unauthorized("user no longer exists".into())),
        }
    }
}

/// Derives a username from the provider profile: display name first, email
/// local part second, random suffix last.
fn derive_username(profile: &ExternalProfile) -> String {
    let from_name = sanitize_username(&profile.name);
    if from_name.len() >= 3 {
        return from_name;
    }
    let local_part = profile.email.split('@').next().unwrap_or("");
    let from_email = sanitize_username(local_part);
    if from_email.len() >= 3 {
        return from_email;
    }
    format!("user-{}", &Uuid::new_v4().simple().to_string()[..8])
}

fn sanitize_username(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c.to_ascii_lowercase() })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(50)
        .collect()
}
