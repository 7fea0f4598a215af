use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

use crate::config::OAuthConfig;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Profile details asserted by the identity provider after a successful
/// exchange. Field names follow Google's userinfo response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalProfile {
    /// The provider's stable subject id for this account.
    pub id: String,
    pub email: String,
    /// Whether the provider has verified the email. An unverified email is
    /// never trusted for login or linking.
    #[serde(default)]
    pub verified_email: bool,
    /// Display name, used to derive a username for first-time sign-ins.
    #[serde(default)]
    pub name: String,
}

#[derive(Debug)]
pub enum IdentityError {
    /// The authorization-code exchange was refused or failed in transit.
    Exchange(String),
    /// The profile fetch failed or returned an unusable document.
    Profile(String),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdentityError::Exchange(msg) => write!(f, "code exchange failed: {}", msg),
            IdentityError::Profile(msg) => write!(f, "profile fetch failed: {}", msg),
        }
    }
}

/// Boundary to the third-party identity provider.
///
/// The resolver only needs these three operations; tests substitute a stub
/// so callback handling is exercised without the network.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// URL of the provider's consent screen, carrying the state value.
    fn consent_url(&self, state: &str) -> String;
    /// Exchanges an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError>;
    /// Fetches the verified profile for an access token.
    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google implementation of [`IdentityClient`].
pub struct GoogleIdentityClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    scopes: String,
}

impl GoogleIdentityClient {
    pub fn new(config: &OAuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: config.redirect_url.clone(),
            scopes: config.scopes.join(" "),
        }
    }
}

#[async_trait]
impl IdentityClient for GoogleIdentityClient {
    fn consent_url(&self, state: &str) -> String {
        let url = reqwest::Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", self.scopes.as_str()),
                ("access_type", "offline"),
                ("state", state),
            ],
        )
        .expect("consent URL is statically valid");
        url.into()
    }

    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| IdentityError::Exchange(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Exchange(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Exchange(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, IdentityError> {
        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Profile(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Profile(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }

        let profile: ExternalProfile = response
            .json()
            .await
            .map_err(|e| IdentityError::Profile(e.to_string()))?;

        if profile.id.is_empty() || profile.email.is_empty() {
            return Err(IdentityError::Profile(
                "profile is missing id or email".to_string(),
            ));
        }

        Ok(profile)
    }
}
