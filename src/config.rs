use std::env;

/// Application configuration, loaded once at startup.
///
/// Every component receives the slice of configuration it needs through its
/// constructor; nothing reads the environment after `from_env` returns. A
/// missing required variable aborts startup rather than failing later on a
/// live request.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub frontend_url: String,
    pub jwt: JwtConfig,
    pub oauth: OAuthConfig,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiry_minutes: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    /// Key for signing the CSRF state cookie. Distinct from the JWT secret.
    pub state_secret: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            jwt: JwtConfig {
                secret: non_empty_var("JWT_SECRET"),
                expiry_minutes: env::var("JWT_EXPIRY_MINUTES")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("JWT_EXPIRY_MINUTES must be a number"),
                cookie_name: env::var("JWT_COOKIE_NAME")
                    .unwrap_or_else(|_| "taskhub_token".to_string()),
                cookie_secure: env::var("JWT_COOKIE_SECURE")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
            },
            oauth: OAuthConfig {
                client_id: non_empty_var("OAUTH_GOOGLE_CLIENT_ID"),
                client_secret: non_empty_var("OAUTH_GOOGLE_CLIENT_SECRET"),
                redirect_url: non_empty_var("OAUTH_GOOGLE_REDIRECT_URL"),
                scopes: env::var("OAUTH_GOOGLE_SCOPES")
                    .unwrap_or_else(|_| "openid email profile".to_string())
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
                state_secret: non_empty_var("OAUTH_STATE_SECRET"),
            },
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

/// Like `env::var(..).expect(..)` but also rejects an empty value, so an
/// unset-but-exported secret cannot slip through to request handling.
fn non_empty_var(name: &str) -> String {
    let value = env::var(name).unwrap_or_else(|_| panic!("{} must be set", name));
    if value.is_empty() {
        panic!("{} must not be empty", name);
    }
    value
}
