use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::http::header;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use log::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        state::{STATE_COOKIE_NAME, STATE_WINDOW_SECS},
        AuthService, LoginRequest, LoginResponse, SignupRequest,
    },
    config::{Config, JwtConfig},
    error::AppError,
};

/// Register a new account
///
/// Creates a credential-based user and returns its public record. The new
/// account has to log in separately; no session is issued here.
#[post("/signup")]
pub async fn signup(
    auth: web::Data<AuthService>,
    body: web::Json<SignupRequest>,
) -> Result<impl Responder, AppError> {
    let user = auth.signup(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

/// Login with email and password
///
/// Returns the session token in the body and also sets it as an HTTP-only
/// cookie, so both header and cookie carriers work afterwards.
#[post("/login")]
pub async fn login(
    auth: web::Data<AuthService>,
    config: web::Data<Config>,
    body: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let (token, _user) = auth.login(body.into_inner()).await?;

    let cookie = session_cookie(&config.jwt, &token);
    Ok(HttpResponse::Ok().cookie(cookie).json(LoginResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
    }))
}

/// Logout
///
/// Sessions are stateless, so logging out is purely clearing the cookie
/// carrier; header-carried tokens simply age out.
#[post("/logout")]
pub async fn logout(config: web::Data<Config>) -> impl Responder {
    let mut cookie = session_cookie(&config.jwt, "");
    cookie.make_removal();
    HttpResponse::NoContent().cookie(cookie).finish()
}

/// Start the Google sign-in flow
///
/// Generates a fresh nonce, signs it into the state cookie, and redirects to
/// the provider's consent screen with the bare nonce as the `state` query
/// parameter. The callback later requires both to agree.
#[get("/oauth/login")]
pub async fn oauth_login(
    auth: web::Data<AuthService>,
    config: web::Data<Config>,
) -> impl Responder {
    let nonce = Uuid::new_v4().to_string();
    let (signed_state, consent_url) = auth.begin_oauth(&nonce);

    let state_cookie = Cookie::build(STATE_COOKIE_NAME, signed_state)
        .path("/")
        .http_only(true)
        .secure(config.jwt.cookie_secure)
        .same_site(SameSite::Lax)
        // a minute of slack beyond the verification window
        .max_age(CookieDuration::seconds(STATE_WINDOW_SECS + 60))
        .finish();

    HttpResponse::Found()
        .cookie(state_cookie)
        .insert_header((header::LOCATION, consent_url))
        .finish()
}

#[derive(Debug, serde::Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Google sign-in callback
///
/// All outcomes are redirects back to the frontend: a session hand-off on
/// success, an `error` code on failure. The state cookie is single use and
/// is cleared as soon as it has been read.
#[get("/oauth/callback")]
pub async fn oauth_callback(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    config: web::Data<Config>,
    query: web::Query<CallbackQuery>,
) -> impl Responder {
    let state_cookie = match req.cookie(STATE_COOKIE_NAME) {
        Some(cookie) => cookie,
        None => {
            warn!("OAuth state cookie missing on callback");
            return error_redirect(&config, "state_missing", None);
        }
    };

    let mut removal = Cookie::build(STATE_COOKIE_NAME, "")
        .path("/")
        .http_only(true)
        .secure(config.jwt.cookie_secure)
        .same_site(SameSite::Lax)
        .finish();
    removal.make_removal();

    let code = match query.code.as_deref() {
        Some(code) if !code.is_empty() => code,
        _ => {
            warn!("OAuth callback missing code parameter");
            let error_param = query
                .error
                .clone()
                .unwrap_or_else(|| "missing_code".to_string());
            return error_redirect(&config, &error_param, Some(removal));
        }
    };
    let received_state = query.state.as_deref().unwrap_or("");

    match auth
        .oauth_callback(state_cookie.value(), received_state, code)
        .await
    {
        Ok((token, user)) => {
            info!("OAuth login successful for user {}", user.id);
            let session = session_cookie(&config.jwt, &token);
            // Session tokens only contain URL-safe characters, so the
            // fragment needs no further encoding.
            let target = format!(
                "{}/oauth/callback#access_token={}",
                config.frontend_url, token
            );
            HttpResponse::Found()
                .cookie(removal)
                .cookie(session)
                .insert_header((header::LOCATION, target))
                .finish()
        }
        Err(callback_error) => {
            error_redirect(&config, callback_error.redirect_code(), Some(removal))
        }
    }
}

fn session_cookie(jwt: &JwtConfig, token: &str) -> Cookie<'static> {
    Cookie::build(jwt.cookie_name.clone(), token.to_string())
        .path("/")
        .http_only(true)
        .secure(jwt.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::minutes(jwt.expiry_minutes))
        .finish()
}

fn error_redirect(
    config: &Config,
    error_code: &str,
    state_removal: Option<Cookie<'static>>,
) -> HttpResponse {
    // The code may echo a provider-supplied error string; keep it tame.
    let sanitized: String = error_code
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let target = format!("{}/login?error={}", config.frontend_url, sanitized);

    let mut builder = HttpResponse::Found();
    if let Some(cookie) = state_removal {
        builder.cookie(cookie);
    }
    builder.insert_header((header::LOCATION, target)).finish()
}
