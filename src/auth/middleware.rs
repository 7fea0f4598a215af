use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::service::AuthService;
use crate::error::AppError;

/// Routes that must be reachable without a session.
const PUBLIC_PATHS: [&str; 5] = [
    "/health",
    "/auth/signup",
    "/auth/login",
    "/auth/oauth/login",
    "/auth/oauth/callback",
];

/// Request authentication boundary.
///
/// Extracts a session token (Authorization header first, session cookie as
/// fallback), validates it, resolves the subject to a live user, and places
/// the user id in request extensions for handlers to pick up through
/// `AuthenticatedUser`. Public paths bypass the check entirely.
pub struct AuthMiddleware {
    auth: Arc<AuthService>,
    cookie_name: String,
}

impl AuthMiddleware {
    pub fn new(auth: Arc<AuthService>, cookie_name: &str) -> Self {
        Self {
            auth,
            cookie_name: cookie_name.to_string(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            auth: Arc::clone(&self.auth),
            cookie_name: self.cookie_name.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    auth: Arc<AuthService>,
    cookie_name: String,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if PUBLIC_PATHS.contains(&req.path()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let service = Rc::clone(&self.service);
        let auth = Arc::clone(&self.auth);
        let cookie_name = self.cookie_name.clone();

        Box::pin(async move {
            let token = match extract_token(&req, &cookie_name) {
                Some(token) => token,
                None => {
                    return Err(AppError::Unauthorized("missing token".into()).into());
                }
            };

            match auth.authenticate(&token).await {
                Ok(user) => {
                    req.extensions_mut().insert(user.id);
                    service.call(req).await
                }
                Err(app_err) => Err(app_err.into()),
            }
        })
    }
}

/// Bearer header takes precedence over the session cookie.
fn extract_token(req: &ServiceRequest, cookie_name: &str) -> Option<String> {
    let header_token = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if let Some(token) = header_token {
        return Some(token.to_string());
    }

    req.cookie(cookie_name).map(|c| c.value().to_string())
}
