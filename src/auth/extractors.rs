use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::error::AppError;

/// Extracts the authenticated user's id from request extensions.
///
/// Intended for routes protected by `AuthMiddleware`, which validates the
/// session token and inserts the resolved user id. If the id is missing
/// (middleware not applied, or an internal logic error after auth), the
/// extractor fails with `Unauthorized` as the safe default.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

impl FromRequest for AuthenticatedUser {
    type Error = ActixError; // AppError converts via ResponseError
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Uuid>().copied() {
            Some(user_id) => ready(Ok(AuthenticatedUser(user_id))),
            None => {
                let err = AppError::Unauthorized(
                    "user id not found in request, ensure AuthMiddleware is active".to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}
