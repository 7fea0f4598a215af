use actix_web::{get, web, HttpResponse, Responder};

use crate::auth::extractors::AuthenticatedUser;
use crate::auth::AuthService;
use crate::error::AppError;

/// Current user
///
/// Returns the public record for the session's subject.
#[get("/me")]
pub async fn me(
    auth: web::Data<AuthService>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = auth.user_by_id(user.0).await?;
    Ok(HttpResponse::Ok().json(user))
}
