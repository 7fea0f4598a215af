pub mod auth;
pub mod health;
pub mod users;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::signup)
            .service(auth::login)
            .service(auth::logout)
            .service(auth::oauth_login)
            .service(auth::oauth_callback),
    )
    .service(web::scope("/users").service(users::me));
}
