use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use log::info;
use sqlx::PgPool;
use std::sync::Arc;

use taskhub::auth::clock::SystemClock;
use taskhub::auth::oauth::GoogleIdentityClient;
use taskhub::auth::state::StateProtector;
use taskhub::auth::{AuthMiddleware, AuthService, TokenService};
use taskhub::config::Config;
use taskhub::routes;
use taskhub::store::PgUserStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let clock = Arc::new(SystemClock);
    let tokens = TokenService::new(&config.jwt.secret, config.jwt.expiry_minutes, clock.clone());
    let state = StateProtector::new(&config.oauth.state_secret, clock);
    let store = Arc::new(PgUserStore::new(pool));
    let identity = Arc::new(GoogleIdentityClient::new(&config.oauth));
    let auth = Arc::new(AuthService::new(store, identity, tokens, state));

    let auth_data = web::Data::from(auth.clone());
    let config_data = web::Data::new(config.clone());
    let bind_addr = (config.server_host.clone(), config.server_port);

    info!("Starting taskhub server at {}", config.server_url());

    HttpServer::new(move || {
        // Middleware runs in reverse registration order: CORS sees the
        // request first, authentication last.
        App::new()
            .app_data(auth_data.clone())
            .app_data(config_data.clone())
            .wrap(AuthMiddleware::new(
                Arc::clone(&auth),
                &config.jwt.cookie_name,
            ))
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allowed_origin(&config.frontend_url)
                    .allow_any_method()
                    .allow_any_header()
                    .supports_credentials()
                    .max_age(3600),
            )
            .service(routes::health::health)
            .configure(routes::config)
    })
    .bind(bind_addr)?
    .run()
    .await
}
