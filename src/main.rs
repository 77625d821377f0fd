#[macro_use]
extern crate log;
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use dotenv::dotenv;
use listenfd::ListenFd;

mod api_error;
mod campus;
mod config;
mod db;
mod grading;
mod handlers;
mod models;
mod rules;
mod schema;
mod user;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().body("Hello from campus-portal 👋")
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db::init() {
        error!("{}", e.message);
        std::process::exit(1);
    }
    if let Err(e) = user::Profile::ensure_bootstrap_admin(&config) {
        error!("Creating bootstrap admin failed: {}", e.message);
    }

    let cookie_key = config.cookie_key();
    let cookie_secure = config.cookie_secure;
    let address = format!("{}:{}", config.host, config.port);
    let data = web::Data::new(config);

    let mut listenfd = ListenFd::from_env();

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(&cookie_key)
                    .name("auth")
                    .path("/")
                    .secure(cookie_secure),
            ))
            .service(index)
            .configure(user::init_routes)
            .configure(handlers::admin_routes)
            .configure(handlers::teacher_routes)
            .configure(handlers::student_routes)
    });

    server = match listenfd.take_tcp_listener(0)? {
        Some(listener) => server.listen(listener)?,
        None => server.bind(&address)?,
    };

    info!("Starting server on {} 🚀", address);

    server.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;

    #[actix_rt::test]
    async fn index_is_public() {
        let app = test::init_service(App::new().service(index)).await;

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_rt::test]
    async fn me_requires_a_session() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config::test_config()))
                .wrap(IdentityService::new(CookieIdentityPolicy::new(&[0; 32]).name("auth")))
                .configure(user::init_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/me/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
