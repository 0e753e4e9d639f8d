//! HTTP routes over the persistence layer.

pub mod sections;
pub mod stocks;
pub mod users;

use actix_web::web;

use crate::auth::handlers::login;
use crate::health_check;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/auth/login", web::post().to(login))
        .service(
            web::scope("/api")
                .route("/users", web::get().to(users::list_users))
                .route("/users", web::post().to(users::create_user))
                .route("/users/{uid}", web::get().to(users::get_user))
                .route("/users/{uid}", web::put().to(users::update_user))
                .route("/users/{uid}", web::delete().to(users::delete_user))
                .route("/users/{uid}/sections", web::get().to(users::read_sections))
                .route("/users/{uid}/sections", web::post().to(users::add_sections))
                .route("/users/{uid}/sections", web::delete().to(users::remove_sections))
                .route("/users/{uid}/pfp", web::put().to(users::save_pfp))
                .route("/users/{uid}/pfp", web::delete().to(users::delete_pfp))
                .route("/sections", web::get().to(sections::list_sections))
                .route("/sections", web::post().to(sections::create_section))
                .route("/stocks", web::get().to(stocks::list_stocks))
                .route("/stocks", web::post().to(stocks::create_stock))
                .route("/stocks/account", web::post().to(stocks::open_account))
                .route("/stocks/balance/{uid}", web::get().to(stocks::get_balance))
                .route("/stocks/buy", web::post().to(stocks::buy)),
        );
}
