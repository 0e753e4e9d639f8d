use actix_web::{web, HttpRequest, HttpResponse};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::handlers::authenticated_user;
use crate::db::models::{NewUser, User, UserUpdate};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SectionsRequest {
    pub sections: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PfpRequest {
    pub filename: String,
    /// Base64 encoded image bytes.
    pub image: String,
}

/// Resolve the caller and the target user, checking the caller may act on it.
async fn authorized_target(
    req: &HttpRequest,
    state: &AppState,
    uid: &str,
) -> Result<User, AppError> {
    let caller = authenticated_user(req, state).await?;
    state.auth_service.authorize(&caller, uid)?;
    state.db.require_user(uid).await
}

pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let mut profiles = Vec::new();
    for user in state.db.list_users().await? {
        profiles.push(state.db.read_user(&user).await?);
    }
    Ok(HttpResponse::Ok().json(profiles))
}

pub async fn create_user(
    body: web::Json<NewUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if body.name.is_empty() || body.uid.is_empty() {
        return Err(AppError::ValidationError("name and uid are required".into()));
    }

    let user = state.db.create_user(&body).await?;
    let profile = state.db.read_user(&user).await?;
    Ok(HttpResponse::Created().json(profile))
}

pub async fn get_user(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state.db.require_user(&path).await?;
    Ok(HttpResponse::Ok().json(state.db.read_user(&user).await?))
}

pub async fn update_user(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UserUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = authorized_target(&req, &state, &path).await?;
    let user = state.db.update_user(user.id, &body).await?;
    info!("Updated user {}", user.uid);
    Ok(HttpResponse::Ok().json(state.db.read_user(&user).await?))
}

pub async fn delete_user(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = authorized_target(&req, &state, &path).await?;
    state.db.delete_user(user.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn read_sections(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state.db.require_user(&path).await?;
    Ok(HttpResponse::Ok().json(state.db.read_sections(&user).await?))
}

pub async fn add_sections(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<SectionsRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = authorized_target(&req, &state, &path).await?;
    state.db.add_sections(&user, &body.sections).await?;
    Ok(HttpResponse::Ok().json(state.db.read_sections(&user).await?))
}

pub async fn remove_sections(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<SectionsRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = authorized_target(&req, &state, &path).await?;
    state.db.remove_sections(&user, &body.sections).await?;
    Ok(HttpResponse::Ok().json(state.db.read_sections(&user).await?))
}

pub async fn save_pfp(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<PfpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = authorized_target(&req, &state, &path).await?;
    let image = BASE64.decode(&body.image).map_err(|e| {
        warn!("Undecodable profile picture for {}: {}", user.uid, e);
        AppError::ValidationError("image must be base64 encoded".into())
    })?;

    let user = state
        .db
        .save_pfp(&user, &state.config.uploads.folder, &image, &body.filename)
        .await?;
    Ok(HttpResponse::Ok().json(state.db.read_user(&user).await?))
}

pub async fn delete_pfp(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = authorized_target(&req, &state, &path).await?;
    let user = state.db.delete_pfp(&user).await?;
    Ok(HttpResponse::Ok().json(state.db.read_user(&user).await?))
}
