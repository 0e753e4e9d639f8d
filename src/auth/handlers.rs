use actix_web::{web, HttpResponse, HttpRequest};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::db::models::User;
use crate::error::{AppError, AuthError};
use tracing::{info, error};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub uid: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for uid: {}", req.uid);
    match state.auth_service.authenticate(&req.uid, &req.password).await {
        Ok(token) => {
            info!("Login successful for uid: {}", req.uid);
            Ok(HttpResponse::Ok().json(AuthResponse { token }))
        }
        Err(e) => {
            error!("Login failed for uid: {}: {}", req.uid, e);
            Err(e)
        }
    }
}

/// Resolve the bearer token on `req` to the calling user.
pub async fn authenticated_user(req: &HttpRequest, state: &AppState) -> Result<User, AppError> {
    let token = req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::AuthError(AuthError::MissingToken))?;

    state.auth_service.validate_token(token).await
}
