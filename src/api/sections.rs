use actix_web::{web, HttpRequest, HttpResponse};

use crate::auth::handlers::authenticated_user;
use crate::db::models::NewSection;
use crate::error::{AppError, AuthError};
use crate::AppState;

pub async fn list_sections(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.list_sections().await?))
}

/// Admins only.
pub async fn create_section(
    req: HttpRequest,
    body: web::Json<NewSection>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let caller = authenticated_user(&req, &state).await?;
    if !caller.is_admin() {
        return Err(AuthError::Unauthorized.into());
    }
    if body.name.is_empty() || body.abbreviation.is_empty() {
        return Err(AppError::ValidationError("name and abbreviation are required".into()));
    }

    let section = state.db.create_section(&body).await?;
    Ok(HttpResponse::Created().json(section))
}
