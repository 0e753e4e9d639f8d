use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::auth::handlers::authenticated_user;
use crate::db::models::NewStock;
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    pub uid: String,
}

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub uid: String,
    pub symbol: String,
    pub quantity: i64,
}

pub async fn list_stocks(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.list_stocks().await?))
}

/// Admins only.
pub async fn create_stock(
    req: HttpRequest,
    body: web::Json<NewStock>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let caller = authenticated_user(&req, &state).await?;
    if !caller.is_admin() {
        return Err(AuthError::Unauthorized.into());
    }
    if body.symbol.is_empty() || body.price <= 0 || body.quantity < 0 {
        return Err(AppError::ValidationError(
            "symbol, a positive price and a non-negative quantity are required".into(),
        ));
    }

    let stock = state.db.create_stock(&body).await?;
    Ok(HttpResponse::Created().json(stock))
}

pub async fn open_account(
    req: HttpRequest,
    body: web::Json<AccountRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let caller = authenticated_user(&req, &state).await?;
    state.auth_service.authorize(&caller, &body.uid)?;

    let account = state.db.add_stock_user(&body.uid).await?;
    Ok(HttpResponse::Ok().json(account))
}

pub async fn get_balance(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let balance = state.db.get_balance(&path).await?;
    Ok(HttpResponse::Ok().json(json!({ "uid": path.as_str(), "balance": balance })))
}

pub async fn buy(
    req: HttpRequest,
    body: web::Json<BuyRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let caller = authenticated_user(&req, &state).await?;
    state.auth_service.authorize(&caller, &body.uid)?;

    let receipt = state.db.buy_stock(&body.uid, &body.symbol, body.quantity).await?;
    Ok(HttpResponse::Ok().json(receipt))
}
