pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use actix_web::HttpResponse;
use tracing::info;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, PasswordHasher};
pub use db::{DbOperations, User, UserProfile};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db: DbOperations,
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    /// Open the database, apply migrations and, when configured, load the
    /// demo data.
    pub async fn new(config: Settings) -> Result<Self> {
        let pool = db::connect(&config.database.url, config.database.max_connections).await?;
        db::run_migrations(&pool).await?;

        let db = DbOperations::new(
            Arc::new(pool),
            PasswordHasher::new(config.auth.password_iterations),
        );
        if config.database.seed {
            info!("Seeding demo data");
            db::seed_demo_data(&db).await?;
        }

        let auth_service = AuthService::new(
            db.clone(),
            config.auth.jwt_secret.clone(),
            config.auth.token_expiry_hours,
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            auth_service: Arc::new(auth_service),
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        // Close database connections
        self.db.pool().close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_creation() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::new(config).await.expect("Failed to create state");

        assert_eq!(state.config.environment, "test");
        assert!(state.db.list_users().await.unwrap().is_empty());

        state.shutdown().await.unwrap();
        assert!(state.db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_app_state_seeds_when_configured() {
        let mut config = Settings::new_for_test().expect("Failed to load test config");
        config.database.seed = true;
        let state = AppState::new(config).await.expect("Failed to create state");

        assert_eq!(state.db.list_users().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_app_state_bad_database() {
        let mut config = Settings::new_for_test().expect("Failed to load test config");
        config.database.url = "sqlite:///definitely/missing/dir/ledger.db".to_string();

        let state = AppState::new(config).await;
        assert!(matches!(state, Err(AppError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_app_state_clone() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::new(config).await.unwrap();

        let cloned = state.clone();

        // Verify Arc references are shared
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.auth_service, &cloned.auth_service));
    }
}
