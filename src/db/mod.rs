//! Database module for the campus ledger.
//!
//! Connection setup, embedded migrations, and the data access layer for
//! users, sections, enrollments and the stock game.

pub mod enrollment;
pub mod models;
pub mod operations;
pub mod seed;
pub mod stocks;

pub use models::{
    BuyReceipt, Enrollment, NewSection, NewStock, NewUser, Section, Stock, StockAccount,
    StockTransaction, StockTransactionUpdate, StockUpdate, TransactionStock,
    TransactionStockUpdate, User, UserProfile, UserSections, UserUpdate,
};
pub use operations::{DbOperations, DbPoolStatus};
pub use seed::seed_demo_data;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{AppError, DatabaseError};
use crate::Result;

/// Open a pool against `url`, creating the database file if needed.
///
/// An in-memory database exists per connection, so `sqlite::memory:` pools
/// should be opened with a single connection.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| AppError::DatabaseError(DatabaseError::ConnectionError(e.to_string())))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| AppError::DatabaseError(DatabaseError::ConnectionError(e.to_string())))?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("database migrations complete");
    Ok(())
}
