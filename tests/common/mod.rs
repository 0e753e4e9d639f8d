#![allow(dead_code)]

use campus_ledger::auth::PasswordHasher;
use campus_ledger::db::{self, DbOperations, NewSection, NewStock, NewUser, Section, Stock, User};
use std::sync::Arc;

/// A fresh, migrated in-memory database.
pub async fn setup_test_db() -> DbOperations {
    let pool = db::connect("sqlite::memory:", 1)
        .await
        .expect("Failed to open in-memory database");
    db::run_migrations(&pool).await.expect("Failed to run migrations");
    DbOperations::new(Arc::new(pool), PasswordHasher::new(1_000))
}

pub async fn create_user(db: &DbOperations, name: &str, uid: &str) -> User {
    db.create_user(&NewUser::new(name, uid).password(format!("123{}", uid)))
        .await
        .expect("Failed to create user")
}

pub async fn create_section(db: &DbOperations, name: &str, abbreviation: &str) -> Section {
    db.create_section(&NewSection::new(name, abbreviation))
        .await
        .expect("Failed to create section")
}

pub async fn create_stock(db: &DbOperations, symbol: &str, price: i64, quantity: i64) -> Stock {
    db.create_stock(&NewStock {
        symbol: symbol.to_string(),
        company: format!("{} Corp", symbol),
        quantity,
        price,
    })
    .await
    .expect("Failed to create stock")
}

pub fn abbreviations(sections: &[Section]) -> Vec<&str> {
    sections.iter().map(|s| s.abbreviation.as_str()).collect()
}
