use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::password::{verify_password, PasswordHasher};

pub const DEFAULT_PASSWORD: &str = "123qwerty";
pub const DEFAULT_ROLE: &str = "User";
pub const ADMIN_ROLE: &str = "Admin";
pub const BUY_TRANSACTION: &str = "buy";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub uid: String,
    #[serde(skip)]
    #[sqlx(rename = "password")]
    password_hash: String,
    pub role: String,
    pub pfp: Option<String>,
    pub kasm_server_needed: bool,
}

impl User {
    pub fn is_uid(&self, uid: &str) -> bool {
        self.uid == uid
    }

    /// Only the first characters of the stored hash, never the whole thing.
    pub fn password(&self) -> String {
        let preview: String = self.password_hash.chars().take(10).collect();
        format!("{}...", preview)
    }

    pub fn set_password(&mut self, password: &str, hasher: &PasswordHasher) {
        self.password_hash = hasher.hash(password);
    }

    pub fn is_password(&self, password: &str) -> bool {
        verify_password(&self.password_hash, password)
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    pub(crate) fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub uid: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default)]
    pub kasm_server_needed: bool,
    /// Never taken from a request body; public sign-ups are always `User`.
    #[serde(skip_deserializing, default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub pfp: Option<String>,
}

fn default_password() -> String {
    DEFAULT_PASSWORD.to_string()
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

impl NewUser {
    pub fn new(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
            password: default_password(),
            kasm_server_needed: false,
            role: default_role(),
            pfp: None,
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn pfp(mut self, pfp: impl Into<String>) -> Self {
        self.pfp = Some(pfp.into());
        self
    }

    pub fn kasm_server_needed(mut self, needed: bool) -> Self {
        self.kasm_server_needed = needed;
        self
    }
}

/// Partial update of a user. Empty strings count as "leave unchanged".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub uid: Option<String>,
    pub password: Option<String>,
    pub pfp: Option<String>,
    pub kasm_server_needed: Option<bool>,
}

/// The public view of a user, ready for an API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub uid: String,
    pub role: String,
    pub pfp: Option<String>,
    pub kasm_server_needed: bool,
    pub sections: Option<Vec<Section>>,
}

impl UserProfile {
    pub fn new(user: User, sections: Vec<Section>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            uid: user.uid,
            role: user.role,
            pfp: user.pfp,
            kasm_server_needed: user.kasm_server_needed,
            sections: (!sections.is_empty()).then_some(sections),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSections {
    pub sections: Option<Vec<Section>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Section {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSection {
    pub name: String,
    pub abbreviation: String,
}

impl NewSection {
    pub fn new(name: impl Into<String>, abbreviation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abbreviation: abbreviation.into(),
        }
    }
}

/// A row of `user_sections`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub user_id: i64,
    pub section_id: i64,
    pub year: i32,
}

impl Enrollment {
    pub fn new(user_id: i64, section_id: i64) -> Self {
        Self {
            user_id,
            section_id,
            year: enrollment_year(Local::now().date_naive()),
        }
    }
}

/// School years roll over in July: enrolling from July through December
/// counts toward the following calendar year.
pub fn enrollment_year(today: NaiveDate) -> i32 {
    if (7..=12).contains(&today.month()) {
        today.year() + 1
    } else {
        today.year()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub company: String,
    pub quantity: i64,
    pub price: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStock {
    pub symbol: String,
    pub company: String,
    pub quantity: i64,
    pub price: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockUpdate {
    pub symbol: Option<String>,
    pub company: Option<String>,
    pub quantity: Option<i64>,
}

/// A user's stock game account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StockAccount {
    pub id: i64,
    pub user_uid: String,
    pub balance: i64,
    pub account_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StockTransaction {
    pub id: i64,
    pub stock_user_id: i64,
    pub transaction_type: String,
    pub quantity: i64,
    pub transaction_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockTransactionUpdate {
    pub stock_user_id: Option<i64>,
    pub transaction_type: Option<String>,
    pub quantity: Option<i64>,
}

/// Join row linking a transaction to the stock it moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransactionStock {
    pub stock_user_id: i64,
    pub transaction_id: i64,
    pub stock_id: i64,
    pub quantity: i64,
    pub price_per_stock: f64,
    pub transaction_amount: i64,
    pub transaction_time: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionStockUpdate {
    pub quantity: Option<i64>,
    pub price_per_stock: Option<f64>,
    pub transaction_amount: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyReceipt {
    pub transaction_id: i64,
    pub symbol: String,
    pub quantity: i64,
    pub price_per_stock: f64,
    pub transaction_amount: i64,
    pub balance: i64,
}
