//! Authentication module for the campus ledger.
//!
//! Password hashing, token issue/validation and the login handler.

pub mod handlers;
pub mod password;
mod service;

pub use password::PasswordHasher;
pub use service::{AuthService, Claims};
