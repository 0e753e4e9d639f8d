use crate::db::models::User;
use crate::db::operations::DbOperations;
use crate::error::{AppError, AuthError};
use crate::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, decode, Header, EncodingKey, DecodingKey, Validation, Algorithm};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User uid
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

#[derive(Clone)]
pub struct AuthService {
    db: DbOperations,
    jwt_secret: String,
    token_expiry_hours: i64,
}

impl AuthService {
    pub fn new(db: DbOperations, jwt_secret: String, token_expiry_hours: i64) -> Self {
        Self {
            db,
            jwt_secret,
            token_expiry_hours,
        }
    }

    /// Check `uid`/`password` and issue a token for the user.
    pub async fn authenticate(&self, uid: &str, password: &str) -> Result<String> {
        let user = match self.db.get_user_by_uid(uid).await? {
            Some(user) if user.is_password(password) => user,
            _ => {
                warn!("Failed login for uid {}", uid);
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        self.generate_token(&user.uid)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User> {
        let claims = self.decode_token(token)?;

        // Tokens of deleted users stop working.
        let user = self.db.get_user_by_uid(&claims.sub).await?
            .ok_or(AppError::AuthError(AuthError::InvalidToken))?;

        Ok(user)
    }

    /// The caller may act on `uid` if it is their own account or they are an admin.
    pub fn authorize(&self, caller: &User, uid: &str) -> Result<()> {
        if caller.is_uid(uid) || caller.is_admin() {
            Ok(())
        } else {
            Err(AuthError::Unauthorized.into())
        }
    }

    fn generate_token(&self, uid: &str) -> Result<String> {
        let now = Utc::now();
        let exp = (now + Duration::hours(self.token_expiry_hours)).timestamp();
        let claims = Claims {
            sub: uid.to_string(),
            exp,
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    fn decode_token(&self, token: &str) -> Result<Claims> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(claims.claims)
    }
}
