use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::ApiError;
use crate::permissions::ActionType;
use crate::schema::{Id, UserRole};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub jti: Uuid,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user_id: Id, ttl: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + ttl).timestamp();

        Self {
            user_id,
            jti: Uuid::new_v4(),
            iat,
            exp,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Utc::now().timestamp()).is_negative()
    }
}

/// The authenticated caller of a request. The role is read from the database on every
/// request, so demoting a user takes effect without reissuing tokens.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Id,
    pub jti: Uuid,
    pub role: UserRole,
}

impl SessionData {
    pub fn new(user_id: Id, jti: Uuid, role: UserRole) -> Self {
        Self { user_id, jti, role }
    }

    pub fn authenticate(&self, action: ActionType) -> Result<(), ApiError> {
        if !action.authenticate(self) {
            return Err(ApiError::Forbidden);
        }
        Ok(())
    }
}

pub struct TokenSigner {
    key: Hmac<Sha256>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, ApiError> {
        let key = Hmac::new_from_slice(secret.as_bytes())
            .map_err(|e| ApiError::Internal(format!("Invalid signing key: {e}")))?;
        Ok(Self { key, ttl })
    }

    pub fn generate(&self, user_id: Id) -> Result<(String, JwtSessionData), ApiError> {
        let claims = JwtSessionData::new(user_id, self.ttl);
        let token = claims
            .clone()
            .sign_with_key(&self.key)
            .map_err(|e| ApiError::Internal(format!("Failed to sign token: {e}")))?;

        Ok((token, claims))
    }

    pub fn verify(&self, token: &str) -> Result<JwtSessionData, ApiError> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key)
            .map_err(|_| ApiError::InvalidToken)?;

        if session.is_expired() {
            return Err(ApiError::InvalidToken);
        }
        Ok(session)
    }
}
