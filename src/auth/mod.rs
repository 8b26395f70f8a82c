use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::Role;

pub mod password;
pub mod policy;

/// JWT claims. Only the subject is trusted: every request re-resolves the
/// user row, so role changes and deletions take effect immediately. The
/// role is carried for client convenience, never for authorization.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, role: Role, expiry_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            role,
            exp: (now + Duration::hours(expiry_hours)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

pub fn generate_token(claims: &Claims, secret: &str) -> Result<String, TokenError> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|_| TokenError::Invalid)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let validation = Validation::default();
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_sign_and_verify() {
        let user_id = Uuid::new_v4();
        let token = generate_token(&Claims::new(user_id, Role::User, 1), SECRET).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn test_expired_token_is_distinct_from_invalid() {
        let token =
            generate_token(&Claims::new(Uuid::new_v4(), Role::User, -1), SECRET).unwrap();
        assert_eq!(verify_token(&token, SECRET), Err(TokenError::Expired));
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let token = generate_token(&Claims::new(Uuid::new_v4(), Role::User, 1), SECRET).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert_eq!(verify_token(&tampered, SECRET), Err(TokenError::Invalid));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = generate_token(&Claims::new(Uuid::new_v4(), Role::Admin, 1), SECRET).unwrap();
        assert_eq!(verify_token(&token, "other-secret"), Err(TokenError::Invalid));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert_eq!(verify_token("not.a.jwt", SECRET), Err(TokenError::Invalid));
    }
}
