use std::sync::OnceLock;

use anyhow::{Context, Result};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Staff,
}

/// Bearer token claims. `sub` is the user id; `staff_id` is set when the
/// account has an active staff row at login time.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub sub: i32,
    pub role: Role,
    pub staff_id: Option<i32>,
    pub exp: i64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

static KEYS: OnceLock<Keys> = OnceLock::new();

fn keys() -> &'static Keys {
    KEYS.get_or_init(|| {
        let secret =
            std::env::var("JWT_SECRET").unwrap_or("dev-secret-do-not-use-in-prod".to_string());
        Keys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    })
}

fn token_ttl_hours() -> i64 {
    std::env::var("TOKEN_TTL_HOURS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_TOKEN_TTL_HOURS)
}

pub fn issue_token(user_id: i32, role: Role, staff_id: Option<i32>) -> Result<String> {
    let exp = (Utc::now() + Duration::hours(token_ttl_hours())).timestamp();
    let claims = Claims {
        sub: user_id,
        role,
        staff_id,
        exp,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &keys().encoding)
        .context("Failed to encode token")
}

pub fn verify_token(token: &str) -> Result<Claims> {
    let data = jsonwebtoken::decode::<Claims>(token, &keys().decoding, &Validation::default())
        .context("Invalid token")?;
    Ok(data.claims)
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("Failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip_preserves_claims() {
        let token = issue_token(42, Role::Staff, Some(7)).unwrap();
        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Staff);
        assert_eq!(claims.staff_id, Some(7));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = issue_token(1, Role::Customer, None).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(verify_token(&tampered).is_err());
    }

    #[test]
    fn password_hash_verifies_only_with_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "wrong horse"));
    }
}
