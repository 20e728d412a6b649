use std::collections::HashMap;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum_extra::headers::Cookie;
use cookie::time::Duration;
use cookie::SameSite;
use rand_core::OsRng;
use uuid::Uuid;

use crate::bot::Cart;
use crate::error::ServiceError;

pub const SESSION_COOKIE: &str = "session";

/// Logged-in sessions and their chat carts. Visitors without a session share
/// one anonymous cart.
#[derive(Debug, Default)]
pub struct Sessions {
    users: HashMap<String, i64>,
    carts: HashMap<String, Cart>,
    anonymous_cart: Cart,
}

impl Sessions {
    /// Start a session and return its token. Any earlier session of the same
    /// user is ended, so each user holds at most one token.
    pub fn login(&mut self, user_id: i64) -> String {
        let stale: Vec<String> = self
            .users
            .iter()
            .filter(|(_, id)| **id == user_id)
            .map(|(token, _)| token.clone())
            .collect();
        for token in stale {
            self.logout(&token);
        }

        let token = Uuid::new_v4().to_string();
        self.users.insert(token.clone(), user_id);
        token
    }

    pub fn logout(&mut self, token: &str) -> bool {
        self.carts.remove(token);
        self.users.remove(token).is_some()
    }

    pub fn user_id(&self, token: &str) -> Option<i64> {
        self.users.get(token).copied()
    }

    pub fn cart_mut(&mut self, token: Option<&str>) -> &mut Cart {
        match token {
            Some(token) if self.users.contains_key(token) => {
                self.carts.entry(token.to_string()).or_default()
            }
            _ => &mut self.anonymous_cart,
        }
    }
}

/// The `session` cookie value, if the request carries one. Quoted values
/// are unquoted.
pub fn session_token(cookies: Option<&Cookie>) -> Option<String> {
    let raw = cookies?.get(SESSION_COOKIE)?;
    let value = cookie::Cookie::new(SESSION_COOKIE, raw).value_trimmed().to_string();
    (!value.is_empty()).then_some(value)
}

pub fn session_cookie(token: &str) -> String {
    cookie::Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(true)
        .build()
        .to_string()
}

pub fn expired_session_cookie() -> String {
    cookie::Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(Duration::ZERO)
        .build()
        .to_string()
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(format!("failed to hash password: {}", e)))
}

/// False for a wrong password and for a hash that doesn't parse.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::headers::Header;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    fn cookie_header(value: &'static str) -> Cookie {
        let header = HeaderValue::from_static(value);
        Cookie::decode(&mut std::iter::once(&header)).unwrap()
    }

    #[test]
    fn test_session_token_from_cookie_header() {
        let cookies = cookie_header("theme=dark; session=abc123");
        assert_eq!(session_token(Some(&cookies)), Some("abc123".to_string()));

        let cookies = cookie_header("session=\"abc123\"");
        assert_eq!(session_token(Some(&cookies)), Some("abc123".to_string()));

        let cookies = cookie_header("theme=dark");
        assert_eq!(session_token(Some(&cookies)), None);
        assert_eq!(session_token(None), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let set = session_cookie("abc123");
        assert!(set.starts_with("session=abc123"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("SameSite=Lax"));
        assert!(set.contains("Path=/"));

        let expired = expired_session_cookie();
        assert!(expired.starts_with("session=;"));
        assert!(expired.contains("Max-Age=0"));
    }

    #[test]
    fn test_login_replaces_earlier_session() {
        let mut sessions = Sessions::default();
        let first = sessions.login(7);
        sessions.cart_mut(Some(&first)).add("naan");

        let second = sessions.login(7);
        assert_ne!(first, second);
        assert_eq!(sessions.user_id(&first), None);
        assert_eq!(sessions.user_id(&second), Some(7));
        assert_eq!(sessions.users.len(), 1);
        assert!(sessions.carts.is_empty());

        sessions.login(8);
        assert_eq!(sessions.users.len(), 2);
    }

    #[test]
    fn test_carts_are_per_session() {
        let mut sessions = Sessions::default();
        let token = sessions.login(7);
        assert_eq!(sessions.user_id(&token), Some(7));

        sessions.cart_mut(Some(&token)).add("naan");
        sessions.cart_mut(None).add("rice");
        sessions.cart_mut(Some("stale-token")).add("rice");

        assert_eq!(sessions.cart_mut(Some(&token)).names(), vec!["naan"]);
        assert_eq!(sessions.cart_mut(None).quantity("rice"), 2);

        assert!(sessions.logout(&token));
        assert_eq!(sessions.user_id(&token), None);
        assert!(!sessions.logout(&token));
    }
}
