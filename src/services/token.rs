//! Stateless HS256 access tokens with an in-memory revocation set.
//!
//! Revocations live for the lifetime of the process. Each entry is dropped
//! once the token it names would have expired anyway.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::UserId;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("Token has been revoked")]
    Revoked,

    #[error("Token subject is not a user id")]
    BadSubject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string per RFC 7519.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id; revocation is keyed on it.
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| TokenError::BadSubject)
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    revoked: RwLock<HashMap<String, i64>>,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
            revoked: RwLock::new(HashMap::new()),
        }
    }

    /// 32 random bytes, hex encoded. Used when no secret is configured.
    #[must_use]
    pub fn generate_secret() -> String {
        use rand::Rng;

        let bytes: [u8; 32] = rand::rng().random();
        bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
            use std::fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        })
    }

    pub fn issue(&self, user_id: UserId) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Decodes and checks signature, expiry and revocation.
    pub async fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        if self.revoked.read().await.contains_key(&data.claims.jti) {
            return Err(TokenError::Revoked);
        }

        Ok(data.claims)
    }

    pub async fn revoke(&self, claims: &Claims) {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(claims.jti.clone(), claims.exp);
    }

    pub async fn revoked_count(&self) -> usize {
        self.revoked.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(b"test-secret", Duration::minutes(30))
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let tokens = service();
        let issued = tokens.issue(UserId::new(42)).unwrap();

        let claims = tokens.verify(&issued.token).await.unwrap();
        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
        assert!(issued.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let tokens = service();
        let a = tokens.issue(UserId::new(1)).unwrap();
        let b = tokens.issue(UserId::new(1)).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let tokens = service();
        let issued = tokens.issue(UserId::new(1)).unwrap();
        let other = tokens.issue(UserId::new(1)).unwrap();

        let claims = tokens.verify(&issued.token).await.unwrap();
        tokens.revoke(&claims).await;

        assert!(matches!(
            tokens.verify(&issued.token).await,
            Err(TokenError::Revoked)
        ));
        assert!(tokens.verify(&other.token).await.is_ok());
        assert_eq!(tokens.revoked_count().await, 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let tokens = TokenService::new(b"test-secret", Duration::minutes(-5));
        let issued = tokens.issue(UserId::new(1)).unwrap();

        assert!(matches!(
            tokens.verify(&issued.token).await,
            Err(TokenError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let issued = service().issue(UserId::new(1)).unwrap();
        let other = TokenService::new(b"another-secret", Duration::minutes(30));

        assert!(other.verify(&issued.token).await.is_err());
        assert!(other.verify("not.a.token").await.is_err());
    }

    #[tokio::test]
    async fn test_revocation_prunes_expired_entries() {
        let tokens = service();
        let stale = Claims {
            sub: "1".to_string(),
            iat: 0,
            exp: 1,
            jti: "stale".to_string(),
        };
        tokens.revoke(&stale).await;

        let issued = tokens.issue(UserId::new(1)).unwrap();
        let claims = tokens.verify(&issued.token).await.unwrap();
        tokens.revoke(&claims).await;

        assert_eq!(tokens.revoked_count().await, 1);
    }

    #[test]
    fn test_generated_secret_is_random_hex() {
        let a = TokenService::generate_secret();
        let b = TokenService::generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
