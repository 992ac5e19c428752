//! Signed session tokens (HS256 JWT).

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;

/// Claims embedded in every session token. Never stored server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: Uuid,
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    ExpiredToken,

    #[error("malformed token")]
    MalformedToken,

    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(e) => AppError::Internal(anyhow::anyhow!("token signing: {e}")),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

/// Issues and validates tokens with the process-wide secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, account_id: Uuid, roles: Vec<String>) -> Result<String, TokenError> {
        self.issue_with_ttl(account_id, roles, self.ttl)
    }

    pub fn issue_with_ttl(
        &self,
        account_id: Uuid,
        roles: Vec<String>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id,
            roles,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        debug!("Issuing token for account {account_id}, expires at {}", claims.exp);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => TokenError::MalformedToken,
                _ => TokenError::InvalidToken,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-with-enough-length-123";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, Duration::hours(24))
    }

    #[test]
    fn test_issue_and_parse_round_trip() {
        let issuer = issuer();
        let id = Uuid::new_v4();
        let token = issuer
            .issue(id, vec!["employee".into(), "admin".into()])
            .unwrap();

        let claims = issuer.parse(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert!(claims.has_role("admin"));
        assert!(!claims.has_role("candidate"));
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer();
        let token = issuer
            .issue_with_ttl(Uuid::new_v4(), vec![], Duration::seconds(-30))
            .unwrap();
        assert!(matches!(issuer.parse(&token), Err(TokenError::ExpiredToken)));
    }

    #[test]
    fn test_other_secret_is_invalid() {
        let token = issuer().issue(Uuid::new_v4(), vec![]).unwrap();
        let other = TokenIssuer::new("a-completely-different-secret-value!!", Duration::hours(1));
        assert!(matches!(other.parse(&token), Err(TokenError::InvalidToken)));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let issuer = issuer();
        assert!(matches!(
            issuer.parse("not-a-token"),
            Err(TokenError::MalformedToken)
        ));
        assert!(matches!(
            issuer.parse("invalid.token.here"),
            Err(TokenError::MalformedToken)
        ));
    }

    #[test]
    fn test_token_error_maps_to_unauthorized() {
        let err: AppError = TokenError::ExpiredToken.into();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "token expired"));
    }
}
