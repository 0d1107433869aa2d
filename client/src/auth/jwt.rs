use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT decoding error: {0}")]
    Decoding(String),
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has no expiry claim")]
    MissingExpiry,
}

/// The subset of claims the client cares about. The signature is the
/// server's business; the client only reads what the token says about itself.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

pub fn decode_claims(token: &str) -> Result<TokenClaims, JwtError> {
    if token.is_empty() {
        return Err(JwtError::InvalidToken);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(JwtError::InvalidToken);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken => JwtError::InvalidToken,
            _ => JwtError::Decoding(err.to_string()),
        })
}

pub fn expires_at(token: &str) -> Result<DateTime<Utc>, JwtError> {
    decode_claims(token)?
        .expires_at()
        .ok_or(JwtError::MissingExpiry)
}

/// A token that cannot be read, or carries no `exp`, counts as expired.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    match expires_at(token) {
        Ok(expiry) => expiry <= now,
        Err(err) => {
            log::warn!("Treating unreadable token as expired: {}", err);
            true
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exp: Option<i64>,
    }

    pub(crate) fn token_expiring_at(exp: Option<DateTime<Utc>>) -> String {
        let claims = TestClaims {
            sub: "rockhound".into(),
            exp: exp.map(|at| at.timestamp()),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap()
    }

    #[test]
    fn reads_claims_without_the_server_secret() {
        let expiry = Utc::now() + Duration::hours(1);
        let token = token_expiring_at(Some(expiry));

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("rockhound"));
        assert_eq!(claims.exp, Some(expiry.timestamp()));
    }

    #[test]
    fn future_expiry_is_valid() {
        let token = token_expiring_at(Some(Utc::now() + Duration::minutes(30)));
        assert!(!is_expired(&token, Utc::now()));
    }

    #[test]
    fn past_expiry_is_expired() {
        let token = token_expiring_at(Some(Utc::now() - Duration::seconds(1)));
        assert!(is_expired(&token, Utc::now()));
    }

    #[test]
    fn missing_expiry_is_expired() {
        let token = token_expiring_at(None);
        assert!(matches!(expires_at(&token), Err(JwtError::MissingExpiry)));
        assert!(is_expired(&token, Utc::now()));
    }

    #[test]
    fn garbage_is_expired() {
        assert!(matches!(decode_claims(""), Err(JwtError::InvalidToken)));
        assert!(matches!(decode_claims("not-a-jwt"), Err(JwtError::InvalidToken)));
        assert!(is_expired("a.b.c", Utc::now()));
    }
}
