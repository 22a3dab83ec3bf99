//! User access tokens: HS256 JWTs signed with `AVAZON_TOKEN_SECRET`.
//!
//! The subject is the user id. Tokens expire after their TTL; rotating the
//! secret revokes every outstanding token.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Default token lifetime in minutes (7 days).
pub const DEFAULT_TOKEN_TTL_MINS: i64 = 7 * 24 * 60;

const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The user id.
    pub sub: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

/// Issues and verifies access tokens with a shared secret.
pub struct TokenSigner {
    secret: SecretString,
    ttl_mins: i64,
}

impl TokenSigner {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            ttl_mins: DEFAULT_TOKEN_TTL_MINS,
        }
    }

    pub fn with_ttl_mins(mut self, ttl_mins: i64) -> Self {
        self.ttl_mins = ttl_mins;
        self
    }

    pub fn issue(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        self.sign(&Claims {
            sub: user_id.to_string(),
            exp: now + self.ttl_mins * 60,
            iat: now,
            token_type: ACCESS_TOKEN_TYPE.to_string(),
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
    }

    /// Check signature and expiry; returns the user id the token was
    /// issued for.
    pub fn verify(&self, token: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<Claims>(
            token.trim(),
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )?;
        let claims = data.claims;
        if claims.token_type != ACCESS_TOKEN_TYPE || claims.sub.is_empty() {
            return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
        }
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(SecretString::from(secret))
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = signer("s3cret");
        let token = signer.issue("user-1").unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(signer.verify(&token).unwrap(), "user-1");
    }

    #[test]
    fn test_user_ids_with_dots() {
        let signer = signer("s3cret");
        let token = signer.issue("jane.doe").unwrap();
        assert_eq!(signer.verify(&token).unwrap(), "jane.doe");
    }

    #[test]
    fn test_expired_token_fails() {
        let signer = signer("s3cret");
        // Well past the default 60 second leeway.
        let now = Utc::now().timestamp();
        let token = signer
            .sign(&Claims {
                sub: "user-1".to_string(),
                exp: now - 300,
                iat: now - 600,
                token_type: ACCESS_TOKEN_TYPE.to_string(),
            })
            .unwrap();
        assert!(signer.verify(&token).is_err());

        let short = self::signer("s3cret").with_ttl_mins(-10);
        let token = short.issue("user-1").unwrap();
        assert!(signer.verify(&token).is_err());
    }

    #[test]
    fn test_rejects_tampering() {
        let signer = signer("s3cret");
        let token = signer.issue("user-1").unwrap();
        assert!(self::signer("other").verify(&token).is_err());

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = signer.issue("user-2").unwrap();
        let forged_payload = forged_payload.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;
        assert!(signer.verify(&parts.join(".")).is_err());

        assert!(signer.verify("no-signature").is_err());
        assert!(signer.verify("").is_err());
    }

    #[test]
    fn test_rejects_other_token_types() {
        let signer = signer("s3cret");
        let now = Utc::now().timestamp();
        let token = signer
            .sign(&Claims {
                sub: "user-1".to_string(),
                exp: now + 600,
                iat: now,
                token_type: "refresh".to_string(),
            })
            .unwrap();
        assert!(signer.verify(&token).is_err());
    }
}
