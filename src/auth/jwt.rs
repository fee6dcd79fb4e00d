//! Access token issuing and verification (Ed25519 via `jwt-simple`).

use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccessClaims {
    email: String,
}

/// Verified identity carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: i32,
    pub email: String,
    pub exp: i64,
}

#[derive(Debug)]
pub enum TokenError {
    Jwt(jwt_simple::Error),
    MalformedSubject(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Jwt(e) => write!(f, "Token error: {}", e),
            TokenError::MalformedSubject(sub) => write!(f, "Token subject '{}' is not a user id", sub),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<jwt_simple::Error> for TokenError {
    fn from(e: jwt_simple::Error) -> Self {
        TokenError::Jwt(e)
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    key_pair: Arc<Ed25519KeyPair>,
    public_key: Arc<Ed25519PublicKey>,
    pub access_token_expiry: i64,
    pub issuer: Option<String>,
}

impl TokenIssuer {
    /// Expects JWT_PRIVATE_KEY env var (base64-encoded Ed25519 key).
    pub fn from_env(access_token_expiry: i64, issuer: Option<String>) -> Self {
        use base64::Engine;

        let private_key_b64 =
            std::env::var("JWT_PRIVATE_KEY").expect("JWT_PRIVATE_KEY must be set");

        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(&private_key_b64)
            .expect("JWT_PRIVATE_KEY must be valid base64");

        let key_pair = Ed25519KeyPair::from_bytes(&key_bytes)
            .expect("JWT_PRIVATE_KEY must be a valid Ed25519 key");

        Self::with_expiry(key_pair, access_token_expiry, issuer)
    }

    pub fn from_key_pair(key_pair: Ed25519KeyPair) -> Self {
        Self::with_expiry(key_pair, 3600, None)
    }

    fn with_expiry(key_pair: Ed25519KeyPair, access_token_expiry: i64, issuer: Option<String>) -> Self {
        let public_key = key_pair.public_key();
        Self {
            key_pair: Arc::new(key_pair),
            public_key: Arc::new(public_key),
            access_token_expiry,
            issuer,
        }
    }

    /// Returns a fresh base64-encoded private key, suitable for `JWT_PRIVATE_KEY`.
    pub fn generate_private_key() -> String {
        use base64::Engine;

        base64::engine::general_purpose::STANDARD.encode(Ed25519KeyPair::generate().to_bytes())
    }

    pub fn issue_token(&self, user: &User) -> Result<String, TokenError> {
        let custom_claims = AccessClaims {
            email: user.email.clone(),
        };

        let mut claims = jwt_simple::claims::Claims::with_custom_claims(
            custom_claims,
            Duration::from_secs(self.access_token_expiry as u64),
        )
        .with_subject(user.id.to_string());

        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer);
        }

        Ok(self.key_pair.sign(claims)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut options = VerificationOptions::default();
        if let Some(issuer) = &self.issuer {
            options.allowed_issuers = Some(std::collections::HashSet::from([issuer.clone()]));
        }

        let token_data = self
            .public_key
            .verify_token::<AccessClaims>(token, Some(options))?;

        let subject = token_data.subject.unwrap_or_default();
        let user_id = subject
            .parse::<i32>()
            .map_err(|_| TokenError::MalformedSubject(subject.clone()))?;

        Ok(TokenClaims {
            user_id,
            email: token_data.custom.email,
            exp: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }
}
