//! Connection authentication.
//!
//! Clients present a JWT in the `token` query parameter of the upgrade
//! request. The token must be signed with RS256 by the holder of the private
//! half of the configured public key. Nothing else about the connection is
//! trusted.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// The only accepted signature algorithm.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::RS256;

/// Query parameter carrying the token.
pub const TOKEN_PARAM: &str = "token";

/// Username reported when the token has none.
pub const UNKNOWN_USERNAME: &str = "unknown";

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no token provided")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("public key is not a PEM-encoded RSA public key: {0}")]
    InvalidKey(String),
}

/// Identity bound to a connection at authentication time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub username: String,
    pub repo_id: Option<String>,
    pub repo_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    #[serde(default, deserialize_with = "loose_claim")]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "loose_claim")]
    username: Option<String>,
    #[serde(default, deserialize_with = "loose_claim")]
    repo_id: Option<String>,
    #[serde(default, deserialize_with = "loose_claim")]
    repo_name: Option<String>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims
                .username
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
            repo_id: claims.repo_id,
            repo_name: claims.repo_name,
        }
    }
}

/// Verifies connection tokens against a pre-loaded public key.
#[derive(Clone)]
pub struct Authenticator {
    key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("algorithm", &TOKEN_ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Build from a PEM public key (`BEGIN PUBLIC KEY` or `BEGIN RSA PUBLIC KEY`).
    pub fn from_pem(pem: &str) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;

        let mut validation = Validation::new(TOKEN_ALGORITHM);
        // `exp` is validated when present but not required.
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        Ok(Self {
            key: Arc::new(key),
            validation: Arc::new(validation),
        })
    }

    /// Verify a bearer token and extract the identity claims.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims.into())
    }

    /// Authenticate from the handshake's token parameter, if any.
    pub fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        match token {
            Some(token) if !token.is_empty() => self.verify(token),
            _ => Err(AuthError::MissingToken),
        }
    }
}

/// Identity claims are informational: any JSON value is accepted and
/// rendered as text, `null` counts as absent.
fn loose_claim<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}
