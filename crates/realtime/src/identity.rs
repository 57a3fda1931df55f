//! Connection identity from an optional bearer token.
//!
//! Tokens are HS256 JWTs carrying `{sub, role, exp}`. Issuance happens
//! elsewhere; this module only verifies. A missing or invalid token never
//! fails a connection, it yields a guest identity.

use std::fmt;

use common::UserId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role granted by a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    Customer,
    Waiter,
    Kitchen,
    Admin,
}

impl Role {
    /// Maps a role claim. Unrecognized roles are treated as customers.
    pub fn from_claim(claim: &str) -> Self {
        match claim.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "waiter" => Role::Waiter,
            "kitchen" | "chef" => Role::Kitchen,
            _ => Role::Customer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Customer => "customer",
            Role::Waiter => "waiter",
            Role::Kitchen => "kitchen",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: String,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

/// Who is on the other end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<UserId>,
    pub role: Role,
}

impl Identity {
    pub fn guest() -> Self {
        Self {
            user_id: None,
            role: Role::Guest,
        }
    }

    pub fn user(user_id: UserId, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::guest()
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token subject is not a user id: {0}")]
    InvalidSubject(String),
}

/// Verifies HS256 tokens against a shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub", "exp"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        let user_id = data
            .claims
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenError::InvalidSubject(data.claims.sub.clone()))?;

        Ok(Identity::user(user_id, Role::from_claim(&data.claims.role)))
    }

    /// Resolves an optional token, falling back to a guest identity.
    pub fn identify(&self, token: Option<&str>) -> Identity {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Identity::guest();
        };

        match self.verify(token) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::debug!(error = %e, "Token rejected, continuing as guest");
                Identity::guest()
            }
        }
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
