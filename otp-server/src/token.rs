//! Session tokens: HS256 JWTs asserting a verified identity

use crate::settings;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

/// Minimum signing secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Errors that can occur while issuing or validating tokens
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Not a structurally valid token
    #[error("Malformed token")]
    Malformed,
    /// Signed with a different key, or tampered with
    #[error("Invalid token signature")]
    InvalidSignature,
    /// Issued by someone else
    #[error("Invalid token issuer")]
    InvalidIssuer,
    /// Past its `exp`
    #[error("Token expired")]
    Expired,
    /// Token could not be produced
    #[error("Could not encode token: {0}")]
    Encoding(String),
}

/// JWT Claims - data stored in the token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the verified identity
    pub sub: String,
    /// Issued at, seconds since epoch
    pub iat: i64,
    /// Expiration, seconds since epoch
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Unique token id
    pub jti: String,
}

impl Claims {
    /// Expiry as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The encoded JWT
    pub token: String,
    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// Creates and validates session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service.
    ///
    /// Fails if the secret is shorter than [MIN_SECRET_LEN] bytes.
    pub fn new(secret: &str, issuer: impl Into<String>, ttl: Duration) -> anyhow::Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("Token secret must be at least {MIN_SECRET_LEN} bytes long");
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl,
        })
    }

    /// Create a token service from the `[token]` settings section.
    pub fn from_settings(settings: &settings::Token) -> anyhow::Result<Self> {
        Self::new(&settings.secret, settings.issuer.clone(), settings.ttl())
    }

    /// How long issued tokens are valid for
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `identity`, valid from `now` for the configured ttl.
    pub fn issue(&self, identity: &str, now: DateTime<Utc>) -> Result<IssuedToken, Error> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: identity.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            jti: ulid::Ulid::new().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Encoding(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    /// Check signature, issuer and expiry, returning the claims.
    ///
    /// A token is rejected from the second of its `exp` onwards.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // expiry is checked against `now` below, without leeway
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => Error::InvalidSignature,
                ErrorKind::InvalidIssuer => Error::InvalidIssuer,
                ErrorKind::ExpiredSignature => Error::Expired,
                _ => Error::Malformed,
            })?;

        if claims.exp <= now.timestamp() {
            return Err(Error::Expired);
        }

        Ok(claims)
    }
}
