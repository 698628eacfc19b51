//! OTP flow error type and implementations

use crate::token;

///////////
// TYPES //
///////////

#[derive(thiserror::Error, Debug)]
/// Ways issuing or verifying a one-time passcode can fail
pub enum Error {
    /// Request data is syntactically invalid
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No pending code exists for the identity (never issued, already used or superseded)
    #[error("No active code for this identity")]
    NotFound,

    /// The code's validity window has elapsed
    #[error("Code expired")]
    Expired,

    /// The submitted code is wrong
    #[error("Invalid code")]
    Mismatch,

    /// The configured failed attempt limit was reached and the code is now expired
    #[error("Too many failed attempts")]
    TooManyAttempts,

    /// The code could not be handed to the delivery service
    #[error("Could not deliver code: {0}")]
    Delivery(anyhow::Error),

    /// The storage backend failed
    #[error("Storage failure: {0}")]
    Storage(anyhow::Error),

    /// The session token could not be signed
    #[error(transparent)]
    Token(#[from] token::Error),
}

/////////////////////
// IMPLEMENTATIONS //
/////////////////////

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl Error {
    /// Whether this error is caused by the client rather than by the server
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Delivery(_) | Self::Storage(_) | Self::Token(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_server_side_failures_are_not_client_errors() {
        assert!(Error::NotFound.is_client_error());
        assert!(Error::Expired.is_client_error());
        assert!(Error::TooManyAttempts.is_client_error());
        assert!(Error::Validation("identity: email".into()).is_client_error());

        assert!(!Error::Delivery(anyhow!("smtp down")).is_client_error());
        assert!(!Error::Storage(anyhow!("db down")).is_client_error());
        assert!(!Error::Token(token::Error::Encoding("bad key".into())).is_client_error());
    }
}
