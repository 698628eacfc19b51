//! Request and response data types that are common and useful between clients of and the otp server

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Number of digits in a one-time passcode.
pub const CODE_LENGTH: usize = 6;

/// Request for a new one-time passcode
#[derive(Deserialize, Serialize, Validate, Clone, Debug, ToSchema)]
pub struct OtpSendRequest {
    /// The email address the code gets delivered to
    #[serde(alias = "email")]
    #[validate(email)]
    #[schema(example = "a@b.com")]
    pub identity: String,
}

impl OtpSendRequest {
    /// Create a new instance of [OtpSendRequest]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

/// Submission of a one-time passcode
#[derive(Deserialize, Serialize, Validate, Clone, Debug, ToSchema)]
pub struct OtpVerifyRequest {
    /// The email address the code was sent to
    #[serde(alias = "email")]
    #[validate(email)]
    #[schema(example = "a@b.com")]
    pub identity: String,
    /// The code received by email
    #[serde(alias = "otp")]
    #[validate(custom = "validate_code")]
    #[schema(example = "123456")]
    pub code: String,
}

impl OtpVerifyRequest {
    /// Create a new instance of [OtpVerifyRequest]
    pub fn new(identity: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            code: code.into(),
        }
    }
}

/// Checks that a code is exactly [CODE_LENGTH] ASCII digits.
pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("code");
        err.message = Some(format!("code must be {CODE_LENGTH} digits").into());
        Err(err)
    }
}

/// Generic acknowledgement
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct MessageResponse {
    /// Human readable outcome
    pub message: String,
}

impl MessageResponse {
    /// Create a new [MessageResponse]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response to a successful code verification
#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct TokenResponse {
    /// Human readable outcome
    pub message: String,
    /// The signed session token
    pub token: String,
    /// When the session token stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// The authenticated user's profile
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct ProfileResponse {
    /// The verified identity (email address)
    pub identity: String,
    /// Time of the most recent successful verification, if recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use testresult::TestResult;

    #[test]
    fn test_send_request_accepts_email_alias() -> TestResult {
        let request: OtpSendRequest = serde_json::from_str(r#"{ "email": "a@b.com" }"#)?;

        assert_eq!(request.identity, "a@b.com");
        assert_matches!(request.validate(), Ok(()));

        Ok(())
    }

    #[test]
    fn test_send_request_rejects_malformed_address() {
        for identity in ["", "not-an-email", "a@", "@b.com", "a b@c.com"] {
            assert!(
                OtpSendRequest::new(identity).validate().is_err(),
                "{identity:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_verify_request_accepts_otp_alias() -> TestResult {
        let request: OtpVerifyRequest =
            serde_json::from_str(r#"{ "email": "a@b.com", "otp": "012345" }"#)?;

        assert_eq!(request.identity, "a@b.com");
        assert_eq!(request.code, "012345");
        assert_matches!(request.validate(), Ok(()));

        Ok(())
    }

    #[test]
    fn test_verify_request_requires_six_digits() {
        for code in ["", "12345", "1234567", "12a456", " 12345", "１２３４５６"] {
            assert!(
                OtpVerifyRequest::new("a@b.com", code).validate().is_err(),
                "{code:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_verify_request_missing_code_fails_to_parse() {
        let result = serde_json::from_str::<OtpVerifyRequest>(r#"{ "identity": "a@b.com" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_profile_response_omits_unknown_last_login() -> TestResult {
        let response = ProfileResponse {
            identity: "a@b.com".to_string(),
            last_login: None,
        };

        assert_eq!(
            serde_json::to_value(&response)?,
            serde_json::json!({ "identity": "a@b.com" })
        );

        Ok(())
    }
}
