//! The Axum Application State

use crate::{
    settings,
    setups::ServerSetup,
    token::TokenService,
};
use anyhow::{anyhow, Result};
use std::sync::Arc;

#[derive(Clone)]
/// Global application route state.
pub struct AppState<S: ServerSetup> {
    /// Where OTP sessions and profiles are kept
    pub store: S::OtpStore,
    /// The service that sends verification codes
    pub verification_code_sender: S::VerificationCodeSender,
    /// Issues and validates session tokens
    pub tokens: Arc<TokenService>,
    /// Code lifecycle settings
    pub otp_settings: Arc<settings::Otp>,
    /// Cookie transport settings
    pub cookie_settings: Arc<settings::Cookie>,
}

/// Builder for [`AppState`]
#[derive(Debug)]
pub struct AppStateBuilder<S: ServerSetup> {
    store: Option<S::OtpStore>,
    verification_code_sender: Option<S::VerificationCodeSender>,
    tokens: Option<TokenService>,
    otp_settings: settings::Otp,
    cookie_settings: settings::Cookie,
}

impl<S: ServerSetup> Default for AppStateBuilder<S> {
    fn default() -> Self {
        Self {
            store: None,
            verification_code_sender: None,
            tokens: None,
            otp_settings: Default::default(),
            cookie_settings: Default::default(),
        }
    }
}

impl<S: ServerSetup> AppStateBuilder<S> {
    /// Finalize the builder and return the [`AppState`]
    pub fn finalize(self) -> Result<AppState<S>> {
        let store = self.store.ok_or_else(|| anyhow!("store is required"))?;

        let verification_code_sender = self
            .verification_code_sender
            .ok_or_else(|| anyhow!("verification_code_sender is required"))?;

        let tokens = self
            .tokens
            .ok_or_else(|| anyhow!("token service is required"))?;

        Ok(AppState {
            store,
            verification_code_sender,
            tokens: Arc::new(tokens),
            otp_settings: Arc::new(self.otp_settings),
            cookie_settings: Arc::new(self.cookie_settings),
        })
    }

    /// Set the OTP store
    pub fn with_store(mut self, store: S::OtpStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the service that sends verification codes
    pub fn with_verification_code_sender(
        mut self,
        verification_code_sender: S::VerificationCodeSender,
    ) -> Self {
        self.verification_code_sender = Some(verification_code_sender);
        self
    }

    /// Set the token service
    pub fn with_tokens(mut self, tokens: TokenService) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Set the code lifecycle settings
    pub fn with_otp_settings(mut self, otp_settings: settings::Otp) -> Self {
        self.otp_settings = otp_settings;
        self
    }

    /// Set the cookie transport settings
    pub fn with_cookie_settings(mut self, cookie_settings: settings::Cookie) -> Self {
        self.cookie_settings = cookie_settings;
        self
    }
}

impl<S> std::fmt::Debug for AppState<S>
where
    S: ServerSetup,
    S::OtpStore: std::fmt::Debug,
    S::VerificationCodeSender: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("verification_code_sender", &self.verification_code_sender)
            .field("tokens", &self.tokens)
            .field("otp_settings", &self.otp_settings)
            .field("cookie_settings", &self.cookie_settings)
            .finish()
    }
}
