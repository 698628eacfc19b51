//! Server setup for local development & easier integration testing

use anyhow::Result;
use async_trait::async_trait;

use super::{memory::MemoryOtpStore, ServerSetup, VerificationCodeSender};

/// Implementation of `ServerSetup` for local environments.
/// Keeps everything in memory and doesn't need a database or mail provider.
#[derive(Debug, Clone)]
pub struct LocalSetup;

impl ServerSetup for LocalSetup {
    type OtpStore = MemoryOtpStore;
    type VerificationCodeSender = LogCodeSender;
}

/// A `VerificationCodeSender` that doesn't actually send emails,
/// but instead logs them via tracing.
#[derive(Debug, Clone, Default)]
pub struct LogCodeSender;

#[async_trait]
impl VerificationCodeSender for LogCodeSender {
    async fn send_code(&self, email: &str, code: &str) -> Result<()> {
        tracing::info!(email, ?code, "verification code");
        Ok(())
    }
}
