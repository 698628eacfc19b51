//! Helpers for running isolated webserver instances
use crate::{
    app_state::{AppState, AppStateBuilder},
    router::setup_app_router,
    settings,
    setups::{
        memory::MemoryOtpStore,
        test::{TestSetup, TestVerificationCodeSender},
    },
    test_utils::route_builder::RouteBuilder,
    token::TokenService,
};
use anyhow::{anyhow, Result};
use axum::Router;
use chrono::Duration;
use http::{Method, StatusCode};
use otp_core::common::{MessageResponse, OtpSendRequest};

pub(crate) const TEST_SECRET: &str = "test-secret-that-is-long-enough-0123456789";

/// An isolated otp server with in-memory storage and a recording code sender
#[derive(Debug)]
pub(crate) struct TestContext {
    app: Router,
    app_state: AppState<TestSetup>,
}

impl TestContext {
    /// Create a new test context
    pub(crate) async fn new() -> Result<Self> {
        Self::new_with_state(|builder| builder).await
    }

    pub(crate) async fn new_with_state<F>(f: F) -> Result<Self>
    where
        F: FnOnce(AppStateBuilder<TestSetup>) -> AppStateBuilder<TestSetup>,
    {
        let builder = AppStateBuilder::default()
            .with_store(MemoryOtpStore::new())
            .with_verification_code_sender(TestVerificationCodeSender::default())
            .with_tokens(TokenService::new(
                TEST_SECRET,
                "otp-server",
                Duration::hours(1),
            )?)
            .with_cookie_settings(settings::Cookie {
                enabled: true,
                ..Default::default()
            });

        let app_state = f(builder).finalize()?;

        let app = setup_app_router(app_state.clone());

        Ok(Self { app, app_state })
    }

    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    pub(crate) fn store(&self) -> &MemoryOtpStore {
        &self.app_state.store
    }

    pub(crate) fn verification_code_sender(&self) -> &TestVerificationCodeSender {
        &self.app_state.verification_code_sender
    }

    pub(crate) fn app_state(&self) -> &AppState<TestSetup> {
        &self.app_state
    }

    /// Request a code for `identity` over HTTP and return what was "emailed".
    pub(crate) async fn request_code(&self, identity: &str) -> Result<String> {
        let (status, _) = RouteBuilder::new(self.app(), Method::POST, "/otp/send")
            .with_json_body(OtpSendRequest::new(identity))?
            .into_json_response::<MessageResponse>()
            .await?;

        if status != StatusCode::OK {
            return Err(anyhow!("Requesting a code failed with {status}"));
        }

        self.verification_code_sender()
            .last_code_for(identity)
            .ok_or_else(|| anyhow!("No code was sent to {identity}"))
    }
}
