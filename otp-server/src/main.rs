//! otp-server

use anyhow::{Context, Result};
use axum::{headers::HeaderName, Router};
use axum_server::Handle;
use clap::Parser;
use http::header;
use otp_server::{
    app_state::{AppState, AppStateBuilder},
    db,
    docs::ApiDoc,
    middleware::{request_ulid::MakeRequestUlid, runtime},
    otp,
    router,
    settings::{AppEnvironment, Settings},
    setups::{
        local::{LocalSetup, LogCodeSender},
        memory::MemoryOtpStore,
        prod::{EmailVerificationCodeSender, PgOtpStore, ProdSetup},
        ServerSetup,
    },
    token::TokenService,
};
use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    process::exit,
    time::Duration,
};
use tokio::signal::{
    self,
    unix::{signal, SignalKind},
};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, sensitive_headers::SetSensitiveHeadersLayer,
    timeout::TimeoutLayer, trace::TraceLayer, ServiceBuilderExt,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Request identifier field.
const REQUEST_ID: &str = "x-request-id";

/// Email one-time passcode authentication server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the settings file
    #[arg(long, env = "OTP_SERVER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (stdout_writer, _stdout_guard) = tracing_appender::non_blocking(io::stdout());

    let settings = Settings::load(cli.config)?;

    setup_tracing(stdout_writer, settings.server.environment);

    info!(
        subject = "app_settings",
        category = "init",
        "starting with settings: {:?}",
        settings,
    );

    let tokens = TokenService::from_settings(&settings.token)?;
    let cancellation_token = CancellationToken::new();

    let app = match settings.server.environment {
        AppEnvironment::Local => {
            let app_state = AppStateBuilder::<LocalSetup>::default()
                .with_store(MemoryOtpStore::new())
                .with_verification_code_sender(LogCodeSender)
                .with_tokens(tokens)
                .with_otp_settings(settings.otp.clone())
                .with_cookie_settings(settings.cookie.clone())
                .finalize()?;

            tokio::spawn(serve_app(
                settings.clone(),
                app_state,
                cancellation_token.clone(),
            ))
        }
        _ => {
            db::migrations::run(&settings.database.url)
                .await
                .context("Running database migrations")?;

            let db_pool = db::pool(&settings.database.url, settings.database.connect_timeout)
                .await
                .context("Connecting to the database")?;

            let app_state = AppStateBuilder::<ProdSetup>::default()
                .with_store(PgOtpStore::new(db_pool))
                .with_verification_code_sender(EmailVerificationCodeSender::new(
                    settings.mailgun.clone(),
                    settings.otp.code_ttl(),
                ))
                .with_tokens(tokens)
                .with_otp_settings(settings.otp.clone())
                .with_cookie_settings(settings.cookie.clone())
                .finalize()?;

            tokio::spawn(serve_app(
                settings.clone(),
                app_state,
                cancellation_token.clone(),
            ))
        }
    };

    tokio::spawn(async move {
        capture_sigterm().await;

        cancellation_token.cancel();
        println!("\nCtrl+C received, shutting down. Press Ctrl+C again to force shutdown.");

        capture_sigterm().await;

        exit(130)
    });

    if let Err(e) = app.await? {
        tracing::error!("app server crashed: {:?}", e);
    }

    Ok(())
}

async fn serve_app<S: ServerSetup>(
    settings: Settings,
    app_state: AppState<S>,
    token: CancellationToken,
) -> Result<()> {
    let req_id = HeaderName::from_static(REQUEST_ID);

    let cleanup = tokio::spawn(otp::run_cleanup(
        app_state.store.clone(),
        settings.otp.clone(),
        token.clone(),
    ));

    let router = router::setup_app_router(app_state)
        .layer(TraceLayer::new_for_http())
        // Set and propagate "x-request-id" (as a ulid) per request.
        .layer(
            ServiceBuilder::new()
                .set_request_id(req_id.clone(), MakeRequestUlid)
                .propagate_request_id(req_id),
        )
        // Applies the `tower_http::timeout::Timeout` middleware which
        // applies a timeout to requests.
        .layer(TimeoutLayer::new(Duration::from_millis(
            settings.server.timeout_ms,
        )))
        // Catches runtime panics and converts them into
        // `500 Internal Server` responses.
        .layer(CatchPanicLayer::custom(runtime::catch_panic))
        // Mark headers as sensitive on both requests and responses.
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
            header::SET_COOKIE,
        ]))
        .layer(router::cors_layer(&settings.server.cors_origins))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    let server = serve("Application", router, settings.server.port).await?;

    token.cancelled().await;
    server.graceful_shutdown(Some(Duration::from_secs(10)));
    cleanup.await?;

    Ok(())
}

async fn serve(name: &str, app: Router, port: u16) -> Result<Handle> {
    let bind_addr: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    info!(
        subject = "app_start",
        category = "init",
        "{} server listening on {}",
        name,
        bind_addr
    );

    let handle = Handle::new();

    tokio::spawn({
        let handle = handle.clone();
        async move {
            if let Err(err) = axum_server::bind(bind_addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
            {
                tracing::error!(?err, "server stopped with error");
            }
        }
    });

    handle
        .listening()
        .await
        .context("Server failed to bind to its port")?;

    Ok(handle)
}

/// Captures and waits for system signals.
async fn capture_sigterm() {
    #[cfg(unix)]
    let term = async {
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                tracing::warn!(?err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = signal::ctrl_c() => {},
        _ = term => {}
    };
}

/// Setup [tracing][tracing] layers for logging: human readable locally,
/// JSON everywhere else.
fn setup_tracing(writer: tracing_appender::non_blocking::NonBlocking, env: AppEnvironment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("otp_server=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);

    match env {
        AppEnvironment::Local => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_target(true),
            )
            .init(),
        _ => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_current_span(true),
            )
            .init(),
    }
}
