/*
 * Responsibility
 * - Config読み込み → AuthPipeline 生成 → Router 組み立て
 * - Middleware の適用 (http / auth)
 * - axum::serve() で起動、停止時に pipeline.close()
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppEnv, Config};
use crate::services::auth::AuthPipeline;
use crate::state::AppState;
use crate::{api, middleware};

// RUST_LOG wins; otherwise development also shows this crate's cache and
// resolver decisions.
fn init_tracing(app_env: AppEnv) {
    let fallback = if app_env.is_production() {
        "info,tower_http=info"
    } else {
        "info,identity_gate=debug,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(!app_env.is_production()))
        .init();
}

// Development aborts so a panicking handler is noticed; production logs and
// keeps serving.
fn init_panic_hook(app_env: AppEnv) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string payload>");
        tracing::error!(%location, payload, "panic");

        if app_env.is_production() {
            default_hook(info);
        } else {
            process::abort();
        }
    }))
}

pub async fn run() -> Result<()> {
    // APP_ENV may come from .env, and logging is needed before full config.
    dotenvy::dotenv().ok();
    let app_env = AppEnv::from_env();
    init_tracing(app_env);
    let config = Config::from_env()?;
    init_panic_hook(config.app_env);

    tracing::info!(
        env = ?config.app_env,
        addr = %config.addr,
        identity_url = %config.identity_url,
        required_scopes = ?config.required_scopes,
        "starting identity gate"
    );

    let pipeline = Arc::new(
        AuthPipeline::from_config(&config.auth_config()).context("building auth pipeline")?,
    );
    let state = AppState::new(pipeline.clone());
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Runs on both clean and failed shutdown: no expiry task may outlive the server.
    pipeline.close();
    served?;
    Ok(())
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(&state))
        .with_state(state);

    middleware::http::apply(router, config.request_timeout())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
