//! Serve command - HTTP cron trigger and Telegram webhook

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use feedwatch_domain::{
    DeliveryTarget,
    usecases::{OnboardOutcome, OnboardUseCase},
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::args::ServeArgs;
use crate::commands::run::{Delivery, Engine, build_engine};
use crate::config::AppConfig;

pub(crate) struct AppState {
    engine: Engine,
    // Held for the whole run so overlapping triggers queue up
    run_lock: Mutex<()>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            run_lock: Mutex::new(()),
        }
    }
}

pub async fn execute(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    let engine = build_engine(&config, Delivery::from_flags(&config, args.dry_run, None)).await?;
    let app = router(Arc::new(AppState::new(engine)));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    tracing::info!(bind = %bind, "feedwatch server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("feedwatch server stopped");
    Ok(())
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/cron", get(cron))
        .route("/api/telegram", post(telegram_webhook))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

async fn cron(State(state): State<Arc<AppState>>) -> Response {
    let _guard = state.run_lock.lock().await;

    match state.engine.coordinator.run_once().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Triggered run failed");
            let body = serde_json::json!({ "success": false, "error": e.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// The subset of a Telegram update the webhook reads
#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: TelegramChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    Json(update): Json<TelegramUpdate>,
) -> Response {
    let Some(message) = update.message else {
        return Json(serde_json::json!({ "ok": true })).into_response();
    };
    let Some(text) = message.text else {
        return Json(serde_json::json!({ "ok": true })).into_response();
    };

    let chat = DeliveryTarget::new(message.chat.id.to_string());
    let usecase = OnboardUseCase::new(state.engine.store.as_ref(), state.engine.channel.as_ref());

    match usecase.handle(&chat, &text).await {
        Ok(outcome) => {
            if outcome == OnboardOutcome::Ignored {
                tracing::debug!(delivery_target = %chat, "Ignored webhook message");
            }
            Json(serde_json::json!({ "ok": true })).into_response()
        }
        Err(e) => {
            tracing::error!(delivery_target = %chat, error = %e, "Failed to link chat");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
