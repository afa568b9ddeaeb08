//! Endpoint HTTP keep-alive para hosts que esperan un puerto abierto.

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tracing::info;

pub const SERVICE_NAME: &str = "discord-trigger-bot";

pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}

pub async fn serve(port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("🌐 Servidor keep-alive escuchando en {}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}

async fn index() -> Json<Value> {
    Json(json!({ "ok": true, "service": SERVICE_NAME }))
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
