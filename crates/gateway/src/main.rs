//! # viewgate Gateway
//!
//! チャンネルの再生回数で署名をゲートするHTTPサーバー。
//!
//! ## 役割
//! - メトリクスプロバイダ（YouTube Data API互換）から呼び出し元のチャンネル統計を取得
//! - 再生回数が閾値以上の場合のみ、署名ネットワークで固定メッセージに署名
//! - 署名ネットワークのセッションはリクエストごとに新規取得し、終了時に切断
//!
//! ## API エンドポイント
//! - `POST /verify` — 再生回数の判定 + 署名
//! - `GET /.well-known/viewgate-node-info` — ノード情報公開
//! - `GET /health` — 死活監視

mod broker;
mod config;
mod endpoints;
mod error;
mod metrics;
mod network;
mod policy;
mod signing;
mod stage;

use std::sync::Arc;

use axum::http::{header, Method};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use config::{GatewayConfig, GatewayState};
use endpoints::{handle_health, handle_node_info, handle_verify};

/// ルーティングとCORSを構成したRouterを返す。
fn build_router(state: Arc<GatewayState>) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.allowed_origin.clone())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    axum::Router::new()
        .route("/verify", axum::routing::post(handle_verify))
        .route(
            "/.well-known/viewgate-node-info",
            axum::routing::get(handle_node_info),
        )
        .route("/health", axum::routing::get(handle_health))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        identity_address = %viewgate_crypto::identity_address(&config.verifying_key()),
        view_threshold = config.view_threshold,
        network = %config.network,
        network_url = %config.network_url,
        "Gateway設定を読み込みました"
    );

    let addr = config.listen_addr();
    let state = Arc::new(GatewayState::new(config)?);
    let app = build_router(state);

    tracing::info!("Gatewayを {} で起動します", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
