//! # Gateway エラー型
//!
//! 全ステージの失敗をこの型に集約し、単一のエラーレスポンスへ写像する。
//! 閾値未満による拒否はエラーではないため、ここには含まれない。

use axum::http::StatusCode;
use axum::Json;
use viewgate_types::ErrorBody;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 不正なリクエスト（必須フィールドの欠落など）。外部呼び出しは行われていない。
    #[error("{0}")]
    Validation(String),
    /// メトリクスプロバイダがアカウントを返さなかった
    #[error("Error fetching channel info: No channel found")]
    ChannelNotFound,
    /// メトリクスプロバイダへの到達失敗・エラー応答・形式不一致
    #[error("Error fetching channel info: {0}")]
    Upstream(String),
    /// 署名ネットワークへの接続・認証・セッション発行の失敗
    #[error("Signing network session failed: {0}")]
    Broker(String),
    /// 署名アクションの実行失敗
    #[error("Signing action failed: {0}")]
    Signing(String),
    /// 内部エラー
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::ChannelNotFound
            | GatewayError::Upstream(_)
            | GatewayError::Broker(_)
            | GatewayError::Signing(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// エラーメッセージに含める外部レスポンス本文の最大文字数
pub const MAX_ERROR_DETAIL_CHARS: usize = 512;

/// 外部レスポンス本文をエラーメッセージ用に切り詰める。
pub fn truncate_detail(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(MAX_ERROR_DETAIL_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}... ({} bytes total)", body.len())
    } else {
        head
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let error = match &self {
            GatewayError::Validation(msg) => msg.clone(),
            other => format!("Failed to execute signing action: {other}"),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}
