//! # リクエスト処理ステージ
//!
//! 1リクエストの状態遷移:
//!
//! ```text
//! Idle → MetricFetched → {Denied | SessionAcquired} → Signed → Done
//! ```
//!
//! 終端以外のどのステージからも失敗で `Done` に遷移する。
//! ステージはログのコンテキストにのみ使い、リクエストを跨いで保持しない。

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    MetricFetched,
    Denied,
    SessionAcquired,
    Signed,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::MetricFetched => "metric_fetched",
            Stage::Denied => "denied",
            Stage::SessionAcquired => "session_acquired",
            Stage::Signed => "signed",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// 外部呼び出し1段をタイムアウト付きで実行する。
/// 期限切れの場合は `on_timeout` が返すエラーで失敗させる。
pub async fn within<T, F, E>(limit: Duration, fut: F, on_timeout: E) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
    E: FnOnce() -> GatewayError,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
