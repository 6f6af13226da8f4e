//! # メトリクス取得
//!
//! 呼び出し元のBearerトークンで動画プラットフォームの
//! `GET /channels?part=snippet,statistics&mine=true` を1回だけ呼び出し、
//! 先頭のチャンネルを `MetricRecord` に正規化する。
//!
//! トークンはログインフローごとに使い捨てのため、リトライはしない。

use viewgate_types::{ChannelListResponse, MetricRecord};

use crate::error::{truncate_detail, GatewayError};

/// メトリクスプロバイダの抽象インターフェース。
#[async_trait::async_trait]
pub trait MetricsProvider: Send + Sync {
    /// 認証済みアカウントのチャンネル情報と統計を取得する。
    async fn fetch_channel(&self, access_credential: &str) -> Result<MetricRecord, GatewayError>;
}

/// HTTP経由のメトリクスプロバイダ実装。
pub struct HttpMetricsProvider {
    http_client: reqwest::Client,
    /// 例: "https://www.googleapis.com/youtube/v3"
    base_url: String,
}

impl HttpMetricsProvider {
    pub fn new(http_client: reqwest::Client, base_url: String) -> Self {
        Self {
            http_client,
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl MetricsProvider for HttpMetricsProvider {
    async fn fetch_channel(&self, access_credential: &str) -> Result<MetricRecord, GatewayError> {
        let url = format!(
            "{}/channels?part=snippet,statistics&mine=true",
            self.base_url
        );
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_credential)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Upstream(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(GatewayError::Upstream(format!(
                "provider returned HTTP {status} - {}",
                truncate_detail(&body)
            )));
        }

        parse_channel_list(&body)
    }
}

/// チャンネル一覧レスポンスを厳密にパースし、先頭要素を返す。
pub(crate) fn parse_channel_list(body: &str) -> Result<MetricRecord, GatewayError> {
    let list: ChannelListResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::Upstream(format!("unexpected response shape: {e}")))?;

    list.items
        .and_then(|items| items.into_iter().next())
        .map(MetricRecord::from)
        .ok_or(GatewayError::ChannelNotFound)
}
