//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//! 設定は起動時に一度だけ構築され、以後は読み取り専用で各コンポーネントに渡される。

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use viewgate_crypto::{Ed25519SigningKey, Ed25519VerifyingKey};

use crate::metrics::{HttpMetricsProvider, MetricsProvider};
use crate::network::http::HttpSigningNetwork;
use crate::network::SigningNetwork;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_NETWORK: &str = "datil-dev";
pub const DEFAULT_NETWORK_URL: &str = "http://localhost:7470";
pub const DEFAULT_METRICS_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_SIGNING_MESSAGE: &str = "Hello World";
pub const DEFAULT_AUTH_MESSAGE: &str = "0xHelloWorld";
/// セッション認証情報の有効期間（24時間）
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60 * 24;
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 30;

/// 起動時の設定エラー。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 環境変数の値が不正
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
    /// HTTPクライアントの構築に失敗
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Gatewayの設定。
pub struct GatewayConfig {
    /// 署名ネットワークへのサーバー認証に使うEd25519秘密鍵。
    /// 呼び出し元が指定する署名鍵（signing_key_id）とは別物。
    pub identity_key: Ed25519SigningKey,
    /// 署名に進むための最小再生回数
    pub view_threshold: u64,
    pub bind_addr: IpAddr,
    pub port: u16,
    /// 署名ネットワーク名
    pub network: String,
    /// 署名ネットワークHTTPアダプタのベースURL
    pub network_url: String,
    /// メトリクスプロバイダのベースURL
    pub metrics_api_base: String,
    /// CORSで許可するオリジン
    pub allowed_origin: HeaderValue,
    /// 署名ネットワークに署名させるメッセージ（ポリシー値）
    pub signing_message: String,
    /// 署名ネットワーク認証チャレンジで署名するメッセージ
    pub auth_message: String,
    pub session_ttl: Duration,
    /// 外部呼び出し1段あたりのタイムアウト
    pub stage_timeout: Duration,
}

impl GatewayConfig {
    /// プロセス環境変数から構築する。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の変数ルックアップから構築する。
    ///
    /// 数値・鍵・オリジンのパースに失敗した場合は黙って既定値に戻さず、起動を失敗させる。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let identity_key = match lookup("SIGNING_IDENTITY_KEY") {
            Some(key_hex) => viewgate_crypto::signing_key_from_hex(&key_hex).map_err(|e| {
                ConfigError::Invalid {
                    var: "SIGNING_IDENTITY_KEY",
                    reason: e.to_string(),
                }
            })?,
            None => {
                // 開発環境用: ランダムキーを生成
                tracing::warn!(
                    "SIGNING_IDENTITY_KEYが未設定です。ランダムキーを生成します（開発環境用）"
                );
                Ed25519SigningKey::generate(&mut rand::rngs::OsRng)
            }
        };

        let allowed_origin_raw =
            string_or(&lookup, "ALLOWED_ORIGIN", DEFAULT_ALLOWED_ORIGIN);
        let allowed_origin =
            HeaderValue::from_str(&allowed_origin_raw).map_err(|e| ConfigError::Invalid {
                var: "ALLOWED_ORIGIN",
                reason: e.to_string(),
            })?;

        Ok(Self {
            identity_key,
            view_threshold: parse_or(&lookup, "VIEW_THRESHOLD", 0)?,
            bind_addr: parse_or(&lookup, "BIND_ADDR", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            network: string_or(&lookup, "SIGNING_NETWORK", DEFAULT_NETWORK),
            network_url: trim_base(string_or(&lookup, "SIGNING_NETWORK_URL", DEFAULT_NETWORK_URL)),
            metrics_api_base: trim_base(string_or(
                &lookup,
                "METRICS_API_BASE",
                DEFAULT_METRICS_API_BASE,
            )),
            allowed_origin,
            signing_message: string_or(&lookup, "SIGNING_MESSAGE", DEFAULT_SIGNING_MESSAGE),
            auth_message: string_or(&lookup, "AUTH_MESSAGE", DEFAULT_AUTH_MESSAGE),
            session_ttl: nonzero_secs(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            stage_timeout: nonzero_secs(&lookup, "STAGE_TIMEOUT_SECS", DEFAULT_STAGE_TIMEOUT_SECS)?,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn verifying_key(&self) -> Ed25519VerifyingKey {
        self.identity_key.verifying_key()
    }
}

fn string_or<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                var: name,
                reason: format!("{raw:?}: {e}"),
            })
        }
        _ => Ok(default),
    }
}

/// 秒数を読み込む。0は全ての処理を即座に失敗させるため拒否する。
fn nonzero_secs<F>(lookup: &F, name: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, name, default)? {
        0 => Err(ConfigError::Invalid {
            var: name,
            reason: "must be greater than 0".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Gatewayの共有状態。起動後は読み取り専用。
pub struct GatewayState {
    pub config: GatewayConfig,
    /// メトリクスプロバイダ（トレイトで抽象化）
    pub metrics: Box<dyn MetricsProvider>,
    /// 署名ネットワーク（トレイトで抽象化）
    pub network: Box<dyn SigningNetwork>,
}

impl GatewayState {
    /// 設定からHTTP実装の外部コラボレータを組み立てる。
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.stage_timeout)
            .build()?;

        let metrics = HttpMetricsProvider::new(http_client.clone(), config.metrics_api_base.clone());
        let network = HttpSigningNetwork::new(http_client, config.network_url.clone());

        Ok(Self {
            config,
            metrics: Box::new(metrics),
            network: Box::new(network),
        })
    }
}
