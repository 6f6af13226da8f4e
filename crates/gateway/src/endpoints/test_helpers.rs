//! # エンドポイントテスト用共通ヘルパー
//!
//! 外部コラボレータのモックを2種類提供する。
//! - メモリ内のトレイト実装（呼び出し回数を記録）
//! - `127.0.0.1:0` で起動する使い捨てのaxumサーバー（HTTPアダプタ用）

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Json;
use viewgate_types::{
    ExecuteRequest, MetricRecord, SessionRequest, SessionSigs, SignatureResult, SignatureShare,
    SigningSession,
};

use crate::config::{GatewayConfig, GatewayState};
use crate::error::GatewayError;
use crate::metrics::MetricsProvider;
use crate::network::{
    AuthChallenge, ChallengeSigner, NetworkConnection, SessionParams, SigningAction,
    SigningNetwork,
};

/// テスト用のGateway認証鍵（固定値）
pub const TEST_IDENTITY_KEY: [u8; 32] = [0x42; 32];

/// テスト用モックHTTPサーバーを起動し、ポート番号を返す。
pub async fn start_mock_server(app: axum::Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

/// 閾値を指定したテスト用設定。
pub fn test_config(threshold: u64) -> GatewayConfig {
    test_config_with(threshold, "http://127.0.0.1:1", "http://127.0.0.1:1")
}

/// 外部URLも指定したテスト用設定。
pub fn test_config_with(threshold: u64, metrics_base: &str, network_url: &str) -> GatewayConfig {
    let key_hex = hex::encode(TEST_IDENTITY_KEY);
    let threshold = threshold.to_string();
    let metrics_base = metrics_base.to_string();
    let network_url = network_url.to_string();
    GatewayConfig::from_lookup(move |name| match name {
        "SIGNING_IDENTITY_KEY" => Some(key_hex.clone()),
        "VIEW_THRESHOLD" => Some(threshold.clone()),
        "METRICS_API_BASE" => Some(metrics_base.clone()),
        "SIGNING_NETWORK_URL" => Some(network_url.clone()),
        "STAGE_TIMEOUT_SECS" => Some("5".to_string()),
        _ => None,
    })
    .unwrap()
}

/// モックを差し込んだGatewayStateを構築する。
pub fn test_state(
    config: GatewayConfig,
    metrics: MockMetrics,
    network: MockNetwork,
) -> Arc<GatewayState> {
    Arc::new(GatewayState {
        config,
        metrics: Box::new(metrics),
        network: Box::new(network),
    })
}

// ---------------------------------------------------------------------------
// メモリ内モック: メトリクス
// ---------------------------------------------------------------------------

pub enum MetricsBehavior {
    Record(MetricRecord),
    NotFound,
    Upstream(String),
    Hang,
}

/// メモリ内のメトリクスプロバイダ。
pub struct MockMetrics {
    behavior: MetricsBehavior,
    pub calls: Arc<AtomicUsize>,
}

impl MockMetrics {
    pub fn new(behavior: MetricsBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn views(view_count: u64) -> Self {
        Self::new(MetricsBehavior::Record(MetricRecord {
            display_name: "test channel".to_string(),
            subscriber_count: Some(10),
            view_count,
            content_count: Some(3),
        }))
    }
}

#[async_trait::async_trait]
impl MetricsProvider for MockMetrics {
    async fn fetch_channel(&self, _access_credential: &str) -> Result<MetricRecord, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MetricsBehavior::Record(record) => Ok(record.clone()),
            MetricsBehavior::NotFound => Err(GatewayError::ChannelNotFound),
            MetricsBehavior::Upstream(msg) => Err(GatewayError::Upstream(msg.clone())),
            MetricsBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GatewayError::Upstream("unreachable".to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// メモリ内モック: 署名ネットワーク
// ---------------------------------------------------------------------------

/// 署名ネットワークへの呼び出し回数。
#[derive(Default)]
pub struct NetworkCalls {
    pub connects: AtomicUsize,
    pub sessions: AtomicUsize,
    pub executes: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl NetworkCalls {
    pub fn total_signing_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
            + self.sessions.load(Ordering::SeqCst)
            + self.executes.load(Ordering::SeqCst)
    }
}

/// メモリ内の署名ネットワーク。各段の失敗を注入できる。
#[derive(Default)]
pub struct MockNetwork {
    pub fail_connect: bool,
    pub fail_session: bool,
    pub fail_execute: bool,
    /// 署名アクションが応答しない
    pub hang_execute: bool,
    /// 要求と異なる出力ラベルで結果を返す
    pub wrong_sig_name: bool,
    pub fail_disconnect: bool,
    pub calls: Arc<NetworkCalls>,
    /// 発行したセッショントークン（発行順）
    pub issued: Arc<std::sync::Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl SigningNetwork for MockNetwork {
    async fn connect(&self, _network: &str) -> Result<Box<dyn NetworkConnection>, GatewayError> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(GatewayError::Broker("connection refused".to_string()));
        }
        Ok(Box::new(MockConnection {
            fail_session: self.fail_session,
            fail_execute: self.fail_execute,
            hang_execute: self.hang_execute,
            wrong_sig_name: self.wrong_sig_name,
            fail_disconnect: self.fail_disconnect,
            calls: self.calls.clone(),
            issued: self.issued.clone(),
        }))
    }
}

struct MockConnection {
    fail_session: bool,
    fail_execute: bool,
    hang_execute: bool,
    wrong_sig_name: bool,
    fail_disconnect: bool,
    calls: Arc<NetworkCalls>,
    issued: Arc<std::sync::Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl NetworkConnection for MockConnection {
    async fn issue_session(
        &self,
        params: &SessionParams,
        signer: &dyn ChallengeSigner,
    ) -> Result<SigningSession, GatewayError> {
        let n = self.calls.sessions.fetch_add(1, Ordering::SeqCst);
        if self.fail_session {
            return Err(GatewayError::Broker("session rejected".to_string()));
        }
        let challenge = AuthChallenge {
            network: "datil-dev",
            expiration: &params.expiration,
            resource_ability_requests: &params.resource_ability_requests,
        };
        signer
            .sign_challenge(&challenge)
            .map_err(|e| GatewayError::Broker(e.to_string()))?;

        let token = format!("session-token-{n}");
        self.issued.lock().unwrap().push(token.clone());
        let mut session_sigs = SessionSigs::new();
        session_sigs.insert("node-1".to_string(), serde_json::json!({ "sig": token }));
        Ok(SigningSession {
            session_sigs,
            expiration: params.expiration.clone(),
        })
    }

    async fn execute_signing_action(
        &self,
        _session: &SigningSession,
        action: &SigningAction,
    ) -> Result<SignatureResult, GatewayError> {
        let n = self.calls.executes.fetch_add(1, Ordering::SeqCst);
        if self.fail_execute {
            return Err(GatewayError::Signing("action threw".to_string()));
        }
        if self.hang_execute {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let sig_name = if self.wrong_sig_name {
            "other".to_string()
        } else {
            action.sig_name.clone()
        };
        Ok(signature_result(&sig_name, &action.public_key, &action.to_sign, n))
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        self.calls.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(GatewayError::Broker("disconnect failed".to_string()));
        }
        Ok(())
    }
}

/// ダミーの署名結果。`nonce` ごとに異なる署名値を持つ。
pub fn signature_result(
    sig_name: &str,
    public_key: &str,
    to_sign: &str,
    nonce: usize,
) -> SignatureResult {
    let mut signatures = BTreeMap::new();
    signatures.insert(
        sig_name.to_string(),
        SignatureShare {
            r: Some(format!("0x{nonce:064x}")),
            s: Some(format!("0x{:064x}", nonce + 1)),
            recid: Some(0),
            signature: format!("0x{nonce:0128x}"),
            public_key: public_key.to_string(),
            data_signed: to_sign.to_string(),
        },
    );
    SignatureResult {
        signatures,
        response: None,
        logs: Some(String::new()),
    }
}

// ---------------------------------------------------------------------------
// HTTPモック: 署名ネットワーク / メトリクスプロバイダ
// ---------------------------------------------------------------------------

#[derive(Default, Clone, Copy)]
pub struct MockNetworkOptions {
    pub reject_session: bool,
    pub fail_execute: bool,
}

/// 署名ネットワークHTTPアダプタのモックを起動する。
///
/// /session ではauthSigのEd25519署名を実際に検証し、不正なら401を返す。
pub async fn start_mock_network(options: MockNetworkOptions) -> (u16, Arc<NetworkCalls>) {
    use axum::routing::post;

    let calls = Arc::new(NetworkCalls::default());

    let c = calls.clone();
    let connect = post(move |Json(body): Json<serde_json::Value>| {
        let c = c.clone();
        async move {
            assert!(body.get("network").is_some());
            let n = c.connects.fetch_add(1, Ordering::SeqCst);
            Json(serde_json::json!({ "connectionId": format!("conn-{n}") }))
        }
    });

    let c = calls.clone();
    let session = post(move |Json(body): Json<SessionRequest>| {
        let c = c.clone();
        async move {
            let n = c.sessions.fetch_add(1, Ordering::SeqCst);
            if options.reject_session {
                return json_response(StatusCode::FORBIDDEN, "session rejected".to_string());
            }
            if !auth_sig_is_valid(&body) {
                return json_response(StatusCode::UNAUTHORIZED, "invalid authSig".to_string());
            }
            let payload = serde_json::json!({
                "sessionSigs": { "node-1": { "sig": format!("session-{n}"), "conn": body.connection_id } },
                "expiration": body.expiration,
            });
            json_response(StatusCode::OK, payload.to_string())
        }
    });

    let c = calls.clone();
    let execute = post(move |Json(body): Json<ExecuteRequest>| {
        let c = c.clone();
        async move {
            let n = c.executes.fetch_add(1, Ordering::SeqCst);
            if body.session_sigs.is_empty() {
                return json_response(StatusCode::UNAUTHORIZED, "missing session".to_string());
            }
            if options.fail_execute {
                return json_response(StatusCode::INTERNAL_SERVER_ERROR, "action threw".to_string());
            }
            let result = signature_result(&body.sig_name, &body.public_key, &body.to_sign, n);
            json_response(StatusCode::OK, serde_json::to_string(&result).unwrap())
        }
    });

    let c = calls.clone();
    let disconnect = post(move || {
        let c = c.clone();
        async move {
            c.disconnects.fetch_add(1, Ordering::SeqCst);
            StatusCode::NO_CONTENT
        }
    });

    let app = axum::Router::new()
        .route("/connect", connect)
        .route("/session", session)
        .route("/execute", execute)
        .route("/disconnect", disconnect);

    (start_mock_server(app).await, calls)
}

/// JSON文字列を指定ステータスのレスポンスにする。
fn json_response(status: StatusCode, body: String) -> axum::response::Response {
    use axum::response::IntoResponse;
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

fn auth_sig_is_valid(request: &SessionRequest) -> bool {
    let Ok(address) = hex::decode(&request.auth_sig.address) else {
        return false;
    };
    let Ok(address): Result<[u8; 32], _> = address.try_into() else {
        return false;
    };
    let Ok(verifying_key) = viewgate_crypto::Ed25519VerifyingKey::from_bytes(&address) else {
        return false;
    };
    let Ok(signature) = viewgate_crypto::signature_from_hex(&request.auth_sig.sig) else {
        return false;
    };
    viewgate_crypto::ed25519_verify(
        &verifying_key,
        request.auth_sig.signed_message.as_bytes(),
        &signature,
    )
    .is_ok()
}

/// メトリクスプロバイダのモックを起動する。`items` をそのまま返す。
pub async fn start_mock_metrics(items: serde_json::Value) -> (u16, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let app = axum::Router::new().route(
        "/channels",
        axum::routing::get(move || {
            let c = c.clone();
            let items = items.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Json(serde_json::json!({ "items": items }))
            }
        }),
    );
    (start_mock_server(app).await, calls)
}

/// 指定した再生回数を持つチャンネル1件のitems。
pub fn channel_items(view_count: &str) -> serde_json::Value {
    serde_json::json!([{
        "snippet": { "title": "test channel" },
        "statistics": {
            "subscriberCount": "10",
            "viewCount": view_count,
            "videoCount": "3"
        }
    }])
}
