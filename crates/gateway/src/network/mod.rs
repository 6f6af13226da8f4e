//! # 署名ネットワーク
//!
//! マルチパーティ署名ネットワークの抽象インターフェース。
//! HTTPアダプタ実装は `http` サブモジュールを参照。
//!
//! ## 利用順序
//! 1. `SigningNetwork::connect` で接続を確立する
//! 2. `NetworkConnection::issue_session` でセッション認証情報を発行させる
//! 3. `NetworkConnection::execute_signing_action` で署名アクションを実行する
//! 4. `NetworkConnection::disconnect` で接続を閉じる（成否に関わらず必ず呼ぶ）

pub mod http;

use std::sync::Arc;
use std::time::Duration;

use viewgate_crypto::CryptoError;
use viewgate_types::{AuthSig, ResourceAbilityRequest, SignatureResult, SigningSession};

use crate::error::GatewayError;
use crate::stage::within;

/// 署名ネットワークの認証チャレンジ。
///
/// ネットワークがセッション発行前に要求する情報。署名者はこれを受け取り、
/// 自身の鍵で署名した `AuthSig` を返す。
#[derive(Debug)]
pub struct AuthChallenge<'a> {
    pub network: &'a str,
    /// RFC 3339形式の有効期限
    pub expiration: &'a str,
    pub resource_ability_requests: &'a [ResourceAbilityRequest],
}

/// 認証チャレンジに署名する主体。
pub trait ChallengeSigner: Send + Sync {
    fn sign_challenge(&self, challenge: &AuthChallenge<'_>) -> Result<AuthSig, CryptoError>;
}

/// セッション発行パラメータ。
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub expiration: String,
    pub resource_ability_requests: Vec<ResourceAbilityRequest>,
}

/// 署名アクションのパラメータ。
#[derive(Debug, Clone)]
pub struct SigningAction {
    /// 0x付きhexのメッセージハッシュ
    pub to_sign: String,
    /// 署名に使う鍵の公開鍵
    pub public_key: String,
    /// 出力ラベル
    pub sig_name: String,
}

/// 署名ネットワークへの接続を確立する。
///
/// 実装は複数リクエストから並行に呼ばれても安全でなければならない。
#[async_trait::async_trait]
pub trait SigningNetwork: Send + Sync {
    async fn connect(&self, network: &str) -> Result<Box<dyn NetworkConnection>, GatewayError>;
}

/// 1リクエスト分の署名ネットワーク接続。
#[async_trait::async_trait]
pub trait NetworkConnection: Send + Sync {
    /// セッション認証情報を発行させる。失敗は `GatewayError::Broker`。
    async fn issue_session(
        &self,
        params: &SessionParams,
        signer: &dyn ChallengeSigner,
    ) -> Result<SigningSession, GatewayError>;

    /// 署名アクションを実行する。失敗は `GatewayError::Signing`。
    async fn execute_signing_action(
        &self,
        session: &SigningSession,
        action: &SigningAction,
    ) -> Result<SignatureResult, GatewayError>;

    /// 接続を閉じる。
    async fn disconnect(&self) -> Result<(), GatewayError>;
}

// ---------------------------------------------------------------------------
// 接続ガード
// ---------------------------------------------------------------------------

/// 確立済みの接続を保持し、必ず切断されるようにするガード。
///
/// 通常は `close` で切断する。`close` 前に破棄された場合
/// （クライアント切断でハンドラのfutureがdropされた場合など）は、
/// ランタイム上に切断タスクを起動する。
pub struct ConnectionGuard {
    connection: Arc<dyn NetworkConnection>,
    timeout: Duration,
    armed: bool,
}

impl ConnectionGuard {
    pub fn new(connection: Box<dyn NetworkConnection>, timeout: Duration) -> Self {
        Self {
            connection: Arc::from(connection),
            timeout,
            armed: true,
        }
    }

    pub fn connection(&self) -> &dyn NetworkConnection {
        self.connection.as_ref()
    }

    /// 接続を閉じる。
    pub async fn close(mut self) -> Result<(), GatewayError> {
        self.armed = false;
        disconnect_within(self.connection.clone(), self.timeout).await
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("ランタイム外で接続ガードが破棄されたため切断できません");
            return;
        };
        let connection = self.connection.clone();
        let timeout = self.timeout;
        tracing::warn!("処理途中で破棄された接続をバックグラウンドで切断します");
        runtime.spawn(async move {
            if let Err(e) = disconnect_within(connection, timeout).await {
                tracing::warn!(error = %e, "署名ネットワークからの切断に失敗");
            }
        });
    }
}

async fn disconnect_within(
    connection: Arc<dyn NetworkConnection>,
    timeout: Duration,
) -> Result<(), GatewayError> {
    within(timeout, connection.disconnect(), || {
        GatewayError::Broker("disconnect timed out".to_string())
    })
    .await
}
