//! # セッション認証情報の取得
//!
//! 署名ネットワークに接続し、2つの権限だけにスコープされた短命のセッション認証情報を
//! 発行させる。
//!
//! 認証チャレンジにはプロセスが保持するEd25519鍵で応答する。
//! これは呼び出し元ではなくGatewayサーバー自身をネットワークに認証するためのもの。
//! セッションはリクエストごとに新規取得し、キャッシュしない。

use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use viewgate_crypto::{CryptoError, Ed25519SigningKey};
use viewgate_types::{AbilityResource, AuthSig, ResourceAbilityRequest, SigningSession};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::network::{
    AuthChallenge, ChallengeSigner, NetworkConnection, SessionParams, SigningNetwork,
};
use crate::stage::within;

pub const PKP_SIGNING_ABILITY: &str = "pkp-signing";
pub const ACTION_EXECUTION_ABILITY: &str = "lit-action-execution";

/// セッションに付与する権限: 任意の署名鍵の使用と、任意の署名アクションの実行。
pub fn ability_requests() -> Vec<ResourceAbilityRequest> {
    vec![
        ResourceAbilityRequest {
            resource: AbilityResource {
                resource_type: "pkp".to_string(),
                id: "*".to_string(),
            },
            ability: PKP_SIGNING_ABILITY.to_string(),
        },
        ResourceAbilityRequest {
            resource: AbilityResource {
                resource_type: "lit-action".to_string(),
                id: "*".to_string(),
            },
            ability: ACTION_EXECUTION_ABILITY.to_string(),
        },
    ]
}

/// `now + ttl` をRFC 3339形式で返す。
pub fn session_expiration(now: OffsetDateTime, ttl: Duration) -> Result<String, GatewayError> {
    let ttl = time::Duration::try_from(ttl)
        .map_err(|e| GatewayError::Internal(format!("session ttl out of range: {e}")))?;
    now.checked_add(ttl)
        .ok_or_else(|| GatewayError::Internal("session expiration overflow".to_string()))?
        .format(&Rfc3339)
        .map_err(|e| GatewayError::Internal(format!("failed to format expiration: {e}")))
}

/// Gatewayの認証鍵でチャレンジに応答する署名者。
///
/// 署名対象はチャレンジの内容ではなく、設定された固定の認証メッセージ。
pub struct IdentitySigner<'a> {
    key: &'a Ed25519SigningKey,
    auth_message: &'a str,
}

impl<'a> IdentitySigner<'a> {
    pub fn new(key: &'a Ed25519SigningKey, auth_message: &'a str) -> Self {
        Self { key, auth_message }
    }
}

impl ChallengeSigner for IdentitySigner<'_> {
    fn sign_challenge(&self, challenge: &AuthChallenge<'_>) -> Result<AuthSig, CryptoError> {
        tracing::debug!(
            network = challenge.network,
            expiration = challenge.expiration,
            abilities = challenge.resource_ability_requests.len(),
            "認証チャレンジに署名"
        );
        let signature = viewgate_crypto::ed25519_sign(self.key, self.auth_message.as_bytes());
        Ok(AuthSig {
            sig: hex::encode(signature.to_bytes()),
            derived_via: "ed25519".to_string(),
            signed_message: self.auth_message.to_string(),
            address: viewgate_crypto::identity_address(&self.key.verifying_key()),
        })
    }
}

/// 署名ネットワークに接続する。
pub async fn connect(
    network: &dyn SigningNetwork,
    config: &GatewayConfig,
) -> Result<Box<dyn NetworkConnection>, GatewayError> {
    let connection = within(config.stage_timeout, network.connect(&config.network), || {
        GatewayError::Broker("connect timed out".to_string())
    })
    .await?;
    tracing::info!(network = %config.network, "署名ネットワークに接続しました");
    Ok(connection)
}

/// 接続上でセッション認証情報を取得する。
pub async fn acquire_session(
    connection: &dyn NetworkConnection,
    config: &GatewayConfig,
) -> Result<SigningSession, GatewayError> {
    let params = SessionParams {
        expiration: session_expiration(OffsetDateTime::now_utc(), config.session_ttl)?,
        resource_ability_requests: ability_requests(),
    };
    let signer = IdentitySigner::new(&config.identity_key, &config.auth_message);

    let session = within(
        config.stage_timeout,
        connection.issue_session(&params, &signer),
        || GatewayError::Broker("session issuance timed out".to_string()),
    )
    .await?;

    tracing::info!(
        expiration = %session.expiration,
        credentials = session.session_sigs.len(),
        "セッション認証情報を取得しました"
    );
    Ok(session)
}
