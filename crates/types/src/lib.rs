//! # viewgate 共有型定義
//!
//! Gatewayの公開API、メトリクスプロバイダ、署名ネットワークとの間で
//! やり取りされるデータ構造をRust構造体として提供する。
//!
//! ## 命名規則
//! - 公開API・署名ネットワーク: camelCase
//! - メトリクスプロバイダ: プロバイダのネイティブ形式（camelCase、数値は10進文字列）

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// POST /verify (公開API)
// ---------------------------------------------------------------------------

/// POST /verify リクエスト。
///
/// 両フィールドとも必須だが、欠落をJSONパースエラーではなく
/// バリデーションエラーとして扱うため `Option` で受ける。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyRequest {
    /// 動画プラットフォームアカウントのBearerトークン
    #[serde(alias = "accessToken", skip_serializing_if = "Option::is_none")]
    pub access_credential: Option<String>,
    /// 署名ネットワーク上の署名鍵（公開鍵）識別子
    #[serde(alias = "pkpPublicKey", skip_serializing_if = "Option::is_none")]
    pub signing_key_id: Option<String>,
}

impl VerifyRequest {
    /// 必須フィールドが揃っていれば `(access_credential, signing_key_id)` を返す。
    /// 空文字列は欠落と同じ扱い。
    pub fn required_fields(&self) -> Option<(&str, &str)> {
        let credential = self.access_credential.as_deref().filter(|s| !s.is_empty())?;
        let key_id = self.signing_key_id.as_deref().filter(|s| !s.is_empty())?;
        Some((credential, key_id))
    }
}

/// POST /verify の成功レスポンス（署名済み・拒否のいずれか）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerifyResponse {
    /// 閾値を満たし、署名アクションが実行された
    Signed {
        /// 常に `true`
        success: bool,
        /// 署名ネットワークが返した署名結果
        #[serde(flatten)]
        result: SignatureResult,
    },
    /// 閾値未満で拒否された（エラーではない）
    Denied {
        /// 常に `false`
        success: bool,
        /// 拒否理由
        message: String,
    },
}

impl VerifyResponse {
    pub fn signed(result: SignatureResult) -> Self {
        Self::Signed {
            success: true,
            result,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::Denied {
            success: false,
            message: message.into(),
        }
    }
}

/// エラーレスポンスの本文。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ---------------------------------------------------------------------------
// ノード情報
// ---------------------------------------------------------------------------

/// /.well-known/viewgate-node-info レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// 署名ネットワーク認証に使うEd25519公開鍵（hex）
    pub identity_address: String,
    /// 接続先の署名ネットワーク名
    pub network: String,
    /// 再生回数の閾値
    pub view_threshold: u64,
    /// 署名対象メッセージ（ポリシー値）
    pub signing_message: String,
}

// ---------------------------------------------------------------------------
// メトリクスプロバイダ (GET /channels?part=snippet,statistics&mine=true)
// ---------------------------------------------------------------------------

/// チャンネル一覧レスポンス。`items` が欠落・空の場合はアカウントなし。
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Option<Vec<ChannelItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelItem {
    pub snippet: ChannelSnippet,
    pub statistics: ChannelStatistics,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSnippet {
    pub title: String,
}

/// チャンネル統計。プロバイダは件数を10進文字列で返すが、数値も受け付ける。
///
/// `viewCount` は必須。登録者数は `hiddenSubscriberCount` が真のとき省略されるため、
/// `subscriberCount` と `videoCount` は欠落を許す。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    #[serde(default, deserialize_with = "de_opt_count")]
    pub subscriber_count: Option<u64>,
    #[serde(deserialize_with = "de_count")]
    pub view_count: u64,
    #[serde(default, deserialize_with = "de_opt_count")]
    pub video_count: Option<u64>,
    #[serde(default)]
    pub hidden_subscriber_count: bool,
}

/// 10進文字列またはJSON整数の件数をu64としてデシリアライズする。
fn de_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid count {s:?}: {e}"))),
    }
}

/// 省略可能な件数。値が存在する場合は `de_count` と同じ規則で検証する。
fn de_opt_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    de_count(deserializer).map(Some)
}

/// 正規化済みのアカウント指標。リクエストごとに一度だけ構築され、以後不変。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// チャンネル名
    pub display_name: String,
    /// 登録者数（非公開の場合は `None`）
    pub subscriber_count: Option<u64>,
    /// 総再生回数（ポリシー判定に使用）
    pub view_count: u64,
    /// 動画本数
    pub content_count: Option<u64>,
}

impl From<ChannelItem> for MetricRecord {
    fn from(item: ChannelItem) -> Self {
        Self {
            display_name: item.snippet.title,
            subscriber_count: item.statistics.subscriber_count,
            view_count: item.statistics.view_count,
            content_count: item.statistics.video_count,
        }
    }
}

// ---------------------------------------------------------------------------
// 署名ネットワーク
// ---------------------------------------------------------------------------

/// POST /connect リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub network: String,
}

/// POST /connect レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub connection_id: String,
}

/// POST /disconnect リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
    pub connection_id: String,
}

/// 権限付与対象のリソース。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityResource {
    /// リソース種別 ("pkp" / "lit-action")
    #[serde(rename = "type")]
    pub resource_type: String,
    /// リソースID（"*" でワイルドカード）
    pub id: String,
}

/// セッション認証情報に含める権限付与要求。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAbilityRequest {
    pub resource: AbilityResource,
    pub ability: String,
}

/// 認証チャレンジに対するサーバー署名。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSig {
    /// hexエンコードされた署名
    pub sig: String,
    /// 署名方式 ("ed25519")
    pub derived_via: String,
    /// 署名したメッセージ
    pub signed_message: String,
    /// 署名者の公開鍵（hex）
    pub address: String,
}

/// POST /session リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub connection_id: String,
    pub network: String,
    /// RFC 3339形式の有効期限
    pub expiration: String,
    pub resource_ability_requests: Vec<ResourceAbilityRequest>,
    pub auth_sig: AuthSig,
}

/// セッション認証情報の集合。ノードごとの署名付きトークンを保持する。
pub type SessionSigs = BTreeMap<String, serde_json::Value>;

/// POST /session レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_sigs: SessionSigs,
    pub expiration: String,
}

/// 1リクエスト分の短命なセッション認証情報。
///
/// 永続化・再利用・レスポンスへの埋め込みは一切行わない。
/// `Debug` 出力ではトークン本体を伏せる。
#[derive(Clone)]
pub struct SigningSession {
    pub session_sigs: SessionSigs,
    pub expiration: String,
}

impl std::fmt::Debug for SigningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSession")
            .field("session_sigs", &format_args!("<{} redacted>", self.session_sigs.len()))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// POST /execute リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub connection_id: String,
    pub session_sigs: SessionSigs,
    /// 0x付きhexのメッセージハッシュ
    pub to_sign: String,
    /// 署名に使う鍵の公開鍵
    pub public_key: String,
    /// 結果の `signatures` マップに使う出力ラベル
    pub sig_name: String,
}

/// 署名ネットワークが返す1つの署名。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureShare {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recid: Option<u8>,
    /// 合成済み署名
    pub signature: String,
    /// 署名した鍵の公開鍵
    pub public_key: String,
    /// 署名対象データ
    pub data_signed: String,
}

/// 署名アクションの実行結果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureResult {
    /// 出力ラベル → 署名
    pub signatures: BTreeMap<String, SignatureShare>,
    /// 署名アクションの戻り値
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// 署名アクションのログ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}
