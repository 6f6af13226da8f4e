//! # 署名アクションの実行
//!
//! ポリシーで決められたメッセージ（呼び出し元の入力ではない）をハッシュし、
//! 呼び出し元が指定した署名鍵で署名ネットワークに署名させる。

use viewgate_types::{SignatureResult, SigningSession};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::network::{NetworkConnection, SigningAction};
use crate::stage::within;

/// 署名結果の出力ラベル
pub const SIG_NAME: &str = "sig";

/// 署名アクションを1回実行し、要求した出力ラベルの署名を含む結果を返す。
pub async fn execute_signing(
    connection: &dyn NetworkConnection,
    session: &SigningSession,
    signing_key_id: &str,
    config: &GatewayConfig,
) -> Result<SignatureResult, GatewayError> {
    let action = SigningAction {
        to_sign: viewgate_crypto::hash_message(&config.signing_message),
        public_key: signing_key_id.to_string(),
        sig_name: SIG_NAME.to_string(),
    };

    let result = within(
        config.stage_timeout,
        connection.execute_signing_action(session, &action),
        || GatewayError::Signing("signing action timed out".to_string()),
    )
    .await?;

    if !result.signatures.contains_key(SIG_NAME) {
        return Err(GatewayError::Signing(format!(
            "network result has no signature named {SIG_NAME:?}"
        )));
    }

    tracing::info!(to_sign = %action.to_sign, "署名アクションを実行しました");
    Ok(result)
}
