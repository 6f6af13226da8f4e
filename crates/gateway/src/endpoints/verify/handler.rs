//! /verify ハンドラ実装

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::Instrument;
use viewgate_types::{SignatureResult, VerifyRequest, VerifyResponse};

use crate::broker;
use crate::config::GatewayState;
use crate::error::GatewayError;
use crate::network::ConnectionGuard;
use crate::policy::{self, PolicyDecision};
use crate::signing;
use crate::stage::{within, Stage};

use super::MISSING_FIELDS_MESSAGE;

/// POST /verify エンドポイントハンドラ。
///
/// ボディがJSONとして読めない場合も、フィールド欠落と同じバリデーションエラーとして扱う。
pub async fn handle_verify(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, GatewayError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("verify", %request_id);
    process(&state, payload).instrument(span).await.map(Json)
}

async fn process(
    state: &GatewayState,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<VerifyResponse, GatewayError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::error!(error = %rejection, "リクエストボディのパースに失敗");
            return Err(GatewayError::Validation(MISSING_FIELDS_MESSAGE.to_string()));
        }
    };
    let Some((access_credential, signing_key_id)) = request.required_fields() else {
        tracing::error!("accessCredentialまたはsigningKeyIdが欠落しています");
        return Err(GatewayError::Validation(MISSING_FIELDS_MESSAGE.to_string()));
    };

    let mut stage = Stage::Idle;
    let result = run(state, access_credential, signing_key_id, &mut stage).await;
    match &result {
        Ok(_) => tracing::info!(stage = %Stage::Done, from = %stage, "リクエスト処理完了"),
        Err(e) => tracing::error!(stage = %stage, error = %e, "リクエスト処理に失敗"),
    }
    result
}

/// 取得 → 判定 → (通過時のみ) セッション取得 → 署名 を順に実行する。
/// `stage` には最後に到達したステージが残る。
async fn run(
    state: &GatewayState,
    access_credential: &str,
    signing_key_id: &str,
    stage: &mut Stage,
) -> Result<VerifyResponse, GatewayError> {
    let config = &state.config;

    tracing::info!(credential_len = access_credential.len(), "チャンネル情報を取得中");
    let record = within(
        config.stage_timeout,
        state.metrics.fetch_channel(access_credential),
        || GatewayError::Upstream("metrics request timed out".to_string()),
    )
    .await?;
    *stage = Stage::MetricFetched;
    tracing::info!(
        channel = %record.display_name,
        subscribers = ?record.subscriber_count,
        views = record.view_count,
        videos = ?record.content_count,
        "チャンネル情報を取得しました"
    );

    let decision = policy::admit(record.view_count, config.view_threshold);
    tracing::info!(admitted = decision.is_admitted(), "ポリシー判定が完了");
    if let PolicyDecision::Denied { reason } = decision {
        *stage = Stage::Denied;
        tracing::info!(threshold = config.view_threshold, "再生回数が閾値未満のため拒否");
        return Ok(VerifyResponse::denied(reason));
    }

    tracing::info!("閾値を満たしました。署名に進みます");
    let result = sign_with_fresh_session(state, signing_key_id, stage).await?;
    Ok(VerifyResponse::signed(result))
}

/// 新しい接続とセッションで署名アクションを1回実行する。
///
/// 接続確立後は、成功・失敗に関わらず必ずdisconnectしてから戻る。
/// disconnectの失敗は署名結果を無効にしないため、警告ログのみ。
/// このfutureが途中で破棄された場合は `ConnectionGuard` が切断する。
async fn sign_with_fresh_session(
    state: &GatewayState,
    signing_key_id: &str,
    stage: &mut Stage,
) -> Result<SignatureResult, GatewayError> {
    let config = &state.config;
    let connection = broker::connect(state.network.as_ref(), config).await?;
    let guard = ConnectionGuard::new(connection, config.stage_timeout);

    let outcome = async {
        let session = broker::acquire_session(guard.connection(), config).await?;
        *stage = Stage::SessionAcquired;

        let result =
            signing::execute_signing(guard.connection(), &session, signing_key_id, config)
                .await?;
        *stage = Stage::Signed;
        Ok::<_, GatewayError>(result)
    }
    .await;

    if let Err(e) = guard.close().await {
        tracing::warn!(error = %e, "署名ネットワークからの切断に失敗");
    }

    outcome
}
