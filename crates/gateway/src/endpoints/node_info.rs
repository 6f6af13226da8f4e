//! # GET /.well-known/viewgate-node-info
//!
//! ノード情報公開エンドポイント。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use viewgate_types::NodeInfo;

use crate::config::GatewayState;

/// GET /.well-known/viewgate-node-info — ノード情報公開。
///
/// 署名ネットワークに対してどの鍵で認証しているか、どのポリシーを適用しているかを返す。
/// 秘密情報は含めない。
pub async fn handle_node_info(State(state): State<Arc<GatewayState>>) -> Json<NodeInfo> {
    let config = &state.config;
    Json(NodeInfo {
        identity_address: viewgate_crypto::identity_address(&config.verifying_key()),
        network: config.network.clone(),
        view_threshold: config.view_threshold,
        signing_message: config.signing_message.clone(),
    })
}
