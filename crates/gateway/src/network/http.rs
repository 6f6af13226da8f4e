//! # 署名ネットワーク HTTPアダプタ
//!
//! 署名ネットワークのノード群の前段に置かれたHTTP JSONアダプタと通信する実装。
//!
//! ## エンドポイント
//! - `POST /connect` — `{network}` → `{connectionId}`
//! - `POST /session` — `SessionRequest` → `SessionResponse`
//! - `POST /execute` — `ExecuteRequest` → `SignatureResult`
//! - `POST /disconnect` — `{connectionId}`

use serde::de::DeserializeOwned;
use serde::Serialize;
use viewgate_types::{
    ConnectRequest, ConnectResponse, DisconnectRequest, ExecuteRequest, SessionRequest,
    SessionResponse, SignatureResult, SigningSession,
};

use super::{
    AuthChallenge, ChallengeSigner, NetworkConnection, SessionParams, SigningAction,
    SigningNetwork,
};
use crate::error::{truncate_detail, GatewayError};

/// HTTPアダプタ経由の署名ネットワーク。`reqwest::Client` は並行利用可能。
pub struct HttpSigningNetwork {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpSigningNetwork {
    pub fn new(http_client: reqwest::Client, base_url: String) -> Self {
        Self {
            http_client,
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl SigningNetwork for HttpSigningNetwork {
    async fn connect(&self, network: &str) -> Result<Box<dyn NetworkConnection>, GatewayError> {
        let response: ConnectResponse = post_json(
            &self.http_client,
            &format!("{}/connect", self.base_url),
            &ConnectRequest {
                network: network.to_string(),
            },
            GatewayError::Broker,
        )
        .await?;

        Ok(Box::new(HttpNetworkConnection {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            network: network.to_string(),
            connection_id: response.connection_id,
        }))
    }
}

/// HTTPアダプタ上の1接続。
pub struct HttpNetworkConnection {
    http_client: reqwest::Client,
    base_url: String,
    network: String,
    connection_id: String,
}

#[async_trait::async_trait]
impl NetworkConnection for HttpNetworkConnection {
    async fn issue_session(
        &self,
        params: &SessionParams,
        signer: &dyn ChallengeSigner,
    ) -> Result<SigningSession, GatewayError> {
        let challenge = AuthChallenge {
            network: &self.network,
            expiration: &params.expiration,
            resource_ability_requests: &params.resource_ability_requests,
        };
        let auth_sig = signer
            .sign_challenge(&challenge)
            .map_err(|e| GatewayError::Broker(format!("challenge signing failed: {e}")))?;

        let request = SessionRequest {
            connection_id: self.connection_id.clone(),
            network: self.network.clone(),
            expiration: params.expiration.clone(),
            resource_ability_requests: params.resource_ability_requests.clone(),
            auth_sig,
        };
        let response: SessionResponse = post_json(
            &self.http_client,
            &format!("{}/session", self.base_url),
            &request,
            GatewayError::Broker,
        )
        .await?;

        if response.session_sigs.is_empty() {
            return Err(GatewayError::Broker(
                "network issued no session credentials".to_string(),
            ));
        }

        Ok(SigningSession {
            session_sigs: response.session_sigs,
            expiration: response.expiration,
        })
    }

    async fn execute_signing_action(
        &self,
        session: &SigningSession,
        action: &SigningAction,
    ) -> Result<SignatureResult, GatewayError> {
        let request = ExecuteRequest {
            connection_id: self.connection_id.clone(),
            session_sigs: session.session_sigs.clone(),
            to_sign: action.to_sign.clone(),
            public_key: action.public_key.clone(),
            sig_name: action.sig_name.clone(),
        };
        post_json(
            &self.http_client,
            &format!("{}/execute", self.base_url),
            &request,
            GatewayError::Signing,
        )
        .await
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        let response = self
            .http_client
            .post(format!("{}/disconnect", self.base_url))
            .json(&DisconnectRequest {
                connection_id: self.connection_id.clone(),
            })
            .send()
            .await
            .map_err(|e| GatewayError::Broker(format!("disconnect failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GatewayError::Broker(format!(
                "disconnect returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// JSONをPOSTし、2xxならレスポンスを `Resp` としてパースする。
/// 失敗時は `err` でステージ固有のエラーに包む。
async fn post_json<Req, Resp>(
    http_client: &reqwest::Client,
    url: &str,
    body: &Req,
    err: fn(String) -> GatewayError,
) -> Result<Resp, GatewayError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = http_client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| err(format!("HTTP request to {url} failed: {e}")))?;

    let status = response.status();
    let response_body = response
        .text()
        .await
        .map_err(|e| err(format!("failed to read response from {url}: {e}")))?;

    if !status.is_success() {
        return Err(err(format!(
            "network returned HTTP {status} - {}",
            truncate_detail(&response_body)
        )));
    }

    serde_json::from_str(&response_body)
        .map_err(|e| err(format!("unexpected response shape from {url}: {e}")))
}
