//! Sign-and-submit client for an operator-run rippled node.
//!
//! Each submission opens its own websocket, sends `submit` with the
//! transaction JSON and the operator secret, then polls `tx` until the
//! transaction appears in a validated ledger. The whole exchange is bounded
//! by [`RippledConfig::submit_timeout`].

use crate::transactions::{purchase_tx, trust_set_tx, xrp_spent_from_meta};
use crate::{
    LedgerClient, LedgerError, LedgerResult, OperatorAccount, PurchaseRequest, SubmitReceipt,
    TrustSetRequest,
};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Settings for [`RippledSubmitClient`].
#[derive(Debug, Clone)]
pub struct RippledConfig {
    /// Websocket of a node that accepts sign-and-submit. The node receives
    /// the operator seed, so it must run on the operator's machine.
    pub url: String,
    /// Bound on one submission, from connect to validation.
    pub submit_timeout: Duration,
    /// Delay between `tx` lookups.
    pub poll_interval: Duration,
    /// Highest fee multiplier the node may apply when auto-filling the fee.
    pub fee_mult_max: u32,
}

impl Default for RippledConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:6006".to_string(),
            submit_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            fee_mult_max: 1000,
        }
    }
}

/// Production [`LedgerClient`].
pub struct RippledSubmitClient {
    config: RippledConfig,
}

impl RippledSubmitClient {
    pub fn new(config: RippledConfig) -> Self {
        Self { config }
    }

    async fn submit(&self, operator: &OperatorAccount, tx_json: Value) -> LedgerResult<SubmitReceipt> {
        let kind = tx_json["TransactionType"].as_str().unwrap_or("?").to_string();
        match timeout(self.config.submit_timeout, self.submit_and_confirm(operator, tx_json)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(kind = %kind, timeout = ?self.config.submit_timeout, "Submission timed out");
                Err(LedgerError::Timeout(self.config.submit_timeout))
            }
        }
    }

    async fn submit_and_confirm(
        &self,
        operator: &OperatorAccount,
        tx_json: Value,
    ) -> LedgerResult<SubmitReceipt> {
        let (mut socket, _) = connect_async(self.config.url.as_str()).await?;

        let submitted = request(
            &mut socket,
            json!({
                "command": "submit",
                "tx_json": tx_json,
                "secret": operator.credential().expose(),
                "fee_mult_max": self.config.fee_mult_max,
            }),
        )
        .await?;

        let engine_result = submitted["engine_result"].as_str().unwrap_or_default();
        let hash = submitted["tx_json"]["hash"]
            .as_str()
            .ok_or_else(|| LedgerError::Protocol("submit response without hash".to_string()))?
            .to_string();

        if !is_provisionally_accepted(engine_result) {
            return Err(LedgerError::Rejected {
                code: engine_result.to_string(),
                message: submitted["engine_result_message"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        debug!(tx_hash = %hash, engine_result, "Submitted, awaiting validation");

        loop {
            sleep(self.config.poll_interval).await;
            let found = match request(
                &mut socket,
                json!({ "command": "tx", "transaction": hash }),
            )
            .await
            {
                Ok(found) => found,
                Err(LedgerError::Rejected { code, .. }) if code == "txnNotFound" => continue,
                Err(e) => return Err(e),
            };

            if found["validated"].as_bool() != Some(true) {
                continue;
            }

            let meta = &found["meta"];
            let outcome = meta["TransactionResult"].as_str().unwrap_or_default();
            if outcome != "tesSUCCESS" {
                return Err(LedgerError::Rejected {
                    code: outcome.to_string(),
                    message: "transaction failed in a validated ledger".to_string(),
                });
            }

            let _ = socket.close(None).await;
            info!(tx_hash = %hash, "Transaction validated");
            return Ok(SubmitReceipt {
                tx_hash: hash,
                xrp_cost: xrp_spent_from_meta(meta, &operator.address),
            });
        }
    }
}

/// Preliminary results after which the transaction may still succeed.
fn is_provisionally_accepted(engine_result: &str) -> bool {
    engine_result == "tesSUCCESS" || engine_result.starts_with("ter")
}

/// Send one command and return its `result`, skipping unrelated traffic.
async fn request(socket: &mut Socket, mut command: Value) -> LedgerResult<Value> {
    let id = uuid::Uuid::new_v4().to_string();
    command["id"] = Value::String(id.clone());
    socket
        .send(Message::Text(serde_json::to_string(&command)?.into()))
        .await?;

    while let Some(message) = socket.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let response: Value = serde_json::from_str(text.as_str())?;
        if response["id"].as_str() != Some(id.as_str()) {
            continue;
        }
        if response["status"] == "success" {
            return Ok(response["result"].clone());
        }
        return Err(LedgerError::Rejected {
            code: response["error"].as_str().unwrap_or("unknown").to_string(),
            message: response["error_message"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        });
    }

    Err(LedgerError::Connection(
        "node closed the connection mid-request".to_string(),
    ))
}

#[async_trait]
impl LedgerClient for RippledSubmitClient {
    async fn submit_trust_set(
        &self,
        operator: &OperatorAccount,
        request: &TrustSetRequest,
    ) -> LedgerResult<SubmitReceipt> {
        self.submit(operator, trust_set_tx(&operator.address, request))
            .await
    }

    async fn submit_purchase(
        &self,
        operator: &OperatorAccount,
        request: &PurchaseRequest,
    ) -> LedgerResult<SubmitReceipt> {
        self.submit(operator, purchase_tx(&operator.address, request)?)
            .await
    }
}
