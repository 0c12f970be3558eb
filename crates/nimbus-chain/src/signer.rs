//! Unsigned transaction documents and the signing collaborator.
//!
//! Key material never enters this crate's arithmetic: a [`TxBroadcaster`]
//! signs a [`SignDoc`] and submits it, returning the chain's verdict.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use nimbus_core::config::Identity;
use nimbus_core::error::{ExternalError, NimbusError};
use nimbus_core::types::{Attribute, Coin, TxResult};
use nimbus_core::Rational;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Raw log fragment the chain returns when the signed sequence is stale.
pub const SEQUENCE_MISMATCH_LOG: &str = "account sequence mismatch";

/// Wasm module messages in the Terra `wasm` module shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WasmMsg {
    StoreCode {
        sender: String,
        /// Base64 of the wasm bytecode.
        wasm_byte_code: String,
    },
    InstantiateContract {
        sender: String,
        admin: String,
        code_id: u64,
        init_msg: Value,
        init_coins: Vec<Coin>,
    },
    ExecuteContract {
        sender: String,
        contract: String,
        execute_msg: Value,
        coins: Vec<Coin>,
    },
}

impl WasmMsg {
    pub fn store_code(sender: &str, wasm: &[u8]) -> Self {
        Self::StoreCode {
            sender: sender.to_string(),
            wasm_byte_code: base64::engine::general_purpose::STANDARD.encode(wasm),
        }
    }

    pub fn instantiate(sender: &str, code_id: u64, init_msg: &Value) -> Self {
        Self::InstantiateContract {
            sender: sender.to_string(),
            admin: sender.to_string(),
            code_id,
            init_msg: init_msg.clone(),
            init_coins: Vec::new(),
        }
    }

    pub fn execute(sender: &str, contract: &str, msg: &Value, funds: &[Coin]) -> Self {
        Self::ExecuteContract {
            sender: sender.to_string(),
            contract: contract.to_string(),
            execute_msg: msg.clone(),
            coins: funds.to_vec(),
        }
    }
}

/// Everything a signer needs to produce a transaction.
///
/// Fee estimation is left to the signer; it receives the gas prices it may
/// pay in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SignDoc {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub msgs: Vec<WasmMsg>,
    pub gas_prices: BTreeMap<String, Rational>,
    #[serde(default)]
    pub memo: String,
}

/// Broadcast response in the LCD `/txs` shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct BroadcastResult {
    pub txhash: String,
    pub height: u64,
    /// Zero on success.
    pub code: u32,
    pub raw_log: String,
    pub attributes: Vec<Attribute>,
}

/// JSON integer that may be encoded as a string.
pub(crate) fn number(v: &Value) -> Option<u64> {
    match v {
        Value::String(s) => s.parse().ok(),
        other => other.as_u64(),
    }
}

impl BroadcastResult {
    /// Parse an LCD broadcast body, flattening all event attributes.
    pub fn from_lcd(body: &Value) -> Result<Self, ExternalError> {
        let txhash = body
            .get("txhash")
            .and_then(Value::as_str)
            .ok_or_else(|| ExternalError::Decode("broadcast response has no txhash".into()))?
            .to_string();
        let height = body.get("height").and_then(number).unwrap_or(0);
        let code = body
            .get("code")
            .and_then(number)
            .map(|c| c as u32)
            .unwrap_or(0);
        let raw_log = body
            .get("raw_log")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut attributes = Vec::new();
        let logs = body.get("logs").and_then(Value::as_array);
        for log in logs.into_iter().flatten() {
            let events = log.get("events").and_then(Value::as_array);
            for event in events.into_iter().flatten() {
                let attrs = event.get("attributes").and_then(Value::as_array);
                for a in attrs.into_iter().flatten() {
                    if let Ok(attr) = serde_json::from_value::<Attribute>(a.clone()) {
                        attributes.push(attr);
                    }
                }
            }
        }

        Ok(Self {
            txhash,
            height,
            code,
            raw_log,
            attributes,
        })
    }

    /// Confirmed transaction, or the rejection the chain reported.
    pub fn into_tx_result(self) -> Result<TxResult, NimbusError> {
        if self.code == 0 {
            return Ok(TxResult {
                txhash: self.txhash,
                height: self.height,
                attributes: self.attributes,
            });
        }
        if self.raw_log.contains(SEQUENCE_MISMATCH_LOG) {
            return Err(ExternalError::SequenceMismatch(self.raw_log).into());
        }
        Err(NimbusError::Rejected {
            code: self.code,
            log: self.raw_log,
        })
    }
}

/// Signs and submits transactions for one account.
#[async_trait]
pub trait TxBroadcaster: Send + Sync {
    /// Bech32 address of the signing account.
    fn address(&self) -> &str;

    async fn broadcast(&self, doc: &SignDoc) -> Result<BroadcastResult, NimbusError>;
}

pub(crate) fn http_error(e: reqwest::Error) -> ExternalError {
    if e.is_timeout() {
        ExternalError::Timeout
    } else if e.is_decode() {
        ExternalError::Decode(e.to_string())
    } else {
        ExternalError::Transport(e.to_string())
    }
}

/// [`TxBroadcaster`] backed by a signer sidecar at `SIGNER_URL`.
///
/// The sidecar exposes `POST /address` and `POST /sign_and_broadcast`, both
/// taking the key reference; the latter answers in the LCD `/txs` shape.
pub struct SignerRelay {
    client: Client,
    url: String,
    key: Value,
    address: String,
}

impl SignerRelay {
    /// Resolve the account address of `identity` through the sidecar.
    pub async fn connect(url: &str, identity: &Identity) -> Result<Self, NimbusError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(http_error)?;
        let key = match identity {
            Identity::Mnemonic(m) => json!({ "mnemonic": m }),
            Identity::KeyFile(path) => json!({ "key_file": path }),
        };
        let url = url.trim_end_matches('/').to_string();
        let resp: Value = client
            .post(format!("{url}/address"))
            .json(&json!({ "key": key }))
            .send()
            .await
            .map_err(http_error)?
            .error_for_status()
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;
        let address = resp
            .get("address")
            .and_then(Value::as_str)
            .ok_or_else(|| ExternalError::Decode("signer returned no address".into()))?
            .to_string();
        Ok(Self {
            client,
            url,
            key,
            address,
        })
    }
}

impl std::fmt::Debug for SignerRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerRelay")
            .field("url", &self.url)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TxBroadcaster for SignerRelay {
    fn address(&self) -> &str {
        &self.address
    }

    async fn broadcast(&self, doc: &SignDoc) -> Result<BroadcastResult, NimbusError> {
        let resp = self
            .client
            .post(format!("{}/sign_and_broadcast", self.url))
            .json(&json!({ "key": self.key, "sign_doc": doc }))
            .send()
            .await
            .map_err(http_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExternalError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        let body: Value = resp.json().await.map_err(http_error)?;
        Ok(BroadcastResult::from_lcd(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_code_is_base64() {
        let msg = WasmMsg::store_code("terra1me", b"\0asm");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["store_code"]["wasm_byte_code"], "AGFzbQ==");
        assert_eq!(v["store_code"]["sender"], "terra1me");
    }

    #[test]
    fn execute_envelope_carries_coins() {
        let funds = [Coin {
            denom: "uluna".into(),
            amount: 5,
        }];
        let msg = WasmMsg::execute("terra1me", "terra1c", &json!({"decommission": {}}), &funds);
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["execute_contract"]["coins"][0]["amount"], "5");
        assert_eq!(v["execute_contract"]["execute_msg"], json!({"decommission": {}}));
    }

    #[test]
    fn parse_successful_broadcast() {
        let body = json!({
            "height": "4421",
            "txhash": "AB12",
            "raw_log": "[]",
            "logs": [{
                "events": [
                    {"type": "message", "attributes": [{"key": "sender", "value": "terra1me"}]},
                    {"type": "instantiate_contract", "attributes": [
                        {"key": "contract_address", "value": "terra1new"}
                    ]}
                ]
            }]
        });
        let tx = BroadcastResult::from_lcd(&body).unwrap().into_tx_result().unwrap();
        assert_eq!(tx.height, 4421);
        assert_eq!(tx.attribute("contract_address"), Some("terra1new"));
        assert_eq!(tx.attributes.len(), 2);
    }

    #[test]
    fn nonzero_code_is_rejected() {
        let body = json!({"txhash": "AB", "height": "0", "code": 5, "raw_log": "insufficient funds"});
        let err = BroadcastResult::from_lcd(&body)
            .unwrap()
            .into_tx_result()
            .unwrap_err();
        assert_eq!(
            err,
            NimbusError::Rejected {
                code: 5,
                log: "insufficient funds".into()
            }
        );
    }

    #[test]
    fn sequence_mismatch_is_transient() {
        let body = json!({
            "txhash": "AB",
            "code": 32,
            "raw_log": "account sequence mismatch, expected 7, got 6: incorrect account sequence"
        });
        let err = BroadcastResult::from_lcd(&body)
            .unwrap()
            .into_tx_result()
            .unwrap_err();
        assert!(matches!(
            err,
            NimbusError::External(ExternalError::SequenceMismatch(_))
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn missing_txhash_is_decode_error() {
        let err = BroadcastResult::from_lcd(&json!({"code": 0})).unwrap_err();
        assert!(matches!(err, ExternalError::Decode(_)));
    }
}
