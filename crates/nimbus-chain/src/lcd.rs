//! [`BlockchainClient`] over the Terra LCD REST API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use nimbus_core::config::NimbusConfig;
use nimbus_core::error::{ExternalError, NimbusError};
use nimbus_core::traits::BlockchainClient;
use nimbus_core::types::{Coin, TxResult};
use nimbus_core::Rational;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::sequence::{AccountInfo, AccountSequence};
use crate::signer::{SignDoc, TxBroadcaster, WasmMsg, http_error, number};

/// LCD-backed chain client for one signing account.
pub struct LcdClient<B> {
    client: Client,
    base_url: String,
    chain_id: String,
    gas_prices: BTreeMap<String, Rational>,
    broadcaster: B,
    sequence: AccountSequence,
}

impl<B: TxBroadcaster> LcdClient<B> {
    pub fn new(config: &NimbusConfig, broadcaster: B) -> Result<Self, NimbusError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(http_error)?;
        Ok(Self {
            client,
            base_url: config.lcd_url.trim_end_matches('/').to_string(),
            chain_id: config.chain_id.clone(),
            gas_prices: config.chain_gas_prices.clone(),
            broadcaster,
            sequence: AccountSequence::new(),
        })
    }

    pub fn address(&self) -> &str {
        self.broadcaster.address()
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ExternalError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .send()
            .await
            .map_err(http_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExternalError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json().await.map_err(http_error)
    }

    /// Account number and sequence as the chain currently sees them.
    pub async fn account(&self, address: &str) -> Result<AccountInfo, NimbusError> {
        let body = self.get(&format!("/auth/accounts/{address}"), &[]).await?;
        Ok(parse_account(&body)?)
    }

    async fn submit(&self, msg: WasmMsg) -> Result<TxResult, NimbusError> {
        let this = self;
        let msg = &msg;
        let address = self.address();
        self.sequence
            .run(
                move || this.account(address),
                move |acct| {
                    let doc = SignDoc {
                        chain_id: this.chain_id.clone(),
                        account_number: acct.account_number,
                        sequence: acct.sequence,
                        msgs: vec![msg.clone()],
                        gas_prices: this.gas_prices.clone(),
                        memo: String::new(),
                    };
                    async move {
                        debug!(sequence = doc.sequence, "broadcasting");
                        this.broadcaster.broadcast(&doc).await?.into_tx_result()
                    }
                },
            )
            .await
    }
}

/// `result` of a `/wasm/contracts/{addr}/store` response.
pub fn parse_contract_query(body: Value) -> Result<Value, ExternalError> {
    match body {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or_else(|| ExternalError::Decode("query response has no result".into())),
        _ => Err(ExternalError::Decode("query response is not an object".into())),
    }
}

/// Height from a `/blocks/latest` response.
pub fn parse_block_height(body: &Value) -> Result<u64, ExternalError> {
    body.pointer("/block/header/height")
        .and_then(number)
        .ok_or_else(|| ExternalError::Decode("block has no header height".into()))
}

/// Account info from an `/auth/accounts/{addr}` response.
///
/// Accounts that never transacted have no sequence yet and read as zero.
pub fn parse_account(body: &Value) -> Result<AccountInfo, ExternalError> {
    let value = body
        .pointer("/result/value")
        .ok_or_else(|| ExternalError::Decode("account response has no value".into()))?;
    Ok(AccountInfo {
        account_number: value.get("account_number").and_then(number).unwrap_or(0),
        sequence: value.get("sequence").and_then(number).unwrap_or(0),
    })
}

fn required_attr(tx: &TxResult, key: &str) -> Result<String, NimbusError> {
    tx.attribute(key)
        .map(str::to_string)
        .ok_or_else(|| ExternalError::Decode(format!("tx {} emitted no {key}", tx.txhash)).into())
}

#[async_trait]
impl<B: TxBroadcaster> BlockchainClient for LcdClient<B> {
    async fn upload_code(&self, wasm: &[u8]) -> Result<u64, NimbusError> {
        let tx = self.submit(WasmMsg::store_code(self.address(), wasm)).await?;
        let raw = required_attr(&tx, "code_id")?;
        let code_id = raw
            .parse()
            .map_err(|_| ExternalError::Decode(format!("code_id {raw:?} is not a number")))?;
        info!(code_id, bytes = wasm.len(), "stored code");
        Ok(code_id)
    }

    async fn instantiate(&self, code_id: u64, init_msg: &Value) -> Result<String, NimbusError> {
        let tx = self
            .submit(WasmMsg::instantiate(self.address(), code_id, init_msg))
            .await?;
        let addr = required_attr(&tx, "contract_address")?;
        info!(code_id, %addr, "instantiated contract");
        Ok(addr)
    }

    async fn execute(
        &self,
        contract: &str,
        msg: &Value,
        funds: &[Coin],
    ) -> Result<TxResult, NimbusError> {
        let tx = self
            .submit(WasmMsg::execute(self.address(), contract, msg, funds))
            .await?;
        debug!(%contract, txhash = %tx.txhash, height = tx.height, "executed");
        Ok(tx)
    }

    async fn query(&self, contract: &str, query: &Value) -> Result<Value, NimbusError> {
        let body = self
            .get(
                &format!("/wasm/contracts/{contract}/store"),
                &[("query_msg", query.to_string())],
            )
            .await?;
        Ok(parse_contract_query(body)?)
    }

    async fn current_block_height(&self) -> Result<u64, NimbusError> {
        let body = self.get("/blocks/latest", &[]).await?;
        Ok(parse_block_height(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::BroadcastResult;
    use serde_json::json;

    struct NullBroadcaster;

    #[async_trait]
    impl TxBroadcaster for NullBroadcaster {
        fn address(&self) -> &str {
            "terra1null"
        }

        async fn broadcast(&self, _doc: &SignDoc) -> Result<BroadcastResult, NimbusError> {
            Err(ExternalError::Unavailable("offline".into()).into())
        }
    }

    #[test]
    fn contract_query_unwraps_result() {
        let body = json!({"height": "100", "result": {"target": []}});
        assert_eq!(parse_contract_query(body).unwrap(), json!({"target": []}));
        assert!(parse_contract_query(json!({"height": "1"})).is_err());
    }

    #[test]
    fn block_height_accepts_string_or_number() {
        assert_eq!(
            parse_block_height(&json!({"block": {"header": {"height": "7313"}}})).unwrap(),
            7313
        );
        assert_eq!(
            parse_block_height(&json!({"block": {"header": {"height": 12}}})).unwrap(),
            12
        );
        assert!(parse_block_height(&json!({"block": {}})).is_err());
    }

    #[test]
    fn account_defaults_missing_sequence_to_zero() {
        let body = json!({
            "height": "5",
            "result": {"type": "core/Account", "value": {"address": "terra1x", "account_number": "42"}}
        });
        assert_eq!(
            parse_account(&body).unwrap(),
            AccountInfo {
                account_number: 42,
                sequence: 0
            }
        );
    }

    #[test]
    fn client_takes_settings_from_config() {
        let mut config = NimbusConfig::default();
        config.lcd_url = "http://localhost:1317/".into();
        let client = LcdClient::new(&config, NullBroadcaster).unwrap();
        assert_eq!(client.base_url, "http://localhost:1317");
        assert_eq!(client.address(), "terra1null");
        assert_eq!(client.chain_id(), config.chain_id);
    }

    #[test]
    fn missing_attribute_is_decode_error() {
        let tx = TxResult::default();
        let err = required_attr(&tx, "code_id").unwrap_err();
        assert!(matches!(err, NimbusError::External(ExternalError::Decode(_))));
    }
}
