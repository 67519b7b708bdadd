// crates/carbon-ledger/src/contract.rs
//
// Bindings for the carbon-credit token contract.
//
// `TokenContract` covers everything that needs no key: eth_call reads, chain
// head, receipts, and event logs. `ContractLedger` adds the owner's signer and
// implements `MintLedger` for the pipeline.

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use carbon_core::crypto::to_hex_prefixed;
use carbon_core::mint::{biguint_decimal, MintEvent, MintReceipt, MintRequest, ReceiptStatus};
use carbon_core::traits::{MintLedger, SignedMint};
use carbon_core::{Address, CarbonError};

use crate::abi;
use crate::rpc::{parse_data, parse_quantity, parse_quantity_u128, quantity, JsonRpcClient, RpcError};
use crate::tx::LegacyTransaction;
use crate::wallet::LocalSigner;

/// Default gas added on top of `eth_estimateGas`.
pub const DEFAULT_GAS_BUFFER: u64 = 30_000;

fn unavailable(e: RpcError) -> CarbonError {
    CarbonError::LedgerUnavailable(e.to_string())
}

fn invalid(e: RpcError) -> CarbonError {
    CarbonError::InvalidResponse(e.to_string())
}

/// Token metadata shown by `carbon-minter token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(with = "biguint_decimal")]
    pub total_supply: BigUint,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    topics: Vec<String>,
    data: String,
    #[serde(default)]
    removed: bool,
}

/// Read-only view of the token contract.
#[derive(Debug)]
pub struct TokenContract {
    rpc: JsonRpcClient,
    address: Address,
}

impl TokenContract {
    pub fn new(rpc: JsonRpcClient, address: Address) -> Self {
        Self { rpc, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn rpc(&self) -> &JsonRpcClient {
        &self.rpc
    }

    async fn call(&self, data: Vec<u8>) -> Result<Vec<u8>, CarbonError> {
        let params = serde_json::json!([
            { "to": self.address.to_string(), "data": to_hex_prefixed(&data) },
            "latest"
        ]);
        let result: String = self.rpc.call("eth_call", params).await.map_err(unavailable)?;
        parse_data(&result).map_err(invalid)
    }

    pub async fn name(&self) -> Result<String, CarbonError> {
        abi::decode_string(&self.call(abi::encode_no_args(abi::NAME_SIGNATURE)).await?)
    }

    pub async fn symbol(&self) -> Result<String, CarbonError> {
        abi::decode_string(&self.call(abi::encode_no_args(abi::SYMBOL_SIGNATURE)).await?)
    }

    pub async fn decimals(&self) -> Result<u8, CarbonError> {
        abi::decode_u8(&self.call(abi::encode_no_args(abi::DECIMALS_SIGNATURE)).await?)
    }

    pub async fn total_supply(&self) -> Result<BigUint, CarbonError> {
        abi::decode_uint(&self.call(abi::encode_no_args(abi::TOTAL_SUPPLY_SIGNATURE)).await?)
    }

    pub async fn owner(&self) -> Result<Address, CarbonError> {
        abi::decode_address(&self.call(abi::encode_no_args(abi::OWNER_SIGNATURE)).await?)
    }

    pub async fn balance_of(&self, account: &Address) -> Result<BigUint, CarbonError> {
        abi::decode_uint(&self.call(abi::encode_balance_of(account)).await?)
    }

    pub async fn info(&self) -> Result<TokenInfo, CarbonError> {
        Ok(TokenInfo {
            address: self.address,
            name: self.name().await?,
            symbol: self.symbol().await?,
            decimals: self.decimals().await?,
            total_supply: self.total_supply().await?,
        })
    }

    pub async fn chain_id(&self) -> Result<u64, CarbonError> {
        let result: String = self
            .rpc
            .call("eth_chainId", serde_json::json!([]))
            .await
            .map_err(unavailable)?;
        parse_quantity(&result).map_err(invalid)
    }

    pub async fn block_number(&self) -> Result<u64, CarbonError> {
        let result: String = self
            .rpc
            .call("eth_blockNumber", serde_json::json!([]))
            .await
            .map_err(unavailable)?;
        parse_quantity(&result).map_err(invalid)
    }

    /// Receipt of a mined transaction. `None` while pending or unknown.
    pub async fn receipt(&self, transaction_hash: &str) -> Result<Option<MintReceipt>, CarbonError> {
        let receipt: Option<RpcReceipt> = self
            .rpc
            .call("eth_getTransactionReceipt", serde_json::json!([transaction_hash]))
            .await
            .map_err(unavailable)?;

        let Some(receipt) = receipt else {
            return Ok(None);
        };
        let Some(block) = receipt.block_number else {
            return Ok(None);
        };
        let status = match receipt.status.as_deref() {
            Some(s) => match parse_quantity(s).map_err(invalid)? {
                1 => ReceiptStatus::Confirmed,
                _ => ReceiptStatus::Failed,
            },
            None => {
                return Err(CarbonError::InvalidResponse(format!(
                    "receipt for {} has no status field",
                    transaction_hash
                )))
            }
        };

        Ok(Some(MintReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: parse_quantity(&block).map_err(invalid)?,
            status,
        }))
    }

    pub async fn is_known(&self, transaction_hash: &str) -> Result<bool, CarbonError> {
        let tx: Option<serde_json::Value> = self
            .rpc
            .call("eth_getTransactionByHash", serde_json::json!([transaction_hash]))
            .await
            .map_err(unavailable)?;
        Ok(tx.is_some())
    }

    /// `CarbonCreditMinted` events for `recipient` from `from_block` to the head.
    pub async fn mint_events(
        &self,
        recipient: &Address,
        from_block: u64,
    ) -> Result<Vec<MintEvent>, CarbonError> {
        let filter = serde_json::json!([{
            "address": self.address.to_string(),
            "fromBlock": quantity(from_block),
            "toBlock": "latest",
            "topics": [
                to_hex_prefixed(&abi::minted_topic()),
                to_hex_prefixed(&recipient.to_word()),
            ],
        }]);
        let logs: Vec<RpcLog> = self.rpc.call("eth_getLogs", filter).await.map_err(unavailable)?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs.into_iter().filter(|l| !l.removed) {
            let (Some(transaction_hash), Some(block)) = (log.transaction_hash, log.block_number) else {
                continue;
            };
            let topics = log
                .topics
                .iter()
                .map(|t| {
                    let bytes = parse_data(t).map_err(invalid)?;
                    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
                        CarbonError::InvalidResponse(format!("topic is not 32 bytes: {}", t))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let data = parse_data(&log.data).map_err(invalid)?;

            match abi::decode_minted_log(&topics, &data) {
                Ok(decoded) => events.push(MintEvent {
                    account: decoded.account,
                    amount: decoded.amount,
                    system_identifier: decoded.system_identifier,
                    transaction_hash,
                    block_number: parse_quantity(&block).map_err(invalid)?,
                }),
                Err(e) => tracing::warn!("Skipping undecodable mint log in {}: {}", transaction_hash, e),
            }
        }
        Ok(events)
    }
}

/// The token contract plus the owner key that may call `mint`.
#[derive(Debug)]
pub struct ContractLedger {
    token: TokenContract,
    signer: LocalSigner,
    chain_id: OnceCell<u64>,
    decimals: OnceCell<u8>,
    gas_buffer: u64,
}

impl ContractLedger {
    /// `chain_id` may be pinned in configuration; otherwise it is read once
    /// from the node on first use.
    pub fn new(
        token: TokenContract,
        signer: LocalSigner,
        chain_id: Option<u64>,
        gas_buffer: u64,
    ) -> Self {
        Self {
            token,
            signer,
            chain_id: OnceCell::new_with(chain_id),
            decimals: OnceCell::new(),
            gas_buffer,
        }
    }

    pub fn token(&self) -> &TokenContract {
        &self.token
    }

    async fn chain_id(&self) -> Result<u64, CarbonError> {
        self.chain_id
            .get_or_try_init(|| self.token.chain_id())
            .await
            .copied()
    }

    async fn nonce(&self) -> Result<u64, CarbonError> {
        let result: String = self
            .token
            .rpc
            .call(
                "eth_getTransactionCount",
                serde_json::json!([self.signer.address().to_string(), "pending"]),
            )
            .await
            .map_err(unavailable)?;
        parse_quantity(&result).map_err(invalid)
    }

    async fn gas_price(&self) -> Result<u128, CarbonError> {
        let result: String = self
            .token
            .rpc
            .call("eth_gasPrice", serde_json::json!([]))
            .await
            .map_err(unavailable)?;
        parse_quantity_u128(&result).map_err(invalid)
    }

    /// Gas estimate with the configured buffer applied.
    ///
    /// A node error here usually means the call would revert (not the owner,
    /// zero address), so it is a rejection rather than an outage.
    async fn gas_limit(&self, data: &[u8]) -> Result<u64, CarbonError> {
        let params = serde_json::json!([{
            "from": self.signer.address().to_string(),
            "to": self.token.address.to_string(),
            "data": to_hex_prefixed(data),
        }]);
        let result: String = match self.token.rpc.call("eth_estimateGas", params).await {
            Ok(result) => result,
            Err(RpcError::Node { code, message }) => {
                return Err(CarbonError::SubmissionRejected(format!(
                    "Gas estimation failed ({}): {}",
                    code, message
                )))
            }
            Err(e) => return Err(unavailable(e)),
        };
        let estimate = parse_quantity(&result).map_err(invalid)?;
        Ok(estimate.saturating_add(self.gas_buffer))
    }
}

#[async_trait]
impl MintLedger for ContractLedger {
    fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn block_number(&self) -> Result<u64, CarbonError> {
        self.token.block_number().await
    }

    async fn decimals(&self) -> Result<u8, CarbonError> {
        self.decimals
            .get_or_try_init(|| self.token.decimals())
            .await
            .copied()
    }

    async fn sign_mint(&self, request: &MintRequest) -> Result<SignedMint, CarbonError> {
        if request.recipient.is_zero() {
            return Err(CarbonError::InvalidAddress(
                "refusing to mint to the zero address".to_string(),
            ));
        }

        let data = abi::encode_mint(
            &request.recipient,
            &request.amount_base_units,
            &request.system_identifier,
        )?;
        let gas_limit = self.gas_limit(&data).await?;
        let nonce = self.nonce().await?;
        let gas_price = self.gas_price().await?;
        let chain_id = self.chain_id().await?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: self.token.address,
            value: 0,
            data,
            chain_id,
        };
        let signed = tx.sign(&self.signer)?;

        tracing::debug!(
            "Signed mint for {}: nonce={} gas_limit={} gas_price={} chain_id={} hash={}",
            request.system_identifier,
            nonce,
            gas_limit,
            gas_price,
            chain_id,
            signed.hash_hex()
        );

        Ok(SignedMint {
            transaction_hash: signed.hash_hex(),
            raw: signed.raw,
            nonce,
            gas_limit,
        })
    }

    async fn broadcast(&self, mint: &SignedMint) -> Result<String, CarbonError> {
        let params = serde_json::json!([to_hex_prefixed(&mint.raw)]);
        match self.token.rpc.call::<String>("eth_sendRawTransaction", params).await {
            Ok(hash) => {
                if !hash.eq_ignore_ascii_case(&mint.transaction_hash) {
                    tracing::warn!(
                        "Node reported hash {} for transaction signed as {}",
                        hash,
                        mint.transaction_hash
                    );
                }
                Ok(mint.transaction_hash.clone())
            }
            Err(RpcError::Node { message, .. }) if is_already_known(&message) => {
                tracing::info!("Node already has {}: {}", mint.transaction_hash, message);
                Ok(mint.transaction_hash.clone())
            }
            Err(RpcError::Node { code, message }) => Err(CarbonError::SubmissionRejected(format!(
                "eth_sendRawTransaction refused ({}): {}",
                code, message
            ))),
            Err(e) => Err(CarbonError::BroadcastUncertain {
                tx_hash: mint.transaction_hash.clone(),
                reason: e.to_string(),
            }),
        }
    }

    async fn receipt(&self, transaction_hash: &str) -> Result<Option<MintReceipt>, CarbonError> {
        self.token.receipt(transaction_hash).await
    }

    async fn is_known(&self, transaction_hash: &str) -> Result<bool, CarbonError> {
        self.token.is_known(transaction_hash).await
    }

    async fn mint_events(
        &self,
        recipient: &Address,
        from_block: u64,
    ) -> Result<Vec<MintEvent>, CarbonError> {
        self.token.mint_events(recipient, from_block).await
    }
}

/// Rebroadcast of a transaction the node already holds.
fn is_already_known(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("already known") || lower.contains("known transaction")
}
