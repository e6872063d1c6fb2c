use {
    crate::{
        source::{BlockSource, BlockSourceError},
        transaction::{
            Block, CompiledInstruction, LegacyMessage, MessageHeader, TokenBalance, Transaction,
            TransactionMessage, VersionedMessage,
        },
    },
    async_trait::async_trait,
    serde::{Deserialize, de::DeserializeOwned},
    serde_json::{Value, json},
    solana_clock::Slot,
    solana_commitment_config::CommitmentLevel,
    solana_hash::Hash,
    std::{
        sync::atomic::{AtomicU64, Ordering},
        time::Duration,
    },
};

///
/// JSON-RPC error codes meaning the block does not exist or is no longer stored.
///
pub const BLOCK_UNAVAILABLE_ERROR_CODES: [i64; 4] = [
    -32004, // block not available
    -32007, // slot skipped
    -32009, // slot missing in long-term storage
    -32014, // block status not yet available
];

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcHeader {
    num_required_signatures: u8,
    num_readonly_signed_accounts: u8,
    num_readonly_unsigned_accounts: u8,
}

impl From<RpcHeader> for MessageHeader {
    fn from(value: RpcHeader) -> Self {
        Self {
            num_required_signatures: value.num_required_signatures,
            num_readonly_signed_accounts: value.num_readonly_signed_accounts,
            num_readonly_unsigned_accounts: value.num_readonly_unsigned_accounts,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcInstruction {
    program_id_index: u8,
    #[serde(default)]
    accounts: Vec<u8>,
}

impl From<RpcInstruction> for CompiledInstruction {
    fn from(value: RpcInstruction) -> Self {
        Self {
            program_id_index: value.program_id_index,
            accounts: value.accounts,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMessage {
    header: RpcHeader,
    account_keys: Vec<String>,
    #[serde(default)]
    instructions: Vec<RpcInstruction>,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionBody {
    message: RpcMessage,
}

#[derive(Debug, Default, Deserialize)]
struct RpcLoadedAddresses {
    #[serde(default)]
    writable: Vec<String>,
    #[serde(default)]
    readonly: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RpcTokenAmount {
    amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTokenBalance {
    account_index: usize,
    mint: String,
    ui_token_amount: RpcTokenAmount,
}

impl From<RpcTokenBalance> for TokenBalance {
    fn from(value: RpcTokenBalance) -> Self {
        Self {
            account_index: value.account_index,
            mint: value.mint,
            amount: value.ui_token_amount.amount,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransactionMeta {
    log_messages: Option<Vec<String>>,
    compute_units_consumed: Option<u64>,
    loaded_addresses: Option<RpcLoadedAddresses>,
    pre_token_balances: Option<Vec<RpcTokenBalance>>,
    post_token_balances: Option<Vec<RpcTokenBalance>>,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionWithMeta {
    transaction: RpcTransactionBody,
    meta: Option<RpcTransactionMeta>,
    /// `"legacy"`, a version number, or absent for nodes predating versioned transactions.
    version: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    blockhash: Option<String>,
    parent_slot: Option<Slot>,
    #[serde(default)]
    transactions: Vec<RpcTransactionWithMeta>,
}

fn is_versioned(version: Option<&Value>) -> bool {
    matches!(version, Some(Value::Number(_)))
}

fn decode_transaction(tx: RpcTransactionWithMeta) -> Transaction {
    let RpcTransactionWithMeta {
        transaction,
        meta,
        version,
    } = tx;
    let RpcMessage {
        header,
        account_keys,
        instructions,
    } = transaction.message;
    let instructions = instructions.into_iter().map(Into::into).collect();

    let (log_messages, compute_units_consumed, loaded, pre, post) = match meta {
        Some(meta) => (
            meta.log_messages,
            meta.compute_units_consumed,
            meta.loaded_addresses.unwrap_or_default(),
            meta.pre_token_balances.unwrap_or_default(),
            meta.post_token_balances.unwrap_or_default(),
        ),
        None => (None, None, RpcLoadedAddresses::default(), vec![], vec![]),
    };

    let message = if is_versioned(version.as_ref()) {
        TransactionMessage::Versioned(VersionedMessage {
            header: header.into(),
            static_account_keys: account_keys,
            compiled_instructions: instructions,
            loaded_writable_addresses: loaded.writable,
            loaded_readonly_addresses: loaded.readonly,
        })
    } else {
        TransactionMessage::Legacy(LegacyMessage {
            header: header.into(),
            account_keys,
            instructions,
        })
    };

    Transaction {
        message,
        log_messages,
        compute_units_consumed,
        pre_token_balances: pre.into_iter().map(Into::into).collect(),
        post_token_balances: post.into_iter().map(Into::into).collect(),
    }
}

fn parse_blockhash(blockhash: &str) -> Option<Hash> {
    let bytes = bs58::decode(blockhash).into_vec().ok()?;
    let array: [u8; 32] = bytes.try_into().ok()?;
    Some(Hash::new_from_array(array))
}

fn decode_block(slot: Slot, block: RpcBlock) -> Block {
    let blockhash = block.blockhash.as_deref().and_then(|bh| match parse_blockhash(bh) {
        Some(hash) => Some(hash.to_string()),
        None => {
            tracing::warn!(slot, "ignoring malformed blockhash {bh}");
            None
        }
    });
    let transactions: Vec<_> = block.transactions.into_iter().map(decode_transaction).collect();
    tracing::trace!(
        slot,
        parent_slot = ?block.parent_slot,
        blockhash = blockhash.as_deref().unwrap_or("-"),
        "decoded block with {} transactions",
        transactions.len()
    );
    Block {
        slot,
        parent_slot: block.parent_slot,
        blockhash,
        transactions,
    }
}

fn commitment_name(level: CommitmentLevel) -> &'static str {
    match level {
        CommitmentLevel::Processed => "processed",
        CommitmentLevel::Confirmed => "confirmed",
        CommitmentLevel::Finalized => "finalized",
    }
}

///
/// [`BlockSource`] backed by a Solana JSON-RPC endpoint (`getSlot` and `getBlock`).
///
pub struct JsonRpcBlockSource {
    client: reqwest::Client,
    url: String,
    commitment: CommitmentLevel,
    request_id: AtomicU64,
}

impl JsonRpcBlockSource {
    pub fn new(
        url: impl Into<String>,
        commitment: CommitmentLevel,
        request_timeout: Duration,
    ) -> Result<Self, BlockSourceError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BlockSourceError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            commitment,
            request_id: AtomicU64::new(1),
        })
    }

    ///
    /// `getBlock` refuses the processed commitment, confirmed is the closest it serves.
    ///
    fn block_commitment(&self) -> CommitmentLevel {
        match self.commitment {
            CommitmentLevel::Processed => CommitmentLevel::Confirmed,
            level => level,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, BlockSourceError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let body = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| BlockSourceError::Transport(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| BlockSourceError::Transport(e.to_string()))?;
        let response: RpcResponse<T> =
            serde_json::from_slice(&body).map_err(|e| BlockSourceError::Decode(e.to_string()))?;
        if let Some(RpcErrorObject { code, message }) = response.error {
            return Err(BlockSourceError::Rpc { code, message });
        }
        Ok(response.result)
    }
}

#[async_trait]
impl BlockSource for JsonRpcBlockSource {
    async fn current_slot(&self) -> Result<Slot, BlockSourceError> {
        let params = json!([{ "commitment": commitment_name(self.commitment) }]);
        self.call::<Slot>("getSlot", params)
            .await?
            .ok_or_else(|| BlockSourceError::Decode("getSlot returned no result".to_owned()))
    }

    async fn fetch_block(&self, slot: Slot) -> Result<Option<Block>, BlockSourceError> {
        let params = json!([
            slot,
            {
                "encoding": "json",
                "transactionDetails": "full",
                "maxSupportedTransactionVersion": 0,
                "rewards": false,
                "commitment": commitment_name(self.block_commitment()),
            }
        ]);
        match self.call::<RpcBlock>("getBlock", params).await {
            Ok(Some(block)) => Ok(Some(decode_block(slot, block))),
            Ok(None) => Ok(None),
            Err(BlockSourceError::Rpc { code, message })
                if BLOCK_UNAVAILABLE_ERROR_CODES.contains(&code) =>
            {
                tracing::trace!(slot, code, "block unavailable: {message}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
