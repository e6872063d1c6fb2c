use {solana_clock::Slot, std::fmt};

///
/// Message header describing how the static account keys split into signer/read-only groups.
///
/// The account list is ordered as: writable signers, read-only signers, writable non-signers,
/// read-only non-signers.
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

impl MessageHeader {
    ///
    /// Returns true if the static key at `index` may be mutated, given `num_static_keys` keys in the message.
    ///
    pub fn is_static_writable(&self, index: usize, num_static_keys: usize) -> bool {
        if index >= num_static_keys {
            return false;
        }
        let num_signers = self.num_required_signatures as usize;
        if index < num_signers {
            let num_writable_signers =
                num_signers.saturating_sub(self.num_readonly_signed_accounts as usize);
            index < num_writable_signers
        } else {
            let num_writable_unsigned = num_static_keys
                .saturating_sub(num_signers)
                .saturating_sub(self.num_readonly_unsigned_accounts as usize);
            index - num_signers < num_writable_unsigned
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
}

///
/// Uniform view over the account addressing of a transaction message.
///
/// Everything downstream of the decoder (log parser, attribution) depends on this trait only,
/// never on the concrete message encoding.
///
pub trait AccountView {
    fn account_at(&self, index: usize) -> Option<&str>;

    fn is_writable(&self, index: usize) -> bool;

    fn instructions(&self) -> &[CompiledInstruction];
}

///
/// Pre-versioning message: every program and account reference indexes one flat key list.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyMessage {
    pub header: MessageHeader,
    pub account_keys: Vec<String>,
    pub instructions: Vec<CompiledInstruction>,
}

impl AccountView for LegacyMessage {
    fn account_at(&self, index: usize) -> Option<&str> {
        self.account_keys.get(index).map(String::as_str)
    }

    fn is_writable(&self, index: usize) -> bool {
        self.header
            .is_static_writable(index, self.account_keys.len())
    }

    fn instructions(&self) -> &[CompiledInstruction] {
        &self.instructions
    }
}

///
/// Version 0 message: static keys carried in the message, extended by addresses loaded from
/// lookup tables. Indices past the static keys continue into the loaded writable list, then
/// into the loaded read-only list.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionedMessage {
    pub header: MessageHeader,
    pub static_account_keys: Vec<String>,
    pub compiled_instructions: Vec<CompiledInstruction>,
    pub loaded_writable_addresses: Vec<String>,
    pub loaded_readonly_addresses: Vec<String>,
}

impl AccountView for VersionedMessage {
    fn account_at(&self, index: usize) -> Option<&str> {
        let num_static = self.static_account_keys.len();
        let num_writable = self.loaded_writable_addresses.len();
        if index < num_static {
            Some(self.static_account_keys[index].as_str())
        } else if index < num_static + num_writable {
            Some(self.loaded_writable_addresses[index - num_static].as_str())
        } else {
            self.loaded_readonly_addresses
                .get(index - num_static - num_writable)
                .map(String::as_str)
        }
    }

    fn is_writable(&self, index: usize) -> bool {
        let num_static = self.static_account_keys.len();
        if index < num_static {
            self.header.is_static_writable(index, num_static)
        } else {
            index - num_static < self.loaded_writable_addresses.len()
        }
    }

    fn instructions(&self) -> &[CompiledInstruction] {
        &self.compiled_instructions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionEncoding {
    Legacy,
    Versioned,
}

impl fmt::Display for TransactionEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionEncoding::Legacy => f.write_str("legacy"),
            TransactionEncoding::Versioned => f.write_str("versioned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionMessage {
    Legacy(LegacyMessage),
    Versioned(VersionedMessage),
}

impl TransactionMessage {
    pub fn encoding(&self) -> TransactionEncoding {
        match self {
            TransactionMessage::Legacy(_) => TransactionEncoding::Legacy,
            TransactionMessage::Versioned(_) => TransactionEncoding::Versioned,
        }
    }

    pub fn view(&self) -> &dyn AccountView {
        match self {
            TransactionMessage::Legacy(message) => message,
            TransactionMessage::Versioned(message) => message,
        }
    }
}

///
/// Token balance of one account as reported by the execution metadata.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub account_index: usize,
    pub mint: String,
    /// Raw integer amount, as a string to avoid precision loss on large balances.
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub message: TransactionMessage,
    /// `None` when the upstream omitted logs; such a transaction contributes nothing.
    pub log_messages: Option<Vec<String>>,
    pub compute_units_consumed: Option<u64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

impl Transaction {
    pub fn new(message: TransactionMessage, log_messages: Option<Vec<String>>) -> Self {
        Self {
            message,
            log_messages,
            compute_units_consumed: None,
            pre_token_balances: Vec::new(),
            post_token_balances: Vec::new(),
        }
    }

    pub fn encoding(&self) -> TransactionEncoding {
        self.message.encoding()
    }

    pub fn accounts(&self) -> &dyn AccountView {
        self.message.view()
    }

    ///
    /// A transaction is relevant when it did not report zero compute consumed.
    /// Transactions without compute metadata are processed.
    ///
    pub fn is_relevant(&self) -> bool {
        !matches!(self.compute_units_consumed, Some(0))
    }

    ///
    /// Iterates `(account address, mint)` pairs whose token balance changed in this transaction.
    ///
    pub fn token_balance_changes(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let view = self.accounts();
        let pre_balances = &self.pre_token_balances;
        let post_balances = &self.post_token_balances;
        let changed_pre = pre_balances.iter().filter(move |pre| {
            !post_balances.iter().any(|post| {
                post.account_index == pre.account_index
                    && post.mint == pre.mint
                    && post.amount == pre.amount
            })
        });
        let added_post = post_balances.iter().filter(move |post| {
            !pre_balances
                .iter()
                .any(|pre| pre.account_index == post.account_index && pre.mint == post.mint)
        });
        changed_pre
            .chain(added_post)
            .filter_map(move |balance| {
                view.account_at(balance.account_index)
                    .map(|address| (address, balance.mint.as_str()))
            })
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub slot: Slot,
    pub parent_slot: Option<Slot>,
    pub blockhash: Option<String>,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(slot: Slot, transactions: Vec<Transaction>) -> Self {
        Self {
            slot,
            parent_slot: None,
            blockhash: None,
            transactions,
        }
    }

    pub fn txn_len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
