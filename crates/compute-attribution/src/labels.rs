use {
    common_macros::hash_map,
    rustc_hash::FxHashMap,
    std::collections::HashMap,
};

///
/// Well-known mainnet programs and mints.
///
pub fn well_known_labels() -> HashMap<&'static str, &'static str> {
    hash_map! {
        "11111111111111111111111111111111" => "System Program",
        "ComputeBudget111111111111111111111111111111" => "Compute Budget Program",
        "Vote111111111111111111111111111111111111111" => "Vote Program",
        "Stake11111111111111111111111111111111111111" => "Stake Program",
        "AddressLookupTab1e1111111111111111111111111" => "Address Lookup Table Program",
        "BPFLoader2111111111111111111111111111111111" => "BPF Loader 2",
        "BPFLoaderUpgradeab1e11111111111111111111111" => "BPF Upgradeable Loader",
        "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA" => "Token Program",
        "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb" => "Token-2022 Program",
        "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL" => "Associated Token Account Program",
        "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr" => "Memo Program v2",
        "Memo1UhkJRfHyvLMcVucJwxXeuD728EqVDDwQDxFMNo" => "Memo Program v1",
        "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4" => "Jupiter Aggregator v6",
        "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc" => "Orca Whirlpools",
        "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8" => "Raydium AMM v4",
        "CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK" => "Raydium CLMM",
        "4MangoMjqJ2firMokCjjGgoK8d4MXcrgL7XJaL3w6fVg" => "Mango Markets v4",
        "dRiftyHA39MWEi3m9aunc5MzRF1JYuBsbn6VPcn33UH" => "Drift Protocol v2",
        "So11111111111111111111111111111111111111112" => "Wrapped SOL",
        "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v" => "USDC",
        "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB" => "USDT",
    }
}

///
/// Resolves addresses to human-readable labels. Unknown addresses label as themselves.
///
#[derive(Debug, Clone, Default)]
pub struct AddressLabels {
    labels: FxHashMap<String, String>,
}

impl AddressLabels {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_well_known() -> Self {
        let mut this = Self::empty();
        this.extend(
            well_known_labels()
                .into_iter()
                .map(|(address, label)| (address.to_owned(), label.to_owned())),
        );
        this
    }

    pub fn insert(&mut self, address: impl Into<String>, label: impl Into<String>) {
        self.labels.insert(address.into(), label.into());
    }

    pub fn resolve(&self, address: &str) -> Option<&str> {
        self.labels.get(address).map(String::as_str)
    }

    pub fn label<'a>(&'a self, address: &'a str) -> &'a str {
        self.resolve(address).unwrap_or(address)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Extend<(String, String)> for AddressLabels {
    fn extend<T: IntoIterator<Item = (String, String)>>(&mut self, iter: T) {
        self.labels.extend(iter);
    }
}
