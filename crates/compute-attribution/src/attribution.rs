use {
    crate::{
        log_parser::{ProgramInvocationRecord, parse_invocations},
        tally::{OrderedTally, TallyOverflow},
        transaction::Block,
    },
    rustc_hash::FxHashMap,
    std::collections::BTreeSet,
};

pub type AccountComputeMap = OrderedTally<String>;

///
/// Errors that make a block's attribution unpublishable.
///
/// These indicate malformed upstream data or a bug, never a routine skip.
///
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributionError {
    #[error("program {program} reported {consumed} compute units consumed, above its limit {limit}")]
    ConsumedAboveLimit {
        program: String,
        consumed: u64,
        limit: u64,
    },
    #[error("compute total overflow while accumulating {address}")]
    Overflow { address: String },
}

///
/// Per-block result of the attribution engine. Immutable once built.
///
#[derive(Debug, Clone, Default)]
pub struct BlockAttribution {
    program_compute: OrderedTally<String>,
    account_compute: AccountComputeMap,
    account_programs: FxHashMap<String, BTreeSet<String>>,
    token_tags: FxHashMap<String, BTreeSet<String>>,
}

impl BlockAttribution {
    pub fn is_empty(&self) -> bool {
        self.program_compute.is_empty()
    }

    pub fn program_compute(&self) -> &OrderedTally<String> {
        &self.program_compute
    }

    pub fn account_compute(&self) -> &AccountComputeMap {
        &self.account_compute
    }

    pub fn associated_programs(&self, account: &str) -> Option<&BTreeSet<String>> {
        self.account_programs.get(account)
    }

    pub fn token_tags(&self, account: &str) -> Option<&BTreeSet<String>> {
        self.token_tags.get(account)
    }

    pub fn max_account_compute(&self) -> u64 {
        self.account_compute.max_value().unwrap_or(0)
    }
}

///
/// Accumulates [`ProgramInvocationRecord`]s of one block into a [`BlockAttribution`].
///
/// Each invocation's compute units are split evenly (integer floor) across its writable account
/// positions: with `n` positions every position receives `units / n`. An account appearing twice
/// in one invocation receives two shares. Invocations without writable accounts only count
/// towards the program total.
///
#[derive(Debug, Default)]
pub struct AttributionEngine {
    inner: BlockAttribution,
}

impl AttributionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: ProgramInvocationRecord) -> Result<(), AttributionError> {
        let ProgramInvocationRecord {
            program,
            compute_units,
            compute_limit,
            writable_accounts,
        } = record;

        if compute_units > compute_limit {
            return Err(AttributionError::ConsumedAboveLimit {
                program,
                consumed: compute_units,
                limit: compute_limit,
            });
        }

        self.inner
            .program_compute
            .add(program.clone(), compute_units)
            .map_err(|TallyOverflow| AttributionError::Overflow {
                address: program.clone(),
            })?;

        if writable_accounts.is_empty() {
            return Ok(());
        }

        let share = compute_units / writable_accounts.len() as u64;
        for account in writable_accounts {
            self.inner
                .account_compute
                .add(account.clone(), share)
                .map_err(|TallyOverflow| AttributionError::Overflow {
                    address: account.clone(),
                })?;
            self.inner
                .account_programs
                .entry(account)
                .or_default()
                .insert(program.clone());
        }
        Ok(())
    }

    pub fn tag_token_change(&mut self, account: &str, mint: &str) {
        self.inner
            .token_tags
            .entry(account.to_owned())
            .or_default()
            .insert(mint.to_owned());
    }

    ///
    /// Finalizes the attribution, dropping accounts that ended up with no associated program and
    /// token tags of accounts that never received compute.
    ///
    pub fn finish(mut self) -> BlockAttribution {
        let account_programs = &self.inner.account_programs;
        self.inner.account_compute.retain(|account, _| {
            account_programs
                .get(account)
                .is_some_and(|programs| !programs.is_empty())
        });
        let account_compute = &self.inner.account_compute;
        self.inner
            .token_tags
            .retain(|account, _| account_compute.contains(account));
        self.inner
    }
}

pub fn attribute_records(
    records: impl IntoIterator<Item = ProgramInvocationRecord>,
) -> Result<BlockAttribution, AttributionError> {
    let mut engine = AttributionEngine::new();
    for record in records {
        engine.record(record)?;
    }
    Ok(engine.finish())
}

///
/// Runs every transaction of `block` through the log parser and the attribution engine.
///
/// Token balance changes are only tagged for transactions that reported at least one invocation.
/// A transaction whose logs report more units consumed than the limit contributes nothing; an
/// overflowing total fails the whole block.
///
pub fn attribute_block(block: &Block) -> Result<BlockAttribution, AttributionError> {
    let mut engine = AttributionEngine::new();
    for tx in &block.transactions {
        let records: Vec<_> = parse_invocations(tx).collect();
        if let Some(bad) = records.iter().find(|r| r.compute_units > r.compute_limit) {
            tracing::warn!(
                slot = block.slot,
                "skipping transaction: program {} consumed {} of {} compute units",
                bad.program,
                bad.compute_units,
                bad.compute_limit
            );
            continue;
        }
        let invoked = !records.is_empty();
        for record in records {
            engine.record(record)?;
        }
        if invoked {
            for (account, mint) in tx.token_balance_changes() {
                engine.tag_token_change(account, mint);
            }
        }
    }
    Ok(engine.finish())
}
