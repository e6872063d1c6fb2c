use {
    crate::transaction::{AccountView, Transaction},
    regex::Regex,
    std::sync::LazyLock,
};

/// Matches the runtime's per-invocation compute report, e.g.
/// `Program TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA consumed 4645 of 200000 compute units`.
static CONSUMED_LOG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Program (\S+) consumed (\d+) of (\d+) compute units")
        .expect("invalid consumed log regex")
});

///
/// One program invocation reported by a transaction's logs, together with the writable accounts
/// the invoking instruction(s) referenced.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInvocationRecord {
    pub program: String,
    pub compute_units: u64,
    /// Compute budget the runtime reported alongside the consumption (`of <M>`).
    pub compute_limit: u64,
    /// Ordered, duplicates allowed.
    pub writable_accounts: Vec<String>,
}

///
/// Parsed fields of a consumed log line, before account resolution.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumedLine<'a> {
    pub program: &'a str,
    pub consumed: u64,
    pub limit: u64,
}

pub fn parse_consumed_line(line: &str) -> Option<ConsumedLine<'_>> {
    let caps = CONSUMED_LOG_REGEX.captures(line)?;
    let program = caps.get(1)?.as_str();
    let consumed = caps.get(2)?.as_str().parse().ok();
    let limit = caps.get(3)?.as_str().parse().ok();
    match (consumed, limit) {
        (Some(consumed), Some(limit)) => Some(ConsumedLine {
            program,
            consumed,
            limit,
        }),
        _ => {
            tracing::warn!("compute report out of range, skipping line: {line}");
            None
        }
    }
}

///
/// Collects the writable accounts referenced by every instruction whose program index resolves
/// to `program`. Out-of-range and read-only indices are skipped.
///
pub fn writable_accounts_for(view: &dyn AccountView, program: &str) -> Vec<String> {
    let mut out = Vec::new();
    for ix in view.instructions() {
        if view.account_at(ix.program_id_index as usize) != Some(program) {
            continue;
        }
        for &account_index in &ix.accounts {
            let account_index = account_index as usize;
            let Some(address) = view.account_at(account_index) else {
                tracing::trace!(
                    "instruction for {program} references out-of-range account index {account_index}"
                );
                continue;
            };
            if view.is_writable(account_index) {
                out.push(address.to_owned());
            }
        }
    }
    out
}

///
/// Lazily yields one [`ProgramInvocationRecord`] per consumed log line of `tx`.
///
/// Irrelevant transactions (zero compute consumed) and transactions without logs yield nothing.
/// The iterator borrows the transaction and re-scans it on every call.
///
pub fn parse_invocations(tx: &Transaction) -> impl Iterator<Item = ProgramInvocationRecord> + '_ {
    let view = tx.accounts();
    let lines: &[String] = match &tx.log_messages {
        Some(lines) if tx.is_relevant() => lines,
        _ => &[],
    };
    lines.iter().filter_map(move |line| {
        let consumed = parse_consumed_line(line)?;
        Some(ProgramInvocationRecord {
            program: consumed.program.to_owned(),
            compute_units: consumed.consumed,
            compute_limit: consumed.limit,
            writable_accounts: writable_accounts_for(view, consumed.program),
        })
    })
}
