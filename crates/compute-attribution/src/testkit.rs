use {
    crate::{
        source::{BlockSource, BlockSourceError},
        transaction::{
            Block, CompiledInstruction, LegacyMessage, MessageHeader, Transaction,
            TransactionMessage,
        },
    },
    async_trait::async_trait,
    rustc_hash::FxHashMap,
    solana_clock::Slot,
    std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicU64, Ordering},
        },
        time::Duration,
    },
    tokio::time::Instant,
    tracing_subscriber::{
        EnvFilter,
        layer::SubscriberExt,
        util::{SubscriberInitExt, TryInitError},
    },
};

pub fn setup_tracing_test(module: &str) -> Result<(), TryInitError> {
    let io_layer = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_line_number(true)
        .with_test_writer();

    let level_layer = EnvFilter::builder()
        .with_default_directive(format!("{module}=trace").parse().expect("invalid module"))
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(io_layer)
        .with(level_layer)
        .try_init()?;
    Ok(())
}

pub fn logs(lines: &[&str]) -> Option<Vec<String>> {
    Some(lines.iter().map(|s| s.to_string()).collect())
}

pub fn ix(program_id_index: u8, accounts: &[u8]) -> CompiledInstruction {
    CompiledInstruction {
        program_id_index,
        accounts: accounts.to_vec(),
    }
}

///
/// Legacy transaction with a single writable signer at index 0 and the last
/// `readonly_unsigned` keys read-only.
///
pub fn legacy_tx(
    keys: &[&str],
    readonly_unsigned: u8,
    instructions: Vec<CompiledInstruction>,
    log_messages: Option<Vec<String>>,
) -> Transaction {
    Transaction::new(
        TransactionMessage::Legacy(LegacyMessage {
            header: MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: readonly_unsigned,
            },
            account_keys: keys.iter().map(|s| s.to_string()).collect(),
            instructions,
        }),
        log_messages,
    )
}

///
/// Block with one transaction where `program` consumed `units` and wrote `accounts`.
///
pub fn simple_block(slot: Slot, program: &str, units: u64, accounts: &[&str]) -> Block {
    let mut keys = vec!["payer"];
    keys.extend_from_slice(accounts);
    keys.push(program);
    let account_indices: Vec<u8> = (1..=accounts.len() as u8).collect();
    let tx = legacy_tx(
        &keys,
        1,
        vec![ix(keys.len() as u8 - 1, &account_indices)],
        Some(vec![format!("Program {program} consumed {units} of 1400000 compute units")]),
    );
    Block::new(slot, vec![tx])
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Block(Block),
    Unavailable,
    Fail,
    Hang,
    Delay(Duration, Block),
}

///
/// In-memory block source. Slots without a scripted response are unavailable.
///
#[derive(Debug, Clone, Default)]
pub struct MockBlockSource {
    current_slot: Arc<AtomicU64>,
    responses: Arc<Mutex<FxHashMap<Slot, MockResponse>>>,
    fetch_log: Arc<Mutex<Vec<(Slot, Instant)>>>,
}

impl MockBlockSource {
    pub fn new(current_slot: Slot) -> Self {
        Self {
            current_slot: Arc::new(AtomicU64::new(current_slot)),
            ..Default::default()
        }
    }

    pub fn set_current_slot(&self, slot: Slot) {
        self.current_slot.store(slot, Ordering::SeqCst);
    }

    pub fn script(&self, slot: Slot, response: MockResponse) {
        self.responses.lock().unwrap().insert(slot, response);
    }

    pub fn fetched_slots(&self) -> Vec<Slot> {
        self.fetch_times().into_iter().map(|(slot, _)| slot).collect()
    }

    pub fn fetch_times(&self) -> Vec<(Slot, Instant)> {
        self.fetch_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlockSource for MockBlockSource {
    async fn current_slot(&self) -> Result<Slot, BlockSourceError> {
        Ok(self.current_slot.load(Ordering::SeqCst))
    }

    async fn fetch_block(&self, slot: Slot) -> Result<Option<Block>, BlockSourceError> {
        self.fetch_log.lock().unwrap().push((slot, Instant::now()));
        let response = self.responses.lock().unwrap().get(&slot).cloned();
        match response {
            Some(MockResponse::Block(block)) => Ok(Some(block)),
            Some(MockResponse::Unavailable) | None => Ok(None),
            Some(MockResponse::Fail) => Err(BlockSourceError::Transport("mock failure".to_owned())),
            Some(MockResponse::Hang) => std::future::pending().await,
            Some(MockResponse::Delay(delay, block)) => {
                tokio::time::sleep(delay).await;
                Ok(Some(block))
            }
        }
    }
}
