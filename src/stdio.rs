use {
    compute_attribution::{driver::DriverHandle, payload::BuildOutcome},
    futures_util::{Stream, StreamExt},
    solana_clock::Slot,
    std::io::BufRead,
    tokio::{
        io::{AsyncWrite, AsyncWriteExt},
        sync::mpsc,
    },
};

pub const STDIN_LINE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move the cursor to a slot.
    Seek(Slot),
    /// Log the driver's counters.
    Stats,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}`, expected `seek <slot>` or `stats`")]
    Unknown(String),
    #[error("invalid slot `{0}`")]
    InvalidSlot(String),
    #[error("`seek` requires a slot")]
    MissingSlot,
}

///
/// Parses one command line. Blank lines yield `Ok(None)`.
///
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    match verb {
        "seek" => {
            let slot = parts.next().ok_or(CommandError::MissingSlot)?;
            slot.parse()
                .map(|slot| Some(Command::Seek(slot)))
                .map_err(|_| CommandError::InvalidSlot(slot.to_owned()))
        }
        "stats" => Ok(Some(Command::Stats)),
        other => Err(CommandError::Unknown(other.to_owned())),
    }
}

///
/// Renders one outcome as a JSON line. `NoData` renders as `{"noData":true,"slot":N}`.
///
pub fn outcome_to_json_line(outcome: &BuildOutcome) -> Result<String, serde_json::Error> {
    let mut line = match outcome {
        BuildOutcome::Payload(payload) => serde_json::to_string(payload)?,
        BuildOutcome::NoData { slot } => {
            serde_json::to_string(&serde_json::json!({ "slot": slot, "noData": true }))?
        }
    };
    line.push('\n');
    Ok(line)
}

///
/// Writes every outcome of `outcomes` to `out`, one JSON object per line.
///
/// Stops after `max_payloads` payloads when set, and returns the number of payloads written.
pub async fn write_outcomes<S, W>(
    mut outcomes: S,
    mut out: W,
    max_payloads: Option<usize>,
) -> std::io::Result<usize>
where
    S: Stream<Item = BuildOutcome> + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(outcome) = outcomes.next().await {
        let line = outcome_to_json_line(&outcome)?;
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;
        if matches!(outcome, BuildOutcome::Payload(_)) {
            written += 1;
            if max_payloads.is_some_and(|max| written >= max) {
                break;
            }
        }
    }
    Ok(written)
}

///
/// Reads stdin on a dedicated thread so a pending read never holds up runtime shutdown.
///
pub fn spawn_stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(STDIN_LINE_CHANNEL_CAPACITY);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

///
/// Applies commands read from `lines` to the driver until either side closes.
///
pub async fn run_commands(mut lines: mpsc::Receiver<String>, handle: DriverHandle) {
    while let Some(line) = lines.recv().await {
        match parse_command(&line) {
            Ok(Some(Command::Seek(slot))) => {
                if handle.set_cursor(slot).await.is_err() {
                    break;
                }
            }
            Ok(Some(Command::Stats)) => {
                tracing::info!(stats = ?handle.stats(), "driver stats");
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("{e}"),
        }
    }
}
