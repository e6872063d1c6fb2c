use {
    crate::{source::BlockSourceError, transaction::Block},
    serde::Deserialize,
    solana_clock::Slot,
    std::collections::{BTreeMap, BTreeSet},
};

///
/// Identifies one issued fetch. The epoch changes on every cursor reset so results of fetches
/// issued before a reset can be told apart and dropped.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub slot: Slot,
    pub epoch: u64,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(Block),
    Unavailable,
    TimedOut,
    Failed(BlockSourceError),
}

#[derive(Debug)]
pub struct ReadySlot {
    pub slot: Slot,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Accepted,
    /// Issued before the last cursor reset.
    Stale,
}

///
/// Slot cursor and bounded work queue.
///
/// Sans-IO: it hands out [`FetchTicket`]s, accepts their outcomes in any order and releases them
/// strictly in slot order through [`SlotScheduler::pop_ready`]. With `max_in_flight == 1` this is
/// sequential single-flight; larger values give a sliding window whose width bounds both the
/// number of outstanding fetches and the number of buffered results.
///
#[derive(Debug)]
pub struct SlotScheduler {
    epoch: u64,
    next_dispatch: Slot,
    next_release: Slot,
    tip: Option<Slot>,
    max_in_flight: usize,
    /// Every issued fetch not yet completed, stale ones included.
    outstanding: usize,
    pending: BTreeSet<Slot>,
    completed: BTreeMap<Slot, FetchOutcome>,
}

impl SlotScheduler {
    pub fn new(start: Slot, max_in_flight: usize) -> Self {
        Self {
            epoch: 0,
            next_dispatch: start,
            next_release: start,
            tip: None,
            max_in_flight: max_in_flight.max(1),
            outstanding: 0,
            pending: Default::default(),
            completed: Default::default(),
        }
    }

    ///
    /// Next slot to be released (published or skipped).
    ///
    pub fn cursor(&self) -> Slot {
        self.next_release
    }

    pub fn next_dispatch(&self) -> Slot {
        self.next_dispatch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn tip(&self) -> Option<Slot> {
        self.tip
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn buffered(&self) -> usize {
        self.completed.len()
    }

    ///
    /// Highest slot the scheduler may dispatch. Only moves forward.
    ///
    pub fn set_tip(&mut self, tip: Slot) {
        self.tip = Some(self.tip.map_or(tip, |current| current.max(tip)));
    }

    ///
    /// True when every dispatchable slot up to the tip has been handed out.
    ///
    pub fn caught_up(&self) -> bool {
        self.tip.is_none_or(|tip| self.next_dispatch > tip)
    }

    ///
    /// Hands out the next fetch if the work queue has room and the tip allows it.
    ///
    pub fn poll_dispatch(&mut self) -> Option<FetchTicket> {
        if self.caught_up() || self.outstanding >= self.max_in_flight {
            return None;
        }
        let window = self.next_dispatch.saturating_sub(self.next_release);
        if window >= self.max_in_flight as u64 {
            return None;
        }
        let ticket = FetchTicket {
            slot: self.next_dispatch,
            epoch: self.epoch,
        };
        self.next_dispatch += 1;
        self.outstanding += 1;
        self.pending.insert(ticket.slot);
        Some(ticket)
    }

    pub fn complete(&mut self, ticket: FetchTicket, outcome: FetchOutcome) -> Completion {
        self.outstanding = self.outstanding.saturating_sub(1);
        if ticket.epoch != self.epoch || !self.pending.remove(&ticket.slot) {
            tracing::trace!(
                "dropping stale fetch result for slot {} (epoch {}, current {})",
                ticket.slot,
                ticket.epoch,
                self.epoch
            );
            return Completion::Stale;
        }
        self.completed.insert(ticket.slot, outcome);
        Completion::Accepted
    }

    ///
    /// Releases the outcome of the cursor slot once it is available, advancing the cursor.
    ///
    pub fn pop_ready(&mut self) -> Option<ReadySlot> {
        let outcome = self.completed.remove(&self.next_release)?;
        let slot = self.next_release;
        self.next_release += 1;
        Some(ReadySlot { slot, outcome })
    }

    ///
    /// Repoints the cursor at `slot`, forgetting every pending or buffered result of the old cursor.
    ///
    /// Fetches already issued keep counting against the in-flight bound until they complete.
    pub fn reset(&mut self, slot: Slot) {
        self.epoch += 1;
        self.pending.clear();
        self.completed.clear();
        self.next_dispatch = slot;
        self.next_release = slot;
    }
}

pub const DEFAULT_SLOT_LAG: u64 = 32;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Distance kept behind the upstream current slot.
    pub slot_lag: u64,
    pub max_in_flight: usize,
    pub fetch_timeout_ms: u64,
    /// Retries of a slot after a transport failure before it is skipped.
    pub fetch_retries: u32,
    pub retry_backoff_ms: u64,
    /// Minimum spacing between two fetch dispatches. Zero disables rate limiting.
    pub min_fetch_interval_ms: u64,
    /// How long to wait before asking upstream for a new tip once caught up.
    pub tip_poll_interval_ms: u64,
    /// Consecutive unavailable or failed slots before a health warning is logged.
    pub unavailable_warn_threshold: u64,
    /// Publish a `NoData` outcome as nothing (false) or let subscribers see the gap (true).
    pub publish_no_data: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slot_lag: DEFAULT_SLOT_LAG,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            fetch_timeout_ms: 10_000,
            fetch_retries: 2,
            retry_backoff_ms: 250,
            min_fetch_interval_ms: 0,
            tip_poll_interval_ms: 400,
            unavailable_warn_threshold: 20,
            publish_no_data: false,
        }
    }
}
