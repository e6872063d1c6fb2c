use {
    crate::{attribution::AccountComputeMap, tally::OrderedTally},
    solana_clock::Slot,
    std::collections::VecDeque,
};

pub const DEFAULT_WINDOW_CAPACITY: usize = 5;
pub const DEFAULT_INSIGHTS_TOP_K: usize = 10;

///
/// One ranked account over the rolling window, serialized as `[address, computeUnits]`.
///
pub type Insight = (String, u64);

///
/// Bounded history of the most recent blocks' account compute maps.
///
/// Owned by the pipeline and mutated once per processed block; [`RollingInsights::compute_insights`]
/// never mutates the window.
///
#[derive(Debug)]
pub struct RollingInsights {
    capacity: usize,
    top_k: usize,
    window: VecDeque<(Slot, AccountComputeMap)>,
}

impl Default for RollingInsights {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY, DEFAULT_INSIGHTS_TOP_K)
    }
}

impl RollingInsights {
    ///
    /// Creates an empty window. A capacity of zero is raised to one.
    ///
    pub fn new(capacity: usize, top_k: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            top_k,
            window: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    ///
    /// Slots currently retained, oldest first.
    ///
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.window.iter().map(|(slot, _)| *slot)
    }

    ///
    /// Pushes a block's account compute map, evicting the oldest beyond capacity.
    ///
    /// Returns the slot of the evicted block, if any.
    pub fn record_block(&mut self, slot: Slot, accounts: AccountComputeMap) -> Option<Slot> {
        self.window.push_back((slot, accounts));
        if self.window.len() > self.capacity {
            self.window.pop_front().map(|(evicted, _)| evicted)
        } else {
            None
        }
    }

    ///
    /// Sums every retained map per account and returns the top-K, descending.
    /// Ties keep the order in which accounts were first seen, oldest block first.
    ///
    pub fn compute_insights(&self) -> Vec<Insight> {
        let merged: OrderedTally<String> = self
            .window
            .iter()
            .flat_map(|(_, accounts)| accounts.iter())
            .map(|(address, units)| (address.clone(), units))
            .collect();
        merged.ranked(self.top_k)
    }
}
