use {
    crate::{
        attribution::{AttributionError, attribute_block},
        insights::{DEFAULT_INSIGHTS_TOP_K, DEFAULT_WINDOW_CAPACITY, RollingInsights},
        labels::AddressLabels,
        payload::{BuildOutcome, DEFAULT_TOP_ACCOUNTS, build_payload},
        transaction::Block,
    },
    rustc_hash::FxHashSet,
    serde::Deserialize,
    solana_clock::Slot,
    std::collections::VecDeque,
};

pub const DEFAULT_RECENT_SLOT_MEMORY: usize = 4096;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of blocks retained by the rolling insight window.
    pub window_capacity: usize,
    /// Number of accounts returned as insights.
    pub insights_top_k: usize,
    /// Number of informative accounts kept per payload.
    pub top_accounts: usize,
    /// How many recorded slots are remembered to refuse double-recording after a rewind.
    pub recent_slot_memory: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            insights_top_k: DEFAULT_INSIGHTS_TOP_K,
            top_accounts: DEFAULT_TOP_ACCOUNTS,
            recent_slot_memory: DEFAULT_RECENT_SLOT_MEMORY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("slot {slot}: {source}")]
pub struct PipelineError {
    pub slot: Slot,
    #[source]
    pub source: AttributionError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDisposition {
    Built(BuildOutcome),
    ///
    /// The slot was already recorded into the rolling window. The payload carries the block's own
    /// attribution and the current insights; the window is left untouched.
    ///
    Replayed(BuildOutcome),
}

///
/// Bounded FIFO memory of slots.
///
#[derive(Debug)]
struct RecentSlots {
    capacity: usize,
    order: VecDeque<Slot>,
    members: FxHashSet<Slot>,
}

impl RecentSlots {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            members: FxHashSet::default(),
        }
    }

    fn contains(&self, slot: Slot) -> bool {
        self.members.contains(&slot)
    }

    fn insert(&mut self, slot: Slot) {
        if !self.members.insert(slot) {
            return;
        }
        self.order.push_back(slot);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }
}

///
/// Per-block processing: log parsing, attribution, rolling window update and payload assembly.
///
/// Sans-IO and single-writer: the owner must call [`AttributionPipeline::process_block`] in slot
/// order, once per fetched block.
///
#[derive(Debug)]
pub struct AttributionPipeline {
    config: PipelineConfig,
    labels: AddressLabels,
    insights: RollingInsights,
    recorded: RecentSlots,
}

impl Default for AttributionPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default(), AddressLabels::with_well_known())
    }
}

impl AttributionPipeline {
    pub fn new(config: PipelineConfig, labels: AddressLabels) -> Self {
        Self {
            insights: RollingInsights::new(config.window_capacity, config.insights_top_k),
            recorded: RecentSlots::new(config.recent_slot_memory),
            labels,
            config,
        }
    }

    pub fn insights(&self) -> &RollingInsights {
        &self.insights
    }

    pub fn labels(&self) -> &AddressLabels {
        &self.labels
    }

    ///
    /// Processes one block.
    ///
    /// Blocks without transactions or without any program invocation build [`BuildOutcome::NoData`]
    /// and leave the window untouched. A block whose attribution violates an invariant is
    /// discarded and reported as an error; the window is untouched as well.
    ///
    /// A slot already recorded, typically after the cursor was moved back, is built again but
    /// never recorded twice.
    ///
    pub fn process_block(&mut self, block: &Block) -> Result<BlockDisposition, PipelineError> {
        let slot = block.slot;
        if block.is_empty() {
            return Ok(BlockDisposition::Built(BuildOutcome::NoData { slot }));
        }

        let attribution =
            attribute_block(block).map_err(|source| PipelineError { slot, source })?;
        if attribution.is_empty() {
            return Ok(BlockDisposition::Built(BuildOutcome::NoData { slot }));
        }

        if self.recorded.contains(slot) {
            tracing::debug!("slot {slot} already recorded, replaying without recording");
            let outcome = build_payload(
                slot,
                &attribution,
                self.insights.compute_insights(),
                &self.labels,
                self.config.top_accounts,
            );
            return Ok(BlockDisposition::Replayed(outcome));
        }

        self.insights
            .record_block(slot, attribution.account_compute().clone());
        self.recorded.insert(slot);

        let outcome = build_payload(
            slot,
            &attribution,
            self.insights.compute_insights(),
            &self.labels,
            self.config.top_accounts,
        );
        Ok(BlockDisposition::Built(outcome))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testkit::{legacy_tx, logs, simple_block},
    };

    #[test]
    fn it_should_record_a_slot_at_most_once() {
        let mut pipeline = AttributionPipeline::default();
        let block = simple_block(10, "ABC", 900, &["X", "Y"]);

        let first = pipeline.process_block(&block).unwrap();
        let BlockDisposition::Built(BuildOutcome::Payload(payload)) = first else {
            panic!("expected payload, got {first:?}");
        };
        assert_eq!(payload.insights, vec![("X".to_owned(), 450), ("Y".to_owned(), 450)]);

        let second = pipeline.process_block(&block).unwrap();
        let BlockDisposition::Replayed(BuildOutcome::Payload(replayed)) = second else {
            panic!("expected replayed payload, got {second:?}");
        };
        assert_eq!(replayed.slot, 10);
        assert_eq!(replayed.programs_compute_units[0].compute_units, 900);
        assert_eq!(replayed.insights, payload.insights);
        assert_eq!(pipeline.insights().len(), 1);
        assert_eq!(
            pipeline.insights().compute_insights(),
            vec![("X".to_owned(), 450), ("Y".to_owned(), 450)]
        );
    }

    #[test]
    fn it_should_build_no_data_for_empty_blocks_without_recording() {
        let mut pipeline = AttributionPipeline::default();
        let empty = Block::new(3, vec![]);
        assert_eq!(
            pipeline.process_block(&empty).unwrap(),
            BlockDisposition::Built(BuildOutcome::NoData { slot: 3 })
        );

        let silent = Block::new(4, vec![legacy_tx(&["payer"], 0, vec![], None)]);
        assert_eq!(
            pipeline.process_block(&silent).unwrap(),
            BlockDisposition::Built(BuildOutcome::NoData { slot: 4 })
        );
        assert!(pipeline.insights().is_empty());
    }

    #[test]
    fn it_should_discard_blocks_violating_invariants() {
        let mut pipeline = AttributionPipeline::default();
        let max = u64::MAX;
        let bad = Block::new(
            5,
            vec![
                legacy_tx(
                    &["payer", "ABC"],
                    1,
                    vec![],
                    logs(&[&format!("Program ABC consumed {max} of {max} compute units")]),
                ),
                legacy_tx(
                    &["payer", "ABC"],
                    1,
                    vec![],
                    logs(&["Program ABC consumed 1 of 5 compute units"]),
                ),
            ],
        );
        let err = pipeline.process_block(&bad).unwrap_err();
        assert_eq!(err.slot, 5);
        assert_eq!(
            err.source,
            AttributionError::Overflow {
                address: "ABC".to_owned()
            }
        );
        assert!(pipeline.insights().is_empty());
    }

    #[test]
    fn it_should_keep_block_when_one_transaction_consumes_above_limit() {
        let mut pipeline = AttributionPipeline::default();
        let block = Block::new(
            6,
            vec![
                legacy_tx(
                    &["payer", "ABC"],
                    1,
                    vec![],
                    logs(&["Program ABC consumed 10 of 5 compute units"]),
                ),
                simple_block(6, "ABC", 900, &["X"]).transactions.remove(0),
            ],
        );
        let BlockDisposition::Built(BuildOutcome::Payload(payload)) =
            pipeline.process_block(&block).unwrap()
        else {
            panic!("expected payload");
        };
        assert_eq!(payload.insights, vec![("X".to_owned(), 900)]);
    }

    #[test]
    fn it_should_exclude_first_block_after_window_rolls_over() {
        let mut pipeline = AttributionPipeline::new(
            PipelineConfig {
                window_capacity: 5,
                ..Default::default()
            },
            AddressLabels::empty(),
        );
        pipeline
            .process_block(&simple_block(0, "P", 1_000, &["whale"]))
            .unwrap();
        let mut last = None;
        for slot in 1..=5 {
            last = Some(
                pipeline
                    .process_block(&simple_block(slot, "P", 10, &["minnow"]))
                    .unwrap(),
            );
        }
        let Some(BlockDisposition::Built(BuildOutcome::Payload(payload))) = last else {
            panic!("expected payload");
        };
        assert_eq!(payload.insights, vec![("minnow".to_owned(), 50)]);
    }

    #[test]
    fn it_should_forget_oldest_recorded_slots() {
        let mut recent = RecentSlots::new(2);
        recent.insert(1);
        recent.insert(2);
        recent.insert(2);
        recent.insert(3);
        assert!(!recent.contains(1));
        assert!(recent.contains(2));
        assert!(recent.contains(3));
    }
}
