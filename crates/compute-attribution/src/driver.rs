use {
    crate::{
        payload::BuildOutcome,
        pipeline::{AttributionPipeline, BlockDisposition},
        scheduler::{
            Completion, FetchOutcome, FetchTicket, ReadySlot, SchedulerConfig, SlotScheduler,
        },
        source::{BlockSource, BlockSourceError},
    },
    derive_more::From,
    futures_util::{
        FutureExt, Sink, SinkExt, Stream, StreamExt,
        future::BoxFuture,
        stream::FuturesUnordered,
    },
    solana_clock::Slot,
    std::{sync::Arc, time::Duration},
    tokio::{
        sync::{mpsc, watch},
        time::Instant,
    },
    tokio_stream::wrappers::ReceiverStream,
    tokio_util::sync::PollSender,
};

pub const DEFAULT_PAYLOAD_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_COMMAND_CHANNEL_CAPACITY: usize = 16;

///
/// Counters describing the driver's progress, published on a watch channel after every step.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Next slot to be published or skipped.
    pub cursor: Slot,
    /// Highest slot the driver is allowed to fetch.
    pub tip: Option<Slot>,
    pub fetched: u64,
    pub unavailable: u64,
    pub failed: u64,
    pub timed_out: u64,
    /// Fetched blocks without transactions.
    pub empty: u64,
    pub published: u64,
    pub no_data: u64,
    /// Already recorded slots published again after a rewind.
    pub duplicates: u64,
    /// Blocks whose attribution violated an invariant.
    pub discarded: u64,
    pub stale_dropped: u64,
    pub tip_failures: u64,
    /// Unavailable, timed out or failed slots since the last fetched block.
    pub consecutive_gaps: u64,
    /// Times `consecutive_gaps` crossed the warning threshold.
    pub health_warnings: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCommand {
    SetCursor(Slot),
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError<SnkErr> {
    #[error(transparent)]
    SinkError(SnkErr),
}

#[derive(Debug, thiserror::Error)]
#[error("attribution driver has stopped")]
pub struct DriverClosed;

///
/// Remote control over a running [`AsyncFetchDriver`].
///
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<DriverCommand>,
    stats: watch::Receiver<SchedulerStats>,
}

impl DriverHandle {
    ///
    /// Repoints the cursor at `slot`. Every result fetched for the previous cursor and not yet
    /// published is dropped.
    ///
    pub async fn set_cursor(&self, slot: Slot) -> Result<(), DriverClosed> {
        self.commands
            .send(DriverCommand::SetCursor(slot))
            .await
            .map_err(|_| DriverClosed)
    }

    pub async fn shutdown(&self) -> Result<(), DriverClosed> {
        self.commands
            .send(DriverCommand::Shutdown)
            .await
            .map_err(|_| DriverClosed)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.borrow().clone()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<SchedulerStats> {
        self.stats.clone()
    }
}

#[derive(From)]
enum Work {
    Fetch(FetchTicket, FetchOutcome),
    Tip(Result<Slot, BlockSourceError>),
}

async fn fetch_slot<Src: BlockSource>(
    source: Arc<Src>,
    slot: Slot,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
) -> FetchOutcome {
    let mut attempt = 0;
    loop {
        match tokio::time::timeout(timeout, source.fetch_block(slot)).await {
            Err(_) => return FetchOutcome::TimedOut,
            Ok(Ok(Some(block))) => return FetchOutcome::Fetched(block),
            Ok(Ok(None)) => return FetchOutcome::Unavailable,
            Ok(Err(e)) if attempt < retries => {
                attempt += 1;
                tracing::warn!(slot, attempt, "fetch failed, retrying: {e}");
                tokio::time::sleep(backoff * attempt).await;
            }
            Ok(Err(e)) => return FetchOutcome::Failed(e),
        }
    }
}

///
/// The driver connecting a [`BlockSource`] to the [`AttributionPipeline`].
///
/// It hands slots out of a [`SlotScheduler`], fetches them concurrently up to the configured bound,
/// runs every fetched block through the pipeline in slot order and sends the outcomes to the provided sink.
pub struct AsyncFetchDriver<Src, Snk> {
    source: Arc<Src>,
    sink: Snk,
    config: SchedulerConfig,
    scheduler: SlotScheduler,
    pipeline: AttributionPipeline,
    /// Set until the first cursor is known, either from upstream or from a command.
    awaiting_start: bool,
    commands: mpsc::Receiver<DriverCommand>,
    stats: SchedulerStats,
    stats_tx: watch::Sender<SchedulerStats>,
    tip_in_flight: bool,
    next_tip_poll: Instant,
    last_dispatch: Option<Instant>,
}

impl<Src, Snk, SnkErr> AsyncFetchDriver<Src, Snk>
where
    Src: BlockSource,
    Snk: Sink<BuildOutcome, Error = SnkErr> + Unpin + Send + 'static,
    SnkErr: std::error::Error + Send,
{
    ///
    /// Creates a driver and its control handle.
    ///
    /// Without `start_slot` the cursor starts at the upstream current slot minus the configured lag.
    pub fn new(
        source: Src,
        sink: Snk,
        pipeline: AttributionPipeline,
        config: SchedulerConfig,
        start_slot: Option<Slot>,
    ) -> (Self, DriverHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(DEFAULT_COMMAND_CHANNEL_CAPACITY);
        let start = start_slot.unwrap_or_default();
        let stats = SchedulerStats {
            cursor: start,
            ..Default::default()
        };
        let (stats_tx, stats_rx) = watch::channel(stats.clone());
        let driver = Self {
            source: Arc::new(source),
            sink,
            scheduler: SlotScheduler::new(start, config.max_in_flight),
            pipeline,
            awaiting_start: start_slot.is_none(),
            commands: cmd_rx,
            stats,
            stats_tx,
            tip_in_flight: false,
            next_tip_poll: Instant::now(),
            last_dispatch: None,
            config,
        };
        let handle = DriverHandle {
            commands: cmd_tx,
            stats: stats_rx,
        };
        (driver, handle)
    }

    pub async fn run(mut self) -> Result<(), DriverError<SnkErr>> {
        let mut in_flight: FuturesUnordered<BoxFuture<'static, Work>> = FuturesUnordered::new();
        let mut commands_open = true;

        loop {
            while let Some(ready) = self.scheduler.pop_ready() {
                self.handle_ready(ready).await?;
            }

            let now = Instant::now();
            self.dispatch_fetches(&mut in_flight, now);
            self.maybe_poll_tip(&mut in_flight, now);
            self.publish_stats();

            let wakeup = self.next_wakeup(now);

            tokio::select! {
                biased;
                maybe_cmd = self.commands.recv(), if commands_open => {
                    match maybe_cmd {
                        Some(DriverCommand::SetCursor(slot)) => self.set_cursor(slot),
                        Some(DriverCommand::Shutdown) => {
                            tracing::debug!("attribution driver shutting down");
                            break;
                        }
                        None => {
                            commands_open = false;
                        }
                    }
                }
                Some(work) = in_flight.next(), if !in_flight.is_empty() => {
                    self.handle_work(work);
                }
                _ = tokio::time::sleep_until(wakeup.unwrap_or(now)), if wakeup.is_some() => {}
                else => {
                    tracing::error!("attribution driver has nothing left to wait on");
                    break;
                }
            }
        }
        self.publish_stats();
        Ok(())
    }

    fn set_cursor(&mut self, slot: Slot) {
        tracing::info!(
            "moving cursor from {} to {slot}, dropping {} pending fetches",
            self.scheduler.cursor(),
            self.scheduler.in_flight() + self.scheduler.buffered()
        );
        self.scheduler.reset(slot);
        self.awaiting_start = false;
        self.stats.consecutive_gaps = 0;
    }

    fn rate_limited_until(&self, now: Instant) -> Option<Instant> {
        if self.config.min_fetch_interval_ms == 0 {
            return None;
        }
        let deadline =
            self.last_dispatch? + Duration::from_millis(self.config.min_fetch_interval_ms);
        (deadline > now).then_some(deadline)
    }

    fn dispatch_fetches(
        &mut self,
        in_flight: &mut FuturesUnordered<BoxFuture<'static, Work>>,
        now: Instant,
    ) {
        if self.awaiting_start {
            return;
        }
        while self.rate_limited_until(now).is_none() {
            let Some(ticket) = self.scheduler.poll_dispatch() else {
                break;
            };
            tracing::trace!(slot = ticket.slot, "dispatching fetch");
            self.last_dispatch = Some(now);
            let fut = fetch_slot(
                Arc::clone(&self.source),
                ticket.slot,
                Duration::from_millis(self.config.fetch_timeout_ms),
                self.config.fetch_retries,
                Duration::from_millis(self.config.retry_backoff_ms),
            );
            in_flight.push(fut.map(move |outcome| Work::from((ticket, outcome))).boxed());
        }
    }

    fn maybe_poll_tip(
        &mut self,
        in_flight: &mut FuturesUnordered<BoxFuture<'static, Work>>,
        now: Instant,
    ) {
        let needs_tip = self.awaiting_start || self.scheduler.caught_up();
        if self.tip_in_flight || !needs_tip || now < self.next_tip_poll {
            return;
        }
        self.tip_in_flight = true;
        let source = Arc::clone(&self.source);
        in_flight.push(async move { Work::from(source.current_slot().await) }.boxed());
    }

    fn next_wakeup(&self, now: Instant) -> Option<Instant> {
        let needs_tip = self.awaiting_start || self.scheduler.caught_up();
        let tip_wakeup = (!self.tip_in_flight && needs_tip).then_some(self.next_tip_poll);
        let rate_wakeup = if self.scheduler.caught_up() {
            None
        } else {
            self.rate_limited_until(now)
        };
        match (tip_wakeup, rate_wakeup) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn handle_work(&mut self, work: Work) {
        match work {
            Work::Fetch(ticket, outcome) => {
                if self.scheduler.complete(ticket, outcome) == Completion::Stale {
                    self.stats.stale_dropped += 1;
                }
            }
            Work::Tip(result) => {
                self.tip_in_flight = false;
                self.next_tip_poll =
                    Instant::now() + Duration::from_millis(self.config.tip_poll_interval_ms);
                match result {
                    Ok(current) => {
                        let tip = current.saturating_sub(self.config.slot_lag);
                        if self.awaiting_start {
                            tracing::info!("upstream at slot {current}, starting at {tip}");
                            self.scheduler.reset(tip);
                            self.awaiting_start = false;
                        }
                        self.scheduler.set_tip(tip);
                    }
                    Err(e) => {
                        self.stats.tip_failures += 1;
                        tracing::warn!("failed to fetch upstream current slot: {e}");
                    }
                }
            }
        }
    }

    fn note_gap(&mut self, slot: Slot) {
        self.stats.consecutive_gaps += 1;
        let threshold = self.config.unavailable_warn_threshold;
        if threshold > 0 && self.stats.consecutive_gaps == threshold {
            self.stats.health_warnings += 1;
            tracing::warn!(
                slot,
                "{threshold} consecutive slots unavailable or failed, upstream may be unhealthy"
            );
        }
    }

    async fn publish(&mut self, outcome: BuildOutcome) -> Result<(), DriverError<SnkErr>> {
        self.sink
            .send(outcome)
            .await
            .map_err(DriverError::SinkError)
    }

    async fn handle_ready(&mut self, ready: ReadySlot) -> Result<(), DriverError<SnkErr>> {
        let ReadySlot { slot, outcome } = ready;
        match outcome {
            FetchOutcome::Fetched(block) => {
                self.stats.fetched += 1;
                self.stats.consecutive_gaps = 0;
                if block.is_empty() {
                    self.stats.empty += 1;
                }
                match self.pipeline.process_block(&block) {
                    Ok(BlockDisposition::Built(outcome @ BuildOutcome::Payload(_))) => {
                        self.publish(outcome).await?;
                        self.stats.published += 1;
                    }
                    Ok(BlockDisposition::Built(outcome @ BuildOutcome::NoData { .. })) => {
                        tracing::trace!(slot, "no program invocations in block");
                        self.stats.no_data += 1;
                        if self.config.publish_no_data {
                            self.publish(outcome).await?;
                        }
                    }
                    Ok(BlockDisposition::Replayed(outcome)) => {
                        tracing::debug!(slot, "republishing already recorded slot");
                        self.publish(outcome).await?;
                        self.stats.duplicates += 1;
                        self.stats.published += 1;
                    }
                    Err(e) => {
                        tracing::error!(slot, "discarding block attribution: {e}");
                        self.stats.discarded += 1;
                    }
                }
            }
            FetchOutcome::Unavailable => {
                tracing::trace!(slot, "block unavailable, skipping");
                self.stats.unavailable += 1;
                self.note_gap(slot);
            }
            FetchOutcome::TimedOut => {
                tracing::debug!(slot, "block fetch timed out, skipping");
                self.stats.timed_out += 1;
                self.note_gap(slot);
            }
            FetchOutcome::Failed(e) => {
                tracing::warn!(slot, "giving up on block: {e}");
                self.stats.failed += 1;
                self.note_gap(slot);
            }
        }
        Ok(())
    }

    fn publish_stats(&mut self) {
        self.stats.cursor = self.scheduler.cursor();
        self.stats.tip = self.scheduler.tip();
        self.stats_tx.send_replace(self.stats.clone());
    }
}

///
/// Stream of published outcomes returned by [`spawn_attribution`].
///
pub struct PayloadStream {
    inner: ReceiverStream<BuildOutcome>,
}

impl Stream for PayloadStream {
    type Item = BuildOutcome;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

///
/// Spawns an [`AsyncFetchDriver`] on the current runtime, publishing into a bounded channel.
///
/// The driver stops as soon as the returned stream is dropped, or when [`DriverHandle::shutdown`] is called.
pub fn spawn_attribution<Src>(
    source: Src,
    pipeline: AttributionPipeline,
    config: SchedulerConfig,
    start_slot: Option<Slot>,
) -> (DriverHandle, PayloadStream)
where
    Src: BlockSource,
{
    let (tx, rx) = mpsc::channel(DEFAULT_PAYLOAD_CHANNEL_CAPACITY);
    let receiver_gone = tx.clone();
    let (driver, handle) =
        AsyncFetchDriver::new(source, PollSender::new(tx), pipeline, config, start_slot);

    tokio::spawn(async move {
        // Nothing may be published for a long run of empty or missing slots, so the sink alone
        // would not notice the receiver going away.
        tokio::select! {
            result = driver.run() => {
                if let Err(e) = result {
                    tracing::debug!("attribution driver stopped: {e}");
                }
            }
            _ = receiver_gone.closed() => {
                tracing::debug!("payload stream dropped, stopping attribution driver");
            }
        }
    });

    (
        handle,
        PayloadStream {
            inner: ReceiverStream::new(rx),
        },
    )
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            labels::AddressLabels,
            pipeline::PipelineConfig,
            testkit::{MockBlockSource, MockResponse, setup_tracing_test, simple_block},
            transaction::Block,
        },
    };

    fn config(max_in_flight: usize) -> SchedulerConfig {
        SchedulerConfig {
            slot_lag: 0,
            max_in_flight,
            fetch_timeout_ms: 1_000,
            fetch_retries: 1,
            retry_backoff_ms: 10,
            ..Default::default()
        }
    }

    fn pipeline() -> AttributionPipeline {
        AttributionPipeline::new(PipelineConfig::default(), AddressLabels::empty())
    }

    async fn next_slots(stream: &mut PayloadStream, n: usize) -> Vec<Slot> {
        let mut slots = Vec::with_capacity(n);
        for _ in 0..n {
            let outcome = stream.next().await.expect("stream closed");
            slots.push(outcome.slot());
        }
        slots
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_publish_in_slot_order_with_concurrent_fetches() {
        let _ = setup_tracing_test("compute_attribution");
        let source = MockBlockSource::new(14);
        let delays = [50, 10, 40, 0, 20];
        for (i, delay) in delays.into_iter().enumerate() {
            let slot = 10 + i as Slot;
            source.script(
                slot,
                MockResponse::Delay(
                    Duration::from_millis(delay),
                    simple_block(slot, "P", 100, &["a"]),
                ),
            );
        }

        let (_handle, mut stream) =
            spawn_attribution(source.clone(), pipeline(), config(3), Some(10));
        assert_eq!(next_slots(&mut stream, 5).await, vec![10, 11, 12, 13, 14]);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_start_behind_upstream_slot() {
        let source = MockBlockSource::new(132);
        source.script(100, MockResponse::Block(simple_block(100, "P", 100, &["a"])));
        let config = SchedulerConfig {
            slot_lag: 32,
            ..config(1)
        };

        let (_handle, mut stream) = spawn_attribution(source.clone(), pipeline(), config, None);
        assert_eq!(next_slots(&mut stream, 1).await, vec![100]);
        assert_eq!(source.fetched_slots()[0], 100);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_skip_unavailable_and_failed_slots() {
        let source = MockBlockSource::new(13);
        source.script(10, MockResponse::Block(simple_block(10, "P", 100, &["a"])));
        source.script(12, MockResponse::Fail);
        source.script(13, MockResponse::Block(simple_block(13, "P", 100, &["a"])));

        let (handle, mut stream) =
            spawn_attribution(source.clone(), pipeline(), config(1), Some(10));
        assert_eq!(next_slots(&mut stream, 2).await, vec![10, 13]);

        let mut stats = handle.subscribe_stats();
        let stats = stats.wait_for(|s| s.published == 2).await.unwrap().clone();
        assert_eq!(stats.unavailable, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.cursor, 14);
        // one retry for the failing slot
        assert_eq!(source.fetched_slots(), vec![10, 11, 12, 12, 13]);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_treat_hung_fetch_as_unavailable() {
        let source = MockBlockSource::new(11);
        source.script(10, MockResponse::Hang);
        source.script(11, MockResponse::Block(simple_block(11, "P", 100, &["a"])));

        let (handle, mut stream) =
            spawn_attribution(source.clone(), pipeline(), config(1), Some(10));
        assert_eq!(next_slots(&mut stream, 1).await, vec![11]);

        let mut stats = handle.subscribe_stats();
        let stats = stats.wait_for(|s| s.published == 1).await.unwrap().clone();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.consecutive_gaps, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_drop_in_flight_results_after_set_cursor() {
        let source = MockBlockSource::new(20);
        for slot in [10, 11] {
            source.script(
                slot,
                MockResponse::Delay(
                    Duration::from_secs(1),
                    simple_block(slot, "OLD", 100, &["a"]),
                ),
            );
        }
        for slot in [5, 6] {
            source.script(slot, MockResponse::Block(simple_block(slot, "NEW", 100, &["b"])));
        }

        let (handle, mut stream) =
            spawn_attribution(source.clone(), pipeline(), config(2), Some(10));
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.set_cursor(5).await.unwrap();

        assert_eq!(next_slots(&mut stream, 4).await, vec![5, 6, 10, 11]);
        assert_eq!(handle.stats().stale_dropped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_republish_without_recording_twice_after_rewind() {
        let source = MockBlockSource::new(11);
        for slot in [10, 11, 12] {
            source.script(slot, MockResponse::Block(simple_block(slot, "P", 100, &["a"])));
        }

        let (handle, mut stream) =
            spawn_attribution(source.clone(), pipeline(), config(1), Some(10));
        assert_eq!(next_slots(&mut stream, 2).await, vec![10, 11]);

        source.set_current_slot(12);
        handle.set_cursor(10).await.unwrap();

        let mut replayed = Vec::new();
        for _ in 0..3 {
            let payload = stream.next().await.unwrap().into_payload().unwrap();
            replayed.push((payload.slot, payload.insights));
        }
        assert_eq!(
            replayed,
            vec![
                (10, vec![("a".to_owned(), 200)]),
                (11, vec![("a".to_owned(), 200)]),
                (12, vec![("a".to_owned(), 300)]),
            ]
        );
        let mut stats = handle.subscribe_stats();
        let stats = stats.wait_for(|s| s.published == 5).await.unwrap().clone();
        assert_eq!(stats.duplicates, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_space_dispatches_by_min_fetch_interval() {
        let source = MockBlockSource::new(14);
        for slot in 10..=14 {
            source.script(slot, MockResponse::Block(simple_block(slot, "P", 100, &["a"])));
        }
        let config = SchedulerConfig {
            min_fetch_interval_ms: 100,
            ..config(3)
        };

        let (_handle, mut stream) = spawn_attribution(source.clone(), pipeline(), config, Some(10));
        assert_eq!(next_slots(&mut stream, 5).await, vec![10, 11, 12, 13, 14]);

        let times = source.fetch_times();
        let first = times[0].1;
        let offsets: Vec<(Slot, u128)> = times
            .iter()
            .map(|(slot, at)| (*slot, at.duration_since(first).as_millis()))
            .collect();
        assert_eq!(
            offsets,
            vec![(10, 0), (11, 100), (12, 200), (13, 300), (14, 400)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_count_consecutive_gaps_and_reset_on_fetch() {
        let source = MockBlockSource::new(13);
        source.script(
            13,
            MockResponse::Delay(Duration::from_secs(1), simple_block(13, "P", 100, &["a"])),
        );
        let config = SchedulerConfig {
            unavailable_warn_threshold: 3,
            ..config(4)
        };

        let (handle, mut stream) = spawn_attribution(source.clone(), pipeline(), config, Some(10));
        let mut stats = handle.subscribe_stats();
        let gaps = stats
            .wait_for(|s| s.consecutive_gaps == 3)
            .await
            .unwrap()
            .clone();
        assert_eq!(gaps.unavailable, 3);
        assert_eq!(gaps.health_warnings, 1);

        assert_eq!(next_slots(&mut stream, 1).await, vec![13]);
        let stats = stats.wait_for(|s| s.published == 1).await.unwrap().clone();
        assert_eq!(stats.consecutive_gaps, 0);
        assert_eq!(stats.health_warnings, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_stop_when_payload_stream_is_dropped() {
        let source = MockBlockSource::new(1_000);
        let (handle, stream) = spawn_attribution(source.clone(), pipeline(), config(1), Some(10));
        let mut stats = handle.subscribe_stats();
        stats.wait_for(|s| s.unavailable > 0).await.unwrap();

        drop(stream);
        while stats.changed().await.is_ok() {}
        assert!(handle.set_cursor(10).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_publish_no_data_only_when_configured() {
        let source = MockBlockSource::new(11);
        source.script(10, MockResponse::Block(Block::new(10, vec![])));
        source.script(11, MockResponse::Block(simple_block(11, "P", 100, &["a"])));

        let (_handle, mut stream) =
            spawn_attribution(source.clone(), pipeline(), config(1), Some(10));
        assert_eq!(next_slots(&mut stream, 1).await, vec![11]);

        let config = SchedulerConfig {
            publish_no_data: true,
            ..config(1)
        };
        let (handle, mut stream) = spawn_attribution(source.clone(), pipeline(), config, Some(10));
        assert_eq!(
            stream.next().await.unwrap(),
            BuildOutcome::NoData { slot: 10 }
        );
        assert_eq!(next_slots(&mut stream, 1).await, vec![11]);
        handle.shutdown().await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_stop_when_sink_is_closed() {
        let source = MockBlockSource::new(10);
        source.script(10, MockResponse::Block(simple_block(10, "P", 100, &["a"])));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let (driver, _handle) =
            AsyncFetchDriver::new(source, PollSender::new(tx), pipeline(), config(1), Some(10));
        let result = driver.run().await;
        assert!(matches!(result, Err(DriverError::SinkError(_))));
    }
}
