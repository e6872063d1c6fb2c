//! Compute Attribution
//!
//! This crate turns confirmed Solana blocks into a per-block picture of where compute went: which programs
//! consumed compute units and which writable accounts that compute was spent on.
//!
//! Every fetched block goes through the same steps:
//!
//! 1. The log parser scans each transaction's log lines for `Program <address> consumed <N> of <M> compute units`
//!    and resolves, for every match, the writable accounts referenced by the instructions invoking that program.
//! 2. The attribution engine sums compute per program and splits each invocation's compute across the writable
//!    accounts it touched.
//! 3. The rolling insights keep the per-account totals of the last few blocks and rank the heaviest accounts
//!    over that window.
//! 4. The payload builder assembles the canonical record handed to subscribers.
//!
//! The core is sans-IO: [`pipeline::AttributionPipeline`] and [`scheduler::SlotScheduler`] never touch the
//! network and can be driven by hand. [`driver::AsyncFetchDriver`] is the async driver wiring a
//! [`source::BlockSource`] to both of them, and the `rpc` feature provides a JSON-RPC block source.
//!
//! # Splitting compute across accounts
//!
//! An invocation reporting `N` consumed units and touching `k` writable account positions credits
//! `floor(N / k)` units to the account at each position. An account appearing at several positions is credited
//! once per position. An invocation without any writable account only counts towards its program total.
//!
//! | writable accounts | 900 units          | 1000 units        |
//! |-------------------|--------------------|-------------------|
//! | `[X]`             | X = 900            | X = 1000          |
//! | `[X, Y]`          | X = 450, Y = 450   | X = 500, Y = 500  |
//! | `[X, Y, Z]`       | 300 each           | 333 each          |
//!
//! # Ordering guarantees
//!
//! Fetches may complete out of order when more than one is in flight, but outcomes are released strictly in slot
//! order and the rolling window is only mutated by the single driver task. Moving the cursor with
//! [`driver::DriverHandle::set_cursor`] drops every result fetched for the previous cursor. A slot already
//! recorded into the window is published again after a rewind, with its own attribution and the current insights,
//! but never recorded twice.
//!
//! # Example
//!
//! ```ignore
//! use {
//!     compute_attribution::{
//!         driver::spawn_attribution, payload::BuildOutcome, pipeline::AttributionPipeline,
//!         rpc::JsonRpcBlockSource, scheduler::SchedulerConfig,
//!     },
//!     futures_util::StreamExt,
//!     solana_commitment_config::CommitmentLevel,
//!     std::time::Duration,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = JsonRpcBlockSource::new(
//!         "https://api.mainnet-beta.solana.com",
//!         CommitmentLevel::Confirmed,
//!         Duration::from_secs(30),
//!     )
//!     .expect("rpc client");
//!
//!     let (handle, mut payloads) = spawn_attribution(
//!         source,
//!         AttributionPipeline::default(),
//!         SchedulerConfig::default(),
//!         None,
//!     );
//!
//!     while let Some(outcome) = payloads.next().await {
//!         if let BuildOutcome::Payload(payload) = outcome {
//!             println!("{}", serde_json::to_string(&payload).unwrap());
//!         }
//!     }
//!     let _ = handle.shutdown().await;
//! }
//! ```
//!
//! ## IMPORTANT QUIRKS
//!
//! - Transactions whose metadata reports zero compute units consumed are ignored, transactions without that
//!   field are processed.
//! - A transaction whose logs report more units consumed than the invocation's limit contributes nothing. A
//!   block whose totals overflow is discarded entirely, nothing from it reaches the window.
//! - Blocks without transactions, or without a single program invocation, yield [`payload::BuildOutcome::NoData`]
//!   and are not recorded into the window.

pub mod attribution;
pub mod driver;
pub mod insights;
pub mod labels;
pub mod log_parser;
pub mod payload;
pub mod pipeline;
#[cfg(feature = "rpc")]
pub mod rpc;
pub mod scheduler;
pub mod source;
pub mod tally;
#[cfg(test)]
pub mod testkit;
pub mod transaction;
