use {crate::transaction::Block, async_trait::async_trait, solana_clock::Slot, std::sync::Arc};

#[derive(Debug, Clone, thiserror::Error)]
pub enum BlockSourceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("failed to decode block: {0}")]
    Decode(String),
}

///
/// Upstream provider of blocks by slot.
///
/// `Ok(None)` means the slot has no block available (skipped, not yet produced, or pruned).
/// Implementations must not panic; every failure is reported through [`BlockSourceError`].
///
#[async_trait]
pub trait BlockSource: Send + Sync + 'static {
    async fn current_slot(&self) -> Result<Slot, BlockSourceError>;

    async fn fetch_block(&self, slot: Slot) -> Result<Option<Block>, BlockSourceError>;
}

#[async_trait]
impl<S> BlockSource for Arc<S>
where
    S: BlockSource + ?Sized,
{
    async fn current_slot(&self) -> Result<Slot, BlockSourceError> {
        (**self).current_slot().await
    }

    async fn fetch_block(&self, slot: Slot) -> Result<Option<Block>, BlockSourceError> {
        (**self).fetch_block(slot).await
    }
}
