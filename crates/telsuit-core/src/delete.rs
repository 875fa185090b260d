//! Rate-limited batch deletion.
//!
//! The pause between batches is a hard requirement, not an optimization:
//! unpaced bulk deletion trips platform flood protection, which the caller
//! cannot tell apart from a permanent failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    dedup::DeletionPlan,
    domain::{ChatId, PostId},
    messaging::port::ChannelClient,
};

pub const DELETE_BATCH_SIZE: usize = 50;
pub const BATCH_PAUSE: Duration = Duration::from_millis(400);

pub struct BatchDeleter {
    client: Arc<dyn ChannelClient>,
    batch_size: usize,
    pause: Duration,
}

impl BatchDeleter {
    pub fn new(client: Arc<dyn ChannelClient>) -> Self {
        Self {
            client,
            batch_size: DELETE_BATCH_SIZE,
            pause: BATCH_PAUSE,
        }
    }

    pub fn with_pacing(client: Arc<dyn ChannelClient>, batch_size: usize, pause: Duration) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            pause,
        }
    }

    /// Request deletion of `ids` in fixed-size batches with a pause between
    /// them. A failing batch is logged and skipped; later batches still run.
    /// The returned count covers only successfully requested ids; partial
    /// success is reported as-is, never rounded up.
    pub async fn delete_many(&self, chat_id: ChatId, ids: &[PostId]) -> usize {
        let mut deleted = 0usize;
        for (index, batch) in ids.chunks(self.batch_size).enumerate() {
            if index > 0 {
                sleep(self.pause).await;
            }
            match self.client.delete_posts(chat_id, batch).await {
                Ok(count) => {
                    deleted += count;
                    debug!(chat = chat_id.0, batch = index, count, "deleted batch");
                }
                Err(e) => {
                    warn!(
                        chat = chat_id.0,
                        batch = index,
                        size = batch.len(),
                        "delete batch failed: {e}"
                    );
                }
            }
        }
        deleted
    }

    /// Run every entry of a deletion plan; returns the total requested count.
    pub async fn execute(&self, chat_id: ChatId, plan: &DeletionPlan) -> usize {
        let mut total = 0usize;
        for entry in &plan.entries {
            total += self.delete_many(chat_id, &entry.delete).await;
        }
        total
    }
}
