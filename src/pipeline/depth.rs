//! The depth-update pipeline: spec.md §4.5.
//!
//! Grounded in the teacher's `binance/stream.rs::spawn_stream_handler`
//! task-loop shape (receive from an mpsc channel fed by the transport,
//! match on frame kind, mutate local state) and in
//! `original_source/binance_etl/etls/spot_depth_updates_etl.py` for the
//! exact per-frame discard/sync/persist sequencing.

use std::sync::Arc;

use serde_derive::Deserialize;
use tokio::sync::mpsc;

use super::PipelineError;
use crate::{
    clock::now_ms,
    consistency::{Consistency, ConsistencyMonitor},
    model::{flatten_depth_rows, BookSnapshot, DepthUpdate},
    rest::SnapshotClient,
    storage::StorageSink,
    sync::{DepthSynchronizer, SyncOutcome},
    transport::Frame,
};

#[derive(Deserialize)]
struct EventEnvelope {
    #[serde(rename = "e")]
    event: String,
}

pub struct DepthPipeline {
    symbol: String,
    snapshot_client: Arc<dyn SnapshotClient>,
    snapshot_limit: u32,
    sink: Arc<dyn StorageSink>,
    total_messages: u64,
    total_bids: u64,
    total_asks: u64,
}

impl DepthPipeline {
    pub fn new(
        symbol: String,
        snapshot_client: Arc<dyn SnapshotClient>,
        snapshot_limit: u32,
        sink: Arc<dyn StorageSink>,
    ) -> Self {
        DepthPipeline {
            symbol,
            snapshot_client,
            snapshot_limit,
            sink,
            total_messages: 0,
            total_bids: 0,
            total_asks: 0,
        }
    }

    /// Runs until `frames` closes (the transport stopped) or a fatal error
    /// occurs (spec.md §4.5/§7: a sequence gap once synced, or a storage
    /// failure). Drains the storage sink on every exit path (spec.md §9
    /// open question i, §2 "stopping ... drains the storage sink").
    pub async fn run(mut self, frames: mpsc::Receiver<Frame>) -> Result<(), PipelineError> {
        let result = self.run_inner(frames).await;
        if let Err(err) = self.sink.close().await {
            tracing::error!(%err, "failed to flush storage sink while stopping pipeline");
            return result.and(Err(err.into()));
        }
        result
    }

    async fn run_inner(&mut self, mut frames: mpsc::Receiver<Frame>) -> Result<(), PipelineError> {
        let span = tracing::info_span!("depth_pipeline", symbol = %self.symbol);
        let _entered = span.enter();

        let mut consistency = ConsistencyMonitor::new();
        let mut sync = DepthSynchronizer::new();

        while let Some(frame) = frames.recv().await {
            let text = match frame {
                Frame::Opened => {
                    // Reconnection is a resync trigger: discard whatever
                    // partial sync state existed and start over.
                    sync = DepthSynchronizer::new();
                    continue;
                }
                Frame::Text(text) => text,
            };

            let local_timestamp = now_ms();
            let Some(update) = Self::parse_depth_frame(&text, local_timestamp) else {
                continue;
            };

            self.total_messages += 1;
            self.total_bids += update.bids.len() as u64;
            self.total_asks += update.asks.len() as u64;

            if let Consistency::Gap { expected, actual } = consistency.check(&update) {
                if sync.is_synced() {
                    tracing::debug!(
                        total_messages = self.total_messages,
                        total_bids = self.total_bids,
                        total_asks = self.total_asks,
                        "pipeline stopping on sequence gap"
                    );
                    return Err(PipelineError::SequenceGap { expected, actual });
                }
                tracing::warn!(expected, actual, "sequence gap while unsynced, still buffering");
            }

            if sync.is_synced() {
                self.persist_update(&update, false).await?;
                continue;
            }

            match sync
                .try_to_sync(&self.symbol, update, self.snapshot_client.as_ref(), self.snapshot_limit)
                .await
            {
                SyncOutcome::Pending => {}
                SyncOutcome::Synced { snapshot, updates } => {
                    self.persist_snapshot(&snapshot, local_timestamp).await?;
                    for update in &updates {
                        self.persist_update(update, false).await?;
                    }
                    tracing::info!(
                        snapshot_last_update_id = snapshot.last_update_id,
                        replayed_updates = updates.len(),
                        "book synced"
                    );
                }
            }
        }

        tracing::debug!(
            total_messages = self.total_messages,
            total_bids = self.total_bids,
            total_asks = self.total_asks,
            "pipeline stopped"
        );
        Ok(())
    }

    fn parse_depth_frame(text: &str, local_timestamp: i64) -> Option<DepthUpdate> {
        let envelope: EventEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(%err, "failed to deserialize frame, discarding");
                return None;
            }
        };
        if envelope.event != "depthUpdate" {
            return None;
        }
        match serde_json::from_str::<DepthUpdate>(text) {
            Ok(mut update) => {
                update.local_timestamp = local_timestamp;
                Some(update)
            }
            Err(err) => {
                tracing::warn!(%err, "failed to deserialize depth update, discarding");
                None
            }
        }
    }

    async fn persist_snapshot(
        &self,
        snapshot: &BookSnapshot,
        local_timestamp: i64,
    ) -> Result<(), PipelineError> {
        let timestamp = local_timestamp - 1;
        let rows = flatten_depth_rows(timestamp, timestamp, &snapshot.bids, &snapshot.asks, true);
        self.sink.add_depth_updates(rows).await?;
        Ok(())
    }

    async fn persist_update(&self, update: &DepthUpdate, is_snapshot: bool) -> Result<(), PipelineError> {
        let rows = flatten_depth_rows(
            update.event_timestamp,
            update.local_timestamp,
            &update.bids,
            &update.asks,
            is_snapshot,
        );
        self.sink.add_depth_updates(rows).await?;
        Ok(())
    }
}
