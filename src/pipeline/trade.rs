//! The trade pipeline: spec.md §4.6.
//!
//! Simpler than the depth pipeline: every accepted trade maps to exactly
//! one persisted row, no synchronizer or consistency monitor involved.
//! Grounded in `original_source/binance_etl/etls/spot_trades_etl.py`.

use std::sync::Arc;

use serde_derive::Deserialize;
use tokio::sync::mpsc;

use super::PipelineError;
use crate::{
    clock::now_ms,
    model::{Trade, TradeRecord, TradeSide},
    storage::StorageSink,
    transport::Frame,
};

#[derive(Deserialize)]
struct EventEnvelope {
    #[serde(rename = "e")]
    event: String,
}

pub struct TradePipeline {
    symbol: String,
    sink: Arc<dyn StorageSink>,
    total_messages: u64,
}

impl TradePipeline {
    pub fn new(symbol: String, sink: Arc<dyn StorageSink>) -> Self {
        TradePipeline {
            symbol,
            sink,
            total_messages: 0,
        }
    }

    /// Drains the storage sink on every exit path (spec.md §9 open
    /// question i, §2 "stopping ... drains the storage sink").
    pub async fn run(mut self, frames: mpsc::Receiver<Frame>) -> Result<(), PipelineError> {
        let result = self.run_inner(frames).await;
        if let Err(err) = self.sink.close().await {
            tracing::error!(%err, "failed to flush storage sink while stopping pipeline");
            return result.and(Err(err.into()));
        }
        result
    }

    async fn run_inner(&mut self, mut frames: mpsc::Receiver<Frame>) -> Result<(), PipelineError> {
        let span = tracing::info_span!("trade_pipeline", symbol = %self.symbol);
        let _entered = span.enter();

        while let Some(frame) = frames.recv().await {
            let text = match frame {
                // Reconnection carries no synchronization state for
                // trades; nothing to reset.
                Frame::Opened => continue,
                Frame::Text(text) => text,
            };

            let local_timestamp = now_ms();
            let Some(trade) = Self::parse_trade_frame(&text, local_timestamp) else {
                continue;
            };

            self.total_messages += 1;

            let record = TradeRecord {
                event_timestamp: trade.event_timestamp,
                local_timestamp: trade.local_timestamp,
                trade_id: trade.trade_id,
                price: trade.price,
                quantity: trade.quantity,
                side: TradeSide::from_buyer_is_maker(trade.buyer_is_maker),
            };
            self.sink.add_trades(vec![record]).await?;
        }

        tracing::debug!(total_messages = self.total_messages, "pipeline stopped");
        Ok(())
    }

    fn parse_trade_frame(text: &str, local_timestamp: i64) -> Option<Trade> {
        let envelope: EventEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(%err, "failed to deserialize frame, discarding");
                return None;
            }
        };
        if envelope.event != "trade" {
            return None;
        }
        match serde_json::from_str::<Trade>(text) {
            Ok(mut trade) => {
                trade.local_timestamp = local_timestamp;
                Some(trade)
            }
            Err(err) => {
                tracing::warn!(%err, "failed to deserialize trade, discarding");
                None
            }
        }
    }
}
