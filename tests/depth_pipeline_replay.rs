//! Replays canned frames through the depth and trade pipelines and asserts
//! the persisted row sequence matches the scenarios named in spec.md §8.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use depth_recorder::{
    model::{BookSnapshot, DepthRecord, TradeRecord},
    pipeline::{depth::DepthPipeline, trade::TradePipeline, PipelineError},
    rest::{RestError, SnapshotClient},
    storage::{StorageError, StorageSink},
    transport::Frame,
};
use tokio::sync::mpsc;

struct FixedSnapshotClient {
    last_update_id: u64,
}

#[async_trait]
impl SnapshotClient for FixedSnapshotClient {
    async fn fetch_depth(&self, _symbol: &str, _limit: u32) -> Result<BookSnapshot, RestError> {
        Ok(BookSnapshot {
            last_update_id: self.last_update_id,
            bids: vec![],
            asks: vec![],
        })
    }
}

#[derive(Default)]
struct InMemorySink {
    depth_rows: Mutex<Vec<DepthRecord>>,
    trade_rows: Mutex<Vec<TradeRecord>>,
}

#[async_trait]
impl StorageSink for InMemorySink {
    async fn add_depth_updates(&self, rows: Vec<DepthRecord>) -> Result<(), StorageError> {
        self.depth_rows.lock().unwrap().extend(rows);
        Ok(())
    }
    async fn add_trades(&self, rows: Vec<TradeRecord>) -> Result<(), StorageError> {
        self.trade_rows.lock().unwrap().extend(rows);
        Ok(())
    }
    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

fn depth_frame(first: u64, last: u64) -> String {
    format!(r#"{{"e":"depthUpdate","E":{last},"U":{first},"u":{last},"b":[["100.0","1.0"]],"a":[["101.0","2.0"]]}}"#)
}

// S1 — clean sync: snapshot rows precede the qualifying and trailing
// updates, in order.
#[tokio::test]
async fn clean_sync_persists_snapshot_then_buffered_updates_in_order() {
    let (tx, rx) = mpsc::channel(8);
    let sink = Arc::new(InMemorySink::default());
    let client: Arc<dyn SnapshotClient> = Arc::new(FixedSnapshotClient { last_update_id: 100 });
    let pipeline = DepthPipeline::new("BTCUSDT".to_string(), client, 1000, sink.clone());

    tx.send(Frame::Text(depth_frame(98, 101))).await.unwrap();
    tx.send(Frame::Text(depth_frame(102, 105))).await.unwrap();
    drop(tx);

    pipeline.run(rx).await.unwrap();

    let rows = sink.depth_rows.lock().unwrap();
    // 2 snapshot rows (empty bids/asks -> 0 rows, so the first real rows
    // are from (98,101)) + 2 rows from (98,101) + 2 rows from (102,105).
    assert_eq!(rows.len(), 4);
    assert!(rows[0..2].iter().all(|r| !r.is_snapshot));
    assert_eq!(rows[0].event_timestamp, 101);
    assert_eq!(rows[2].event_timestamp, 105);
}

// S3 — a gap arriving after sync fails the pipeline.
#[tokio::test]
async fn gap_after_sync_fails_the_pipeline() {
    let (tx, rx) = mpsc::channel(8);
    let sink = Arc::new(InMemorySink::default());
    let client: Arc<dyn SnapshotClient> = Arc::new(FixedSnapshotClient { last_update_id: 200 });
    let pipeline = DepthPipeline::new("BTCUSDT".to_string(), client, 1000, sink);

    tx.send(Frame::Text(depth_frame(198, 201))).await.unwrap();
    tx.send(Frame::Text(depth_frame(205, 210))).await.unwrap();
    drop(tx);

    let result = pipeline.run(rx).await;
    assert!(matches!(
        result,
        Err(PipelineError::SequenceGap {
            expected: 202,
            actual: 205
        })
    ));
}

// S5 — a non-depth frame is dropped with no row and no state change.
#[tokio::test]
async fn non_depth_frame_produces_no_rows() {
    let (tx, rx) = mpsc::channel(8);
    let sink = Arc::new(InMemorySink::default());
    let client: Arc<dyn SnapshotClient> = Arc::new(FixedSnapshotClient { last_update_id: 100 });
    let pipeline = DepthPipeline::new("BTCUSDT".to_string(), client, 1000, sink.clone());

    tx.send(Frame::Text(r#"{"e":"subscribeResponse"}"#.to_string())).await.unwrap();
    drop(tx);
    pipeline.run(rx).await.unwrap();

    assert!(sink.depth_rows.lock().unwrap().is_empty());
}

// S6 — trade aggressor side follows from buyer_is_maker.
#[tokio::test]
async fn trade_pipeline_maps_buyer_is_maker_to_aggressor_side() {
    let (tx, rx) = mpsc::channel(8);
    let sink = Arc::new(InMemorySink::default());
    let pipeline = TradePipeline::new("BTCUSDT".to_string(), sink.clone());

    tx.send(Frame::Text(
        r#"{"e":"trade","E":10,"t":1,"p":"100.0","q":"1.0","m":true}"#.to_string(),
    ))
    .await
    .unwrap();
    tx.send(Frame::Text(
        r#"{"e":"trade","E":11,"t":2,"p":"101.0","q":"2.0","m":false}"#.to_string(),
    ))
    .await
    .unwrap();
    drop(tx);
    pipeline.run(rx).await.unwrap();

    let rows = sink.trade_rows.lock().unwrap();
    assert_eq!(rows[0].side.to_string(), "sell");
    assert_eq!(rows[1].side.to_string(), "buy");
}
