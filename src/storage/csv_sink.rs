//! CSV implementation of [`StorageSink`].
//!
//! One file per `(symbol, market, topic)` tuple, path
//! `<base>/<symbol>.<market>.<topic>.csv` (spec.md §4.7/§6). Files are
//! created (and truncated) eagerly at construction; the header is written
//! exactly once, on the first flush, driven by a `batches_saved` counter
//! — directly mirroring
//! `original_source/binance_etl/library/storage.py::CsvStorage`.

use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;

use super::{StorageError, StorageSink};
use crate::model::{DepthRecord, TradeRecord};

const DEPTH_HEADER: &[&str] = &[
    "timestamp",
    "local_timestamp",
    "side",
    "price",
    "quantity",
    "is_snapshot",
];
const TRADE_HEADER: &[&str] = &["timestamp", "local_timestamp", "id", "price", "quantity", "side"];

struct TopicBuffer {
    path: PathBuf,
    header: &'static [&'static str],
    rows: Vec<Vec<String>>,
    batches_saved: usize,
}

impl TopicBuffer {
    fn create(path: PathBuf, header: &'static [&'static str]) -> Result<Self, StorageError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
                    path: dir.display().to_string(),
                    source,
                })?;
            }
        }
        // Eagerly create (truncating any existing content at this path).
        File::create(&path).map_err(|source| StorageError::OpenFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(TopicBuffer {
            path,
            header,
            rows: Vec::new(),
            batches_saved: 0,
        })
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        if self.rows.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| StorageError::OpenFile {
                path: self.path.display().to_string(),
                source,
            })?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if self.batches_saved == 0 {
            writer.write_record(self.header)?;
        }
        for row in self.rows.drain(..) {
            writer.write_record(&row)?;
        }
        writer.flush().map_err(StorageError::Flush)?;
        self.batches_saved += 1;
        Ok(())
    }
}

pub struct CsvStorageSink {
    batch_size: usize,
    depth: Mutex<TopicBuffer>,
    trade: Mutex<TopicBuffer>,
}

impl CsvStorageSink {
    pub fn new(
        base_path: &str,
        symbol: &str,
        market: &str,
        batch_size: usize,
    ) -> Result<Self, StorageError> {
        let base = Path::new(base_path);
        let depth_path = base.join(format!("{symbol}.{market}.depth.csv"));
        let trade_path = base.join(format!("{symbol}.{market}.trade.csv"));
        Ok(CsvStorageSink {
            batch_size,
            depth: Mutex::new(TopicBuffer::create(depth_path, DEPTH_HEADER)?),
            trade: Mutex::new(TopicBuffer::create(trade_path, TRADE_HEADER)?),
        })
    }
}

#[async_trait]
impl StorageSink for CsvStorageSink {
    async fn add_depth_updates(&self, rows: Vec<DepthRecord>) -> Result<(), StorageError> {
        let mut state = self.depth.lock().expect("depth buffer lock poisoned");
        for row in rows {
            state.push(vec![
                row.event_timestamp.to_string(),
                row.local_timestamp.to_string(),
                row.side.to_string(),
                row.price,
                row.quantity,
                row.is_snapshot.to_string(),
            ]);
        }
        if state.len() >= self.batch_size {
            state.flush()?;
        }
        Ok(())
    }

    async fn add_trades(&self, rows: Vec<TradeRecord>) -> Result<(), StorageError> {
        let mut state = self.trade.lock().expect("trade buffer lock poisoned");
        for row in rows {
            state.push(vec![
                row.event_timestamp.to_string(),
                row.local_timestamp.to_string(),
                row.trade_id.to_string(),
                row.price,
                row.quantity,
                row.side.to_string(),
            ]);
        }
        if state.len() >= self.batch_size {
            state.flush()?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        self.depth.lock().expect("depth buffer lock poisoned").flush()?;
        self.trade.lock().expect("trade buffer lock poisoned").flush()?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        // Open Question (i) in spec.md §9, resolved: flush residual rows
        // on close so the last partial batch isn't silently dropped.
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DepthSide, TradeSide};

    fn depth_row(ts: i64, is_snapshot: bool) -> DepthRecord {
        DepthRecord {
            event_timestamp: ts,
            local_timestamp: ts,
            side: DepthSide::Bid,
            price: "100.0".to_string(),
            quantity: "1.0".to_string(),
            is_snapshot,
        }
    }

    fn trade_row(id: u64) -> TradeRecord {
        TradeRecord {
            event_timestamp: 1,
            local_timestamp: 2,
            trade_id: id,
            price: "100.0".to_string(),
            quantity: "1.0".to_string(),
            side: TradeSide::Buy,
        }
    }

    #[tokio::test]
    async fn header_is_written_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_str().unwrap();
        let sink = CsvStorageSink::new(base, "btcusdt", "spot", 2).unwrap();

        sink.add_depth_updates(vec![depth_row(1, true), depth_row(2, true)])
            .await
            .unwrap();
        sink.add_depth_updates(vec![depth_row(3, false), depth_row(4, false)])
            .await
            .unwrap();

        let content = fs::read_to_string(dir.path().join("btcusdt.spot.depth.csv")).unwrap();
        let header_count = content
            .lines()
            .filter(|line| *line == "timestamp,local_timestamp,side,price,quantity,is_snapshot")
            .count();
        assert_eq!(header_count, 1);
        // header + 4 data rows
        assert_eq!(content.lines().count(), 5);
    }

    #[tokio::test]
    async fn flush_below_batch_size_writes_nothing_until_close() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_str().unwrap();
        let sink = CsvStorageSink::new(base, "btcusdt", "spot", 10).unwrap();

        sink.add_trades(vec![trade_row(1)]).await.unwrap();
        let content = fs::read_to_string(dir.path().join("btcusdt.spot.trade.csv")).unwrap();
        assert_eq!(content, "");

        sink.close().await.unwrap();
        let content = fs::read_to_string(dir.path().join("btcusdt.spot.trade.csv")).unwrap();
        assert_eq!(content.lines().count(), 2); // header + 1 row
    }

    #[tokio::test]
    async fn files_are_created_eagerly_even_with_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_str().unwrap();
        let _sink = CsvStorageSink::new(base, "ethusdt", "spot", 5).unwrap();

        assert!(dir.path().join("ethusdt.spot.depth.csv").exists());
        assert!(dir.path().join("ethusdt.spot.trade.csv").exists());
    }
}
