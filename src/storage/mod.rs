//! Batched storage sink: spec.md §4.7.
//!
//! Grounded in
//! `original_source/binance_etl/library/storage.py::StorageProvider`/`CsvStorage`
//! for the per-topic buffer-then-flush state machine, and in spec.md's
//! Design Notes "Duck-typed storage provider → capability interface" for
//! the trait shape.

pub mod csv_sink;

use async_trait::async_trait;

use crate::model::{DepthRecord, TradeRecord};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("failed to create storage directory {path}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open storage file {path}")]
    OpenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write csv row")]
    Write(#[from] csv::Error),
    #[error("failed to flush storage file")]
    Flush(#[source] std::io::Error),
}

/// Capability interface a pipeline persists through. CSV is the only
/// implementation shipped, but the interface admits others (columnar,
/// warehouse sinks) without changing the pipeline.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn add_depth_updates(&self, rows: Vec<DepthRecord>) -> Result<(), StorageError>;
    async fn add_trades(&self, rows: Vec<TradeRecord>) -> Result<(), StorageError>;
    async fn flush(&self) -> Result<(), StorageError>;
    async fn close(&self) -> Result<(), StorageError>;
}

pub use csv_sink::CsvStorageSink;
