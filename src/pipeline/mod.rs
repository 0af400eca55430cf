//! ETL pipelines: spec.md §4.5/§4.6.

pub mod depth;
pub mod trade;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("sequence gap after sync: expected first_update_id {expected}, got {actual}")]
    SequenceGap { expected: u64, actual: u64 },
    #[error("storage error")]
    Storage(#[from] crate::storage::StorageError),
    #[error("transport error")]
    Transport(#[from] crate::transport::TransportError),
}
