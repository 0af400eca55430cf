//! A recorder for Binance depth-diff and trade streams, appending every
//! accepted event to a per-symbol CSV log (spec.md §1).

pub mod clock;
pub mod config;
pub mod consistency;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod rest;
pub mod storage;
pub mod supervisor;
pub mod sync;
pub mod transport;

pub use error::AppError;
