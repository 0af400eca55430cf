//! Stream transport.
//!
//! Opens a named stream and delivers every received text frame to the
//! pipeline via an `mpsc` channel. Works for any stream name and carries
//! an explicit stop signal so a caller can close the connection cleanly
//! instead of running forever.

pub mod binance;

use tokio::{sync::mpsc, task::JoinHandle};

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("websocket error")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("frame channel closed")]
    ChannelClosed,
}

/// A frame delivered from the transport to a pipeline.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A text payload received from the stream.
    Text(String),
    /// The underlying connection was (re-)established. A pipeline that
    /// has already synced should treat this as a resync trigger.
    Opened,
}

/// Handle to a running transport connection.
pub struct StreamHandle {
    stop_tx: tokio::sync::watch::Sender<bool>,
    pub join: JoinHandle<Result<(), TransportError>>,
}

impl StreamHandle {
    /// Signals the reconnect loop to close the socket and stop; does not
    /// wait for in-flight frames beyond what the handler has already
    /// accepted.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

pub trait StreamTransport {
    /// Opens `stream_name` and spawns a task that owns the connection for
    /// its lifetime (including reconnects), delivering frames to the
    /// returned channel.
    fn spawn(stream_name: String, buffer: usize) -> (mpsc::Receiver<Frame>, StreamHandle);
}
