//! Binance websocket market-stream transport.
//!
//! A reconnect `loop` that (re)connects, forwards text frames, answers
//! pings with pongs, and re-enters the loop on an unexpected close.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use super::{Frame, StreamHandle, StreamTransport, TransportError};

const WS_BASE_ENDPOINT: &str = "wss://stream.binance.com:9443/ws/";

pub struct BinanceStreamTransport;

impl StreamTransport for BinanceStreamTransport {
    fn spawn(stream_name: String, buffer: usize) -> (mpsc::Receiver<Frame>, StreamHandle) {
        let (frame_tx, frame_rx) = mpsc::channel::<Frame>(buffer);
        let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);

        let join = tokio::spawn(async move {
            let endpoint = format!("{WS_BASE_ENDPOINT}{stream_name}");

            loop {
                if *stop_rx.borrow() {
                    return Ok(());
                }

                let (mut ws_stream, _) = tokio::select! {
                    connected = tokio_tungstenite::connect_async(&endpoint) => connected?,
                    _ = stop_rx.changed() => return Ok(()),
                };
                tracing::info!(stream = %stream_name, "websocket connection established");

                if frame_tx.send(Frame::Opened).await.is_err() {
                    return Ok(());
                }

                loop {
                    tokio::select! {
                        _ = stop_rx.changed() => {
                            let _ = ws_stream.close(None).await;
                            return Ok(());
                        }
                        message = ws_stream.next() => {
                            let Some(message) = message else {
                                tracing::info!(stream = %stream_name, "websocket closed, reconnecting");
                                break;
                            };
                            match message? {
                                Message::Text(text) => {
                                    if frame_tx.send(Frame::Text(text)).await.is_err() {
                                        return Ok(());
                                    }
                                }
                                Message::Ping(payload) => {
                                    tracing::trace!("ping received");
                                    let _ = ws_stream.send(Message::Pong(payload)).await;
                                }
                                Message::Close(_) => {
                                    tracing::info!(stream = %stream_name, "websocket closed, reconnecting");
                                    break;
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
        });

        (frame_rx, StreamHandle { stop_tx, join })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The reconnect loop dials a real endpoint, so this crate doesn't
    // exercise `BinanceStreamTransport::spawn` in unit tests (no network
    // access in CI); `tests/depth_pipeline_replay.rs` exercises the
    // pipeline logic directly against an in-memory frame channel instead.
    #[tokio::test]
    async fn stop_handle_can_be_invoked_without_a_running_loop() {
        let (_rx, handle) = {
            let (frame_tx, frame_rx) = mpsc::channel::<Frame>(1);
            drop(frame_tx);
            let (stop_tx, _stop_rx) = tokio::sync::watch::channel(false);
            let join = tokio::spawn(async { Ok::<(), TransportError>(()) });
            (frame_rx, StreamHandle { stop_tx, join })
        };
        handle.stop();
    }
}
