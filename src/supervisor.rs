//! Lifecycle supervisor.
//!
//! Builds one pipeline per subscription, runs each as an independent task,
//! and isolates pipeline failures from one another. Pipelines are
//! collected into a `FuturesUnordered` so completed ones can be reaped one
//! at a time instead of all at once, and a SIGINT/SIGTERM triggers an
//! orderly stop-everything shutdown.

use std::{collections::HashMap, process::ExitCode, sync::Arc};

use futures::StreamExt;
use tokio::{signal::unix::SignalKind, task::JoinHandle};

use crate::{
    config::{Config, EventKind, Subscription},
    pipeline::{depth::DepthPipeline, trade::TradePipeline, PipelineError},
    rest::{BinanceSnapshotClient, DEFAULT_SNAPSHOT_LIMIT},
    storage::CsvStorageSink,
    transport::{binance::BinanceStreamTransport, StreamHandle, StreamTransport},
};

const FRAME_BUFFER: usize = 256;

#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    #[error("config error")]
    Config(#[from] crate::config::ConfigError),
    #[error("storage error")]
    Storage(#[from] crate::storage::StorageError),
    #[error("failed to install signal handler")]
    Signal(#[source] std::io::Error),
}

struct RunningPipeline {
    symbol: String,
    event: EventKind,
    stream_handle: StreamHandle,
    join: JoinHandle<Result<(), PipelineError>>,
}

pub struct Supervisor {
    pipelines: Vec<RunningPipeline>,
}

impl Supervisor {
    /// Builds one `CsvStorageSink` per distinct `(symbol, market)` and one
    /// pipeline per subscription, sharing the sink across a symbol's depth
    /// and trade pipelines.
    pub fn build(config: &Config) -> Result<Supervisor, SupervisorError> {
        let subscriptions = config.resolved_subscriptions()?;

        let mut sinks: HashMap<(String, String), Arc<CsvStorageSink>> = HashMap::new();
        let mut pipelines = Vec::with_capacity(subscriptions.len());

        for subscription in subscriptions {
            let sink = Self::sink_for(&mut sinks, config, &subscription)?;
            pipelines.push(Self::spawn_pipeline(subscription, sink));
        }

        Ok(Supervisor { pipelines })
    }

    fn sink_for(
        sinks: &mut HashMap<(String, String), Arc<CsvStorageSink>>,
        config: &Config,
        subscription: &Subscription,
    ) -> Result<Arc<CsvStorageSink>, SupervisorError> {
        let key = (subscription.symbol.clone(), subscription.market.clone());
        if let Some(sink) = sinks.get(&key) {
            return Ok(sink.clone());
        }
        let sink = Arc::new(CsvStorageSink::new(
            &config.storage.csv.base_path,
            &subscription.symbol,
            &subscription.market,
            config.storage.csv.batch_size,
        )?);
        sinks.insert(key, sink.clone());
        Ok(sink)
    }

    fn spawn_pipeline(subscription: Subscription, sink: Arc<CsvStorageSink>) -> RunningPipeline {
        let stream_name = format!("{}@{}", subscription.symbol.to_lowercase(), match subscription.event {
            EventKind::Depth => "depth",
            EventKind::Trade => "trade",
        });
        let (frame_rx, stream_handle) = BinanceStreamTransport::spawn(stream_name, FRAME_BUFFER);

        let join = match subscription.event {
            EventKind::Depth => {
                let pipeline = DepthPipeline::new(
                    subscription.symbol.clone(),
                    Arc::new(BinanceSnapshotClient::new()),
                    DEFAULT_SNAPSHOT_LIMIT,
                    sink,
                );
                tokio::spawn(pipeline.run(frame_rx))
            }
            EventKind::Trade => {
                let pipeline = TradePipeline::new(subscription.symbol.clone(), sink);
                tokio::spawn(pipeline.run(frame_rx))
            }
        };

        RunningPipeline {
            symbol: subscription.symbol,
            event: subscription.event,
            stream_handle,
            join,
        }
    }

    /// Runs every pipeline to completion or until a shutdown signal
    /// arrives. Returns `ExitCode::SUCCESS` on a clean signal-driven
    /// shutdown, or whenever at least one pipeline completed without
    /// error; returns `ExitCode::FAILURE` only once every pipeline has
    /// independently failed.
    pub async fn run(self) -> ExitCode {
        let total = self.pipelines.len();
        let mut stop_handles = Vec::with_capacity(total);
        let mut tasks = futures::stream::FuturesUnordered::new();
        for pipeline in self.pipelines {
            stop_handles.push(pipeline.stream_handle);
            tasks.push(async move { (pipeline.symbol, pipeline.event, pipeline.join.await) });
        }

        let mut sigterm = match tokio::signal::unix::signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                tracing::error!(%err, "failed to install SIGTERM handler");
                return ExitCode::FAILURE;
            }
        };

        let mut failures = 0usize;
        loop {
            if tasks.is_empty() {
                return if total > 0 && failures == total {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                };
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received SIGINT, stopping pipelines");
                    return Self::shutdown(stop_handles, tasks).await;
                }
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, stopping pipelines");
                    return Self::shutdown(stop_handles, tasks).await;
                }
                Some((symbol, event, result)) = tasks.next() => {
                    match result {
                        Ok(Ok(())) => tracing::info!(symbol = %symbol, event = ?event, "pipeline stopped"),
                        Ok(Err(err)) => {
                            failures += 1;
                            tracing::error!(symbol = %symbol, event = ?event, %err, "pipeline failed");
                        }
                        Err(join_err) => {
                            failures += 1;
                            tracing::error!(symbol = %symbol, event = ?event, %join_err, "pipeline task panicked");
                        }
                    }
                }
            }
        }
    }

    async fn shutdown(
        stop_handles: Vec<StreamHandle>,
        mut tasks: futures::stream::FuturesUnordered<
            impl std::future::Future<Output = (String, EventKind, Result<Result<(), PipelineError>, tokio::task::JoinError>)>,
        >,
    ) -> ExitCode {
        for handle in &stop_handles {
            handle.stop();
        }
        while let Some((symbol, event, result)) = tasks.next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(symbol = %symbol, event = ?event, %err, "pipeline failed during shutdown");
                }
                Err(err) => {
                    tracing::error!(symbol = %symbol, event = ?event, %err, "pipeline task panicked during shutdown");
                }
            }
        }
        ExitCode::SUCCESS
    }
}
