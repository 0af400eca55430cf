//! One-shot REST snapshot fetch, behind a trait so the synchronizer
//! doesn't depend on a concrete HTTP client.

use async_trait::async_trait;

use crate::model::BookSnapshot;

pub const DEFAULT_SNAPSHOT_LIMIT: u32 = 1000;

const SNAPSHOT_ENDPOINT: &str = "https://api.binance.com/api/v3/depth";

#[derive(thiserror::Error, Debug)]
pub enum RestError {
    #[error("request error")]
    Request(#[from] reqwest::Error),
    #[error("http error ({status}): {body}")]
    Http { status: u16, body: String },
}

#[async_trait]
pub trait SnapshotClient: Send + Sync {
    async fn fetch_depth(&self, symbol: &str, limit: u32) -> Result<BookSnapshot, RestError>;
}

pub struct BinanceSnapshotClient {
    client: reqwest::Client,
}

impl BinanceSnapshotClient {
    pub fn new() -> Self {
        BinanceSnapshotClient {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for BinanceSnapshotClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotClient for BinanceSnapshotClient {
    async fn fetch_depth(&self, symbol: &str, limit: u32) -> Result<BookSnapshot, RestError> {
        let symbol = symbol.to_uppercase();
        let response = self
            .client
            .get(SNAPSHOT_ENDPOINT)
            .query(&[("symbol", symbol.as_str()), ("limit", &limit.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Http { status, body });
        }

        Ok(response.json::<BookSnapshot>().await?)
    }
}
