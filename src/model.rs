//! Wire-level and persisted data types shared across the crate.
//!
//! Prices and quantities are carried as `String` end to end: the exchange
//! emits decimal strings and this crate never parses or rounds them (see
//! spec.md §9, "Price/quantity as decimal strings").

use std::fmt;

use serde_derive::Deserialize;

/// One `(price, quantity)` level as emitted by the exchange.
pub type Level = (String, String);

/// A diff from the exchange's live depth stream.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthUpdate {
    #[serde(rename = "E")]
    pub event_timestamp: i64,
    #[serde(skip)]
    pub local_timestamp: i64,
    #[serde(rename = "U")]
    pub first_update_id: u64,
    #[serde(rename = "u")]
    pub last_update_id: u64,
    #[serde(rename = "b")]
    pub bids: Vec<Level>,
    #[serde(rename = "a")]
    pub asks: Vec<Level>,
}

/// A trade tick from the exchange's live trade stream.
#[derive(Debug, Clone, Deserialize)]
pub struct Trade {
    #[serde(rename = "E")]
    pub event_timestamp: i64,
    #[serde(skip)]
    pub local_timestamp: i64,
    #[serde(rename = "t")]
    pub trade_id: u64,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,
}

/// A REST-fetched full order book.
#[derive(Debug, Clone, Deserialize)]
pub struct BookSnapshot {
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

/// Side of a persisted depth row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthSide {
    Bid,
    Ask,
}

impl fmt::Display for DepthSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepthSide::Bid => f.write_str("bid"),
            DepthSide::Ask => f.write_str("ask"),
        }
    }
}

/// Side of the aggressor (taker) in a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Binance's `m` field is "buyer is market maker". The aggressor is
    /// whichever side is *not* the maker.
    pub fn from_buyer_is_maker(buyer_is_maker: bool) -> Self {
        if buyer_is_maker {
            TradeSide::Sell
        } else {
            TradeSide::Buy
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.write_str("buy"),
            TradeSide::Sell => f.write_str("sell"),
        }
    }
}

/// A single flattened, persisted depth-book row.
#[derive(Debug, Clone)]
pub struct DepthRecord {
    pub event_timestamp: i64,
    pub local_timestamp: i64,
    pub side: DepthSide,
    pub price: String,
    pub quantity: String,
    pub is_snapshot: bool,
}

/// A single persisted trade row.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub event_timestamp: i64,
    pub local_timestamp: i64,
    pub trade_id: u64,
    pub price: String,
    pub quantity: String,
    pub side: TradeSide,
}

/// Flattens a depth update (or snapshot, treated identically) into sorted
/// persisted rows, per spec.md §4.5: "sorted by (event_timestamp, side)".
pub fn flatten_depth_rows(
    event_timestamp: i64,
    local_timestamp: i64,
    bids: &[Level],
    asks: &[Level],
    is_snapshot: bool,
) -> Vec<DepthRecord> {
    let mut rows = Vec::with_capacity(bids.len() + asks.len());
    for (price, quantity) in bids {
        rows.push(DepthRecord {
            event_timestamp,
            local_timestamp,
            side: DepthSide::Bid,
            price: price.clone(),
            quantity: quantity.clone(),
            is_snapshot,
        });
    }
    for (price, quantity) in asks {
        rows.push(DepthRecord {
            event_timestamp,
            local_timestamp,
            side: DepthSide::Ask,
            price: price.clone(),
            quantity: quantity.clone(),
            is_snapshot,
        });
    }
    // side sorts "ask" < "bid" lexicographically; spec only requires a
    // stable, deterministic order within equal event_timestamp, which this
    // gives us without needing a custom Ord on DepthSide.
    rows.sort_by(|a, b| {
        a.event_timestamp
            .cmp(&b.event_timestamp)
            .then_with(|| a.side.to_string().cmp(&b.side.to_string()))
    });
    rows
}
