//! Core type aliases used throughout the pipeline.
//!
//! These give semantic names to the primitive identifiers flowing through
//! the intake and settlement path. Custody-network ids (assets, users,
//! snapshots) are opaque UUID-shaped strings in the source system; the
//! pipeline never parses them, only compares and forwards them.

/// Custody asset identifier, e.g. `"c6d0c728-2624-429b-8e0d-d9d19b6592fa"`.
pub type AssetId = String;

/// Custody account identifier.
pub type UserId = String;

/// Order identifier. For creates this is the snapshot's `trace_id`; it is
/// the idempotency key for the order's entire lifecycle.
pub type OrderId = String;

/// Trade identifier, a fresh v4 UUID minted per match.
pub type TradeId = String;

/// Snapshot identifier, unique per custody-network event.
pub type SnapshotId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Ask,
    Bid,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Ask => "ASK",
            Side::Bid => "BID",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASK" => Ok(Side::Ask),
            "BID" => Ok(Side::Bid),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIMIT" => Ok(OrderType::Limit),
            "MARKET" => Ok(OrderType::Market),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderState {
    Pending,
    Done,
}

/// Liquidity role of one side of a trade. Determines which fee rate applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Liquidity {
    Maker,
    Taker,
}

impl Liquidity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Liquidity::Maker => "MAKER",
            Liquidity::Taker => "TAKER",
        }
    }
}

/// Where a pending transfer's obligation originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferSource {
    Order,
    Trade,
}

impl TransferSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferSource::Order => "ORDER",
            TransferSource::Trade => "TRADE",
        }
    }
}
