//! Data model for the intake and settlement pipeline.
//!
//! `Snapshot` and `OrderIntent` are read-only inputs; `Order`, `Action`,
//! `Trade`, `Transfer` are the persisted rows the settlement writer owns.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::core_types::{AssetId, Liquidity, OrderId, OrderState, OrderType, Side, TradeId, TransferSource, UserId};

/// An immutable custody-network record of value received.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Snapshot {
    pub snapshot_id: String,
    #[serde(default)]
    pub trace_id: String,
    pub user_id: UserId,
    pub opponent_id: UserId,
    pub asset_id: AssetId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub data: String,
}

/// Decoded from a snapshot's opaque `data` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub side: Side,
    pub counter_asset_id: AssetId,
    pub price: String,
    pub order_type: OrderType,
    pub order_id: Option<String>,
}

/// Engine-owned order row; the pipeline creates, reads, and mutates it.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub base: AssetId,
    pub quote: AssetId,
    pub side: String,
    pub order_type: String,
    pub price: Decimal,
    pub filled_amount: Decimal,
    pub remaining_amount: Decimal,
    pub filled_price: Decimal,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn side(&self) -> Side {
        self.side.parse().expect("order.side column holds a valid Side tag")
    }

    pub fn state(&self) -> OrderState {
        match self.state.as_str() {
            "DONE" => OrderState::Done,
            _ => OrderState::Pending,
        }
    }
}

pub mod order_state {
    pub const PENDING: &str = "PENDING";
    pub const DONE: &str = "DONE";
}

pub mod action_kind {
    pub const CREATE: &str = "CREATE";
    pub const CANCEL: &str = "CANCEL";
}

/// A durable record that an order's create/cancel was accepted.
#[derive(Debug, Clone, FromRow)]
pub struct Action {
    pub order_id: OrderId,
    pub kind: String,
}

/// One side of a matched trade. Produced in ask/bid pairs sharing a
/// `trade_id`.
#[derive(Debug, Clone, FromRow)]
pub struct Trade {
    pub trade_id: TradeId,
    pub liquidity: String,
    pub ask_order_id: OrderId,
    pub bid_order_id: OrderId,
    pub quote_asset_id: AssetId,
    pub base_asset_id: AssetId,
    pub side: String,
    pub price: Decimal,
    pub amount: Decimal,
    pub fee_asset_id: AssetId,
    pub fee_amount: Decimal,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    pub fn liquidity(&self) -> Liquidity {
        match self.liquidity.as_str() {
            "MAKER" => Liquidity::Maker,
            _ => Liquidity::Taker,
        }
    }
}

/// A pending obligation to move assets to the custody network. Existence =
/// owed; deletion = sent.
#[derive(Debug, Clone, FromRow)]
pub struct Transfer {
    pub transfer_id: String,
    pub source: String,
    pub detail: String,
    pub asset_id: AssetId,
    pub amount: Decimal,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn source(&self) -> TransferSource {
        match self.source.as_str() {
            "TRADE" => TransferSource::Trade,
            _ => TransferSource::Order,
        }
    }
}
