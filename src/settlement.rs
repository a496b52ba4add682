//! Settlement Writer.
//!
//! Every public method here commits exactly one `sqlx` transaction —
//! partial application is impossible because a panic or early return
//! before `tx.commit()` leaves the transaction to roll back on drop.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;

use crate::classifier::Disposition;
use crate::config::{FeeConfig, MarketConfig};
use crate::core_types::{Liquidity, Side};
use crate::error::SettlementError;
use crate::fee::{calculate_fee, rate_for};
use crate::ids::{namespace, uuid_v3};
use crate::models::{action_kind, order_state, Order};

pub struct SettlementWriter {
    pool: PgPool,
    market: MarketConfig,
    fees: FeeConfig,
}

/// An order's state as reported by the matching engine immediately after a
/// match, in the shape `transact` needs. The engine is an external
/// collaborator; this is the boundary struct the pipeline accepts from it.
#[derive(Debug, Clone)]
pub struct MatchedOrder {
    pub order_id: String,
    pub user_id: String,
    pub base: String,
    pub quote: String,
    pub side: Side,
    /// Scaled-integer price as the engine reports it; divided by
    /// `10^precision` to recover the decimal price.
    pub price: Decimal,
    pub filled_amount: Decimal,
    pub remaining_amount: Decimal,
}

impl SettlementWriter {
    pub fn new(pool: PgPool, market: MarketConfig, fees: FeeConfig) -> Self {
        Self { pool, market, fees }
    }

    /// Route a classifier [`Disposition`] to the matching writer operation.
    /// `Ignore` dispositions never reach here; call sites should filter
    /// them before calling `apply`.
    pub async fn apply(
        &self,
        disposition: Disposition,
        snapshot: &crate::models::Snapshot,
    ) -> Result<(), SettlementError> {
        match disposition {
            Disposition::Ignore => Ok(()),
            Disposition::Refund => self.refund(snapshot).await,
            Disposition::Cancel {
                order_id,
                opponent_id,
                requested_at,
            } => self.submit_cancel_action(&order_id, &opponent_id, requested_at).await,
            Disposition::Create {
                order_id,
                user_id,
                order_type,
                side,
                quote,
                base,
                amount,
                price,
                created_at,
            } => {
                self.create_order(
                    &order_id, &user_id, order_type, side, &quote, &base, amount, price,
                    created_at,
                )
                .await
            }
        }
    }

    /// Primary-key-level idempotent insert of an order row in PENDING plus
    /// its CREATE action.
    pub async fn create_order(
        &self,
        order_id: &str,
        user_id: &str,
        order_type: crate::core_types::OrderType,
        side: Side,
        quote: &str,
        base: &str,
        amount: Decimal,
        price: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO orders
                 (order_id, user_id, base, quote, side, order_type, price,
                  filled_amount, remaining_amount, filled_price, state, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, 0, $9, $10)
               ON CONFLICT (order_id) DO NOTHING"#,
        )
        .bind(order_id)
        .bind(user_id)
        .bind(base)
        .bind(quote)
        .bind(side.as_str())
        .bind(order_type.as_str())
        .bind(price)
        .bind(amount)
        .bind(order_state::PENDING)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO actions (order_id, kind) VALUES ($1, $2)
               ON CONFLICT (order_id, kind) DO NOTHING"#,
        )
        .bind(order_id)
        .bind(action_kind::CREATE)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Submit a CANCEL action, gated by ownership: the classifier has no
    /// order-table access, so the writer enforces that `opponent_id`
    /// matches the order's `user_id` before accepting the cancel. If the
    /// order does not exist yet — a cancel racing ahead of its create —
    /// the cancel is still recorded so the later CREATE cannot outrun it.
    pub async fn submit_cancel_action(
        &self,
        order_id: &str,
        opponent_id: &str,
        _requested_at: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        let existing: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(order) = existing {
            if order.user_id != opponent_id {
                return Ok(());
            }
        }

        sqlx::query(
            r#"INSERT INTO actions (order_id, kind) VALUES ($1, $2)
               ON CONFLICT (order_id, kind) DO NOTHING"#,
        )
        .bind(order_id)
        .bind(action_kind::CANCEL)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Apply an engine-confirmed cancellation: the order transitions to
    /// DONE, both actions are deleted, and the remaining collateral is
    /// returned to the user in whichever asset was held — quote for a BID
    /// order, base for an ASK order.
    ///
    /// `remaining_in_collateral_asset` is the engine's own report of the
    /// order's unfilled amount in the opposite asset: the writer does not
    /// re-derive it from `order.price`, since for a BID order that amount
    /// is whatever quote currency the engine still holds as collateral,
    /// not necessarily `final_remaining_amount * price`.
    pub async fn cancel_order(
        &self,
        order_id: &str,
        final_filled_amount: Decimal,
        final_remaining_amount: Decimal,
        final_filled_price: Decimal,
        remaining_in_collateral_asset: Decimal,
    ) -> Result<(), SettlementError> {
        let mut tx = self.pool.begin().await?;

        let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(order) = order else {
            tx.commit().await?;
            return Ok(());
        };
        if order.state() == crate::core_types::OrderState::Done {
            tx.commit().await?;
            return Ok(());
        }

        sqlx::query(
            r#"UPDATE orders SET filled_amount = $2, remaining_amount = $3,
                 filled_price = $4, state = $5 WHERE order_id = $1"#,
        )
        .bind(order_id)
        .bind(final_filled_amount)
        .bind(final_remaining_amount)
        .bind(final_filled_price)
        .bind(order_state::DONE)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM actions WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        let (refund_asset, refund_amount) = match order.side() {
            Side::Bid => (order.quote.clone(), remaining_in_collateral_asset),
            Side::Ask => (order.base.clone(), remaining_in_collateral_asset),
        };

        if !refund_amount.is_zero() {
            let transfer_id = uuid_v3(order_id, namespace::CANCEL).to_string();
            insert_transfer(
                &mut tx,
                &transfer_id,
                crate::core_types::TransferSource::Order,
                order_id,
                &refund_asset,
                refund_amount,
                &order.user_id,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Settle one match: two trade rows, two order updates, two transfers.
    pub async fn transact(
        &self,
        taker: MatchedOrder,
        maker: MatchedOrder,
        matched_amount: Decimal,
        precision: u32,
    ) -> Result<(), SettlementError> {
        let scale = Decimal::from(10u64.pow(precision));
        let price = maker.price / scale;
        let total = matched_amount * price;

        let (ask, bid, ask_liquidity, bid_liquidity) = match (taker.side, maker.side) {
            (Side::Ask, Side::Bid) => (taker.clone(), maker.clone(), Liquidity::Taker, Liquidity::Maker),
            (Side::Bid, Side::Ask) => (maker.clone(), taker.clone(), Liquidity::Maker, Liquidity::Taker),
            _ => {
                return Err(SettlementError::Config(
                    "matched taker and maker orders must be on opposite sides".to_string(),
                ))
            }
        };

        let ask_fee = calculate_fee(total, rate_for(ask_liquidity, &self.fees));
        let bid_fee = calculate_fee(matched_amount, rate_for(bid_liquidity, &self.fees));

        let trade_id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        insert_trade(
            &mut tx,
            &trade_id,
            ask_liquidity,
            &ask.order_id,
            &bid.order_id,
            &ask.quote,
            &ask.base,
            Side::Ask,
            price,
            matched_amount,
            &ask.quote,
            ask_fee,
            &ask.user_id,
            created_at,
        )
        .await?;

        insert_trade(
            &mut tx,
            &trade_id,
            bid_liquidity,
            &ask.order_id,
            &bid.order_id,
            &bid.quote,
            &bid.base,
            Side::Bid,
            price,
            matched_amount,
            &bid.base,
            bid_fee,
            &bid.user_id,
            created_at,
        )
        .await?;

        update_matched_order(&mut tx, &ask, price).await?;
        update_matched_order(&mut tx, &bid, price).await?;

        let ask_transfer_id = uuid_v3(&trade_id, ask_liquidity.as_str()).to_string();
        insert_transfer(
            &mut tx,
            &ask_transfer_id,
            crate::core_types::TransferSource::Trade,
            &trade_id,
            &ask.quote,
            total - ask_fee,
            &ask.user_id,
        )
        .await?;

        let bid_transfer_id = uuid_v3(&trade_id, bid_liquidity.as_str()).to_string();
        insert_transfer(
            &mut tx,
            &bid_transfer_id,
            crate::core_types::TransferSource::Trade,
            &trade_id,
            &bid.base,
            matched_amount - bid_fee,
            &bid.user_id,
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Refund a rejected snapshot minus the configured haircut. Dropped
    /// silently if the haircut amount rounds to zero at engine precision —
    /// no transfer, no error.
    pub async fn refund(&self, snapshot: &crate::models::Snapshot) -> Result<(), SettlementError> {
        let amount = crate::money::round_floor(
            snapshot.amount * self.market.refund_haircut,
            self.market.engine_precision,
        );
        if amount.is_zero() {
            return Ok(());
        }

        let transfer_id = uuid_v3(&snapshot.trace_id, namespace::REFUND).to_string();
        let mut tx = self.pool.begin().await?;
        insert_transfer(
            &mut tx,
            &transfer_id,
            crate::core_types::TransferSource::Order,
            &format!("INVALID_ORDER#{}", snapshot.trace_id),
            &snapshot.asset_id,
            amount,
            &snapshot.opponent_id,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn update_matched_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order: &MatchedOrder,
    filled_price: Decimal,
) -> Result<(), SettlementError> {
    let state = if order.remaining_amount.is_zero() {
        order_state::DONE
    } else {
        order_state::PENDING
    };

    sqlx::query(
        r#"UPDATE orders SET filled_amount = $2, remaining_amount = $3,
             filled_price = $4, state = $5 WHERE order_id = $1"#,
    )
    .bind(&order.order_id)
    .bind(order.filled_amount)
    .bind(order.remaining_amount)
    .bind(filled_price)
    .bind(state)
    .execute(&mut **tx)
    .await?;

    if state == order_state::DONE {
        sqlx::query("DELETE FROM actions WHERE order_id = $1")
            .bind(&order.order_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn insert_trade(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    trade_id: &str,
    liquidity: Liquidity,
    ask_order_id: &str,
    bid_order_id: &str,
    quote_asset_id: &str,
    base_asset_id: &str,
    side: Side,
    price: Decimal,
    amount: Decimal,
    fee_asset_id: &str,
    fee_amount: Decimal,
    user_id: &str,
    created_at: DateTime<Utc>,
) -> Result<(), SettlementError> {
    sqlx::query(
        r#"INSERT INTO trades
             (trade_id, liquidity, ask_order_id, bid_order_id, quote_asset_id,
              base_asset_id, side, price, amount, fee_asset_id, fee_amount,
              user_id, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
           ON CONFLICT (trade_id, liquidity) DO NOTHING"#,
    )
    .bind(trade_id)
    .bind(liquidity.as_str())
    .bind(ask_order_id)
    .bind(bid_order_id)
    .bind(quote_asset_id)
    .bind(base_asset_id)
    .bind(side.as_str())
    .bind(price)
    .bind(amount)
    .bind(fee_asset_id)
    .bind(fee_amount)
    .bind(user_id)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_transfer(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    transfer_id: &str,
    source: crate::core_types::TransferSource,
    detail: &str,
    asset_id: &str,
    amount: Decimal,
    user_id: &str,
) -> Result<(), SettlementError> {
    sqlx::query(
        r#"INSERT INTO transfers (transfer_id, source, detail, asset_id, amount, user_id, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, now())
           ON CONFLICT (transfer_id) DO NOTHING"#,
    )
    .bind(transfer_id)
    .bind(source.as_str())
    .bind(detail)
    .bind(asset_id)
    .bind(amount)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // Pure-logic pieces of Transact are covered without a database: the
    // conservation identity itself.
    #[test]
    fn conservation_identity_holds() {
        let amount = dec!(1.0);
        let price = dec!(20000);
        let total = amount * price;
        let ask_fee = calculate_fee(total, dec!(0.002));
        let bid_fee = calculate_fee(amount, dec!(0.001));
        let ask_transfer = total - ask_fee;
        let bid_transfer = amount - bid_fee;
        assert_eq!(ask_transfer + ask_fee, total);
        assert_eq!(bid_transfer + bid_fee, amount);
    }

    #[test]
    fn cancel_and_trade_transfer_ids_are_disjoint() {
        let cancel = uuid_v3("order-1", namespace::CANCEL);
        let refund = uuid_v3("order-1", namespace::REFUND);
        let trade_maker = uuid_v3("trade-1", Liquidity::Maker.as_str());
        let trade_taker = uuid_v3("trade-1", Liquidity::Taker.as_str());
        let ids = [cancel, refund, trade_maker, trade_taker];
        for (i, a) in ids.iter().enumerate() {
            for (j, b) in ids.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
