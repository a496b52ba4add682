//! Intent Classifier.
//!
//! Pure, finite, and synchronous: no suspension point happens inside a
//! classification decision. `classify` never touches the database or
//! network; it only inspects the snapshot, decodes its payload, and
//! decides which of four dispositions (`Create`, `Cancel`, `Refund`,
//! `Ignore`) applies. The caller is responsible for turning a
//! `Disposition` into durable writes via the settlement writer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::codec;
use crate::config::MarketConfig;
use crate::core_types::{OrderType, Side};
use crate::models::Snapshot;
use crate::money::rounds_to_zero;

/// What the classifier decided to do with one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// No transfer, no error — silently advance past this snapshot.
    Ignore,
    /// Refund minus the configured haircut.
    Refund,
    /// Submit a CANCEL action; the settlement writer gates it on
    /// `opponent_id` matching the order's `user_id`.
    Cancel {
        order_id: String,
        opponent_id: String,
        requested_at: DateTime<Utc>,
    },
    /// Submit a CREATE action.
    Create {
        order_id: String,
        user_id: String,
        order_type: OrderType,
        side: Side,
        quote: String,
        base: String,
        amount: Decimal,
        price: Decimal,
        created_at: DateTime<Utc>,
    },
}

/// Classify one snapshot: ownership and well-formedness checks, intent
/// decode, self-refund/type/price/pair validation, and finally side
/// resolution into a create or cancel action.
pub fn classify(snapshot: &Snapshot, config: &MarketConfig, our_account_id: &str) -> Disposition {
    // Step 1: ownership filter.
    if snapshot.user_id != our_account_id {
        return Disposition::Ignore;
    }

    // Step 2: well-formedness.
    if snapshot.opponent_id.is_empty()
        || snapshot.trace_id.is_empty()
        || rounds_to_zero(snapshot.amount, config.engine_precision)
    {
        return Disposition::Ignore;
    }

    // Step 3: decode.
    let intent = match codec::decode(&snapshot.data) {
        Ok(Some(intent)) => intent,
        _ => return Disposition::Refund,
    };

    // Step 4: self-refund guard.
    if intent.counter_asset_id == snapshot.asset_id {
        return Disposition::Refund;
    }

    // Step 5: cancel path.
    if let Some(order_id) = intent.order_id {
        return Disposition::Cancel {
            order_id,
            opponent_id: snapshot.opponent_id.clone(),
            requested_at: snapshot.created_at,
        };
    }

    // Step 6: type check.
    if !matches!(intent.order_type, OrderType::Limit | OrderType::Market) {
        return Disposition::Refund;
    }

    // Step 7: price check. The deposit amount is rounded to engine
    // precision first, same as mixin.go's `amount := number.FromString(s.Amount).RoundFloor(EnginePrecision)`
    // before it ever reaches a zero-check or an order field.
    let price = crate::money::round_floor(
        parse_decimal(&intent.price),
        config.engine_precision,
    );
    let amount = crate::money::round_floor(snapshot.amount, config.engine_precision);
    if price.is_zero() || rounds_to_zero(price * amount, config.engine_precision) {
        return Disposition::Refund;
    }

    // Step 8: side resolution.
    let (quote, base, amount) = match intent.side {
        Side::Ask => (intent.counter_asset_id.clone(), snapshot.asset_id.clone(), amount),
        Side::Bid => {
            if price.is_zero() {
                return Disposition::Refund;
            }
            (
                snapshot.asset_id.clone(),
                intent.counter_asset_id.clone(),
                amount / price,
            )
        }
    };

    // Step 9: pair whitelist.
    if !config.pair_allowed(&quote, &base) {
        return Disposition::Refund;
    }

    // Step 10: submit create.
    Disposition::Create {
        order_id: snapshot.trace_id.clone(),
        user_id: snapshot.opponent_id.clone(),
        order_type: intent.order_type,
        side: intent.side,
        quote,
        base,
        amount,
        price,
        created_at: snapshot.created_at,
    }
}

/// Parse a decimal string defensively; an unparseable price is treated as
/// zero, which step 7 above then turns into a refund.
fn parse_decimal(s: &str) -> Decimal {
    s.parse().unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::models::OrderIntent;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    fn market() -> MarketConfig {
        MarketConfig {
            engine_precision: 8,
            quote_assets: HashSet::from(["USDT".to_string()]),
            canonical_pairs: vec![("USDT".to_string(), "BTC".to_string())],
            refund_haircut: dec!(0.999),
        }
    }

    fn snapshot(asset_id: &str, amount: Decimal, data: String) -> Snapshot {
        Snapshot {
            snapshot_id: "snap-1".to_string(),
            trace_id: "T1".to_string(),
            user_id: "our-account".to_string(),
            opponent_id: "U1".to_string(),
            asset_id: asset_id.to_string(),
            amount,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            data,
        }
    }

    #[test]
    fn happy_path_bid_create() {
        let intent = OrderIntent {
            side: Side::Bid,
            counter_asset_id: "c6d0c728-2624-429b-8e0d-d9d19b6592fa".to_string(),
            price: "20000".to_string(),
            order_type: OrderType::Limit,
            order_id: None,
        };
        let snap = snapshot("USDT", dec!(1000), codec::encode(&intent));
        match classify(&snap, &market(), "our-account") {
            Disposition::Create {
                order_id,
                user_id,
                quote,
                base,
                amount,
                price,
                ..
            } => {
                assert_eq!(order_id, "T1");
                assert_eq!(user_id, "U1");
                assert_eq!(quote, "USDT");
                assert_eq!(base, "c6d0c728-2624-429b-8e0d-d9d19b6592fa");
                assert_eq!(price, dec!(20000));
                assert_eq!(amount, dec!(0.05));
            }
            other => panic!("expected Create, got {other:?}"),
        }
    }

    #[test]
    fn invalid_pair_is_refunded() {
        // asset_id=BTC, intent={BID, USDT, 20000} resolves to quote=BTC,
        // base=USDT, the inverse of the canonical pair.
        let intent = OrderIntent {
            side: Side::Bid,
            counter_asset_id: "USDT".to_string(),
            price: "20000".to_string(),
            order_type: OrderType::Limit,
            order_id: None,
        };
        let snap = snapshot("BTC", dec!(1), codec::encode(&intent));
        assert_eq!(classify(&snap, &market(), "our-account"), Disposition::Refund);
    }

    #[test]
    fn self_refund_guard() {
        let intent = OrderIntent {
            side: Side::Ask,
            counter_asset_id: "USDT".to_string(),
            price: "1".to_string(),
            order_type: OrderType::Limit,
            order_id: None,
        };
        let snap = snapshot("USDT", dec!(1), codec::encode(&intent));
        assert_eq!(classify(&snap, &market(), "our-account"), Disposition::Refund);
    }

    #[test]
    fn undecodable_payload_is_refunded() {
        let snap = snapshot("USDT", dec!(1), "not-base64!!".to_string());
        assert_eq!(classify(&snap, &market(), "our-account"), Disposition::Refund);
    }

    #[test]
    fn foreign_snapshot_is_ignored() {
        let mut snap = snapshot("USDT", dec!(1), String::new());
        snap.user_id = "someone-else".to_string();
        assert_eq!(classify(&snap, &market(), "our-account"), Disposition::Ignore);
    }

    #[test]
    fn empty_trace_id_is_ignored() {
        let mut snap = snapshot("USDT", dec!(1), String::new());
        snap.trace_id = String::new();
        assert_eq!(classify(&snap, &market(), "our-account"), Disposition::Ignore);
    }

    #[test]
    fn dust_amount_is_ignored() {
        let snap = snapshot("USDT", dec!(0.000000001), String::new());
        assert_eq!(classify(&snap, &market(), "our-account"), Disposition::Ignore);
    }

    #[test]
    fn cancel_path_ignores_order_validity() {
        let intent = OrderIntent {
            side: Side::Ask,
            counter_asset_id: "USDT".to_string(),
            price: "1".to_string(),
            order_type: OrderType::Limit,
            order_id: Some("order-xyz".to_string()),
        };
        let snap = snapshot("BTC", dec!(1), codec::encode(&intent));
        match classify(&snap, &market(), "our-account") {
            Disposition::Cancel { order_id, opponent_id, .. } => {
                assert_eq!(order_id, "order-xyz");
                assert_eq!(opponent_id, "U1");
            }
            other => panic!("expected Cancel, got {other:?}"),
        }
    }
}
