//! Intent Codec.
//!
//! The payload is base64 in the snapshot's `data` field. Once decoded it is
//! a fixed, positionally-ordered byte layout:
//!
//! ```text
//! [S: u8 tag][A: 16 bytes uuid][P: u8 len][P: len ascii bytes]
//! [T: u8 tag][O: u8 presence][O: 16 bytes uuid, present only if flag=1]
//! ```
//!
//! Any base64 failure, truncation, unrecognized tag, or trailing byte after
//! the final field yields `Ok(None)` at the call site — `decode` never
//! panics, and the classifier treats "no intent" as a refund case, not a
//! hard error. `CodecError` exists for the (rarer) cases worth
//! distinguishing in logs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

use crate::core_types::{OrderType, Side};
use crate::error::CodecError;
use crate::models::OrderIntent;

const SIDE_ASK: u8 = 0;
const SIDE_BID: u8 = 1;
const TYPE_LIMIT: u8 = 0;
const TYPE_MARKET: u8 = 1;
const ORDER_ABSENT: u8 = 0;
const ORDER_PRESENT: u8 = 1;

/// Decode a snapshot's opaque `data` field into an [`OrderIntent`].
///
/// Pure and deterministic. Returns `Ok(None)` for any malformed payload;
/// `Err` is reserved for the base64 envelope itself failing, which callers
/// may choose to log distinctly before folding into the same refund path.
pub fn decode(data: &str) -> Result<Option<OrderIntent>, CodecError> {
    let bytes = STANDARD.decode(data)?;
    Ok(decode_fields(&bytes))
}

fn decode_fields(bytes: &[u8]) -> Option<OrderIntent> {
    let mut cursor = Cursor::new(bytes);

    let side = match cursor.take_u8()? {
        SIDE_ASK => Side::Ask,
        SIDE_BID => Side::Bid,
        _ => return None,
    };

    let counter_asset_id = Uuid::from_bytes(cursor.take_array()?).to_string();

    let price_len = cursor.take_u8()? as usize;
    let price_bytes = cursor.take_n(price_len)?;
    let price = std::str::from_utf8(price_bytes).ok()?.to_string();

    let order_type = match cursor.take_u8()? {
        TYPE_LIMIT => OrderType::Limit,
        TYPE_MARKET => OrderType::Market,
        _ => return None,
    };

    let order_id = match cursor.take_u8()? {
        ORDER_ABSENT => None,
        ORDER_PRESENT => Some(Uuid::from_bytes(cursor.take_array()?).to_string()),
        _ => return None,
    };

    if !cursor.is_exhausted() {
        return None;
    }

    Some(OrderIntent {
        side,
        counter_asset_id,
        price,
        order_type,
        order_id,
    })
}

/// Encode an [`OrderIntent`] into the same wire layout `decode` reads.
/// Used by tests and by any producer-side tooling.
pub fn encode(intent: &OrderIntent) -> String {
    let mut buf = Vec::new();
    buf.push(match intent.side {
        Side::Ask => SIDE_ASK,
        Side::Bid => SIDE_BID,
    });
    let asset = Uuid::parse_str(&intent.counter_asset_id)
        .unwrap_or_else(|_| Uuid::nil())
        .into_bytes();
    buf.extend_from_slice(&asset);
    buf.push(intent.price.len() as u8);
    buf.extend_from_slice(intent.price.as_bytes());
    buf.push(match intent.order_type {
        OrderType::Limit => TYPE_LIMIT,
        OrderType::Market => TYPE_MARKET,
    });
    match &intent.order_id {
        None => buf.push(ORDER_ABSENT),
        Some(id) => {
            buf.push(ORDER_PRESENT);
            let bytes = Uuid::parse_str(id).unwrap_or_else(|_| Uuid::nil()).into_bytes();
            buf.extend_from_slice(&bytes);
        }
    }
    STANDARD.encode(buf)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take_u8(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn take_n(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.bytes.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let slice = self.take_n(N)?;
        slice.try_into().ok()
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_intent() -> OrderIntent {
        OrderIntent {
            side: Side::Bid,
            counter_asset_id: "c6d0c728-2624-429b-8e0d-d9d19b6592fa".to_string(),
            price: "20000".to_string(),
            order_type: OrderType::Limit,
            order_id: None,
        }
    }

    #[test]
    fn roundtrips_create_intent() {
        let intent = sample_intent();
        let encoded = encode(&intent);
        let decoded = decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded, intent);
    }

    #[test]
    fn roundtrips_cancel_intent() {
        let mut intent = sample_intent();
        intent.order_id = Some("815b0b1a-2764-3736-8faa-42d694fa620a".to_string());
        let encoded = encode(&intent);
        let decoded = decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded.order_id, intent.order_id);
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(decode("not valid base64!!").is_err());
    }

    #[test]
    fn rejects_truncated_payload() {
        let encoded = encode(&sample_intent());
        let raw = STANDARD.decode(&encoded).unwrap();
        let truncated = STANDARD.encode(&raw[..raw.len() - 3]);
        assert!(decode(&truncated).unwrap().is_none());
    }

    #[test]
    fn rejects_trailing_garbage() {
        let encoded = encode(&sample_intent());
        let mut raw = STANDARD.decode(&encoded).unwrap();
        raw.push(0xff);
        let padded = STANDARD.encode(&raw);
        assert!(decode(&padded).unwrap().is_none());
    }

    #[test]
    fn rejects_unrecognized_side_tag() {
        let mut raw = STANDARD
            .decode(encode(&sample_intent()))
            .unwrap();
        raw[0] = 0xaa;
        assert!(decode(&STANDARD.encode(&raw)).unwrap().is_none());
    }
}
