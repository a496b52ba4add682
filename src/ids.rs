//! Deterministic id derivation.
//!
//! `uuid_v3` reproduces a specific bit layout required for interoperability
//! with existing records: MD5 the concatenation of a namespace string and a
//! modifier, then stamp the version/variant bits of a textbook UUIDv3. This
//! is *not* the same as `uuid::Uuid::new_v3` (which hashes a namespace UUID
//! plus name per RFC 4122) — records here are derived by MD5-ing two plain
//! strings directly, so the derivation is hand-rolled against `md5` +
//! `uuid::Builder` rather than using the crate's built-in v3 constructor.

use uuid::Uuid;

/// Derive a deterministic UUID from `namespace` and `modifier`.
///
/// Every outbound transfer id is one of `uuid_v3(trace_id, "REFUND")`,
/// `uuid_v3(trade_id, liquidity)`, or `uuid_v3(order_id, "CANCEL")` — the
/// three namespaces are disjoint by construction since no two inputs ever
/// collide in both the first argument and the modifier.
pub fn uuid_v3(namespace: &str, modifier: &str) -> Uuid {
    let mut buf = Vec::with_capacity(namespace.len() + modifier.len());
    buf.extend_from_slice(namespace.as_bytes());
    buf.extend_from_slice(modifier.as_bytes());
    let digest = md5::compute(&buf);
    let mut bytes = *digest;
    bytes[6] = (bytes[6] & 0x0f) | 0x30;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    Uuid::from_bytes(bytes)
}

pub mod namespace {
    pub const REFUND: &str = "REFUND";
    pub const CANCEL: &str = "CANCEL";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        let a = uuid_v3("trace-1", namespace::REFUND);
        let b = uuid_v3("trace-1", namespace::REFUND);
        assert_eq!(a, b);
    }

    #[test]
    fn disjoint_by_modifier() {
        let refund = uuid_v3("same-id", namespace::REFUND);
        let cancel = uuid_v3("same-id", namespace::CANCEL);
        assert_ne!(refund, cancel);
    }

    #[test]
    fn sets_version_and_variant_bits() {
        let id = uuid_v3("x", "y");
        let bytes = id.as_bytes();
        assert_eq!(bytes[6] & 0xf0, 0x30);
        assert_eq!(bytes[8] & 0xc0, 0x80);
    }

    #[test]
    fn matches_known_vector() {
        // md5("hello" || "world") with version/variant bits stamped.
        let digest = md5::compute(b"helloworld");
        let mut expected = *digest;
        expected[6] = (expected[6] & 0x0f) | 0x30;
        expected[8] = (expected[8] & 0x3f) | 0x80;
        assert_eq!(uuid_v3("hello", "world").into_bytes(), expected);
    }
}
