//! Pipeline configuration, loaded from YAML.
//!
//! One `Config` struct tree deserialized in a single pass via `serde_yaml`,
//! with per-field `Deserialize` derives rather than a hand-rolled parser.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;

use crate::error::PipelineError;

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub service: ServiceConfig,
    pub custody: CustodyConfig,
    pub database: DatabaseConfig,
    pub market: MarketConfig,
    pub fees: FeeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Our own custody account id — snapshots not addressed to this id are
    /// someone else's and are ignored.
    pub account_id: String,
    pub poll_interval_ms: u64,
    pub dispatch_interval_ms: u64,
    pub dispatch_batch_size: i64,
    /// Fixed small retry delay applied between attempts on any transient
    /// failure in the intake or dispatch loops.
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustodyConfig {
    pub base_url: String,
    pub snapshot_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Decimal places orders and prices are rescaled to before being
    /// submitted to the matching engine.
    pub engine_precision: u32,
    /// Quote assets eligible to anchor a trading pair.
    pub quote_assets: HashSet<String>,
    /// Canonical (quote, base) pairs; the inverse of any of these is
    /// rejected so the same two assets can't list twice under swapped
    /// roles.
    pub canonical_pairs: Vec<(String, String)>,
    /// Fraction of an invalid deposit returned on refund.
    #[serde(default = "default_haircut")]
    pub refund_haircut: Decimal,
}

fn default_haircut() -> Decimal {
    Decimal::new(999, 3) // 0.999
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    pub maker_rate: Decimal,
    pub taker_rate: Decimal,
}

impl MarketConfig {
    /// True if `(quote, base)` is whitelisted and not the inverse of a
    /// canonical pair.
    pub fn pair_allowed(&self, quote: &str, base: &str) -> bool {
        if !self.quote_assets.contains(quote) {
            return false;
        }
        !self
            .canonical_pairs
            .iter()
            .any(|(q, b)| q == base && b == quote)
    }
}

impl PipelineConfig {
    pub fn from_file(path: &str) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn from_str(yaml: &str) -> Result<Self, PipelineError> {
        serde_yaml::from_str(yaml).map_err(|e| PipelineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
service:
  account_id: "our-account"
  poll_interval_ms: 500
  dispatch_interval_ms: 1000
  dispatch_batch_size: 100
  retry_delay_ms: 100
custody:
  base_url: "https://custody.example/network"
  snapshot_limit: 500
database:
  url: "postgres://localhost/pipeline"
market:
  engine_precision: 8
  quote_assets: ["USDT"]
  canonical_pairs: [["USDT", "BTC"]]
fees:
  maker_rate: "0.001"
  taker_rate: "0.002"
"#;

    #[test]
    fn deserializes_sample_config() {
        let cfg = PipelineConfig::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.service.account_id, "our-account");
        assert_eq!(cfg.market.engine_precision, 8);
        assert!(cfg.market.quote_assets.contains("USDT"));
    }

    #[test]
    fn default_haircut_applies_when_absent() {
        let cfg = PipelineConfig::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.market.refund_haircut, Decimal::new(999, 3));
    }

    #[test]
    fn pair_whitelist_rejects_inverse() {
        let cfg = PipelineConfig::from_str(SAMPLE).unwrap();
        assert!(cfg.market.pair_allowed("USDT", "BTC"));
        assert!(!cfg.market.pair_allowed("BTC", "USDT"));
        assert!(!cfg.market.pair_allowed("ETH", "BTC"));
    }
}
