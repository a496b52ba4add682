use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CustodyError;
use crate::models::Snapshot;

use super::types::TransferRequest;

/// Unified interface to the custody network's two HTTP endpoints.
///
/// An `async_trait`, object safe, so the poller and dispatcher can hold
/// `Box<dyn CustodyClient>` and run against either the live client or an
/// in-memory fake in tests.
#[async_trait]
pub trait CustodyClient: Send + Sync {
    /// `GET /network/snapshots?offset=<checkpoint>&order=ASC&limit=<n>`.
    /// Returns snapshots in ascending `created_at` order, `offset`
    /// inclusive of the first unseen snapshot.
    async fn fetch_snapshots(
        &self,
        offset: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Snapshot>, CustodyError>;

    /// `POST /transfers`. Idempotent on `trace_id` at the custody network;
    /// the dispatcher supplies a deterministic transfer id as `trace_id`.
    async fn submit_transfer(&self, request: &TransferRequest) -> Result<(), CustodyError>;
}

/// Production client over the documented HTTP contract.
pub struct ReqwestCustodyClient {
    http: reqwest::Client,
    base_url: String,
    pin_material: String,
}

impl ReqwestCustodyClient {
    pub fn new(base_url: impl Into<String>, pin_material: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            pin_material: pin_material.into(),
        }
    }

    /// Compute the encrypted proof-of-authorization (`pin`) accompanying
    /// every transfer. The real encryption scheme is the custody network's
    /// own concern; here it is a stand-in the client owns so the rest of
    /// the pipeline never handles key material.
    fn encrypt_pin(&self) -> String {
        self.pin_material.clone()
    }
}

#[derive(serde::Deserialize)]
struct SnapshotsResponse {
    data: Vec<Snapshot>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(serde::Deserialize)]
struct TransferErrorEnvelope {
    #[serde(default)]
    error: Option<TransferErrorBody>,
}

#[derive(serde::Deserialize)]
struct TransferErrorBody {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    description: String,
}

#[derive(serde::Serialize)]
struct TransferWire<'a> {
    asset_id: &'a str,
    opponent_id: &'a str,
    amount: rust_decimal::Decimal,
    pin: String,
    trace_id: &'a str,
    memo: &'a str,
}

#[async_trait]
impl CustodyClient for ReqwestCustodyClient {
    async fn fetch_snapshots(
        &self,
        offset: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Snapshot>, CustodyError> {
        let url = format!(
            "{}/network/snapshots?offset={}&order=ASC&limit={}",
            self.base_url,
            offset.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
            limit
        );
        let resp: SnapshotsResponse = self.http.get(url).send().await?.json().await?;
        if let Some(err) = resp.error {
            return Err(CustodyError::Remote(err));
        }
        Ok(resp.data)
    }

    async fn submit_transfer(&self, request: &TransferRequest) -> Result<(), CustodyError> {
        let wire = TransferWire {
            asset_id: &request.asset_id,
            opponent_id: &request.opponent_id,
            amount: request.amount,
            pin: self.encrypt_pin(),
            trace_id: &request.trace_id,
            memo: &request.memo,
        };
        let resp = self
            .http
            .post(format!("{}/transfers", self.base_url))
            .json(&wire)
            .send()
            .await?;
        let envelope: TransferErrorEnvelope = resp.json().await?;
        if let Some(err) = envelope.error {
            if err.code > 0 {
                return Err(CustodyError::Remote(err.description));
            }
        }
        Ok(())
    }
}
