//! Error taxonomy for the intake/settlement pipeline.
//!
//! One small `thiserror` enum per component, plus a top-level
//! `PipelineError` that composes them for callers that span components
//! (e.g. the supervisor in `main.rs`).
//!
//! Disposition of a snapshot (create / cancel / refund / ignore) is never
//! represented as an error — see [`crate::classifier::Disposition`]. These
//! types only cover transient failures that must be retried, and genuine
//! configuration/programmer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid base64 payload")]
    Base64(#[from] base64::DecodeError),
    #[error("malformed intent payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("custody network request failed: {0}")]
    Custody(#[from] CustodyError),
    #[error("checkpoint store error: {0}")]
    Checkpoint(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("custody network returned an error: {0}")]
    Remote(String),
    #[error("custody network response was not understood: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("custody network error: {0}")]
    Custody(#[from] CustodyError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Poller(#[from] PollerError),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Custody(#[from] CustodyError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
