//! Custody network client.
//!
//! The custody HTTP client's wire transport is an external collaborator;
//! only its two contracts (fetch snapshots, submit a transfer) matter to
//! this pipeline. `CustodyClient` expresses them as a pluggable, async,
//! object-safe trait so the poller and dispatcher can be tested against an
//! in-memory fake without a live network.

pub mod client;
pub mod types;

pub use client::{CustodyClient, ReqwestCustodyClient};
pub use types::TransferRequest;
