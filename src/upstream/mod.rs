//! Trio Enterprise API client.
//!
//! [`TrioClient`] owns an [`auth::AuthSession`] and turns the three
//! contact-center resources into typed records. The poller only sees the
//! [`UpstreamSource`] seam so tests can substitute a scripted source.

pub mod auth;
pub mod client;
pub mod wire;

use std::future::Future;
use std::pin::Pin;

use crate::models::agent::AgentState;
use crate::models::call::CallRecord;
use crate::models::queue::QueueReading;
use crate::Result;

pub use client::TrioClient;

/// Everything one upstream fetch produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamBatch {
    /// Current agent states.
    pub agents: Vec<AgentState>,
    /// Current queue readings.
    pub queues: Vec<QueueReading>,
    /// Today's calls.
    pub calls: Vec<CallRecord>,
}

/// Source of upstream data for the poller.
///
/// Implementations classify failures as `AppError::Transient` (retry) or
/// `AppError::Fatal` (halt).
pub trait UpstreamSource: Send {
    /// Fetch one batch.
    fn fetch(&mut self) -> Pin<Box<dyn Future<Output = Result<UpstreamBatch>> + Send + '_>>;
}
