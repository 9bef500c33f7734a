//! Error and retry-policy types.
//!
//! [`OrgServiceError`] covers misuse of the public contract and batch
//! submission failures. Capacity violations and lookups that find nothing are
//! deliberately *not* errors: they surface as `false` or `None`.
//!
//! [`ExecutionError`] is what a [`crate::RequestExecutor`] reports when a
//! remote call fails. It can describe its own [`RetryPolicy`], but nothing in
//! this crate retries; that decision belongs to the caller or the transport.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BatchId, BatchStatus, ServiceFault};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried without changing the request.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Execution port errors
// ---------------------------------------------------------------------------

/// Failure of a single remote call.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum ExecutionError {
    /// The remote service processed the request and returned a fault.
    #[error("remote fault: {0}")]
    Fault(ServiceFault),

    /// The request never produced a response (connection, TLS, timeout).
    #[error("transport failure: {message}")]
    Transport {
        /// Description of the transport problem.
        message: String,
    },

    /// The remote service rejected the call because of rate limiting.
    #[error("request throttled by the remote service")]
    Throttled {
        /// Delay advertised by the service, if any.
        retry_after: Option<Duration>,
    },

    /// A response arrived but its shape did not match the request kind.
    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        /// Response kind the caller needed.
        expected: String,
        /// Response kind that arrived.
        actual: String,
    },
}

impl ExecutionError {
    /// Classifies this error for callers that implement their own retries.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport { .. } => RetryPolicy::Retryable { after: None },
            Self::Throttled { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Fault(_) | Self::UnexpectedResponse { .. } => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Domain errors
// ---------------------------------------------------------------------------

/// Errors returned by the public operations of this crate.
#[derive(Debug, Error)]
pub enum OrgServiceError {
    /// A required argument was missing or empty.
    #[error("invalid argument '{argument}': {reason}")]
    InvalidArgument {
        /// Name of the offending argument.
        argument: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// No batch with this identifier is registered.
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),

    /// The batch has already been submitted for execution.
    #[error("batch {id} cannot be submitted while {status:?}")]
    BatchAlreadySubmitted {
        /// The batch.
        id: BatchId,
        /// Its status at the time of the call.
        status: BatchStatus,
    },

    /// The batch has no items to submit.
    #[error("batch {0} has no items")]
    EmptyBatch(BatchId),

    /// The remote call failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
