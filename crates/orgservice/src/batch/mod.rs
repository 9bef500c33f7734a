//! Batch orchestration.
//!
//! A [`Batch`] groups remote requests for submission as one `ExecuteMultiple`
//! call. Batches live in the [`BatchManager`] registry from creation until the
//! owner removes them; nothing is evicted implicitly.
//!
//! # Lifecycle
//!
//! ```text
//! create_batch ──► Waiting ──add_item_to_batch──► Waiting
//!                     │
//!               execute_batch
//!                     ▼
//!                  Running ──success──► Complete ──remove_batch──► gone
//!                     │
//!                  failure ──► Waiting
//! ```

mod manager;


pub use manager::BatchManager;

use serde::{Deserialize, Serialize};

use crate::{
    BatchId, CorrelationId, ExecuteMultipleResponse, ExecuteMultipleResponseItem,
    ExecuteMultipleSettings, OrganizationRequest, Timestamp,
};

/// Where a batch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Accepting items; not yet submitted.
    Waiting,
    /// Submitted; the `ExecuteMultiple` call is in flight.
    Running,
    /// Results are available.
    Complete,
}

/// One request inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Assigned when the item was added. Also stamped onto `request`.
    pub correlation_id: CorrelationId,
    /// The request payload, owned by the item.
    pub request: OrganizationRequest,
    /// Free-text annotation for diagnostics.
    pub debug_message: Option<String>,
}

/// A named group of requests plus, once executed, their results.
///
/// Values handed out by the [`BatchManager`] are snapshots; mutating one does
/// not affect the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    id: BatchId,
    name: String,
    settings: ExecuteMultipleSettings,
    created_at: Timestamp,
    pub(crate) items: Vec<BatchItem>,
    pub(crate) results: Option<ExecuteMultipleResponse>,
    pub(crate) status: BatchStatus,
}

impl Batch {
    pub(crate) fn new(
        id: BatchId,
        name: Option<&str>,
        settings: ExecuteMultipleSettings,
        created_at: Timestamp,
    ) -> Self {
        let name = match name {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!(
                "Batch-{}-{}",
                created_at.as_datetime().format("%Y%m%d%H%M%S%3f"),
                id
            ),
        };
        Self {
            id,
            name,
            settings,
            created_at,
            items: Vec::new(),
            results: None,
            status: BatchStatus::Waiting,
        }
    }

    /// Identifier assigned at creation.
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Display name, supplied or generated.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings sent with the `ExecuteMultiple` submission.
    pub fn settings(&self) -> ExecuteMultipleSettings {
        self.settings
    }

    /// When the batch was created.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Current lifecycle status.
    pub fn status(&self) -> BatchStatus {
        self.status
    }

    /// Items in the order they were added.
    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    /// Number of items added so far.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no item has been added.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The `ExecuteMultiple` result, once the batch is [`BatchStatus::Complete`].
    pub fn results(&self) -> Option<&ExecuteMultipleResponse> {
        self.results.as_ref()
    }

    /// Finds the item carrying `correlation_id`.
    pub fn item(&self, correlation_id: CorrelationId) -> Option<&BatchItem> {
        self.items
            .iter()
            .find(|item| item.correlation_id == correlation_id)
    }

    /// Finds the result entry for the item carrying `correlation_id`.
    ///
    /// Results are matched by the item's position, which is the request index
    /// the remote service reports.
    pub fn response_for(
        &self,
        correlation_id: CorrelationId,
    ) -> Option<&ExecuteMultipleResponseItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.correlation_id == correlation_id)?;
        self.results
            .as_ref()?
            .responses
            .iter()
            .find(|r| r.request_index == index)
    }
}
