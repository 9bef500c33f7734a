//! The batch registry.
//!
//! [`BatchManager`] owns every [`Batch`] from creation until removal. Callers
//! see snapshots; all mutation goes through the manager so capacity and status
//! checks happen under the batch's map entry.

use dashmap::DashMap;
use tracing::{debug, error, info, instrument, warn};

use super::{Batch, BatchItem, BatchStatus};
use crate::{
    BatchId, BatchLimits, CorrelationId, ExecuteMultipleResponse, ExecuteMultipleSettings,
    ExecutionError, OrgServiceError, OrganizationRequest, RequestBody, RequestExecutor,
    Timestamp,
};

/// Registry of in-flight batches.
///
/// Safe to share between threads: creation, lookup, item appends and removal
/// may run concurrently. Each append checks the live item count of its batch
/// while holding that batch's entry, so concurrent appends to the same batch
/// are serialised.
///
/// Capacity checks compare with `count > max`: one batch (or one item) beyond
/// the configured maximum is admitted before further insertions are refused.
#[derive(Debug, Default)]
pub struct BatchManager {
    batches: DashMap<BatchId, Batch>,
    limits: BatchLimits,
}

impl BatchManager {
    /// Creates an empty registry enforcing `limits`.
    pub fn new(limits: BatchLimits) -> Self {
        Self {
            batches: DashMap::new(),
            limits,
        }
    }

    /// The capacity limits this registry enforces.
    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    /// Number of batches currently registered.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Returns `true` if no batch is registered.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Creates and registers a new batch.
    ///
    /// When `name` is `None` (or blank) a name is generated from the creation
    /// time and the batch identifier. Returns `None` if the registry is full.
    pub fn create_batch(
        &self,
        name: Option<&str>,
        settings: ExecuteMultipleSettings,
    ) -> Option<BatchId> {
        let count = self.batches.len();
        if count > self.limits.max_number_of_batches {
            error!(
                count,
                max = self.limits.max_number_of_batches,
                "batch limit exceeded; release completed batches before creating new ones"
            );
            return None;
        }

        let id = BatchId::new_random();
        let batch = Batch::new(id, name, settings, Timestamp::now());
        debug!(batch = %id, name = batch.name(), "batch created");
        self.batches.insert(id, batch);
        Some(id)
    }

    /// Returns a snapshot of the batch registered under `id`.
    pub fn get_batch_by_id(&self, id: BatchId) -> Option<Batch> {
        self.batches.get(&id).map(|entry| entry.value().clone())
    }

    /// Returns a snapshot of a batch whose name matches `name`, ignoring case.
    ///
    /// Names are not unique; when several batches share one, which of them is
    /// returned is unspecified.
    pub fn get_batch_by_name(&self, name: &str) -> Option<Batch> {
        let wanted = name.to_lowercase();
        self.batches
            .iter()
            .find(|entry| entry.value().name().to_lowercase() == wanted)
            .map(|entry| entry.value().clone())
    }

    /// Appends `request` to the batch registered under `batch_id`.
    ///
    /// A fresh [`CorrelationId`] is assigned to the item and stamped onto the
    /// request. Returns `false` (and adds nothing) if the batch does not
    /// exist, is no longer [`BatchStatus::Waiting`], or is already full.
    pub fn add_item_to_batch(
        &self,
        batch_id: BatchId,
        mut request: OrganizationRequest,
        debug_message: Option<&str>,
    ) -> bool {
        let Some(mut batch) = self.batches.get_mut(&batch_id) else {
            warn!(batch = %batch_id, "cannot add item: batch not found");
            return false;
        };

        if batch.status != BatchStatus::Waiting {
            warn!(
                batch = %batch_id,
                status = ?batch.status,
                "cannot add item: batch has already been submitted"
            );
            return false;
        }

        let count = batch.items.len();
        if count > self.limits.max_number_of_requests_in_a_batch {
            error!(
                batch = %batch_id,
                count,
                max = self.limits.max_number_of_requests_in_a_batch,
                "request limit exceeded for batch; item not added"
            );
            return false;
        }

        let correlation_id = CorrelationId::new_random();
        request.request_id = Some(correlation_id);
        debug!(
            batch = %batch_id,
            correlation = %correlation_id,
            request = request.request_name(),
            "item added to batch"
        );
        batch.items.push(BatchItem {
            correlation_id,
            request,
            debug_message: debug_message.map(str::to_string),
        });
        true
    }

    /// Removes the batch registered under `id`, returning it if it existed.
    pub fn remove_batch(&self, id: BatchId) -> Option<Batch> {
        let removed = self.batches.remove(&id).map(|(_, batch)| batch);
        if removed.is_some() {
            debug!(batch = %id, "batch removed");
        }
        removed
    }

    /// Submits the batch as a single `ExecuteMultiple` request.
    ///
    /// The batch is marked [`BatchStatus::Running`] before the call so no items
    /// can be added while it is in flight. On success the response becomes the
    /// batch's result container and the batch is [`BatchStatus::Complete`]. On
    /// failure the batch returns to [`BatchStatus::Waiting`] unchanged; it is
    /// not retried.
    #[instrument(skip(self, executor), fields(batch = %batch_id))]
    pub async fn execute_batch(
        &self,
        batch_id: BatchId,
        executor: &dyn RequestExecutor,
    ) -> Result<ExecuteMultipleResponse, OrgServiceError> {
        let request = {
            let mut batch = self
                .batches
                .get_mut(&batch_id)
                .ok_or(OrgServiceError::BatchNotFound(batch_id))?;
            if batch.status != BatchStatus::Waiting {
                return Err(OrgServiceError::BatchAlreadySubmitted {
                    id: batch_id,
                    status: batch.status,
                });
            }
            if batch.items.is_empty() {
                return Err(OrgServiceError::EmptyBatch(batch_id));
            }
            batch.status = BatchStatus::Running;
            OrganizationRequest::new(RequestBody::ExecuteMultiple {
                requests: batch.items.iter().map(|item| item.request.clone()).collect(),
                settings: batch.settings(),
            })
        };

        info!("submitting batch");
        let outcome = match executor.execute(request, "execute_batch").await {
            Ok(response) => {
                let actual = response.body.kind();
                response
                    .into_execute_multiple()
                    .ok_or_else(|| ExecutionError::UnexpectedResponse {
                        expected: "ExecuteMultiple".to_string(),
                        actual: actual.to_string(),
                    })
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(results) => {
                match self.batches.get_mut(&batch_id) {
                    Some(mut batch) => {
                        batch.results = Some(results.clone());
                        batch.status = BatchStatus::Complete;
                    }
                    None => debug!("batch removed while running; results not stored"),
                }
                info!(
                    responses = results.responses.len(),
                    faulted = results.is_faulted,
                    "batch complete"
                );
                Ok(results)
            }
            Err(err) => {
                warn!(error = %err, "batch execution failed");
                if let Some(mut batch) = self.batches.get_mut(&batch_id) {
                    batch.status = BatchStatus::Waiting;
                }
                Err(err.into())
            }
        }
    }
}
