//! The assembled organization service client.

use std::sync::Arc;

use orgservice::{
    BatchId, BatchManager, ExecuteMultipleResponse, MetadataCache, OrgServiceError,
    OrganizationRequest, OrganizationResponse, RequestExecutor,
};
use tracing::{debug, info, instrument};

use crate::config::ClientConfig;

/// Owns one [`BatchManager`] and a (possibly shared) [`MetadataCache`], both
/// talking to the remote service through the same [`RequestExecutor`].
pub struct ServiceClient {
    executor: Arc<dyn RequestExecutor>,
    batches: BatchManager,
    metadata: Arc<MetadataCache>,
}

impl ServiceClient {
    /// Builds a client with its own metadata cache.
    pub fn new(executor: Arc<dyn RequestExecutor>, config: &ClientConfig) -> Self {
        let metadata = Arc::new(MetadataCache::new(Arc::clone(&executor), config.metadata));
        Self::with_shared_metadata_cache(executor, config, metadata)
    }

    /// Builds a client that reuses an existing metadata cache.
    ///
    /// Clients connected to the same organization can share one cache so
    /// schema metadata is fetched once per process rather than once per
    /// client. The batch registry is never shared.
    pub fn with_shared_metadata_cache(
        executor: Arc<dyn RequestExecutor>,
        config: &ClientConfig,
        metadata: Arc<MetadataCache>,
    ) -> Self {
        info!(
            max_batches = config.batching.max_number_of_batches,
            max_requests_per_batch = config.batching.max_number_of_requests_in_a_batch,
            staleness_window_secs = metadata.staleness_window().as_secs(),
            "service client created"
        );
        Self {
            executor,
            batches: BatchManager::new(config.batching),
            metadata,
        }
    }

    /// This client's batch registry.
    pub fn batches(&self) -> &BatchManager {
        &self.batches
    }

    /// The metadata cache, possibly shared with other clients.
    pub fn metadata(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    /// Sends a single request straight to the executor.
    #[instrument(skip(self, request), fields(request = %request.request_name()))]
    pub async fn execute(
        &self,
        request: OrganizationRequest,
        context: &str,
    ) -> Result<OrganizationResponse, OrgServiceError> {
        let response = self.executor.execute(request, context).await?;
        debug!(response = response.body.kind(), "request executed");
        Ok(response)
    }

    /// Submits a batch held by this client's registry.
    pub async fn execute_batch(
        &self,
        batch_id: BatchId,
    ) -> Result<ExecuteMultipleResponse, OrgServiceError> {
        self.batches
            .execute_batch(batch_id, self.executor.as_ref())
            .await
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("batches", &self.batches)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
