//! The request execution port.
//!
//! Both the batch orchestrator and the metadata cache reach the remote service
//! only through [`RequestExecutor`]. Transport, authentication, retries and
//! timeouts are the implementor's concern.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{ExecutionError, OrganizationRequest, OrganizationResponse};

/// Executes one remote request.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Sends `request` and returns its response.
    ///
    /// `context` names the calling operation for diagnostics only; it must not
    /// change how the request is executed.
    async fn execute(
        &self,
        request: OrganizationRequest,
        context: &str,
    ) -> Result<OrganizationResponse, ExecutionError>;
}

#[async_trait]
impl<T> RequestExecutor for Arc<T>
where
    T: RequestExecutor + ?Sized,
{
    async fn execute(
        &self,
        request: OrganizationRequest,
        context: &str,
    ) -> Result<OrganizationResponse, ExecutionError> {
        (**self).execute(request, context).await
    }
}
