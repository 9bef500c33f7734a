//! Mock executor shared by the unit tests in this crate.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ExecutionError, OrganizationRequest, OrganizationResponse, RequestExecutor};

type Handler =
    dyn Fn(&OrganizationRequest) -> Result<OrganizationResponse, ExecutionError> + Send + Sync;

/// Answers every request with a caller-supplied closure and records what it saw.
pub(crate) struct MockExecutor {
    handler: Box<Handler>,
    calls: Mutex<Vec<(OrganizationRequest, String)>>,
}

impl MockExecutor {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&OrganizationRequest) -> Result<OrganizationResponse, ExecutionError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// An executor whose every call fails at the transport level.
    pub(crate) fn failing() -> Self {
        Self::new(|_| {
            Err(ExecutionError::Transport {
                message: "connection refused".to_string(),
            })
        })
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<OrganizationRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub(crate) fn contexts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, context)| context.clone())
            .collect()
    }
}

#[async_trait]
impl RequestExecutor for MockExecutor {
    async fn execute(
        &self,
        request: OrganizationRequest,
        context: &str,
    ) -> Result<OrganizationResponse, ExecutionError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), context.to_string()));
        (self.handler)(&request)
    }
}

mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_call_is_recorded_before_handler_runs() {
        let executor = Arc::new(MockExecutor::new(|_| panic!("handler blew up")));

        let task = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                executor
                    .execute(
                        OrganizationRequest::custom("WhoAmI", serde_json::Map::new()),
                        "who_am_i",
                    )
                    .await
            })
        };

        assert!(task.await.unwrap_err().is_panic());
        assert_eq!(executor.call_count(), 1);
        assert_eq!(executor.contexts(), vec!["who_am_i".to_string()]);
    }
}
