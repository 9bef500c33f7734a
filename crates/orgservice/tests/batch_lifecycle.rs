//! End-to-end batch lifecycle through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use orgservice::{
    BatchManager, BatchStatus, ExecuteMultipleResponse, ExecuteMultipleResponseItem,
    ExecuteMultipleSettings, ExecutionError, OrganizationRequest, OrganizationResponse,
    RequestBody, RequestExecutor, ResponseBody,
};
use serde_json::{json, Map};

/// Answers `ExecuteMultiple` with one response per request and counts calls.
#[derive(Default)]
struct CountingExecutor {
    calls: AtomicUsize,
}

#[async_trait]
impl RequestExecutor for CountingExecutor {
    async fn execute(
        &self,
        request: OrganizationRequest,
        _context: &str,
    ) -> Result<OrganizationResponse, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let RequestBody::ExecuteMultiple { requests, .. } = request.body else {
            return Err(ExecutionError::Transport {
                message: "only ExecuteMultiple is supported".to_string(),
            });
        };
        let responses = requests
            .into_iter()
            .enumerate()
            .map(|(request_index, inner)| ExecuteMultipleResponseItem {
                request_index,
                response: Some(OrganizationResponse {
                    request_id: inner.request_id,
                    body: ResponseBody::Custom {
                        response_name: "Update".to_string(),
                        results: Map::new(),
                    },
                }),
                fault: None,
            })
            .collect();
        Ok(OrganizationResponse::new(ResponseBody::ExecuteMultiple {
            result: ExecuteMultipleResponse {
                is_faulted: false,
                responses,
            },
        }))
    }
}

fn update_request(id: u32) -> OrganizationRequest {
    let mut parameters = Map::new();
    parameters.insert(
        "target".to_string(),
        json!({ "logical_name": "contact", "id": id, "telephone1": "555-0100" }),
    );
    OrganizationRequest::custom("Update", parameters)
}

#[test]
fn test_create_fill_lookup_and_remove_batch() {
    let manager = BatchManager::default();
    let settings = ExecuteMultipleSettings {
        continue_on_error: true,
        ..ExecuteMultipleSettings::default()
    };

    let id = manager.create_batch(Some("B1"), settings).unwrap();
    for i in 0..3 {
        assert!(manager.add_item_to_batch(id, update_request(i), Some("phone fix")));
    }

    let batch = manager.get_batch_by_name("b1").unwrap();
    assert_eq!(batch.id(), id);
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.name(), "B1");
    assert!(batch.settings().continue_on_error);

    manager.remove_batch(id);
    assert!(manager.get_batch_by_id(id).is_none());
}

#[tokio::test]
async fn test_submitted_batch_results_match_items_by_correlation_id() {
    let manager = BatchManager::default();
    let executor = CountingExecutor::default();
    let id = manager
        .create_batch(Some("phones"), ExecuteMultipleSettings::default())
        .unwrap();
    for i in 0..5 {
        assert!(manager.add_item_to_batch(id, update_request(i), None));
    }

    manager.execute_batch(id, &executor).await.unwrap();

    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    let batch = manager.remove_batch(id).unwrap();
    assert_eq!(batch.status(), BatchStatus::Complete);
    for item in batch.items() {
        let result = batch.response_for(item.correlation_id).unwrap();
        assert_eq!(
            result.response.as_ref().and_then(|r| r.request_id),
            Some(item.correlation_id)
        );
    }
}
