//! Requests sent through the [`crate::RequestExecutor`] and the responses it
//! returns.
//!
//! The batch orchestrator treats an [`OrganizationRequest`] as an opaque
//! payload: it only ever stamps [`OrganizationRequest::request_id`]. The
//! metadata cache builds the `Retrieve*` kinds and narrows responses with the
//! `into_*` helpers, treating a shape mismatch as "no result".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    AttributeMetadata, CorrelationId, EntityFilters, EntityMetadata, OptionSetMetadata,
};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRequest {
    /// Correlation identifier. Set by the batch orchestrator when the request
    /// is added to a batch; echoed back on the matching response.
    pub request_id: Option<CorrelationId>,
    /// What to execute.
    pub body: RequestBody,
}

impl OrganizationRequest {
    /// Wraps a request body with no correlation identifier.
    pub fn new(body: RequestBody) -> Self {
        Self {
            request_id: None,
            body,
        }
    }

    /// Builds a named request carrying arbitrary parameters (create, update,
    /// delete, custom actions).
    pub fn custom(request_name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self::new(RequestBody::Custom {
            request_name: request_name.into(),
            parameters,
        })
    }

    /// Remote message name for this request, used in diagnostics.
    pub fn request_name(&self) -> &str {
        match &self.body {
            RequestBody::RetrieveEntity { .. } => "RetrieveEntity",
            RequestBody::RetrieveAllEntities { .. } => "RetrieveAllEntities",
            RequestBody::RetrieveAttribute { .. } => "RetrieveAttribute",
            RequestBody::RetrieveOptionSet { .. } => "RetrieveOptionSet",
            RequestBody::ExecuteMultiple { .. } => "ExecuteMultiple",
            RequestBody::Custom { request_name, .. } => request_name,
        }
    }
}

/// The kinds of request the client knows how to build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestBody {
    /// Fetch one entity description.
    RetrieveEntity {
        /// Logical name of the entity.
        logical_name: String,
        /// Sections to include.
        filters: EntityFilters,
        /// Include unpublished customizations.
        retrieve_as_if_published: bool,
    },
    /// Fetch every entity description.
    RetrieveAllEntities {
        /// Sections to include for every entity.
        filters: EntityFilters,
        /// Include unpublished customizations.
        retrieve_as_if_published: bool,
    },
    /// Fetch one attribute description.
    RetrieveAttribute {
        /// Owning entity.
        entity_logical_name: String,
        /// Logical name of the attribute.
        logical_name: String,
        /// Include unpublished customizations.
        retrieve_as_if_published: bool,
    },
    /// Fetch one global option set.
    RetrieveOptionSet {
        /// Name of the global option set.
        name: String,
        /// Include unpublished customizations.
        retrieve_as_if_published: bool,
    },
    /// Execute several requests as one remote call.
    ExecuteMultiple {
        /// Requests in submission order.
        requests: Vec<OrganizationRequest>,
        /// Error and response handling for the whole call.
        settings: ExecuteMultipleSettings,
    },
    /// Any other named remote message.
    Custom {
        /// Name of the remote message.
        request_name: String,
        /// Input parameters by name.
        parameters: Map<String, Value>,
    },
}

/// How the remote service should process an `ExecuteMultiple` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteMultipleSettings {
    /// Keep executing the remaining requests after one faults.
    pub continue_on_error: bool,
    /// Return a response for every request, not only for faults.
    pub return_responses: bool,
}

impl Default for ExecuteMultipleSettings {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            return_responses: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A fault reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFault {
    /// Remote error code.
    pub code: i32,
    /// Remote error message.
    pub message: String,
}

impl std::fmt::Display for ServiceFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#010x})", self.message, self.code)
    }
}

/// The result of one remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationResponse {
    /// Correlation identifier copied from the request, if it had one.
    pub request_id: Option<CorrelationId>,
    /// Response payload.
    pub body: ResponseBody,
}

/// Response payloads, one per request kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Answer to [`RequestBody::RetrieveEntity`].
    Entity { entity: EntityMetadata },
    /// Answer to [`RequestBody::RetrieveAllEntities`].
    AllEntities { entities: Vec<EntityMetadata> },
    /// Answer to [`RequestBody::RetrieveAttribute`].
    Attribute { attribute: AttributeMetadata },
    /// Answer to [`RequestBody::RetrieveOptionSet`].
    OptionSet { option_set: OptionSetMetadata },
    /// Per-request results of [`RequestBody::ExecuteMultiple`].
    ExecuteMultiple { result: ExecuteMultipleResponse },
    /// Answer to any other named request.
    Custom {
        /// Name of the response message.
        response_name: String,
        /// Output parameters by name.
        results: Map<String, Value>,
    },
}

impl ResponseBody {
    /// Variant name, used when reporting a shape mismatch.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Entity { .. } => "Entity",
            Self::AllEntities { .. } => "AllEntities",
            Self::Attribute { .. } => "Attribute",
            Self::OptionSet { .. } => "OptionSet",
            Self::ExecuteMultiple { .. } => "ExecuteMultiple",
            Self::Custom { .. } => "Custom",
        }
    }
}

impl OrganizationResponse {
    /// Wraps a response body with no correlation identifier.
    pub fn new(body: ResponseBody) -> Self {
        Self {
            request_id: None,
            body,
        }
    }

    /// The entity description, if this is an `Entity` response.
    pub fn into_entity(self) -> Option<EntityMetadata> {
        match self.body {
            ResponseBody::Entity { entity } => Some(entity),
            _ => None,
        }
    }

    /// Every entity description, if this is an `AllEntities` response.
    pub fn into_all_entities(self) -> Option<Vec<EntityMetadata>> {
        match self.body {
            ResponseBody::AllEntities { entities } => Some(entities),
            _ => None,
        }
    }

    /// The attribute description, if this is an `Attribute` response.
    pub fn into_attribute(self) -> Option<AttributeMetadata> {
        match self.body {
            ResponseBody::Attribute { attribute } => Some(attribute),
            _ => None,
        }
    }

    /// The option set, if this is an `OptionSet` response.
    pub fn into_option_set(self) -> Option<OptionSetMetadata> {
        match self.body {
            ResponseBody::OptionSet { option_set } => Some(option_set),
            _ => None,
        }
    }

    /// The per-request results, if this is an `ExecuteMultiple` response.
    pub fn into_execute_multiple(self) -> Option<ExecuteMultipleResponse> {
        match self.body {
            ResponseBody::ExecuteMultiple { result } => Some(result),
            _ => None,
        }
    }
}

/// Aggregate result of an `ExecuteMultiple` request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecuteMultipleResponse {
    /// `true` if at least one request faulted.
    pub is_faulted: bool,
    /// Per-request results. With `return_responses = false` only faulted
    /// requests appear here.
    pub responses: Vec<ExecuteMultipleResponseItem>,
}

/// Result of one request inside an `ExecuteMultiple` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteMultipleResponseItem {
    /// Zero-based position of the request in the submitted sequence.
    pub request_index: usize,
    /// The response, when the request succeeded and responses were requested.
    pub response: Option<OrganizationResponse>,
    /// The fault, when the request failed.
    pub fault: Option<ServiceFault>,
}
