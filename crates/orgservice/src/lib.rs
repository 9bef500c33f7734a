//! Client-side core for a remote organization service.
//!
//! Two components keep round trips to a slow, rate-limited remote API down
//! while staying correct under concurrent callers:
//!
//! - [`BatchManager`] groups individual requests into named, capacity-bounded
//!   batches that are submitted as a single `ExecuteMultiple` call.
//! - [`MetadataCache`] keeps entity, attribute, option-set and type-code
//!   metadata in memory, refetching on miss and expiring everything at once
//!   after a fixed staleness window.
//!
//! Both reach the remote service only through the [`RequestExecutor`] port;
//! this crate contains no transport code.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`BatchId`, `CorrelationId`, etc.) |
//! | [`types`] | Shared value types (`Timestamp`, limits, cache settings) |
//! | [`errors`] | Error and retry-policy types |
//! | [`request`] | Request and response payloads |
//! | [`metadata`] | Schema descriptions and `EntityFilters` |
//! | [`execution`] | The `RequestExecutor` port |
//! | [`clock`] | Time source abstraction |
//! | [`observers`] | Metadata cache event subscribers |
//! | [`batch`] | Batch orchestration |
//! | [`metadata_cache`] | The metadata cache |

pub mod batch;
pub mod clock;
pub mod errors;
pub mod execution;
pub mod identifiers;
pub mod metadata;
pub mod metadata_cache;
pub mod observers;
pub mod request;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use batch::{Batch, BatchItem, BatchManager, BatchStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ExecutionError, OrgServiceError, RetryPolicy};
pub use execution::RequestExecutor;
pub use identifiers::{BatchId, CorrelationId, ObjectTypeCode, SubscriptionId};
pub use metadata::{
    AttributeMetadata, AttributeType, EntityFilters, EntityMetadata, EntityRelationships,
    OptionSetMetadata, OptionValue, RelationshipMetadata, RequiredLevel, SecurityPrivilege,
};
pub use metadata_cache::MetadataCache;
pub use observers::{MetadataCacheEvent, MetadataObserver, ObserverRegistry};
pub use request::{
    ExecuteMultipleResponse, ExecuteMultipleResponseItem, ExecuteMultipleSettings,
    OrganizationRequest, OrganizationResponse, RequestBody, ResponseBody, ServiceFault,
};
pub use types::{BatchLimits, MetadataCacheSettings, Timestamp};
