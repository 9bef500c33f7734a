//! Unit tests for the metadata cache.

use std::sync::Mutex;

use super::*;
use crate::test_support::MockExecutor;
use crate::{
    AttributeType, EntityRelationships, ExecutionError, ManualClock, OptionValue,
    RelationshipMetadata, RequiredLevel, ResponseBody, SecurityPrivilege, ServiceFault,
};

// ============================================================
// Fixtures
// ============================================================

fn attribute(entity: &str, name: &str, required: RequiredLevel) -> AttributeMetadata {
    AttributeMetadata::new(entity, name, AttributeType::String, required)
}

fn industry_codes() -> OptionSetMetadata {
    OptionSetMetadata {
        name: "account_industrycode".to_string(),
        is_global: false,
        options: vec![
            OptionValue {
                value: 1,
                label: "Accounting".to_string(),
            },
            OptionValue {
                value: 2,
                label: "Agriculture".to_string(),
            },
        ],
    }
}

fn budget_status() -> OptionSetMetadata {
    OptionSetMetadata {
        name: "budgetstatus".to_string(),
        is_global: true,
        options: vec![OptionValue {
            value: 0,
            label: "No Committed Budget".to_string(),
        }],
    }
}

fn schema() -> Vec<EntityMetadata> {
    let mut industry = attribute("account", "industrycode", RequiredLevel::Recommended);
    industry.attribute_type = AttributeType::Picklist;
    industry.option_set = Some(industry_codes());

    let account = EntityMetadata {
        object_type_code: Some(ObjectTypeCode::new(1)),
        display_name: Some("Account".to_string()),
        primary_id_attribute: Some("accountid".to_string()),
        primary_name_attribute: Some("name".to_string()),
        attributes: Some(vec![
            attribute("account", "name", RequiredLevel::ApplicationRequired),
            attribute("account", "accountid", RequiredLevel::SystemRequired),
            attribute("account", "description", RequiredLevel::None),
            industry,
        ]),
        privileges: Some(vec![SecurityPrivilege {
            name: "prvReadAccount".to_string(),
            privilege_type: "Read".to_string(),
        }]),
        relationships: Some(EntityRelationships {
            one_to_many: vec![RelationshipMetadata {
                schema_name: "contact_customer_accounts".to_string(),
                referenced_entity: "account".to_string(),
                referencing_entity: "contact".to_string(),
            }],
            ..EntityRelationships::default()
        }),
        ..EntityMetadata::new("account")
    };

    let contact = EntityMetadata {
        object_type_code: Some(ObjectTypeCode::new(2)),
        display_name: Some("Contact".to_string()),
        attributes: Some(vec![
            attribute("contact", "lastname", RequiredLevel::ApplicationRequired),
            attribute("contact", "name", RequiredLevel::None),
        ]),
        privileges: Some(Vec::new()),
        relationships: Some(EntityRelationships::default()),
        ..EntityMetadata::new("contact")
    };

    vec![account, contact]
}

/// Strips the sections `filters` did not ask for, as the remote service does.
fn project(entity: &EntityMetadata, filters: EntityFilters) -> EntityMetadata {
    let mut projected = entity.clone();
    if !filters.contains(EntityFilters::ATTRIBUTES) {
        projected.attributes = None;
    }
    if !filters.contains(EntityFilters::PRIVILEGES) {
        projected.privileges = None;
    }
    if !filters.contains(EntityFilters::RELATIONSHIPS) {
        projected.relationships = None;
    }
    projected
}

fn not_found(what: &str) -> ExecutionError {
    ExecutionError::Fault(ServiceFault {
        code: -2_147_217_150,
        message: format!("{what} does not exist"),
    })
}

fn schema_executor() -> Arc<MockExecutor> {
    let entities = schema();
    Arc::new(MockExecutor::new(move |request| {
        let body = match &request.body {
            RequestBody::RetrieveEntity {
                logical_name,
                filters,
                ..
            } => {
                let entity = entities
                    .iter()
                    .find(|e| &e.logical_name == logical_name)
                    .ok_or_else(|| not_found(logical_name))?;
                ResponseBody::Entity {
                    entity: project(entity, *filters),
                }
            }
            RequestBody::RetrieveAllEntities { filters, .. } => ResponseBody::AllEntities {
                entities: entities.iter().map(|e| project(e, *filters)).collect(),
            },
            RequestBody::RetrieveAttribute {
                entity_logical_name,
                logical_name,
                ..
            } => {
                let attribute = entities
                    .iter()
                    .filter(|e| &e.logical_name == entity_logical_name)
                    .flat_map(|e| e.attributes.iter().flatten())
                    .find(|a| &a.logical_name == logical_name)
                    .cloned()
                    .ok_or_else(|| not_found(logical_name))?;
                ResponseBody::Attribute { attribute }
            }
            RequestBody::RetrieveOptionSet { name, .. } if name == "budgetstatus" => {
                ResponseBody::OptionSet {
                    option_set: budget_status(),
                }
            }
            RequestBody::RetrieveOptionSet { name, .. } => return Err(not_found(name)),
            other => panic!("unexpected request {other:?}"),
        };
        Ok(OrganizationResponse::new(body))
    }))
}

struct Harness {
    executor: Arc<MockExecutor>,
    clock: Arc<ManualClock>,
    cache: MetadataCache,
}

fn harness_with(executor: Arc<MockExecutor>) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let cache = MetadataCache::with_clock(
        executor.clone(),
        MetadataCacheSettings::default(),
        clock.clone(),
    );
    Harness {
        executor,
        clock,
        cache,
    }
}

fn harness() -> Harness {
    harness_with(schema_executor())
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<MetadataCacheEvent>>,
}

impl MetadataObserver for RecordingObserver {
    fn on_event(&self, event: &MetadataCacheEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

const HOUR: Duration = Duration::from_secs(60 * 60);
const MINUTE: Duration = Duration::from_secs(60);

// ============================================================
// Section 1: Entity metadata and selective refresh
// ============================================================

#[tokio::test]
async fn test_first_entity_lookup_fetches_once_and_repeat_is_served_from_cache() {
    let h = harness();

    let first = h
        .cache
        .entity_metadata("account", EntityFilters::ATTRIBUTES)
        .await
        .unwrap();
    assert_eq!(h.executor.call_count(), 1);
    assert_eq!(first.attributes.as_ref().map(Vec::len), Some(4));

    h.cache
        .entity_metadata("account", EntityFilters::ATTRIBUTES)
        .await
        .unwrap();
    h.cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .unwrap();
    assert_eq!(h.executor.call_count(), 1);
}

#[tokio::test]
async fn test_missing_section_triggers_one_selective_refetch_and_merges() {
    let h = harness();
    h.cache
        .entity_metadata("account", EntityFilters::ATTRIBUTES)
        .await
        .unwrap();

    let merged = h
        .cache
        .entity_metadata("account", EntityFilters::RELATIONSHIPS)
        .await
        .unwrap();

    assert_eq!(h.executor.call_count(), 2);
    assert!(merged.attributes.is_some());
    assert!(merged.relationships.is_some());
    match &h.executor.requests()[1].body {
        RequestBody::RetrieveEntity { filters, .. } => {
            assert_eq!(*filters, EntityFilters::RELATIONSHIPS);
        }
        other => panic!("unexpected request {other:?}"),
    }

    let cached = h.cache.cached_entity("account").unwrap();
    assert!(cached.satisfies(EntityFilters::ATTRIBUTES | EntityFilters::RELATIONSHIPS));
    h.cache
        .entity_metadata(
            "account",
            EntityFilters::ATTRIBUTES | EntityFilters::RELATIONSHIPS,
        )
        .await
        .unwrap();
    assert_eq!(h.executor.call_count(), 2);
}

#[tokio::test]
async fn test_selective_refetch_does_not_reset_staleness_clock() {
    let h = harness();
    h.cache
        .entity_metadata("account", EntityFilters::ATTRIBUTES)
        .await
        .unwrap();

    h.clock.advance(40 * MINUTE);
    h.cache
        .entity_metadata("account", EntityFilters::PRIVILEGES)
        .await
        .unwrap();
    assert_eq!(h.executor.call_count(), 2);

    // 70 minutes after the last full fetch, 30 after the selective one.
    h.clock.advance(30 * MINUTE);
    assert!(h.cache.cached_entity("account").is_none());
    h.cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .unwrap();
    assert_eq!(h.executor.call_count(), 3);
}

#[tokio::test]
async fn test_failed_fetch_leaves_slot_empty_and_is_retried_next_call() {
    let h = harness_with(Arc::new(MockExecutor::failing()));

    assert!(h
        .cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .is_none());
    assert!(h.cache.cached_entity("account").is_none());

    assert!(h
        .cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .is_none());
    assert_eq!(h.executor.call_count(), 2);
}

#[tokio::test]
async fn test_unknown_entity_is_absent() {
    let h = harness();
    assert!(h
        .cache
        .entity_metadata("nosuchentity", EntityFilters::ALL)
        .await
        .is_none());
}

#[tokio::test]
async fn test_mismatched_response_shape_is_treated_as_no_result() {
    let executor = Arc::new(MockExecutor::new(|_| {
        Ok(OrganizationResponse::new(ResponseBody::OptionSet {
            option_set: budget_status(),
        }))
    }));
    let h = harness_with(executor);

    assert!(h
        .cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .is_none());
    assert!(h.cache.cached_entity("account").is_none());
}

// ============================================================
// Section 2: Retrieve-all and type codes
// ============================================================

#[tokio::test]
async fn test_all_entity_metadata_always_fetches_and_populates_tables() {
    let h = harness();

    let all = h
        .cache
        .all_entity_metadata(true, EntityFilters::ENTITY)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    h.cache
        .all_entity_metadata(false, EntityFilters::ENTITY)
        .await
        .unwrap();
    assert_eq!(h.executor.call_count(), 2);

    let published: Vec<_> = h
        .executor
        .requests()
        .iter()
        .map(|r| match &r.body {
            RequestBody::RetrieveAllEntities {
                retrieve_as_if_published,
                ..
            } => *retrieve_as_if_published,
            other => panic!("unexpected request {other:?}"),
        })
        .collect();
    assert_eq!(published, vec![false, true]);

    h.cache
        .entity_metadata("contact", EntityFilters::ENTITY)
        .await
        .unwrap();
    assert_eq!(
        h.cache.entity_logical_name(ObjectTypeCode::new(2)).await,
        Some("contact".to_string())
    );
    assert_eq!(h.executor.call_count(), 2);
}

#[tokio::test]
async fn test_entity_logical_name_loads_type_codes_once() {
    let h = harness();

    assert_eq!(
        h.cache.entity_logical_name(ObjectTypeCode::new(1)).await,
        Some("account".to_string())
    );
    assert_eq!(h.executor.call_count(), 1);
    match &h.executor.requests()[0].body {
        RequestBody::RetrieveAllEntities { filters, .. } => {
            assert_eq!(*filters, EntityFilters::ENTITY);
        }
        other => panic!("unexpected request {other:?}"),
    }

    assert_eq!(
        h.cache.entity_logical_name(ObjectTypeCode::new(2)).await,
        Some("contact".to_string())
    );
    assert_eq!(
        h.cache.entity_logical_name(ObjectTypeCode::new(9_999)).await,
        None
    );
    assert_eq!(h.executor.call_count(), 1);
}

#[tokio::test]
async fn test_entity_lookup_does_not_suppress_type_code_load() {
    let h = harness();
    h.cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .unwrap();
    assert!(h.cache.type_codes.is_empty());

    assert_eq!(
        h.cache.entity_logical_name(ObjectTypeCode::new(2)).await,
        Some("contact".to_string())
    );
    assert_eq!(h.executor.call_count(), 2);
    assert!(matches!(
        h.executor.requests()[1].body,
        RequestBody::RetrieveAllEntities { .. }
    ));
    assert_eq!(h.cache.type_codes.len(), 2);
    assert_eq!(
        h.cache.entity_logical_name(ObjectTypeCode::new(1)).await,
        Some("account".to_string())
    );
    assert_eq!(h.executor.call_count(), 2);
}

#[tokio::test]
async fn test_type_code_load_does_not_overwrite_richer_cached_entities() {
    let h = harness();
    h.cache
        .entity_metadata("account", EntityFilters::ALL)
        .await
        .unwrap();
    h.cache.entity_logical_name(ObjectTypeCode::new(2)).await;

    let account = h.cache.cached_entity("account").unwrap();
    assert!(account.satisfies(EntityFilters::ALL));
    assert!(h.cache.cached_entity("contact").is_some());
}

// ============================================================
// Section 3: Attributes and option sets
// ============================================================

#[tokio::test]
async fn test_attribute_lookup_is_keyed_by_entity_and_attribute() {
    let h = harness();

    let account_name = h.cache.attribute_metadata("account", "name").await.unwrap();
    let contact_name = h.cache.attribute_metadata("contact", "name").await.unwrap();
    assert_eq!(account_name.entity_logical_name, "account");
    assert_eq!(contact_name.entity_logical_name, "contact");
    assert_eq!(h.executor.call_count(), 2);

    h.cache.attribute_metadata("account", "name").await.unwrap();
    assert_eq!(h.executor.call_count(), 2);
}

#[tokio::test]
async fn test_required_attribute_names_are_upper_cased_and_seed_attribute_table() {
    let h = harness();

    let required = h.cache.required_attribute_names("account").await;

    assert_eq!(required, vec!["NAME".to_string(), "ACCOUNTID".to_string()]);
    assert_eq!(h.executor.call_count(), 1);
    h.cache
        .attribute_metadata("account", "description")
        .await
        .unwrap();
    assert_eq!(h.executor.call_count(), 1);
}

#[tokio::test]
async fn test_required_attribute_names_of_unknown_entity_is_empty() {
    let h = harness();
    assert!(h.cache.required_attribute_names("nosuchentity").await.is_empty());
}

#[tokio::test]
async fn test_local_option_set_comes_from_attribute_description() {
    let h = harness();

    let options = h
        .cache
        .local_option_set("account", "industrycode")
        .await
        .unwrap();

    assert_eq!(options.label_for(2), Some("Agriculture"));
    assert!(h.cache.local_option_set("account", "name").await.is_none());
}

#[tokio::test]
async fn test_empty_option_set_name_returns_none_without_remote_call() {
    let h = harness();
    assert!(h.cache.global_option_set("").await.is_none());
    assert_eq!(h.executor.call_count(), 0);
}

#[tokio::test]
async fn test_global_option_set_is_cached_but_misses_are_not() {
    let h = harness();

    let status = h.cache.global_option_set("budgetstatus").await.unwrap();
    assert!(status.is_global);
    h.cache.global_option_set("budgetstatus").await.unwrap();
    assert_eq!(h.executor.call_count(), 1);

    assert!(h.cache.global_option_set("missing").await.is_none());
    assert!(h.cache.global_option_set("missing").await.is_none());
    assert_eq!(h.executor.call_count(), 3);
}

#[tokio::test]
async fn test_entity_type_code_and_display_name() {
    let h = harness();
    assert_eq!(
        h.cache.entity_type_code("contact").await,
        Some(ObjectTypeCode::new(2))
    );
    assert_eq!(
        h.cache.entity_display_name("contact").await.as_deref(),
        Some("Contact")
    );
    assert_eq!(h.executor.call_count(), 1);
}

// ============================================================
// Section 4: Expiry and invalidation
// ============================================================

#[tokio::test]
async fn test_expiry_clears_all_four_tables() {
    let h = harness();
    let observer = Arc::new(RecordingObserver::default());
    h.cache.subscribe(observer.clone());

    h.cache.entity_logical_name(ObjectTypeCode::new(2)).await.unwrap();
    h.cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .unwrap();
    h.cache.attribute_metadata("contact", "lastname").await.unwrap();
    h.cache.global_option_set("budgetstatus").await.unwrap();
    let before = h.executor.call_count();
    assert_eq!(before, 3);

    h.clock.advance(HOUR + Duration::from_secs(1));

    h.cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .unwrap();
    h.cache.attribute_metadata("contact", "lastname").await.unwrap();
    h.cache.global_option_set("budgetstatus").await.unwrap();
    assert_eq!(h.executor.call_count(), before + 3);

    assert!(h.cache.type_codes.is_empty());

    assert_eq!(
        *observer.events.lock().unwrap(),
        vec![MetadataCacheEvent::Expired]
    );
}

#[tokio::test]
async fn test_cache_is_not_expired_at_exactly_the_window() {
    let h = harness();
    h.cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .unwrap();

    h.clock.advance(HOUR);
    h.cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .unwrap();
    assert_eq!(h.executor.call_count(), 1);

    h.clock.advance(Duration::from_secs(1));
    h.cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .unwrap();
    assert_eq!(h.executor.call_count(), 2);
}

#[tokio::test]
async fn test_full_fetch_elsewhere_keeps_whole_cache_fresh() {
    let h = harness();
    h.cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .unwrap();

    h.clock.advance(50 * MINUTE);
    h.cache.global_option_set("budgetstatus").await.unwrap();
    h.clock.advance(50 * MINUTE);

    assert!(h.cache.cached_entity("account").is_some());
    assert_eq!(h.executor.call_count(), 2);
}

#[tokio::test]
async fn test_invalidate_entity_drops_entity_and_its_attributes_only() {
    let h = harness();
    let observer = Arc::new(RecordingObserver::default());
    h.cache.subscribe(observer.clone());
    h.cache.entity_attributes("account").await.unwrap();
    h.cache.entity_attributes("contact").await.unwrap();
    let before = h.executor.call_count();

    h.cache.invalidate_entity("account").unwrap();

    assert!(h.cache.cached_entity("account").is_none());
    assert!(h.cache.cached_entity("contact").is_some());
    h.cache.attribute_metadata("contact", "lastname").await.unwrap();
    assert_eq!(h.executor.call_count(), before);
    h.cache.attribute_metadata("account", "name").await.unwrap();
    assert_eq!(h.executor.call_count(), before + 1);
    assert_eq!(
        *observer.events.lock().unwrap(),
        vec![MetadataCacheEvent::EntityInvalidated {
            entity: "account".to_string()
        }]
    );
}

#[test]
fn test_invalidate_entity_rejects_empty_name() {
    let h = harness();
    let err = h.cache.invalidate_entity("  ").unwrap_err();
    assert!(matches!(
        err,
        OrgServiceError::InvalidArgument {
            argument: "entity",
            ..
        }
    ));
}

#[tokio::test]
async fn test_clear_drops_everything_and_notifies() {
    let h = harness();
    let observer = Arc::new(RecordingObserver::default());
    let id = h.cache.subscribe(observer.clone());
    h.cache
        .entity_metadata("account", EntityFilters::ENTITY)
        .await
        .unwrap();

    h.cache.clear();
    assert!(h.cache.unsubscribe(id));
    h.cache.clear();

    assert!(h.cache.cached_entity("account").is_none());
    assert_eq!(
        *observer.events.lock().unwrap(),
        vec![MetadataCacheEvent::Cleared]
    );
}

// ============================================================
// Section 5: Concurrency
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_all_succeed() {
    let executor = schema_executor();
    let cache = Arc::new(MetadataCache::new(
        executor.clone(),
        MetadataCacheSettings::default(),
    ));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let entity = if i % 2 == 0 { "account" } else { "contact" };
                let filters = if i % 3 == 0 {
                    EntityFilters::ATTRIBUTES
                } else {
                    EntityFilters::RELATIONSHIPS
                };
                cache.entity_metadata(entity, filters).await.is_some()
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap());
    }
    // Duplicate fetches are tolerated, but every request was answered.
    assert!(executor.call_count() >= 2);
    assert!(executor.call_count() <= 32);
    for entity in ["account", "contact"] {
        let cached = cache.cached_entity(entity).unwrap();
        assert!(cached.satisfies(EntityFilters::ENTITY));
    }
}
