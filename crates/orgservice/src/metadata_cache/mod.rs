//! Self-expiring cache of remote schema metadata.
//!
//! Four independent tables are kept:
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | entities | logical name | [`EntityMetadata`] (possibly partial) |
//! | attributes | `(entity, attribute)` | [`AttributeMetadata`] |
//! | option sets | option set name | global [`OptionSetMetadata`] |
//! | type codes | [`ObjectTypeCode`] | entity logical name |
//!
//! # Expiry
//!
//! There is no per-entry TTL. A single staleness clock records the last full
//! fetch; before every read, if more than the staleness window has passed
//! since then, all four tables are cleared and the clock is reset. The
//! compare-clear-reset sequence runs under one mutex that is never held
//! across a remote call.
//!
//! A *selective* refetch (an entity is cached but lacks a section the caller
//! asked for) merges into the cached entry and deliberately leaves the clock
//! alone, so a burst of narrow lookups cannot hide real staleness.
//!
//! # Concurrency
//!
//! Two callers missing the same key may both fetch it; the last insert wins.
//! A failed fetch leaves the slot empty, so the next call simply tries again.

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use crate::{
    AttributeMetadata, Clock, EntityFilters, EntityMetadata, MetadataCacheEvent,
    MetadataCacheSettings, MetadataObserver, ObjectTypeCode, ObserverRegistry,
    OptionSetMetadata, OrgServiceError, OrganizationRequest, OrganizationResponse, RequestBody,
    RequestExecutor, SubscriptionId, SystemClock, Timestamp,
};

/// `(entity logical name, attribute logical name)`.
type AttributeKey = (String, String);

/// Thread-safe metadata cache backed by a [`RequestExecutor`].
///
/// One instance per client session is the norm. Sessions that must share a
/// cache hold the same `Arc<MetadataCache>`.
pub struct MetadataCache {
    executor: Arc<dyn RequestExecutor>,
    clock: Arc<dyn Clock>,
    staleness_window: Duration,
    entities: DashMap<String, Arc<EntityMetadata>>,
    attributes: DashMap<AttributeKey, Arc<AttributeMetadata>>,
    option_sets: DashMap<String, Arc<OptionSetMetadata>>,
    type_codes: DashMap<ObjectTypeCode, String>,
    last_validated: Mutex<Timestamp>,
    observers: ObserverRegistry,
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("staleness_window", &self.staleness_window)
            .field("entities", &self.entities.len())
            .field("attributes", &self.attributes.len())
            .field("option_sets", &self.option_sets.len())
            .field("type_codes", &self.type_codes.len())
            .field("observers", &self.observers)
            .finish()
    }
}

impl MetadataCache {
    /// Creates an empty cache reading the system clock.
    pub fn new(executor: Arc<dyn RequestExecutor>, settings: MetadataCacheSettings) -> Self {
        Self::with_clock(executor, settings, Arc::new(SystemClock))
    }

    /// Creates an empty cache reading time from `clock`.
    pub fn with_clock(
        executor: Arc<dyn RequestExecutor>,
        settings: MetadataCacheSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        Self {
            executor,
            clock,
            staleness_window: settings.staleness_window(),
            entities: DashMap::new(),
            attributes: DashMap::new(),
            option_sets: DashMap::new(),
            type_codes: DashMap::new(),
            last_validated: Mutex::new(now),
            observers: ObserverRegistry::new(),
        }
    }

    /// Time after the last full fetch at which every table is cleared.
    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    /// Registers `observer` for expiry, clear and invalidation events.
    pub fn subscribe(&self, observer: Arc<dyn MetadataObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    /// Removes a previously registered observer.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Returns the description of `entity` with at least the sections named by
    /// `filters`.
    ///
    /// A miss fetches at `filters` and resets the staleness clock. A cached
    /// entry lacking a requested section triggers a selective refetch whose
    /// result is merged into the entry without touching the clock.
    ///
    /// The type-code table is left alone; it is filled only by a complete
    /// entity listing.
    #[instrument(skip(self), level = "debug")]
    pub async fn entity_metadata(
        &self,
        entity: &str,
        filters: EntityFilters,
    ) -> Option<Arc<EntityMetadata>> {
        self.expire_if_stale();

        let cached = self.entities.get(entity).map(|e| Arc::clone(e.value()));
        if let Some(cached) = cached {
            if cached.satisfies(filters) {
                debug!("entity metadata cache hit");
                return Some(cached);
            }
            debug!("cached entity lacks requested sections; selective refetch");
            let fetched = self.fetch_entity(entity, filters).await?;
            return Some(self.merge_entity(entity, fetched));
        }

        debug!("entity metadata cache miss");
        let fetched = Arc::new(self.fetch_entity(entity, filters).await?);
        self.entities.insert(entity.to_string(), Arc::clone(&fetched));
        self.touch();
        Some(fetched)
    }

    /// Fetches every entity description from the remote service.
    ///
    /// Never served from the cache alone: nothing proves the cached key set is
    /// complete. Each returned entity overwrites its cache entry and its type
    /// code is recorded.
    #[instrument(skip(self), level = "debug")]
    pub async fn all_entity_metadata(
        &self,
        only_published: bool,
        filters: EntityFilters,
    ) -> Option<Vec<Arc<EntityMetadata>>> {
        self.expire_if_stale();

        let entities = self
            .fetch(
                RequestBody::RetrieveAllEntities {
                    filters,
                    retrieve_as_if_published: !only_published,
                },
                "all_entity_metadata",
                OrganizationResponse::into_all_entities,
            )
            .await?;

        let entities: Vec<_> = entities
            .into_iter()
            .map(|entity| {
                self.record_type_code(&entity);
                let entity = Arc::new(entity);
                self.entities
                    .insert(entity.logical_name.clone(), Arc::clone(&entity));
                entity
            })
            .collect();
        self.touch();
        debug!(count = entities.len(), "all entity metadata cached");
        Some(entities)
    }

    /// Returns the description of one attribute.
    #[instrument(skip(self), level = "debug")]
    pub async fn attribute_metadata(
        &self,
        entity: &str,
        attribute: &str,
    ) -> Option<Arc<AttributeMetadata>> {
        self.expire_if_stale();

        let key = (entity.to_string(), attribute.to_string());
        if let Some(cached) = self.attributes.get(&key).map(|a| Arc::clone(a.value())) {
            debug!("attribute metadata cache hit");
            return Some(cached);
        }

        let fetched = Arc::new(
            self.fetch(
                RequestBody::RetrieveAttribute {
                    entity_logical_name: entity.to_string(),
                    logical_name: attribute.to_string(),
                    retrieve_as_if_published: true,
                },
                "attribute_metadata",
                OrganizationResponse::into_attribute,
            )
            .await?,
        );
        self.attributes.insert(key, Arc::clone(&fetched));
        self.touch();
        Some(fetched)
    }

    /// Maps a type code to its entity logical name.
    ///
    /// The first call (or the first after the tables were cleared) loads every
    /// type code with one entity-level "retrieve all" and seeds the entity
    /// table with any entity not already cached. Once populated, the type code
    /// table is served as-is until the whole cache expires.
    #[instrument(skip(self), level = "debug")]
    pub async fn entity_logical_name(&self, type_code: ObjectTypeCode) -> Option<String> {
        self.expire_if_stale();

        if self.type_codes.is_empty() {
            let entities = self
                .fetch(
                    RequestBody::RetrieveAllEntities {
                        filters: EntityFilters::ENTITY,
                        retrieve_as_if_published: true,
                    },
                    "entity_logical_name",
                    OrganizationResponse::into_all_entities,
                )
                .await;
            if let Some(entities) = entities {
                for entity in entities {
                    self.record_type_code(&entity);
                    self.entities
                        .entry(entity.logical_name.clone())
                        .or_insert_with(|| Arc::new(entity));
                }
                self.touch();
            }
        }

        self.type_codes.get(&type_code).map(|name| name.value().clone())
    }

    /// Returns a global option set by name. An empty name yields `None`
    /// without contacting the remote service.
    #[instrument(skip(self), level = "debug")]
    pub async fn global_option_set(&self, name: &str) -> Option<Arc<OptionSetMetadata>> {
        if name.is_empty() {
            return None;
        }
        self.expire_if_stale();

        if let Some(cached) = self.option_sets.get(name).map(|o| Arc::clone(o.value())) {
            debug!("option set cache hit");
            return Some(cached);
        }

        let fetched = Arc::new(
            self.fetch(
                RequestBody::RetrieveOptionSet {
                    name: name.to_string(),
                    retrieve_as_if_published: true,
                },
                "global_option_set",
                OrganizationResponse::into_option_set,
            )
            .await?,
        );
        self.option_sets.insert(name.to_string(), Arc::clone(&fetched));
        self.touch();
        Some(fetched)
    }

    // -----------------------------------------------------------------------
    // Derived lookups
    // -----------------------------------------------------------------------

    /// Every attribute of `entity`, via the entity description.
    ///
    /// Attributes not yet in the attribute table are added to it.
    pub async fn entity_attributes(&self, entity: &str) -> Option<Vec<AttributeMetadata>> {
        let metadata = self
            .entity_metadata(entity, EntityFilters::ATTRIBUTES)
            .await?;
        let attributes = metadata.attributes.clone()?;
        for attribute in &attributes {
            self.attributes
                .entry((entity.to_string(), attribute.logical_name.clone()))
                .or_insert_with(|| Arc::new(attribute.clone()));
        }
        Some(attributes)
    }

    /// Upper-cased names of the attributes a record of `entity` must carry
    /// (application or system required).
    pub async fn required_attribute_names(&self, entity: &str) -> Vec<String> {
        self.entity_attributes(entity)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|attribute| attribute.required_level.is_required())
            .map(|attribute| attribute.logical_name.to_uppercase())
            .collect()
    }

    /// Type code of `entity`, read from its entity-level description.
    pub async fn entity_type_code(&self, entity: &str) -> Option<ObjectTypeCode> {
        self.entity_metadata(entity, EntityFilters::ENTITY)
            .await?
            .object_type_code
    }

    /// Display name of `entity`, read from its entity-level description.
    pub async fn entity_display_name(&self, entity: &str) -> Option<String> {
        self.entity_metadata(entity, EntityFilters::ENTITY)
            .await?
            .display_name
            .clone()
    }

    /// The option set embedded in an attribute description. Entity-local
    /// option sets are only reachable this way.
    pub async fn local_option_set(
        &self,
        entity: &str,
        attribute: &str,
    ) -> Option<OptionSetMetadata> {
        self.attribute_metadata(entity, attribute)
            .await?
            .option_set
            .clone()
    }

    /// Returns the cached description of `entity` without fetching.
    pub fn cached_entity(&self, entity: &str) -> Option<Arc<EntityMetadata>> {
        self.expire_if_stale();
        self.entities.get(entity).map(|e| Arc::clone(e.value()))
    }

    // -----------------------------------------------------------------------
    // Invalidation
    // -----------------------------------------------------------------------

    /// Drops `entity` and every cached attribute of it, then resets the
    /// staleness clock.
    pub fn invalidate_entity(&self, entity: &str) -> Result<(), OrgServiceError> {
        if entity.trim().is_empty() {
            return Err(OrgServiceError::InvalidArgument {
                argument: "entity",
                reason: "entity logical name must not be empty".to_string(),
            });
        }

        self.entities.remove(entity);
        self.attributes.retain(|(owner, _), _| owner != entity);
        self.touch();
        info!(entity, "entity metadata invalidated");
        self.observers.publish(&MetadataCacheEvent::EntityInvalidated {
            entity: entity.to_string(),
        });
        Ok(())
    }

    /// Drops every table and resets the staleness clock.
    pub fn clear(&self) {
        {
            let mut last = self
                .last_validated
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.clear_tables();
            *last = self.clock.now();
        }
        info!("metadata cache cleared");
        self.observers.publish(&MetadataCacheEvent::Cleared);
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn expire_if_stale(&self) {
        let expired = {
            let mut last = self
                .last_validated
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let now = self.clock.now();
            if now.elapsed_since(*last) > self.staleness_window {
                self.clear_tables();
                *last = now;
                true
            } else {
                false
            }
        };

        if expired {
            info!(
                window_secs = self.staleness_window.as_secs(),
                "metadata cache expired; all tables cleared"
            );
            self.observers.publish(&MetadataCacheEvent::Expired);
        }
    }

    fn touch(&self) {
        let now = self.clock.now();
        *self
            .last_validated
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = now;
    }

    fn clear_tables(&self) {
        self.entities.clear();
        self.attributes.clear();
        self.option_sets.clear();
        self.type_codes.clear();
    }

    fn record_type_code(&self, entity: &EntityMetadata) {
        if let Some(code) = entity.object_type_code {
            self.type_codes.insert(code, entity.logical_name.clone());
        }
    }

    fn merge_entity(&self, entity: &str, fetched: EntityMetadata) -> Arc<EntityMetadata> {
        let mut slot = self
            .entities
            .entry(entity.to_string())
            .or_insert_with(|| Arc::new(EntityMetadata::new(entity)));
        Arc::make_mut(&mut *slot).merge_from(fetched);
        Arc::clone(&*slot)
    }

    async fn fetch_entity(&self, entity: &str, filters: EntityFilters) -> Option<EntityMetadata> {
        self.fetch(
            RequestBody::RetrieveEntity {
                logical_name: entity.to_string(),
                filters,
                retrieve_as_if_published: true,
            },
            "entity_metadata",
            OrganizationResponse::into_entity,
        )
        .await
    }

    /// Executes one request and narrows its response. Faults and shape
    /// mismatches are logged and become `None`.
    async fn fetch<T>(
        &self,
        body: RequestBody,
        context: &str,
        narrow: fn(OrganizationResponse) -> Option<T>,
    ) -> Option<T> {
        match self
            .executor
            .execute(OrganizationRequest::new(body), context)
            .await
        {
            Ok(response) => {
                let actual = response.body.kind();
                let narrowed = narrow(response);
                if narrowed.is_none() {
                    warn!(context, actual, "unexpected metadata response shape");
                }
                narrowed
            }
            Err(err) => {
                warn!(context, error = %err, "metadata fetch failed");
                None
            }
        }
    }
}
