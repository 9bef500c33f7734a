//! Schema descriptions returned by the remote service.
//!
//! An [`EntityMetadata`] may be partially populated: its attribute, privilege
//! and relationship sections are each optional and are filled in only when a
//! fetch asked for them through [`EntityFilters`].

use serde::{Deserialize, Serialize};

use crate::ObjectTypeCode;

// ---------------------------------------------------------------------------
// Entity filters
// ---------------------------------------------------------------------------

/// Which sections of an entity description a fetch should return.
///
/// A small bit set; combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityFilters(u8);

impl EntityFilters {
    /// Entity-level fields only.
    pub const ENTITY: Self = Self(0b0001);
    /// Entity fields plus attribute descriptions.
    pub const ATTRIBUTES: Self = Self(0b0010);
    /// Entity fields plus security privileges.
    pub const PRIVILEGES: Self = Self(0b0100);
    /// Entity fields plus relationship descriptions.
    pub const RELATIONSHIPS: Self = Self(0b1000);
    /// Every section.
    pub const ALL: Self = Self(0b1111);

    /// Returns `true` if every flag in `other` is also set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the raw bits.
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl Default for EntityFilters {
    fn default() -> Self {
        Self::ENTITY
    }
}

impl std::ops::BitOr for EntityFilters {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EntityFilters {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Description of one entity (table) in the remote schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Logical (schema-level, lowercase) name, e.g. `"account"`.
    pub logical_name: String,
    /// Integer type code assigned by the remote service.
    pub object_type_code: Option<ObjectTypeCode>,
    /// User-facing display name.
    pub display_name: Option<String>,
    /// Logical name of the primary key attribute.
    pub primary_id_attribute: Option<String>,
    /// Logical name of the primary name attribute.
    pub primary_name_attribute: Option<String>,
    /// `true` for customer-defined entities.
    pub is_custom_entity: bool,
    /// Present only when fetched with [`EntityFilters::ATTRIBUTES`].
    pub attributes: Option<Vec<AttributeMetadata>>,
    /// Present only when fetched with [`EntityFilters::PRIVILEGES`].
    pub privileges: Option<Vec<SecurityPrivilege>>,
    /// Present only when fetched with [`EntityFilters::RELATIONSHIPS`].
    pub relationships: Option<EntityRelationships>,
}

impl EntityMetadata {
    /// Creates an entity description carrying only its logical name.
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            ..Self::default()
        }
    }

    /// Returns `true` if every section implied by `filters` is populated.
    ///
    /// Entity-level fields are always present, so [`EntityFilters::ENTITY`]
    /// is satisfied by any description.
    pub fn satisfies(&self, filters: EntityFilters) -> bool {
        (!filters.contains(EntityFilters::ATTRIBUTES) || self.attributes.is_some())
            && (!filters.contains(EntityFilters::PRIVILEGES) || self.privileges.is_some())
            && (!filters.contains(EntityFilters::RELATIONSHIPS) || self.relationships.is_some())
    }

    /// Overlays a newer fetch of the same entity onto `self`.
    ///
    /// Entity-level fields are taken from `newer`; each optional section is
    /// replaced only when `newer` carries it, so sections fetched earlier are
    /// kept.
    pub fn merge_from(&mut self, newer: EntityMetadata) {
        self.object_type_code = newer.object_type_code.or(self.object_type_code);
        self.display_name = newer.display_name.or(self.display_name.take());
        self.primary_id_attribute = newer
            .primary_id_attribute
            .or(self.primary_id_attribute.take());
        self.primary_name_attribute = newer
            .primary_name_attribute
            .or(self.primary_name_attribute.take());
        self.is_custom_entity = newer.is_custom_entity;
        if newer.attributes.is_some() {
            self.attributes = newer.attributes;
        }
        if newer.privileges.is_some() {
            self.privileges = newer.privileges;
        }
        if newer.relationships.is_some() {
            self.relationships = newer.relationships;
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute
// ---------------------------------------------------------------------------

/// Value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// Two-option yes/no value.
    Boolean,
    /// Lookup to either an account or a contact.
    Customer,
    /// Date, optionally with time.
    DateTime,
    /// Fixed-precision decimal.
    Decimal,
    /// Floating-point number.
    Double,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Reference to a record of another entity.
    Lookup,
    /// Multi-line text.
    Memo,
    /// Currency amount.
    Money,
    /// Reference to the owning user or team.
    Owner,
    /// Choice from an option set.
    Picklist,
    /// Record state (active/inactive).
    State,
    /// Status reason tied to the record state.
    Status,
    /// Single-line text.
    String,
    /// GUID, typically the primary key.
    UniqueIdentifier,
    /// Computed value not stored in the database.
    Virtual,
    /// Any type not listed above.
    Other,
}

/// How strongly the remote service requires a value for an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredLevel {
    /// No requirement.
    #[default]
    None,
    /// Recommended but not enforced.
    Recommended,
    /// Enforced by the application layer.
    ApplicationRequired,
    /// Enforced by the platform.
    SystemRequired,
}

impl RequiredLevel {
    /// Returns `true` for the two levels that make a value mandatory on create.
    pub fn is_required(self) -> bool {
        matches!(self, Self::ApplicationRequired | Self::SystemRequired)
    }
}

/// Description of one attribute (column) of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    /// Logical name of the owning entity.
    pub entity_logical_name: String,
    /// Logical name of the attribute, e.g. `"name"`.
    pub logical_name: String,
    /// User-facing display name.
    pub display_name: Option<String>,
    /// Value type.
    pub attribute_type: AttributeType,
    /// Requirement level.
    pub required_level: RequiredLevel,
    /// `true` for customer-defined attributes.
    pub is_custom_attribute: bool,
    /// The option set for picklist-like attributes. Entity-local option sets
    /// travel here and are not cached separately.
    pub option_set: Option<OptionSetMetadata>,
}

impl AttributeMetadata {
    /// Creates an attribute description with no display name and no options.
    pub fn new(
        entity_logical_name: impl Into<String>,
        logical_name: impl Into<String>,
        attribute_type: AttributeType,
        required_level: RequiredLevel,
    ) -> Self {
        Self {
            entity_logical_name: entity_logical_name.into(),
            logical_name: logical_name.into(),
            display_name: None,
            attribute_type,
            required_level,
            is_custom_attribute: false,
            option_set: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Option sets
// ---------------------------------------------------------------------------

/// One selectable value of an option set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValue {
    /// Stored integer value.
    pub value: i32,
    /// User-facing label.
    pub label: String,
}

/// Description of an option set (picklist values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSetMetadata {
    /// Option set name.
    pub name: String,
    /// `true` for global option sets shared between entities.
    pub is_global: bool,
    /// Options in display order.
    pub options: Vec<OptionValue>,
}

impl OptionSetMetadata {
    /// Returns the label stored for `value`, if any.
    pub fn label_for(&self, value: i32) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label.as_str())
    }
}

// ---------------------------------------------------------------------------
// Privileges and relationships
// ---------------------------------------------------------------------------

/// A security privilege defined on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPrivilege {
    /// Privilege name, e.g. `"prvReadAccount"`.
    pub name: String,
    /// Privilege kind, e.g. `"Read"`.
    pub privilege_type: String,
}

/// A relationship between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    /// Relationship schema name.
    pub schema_name: String,
    /// Entity on the "one" side (or first entity of a many-to-many).
    pub referenced_entity: String,
    /// Entity on the "many" side (or second entity of a many-to-many).
    pub referencing_entity: String,
}

/// All relationships an entity takes part in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityRelationships {
    /// Relationships where this entity is the referenced (one) side.
    pub one_to_many: Vec<RelationshipMetadata>,
    /// Relationships where this entity holds the lookup.
    pub many_to_one: Vec<RelationshipMetadata>,
    /// Intersect relationships.
    pub many_to_many: Vec<RelationshipMetadata>,
}
