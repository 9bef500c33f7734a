//! Newtype identifiers.
//!
//! Every concept with an identity gets its own newtype so that, for example,
//! a [`BatchId`] can never be passed where a [`CorrelationId`] is expected even
//! though both wrap a [`Uuid`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for UUID-wrapped newtypes.
// Generates: struct (Copy), new_random(), from_uuid(), as_uuid(), Display.
// ---------------------------------------------------------------------------
macro_rules! uuid_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID (e.g. one echoed back by the remote service).
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying [`Uuid`].
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Identifies one batch held by the [`crate::BatchManager`].
    ///
    /// Assigned once at creation and never reused within the process.
    BatchId
}

uuid_id! {
    /// Correlates a batch item with its eventual remote response.
    ///
    /// Assigned when the item is added to a batch (not when the request is
    /// built) and stamped onto the request payload.
    CorrelationId
}

uuid_id! {
    /// Handle returned when subscribing a metadata observer; used to unsubscribe.
    SubscriptionId
}

// ---------------------------------------------------------------------------
// Identifiers: remote-assigned integers
// ---------------------------------------------------------------------------

/// The integer type code the remote service assigns to each entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectTypeCode(i32);

impl ObjectTypeCode {
    /// Creates a type code from a raw integer.
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ObjectTypeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
