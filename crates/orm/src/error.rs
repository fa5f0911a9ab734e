//! Error types for the relationship integrity engine
//!
//! Registration errors describe malformed class metadata and are fatal to
//! startup. Runtime errors reject a single operation and leave the object
//! graph exactly as it was before the call.

use thiserror::Error;

use crate::graph::ObjectId;

/// Result type alias for integrity operations
pub type IntegrityResult<T> = Result<T, IntegrityError>;

/// Error types for descriptor registration and relationship maintenance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// Class has not been registered
    #[error("Unknown class '{class}'")]
    UnknownClass { class: String },

    /// Property is not declared on the class
    #[error("Unknown property '{property}' on class '{class}'")]
    UnknownProperty { class: String, property: String },

    /// Property declared twice for the same class
    #[error("Property '{property}' is already declared on class '{class}'")]
    DuplicateProperty { class: String, property: String },

    /// Alias chain loops back on itself
    #[error("Alias cycle on class '{class}': {}", .chain.join(" -> "))]
    AliasCycle { class: String, chain: Vec<String> },

    /// Option combination that has no defined meaning
    #[error("Invalid configuration for property '{property}' on class '{class}': {reason}")]
    InvalidPropertyConfiguration {
        class: String,
        property: String,
        reason: String,
    },

    /// Secondary key value already held by another live instance
    #[error("Secondary key {class}.{property} = {key} is already held by {holder}")]
    DuplicateSecondaryKey {
        class: String,
        property: String,
        key: String,
        holder: ObjectId,
    },

    /// Inverse declaration does not point back at the property
    #[error("Inverse mismatch: {class}.{property} names '{target_class}.{inverse}' which does not point back")]
    InverseMismatch {
        class: String,
        property: String,
        target_class: String,
        inverse: String,
    },

    /// Logical cascade reached an object already on the traversal path
    #[error("Cascade cycle: {}", .path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
    CascadeCycle { path: Vec<ObjectId> },

    /// Secondary key lookup found no binding
    #[error("No {class} with {property} = {key}")]
    NotFound {
        class: String,
        property: String,
        key: String,
    },

    /// Object is not part of the live graph
    #[error("Unknown object {id}")]
    UnknownObject { id: ObjectId },

    /// Value shape does not fit the property kind
    #[error("Type mismatch for {class}.{property}: expected {expected}")]
    TypeMismatch {
        class: String,
        property: String,
        expected: String,
    },

    /// Relationship target is an instance of the wrong class
    #[error("{class}.{property} expects a {expected}, got a {actual}")]
    TargetClassMismatch {
        class: String,
        property: String,
        expected: String,
        actual: String,
    },

    /// A lock guarding the graph was poisoned by a panicking writer
    #[error("Lock poisoned: {resource}")]
    LockPoisoned { resource: String },
}

impl IntegrityError {
    /// Create an unknown property error
    pub fn unknown_property(class: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            class: class.into(),
            property: property.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(
        class: impl Into<String>,
        property: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidPropertyConfiguration {
            class: class.into(),
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(
        class: impl Into<String>,
        property: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            class: class.into(),
            property: property.into(),
            expected: expected.into(),
        }
    }

    /// Create a lock poisoned error
    pub fn lock_poisoned(resource: impl Into<String>) -> Self {
        Self::LockPoisoned {
            resource: resource.into(),
        }
    }

    /// Errors describing malformed or missing class metadata
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownClass { .. }
                | Self::UnknownProperty { .. }
                | Self::DuplicateProperty { .. }
                | Self::AliasCycle { .. }
                | Self::InvalidPropertyConfiguration { .. }
        )
    }

    /// Errors that reject one operation and leave the graph consistent
    pub fn is_recoverable(&self) -> bool {
        !self.is_registration_error() && !matches!(self, Self::LockPoisoned { .. })
    }
}
