//! Relationship Metadata System - Property descriptors and registration options

use serde::{Deserialize, Serialize};

use crate::error::{IntegrityError, IntegrityResult};

/// Defines what kind of relationship a property represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Ordinary attribute value
    Plain,
    /// Alternate identity attribute, unique per class
    SecondaryKey,
    /// Relationship owned by the declaring object
    Dependent,
    /// Relationship not owned by the declaring object, paired with a named inverse
    IndependentInverse,
}

impl PropertyKind {
    /// Returns true if this kind links objects rather than holding a value
    pub fn is_relationship(self) -> bool {
        matches!(self, Self::Dependent | Self::IndependentInverse)
    }
}

/// Number of related objects a relationship property holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

/// Options accepted by the declarative registration call
///
/// The serde form is the configuration map, e.g.
/// `{"dependent": true, "logical": true, "inverse": "parent", "class": "Person", "many": true}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PropertyOptions {
    /// Read/write synonym for another property
    pub alias: Option<String>,
    pub secondary_key: bool,
    pub dependent: bool,
    /// Owner save must explicitly cascade to the dependent
    pub logical: bool,
    /// Property on the target class that points back
    pub inverse: Option<String>,
    /// Target class of a relationship
    pub class: Option<String>,
    /// Relationship holds a collection
    pub many: bool,
}

impl PropertyOptions {
    /// Options for a plain attribute
    pub fn plain() -> Self {
        Self::default()
    }

    /// Options for an alias of `canonical`
    pub fn alias(canonical: impl Into<String>) -> Self {
        Self {
            alias: Some(canonical.into()),
            ..Self::default()
        }
    }

    /// Options for a secondary key attribute
    pub fn secondary_key() -> Self {
        Self {
            secondary_key: true,
            ..Self::default()
        }
    }

    /// Options for a relationship owned by the declaring class
    pub fn dependent(target_class: impl Into<String>) -> Self {
        Self {
            dependent: true,
            class: Some(target_class.into()),
            ..Self::default()
        }
    }

    /// Options for an independent relationship; pair with [`Self::inverse`]
    pub fn reference(target_class: impl Into<String>) -> Self {
        Self {
            class: Some(target_class.into()),
            ..Self::default()
        }
    }

    /// Set the inverse property name on the target class
    pub fn inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    /// Make the relationship collection-valued
    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }

    /// Set whether an owner save explicitly cascades to the dependent
    pub fn logical(mut self, logical: bool) -> Self {
        self.logical = logical;
        self
    }

    /// Parse a configuration map, rejecting unrecognized keys
    pub fn from_map(
        class: &str,
        property: &str,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> IntegrityResult<Self> {
        serde_json::from_value(serde_json::Value::Object(map.clone()))
            .map_err(|e| IntegrityError::invalid_configuration(class, property, e.to_string()))
    }

    /// Check the option combination and derive the descriptor
    pub fn into_descriptor(self, class: &str, property: &str) -> IntegrityResult<PropertyDescriptor> {
        let invalid = |reason: &str| IntegrityError::invalid_configuration(class, property, reason);

        if let Some(alias) = self.alias {
            if self.secondary_key
                || self.dependent
                || self.logical
                || self.many
                || self.inverse.is_some()
                || self.class.is_some()
            {
                return Err(invalid("alias cannot be combined with other options"));
            }
            return Ok(PropertyDescriptor {
                name: property.to_string(),
                alias_of: Some(alias),
                kind: PropertyKind::Plain,
                cascade_logical: false,
                inverse_name: None,
                cardinality: Cardinality::One,
                target_class: None,
            });
        }

        if self.secondary_key
            && (self.dependent || self.logical || self.many || self.inverse.is_some() || self.class.is_some())
        {
            return Err(invalid("secondary_key cannot be combined with relationship options"));
        }
        if self.logical && !self.dependent {
            return Err(invalid("logical only applies to dependent properties"));
        }
        if (self.dependent || self.inverse.is_some()) && self.class.is_none() {
            return Err(invalid("relationships must name their target class"));
        }
        if (self.class.is_some() || self.many) && !(self.dependent || self.inverse.is_some()) {
            return Err(invalid("class and many require dependent or inverse"));
        }
        if self.inverse.as_deref() == Some("") {
            return Err(invalid("inverse name cannot be empty"));
        }

        let kind = if self.secondary_key {
            PropertyKind::SecondaryKey
        } else if self.dependent {
            PropertyKind::Dependent
        } else if self.inverse.is_some() {
            PropertyKind::IndependentInverse
        } else {
            PropertyKind::Plain
        };

        Ok(PropertyDescriptor {
            name: property.to_string(),
            alias_of: None,
            kind,
            cascade_logical: self.logical,
            inverse_name: self.inverse,
            cardinality: if self.many { Cardinality::Many } else { Cardinality::One },
            target_class: self.class,
        })
    }
}

/// Declared metadata for one property of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub alias_of: Option<String>,
    pub kind: PropertyKind,
    pub cascade_logical: bool,
    pub inverse_name: Option<String>,
    pub cardinality: Cardinality,
    pub target_class: Option<String>,
}

impl PropertyDescriptor {
    pub fn is_alias(&self) -> bool {
        self.alias_of.is_some()
    }

    pub fn is_relationship(&self) -> bool {
        self.kind.is_relationship()
    }

    /// The inverse is this same property (e.g. spouse)
    pub fn is_self_inverse(&self) -> bool {
        self.inverse_name.as_deref() == Some(self.name.as_str())
    }

    /// Owner saves must explicitly include the dependents
    pub fn cascades_logically(&self) -> bool {
        self.kind == PropertyKind::Dependent && self.cascade_logical
    }

    pub fn is_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }
}

/// Declared metadata for one class, properties in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    name: String,
    properties: Vec<PropertyDescriptor>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a property; fails if the name is taken
    pub fn add(&mut self, descriptor: PropertyDescriptor) -> IntegrityResult<()> {
        if self.property(&descriptor.name).is_some() {
            return Err(IntegrityError::DuplicateProperty {
                class: self.name.clone(),
                property: descriptor.name,
            });
        }
        self.properties.push(descriptor);
        Ok(())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn secondary_keys(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.kind == PropertyKind::SecondaryKey)
    }

    pub fn dependents(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.kind == PropertyKind::Dependent)
    }

    pub fn relationships(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.is_relationship())
    }
}
