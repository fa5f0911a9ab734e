//! Relationship Registry - Build-once property descriptor table
//!
//! Classes are declared through [`RegistryBuilder`]; [`RegistryBuilder::build`]
//! closes the initialization phase, cross-checks aliases and inverse pairs, and
//! yields an immutable [`Registry`] that is shared read-only afterwards.

use std::collections::HashMap;

use crate::error::{IntegrityError, IntegrityResult};
use super::metadata::{ClassDescriptor, PropertyDescriptor, PropertyKind, PropertyOptions};

/// Mutable declaration phase of the descriptor table
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    classes: Vec<ClassDescriptor>,
}

impl RegistryBuilder {
    /// Create a new empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a class with no properties yet
    pub fn class(&mut self, class: &str) -> &mut Self {
        self.entry(class);
        self
    }

    /// Declare one property of a class
    pub fn register(
        &mut self,
        class: &str,
        property: &str,
        options: PropertyOptions,
    ) -> IntegrityResult<&mut Self> {
        let descriptor = options.into_descriptor(class, property)?;
        self.entry(class).add(descriptor)?;
        tracing::debug!(target: "kindred::registry", "declared {}.{}", class, property);
        Ok(self)
    }

    /// Declare a property from a configuration map
    pub fn register_map(
        &mut self,
        class: &str,
        property: &str,
        options: &serde_json::Map<String, serde_json::Value>,
    ) -> IntegrityResult<&mut Self> {
        let options = PropertyOptions::from_map(class, property, options)?;
        self.register(class, property, options)
    }

    /// Finish registration and validate the whole table
    pub fn build(self) -> IntegrityResult<Registry> {
        let registry = Registry {
            classes: self
                .classes
                .into_iter()
                .map(|class| (class.name().to_string(), class))
                .collect(),
        };
        registry.validate_all()?;

        let stats = registry.stats();
        tracing::info!(
            target: "kindred::registry",
            "descriptor table built: {} classes, {} properties ({} relationships, {} secondary keys, {} aliases)",
            stats.total_classes,
            stats.total_properties,
            stats.relationships,
            stats.secondary_keys,
            stats.aliases
        );
        Ok(registry)
    }

    fn entry(&mut self, class: &str) -> &mut ClassDescriptor {
        let index = match self.classes.iter().position(|c| c.name() == class) {
            Some(index) => index,
            None => {
                self.classes.push(ClassDescriptor::new(class));
                self.classes.len() - 1
            }
        };
        &mut self.classes[index]
    }
}

/// Immutable per-class property descriptor table
#[derive(Debug, Clone)]
pub struct Registry {
    classes: HashMap<String, ClassDescriptor>,
}

impl Registry {
    /// Start declaring classes
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Get a class descriptor by name
    pub fn class(&self, class: &str) -> IntegrityResult<&ClassDescriptor> {
        self.classes.get(class).ok_or_else(|| IntegrityError::UnknownClass {
            class: class.to_string(),
        })
    }

    /// Registered class names, sorted
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get the declared descriptor, without alias resolution
    pub fn describe(&self, class: &str, property: &str) -> IntegrityResult<&PropertyDescriptor> {
        self.class(class)?
            .property(property)
            .ok_or_else(|| IntegrityError::unknown_property(class, property))
    }

    /// Follow `alias_of` links to the canonical descriptor
    pub fn resolve_alias(&self, class: &str, property: &str) -> IntegrityResult<&PropertyDescriptor> {
        let mut descriptor = self.describe(class, property)?;
        let mut chain = vec![descriptor.name.clone()];
        while let Some(target) = &descriptor.alias_of {
            if chain.contains(target) {
                chain.push(target.clone());
                return Err(IntegrityError::AliasCycle {
                    class: class.to_string(),
                    chain,
                });
            }
            chain.push(target.clone());
            descriptor = self.describe(class, target)?;
        }
        Ok(descriptor)
    }

    /// Get statistics about the table
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total_classes: self.classes.len(),
            ..RegistryStats::default()
        };
        for property in self.classes.values().flat_map(|c| c.properties()) {
            stats.total_properties += 1;
            if property.is_alias() {
                stats.aliases += 1;
            }
            match property.kind {
                PropertyKind::SecondaryKey => stats.secondary_keys += 1,
                PropertyKind::Dependent => {
                    stats.relationships += 1;
                    stats.dependents += 1;
                    if property.cascade_logical {
                        stats.logical_dependents += 1;
                    }
                }
                PropertyKind::IndependentInverse => stats.relationships += 1,
                PropertyKind::Plain => {}
            }
        }
        stats
    }

    /// Validate aliases and inverse pairs of every registered class
    fn validate_all(&self) -> IntegrityResult<()> {
        for name in self.class_names() {
            let class = self.class(name)?;
            for property in class.properties() {
                if property.is_alias() {
                    self.validate_alias(class, property)?;
                }
                if property.is_relationship() {
                    self.validate_relationship(class, property)?;
                }
            }
        }
        Ok(())
    }

    fn validate_alias(&self, class: &ClassDescriptor, alias: &PropertyDescriptor) -> IntegrityResult<()> {
        let canonical = self.resolve_alias(class.name(), &alias.name)?;
        if alias.alias_of.as_deref() != Some(canonical.name.as_str()) {
            return Err(IntegrityError::invalid_configuration(
                class.name(),
                &alias.name,
                "aliases must point directly at a non-alias property",
            ));
        }
        Ok(())
    }

    fn validate_relationship(&self, class: &ClassDescriptor, property: &PropertyDescriptor) -> IntegrityResult<()> {
        let target_class = property.target_class.as_deref().ok_or_else(|| {
            IntegrityError::invalid_configuration(class.name(), &property.name, "relationship without target class")
        })?;
        let target = self.class(target_class)?;

        let Some(inverse_name) = property.inverse_name.as_deref() else {
            return Ok(());
        };
        let inverse = target
            .property(inverse_name)
            .ok_or_else(|| IntegrityError::unknown_property(target_class, inverse_name))?;

        let points_back = inverse.is_relationship()
            && inverse.target_class.as_deref() == Some(class.name())
            && inverse.inverse_name.as_deref() == Some(property.name.as_str());
        if !points_back {
            return Err(IntegrityError::InverseMismatch {
                class: class.name().to_string(),
                property: property.name.clone(),
                target_class: target_class.to_string(),
                inverse: inverse_name.to_string(),
            });
        }
        Ok(())
    }

    /// Descriptor of the inverse side of a relationship, if declared
    pub fn inverse_of(&self, property: &PropertyDescriptor) -> IntegrityResult<Option<&PropertyDescriptor>> {
        match (&property.target_class, &property.inverse_name) {
            (Some(target), Some(inverse)) => self.describe(target, inverse).map(Some),
            _ => Ok(None),
        }
    }

    /// Classes whose dependents cascade logically into `class`
    pub fn logical_owners_of(&self, class: &str) -> Vec<(&str, &str)> {
        let mut owners: Vec<(&str, &str)> = self
            .classes
            .values()
            .flat_map(|c| {
                c.dependents()
                    .filter(|p| p.cascade_logical && p.target_class.as_deref() == Some(class))
                    .map(move |p| (c.name(), p.name.as_str()))
            })
            .collect();
        owners.sort_unstable();
        owners
    }
}

/// Statistics about the descriptor table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_classes: usize,
    pub total_properties: usize,
    pub relationships: usize,
    pub dependents: usize,
    pub logical_dependents: usize,
    pub secondary_keys: usize,
    pub aliases: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn household_builder() -> RegistryBuilder {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Parent", "name", PropertyOptions::plain())
            .unwrap()
            .register("Parent", "spouse", PropertyOptions::reference("Parent").inverse("spouse"))
            .unwrap()
            .register("Parent", "household", PropertyOptions::reference("Household").inverse("members"))
            .unwrap()
            .register("Household", "members", PropertyOptions::reference("Parent").inverse("household").many())
            .unwrap();
        builder
    }

    #[test]
    fn test_registry_creation() {
        let registry = household_builder().build().unwrap();
        let stats = registry.stats();
        assert_eq!(stats.total_classes, 2);
        assert_eq!(stats.total_properties, 4);
        assert_eq!(stats.relationships, 3);
        assert_eq!(registry.class_names(), vec!["Household", "Parent"]);
    }

    #[test]
    fn test_duplicate_property() {
        let mut builder = household_builder();
        let err = builder
            .register("Parent", "spouse", PropertyOptions::plain())
            .unwrap_err();
        assert!(matches!(err, IntegrityError::DuplicateProperty { .. }));
    }

    #[test]
    fn test_describe_unknown_property() {
        let registry = household_builder().build().unwrap();
        assert!(matches!(
            registry.describe("Parent", "nickname"),
            Err(IntegrityError::UnknownProperty { .. })
        ));
        assert!(matches!(
            registry.describe("Pet", "name"),
            Err(IntegrityError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_registration_order_does_not_matter() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Household", "members", PropertyOptions::reference("Parent").inverse("household").many())
            .unwrap()
            .register("Parent", "household", PropertyOptions::reference("Household").inverse("members"))
            .unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_missing_inverse_property() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Parent", "household", PropertyOptions::reference("Household").inverse("members"))
            .unwrap()
            .class("Household");
        assert!(matches!(builder.build(), Err(IntegrityError::UnknownProperty { .. })));
    }

    #[test]
    fn test_missing_target_class() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Parent", "household", PropertyOptions::reference("Household").inverse("members"))
            .unwrap();
        assert!(matches!(builder.build(), Err(IntegrityError::UnknownClass { .. })));
    }

    #[test]
    fn test_asymmetric_inverse_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Parent", "household", PropertyOptions::reference("Household").inverse("members"))
            .unwrap()
            .register("Parent", "home", PropertyOptions::reference("Household").inverse("members"))
            .unwrap()
            .register("Household", "members", PropertyOptions::reference("Parent").inverse("household").many())
            .unwrap();
        let err = builder.build().unwrap_err();
        assert_eq!(
            err,
            IntegrityError::InverseMismatch {
                class: "Parent".into(),
                property: "home".into(),
                target_class: "Household".into(),
                inverse: "members".into(),
            }
        );
    }

    #[test]
    fn test_inverse_pointing_at_plain_property() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Parent", "household", PropertyOptions::reference("Household").inverse("name"))
            .unwrap()
            .register("Household", "name", PropertyOptions::plain())
            .unwrap();
        assert!(matches!(builder.build(), Err(IntegrityError::InverseMismatch { .. })));
    }

    #[test]
    fn test_resolve_alias() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Address", "postal_code", PropertyOptions::plain())
            .unwrap()
            .register("Address", "zip", PropertyOptions::alias("postal_code"))
            .unwrap();
        let registry = builder.build().unwrap();
        assert_eq!(registry.resolve_alias("Address", "zip").unwrap().name, "postal_code");
        assert_eq!(registry.resolve_alias("Address", "postal_code").unwrap().name, "postal_code");
        assert!(registry.describe("Address", "zip").unwrap().is_alias());
    }

    #[test]
    fn test_alias_cycle() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Address", "zip", PropertyOptions::alias("postcode"))
            .unwrap()
            .register("Address", "postcode", PropertyOptions::alias("zip"))
            .unwrap();
        assert!(matches!(builder.build(), Err(IntegrityError::AliasCycle { .. })));
    }

    #[test]
    fn test_self_alias_is_a_cycle() {
        let mut builder = RegistryBuilder::new();
        builder.register("Address", "zip", PropertyOptions::alias("zip")).unwrap();
        assert!(matches!(builder.build(), Err(IntegrityError::AliasCycle { .. })));
    }

    #[test]
    fn test_alias_chain_rejected() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Address", "postal_code", PropertyOptions::plain())
            .unwrap()
            .register("Address", "postcode", PropertyOptions::alias("postal_code"))
            .unwrap()
            .register("Address", "zip", PropertyOptions::alias("postcode"))
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(IntegrityError::InvalidPropertyConfiguration { .. })
        ));
    }

    #[test]
    fn test_alias_to_unknown_property() {
        let mut builder = RegistryBuilder::new();
        builder.register("Address", "zip", PropertyOptions::alias("postal_code")).unwrap();
        assert!(matches!(builder.build(), Err(IntegrityError::UnknownProperty { .. })));
    }

    #[test]
    fn test_inverse_of() {
        let registry = household_builder().build().unwrap();
        let household = registry.describe("Parent", "household").unwrap();
        let members = registry.inverse_of(household).unwrap().unwrap();
        assert_eq!(members.name, "members");
        assert!(members.is_many());
    }

    #[test]
    fn test_logical_owners_of() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Parent", "children", PropertyOptions::dependent("Person").many().logical(true))
            .unwrap()
            .register("Parent", "pets", PropertyOptions::dependent("Person").many())
            .unwrap()
            .class("Person");
        let registry = builder.build().unwrap();
        assert_eq!(registry.logical_owners_of("Person"), vec![("Parent", "children")]);
    }
}
