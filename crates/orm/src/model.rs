//! Entity Model - Typed domain classes on top of the integrity facade
//!
//! An entity is a thin handle: an [`ObjectId`] plus the facade it lives in.
//! Implementors declare their properties once and get typed accessors that
//! route every read and write through [`RelationshipIntegrity`].

use serde_json::Value;

use crate::error::{IntegrityError, IntegrityResult};
use crate::graph::{ObjectId, ObjectSnapshot, PropertyValue};
use crate::integrity::RelationshipIntegrity;
use crate::relationships::{EdgeChange, RegistryBuilder, SavePlan};

/// Trait for domain classes whose properties are governed by the registry
pub trait Entity: Sized + Send + Sync {
    /// Class name the properties are registered under
    const CLASS: &'static str;

    /// Register this class's properties
    fn declare(builder: &mut RegistryBuilder) -> IntegrityResult<()>;

    /// Wrap an existing instance
    fn from_parts(id: ObjectId, integrity: RelationshipIntegrity) -> Self;

    fn id(&self) -> ObjectId;

    fn integrity(&self) -> &RelationshipIntegrity;

    /// Create a fresh instance in the facade
    fn create(integrity: &RelationshipIntegrity) -> IntegrityResult<Self> {
        let id = integrity.create(Self::CLASS)?;
        Ok(Self::from_parts(id, integrity.clone()))
    }

    /// Wrap an instance after checking it belongs to this class
    fn load(integrity: &RelationshipIntegrity, id: ObjectId) -> IntegrityResult<Self> {
        let class = integrity.class_of(id)?;
        if class != Self::CLASS {
            return Err(IntegrityError::TargetClassMismatch {
                class: Self::CLASS.to_string(),
                property: "id".to_string(),
                expected: Self::CLASS.to_string(),
                actual: class,
            });
        }
        Ok(Self::from_parts(id, integrity.clone()))
    }

    fn get_relationship(&self, property: &str) -> IntegrityResult<PropertyValue> {
        self.integrity().get_relationship(self.id(), property)
    }

    fn set_relationship<V: Into<PropertyValue>>(&self, property: &str, value: V) -> IntegrityResult<Vec<EdgeChange>> {
        self.integrity().set_relationship(self.id(), property, value)
    }

    /// Attribute value of a plain or secondary key property
    fn value(&self, property: &str) -> IntegrityResult<Option<Value>> {
        Ok(self.get_relationship(property)?.as_value().cloned())
    }

    fn link<T: Entity>(&self, property: &str, target: &T) -> IntegrityResult<Vec<EdgeChange>> {
        self.integrity().link(self.id(), property, target.id())
    }

    fn unlink<T: Entity>(&self, property: &str, target: &T) -> IntegrityResult<Vec<EdgeChange>> {
        self.integrity().unlink(self.id(), property, target.id())
    }

    /// Related objects of a relationship property as typed handles
    fn related<T: Entity>(&self, property: &str) -> IntegrityResult<Vec<T>> {
        self.get_relationship(property)?
            .objects()
            .into_iter()
            .map(|id| T::load(self.integrity(), id))
            .collect()
    }

    fn prepare_save(&self) -> IntegrityResult<SavePlan> {
        self.integrity().prepare_save(self.id())
    }

    fn snapshot(&self) -> IntegrityResult<ObjectSnapshot> {
        self.integrity().snapshot(self.id())
    }

    /// Remove this instance from the graph
    fn discard(self) -> IntegrityResult<Vec<EdgeChange>> {
        self.integrity().discard(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::PropertyOptions;
    use serde_json::json;

    struct Owner {
        id: ObjectId,
        integrity: RelationshipIntegrity,
    }

    struct Pet {
        id: ObjectId,
        integrity: RelationshipIntegrity,
    }

    impl Entity for Owner {
        const CLASS: &'static str = "Owner";

        fn declare(builder: &mut RegistryBuilder) -> IntegrityResult<()> {
            builder
                .register(Self::CLASS, "name", PropertyOptions::plain())?
                .register(Self::CLASS, "pets", PropertyOptions::reference("Pet").many().inverse("owner"))?;
            Ok(())
        }

        fn from_parts(id: ObjectId, integrity: RelationshipIntegrity) -> Self {
            Self { id, integrity }
        }

        fn id(&self) -> ObjectId {
            self.id
        }

        fn integrity(&self) -> &RelationshipIntegrity {
            &self.integrity
        }
    }

    impl Entity for Pet {
        const CLASS: &'static str = "Pet";

        fn declare(builder: &mut RegistryBuilder) -> IntegrityResult<()> {
            builder.register(Self::CLASS, "owner", PropertyOptions::reference("Owner").inverse("pets"))?;
            Ok(())
        }

        fn from_parts(id: ObjectId, integrity: RelationshipIntegrity) -> Self {
            Self { id, integrity }
        }

        fn id(&self) -> ObjectId {
            self.id
        }

        fn integrity(&self) -> &RelationshipIntegrity {
            &self.integrity
        }
    }

    fn integrity() -> RelationshipIntegrity {
        let mut builder = RegistryBuilder::new();
        Owner::declare(&mut builder).unwrap();
        Pet::declare(&mut builder).unwrap();
        RelationshipIntegrity::new(builder.build().unwrap())
    }

    #[test]
    fn test_typed_accessors() {
        let integrity = integrity();
        let owner = Owner::create(&integrity).unwrap();
        let pet = Pet::create(&integrity).unwrap();

        owner.set_relationship("name", json!("Ada")).unwrap();
        owner.link("pets", &pet).unwrap();

        assert_eq!(owner.value("name").unwrap(), Some(json!("Ada")));
        let owners: Vec<Owner> = pet.related("owner").unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].id(), owner.id());
    }

    #[test]
    fn test_load_checks_class() {
        let integrity = integrity();
        let pet = Pet::create(&integrity).unwrap();
        assert!(Owner::load(&integrity, pet.id()).is_err());
        assert!(Pet::load(&integrity, pet.id()).is_ok());
    }

    #[test]
    fn test_discard_consumes_handle() {
        let integrity = integrity();
        let owner = Owner::create(&integrity).unwrap();
        let pet = Pet::create(&integrity).unwrap();
        pet.link("owner", &owner).unwrap();
        let pet_id = pet.id();

        pet.discard().unwrap();
        assert!(!integrity.contains(pet_id).unwrap());
        assert!(owner.related::<Pet>("pets").unwrap().is_empty());
    }
}
