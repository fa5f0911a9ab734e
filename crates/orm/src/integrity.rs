//! Relationship Integrity Facade - Single entry point for domain objects and persistence
//!
//! Wraps the immutable [`Registry`] and the live object graph behind one
//! read/write lock. Every mutation validates first and only then applies, all
//! inside the same write section, so readers never see one side of an edge
//! without the other.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::error::{IntegrityError, IntegrityResult};
use crate::graph::{Instance, ObjectGraph, ObjectId, ObjectSnapshot, PropertyValue};
use crate::relationships::{
    Cardinality, CascadePlanner, EdgeChange, InverseManager, PropertyDescriptor, PropertyKind, Registry,
    SavePlan, SecondaryKeyIndex,
};

#[derive(Debug, Default)]
struct GraphState {
    graph: ObjectGraph,
    keys: SecondaryKeyIndex,
}

/// Composes the descriptor table, key index, inverse manager and cascade planner
#[derive(Debug, Clone)]
pub struct RelationshipIntegrity {
    registry: Arc<Registry>,
    state: Arc<RwLock<GraphState>>,
}

impl RelationshipIntegrity {
    /// Create a facade over a built registry with an empty graph
    pub fn new(registry: Registry) -> Self {
        Self::with_registry(Arc::new(registry))
    }

    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            state: Arc::new(RwLock::new(GraphState::default())),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Declared descriptor of `class.property`
    pub fn describe(&self, class: &str, property: &str) -> IntegrityResult<&PropertyDescriptor> {
        self.registry.describe(class, property)
    }

    /// Create a new, empty instance of a registered class
    pub fn create(&self, class: &str) -> IntegrityResult<ObjectId> {
        self.registry.class(class)?;
        let id = ObjectId::new();
        self.write()?.graph.insert(Instance::new(id, class));
        tracing::debug!(target: "kindred::integrity", "created {} {}", class, id);
        Ok(id)
    }

    pub fn contains(&self, id: ObjectId) -> IntegrityResult<bool> {
        Ok(self.read()?.graph.contains(id))
    }

    /// Number of live instances
    pub fn len(&self) -> IntegrityResult<usize> {
        Ok(self.read()?.graph.len())
    }

    pub fn is_empty(&self) -> IntegrityResult<bool> {
        Ok(self.read()?.graph.is_empty())
    }

    /// Class name of a live instance
    pub fn class_of(&self, id: ObjectId) -> IntegrityResult<String> {
        let state = self.read()?;
        let instance = state.graph.get(id).ok_or(IntegrityError::UnknownObject { id })?;
        Ok(instance.class().to_string())
    }

    /// Read a property, resolving aliases
    pub fn get_relationship(&self, owner: ObjectId, property: &str) -> IntegrityResult<PropertyValue> {
        let state = self.read()?;
        let instance = state.graph.get(owner).ok_or(IntegrityError::UnknownObject { id: owner })?;
        let descriptor = self.registry.resolve_alias(instance.class(), property)?;
        let name = descriptor.name.as_str();

        let value = match (descriptor.kind, descriptor.cardinality) {
            (PropertyKind::Plain | PropertyKind::SecondaryKey, _) => instance
                .value(name)
                .cloned()
                .map_or(PropertyValue::Unset, PropertyValue::Value),
            (_, Cardinality::One) => instance
                .related(name)
                .first()
                .copied()
                .map_or(PropertyValue::Unset, PropertyValue::Object),
            (_, Cardinality::Many) => PropertyValue::Objects(instance.related(name)),
        };
        Ok(value)
    }

    /// Write a property, dispatching on its declared kind
    ///
    /// Plain properties store the value; secondary keys are checked for
    /// uniqueness before the old binding is released; relationships are
    /// re-linked with their inverse side. A relationship collection is replaced
    /// as a whole.
    pub fn set_relationship(
        &self,
        owner: ObjectId,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> IntegrityResult<Vec<EdgeChange>> {
        let result = self.apply(owner, property, value.into());
        if let Err(err) = &result {
            tracing::warn!(target: "kindred::integrity", "rejected write of {} on {}: {}", property, owner, err);
        }
        result
    }

    /// Add `target` to `owner.property`, maintaining the inverse side
    pub fn link(&self, owner: ObjectId, property: &str, target: ObjectId) -> IntegrityResult<Vec<EdgeChange>> {
        let mut guard = self.write()?;
        let descriptor = self.relationship_descriptor(&guard.graph, owner, property)?;
        let result = InverseManager::new(&self.registry).link(&mut guard.graph, owner, descriptor, target);
        if let Err(err) = &result {
            tracing::warn!(target: "kindred::integrity", "rejected link {}.{} -> {}: {}", owner, property, target, err);
        }
        result
    }

    /// Remove `target` from `owner.property`, maintaining the inverse side
    pub fn unlink(&self, owner: ObjectId, property: &str, target: ObjectId) -> IntegrityResult<Vec<EdgeChange>> {
        let mut guard = self.write()?;
        let descriptor = self.relationship_descriptor(&guard.graph, owner, property)?;
        InverseManager::new(&self.registry).unlink(&mut guard.graph, owner, descriptor, target)
    }

    fn apply(&self, owner: ObjectId, property: &str, value: PropertyValue) -> IntegrityResult<Vec<EdgeChange>> {
        let mut guard = self.write()?;
        let GraphState { graph, keys } = &mut *guard;

        let instance = graph.get(owner).ok_or(IntegrityError::UnknownObject { id: owner })?;
        let class = instance.class().to_string();
        let descriptor = self.registry.resolve_alias(&class, property)?;
        let name = descriptor.name.as_str();

        match descriptor.kind {
            PropertyKind::Plain => {
                let value = expect_value(&class, descriptor, value)?;
                if let Some(instance) = graph.get_mut(owner) {
                    instance.set_value(name, value);
                }
                Ok(Vec::new())
            }
            PropertyKind::SecondaryKey => {
                let value = expect_value(&class, descriptor, value)?;
                keys.check(&class, name, &value, owner)?;
                if let Some(old) = instance.value(name).cloned() {
                    keys.release(&class, name, &old);
                }
                keys.assign(&class, name, &value, owner)?;
                if let Some(instance) = graph.get_mut(owner) {
                    instance.set_value(name, value);
                }
                Ok(Vec::new())
            }
            PropertyKind::Dependent | PropertyKind::IndependentInverse => {
                self.relink(graph, owner, &class, descriptor, value)
            }
        }
    }

    /// Remove an instance, its edges and its secondary key bindings
    pub fn discard(&self, id: ObjectId) -> IntegrityResult<Vec<EdgeChange>> {
        let mut guard = self.write()?;
        let GraphState { graph, keys } = &mut *guard;
        let instance = graph.get(id).ok_or(IntegrityError::UnknownObject { id })?;
        let class = self.registry.class(instance.class())?;
        let manager = InverseManager::new(&self.registry);

        let mut edges = Vec::new();
        for property in class.relationships() {
            let edge = manager.resolve(property, class.name())?;
            edges.push((edge, instance.related(&property.name)));
        }
        let bound_keys: Vec<(String, Value)> = class
            .secondary_keys()
            .filter_map(|p| instance.value(&p.name).map(|v| (p.name.clone(), v.clone())))
            .collect();

        let mut changes = Vec::new();
        for (edge, targets) in edges {
            for target in targets {
                manager.detach(graph, id, edge, target, &mut changes);
            }
        }
        for (property, key) in bound_keys {
            keys.release(class.name(), &property, &key);
        }
        graph.remove(id);
        graph.forget(id);

        tracing::debug!(target: "kindred::integrity", "discarded {} {}", class.name(), id);
        Ok(changes)
    }

    /// Instance holding a secondary key value
    pub fn lookup(&self, class: &str, property: &str, key: &Value) -> IntegrityResult<ObjectId> {
        let descriptor = self.registry.resolve_alias(class, property)?;
        if descriptor.kind != PropertyKind::SecondaryKey {
            return Err(IntegrityError::type_mismatch(class, property, "a secondary key property"));
        }
        self.read()?.keys.lookup(class, &descriptor.name, key)
    }

    /// Ordered list of objects the persistence collaborator must write
    pub fn prepare_save(&self, id: ObjectId) -> IntegrityResult<SavePlan> {
        let state = self.read()?;
        let plan = CascadePlanner::new(&self.registry).plan_save(&state.graph, id)?;
        tracing::info!(target: "kindred::integrity", "save of {} covers {} object(s)", id, plan.len());
        Ok(plan)
    }

    /// Serializable view of an instance
    pub fn snapshot(&self, id: ObjectId) -> IntegrityResult<ObjectSnapshot> {
        let state = self.read()?;
        let instance = state.graph.get(id).ok_or(IntegrityError::UnknownObject { id })?;
        Ok(ObjectSnapshot::from_instance(instance))
    }

    /// Edges whose inverse side does not point back; empty while the graph is consistent
    pub fn asymmetric_edges(&self) -> IntegrityResult<Vec<(ObjectId, String, ObjectId)>> {
        let state = self.read()?;
        let mut broken = Vec::new();
        for instance in state.graph.iter() {
            let class = self.registry.class(instance.class())?;
            for property in class.relationships() {
                let Some(inverse) = self.registry.inverse_of(property)? else {
                    continue;
                };
                for target in instance.related(&property.name) {
                    let points_back = state
                        .graph
                        .get(target)
                        .is_some_and(|t| t.holds(&inverse.name, instance.id()));
                    if !points_back {
                        broken.push((instance.id(), property.name.clone(), target));
                    }
                }
            }
        }
        Ok(broken)
    }

    fn relink(
        &self,
        graph: &mut ObjectGraph,
        owner: ObjectId,
        class: &str,
        descriptor: &PropertyDescriptor,
        value: PropertyValue,
    ) -> IntegrityResult<Vec<EdgeChange>> {
        let manager = InverseManager::new(&self.registry);
        let current = graph
            .get(owner)
            .map(|instance| instance.related(&descriptor.name))
            .unwrap_or_default();

        let wanted = match (descriptor.cardinality, value) {
            (_, PropertyValue::Unset) => Vec::new(),
            (Cardinality::One, PropertyValue::Object(target)) => vec![target],
            (Cardinality::Many, PropertyValue::Objects(mut targets)) => {
                let mut seen = std::collections::HashSet::new();
                targets.retain(|target| seen.insert(*target));
                targets
            }
            (Cardinality::One, _) => {
                return Err(IntegrityError::type_mismatch(class, &descriptor.name, "a single object"))
            }
            (Cardinality::Many, _) => {
                return Err(IntegrityError::type_mismatch(class, &descriptor.name, "an object collection"))
            }
        };

        // validate every edge before the first mutation
        let edge = manager.resolve(descriptor, class)?;
        for target in &wanted {
            manager.edge(graph, owner, descriptor, *target)?;
        }

        let mut changes = Vec::new();
        for target in current.iter().filter(|t| !wanted.contains(t)) {
            manager.detach(graph, owner, edge, *target, &mut changes);
        }
        for target in wanted {
            manager.attach(graph, owner, edge, target, &mut changes);
        }
        Ok(changes)
    }

    fn relationship_descriptor(
        &self,
        graph: &ObjectGraph,
        owner: ObjectId,
        property: &str,
    ) -> IntegrityResult<&PropertyDescriptor> {
        let instance = graph.get(owner).ok_or(IntegrityError::UnknownObject { id: owner })?;
        let descriptor = self.registry.resolve_alias(instance.class(), property)?;
        if !descriptor.is_relationship() {
            return Err(IntegrityError::type_mismatch(instance.class(), property, "a relationship property"));
        }
        Ok(descriptor)
    }

    fn read(&self) -> IntegrityResult<RwLockReadGuard<'_, GraphState>> {
        self.state
            .read()
            .map_err(|_| IntegrityError::lock_poisoned("object graph"))
    }

    fn write(&self) -> IntegrityResult<RwLockWriteGuard<'_, GraphState>> {
        self.state
            .write()
            .map_err(|_| IntegrityError::lock_poisoned("object graph"))
    }
}

fn expect_value(class: &str, descriptor: &PropertyDescriptor, value: PropertyValue) -> IntegrityResult<Value> {
    match value {
        PropertyValue::Unset => Ok(Value::Null),
        PropertyValue::Value(value) => Ok(value),
        _ => Err(IntegrityError::type_mismatch(class, &descriptor.name, "an attribute value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::{PropertyOptions, RegistryBuilder};
    use serde_json::json;

    fn integrity() -> RelationshipIntegrity {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Parent", "name", PropertyOptions::plain())
            .unwrap()
            .register("Parent", "ssn", PropertyOptions::secondary_key())
            .unwrap()
            .register("Parent", "social", PropertyOptions::alias("ssn"))
            .unwrap()
            .register("Parent", "spouse", PropertyOptions::reference("Parent").inverse("spouse"))
            .unwrap()
            .register("Parent", "children", PropertyOptions::dependent("Person").many().logical(true).inverse("parent"))
            .unwrap()
            .register("Person", "parent", PropertyOptions::reference("Parent").inverse("children"))
            .unwrap();
        RelationshipIntegrity::new(builder.build().unwrap())
    }

    #[test]
    fn test_create_unknown_class() {
        let integrity = integrity();
        assert!(matches!(integrity.create("Pet"), Err(IntegrityError::UnknownClass { .. })));
    }

    #[test]
    fn test_plain_value_round_trip() {
        let integrity = integrity();
        let parent = integrity.create("Parent").unwrap();
        integrity.set_relationship(parent, "name", json!("Ada")).unwrap();
        assert_eq!(
            integrity.get_relationship(parent, "name").unwrap(),
            PropertyValue::Value(json!("Ada"))
        );
        integrity.set_relationship(parent, "name", PropertyValue::Unset).unwrap();
        assert!(integrity.get_relationship(parent, "name").unwrap().is_unset());
    }

    #[test]
    fn test_secondary_key_change_releases_old_value() {
        let integrity = integrity();
        let ada = integrity.create("Parent").unwrap();
        let bob = integrity.create("Parent").unwrap();
        integrity.set_relationship(ada, "ssn", json!("111")).unwrap();
        integrity.set_relationship(ada, "ssn", json!("222")).unwrap();

        assert!(matches!(
            integrity.lookup("Parent", "ssn", &json!("111")),
            Err(IntegrityError::NotFound { .. })
        ));
        integrity.set_relationship(bob, "ssn", json!("111")).unwrap();
        assert_eq!(integrity.lookup("Parent", "ssn", &json!("111")).unwrap(), bob);
        assert_eq!(integrity.lookup("Parent", "social", &json!("222")).unwrap(), ada);
    }

    #[test]
    fn test_rejected_key_keeps_previous_binding() {
        let integrity = integrity();
        let ada = integrity.create("Parent").unwrap();
        let bob = integrity.create("Parent").unwrap();
        integrity.set_relationship(ada, "ssn", json!("111")).unwrap();
        integrity.set_relationship(bob, "ssn", json!("222")).unwrap();

        let err = integrity.set_relationship(bob, "ssn", json!("111")).unwrap_err();
        assert!(matches!(err, IntegrityError::DuplicateSecondaryKey { .. }));
        assert_eq!(integrity.lookup("Parent", "ssn", &json!("222")).unwrap(), bob);
        assert_eq!(
            integrity.get_relationship(bob, "ssn").unwrap(),
            PropertyValue::Value(json!("222"))
        );
    }

    #[test]
    fn test_lookup_requires_secondary_key() {
        let integrity = integrity();
        assert!(matches!(
            integrity.lookup("Parent", "name", &json!("Ada")),
            Err(IntegrityError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_collection_replacement() {
        let integrity = integrity();
        let parent = integrity.create("Parent").unwrap();
        let a = integrity.create("Person").unwrap();
        let b = integrity.create("Person").unwrap();
        let c = integrity.create("Person").unwrap();

        integrity.set_relationship(parent, "children", vec![a, b]).unwrap();
        integrity.set_relationship(parent, "children", vec![b, c, c]).unwrap();

        assert_eq!(
            integrity.get_relationship(parent, "children").unwrap(),
            PropertyValue::Objects(vec![b, c])
        );
        assert!(integrity.get_relationship(a, "parent").unwrap().is_unset());
        assert_eq!(integrity.get_relationship(c, "parent").unwrap(), PropertyValue::Object(parent));
        assert!(integrity.asymmetric_edges().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_member_rejects_whole_collection() {
        let integrity = integrity();
        let parent = integrity.create("Parent").unwrap();
        let kid = integrity.create("Person").unwrap();
        let stranger = integrity.create("Parent").unwrap();

        let err = integrity
            .set_relationship(parent, "children", vec![kid, stranger])
            .unwrap_err();
        assert!(matches!(err, IntegrityError::TargetClassMismatch { .. }));
        assert_eq!(
            integrity.get_relationship(parent, "children").unwrap(),
            PropertyValue::Objects(vec![])
        );
        assert!(integrity.get_relationship(kid, "parent").unwrap().is_unset());
    }

    #[test]
    fn test_shape_mismatch() {
        let integrity = integrity();
        let parent = integrity.create("Parent").unwrap();
        let other = integrity.create("Parent").unwrap();
        assert!(matches!(
            integrity.set_relationship(parent, "spouse", vec![other]),
            Err(IntegrityError::TypeMismatch { .. })
        ));
        assert!(matches!(
            integrity.set_relationship(parent, "name", other),
            Err(IntegrityError::TypeMismatch { .. })
        ));
        assert!(matches!(
            integrity.link(parent, "name", other),
            Err(IntegrityError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_discard_releases_keys_and_edges() {
        let integrity = integrity();
        let ada = integrity.create("Parent").unwrap();
        let bob = integrity.create("Parent").unwrap();
        let kid = integrity.create("Person").unwrap();
        integrity.set_relationship(ada, "ssn", json!("111")).unwrap();
        integrity.link(ada, "spouse", bob).unwrap();
        integrity.link(ada, "children", kid).unwrap();

        integrity.discard(ada).unwrap();

        assert!(!integrity.contains(ada).unwrap());
        assert!(integrity.get_relationship(bob, "spouse").unwrap().is_unset());
        assert!(integrity.get_relationship(kid, "parent").unwrap().is_unset());
        assert!(integrity.lookup("Parent", "ssn", &json!("111")).is_err());
        assert!(integrity.asymmetric_edges().unwrap().is_empty());
        assert_eq!(integrity.len().unwrap(), 2);
    }

    #[test]
    fn test_snapshot_and_plan() {
        let integrity = integrity();
        let parent = integrity.create("Parent").unwrap();
        let kid = integrity.create("Person").unwrap();
        integrity.set_relationship(parent, "name", json!("Ada")).unwrap();
        integrity.link(parent, "children", kid).unwrap();

        let plan = integrity.prepare_save(parent).unwrap();
        assert_eq!(plan.objects(), vec![parent, kid]);

        let snapshot = integrity.snapshot(parent).unwrap();
        assert_eq!(snapshot.values.get("name"), Some(&json!("Ada")));
        assert_eq!(snapshot.relationships.get("children"), Some(&vec![kid]));
    }
}
