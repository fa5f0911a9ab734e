//! Object Graph - Live instances and their property slots
//!
//! The graph is an arena keyed by [`ObjectId`]. Relationship edges are not
//! stored on their own; they are the `One`/`Many` slots on both ends, kept
//! symmetric by the inverse manager.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque identity of a live domain object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Generate a fresh identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form keeps cycle paths and log lines readable
        let simple = self.0.simple().to_string();
        write!(f, "{}", &simple[..8])
    }
}

/// Value crossing the facade boundary for one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// No value / no related object
    Unset,
    /// Attribute value of a plain or secondary key property
    Value(Value),
    /// Single related object
    Object(ObjectId),
    /// Related object collection
    Objects(Vec<ObjectId>),
}

impl PropertyValue {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Related object of a `One` relationship, if any
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Related objects of any relationship, empty when unset
    pub fn objects(&self) -> Vec<ObjectId> {
        match self {
            Self::Object(id) => vec![*id],
            Self::Objects(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        if value.is_null() {
            Self::Unset
        } else {
            Self::Value(value)
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<ObjectId> for PropertyValue {
    fn from(id: ObjectId) -> Self {
        Self::Object(id)
    }
}

impl From<Vec<ObjectId>> for PropertyValue {
    fn from(ids: Vec<ObjectId>) -> Self {
        Self::Objects(ids)
    }
}

/// Stored state of one property on one instance
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Value(Value),
    One(ObjectId),
    Many(Vec<ObjectId>),
}

/// A live domain object
#[derive(Debug, Clone)]
pub struct Instance {
    id: ObjectId,
    class: String,
    slots: HashMap<String, Slot>,
}

impl Instance {
    pub fn new(id: ObjectId, class: impl Into<String>) -> Self {
        Self {
            id,
            class: class.into(),
            slots: HashMap::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn slot(&self, property: &str) -> Option<&Slot> {
        self.slots.get(property)
    }

    pub fn slots(&self) -> impl Iterator<Item = (&String, &Slot)> {
        self.slots.iter()
    }

    /// Attribute value of a plain or secondary key property
    pub fn value(&self, property: &str) -> Option<&Value> {
        match self.slots.get(property) {
            Some(Slot::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Related objects held in a relationship slot, in insertion order
    pub fn related(&self, property: &str) -> Vec<ObjectId> {
        match self.slots.get(property) {
            Some(Slot::One(id)) => vec![*id],
            Some(Slot::Many(ids)) => ids.clone(),
            _ => Vec::new(),
        }
    }

    /// Whether a relationship slot currently holds `target`
    pub fn holds(&self, property: &str, target: ObjectId) -> bool {
        match self.slots.get(property) {
            Some(Slot::One(id)) => *id == target,
            Some(Slot::Many(ids)) => ids.contains(&target),
            _ => false,
        }
    }

    pub fn set_value(&mut self, property: &str, value: Value) {
        if value.is_null() {
            self.slots.remove(property);
        } else {
            self.slots.insert(property.to_string(), Slot::Value(value));
        }
    }

    pub fn set_one(&mut self, property: &str, target: ObjectId) {
        self.slots.insert(property.to_string(), Slot::One(target));
    }

    /// Idempotent add to a collection slot
    pub fn push_many(&mut self, property: &str, target: ObjectId) {
        match self.slots.get_mut(property) {
            Some(Slot::Many(ids)) => {
                if !ids.contains(&target) {
                    ids.push(target);
                }
            }
            _ => {
                self.slots.insert(property.to_string(), Slot::Many(vec![target]));
            }
        }
    }

    /// Remove `target` from a relationship slot, dropping the slot once empty
    pub fn remove_target(&mut self, property: &str, target: ObjectId) {
        let emptied = match self.slots.get_mut(property) {
            Some(Slot::One(id)) => *id == target,
            Some(Slot::Many(ids)) => {
                ids.retain(|id| *id != target);
                ids.is_empty()
            }
            _ => false,
        };
        if emptied {
            self.slots.remove(property);
        }
    }

    pub fn clear(&mut self, property: &str) {
        self.slots.remove(property);
    }
}

/// Arena of live instances
#[derive(Debug, Default, Clone)]
pub struct ObjectGraph {
    instances: HashMap<ObjectId, Instance>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: Instance) {
        self.instances.insert(instance.id(), instance);
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<Instance> {
        self.instances.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Drop every reference to `id` held in relationship slots of other instances
    pub fn forget(&mut self, id: ObjectId) -> usize {
        let mut removed = 0;
        for instance in self.instances.values_mut() {
            let holding: Vec<String> = instance
                .slots
                .iter()
                .filter(|(_, slot)| match slot {
                    Slot::One(target) => *target == id,
                    Slot::Many(targets) => targets.contains(&id),
                    Slot::Value(_) => false,
                })
                .map(|(name, _)| name.clone())
                .collect();
            for name in holding {
                instance.remove_target(&name, id);
                removed += 1;
            }
        }
        removed
    }
}

/// Serializable view of an instance handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    pub class: String,
    /// Attribute values keyed by canonical property name
    pub values: serde_json::Map<String, Value>,
    /// Related object ids keyed by canonical property name
    pub relationships: HashMap<String, Vec<ObjectId>>,
}

impl ObjectSnapshot {
    pub fn from_instance(instance: &Instance) -> Self {
        let mut values = serde_json::Map::new();
        let mut relationships = HashMap::new();
        for (name, slot) in instance.slots() {
            match slot {
                Slot::Value(value) => {
                    values.insert(name.clone(), value.clone());
                }
                Slot::One(id) => {
                    relationships.insert(name.clone(), vec![*id]);
                }
                Slot::Many(ids) => {
                    relationships.insert(name.clone(), ids.clone());
                }
            }
        }
        Self {
            id: instance.id(),
            class: instance.class().to_string(),
            values,
            relationships,
        }
    }
}
