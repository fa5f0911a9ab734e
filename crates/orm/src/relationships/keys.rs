//! Secondary Key Index - Uniqueness of alternate identity values per class

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{IntegrityError, IntegrityResult};
use crate::graph::ObjectId;

/// Canonical form of a key value; two keys are equal iff their values are equal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyValue(String);

impl KeyValue {
    /// `None` for null values, which are never indexed
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Maps (class, property, key value) to the single live instance holding it
#[derive(Debug, Default, Clone)]
pub struct SecondaryKeyIndex {
    entries: HashMap<(String, String), HashMap<KeyValue, ObjectId>>,
}

impl SecondaryKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate an assignment without recording it
    pub fn check(&self, class: &str, property: &str, key: &Value, instance: ObjectId) -> IntegrityResult<()> {
        let Some(key) = KeyValue::from_value(key) else {
            return Ok(());
        };
        match self.holder(class, property, &key) {
            Some(holder) if holder != instance => Err(IntegrityError::DuplicateSecondaryKey {
                class: class.to_string(),
                property: property.to_string(),
                key: key.0,
                holder,
            }),
            _ => Ok(()),
        }
    }

    /// Bind `key` to `instance`; returns false when the binding already existed
    pub fn assign(&mut self, class: &str, property: &str, key: &Value, instance: ObjectId) -> IntegrityResult<bool> {
        self.check(class, property, key, instance)?;
        let Some(key) = KeyValue::from_value(key) else {
            return Ok(false);
        };
        let bound = self
            .entries
            .entry((class.to_string(), property.to_string()))
            .or_default()
            .insert(key, instance);
        Ok(bound.is_none())
    }

    /// Remove a binding; returns the instance that held it
    pub fn release(&mut self, class: &str, property: &str, key: &Value) -> Option<ObjectId> {
        let key = KeyValue::from_value(key)?;
        let scope = (class.to_string(), property.to_string());
        let bindings = self.entries.get_mut(&scope)?;
        let released = bindings.remove(&key);
        if bindings.is_empty() {
            self.entries.remove(&scope);
        }
        released
    }

    /// Instance bound to `key`
    pub fn lookup(&self, class: &str, property: &str, key: &Value) -> IntegrityResult<ObjectId> {
        KeyValue::from_value(key)
            .and_then(|k| self.holder(class, property, &k))
            .ok_or_else(|| IntegrityError::NotFound {
                class: class.to_string(),
                property: property.to_string(),
                key: key.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn holder(&self, class: &str, property: &str, key: &KeyValue) -> Option<ObjectId> {
        self.entries
            .get(&(class.to_string(), property.to_string()))
            .and_then(|bindings| bindings.get(key))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assign_and_lookup() {
        let mut index = SecondaryKeyIndex::new();
        let ada = ObjectId::new();
        assert!(index.assign("Parent", "ssn", &json!("123-45"), ada).unwrap());
        assert_eq!(index.lookup("Parent", "ssn", &json!("123-45")).unwrap(), ada);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_reassign_same_instance_is_noop() {
        let mut index = SecondaryKeyIndex::new();
        let ada = ObjectId::new();
        index.assign("Parent", "ssn", &json!("123-45"), ada).unwrap();
        assert!(!index.assign("Parent", "ssn", &json!("123-45"), ada).unwrap());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut index = SecondaryKeyIndex::new();
        let ada = ObjectId::new();
        let bob = ObjectId::new();
        index.assign("Parent", "ssn", &json!("123-45"), ada).unwrap();
        let err = index.assign("Parent", "ssn", &json!("123-45"), bob).unwrap_err();
        assert!(matches!(err, IntegrityError::DuplicateSecondaryKey { holder, .. } if holder == ada));
        assert_eq!(index.lookup("Parent", "ssn", &json!("123-45")).unwrap(), ada);
    }

    #[test]
    fn test_same_value_in_other_class_is_independent() {
        let mut index = SecondaryKeyIndex::new();
        index.assign("Parent", "ssn", &json!(7), ObjectId::new()).unwrap();
        assert!(index.assign("Person", "ssn", &json!(7), ObjectId::new()).is_ok());
    }

    #[test]
    fn test_value_equality() {
        let mut index = SecondaryKeyIndex::new();
        let ada = ObjectId::new();
        index.assign("Parent", "ssn", &json!(42), ada).unwrap();
        assert!(index.lookup("Parent", "ssn", &json!("42")).is_err());
        assert_eq!(index.lookup("Parent", "ssn", &json!(42)).unwrap(), ada);
    }

    #[test]
    fn test_null_never_indexed() {
        let mut index = SecondaryKeyIndex::new();
        assert!(!index.assign("Parent", "ssn", &Value::Null, ObjectId::new()).unwrap());
        assert!(index.assign("Parent", "ssn", &Value::Null, ObjectId::new()).is_ok());
        assert!(index.is_empty());
        assert!(matches!(
            index.lookup("Parent", "ssn", &Value::Null),
            Err(IntegrityError::NotFound { .. })
        ));
    }

    #[test]
    fn test_release() {
        let mut index = SecondaryKeyIndex::new();
        let ada = ObjectId::new();
        index.assign("Parent", "ssn", &json!("123-45"), ada).unwrap();
        assert_eq!(index.release("Parent", "ssn", &json!("123-45")), Some(ada));
        assert!(index.is_empty());
        assert!(index.assign("Parent", "ssn", &json!("123-45"), ObjectId::new()).is_ok());
    }
}
