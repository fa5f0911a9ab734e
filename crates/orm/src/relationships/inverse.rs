//! Inverse Relationship Manager - Keeps both ends of a relationship in step
//!
//! Every operation is split in two: [`InverseManager::edge`] validates the
//! request against the registry and the graph without touching either, and
//! [`InverseManager::attach`] / [`InverseManager::detach`] then mutate the
//! graph and cannot fail. Callers that validate everything first therefore
//! never leave a half-applied edge behind.

use serde::Serialize;

use crate::error::{IntegrityError, IntegrityResult};
use crate::graph::{ObjectGraph, ObjectId};
use super::metadata::PropertyDescriptor;
use super::registry::Registry;

/// A validated relationship property together with its inverse side
#[derive(Debug, Clone, Copy)]
pub struct Edge<'r> {
    pub property: &'r PropertyDescriptor,
    pub inverse: Option<&'r PropertyDescriptor>,
}

/// One applied change to the relationship graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum EdgeChange {
    Attached {
        owner: ObjectId,
        property: String,
        target: ObjectId,
    },
    Detached {
        owner: ObjectId,
        property: String,
        target: ObjectId,
    },
}

/// Maintains inverse symmetry on link and unlink
#[derive(Debug, Clone, Copy)]
pub struct InverseManager<'r> {
    registry: &'r Registry,
}

impl<'r> InverseManager<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Resolve the relationship edge for a property, checking the owner side only
    pub fn resolve(&self, property: &'r PropertyDescriptor, owner_class: &str) -> IntegrityResult<Edge<'r>> {
        if !property.is_relationship() {
            return Err(IntegrityError::type_mismatch(owner_class, &property.name, "a relationship property"));
        }
        let inverse = self.registry.inverse_of(property)?;
        if let Some(inverse) = inverse {
            let points_back = inverse.inverse_name.as_deref() == Some(property.name.as_str())
                && inverse.target_class.as_deref() == Some(owner_class);
            if !points_back {
                return Err(IntegrityError::InverseMismatch {
                    class: owner_class.to_string(),
                    property: property.name.clone(),
                    target_class: property.target_class.clone().unwrap_or_default(),
                    inverse: inverse.name.clone(),
                });
            }
        }
        Ok(Edge { property, inverse })
    }

    /// Validate linking `owner.property` to `target` without mutating anything
    pub fn edge(
        &self,
        graph: &ObjectGraph,
        owner: ObjectId,
        property: &'r PropertyDescriptor,
        target: ObjectId,
    ) -> IntegrityResult<Edge<'r>> {
        let owner_instance = graph.get(owner).ok_or(IntegrityError::UnknownObject { id: owner })?;
        let target_instance = graph.get(target).ok_or(IntegrityError::UnknownObject { id: target })?;
        let edge = self.resolve(property, owner_instance.class())?;

        let expected = property.target_class.as_deref().unwrap_or_default();
        if target_instance.class() != expected {
            return Err(IntegrityError::TargetClassMismatch {
                class: owner_instance.class().to_string(),
                property: property.name.clone(),
                expected: expected.to_string(),
                actual: target_instance.class().to_string(),
            });
        }
        Ok(edge)
    }

    /// Validate and establish `owner.property -> target` with its inverse
    pub fn link(
        &self,
        graph: &mut ObjectGraph,
        owner: ObjectId,
        property: &'r PropertyDescriptor,
        target: ObjectId,
    ) -> IntegrityResult<Vec<EdgeChange>> {
        let edge = self.edge(graph, owner, property, target)?;
        let mut changes = Vec::new();
        self.attach(graph, owner, edge, target, &mut changes);
        Ok(changes)
    }

    /// Validate and remove `owner.property -> target` with its inverse
    pub fn unlink(
        &self,
        graph: &mut ObjectGraph,
        owner: ObjectId,
        property: &'r PropertyDescriptor,
        target: ObjectId,
    ) -> IntegrityResult<Vec<EdgeChange>> {
        let edge = self.edge(graph, owner, property, target)?;
        let mut changes = Vec::new();
        self.detach(graph, owner, edge, target, &mut changes);
        Ok(changes)
    }

    /// Establish an already validated edge
    pub fn attach(
        &self,
        graph: &mut ObjectGraph,
        owner: ObjectId,
        edge: Edge<'r>,
        target: ObjectId,
        changes: &mut Vec<EdgeChange>,
    ) {
        let name = edge.property.name.as_str();
        let Some(current) = graph.get(owner) else {
            return;
        };
        if current.holds(name, target) {
            return;
        }

        // a single-valued forward side gives up its previous target first
        if !edge.property.is_many() {
            if let Some(previous) = current.related(name).first().copied() {
                self.detach(graph, owner, edge, previous, changes);
            }
        }

        // a single-valued inverse side gives up its previous holder first
        if let Some(inverse) = edge.inverse.filter(|inverse| !inverse.is_many()) {
            let prior = graph
                .get(target)
                .and_then(|t| t.related(&inverse.name).first().copied());
            if let Some(prior) = prior.filter(|prior| *prior != owner) {
                self.detach(graph, prior, edge, target, changes);
            }
        }

        if let Some(instance) = graph.get_mut(owner) {
            if edge.property.is_many() {
                instance.push_many(name, target);
            } else {
                instance.set_one(name, target);
            }
        }
        if let Some(inverse) = edge.inverse {
            if let Some(instance) = graph.get_mut(target) {
                if inverse.is_many() {
                    instance.push_many(&inverse.name, owner);
                } else {
                    instance.set_one(&inverse.name, owner);
                }
            }
        }

        tracing::debug!(target: "kindred::inverse", "attached {}.{} -> {}", owner, name, target);
        changes.push(EdgeChange::Attached {
            owner,
            property: name.to_string(),
            target,
        });
    }

    /// Remove an already validated edge; absent edges are left alone
    pub fn detach(
        &self,
        graph: &mut ObjectGraph,
        owner: ObjectId,
        edge: Edge<'r>,
        target: ObjectId,
        changes: &mut Vec<EdgeChange>,
    ) {
        let name = edge.property.name.as_str();
        match graph.get_mut(owner) {
            Some(instance) if instance.holds(name, target) => instance.remove_target(name, target),
            _ => return,
        }
        if let Some(inverse) = edge.inverse {
            if let Some(instance) = graph.get_mut(target) {
                instance.remove_target(&inverse.name, owner);
            }
        }

        tracing::debug!(target: "kindred::inverse", "detached {}.{} -> {}", owner, name, target);
        changes.push(EdgeChange::Detached {
            owner,
            property: name.to_string(),
            target,
        });
    }
}
