//! Dependency Cascade Planner - Which objects a save must include, and in what order
//!
//! The plan starts with the saved instance and walks logical dependents
//! depth-first in declaration order. Physical dependents (`logical = false`)
//! are left to the storage backend and never appear in the plan.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{IntegrityError, IntegrityResult};
use crate::graph::{ObjectGraph, ObjectId};
use super::registry::Registry;

/// One object scheduled for persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedSave {
    pub object: ObjectId,
    pub class: String,
    /// Distance from the instance the plan was made for
    pub depth: usize,
    /// Owner and dependent property that pulled this object in
    pub via: Option<(ObjectId, String)>,
}

/// Ordered, duplicate-free list of objects to persist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SavePlan {
    entries: Vec<PlannedSave>,
}

impl SavePlan {
    pub fn entries(&self) -> &[PlannedSave] {
        &self.entries
    }

    pub fn objects(&self) -> Vec<ObjectId> {
        self.entries.iter().map(|e| e.object).collect()
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.entries.iter().any(|e| e.object == object)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlannedSave> {
        self.entries.iter()
    }
}

impl IntoIterator for SavePlan {
    type Item = PlannedSave;
    type IntoIter = std::vec::IntoIter<PlannedSave>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a SavePlan {
    type Item = &'a PlannedSave;
    type IntoIter = std::slice::Iter<'a, PlannedSave>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Computes save plans from the descriptor table and the live graph
#[derive(Debug, Clone, Copy)]
pub struct CascadePlanner<'r> {
    registry: &'r Registry,
}

impl<'r> CascadePlanner<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Plan the save of `instance` and its logical dependents
    ///
    /// The walk keeps its own stack of frames, so the depth of a dependent
    /// chain is bounded by memory rather than by the thread stack.
    pub fn plan_save(&self, graph: &ObjectGraph, instance: ObjectId) -> IntegrityResult<SavePlan> {
        let mut walk = Walk::default();
        walk.scheduled.insert(instance);
        self.enter(graph, &mut walk, instance, 0, None)?;

        while let Some(frame) = walk.stack.last_mut() {
            let Some((dependent, property)) = frame.pending.get(frame.next).cloned() else {
                let finished = frame.object;
                walk.stack.pop();
                walk.path.pop();
                walk.on_path.remove(&finished);
                continue;
            };
            frame.next += 1;
            let owner = frame.object;
            let depth = frame.depth + 1;

            if walk.on_path.contains(&dependent) {
                let mut cycle = walk.path.clone();
                cycle.push(dependent);
                return Err(IntegrityError::CascadeCycle { path: cycle });
            }
            if !walk.scheduled.insert(dependent) {
                continue;
            }
            self.enter(graph, &mut walk, dependent, depth, Some((owner, property)))?;
        }

        tracing::debug!(
            target: "kindred::cascade",
            "planned save of {} with {} object(s)",
            instance,
            walk.plan.len()
        );
        Ok(walk.plan)
    }

    /// Schedule `object` and push a frame over its logical dependents
    fn enter(
        &self,
        graph: &ObjectGraph,
        walk: &mut Walk,
        object: ObjectId,
        depth: usize,
        via: Option<(ObjectId, String)>,
    ) -> IntegrityResult<()> {
        let instance = graph.get(object).ok_or(IntegrityError::UnknownObject { id: object })?;
        let class = self.registry.class(instance.class())?;
        walk.plan.entries.push(PlannedSave {
            object,
            class: instance.class().to_string(),
            depth,
            via,
        });

        let pending = class
            .dependents()
            .filter(|p| p.cascade_logical)
            .flat_map(|p| {
                instance
                    .related(&p.name)
                    .into_iter()
                    .map(move |dependent| (dependent, p.name.clone()))
            })
            .collect();
        walk.path.push(object);
        walk.on_path.insert(object);
        walk.stack.push(Frame {
            object,
            depth,
            pending,
            next: 0,
        });
        Ok(())
    }
}

/// Object being expanded, with the dependents still to visit
struct Frame {
    object: ObjectId,
    depth: usize,
    pending: Vec<(ObjectId, String)>,
    next: usize,
}

#[derive(Default)]
struct Walk {
    plan: SavePlan,
    stack: Vec<Frame>,
    scheduled: HashSet<ObjectId>,
    /// Current traversal path, in order and as a set
    path: Vec<ObjectId>,
    on_path: HashSet<ObjectId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Instance;
    use crate::relationships::metadata::PropertyOptions;
    use crate::relationships::registry::RegistryBuilder;

    fn registry(logical_children: bool) -> Registry {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Parent", "children", PropertyOptions::dependent("Person").many().logical(logical_children))
            .unwrap()
            .register("Person", "address", PropertyOptions::dependent("Address").logical(true))
            .unwrap()
            .register("Person", "friends", PropertyOptions::dependent("Person").many().logical(true))
            .unwrap()
            .class("Address");
        builder.build().unwrap()
    }

    fn spawn(graph: &mut ObjectGraph, class: &str) -> ObjectId {
        let id = ObjectId::new();
        graph.insert(Instance::new(id, class));
        id
    }

    #[test]
    fn test_logical_children_are_planned_recursively() {
        let registry = registry(true);
        let mut graph = ObjectGraph::new();
        let parent = spawn(&mut graph, "Parent");
        let kid = spawn(&mut graph, "Person");
        let home = spawn(&mut graph, "Address");
        graph.get_mut(parent).unwrap().push_many("children", kid);
        graph.get_mut(kid).unwrap().set_one("address", home);

        let plan = CascadePlanner::new(&registry).plan_save(&graph, parent).unwrap();
        assert_eq!(plan.objects(), vec![parent, kid, home]);
        assert_eq!(plan.entries()[2].depth, 2);
        assert_eq!(plan.entries()[1].via, Some((parent, "children".to_string())));
    }

    #[test]
    fn test_physical_children_are_omitted() {
        let registry = registry(false);
        let mut graph = ObjectGraph::new();
        let parent = spawn(&mut graph, "Parent");
        let kid = spawn(&mut graph, "Person");
        graph.get_mut(parent).unwrap().push_many("children", kid);

        let plan = CascadePlanner::new(&registry).plan_save(&graph, parent).unwrap();
        assert_eq!(plan.objects(), vec![parent]);
    }

    #[test]
    fn test_shared_dependent_is_planned_once() {
        let registry = registry(true);
        let mut graph = ObjectGraph::new();
        let parent = spawn(&mut graph, "Parent");
        let a = spawn(&mut graph, "Person");
        let b = spawn(&mut graph, "Person");
        let c = spawn(&mut graph, "Person");
        graph.get_mut(parent).unwrap().push_many("children", a);
        graph.get_mut(parent).unwrap().push_many("children", b);
        graph.get_mut(a).unwrap().push_many("friends", c);
        graph.get_mut(b).unwrap().push_many("friends", c);

        let plan = CascadePlanner::new(&registry).plan_save(&graph, parent).unwrap();
        assert_eq!(plan.objects(), vec![parent, a, c, b]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let registry = registry(true);
        let mut graph = ObjectGraph::new();
        let a = spawn(&mut graph, "Person");
        let b = spawn(&mut graph, "Person");
        graph.get_mut(a).unwrap().push_many("friends", b);
        graph.get_mut(b).unwrap().push_many("friends", a);

        let err = CascadePlanner::new(&registry).plan_save(&graph, a).unwrap_err();
        assert_eq!(err, IntegrityError::CascadeCycle { path: vec![a, b, a] });
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let registry = registry(true);
        let mut graph = ObjectGraph::new();
        let a = spawn(&mut graph, "Person");
        graph.get_mut(a).unwrap().push_many("friends", a);

        assert!(matches!(
            CascadePlanner::new(&registry).plan_save(&graph, a),
            Err(IntegrityError::CascadeCycle { .. })
        ));
    }

    #[test]
    fn test_unknown_instance() {
        let registry = registry(true);
        let graph = ObjectGraph::new();
        let ghost = ObjectId::new();
        assert_eq!(
            CascadePlanner::new(&registry).plan_save(&graph, ghost).unwrap_err(),
            IntegrityError::UnknownObject { id: ghost }
        );
    }

    #[test]
    fn test_long_chain_does_not_exhaust_the_stack() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Node", "next", PropertyOptions::dependent("Node").logical(true))
            .unwrap();
        let registry = builder.build().unwrap();

        let mut graph = ObjectGraph::new();
        let head = spawn(&mut graph, "Node");
        let mut tail = head;
        for _ in 0..100_000 {
            let node = spawn(&mut graph, "Node");
            graph.get_mut(tail).unwrap().set_one("next", node);
            tail = node;
        }

        let plan = CascadePlanner::new(&registry).plan_save(&graph, head).unwrap();
        assert_eq!(plan.len(), 100_001);
        assert_eq!(plan.entries()[100_000].object, tail);
        assert_eq!(plan.entries()[100_000].depth, 100_000);
    }

    #[test]
    fn test_cycle_at_the_end_of_a_long_chain() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("Node", "next", PropertyOptions::dependent("Node").logical(true))
            .unwrap();
        let registry = builder.build().unwrap();

        let mut graph = ObjectGraph::new();
        let head = spawn(&mut graph, "Node");
        let mut tail = head;
        for _ in 0..10_000 {
            let node = spawn(&mut graph, "Node");
            graph.get_mut(tail).unwrap().set_one("next", node);
            tail = node;
        }
        graph.get_mut(tail).unwrap().set_one("next", head);

        match CascadePlanner::new(&registry).plan_save(&graph, head).unwrap_err() {
            IntegrityError::CascadeCycle { path } => {
                assert_eq!(path.len(), 10_002);
                assert_eq!(path.first(), Some(&head));
                assert_eq!(path.last(), Some(&head));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
