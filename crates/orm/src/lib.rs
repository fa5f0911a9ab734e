//! # kindred-orm: Relationship metadata and integrity engine
//!
//! Declares per-class property metadata (aliases, secondary keys, dependent
//! and independent relationships with inverses) and enforces it on a live
//! object graph:
//!
//! - the descriptor [`Registry`] validates declarations once, at build time
//! - [`SecondaryKeyIndex`] keeps alternate identities unique per class
//! - [`InverseManager`] keeps both ends of every edge in step
//! - [`CascadePlanner`] lists the objects a save must include
//! - [`RelationshipIntegrity`] composes all of the above behind one lock

pub mod error;
pub mod graph;
pub mod relationships;
pub mod integrity;
pub mod model;
pub mod persistence;

pub use error::*;
pub use graph::*;
pub use relationships::*;
pub use integrity::*;
pub use model::*;
pub use persistence::*;
