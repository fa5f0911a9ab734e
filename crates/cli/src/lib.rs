//! # kindred: family example and command line front end
//!
//! The family classes, an in-memory storage backend, and the commands the
//! `kindred` binary dispatches to.

pub mod commands;
pub mod family;
pub mod store;

pub use family::{family_registry, populate, Address, Family, Household, Parent, Person};
pub use store::{execute_plan, MemoryStore, StoredRecord};
