//! Relationships Module - Descriptor table, key index, inverse maintenance and save cascades

pub mod metadata;
pub mod registry;
pub mod keys;
pub mod inverse;
pub mod cascade;

// Re-export metadata system types
pub use metadata::*;
pub use registry::*;

// Re-export integrity components
pub use keys::*;
pub use inverse::*;
pub use cascade::*;
