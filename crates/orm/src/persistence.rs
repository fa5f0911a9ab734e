//! Persistence seam - What the engine hands to storage
//!
//! The engine never writes anything itself. A save is a
//! [`SavePlan`](crate::relationships::SavePlan) computed by the facade; a
//! storage backend implements [`Persistor`] and receives one
//! [`ObjectSnapshot`] per planned object, in plan order.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::IntegrityError;
use crate::graph::ObjectSnapshot;

/// Storage-side failures
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

impl PersistError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Storage backend receiving planned objects
#[async_trait]
pub trait Persistor: Send + Sync {
    async fn persist(&self, snapshot: &ObjectSnapshot) -> PersistResult<()>;
}
