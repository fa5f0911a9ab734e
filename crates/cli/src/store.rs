//! In-memory storage backend and save plan execution

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kindred_orm::{ObjectId, ObjectSnapshot, PersistError, PersistResult, Persistor, RelationshipIntegrity, SavePlan};
use serde::Serialize;

/// Last persisted state of one object
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub snapshot: ObjectSnapshot,
    pub saved_at: DateTime<Utc>,
    /// Number of times this object has been written
    pub saves: u32,
}

/// Concurrent map of persisted snapshots
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<ObjectId, StoredRecord>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects every write
    pub fn read_only() -> Self {
        Self {
            records: DashMap::new(),
            read_only: true,
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<StoredRecord> {
        self.records.get(&id).map(|record| record.clone())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Persistor for MemoryStore {
    async fn persist(&self, snapshot: &ObjectSnapshot) -> PersistResult<()> {
        if self.read_only {
            return Err(PersistError::storage(format!("store is read-only, cannot write {}", snapshot.id)));
        }
        let now = Utc::now();
        self.records
            .entry(snapshot.id)
            .and_modify(|record| {
                record.snapshot = snapshot.clone();
                record.saved_at = now;
                record.saves += 1;
            })
            .or_insert_with(|| StoredRecord {
                snapshot: snapshot.clone(),
                saved_at: now,
                saves: 1,
            });
        tracing::debug!(target: "kindred::store", "stored {} {}", snapshot.class, snapshot.id);
        Ok(())
    }
}

/// Persist every object of `plan` in order; stops at the first failure
///
/// Snapshots are taken one at a time, so no graph lock is held across an await.
pub async fn execute_plan<P>(integrity: &RelationshipIntegrity, plan: &SavePlan, persistor: &P) -> PersistResult<usize>
where
    P: Persistor + ?Sized,
{
    let mut written = 0;
    for entry in plan {
        let snapshot = integrity.snapshot(entry.object)?;
        persistor.persist(&snapshot).await?;
        written += 1;
    }
    tracing::info!(target: "kindred::store", "persisted {} of {} planned object(s)", written, plan.len());
    Ok(written)
}
