use anyhow::Result;
use kindred_orm::{Entity, IntegrityError, RelationshipIntegrity};
use serde_json::json;

use crate::family::{family_registry, populate, Parent};
use crate::store::{execute_plan, MemoryStore};

/// Outcome of one demo run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    pub planned: usize,
    pub written: usize,
    pub duplicate_key_rejected: bool,
    pub symmetric: bool,
}

/// Populate a family, exercise the integrity rules and persist the first parent
pub async fn scenario(logical_children: bool, store: &MemoryStore) -> Result<DemoReport> {
    let integrity = RelationshipIntegrity::new(family_registry(logical_children)?);
    let family = populate(&integrity, 2)?;
    let (ada, william) = &family.parents;

    println!("Household {}", family.household.id());
    for member in family.household.members()? {
        let spouse = member.spouse()?.map(|s| s.id().to_string()).unwrap_or_default();
        println!("  member {} spouse {}", member.id(), spouse);
    }
    for child in ada.children()? {
        let parent = child.parent()?.map(|p| p.id().to_string()).unwrap_or_default();
        println!("  child {} parent {}", child.id(), parent);
    }
    println!(
        "  address zip {} (postal_code {})",
        family.address.value("zip")?.unwrap_or_default(),
        family.address.value("postal_code")?.unwrap_or_default()
    );

    let impostor = Parent::create(&integrity)?;
    let duplicate_key_rejected = match impostor.set_relationship("ssn", json!("078-05-1120")) {
        Err(IntegrityError::DuplicateSecondaryKey { holder, .. }) => {
            println!("  rejected duplicate ssn already held by {}", holder);
            true
        }
        Err(err) => return Err(err.into()),
        Ok(_) => false,
    };
    impostor.discard()?;

    let plan = ada.prepare_save()?;
    println!("Saving {} cascades to {} object(s)", ada.id(), plan.len());
    let written = execute_plan(&integrity, &plan, store).await?;
    println!("Stored {} object(s); {} spouse left to its own save", written, william.id());

    Ok(DemoReport {
        planned: plan.len(),
        written,
        duplicate_key_rejected,
        symmetric: integrity.asymmetric_edges()?.is_empty(),
    })
}

pub async fn run(logical_children: bool) -> Result<()> {
    let store = MemoryStore::new();
    let report = scenario(logical_children, &store).await?;
    tracing::info!(
        target: "kindred::demo",
        "demo finished: {} planned, {} written",
        report.planned,
        report.written
    );
    Ok(())
}
