use anyhow::Result;
use kindred_orm::{Entity, RelationshipIntegrity, SavePlan};

use crate::family::{family_registry, populate};

/// Save plan of the first parent of a freshly populated family
pub fn build(children: usize, logical_children: bool) -> Result<(RelationshipIntegrity, SavePlan)> {
    let integrity = RelationshipIntegrity::new(family_registry(logical_children)?);
    let family = populate(&integrity, children)?;
    let plan = family.parents.0.prepare_save()?;
    Ok((integrity, plan))
}

pub async fn run(children: usize, logical_children: bool, json: bool) -> Result<()> {
    let (integrity, plan) = build(children, logical_children)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    for line in render(&integrity, &plan)? {
        println!("{}", line);
    }
    Ok(())
}

/// Text lines of a save plan, indented by depth
///
/// Classes without a `name` attribute are listed by id alone.
fn render(integrity: &RelationshipIntegrity, plan: &SavePlan) -> Result<Vec<String>> {
    let mut lines = vec![format!("Save plan ({} object(s)):", plan.len())];
    for entry in plan {
        let via = match &entry.via {
            Some((owner, property)) => format!(" via {}.{}", owner, property),
            None => String::new(),
        };
        let snapshot = integrity.snapshot(entry.object)?;
        let name = snapshot
            .values
            .get("name")
            .and_then(|v| v.as_str())
            .map(|name| format!(" {}", name))
            .unwrap_or_default();
        lines.push(format!(
            "{}{} {}{}{}",
            "  ".repeat(entry.depth + 1),
            entry.class,
            entry.object,
            name,
            via
        ));
    }
    Ok(lines)
}
