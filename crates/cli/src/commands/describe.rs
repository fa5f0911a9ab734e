use anyhow::Result;
use kindred_orm::{Cardinality, ClassDescriptor, PropertyDescriptor, PropertyKind, Registry};

use crate::family::family_registry;

pub async fn run(class: Option<&str>, json: bool, logical_children: bool) -> Result<()> {
    let registry = family_registry(logical_children)?;
    let classes: Vec<&ClassDescriptor> = match class {
        Some(name) => vec![registry.class(name)?],
        None => registry
            .class_names()
            .into_iter()
            .map(|name| registry.class(name))
            .collect::<Result<_, _>>()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&classes)?);
        return Ok(());
    }

    for line in render(&registry, &classes) {
        println!("{}", line);
    }
    Ok(())
}

fn render(registry: &Registry, classes: &[&ClassDescriptor]) -> Vec<String> {
    let mut lines = Vec::new();
    for class in classes {
        lines.push(class.name().to_string());
        for property in class.properties() {
            lines.push(format!("  {:<12} {}", property.name, summarize(property)));
        }
        let owners = registry.logical_owners_of(class.name());
        if !owners.is_empty() {
            let owners: Vec<String> = owners
                .into_iter()
                .map(|(owner, property)| format!("{}.{}", owner, property))
                .collect();
            lines.push(format!("  saved with {}", owners.join(", ")));
        }
    }
    let stats = registry.stats();
    lines.push(format!(
        "{} classes, {} properties, {} relationships, {} secondary keys, {} aliases",
        stats.total_classes, stats.total_properties, stats.relationships, stats.secondary_keys, stats.aliases
    ));
    lines
}

fn summarize(property: &PropertyDescriptor) -> String {
    if let Some(canonical) = &property.alias_of {
        return format!("alias of {}", canonical);
    }
    let mut parts = vec![match property.kind {
        PropertyKind::Plain => "plain".to_string(),
        PropertyKind::SecondaryKey => "secondary key".to_string(),
        PropertyKind::Dependent if property.cascade_logical => "dependent (logical)".to_string(),
        PropertyKind::Dependent => "dependent (physical)".to_string(),
        PropertyKind::IndependentInverse => "reference".to_string(),
    }];
    if let Some(target) = &property.target_class {
        let arity = match property.cardinality {
            Cardinality::One => "",
            Cardinality::Many => "many ",
        };
        parts.push(format!("-> {}{}", arity, target));
    }
    if let Some(inverse) = &property.inverse_name {
        parts.push(format!("inverse {}", inverse));
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summaries() {
        let registry = family_registry(true).unwrap();
        assert_eq!(summarize(registry.describe("Address", "zip").unwrap()), "alias of postal_code");
        assert_eq!(
            summarize(registry.describe("Parent", "children").unwrap()),
            "dependent (logical), -> many Person, inverse parent"
        );
        assert_eq!(
            summarize(registry.describe("Parent", "spouse").unwrap()),
            "reference, -> Parent, inverse spouse"
        );
    }

    #[test]
    fn test_render_lists_logical_owners() {
        let registry = family_registry(true).unwrap();
        let person = registry.class("Person").unwrap();
        let lines = render(&registry, &[person]);
        assert!(lines.contains(&"  saved with Parent.children".to_string()));

        let registry = family_registry(false).unwrap();
        let person = registry.class("Person").unwrap();
        let lines = render(&registry, &[person]);
        assert!(!lines.iter().any(|line| line.contains("Parent.children")));
    }

    #[tokio::test]
    async fn test_run_both_configurations() {
        run(None, false, true).await.unwrap();
        run(None, false, false).await.unwrap();
        run(Some("Person"), true, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_class_fails() {
        assert!(run(Some("Pet"), false, true).await.is_err());
    }
}
