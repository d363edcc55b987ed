use anyhow::{Context, Result};
use std::collections::BTreeSet;

use app_warden::engine::PolicyEngine;
use app_warden::policy::RestrictionGroup;
use app_warden::schedule::Schedule;

/// Create a restriction group from CLI arguments
pub fn create(
    engine: &PolicyEngine,
    name: String,
    members: Option<String>,
    start: &str,
    end: &str,
) -> Result<()> {
    let schedule = Schedule::parse(start, end).context("invalid schedule")?;
    let members = parse_members(members);
    let member_count = members.len();

    engine.create_group(RestrictionGroup {
        name: name.clone(),
        members,
        schedule,
        enabled: true,
    })?;

    println!("✓ Created group: {name}");
    println!("  Window: {}", schedule.display());
    println!("  Members: {member_count}");

    Ok(())
}

/// Replace a group's members and schedule
pub fn update(
    engine: &PolicyEngine,
    name: &str,
    members: Option<String>,
    start: &str,
    end: &str,
) -> Result<()> {
    let schedule = Schedule::parse(start, end).context("invalid schedule")?;
    engine.update_group(name, parse_members(members), schedule)?;

    println!("✓ Updated group: {name}");
    println!("  Window: {}", schedule.display());

    Ok(())
}

pub fn delete(engine: &PolicyEngine, name: &str) -> Result<()> {
    let removed = engine.delete_group(name)?;
    println!("✓ Deleted group: {} ({} members)", removed.name, removed.members.len());
    Ok(())
}

pub fn set_enabled(engine: &PolicyEngine, name: &str, enabled: bool) -> Result<()> {
    engine.set_group_enabled(name, enabled)?;
    println!(
        "✓ Group '{name}' {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

pub fn list(engine: &PolicyEngine) -> Result<()> {
    let groups = engine.list_groups();

    if groups.is_empty() {
        println!("No restriction groups configured");
        return Ok(());
    }

    println!("Restriction groups:");
    for group in &groups {
        let status = if group.enabled { "enabled" } else { "disabled" };
        println!("  {} ({status})", group.name);
        if group.schedule.wraps_midnight() {
            println!("    Window: {} (wraps midnight)", group.schedule.display());
        } else {
            println!("    Window: {}", group.schedule.display());
        }
        for member in &group.members {
            println!("    - {member}");
        }
    }

    Ok(())
}

fn parse_members(members: Option<String>) -> BTreeSet<String> {
    members
        .map(|s| {
            s.split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_members_splits_and_trims() {
        let members = parse_members(Some("com.a, com.b ,com.c".to_string()));
        assert_eq!(members.len(), 3);
        assert!(members.contains("com.b"));
    }

    #[test]
    fn test_parse_members_handles_empty_input() {
        assert!(parse_members(None).is_empty());
        assert!(parse_members(Some(" , ".to_string())).is_empty());
    }
}
