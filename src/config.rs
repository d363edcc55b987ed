use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::policy::{PolicyState, RestrictionGroup};
use crate::schedule::Schedule;

/// Human-editable snapshot of the restriction policy.
///
/// This is the import/export format, not the stored state: schedule times are
/// clock strings so the file stays hand-editable.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyFile {
    /// Apps restricted around the clock
    #[serde(default)]
    pub restricted_apps: Vec<String>,

    /// Schedule-bound restriction groups
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
}

/// One group in the policy file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupEntry {
    pub name: String,

    #[serde(default)]
    pub members: Vec<String>,

    /// Window start, `HH:MM`
    pub start: String,

    /// Window end, `HH:MM`; at or before `start` the window wraps midnight
    pub end: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Load and validate a policy file
pub fn load_policy_file(path: &Path) -> Result<PolicyFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file: {}", path.display()))?;

    let file: PolicyFile = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse policy file: {}", path.display()))?;

    validate_policy_file(&file)?;

    Ok(file)
}

/// Save a policy file as YAML
pub fn save_policy_file(path: &Path, file: &PolicyFile) -> Result<()> {
    validate_policy_file(file)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    let content = serde_yaml::to_string(file).context("failed to serialize policy file")?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write policy file: {}", path.display()))?;

    Ok(())
}

/// Validate a policy file
pub fn validate_policy_file(file: &PolicyFile) -> Result<()> {
    let mut names = HashSet::new();
    for group in &file.groups {
        if group.name.is_empty() {
            anyhow::bail!("group name cannot be empty");
        }
        if !names.insert(&group.name) {
            anyhow::bail!("duplicate group name: {}", group.name);
        }

        Schedule::parse(&group.start, &group.end)
            .with_context(|| format!("invalid schedule in group '{}'", group.name))?;
    }

    Ok(())
}

/// Convert a policy file into engine state
pub fn to_engine_policy(file: &PolicyFile) -> Result<(BTreeSet<String>, Vec<RestrictionGroup>)> {
    let restricted: BTreeSet<String> = file.restricted_apps.iter().cloned().collect();

    let groups = file
        .groups
        .iter()
        .map(|entry| {
            let schedule = Schedule::parse(&entry.start, &entry.end)
                .with_context(|| format!("invalid schedule in group '{}'", entry.name))?;
            Ok(RestrictionGroup {
                name: entry.name.clone(),
                members: entry.members.iter().cloned().collect(),
                schedule,
                enabled: entry.enabled,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((restricted, groups))
}

/// Convert engine state into the export format
pub fn from_engine_policy(state: &PolicyState) -> PolicyFile {
    PolicyFile {
        restricted_apps: state.restricted_apps.iter().cloned().collect(),
        groups: state
            .groups
            .iter()
            .map(|group| GroupEntry {
                name: group.name.clone(),
                members: group.members.iter().cloned().collect(),
                start: clock_string(group.schedule.start_minute),
                end: clock_string(group.schedule.end_minute),
                enabled: group.enabled,
            })
            .collect(),
    }
}

fn clock_string(minute_of_day: u16) -> String {
    format!("{:02}:{:02}", minute_of_day / 60, minute_of_day % 60)
}

/// Example policy file content
pub const EXAMPLE_POLICY: &str = include_str!("../example-policy.yaml");
