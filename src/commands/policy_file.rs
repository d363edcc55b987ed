use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use app_warden::config::{
    EXAMPLE_POLICY, from_engine_policy, load_policy_file, save_policy_file, to_engine_policy,
};
use app_warden::engine::PolicyEngine;

/// Write the example policy file for the user to edit
pub fn init(output: Option<PathBuf>, force: bool) -> Result<()> {
    let output_path = output.unwrap_or_else(|| PathBuf::from("app-warden-policy.yaml"));

    if output_path.exists() && !force {
        anyhow::bail!(
            "policy file already exists: {}\nUse --force to overwrite",
            output_path.display()
        );
    }

    std::fs::write(&output_path, EXAMPLE_POLICY)
        .with_context(|| format!("failed to write policy file: {}", output_path.display()))?;

    println!("✓ Created policy file: {}", output_path.display());
    println!("\nEdit this file, then apply it with:");
    println!("  app-warden policy import {}", output_path.display());

    Ok(())
}

/// Export the active restriction policy to a YAML file
pub fn export(engine: &PolicyEngine, path: &Path) -> Result<()> {
    let snapshot = engine.policy_snapshot();
    let file = from_engine_policy(&snapshot);
    save_policy_file(path, &file)?;

    println!("✓ Exported policy to: {}", path.display());
    println!("  Restricted apps: {}", file.restricted_apps.len());
    println!("  Groups: {}", file.groups.len());

    Ok(())
}

/// Import a YAML policy file, replacing restricted apps and groups
pub fn import(engine: &PolicyEngine, path: &Path) -> Result<()> {
    let file = load_policy_file(path)?;
    let (restricted, groups) = to_engine_policy(&file)?;

    let app_count = restricted.len();
    let group_count = groups.len();
    engine.import_policy(restricted, groups)?;

    println!("✓ Imported policy from: {}", path.display());
    println!("  Restricted apps: {app_count}");
    println!("  Groups: {group_count}");

    Ok(())
}
