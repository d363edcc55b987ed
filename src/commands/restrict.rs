use anyhow::Result;
use chrono::Local;

use app_warden::engine::PolicyEngine;

/// Evaluate whether an app is blocked right now
pub fn check(engine: &PolicyEngine, app_id: &str) -> Result<()> {
    let now = Local::now();
    let restricted = engine.is_restricted(app_id, &now)?;

    if restricted {
        println!("✗ {app_id} is BLOCKED");
    } else {
        println!("✓ {app_id} is allowed");
    }

    Ok(())
}

/// Toggle an individual restriction on or off
pub fn toggle(engine: &PolicyEngine, app_id: &str) -> Result<()> {
    let restricted = engine.toggle_restriction(app_id)?;

    if restricted {
        println!("✓ {app_id} is now restricted");
    } else {
        println!("✓ {app_id} is no longer restricted");
    }

    Ok(())
}

/// List individually restricted apps
pub fn list(engine: &PolicyEngine) -> Result<()> {
    let apps = engine.list_restricted();

    if apps.is_empty() {
        println!("No individually restricted apps");
        return Ok(());
    }

    println!("Individually restricted apps:");
    for app in &apps {
        println!("  - {app}");
    }

    Ok(())
}

/// Grant a temporary unlock
pub fn unlock_grant(engine: &PolicyEngine, minutes: u32) -> Result<()> {
    let now = Local::now();
    let duration_ms = i64::from(minutes) * 60_000;
    let expiry = engine.set_temporary_override(duration_ms, now.timestamp_millis())?;

    println!("✓ All restrictions suspended for {minutes} minutes");
    println!("  Expires at: {}", format_timestamp(expiry));

    Ok(())
}

/// Clear the temporary unlock
pub fn unlock_clear(engine: &PolicyEngine) -> Result<()> {
    engine.clear_override()?;
    println!("✓ Temporary unlock cleared; restrictions apply again");
    Ok(())
}

/// Show remaining unlock time
pub fn unlock_status(engine: &PolicyEngine) -> Result<()> {
    let now_ms = Local::now().timestamp_millis();
    let expiry = engine.override_expiry();

    if now_ms < expiry {
        let remaining_secs = (expiry - now_ms) / 1000;
        println!("Unlocked for another {}m {}s", remaining_secs / 60, remaining_secs % 60);
        println!("Expires at: {}", format_timestamp(expiry));
    } else {
        println!("No temporary unlock active");
    }

    Ok(())
}

/// Render an epoch-milliseconds timestamp in local time
pub fn format_timestamp(epoch_ms: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(epoch_ms) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => format!("@{epoch_ms}ms"),
    }
}
