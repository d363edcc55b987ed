use anyhow::Result;
use chrono::Local;

use crate::commands::restrict::format_timestamp;
use app_warden::engine::PolicyEngine;

/// Record a block event fed in by an external observer
pub fn record_block(engine: &PolicyEngine, app_id: &str) -> Result<()> {
    let now_ms = Local::now().timestamp_millis();

    if engine.record_block_event(app_id, now_ms)? {
        println!("✓ Recorded block of {app_id}");
    } else {
        println!("Repeat block of {app_id} suppressed (within dedupe window)");
    }

    Ok(())
}

/// Record a captured notification fed in by an external observer
pub fn record_notification(
    engine: &PolicyEngine,
    app_id: &str,
    title: &str,
    content: &str,
) -> Result<()> {
    let now_ms = Local::now().timestamp_millis();

    if engine.record_notification(app_id, title, content, now_ms)? {
        println!("✓ Captured notification from {app_id}");
    } else {
        println!("Duplicate notification from {app_id} suppressed");
    }

    Ok(())
}

/// Record a protection coverage span
pub fn record_session(engine: &PolicyEngine, start_ms: i64, end_ms: i64) -> Result<()> {
    engine.record_session(start_ms, end_ms)?;
    let duration_secs = (end_ms - start_ms) / 1000;
    println!("✓ Recorded session of {}m {}s", duration_secs / 60, duration_secs % 60);
    Ok(())
}

/// Show block history, most recent first
pub fn blocks(engine: &PolicyEngine, limit: Option<usize>) -> Result<()> {
    let mut events = engine.list_block_history();
    events.reverse();
    if let Some(n) = limit {
        events.truncate(n);
    }

    if events.is_empty() {
        println!("No blocks recorded");
        return Ok(());
    }

    println!("Block history ({} shown):", events.len());
    for event in &events {
        println!("  {}  {}", format_timestamp(event.timestamp_ms), event.app_id);
    }

    Ok(())
}

pub fn clear_blocks(engine: &PolicyEngine) -> Result<()> {
    engine.clear_block_history()?;
    println!("✓ Block history cleared");
    Ok(())
}

/// Show captured notifications, most recent first
pub fn notifications(engine: &PolicyEngine, limit: Option<usize>) -> Result<()> {
    let mut captured = engine.list_notifications(None);
    captured.reverse();
    if let Some(n) = limit {
        captured.truncate(n);
    }

    if captured.is_empty() {
        println!("No notifications captured");
        return Ok(());
    }

    println!("Captured notifications ({} shown):", captured.len());
    for notification in &captured {
        println!(
            "  {}  {}",
            format_timestamp(notification.timestamp_ms),
            notification.app_id
        );
        println!("    {}: {}", notification.title, notification.content);
    }

    Ok(())
}

pub fn clear_notifications(engine: &PolicyEngine) -> Result<()> {
    engine.clear_notifications()?;
    println!("✓ Captured notifications cleared");
    Ok(())
}

/// Show recorded sessions, most recent first
pub fn sessions(engine: &PolicyEngine, limit: Option<usize>) -> Result<()> {
    let mut recorded = engine.list_sessions(None);
    recorded.reverse();
    if let Some(n) = limit {
        recorded.truncate(n);
    }

    if recorded.is_empty() {
        println!("No sessions recorded");
        return Ok(());
    }

    println!("Sessions ({} shown):", recorded.len());
    for session in &recorded {
        let duration_secs = session.duration_ms() / 1000;
        println!(
            "  {} -> {}  ({}m {}s)",
            format_timestamp(session.start_ms),
            format_timestamp(session.end_ms),
            duration_secs / 60,
            duration_secs % 60
        );
    }

    Ok(())
}

/// Show coverage totals derived from the session log
pub fn session_stats(engine: &PolicyEngine) -> Result<()> {
    let stats = engine.session_stats();
    let total_secs = stats.total_ms / 1000;

    println!("Protection coverage:");
    println!("  Sessions: {}", stats.count);
    println!(
        "  Total time: {}h {}m {}s",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    );

    Ok(())
}

pub fn clear_sessions(engine: &PolicyEngine) -> Result<()> {
    engine.clear_sessions()?;
    println!("✓ Session log cleared");
    Ok(())
}
