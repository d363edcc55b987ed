use chrono::{DateTime, TimeZone};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::PolicyError;
use crate::events::{
    BLOCK_HISTORY_CAPACITY, BlockEvent, BoundedLog, CapturedNotification, DetailedSession,
    NOTIFICATION_CAPACITY, SESSION_CAPACITY, suppress_repeat_block, suppress_repeat_notification,
};
use crate::policy::{PolicyState, RestrictionGroup};
use crate::schedule::{Schedule, minute_of_day};
use crate::store::{KeyValueStore, load_versioned, save_versioned};

const KEY_POLICY: &str = "policy";
const KEY_BLOCK_HISTORY: &str = "block_history";
const KEY_NOTIFICATIONS: &str = "captured_notifications";
const KEY_SESSIONS: &str = "detailed_sessions";

/// Session log statistics: protection coverage reconstructed on read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub count: usize,
    pub total_ms: i64,
}

/// Process-wide policy engine.
///
/// Constructed once per process and passed by handle to every caller.
/// Each logical collection sits behind its own lock: mutations to a
/// collection are serialized, readers never observe a half-applied change,
/// and a write to one collection never blocks readers of another. Every
/// mutation writes through to the storage adapter before returning.
///
/// The clock is read by the caller and passed in, so a single evaluation is
/// internally consistent even if wall time advances mid-call.
pub struct PolicyEngine {
    store: Arc<dyn KeyValueStore>,
    own_app_id: String,
    policy: Mutex<PolicyState>,
    blocks: Mutex<BoundedLog<BlockEvent>>,
    notifications: Mutex<BoundedLog<CapturedNotification>>,
    sessions: Mutex<BoundedLog<DetailedSession>>,
}

impl PolicyEngine {
    /// Load all collections from the store.
    ///
    /// A missing key bootstraps an empty collection; an unreadable store
    /// propagates as `PersistenceUnavailable` rather than silently erasing
    /// restriction state. `own_app_id` identifies the warden itself, which
    /// the evaluator excludes from every decision.
    pub fn open(
        store: Arc<dyn KeyValueStore>,
        own_app_id: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        let policy: PolicyState = load_versioned(store.as_ref(), KEY_POLICY)
            .map_err(|e| PolicyError::persistence(&e))?
            .unwrap_or_default();

        let blocks = load_log(store.as_ref(), KEY_BLOCK_HISTORY, BLOCK_HISTORY_CAPACITY)?;
        let notifications = load_log(store.as_ref(), KEY_NOTIFICATIONS, NOTIFICATION_CAPACITY)?;
        let sessions = load_log(store.as_ref(), KEY_SESSIONS, SESSION_CAPACITY)?;

        Ok(Self {
            store,
            own_app_id: own_app_id.into(),
            policy: Mutex::new(policy),
            blocks: Mutex::new(blocks),
            notifications: Mutex::new(notifications),
            sessions: Mutex::new(sessions),
        })
    }

    pub fn own_app_id(&self) -> &str {
        &self.own_app_id
    }

    // --- decision ---

    /// Whether `app_id` is blocked at the instant `now`
    pub fn is_restricted<Tz: TimeZone>(
        &self,
        app_id: &str,
        now: &DateTime<Tz>,
    ) -> Result<bool, PolicyError> {
        let now_ms = now.timestamp_millis();
        let minute = minute_of_day(now);
        self.lock_policy()
            .is_restricted(&self.own_app_id, app_id, now_ms, minute)
    }

    // --- temporary override ---

    /// Suspend all restrictions for `duration_ms` from `now_ms`; returns the
    /// new expiry timestamp
    pub fn set_temporary_override(
        &self,
        duration_ms: i64,
        now_ms: i64,
    ) -> Result<i64, PolicyError> {
        let mut policy = self.lock_policy();
        let expiry = policy.set_temporary_override(duration_ms, now_ms)?;
        self.persist_policy(&policy)?;
        info!("Granted temporary unlock for {}ms", duration_ms);
        Ok(expiry)
    }

    pub fn clear_override(&self) -> Result<(), PolicyError> {
        let mut policy = self.lock_policy();
        policy.clear_override();
        self.persist_policy(&policy)?;
        info!("Cleared temporary unlock");
        Ok(())
    }

    /// Epoch milliseconds until which restrictions are suspended (0 = none)
    pub fn override_expiry(&self) -> i64 {
        self.lock_policy().unlock_expires_at_ms
    }

    // --- individual restrictions ---

    /// Toggle an individual restriction; returns whether the app is
    /// restricted afterwards
    pub fn toggle_restriction(&self, app_id: &str) -> Result<bool, PolicyError> {
        let mut policy = self.lock_policy();
        let restricted = policy.toggle_restriction(app_id);
        self.persist_policy(&policy)?;
        info!(
            "{} is now {}",
            app_id,
            if restricted { "restricted" } else { "unrestricted" }
        );
        Ok(restricted)
    }

    pub fn list_restricted(&self) -> BTreeSet<String> {
        self.lock_policy().restricted_apps.clone()
    }

    // --- groups ---

    pub fn create_group(&self, group: RestrictionGroup) -> Result<(), PolicyError> {
        let mut policy = self.lock_policy();
        let name = group.name.clone();
        policy.create_group(group)?;
        self.persist_policy(&policy)?;
        info!("Created restriction group: {}", name);
        Ok(())
    }

    pub fn update_group(
        &self,
        name: &str,
        members: BTreeSet<String>,
        schedule: Schedule,
    ) -> Result<(), PolicyError> {
        let mut policy = self.lock_policy();
        policy.update_group(name, members, schedule)?;
        self.persist_policy(&policy)?;
        info!("Updated restriction group: {}", name);
        Ok(())
    }

    pub fn delete_group(&self, name: &str) -> Result<RestrictionGroup, PolicyError> {
        let mut policy = self.lock_policy();
        let removed = policy.delete_group(name)?;
        self.persist_policy(&policy)?;
        info!("Deleted restriction group: {}", name);
        Ok(removed)
    }

    pub fn set_group_enabled(&self, name: &str, enabled: bool) -> Result<(), PolicyError> {
        let mut policy = self.lock_policy();
        policy.set_group_enabled(name, enabled)?;
        self.persist_policy(&policy)?;
        info!(
            "{} restriction group: {}",
            if enabled { "Enabled" } else { "Disabled" },
            name
        );
        Ok(())
    }

    pub fn list_groups(&self) -> Vec<RestrictionGroup> {
        self.lock_policy().groups.clone()
    }

    /// Snapshot of the full restriction state, for export
    pub fn policy_snapshot(&self) -> PolicyState {
        self.lock_policy().clone()
    }

    /// Replace restricted apps and groups wholesale, keeping the current
    /// unlock expiry. Used by policy-file import.
    pub fn import_policy(
        &self,
        restricted_apps: BTreeSet<String>,
        groups: Vec<RestrictionGroup>,
    ) -> Result<(), PolicyError> {
        let mut seen = BTreeSet::new();
        for group in &groups {
            if !seen.insert(group.name.as_str()) {
                return Err(PolicyError::DuplicateGroupName(group.name.clone()));
            }
        }

        let mut policy = self.lock_policy();
        policy.restricted_apps = restricted_apps;
        policy.groups = groups;
        self.persist_policy(&policy)?;
        info!(
            "Imported policy: {} apps, {} groups",
            policy.restricted_apps.len(),
            policy.groups.len()
        );
        Ok(())
    }

    // --- block history ---

    /// Record a block, unless the same app was blocked less than a minute
    /// ago. Returns whether the event was kept.
    pub fn record_block_event(&self, app_id: &str, now_ms: i64) -> Result<bool, PolicyError> {
        let mut blocks = self.lock(&self.blocks);
        let recorded = blocks.append_if(
            BlockEvent {
                app_id: app_id.to_string(),
                timestamp_ms: now_ms,
            },
            suppress_repeat_block,
        );

        if recorded {
            self.persist_log(KEY_BLOCK_HISTORY, &blocks)?;
            info!("Recorded block of {}", app_id);
        } else {
            debug!("Suppressed repeat block of {}", app_id);
        }
        Ok(recorded)
    }

    pub fn list_block_history(&self) -> Vec<BlockEvent> {
        self.lock(&self.blocks).entries().to_vec()
    }

    pub fn clear_block_history(&self) -> Result<(), PolicyError> {
        let mut blocks = self.lock(&self.blocks);
        blocks.clear();
        self.persist_log(KEY_BLOCK_HISTORY, &blocks)?;
        info!("Cleared block history");
        Ok(())
    }

    // --- captured notifications ---

    /// Record an intercepted notification, unless identical to the
    /// immediately preceding one within the dedupe window
    pub fn record_notification(
        &self,
        app_id: &str,
        title: &str,
        content: &str,
        now_ms: i64,
    ) -> Result<bool, PolicyError> {
        let mut notifications = self.lock(&self.notifications);
        let recorded = notifications.append_if(
            CapturedNotification {
                app_id: app_id.to_string(),
                title: title.to_string(),
                content: content.to_string(),
                timestamp_ms: now_ms,
            },
            suppress_repeat_notification,
        );

        if recorded {
            self.persist_log(KEY_NOTIFICATIONS, &notifications)?;
            info!("Captured notification from {}", app_id);
        } else {
            debug!("Suppressed duplicate notification from {}", app_id);
        }
        Ok(recorded)
    }

    /// Captured notifications in chronological order; `limit` keeps only the
    /// most recent entries
    pub fn list_notifications(&self, limit: Option<usize>) -> Vec<CapturedNotification> {
        tail(self.lock(&self.notifications).entries(), limit)
    }

    pub fn clear_notifications(&self) -> Result<(), PolicyError> {
        let mut notifications = self.lock(&self.notifications);
        notifications.clear();
        self.persist_log(KEY_NOTIFICATIONS, &notifications)?;
        info!("Cleared captured notifications");
        Ok(())
    }

    // --- detailed sessions ---

    /// Record a protection coverage span; no dedupe, capacity-trimmed
    pub fn record_session(&self, start_ms: i64, end_ms: i64) -> Result<(), PolicyError> {
        let session = DetailedSession::new(start_ms, end_ms)?;
        let mut sessions = self.lock(&self.sessions);
        sessions.append(session);
        self.persist_log(KEY_SESSIONS, &sessions)?;
        debug!("Recorded session of {}ms", session.duration_ms());
        Ok(())
    }

    pub fn list_sessions(&self, limit: Option<usize>) -> Vec<DetailedSession> {
        tail(self.lock(&self.sessions).entries(), limit)
    }

    pub fn clear_sessions(&self) -> Result<(), PolicyError> {
        let mut sessions = self.lock(&self.sessions);
        sessions.clear();
        self.persist_log(KEY_SESSIONS, &sessions)?;
        info!("Cleared session log");
        Ok(())
    }

    /// Coverage statistics derived from the session log
    pub fn session_stats(&self) -> SessionStats {
        let sessions = self.lock(&self.sessions);
        SessionStats {
            count: sessions.len(),
            total_ms: sessions.entries().iter().map(|s| s.duration_ms()).sum(),
        }
    }

    // --- internals ---

    fn lock_policy(&self) -> MutexGuard<'_, PolicyState> {
        self.policy.lock().expect("policy lock poisoned")
    }

    fn lock<'a, T>(&self, log: &'a Mutex<BoundedLog<T>>) -> MutexGuard<'a, BoundedLog<T>> {
        log.lock().expect("log lock poisoned")
    }

    fn persist_policy(&self, policy: &PolicyState) -> Result<(), PolicyError> {
        save_versioned(self.store.as_ref(), KEY_POLICY, policy)
            .map_err(|e| PolicyError::persistence(&e))
    }

    fn persist_log<T: serde::Serialize>(
        &self,
        key: &str,
        log: &BoundedLog<T>,
    ) -> Result<(), PolicyError> {
        save_versioned(self.store.as_ref(), key, &log.entries())
            .map_err(|e| PolicyError::persistence(&e))
    }
}

fn load_log<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    capacity: usize,
) -> Result<BoundedLog<T>, PolicyError> {
    let entries: Vec<T> = load_versioned(store, key)
        .map_err(|e| PolicyError::persistence(&e))?
        .unwrap_or_default();
    Ok(BoundedLog::from_entries(entries, capacity))
}

fn tail<T: Clone>(entries: &[T], limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(n) => entries[entries.len().saturating_sub(n)..].to_vec(),
        None => entries.to_vec(),
    }
}
