use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::PolicyError;
use crate::schedule::Schedule;

/// A named, enable-able collection of apps bound to a daily schedule.
///
/// Groups are keyed by name. A disabled group never contributes to a block
/// decision but is retained for later re-enabling.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RestrictionGroup {
    pub name: String,
    pub members: BTreeSet<String>,
    pub schedule: Schedule,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// The complete restriction state: individually restricted apps, schedule
/// groups, and the temporary unlock expiry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PolicyState {
    /// Apps restricted around the clock
    #[serde(default)]
    pub restricted_apps: BTreeSet<String>,

    /// Schedule-bound restriction groups, in user-defined order
    #[serde(default)]
    pub groups: Vec<RestrictionGroup>,

    /// Epoch milliseconds until which every restriction is suspended
    #[serde(default)]
    pub unlock_expires_at_ms: i64,
}

impl PolicyState {
    /// Decide whether `app_id` is blocked at the given instant.
    ///
    /// Pure and side-effect free; the caller reads the clock once and passes
    /// both the epoch timestamp and the derived minute-of-day. Rules apply in
    /// strict order, first match wins:
    ///
    /// 1. the warden's own app is never blocked, regardless of stored state
    /// 2. an active temporary unlock suspends everything else
    /// 3. individually restricted apps are blocked
    /// 4. membership in an enabled group whose schedule is active blocks
    pub fn is_restricted(
        &self,
        own_app_id: &str,
        app_id: &str,
        now_ms: i64,
        minute_of_day: u16,
    ) -> Result<bool, PolicyError> {
        if app_id == own_app_id {
            return Ok(false);
        }

        if now_ms < self.unlock_expires_at_ms {
            return Ok(false);
        }

        if self.restricted_apps.contains(app_id) {
            return Ok(true);
        }

        for group in &self.groups {
            if group.enabled
                && group.members.contains(app_id)
                && group.schedule.is_active(minute_of_day)?
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Symmetric add/remove of an individual restriction.
    ///
    /// Returns whether the app is restricted afterwards. Toggling twice
    /// restores the original contents.
    pub fn toggle_restriction(&mut self, app_id: &str) -> bool {
        if self.restricted_apps.remove(app_id) {
            false
        } else {
            self.restricted_apps.insert(app_id.to_string());
            true
        }
    }

    /// Create a group; an existing name is an error, never an overwrite
    pub fn create_group(&mut self, group: RestrictionGroup) -> Result<(), PolicyError> {
        if self.find_group(&group.name).is_some() {
            return Err(PolicyError::DuplicateGroupName(group.name));
        }
        self.groups.push(group);
        Ok(())
    }

    /// Replace a group's members and schedule in place, keyed on name
    pub fn update_group(
        &mut self,
        name: &str,
        members: BTreeSet<String>,
        schedule: Schedule,
    ) -> Result<(), PolicyError> {
        let group = self
            .find_group_mut(name)
            .ok_or_else(|| PolicyError::GroupNotFound(name.to_string()))?;
        group.members = members;
        group.schedule = schedule;
        Ok(())
    }

    pub fn delete_group(&mut self, name: &str) -> Result<RestrictionGroup, PolicyError> {
        let pos = self
            .groups
            .iter()
            .position(|g| g.name == name)
            .ok_or_else(|| PolicyError::GroupNotFound(name.to_string()))?;
        Ok(self.groups.remove(pos))
    }

    pub fn set_group_enabled(&mut self, name: &str, enabled: bool) -> Result<(), PolicyError> {
        let group = self
            .find_group_mut(name)
            .ok_or_else(|| PolicyError::GroupNotFound(name.to_string()))?;
        group.enabled = enabled;
        Ok(())
    }

    /// Start a temporary unlock window of `duration_ms` from `now_ms`.
    ///
    /// Returns the new expiry. The engine enforces no upper bound; callers
    /// choose the grant length.
    pub fn set_temporary_override(
        &mut self,
        duration_ms: i64,
        now_ms: i64,
    ) -> Result<i64, PolicyError> {
        if duration_ms < 0 {
            return Err(PolicyError::invalid_time(format!(
                "negative unlock duration: {duration_ms}ms"
            )));
        }
        self.unlock_expires_at_ms = now_ms + duration_ms;
        Ok(self.unlock_expires_at_ms)
    }

    pub fn clear_override(&mut self) {
        self.unlock_expires_at_ms = 0;
    }

    /// Whether the temporary unlock is active at `now_ms`
    pub fn is_unlocked(&self, now_ms: i64) -> bool {
        now_ms < self.unlock_expires_at_ms
    }

    pub fn find_group(&self, name: &str) -> Option<&RestrictionGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn find_group_mut(&mut self, name: &str) -> Option<&mut RestrictionGroup> {
        self.groups.iter_mut().find(|g| g.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: &str = "app-warden";

    fn members(apps: &[&str]) -> BTreeSet<String> {
        apps.iter().map(|a| a.to_string()).collect()
    }

    fn school_hours_group() -> RestrictionGroup {
        RestrictionGroup {
            name: "School Hours".to_string(),
            members: members(&["com.game"]),
            schedule: Schedule::new(480, 900).unwrap(),
            enabled: true,
        }
    }

    #[test]
    fn test_unrestricted_app_is_not_blocked() {
        let state = PolicyState::default();
        assert!(!state.is_restricted(OWN, "com.game", 0, 500).unwrap());
    }

    #[test]
    fn test_individual_restriction_blocks() {
        let mut state = PolicyState::default();
        state.toggle_restriction("com.game");
        assert!(state.is_restricted(OWN, "com.game", 0, 500).unwrap());
        assert!(!state.is_restricted(OWN, "com.other", 0, 500).unwrap());
    }

    #[test]
    fn test_toggle_twice_is_involution() {
        let mut state = PolicyState::default();
        state.toggle_restriction("com.keep");
        let before = state.restricted_apps.clone();

        assert!(state.toggle_restriction("com.game"));
        assert!(!state.toggle_restriction("com.game"));
        assert_eq!(state.restricted_apps, before);
    }

    #[test]
    fn test_own_app_is_never_blocked() {
        let mut state = PolicyState::default();
        state.toggle_restriction(OWN);
        state
            .create_group(RestrictionGroup {
                name: "everything".to_string(),
                members: members(&[OWN]),
                schedule: Schedule::new(0, 0).unwrap(), // always active
                enabled: true,
            })
            .unwrap();

        assert!(!state.is_restricted(OWN, OWN, 0, 0).unwrap());
        assert!(!state.is_restricted(OWN, OWN, i64::MAX, 1439).unwrap());
    }

    #[test]
    fn test_override_suspends_individual_restriction() {
        let mut state = PolicyState::default();
        state.toggle_restriction("com.game");

        let expiry = state.set_temporary_override(300_000, 1_000_000).unwrap();
        assert_eq!(expiry, 1_300_000);

        assert!(!state.is_restricted(OWN, "com.game", 1_000_001, 500).unwrap());
        // Expired: restriction applies again
        assert!(state.is_restricted(OWN, "com.game", 1_300_000, 500).unwrap());
    }

    #[test]
    fn test_override_suspends_group_restriction() {
        let mut state = PolicyState::default();
        state.create_group(school_hours_group()).unwrap();

        state.set_temporary_override(5_000, 0).unwrap();
        assert!(!state.is_restricted(OWN, "com.game", 1_000, 500).unwrap());
        assert!(state.is_restricted(OWN, "com.game", 5_000, 500).unwrap());
    }

    #[test]
    fn test_clear_override_reinstates_restrictions() {
        let mut state = PolicyState::default();
        state.toggle_restriction("com.game");
        state.set_temporary_override(60_000, 0).unwrap();
        assert!(!state.is_restricted(OWN, "com.game", 100, 500).unwrap());

        state.clear_override();
        assert!(state.is_restricted(OWN, "com.game", 100, 500).unwrap());
    }

    #[test]
    fn test_negative_override_duration_is_rejected() {
        let mut state = PolicyState::default();
        let err = state.set_temporary_override(-1, 0).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidTimeValue(_)));
    }

    #[test]
    fn test_group_blocks_only_inside_schedule() {
        let mut state = PolicyState::default();
        state.create_group(school_hours_group()).unwrap();

        assert!(state.is_restricted(OWN, "com.game", 0, 500).unwrap()); // 08:20
        assert!(!state.is_restricted(OWN, "com.game", 0, 1000).unwrap()); // 16:40
        assert!(!state.is_restricted(OWN, "com.other", 0, 500).unwrap());
    }

    #[test]
    fn test_disabled_group_never_blocks() {
        let mut state = PolicyState::default();
        state.create_group(school_hours_group()).unwrap();
        state.set_group_enabled("School Hours", false).unwrap();

        assert!(!state.is_restricted(OWN, "com.game", 0, 500).unwrap());
        // Still present, just inert
        assert_eq!(state.groups.len(), 1);

        state.set_group_enabled("School Hours", true).unwrap();
        assert!(state.is_restricted(OWN, "com.game", 0, 500).unwrap());
    }

    #[test]
    fn test_create_duplicate_group_name_is_rejected() {
        let mut state = PolicyState::default();
        state.create_group(school_hours_group()).unwrap();

        let err = state.create_group(school_hours_group()).unwrap_err();
        assert!(matches!(err, PolicyError::DuplicateGroupName(name) if name == "School Hours"));
        assert_eq!(state.groups.len(), 1);
    }

    #[test]
    fn test_update_group_replaces_members_and_schedule() {
        let mut state = PolicyState::default();
        state.create_group(school_hours_group()).unwrap();

        state
            .update_group(
                "School Hours",
                members(&["com.game", "com.video"]),
                Schedule::new(540, 960).unwrap(),
            )
            .unwrap();

        let group = state.find_group("School Hours").unwrap();
        assert_eq!(group.members.len(), 2);
        assert_eq!(group.schedule.start_minute, 540);
        assert!(group.enabled);
    }

    #[test]
    fn test_unknown_group_operations_fail() {
        let mut state = PolicyState::default();

        assert!(matches!(
            state.set_group_enabled("ghost", true).unwrap_err(),
            PolicyError::GroupNotFound(_)
        ));
        assert!(matches!(
            state.delete_group("ghost").unwrap_err(),
            PolicyError::GroupNotFound(_)
        ));
        assert!(matches!(
            state
                .update_group("ghost", BTreeSet::new(), Schedule::new(0, 1).unwrap())
                .unwrap_err(),
            PolicyError::GroupNotFound(_)
        ));
    }

    #[test]
    fn test_delete_group_returns_removed_group() {
        let mut state = PolicyState::default();
        state.create_group(school_hours_group()).unwrap();

        let removed = state.delete_group("School Hours").unwrap();
        assert_eq!(removed.name, "School Hours");
        assert!(state.groups.is_empty());
        assert!(!state.is_restricted(OWN, "com.game", 0, 500).unwrap());
    }
}
