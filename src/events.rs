use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Block history keeps the most recent 500 events.
pub const BLOCK_HISTORY_CAPACITY: usize = 500;

/// Captured notifications keep the most recent 200 entries.
pub const NOTIFICATION_CAPACITY: usize = 200;

/// Detailed sessions keep the most recent 1000 records.
pub const SESSION_CAPACITY: usize = 1000;

/// Repeat blocks of the same app within this window collapse to one entry.
pub const BLOCK_DEDUPE_WINDOW_MS: i64 = 60_000;

/// Identical back-to-back notifications within this window collapse to one entry.
pub const NOTIFICATION_DEDUPE_WINDOW_MS: i64 = 3_000;

/// A single recorded block of a restricted application
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockEvent {
    pub app_id: String,
    pub timestamp_ms: i64,
}

/// A notification intercepted from a restricted application
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CapturedNotification {
    pub app_id: String,
    pub title: String,
    pub content: String,
    pub timestamp_ms: i64,
}

/// One contiguous span of protection coverage.
///
/// Duration is always derived from the endpoints, never stored alongside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DetailedSession {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl DetailedSession {
    pub fn new(start_ms: i64, end_ms: i64) -> Result<Self, PolicyError> {
        if end_ms < start_ms {
            return Err(PolicyError::invalid_time(format!(
                "session ends before it starts ({end_ms} < {start_ms})"
            )));
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// An append-only sequence capped at a fixed capacity.
///
/// Entries are never mutated after insertion; when the cap is exceeded the
/// oldest entries are dropped first. Suppression of a candidate is decided by
/// the caller's predicate, which sees the full current contents.
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    entries: Vec<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Rebuild a log from persisted entries, trimming to capacity
    pub fn from_entries(entries: Vec<T>, capacity: usize) -> Self {
        let mut log = Self { entries, capacity };
        log.trim();
        log
    }

    /// Append unconditionally, then trim to capacity
    pub fn append(&mut self, entry: T) {
        self.entries.push(entry);
        self.trim();
    }

    /// Append unless the predicate suppresses the candidate.
    ///
    /// Returns `true` when the entry was recorded. A suppressed candidate is
    /// discarded silently; suppression is policy, not failure.
    pub fn append_if<F>(&mut self, entry: T, suppress: F) -> bool
    where
        F: FnOnce(&T, &[T]) -> bool,
    {
        if !self.entries.is_empty() && suppress(&entry, &self.entries) {
            return false;
        }
        self.append(entry);
        true
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn trim(&mut self) {
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
    }
}

/// Suppress a block of the same app recorded less than a minute ago.
///
/// The comparison is against the most recent event *for that app*, not the
/// tail of the log, so interleaved blocks of other apps never reset the clock.
pub fn suppress_repeat_block(candidate: &BlockEvent, entries: &[BlockEvent]) -> bool {
    entries
        .iter()
        .rev()
        .find(|event| event.app_id == candidate.app_id)
        .is_some_and(|last| candidate.timestamp_ms - last.timestamp_ms < BLOCK_DEDUPE_WINDOW_MS)
}

/// Suppress a notification identical to the immediately preceding one.
pub fn suppress_repeat_notification(
    candidate: &CapturedNotification,
    entries: &[CapturedNotification],
) -> bool {
    entries.last().is_some_and(|last| {
        last.app_id == candidate.app_id
            && last.title == candidate.title
            && last.content == candidate.content
            && candidate.timestamp_ms - last.timestamp_ms < NOTIFICATION_DEDUPE_WINDOW_MS
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(app: &str, ts: i64) -> BlockEvent {
        BlockEvent {
            app_id: app.to_string(),
            timestamp_ms: ts,
        }
    }

    fn notification(app: &str, title: &str, content: &str, ts: i64) -> CapturedNotification {
        CapturedNotification {
            app_id: app.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            timestamp_ms: ts,
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let mut log = BoundedLog::new(10);
        for i in 0..5 {
            log.append(i);
        }
        assert_eq!(log.entries(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_overflow_drops_oldest_first() {
        let mut log = BoundedLog::new(3);
        for i in 0..7 {
            log.append(i);
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.entries(), &[4, 5, 6]);
    }

    #[test]
    fn test_from_entries_trims_to_capacity() {
        let log = BoundedLog::from_entries((0..10).collect(), 4);
        assert_eq!(log.entries(), &[6, 7, 8, 9]);
    }

    #[test]
    fn test_block_history_caps_at_capacity() {
        let mut log = BoundedLog::new(BLOCK_HISTORY_CAPACITY);

        // Distinct apps, so nothing is suppressed
        for i in 0..BLOCK_HISTORY_CAPACITY + 20 {
            log.append_if(
                block(&format!("com.app{i}"), i as i64 * 100_000),
                suppress_repeat_block,
            );
        }

        assert_eq!(log.len(), BLOCK_HISTORY_CAPACITY);
        assert_eq!(log.entries()[0].app_id, "com.app20");
        assert_eq!(
            log.entries()[BLOCK_HISTORY_CAPACITY - 1].app_id,
            format!("com.app{}", BLOCK_HISTORY_CAPACITY + 19)
        );
    }

    #[test]
    fn test_suppression_skipped_on_empty_log() {
        let mut log = BoundedLog::new(5);
        let recorded = log.append_if(1, |_, _| panic!("predicate must not run on empty log"));
        assert!(recorded);
    }

    #[test]
    fn test_block_dedupe_collapses_rapid_repeats() {
        let mut log = BoundedLog::new(BLOCK_HISTORY_CAPACITY);

        assert!(log.append_if(block("com.a", 0), suppress_repeat_block));
        // 10 seconds later: suppressed
        assert!(!log.append_if(block("com.a", 10_000), suppress_repeat_block));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_block_dedupe_expires_after_window() {
        let mut log = BoundedLog::new(BLOCK_HISTORY_CAPACITY);

        assert!(log.append_if(block("com.a", 0), suppress_repeat_block));
        assert!(!log.append_if(block("com.a", 10_000), suppress_repeat_block));
        // 61 seconds after the last *recorded* event: kept
        assert!(log.append_if(block("com.a", 61_000), suppress_repeat_block));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_block_dedupe_is_per_app() {
        let mut log = BoundedLog::new(BLOCK_HISTORY_CAPACITY);

        assert!(log.append_if(block("com.a", 0), suppress_repeat_block));
        // A different app interleaved between com.a events is never suppressed
        // by com.a's timer
        assert!(log.append_if(block("com.b", 5_000), suppress_repeat_block));
        // com.a is still inside its own window even though com.b is the tail
        assert!(!log.append_if(block("com.a", 20_000), suppress_repeat_block));
        assert!(log.append_if(block("com.a", 65_000), suppress_repeat_block));

        let apps: Vec<&str> = log.entries().iter().map(|e| e.app_id.as_str()).collect();
        assert_eq!(apps, vec!["com.a", "com.b", "com.a"]);
    }

    #[test]
    fn test_notification_dedupe_requires_identical_tail() {
        let mut log = BoundedLog::new(NOTIFICATION_CAPACITY);

        assert!(log.append_if(
            notification("com.chat", "Alice", "hi", 0),
            suppress_repeat_notification,
        ));
        // Identical and 1s later: suppressed
        assert!(!log.append_if(
            notification("com.chat", "Alice", "hi", 1_000),
            suppress_repeat_notification,
        ));
        // Different content: kept
        assert!(log.append_if(
            notification("com.chat", "Alice", "hi again", 1_500),
            suppress_repeat_notification,
        ));
        // Same as the first entry, but the tail no longer matches: kept
        assert!(log.append_if(
            notification("com.chat", "Alice", "hi", 2_000),
            suppress_repeat_notification,
        ));
    }

    #[test]
    fn test_notification_dedupe_expires_after_window() {
        let mut log = BoundedLog::new(NOTIFICATION_CAPACITY);

        assert!(log.append_if(
            notification("com.chat", "Alice", "hi", 0),
            suppress_repeat_notification,
        ));
        assert!(log.append_if(
            notification("com.chat", "Alice", "hi", 3_000),
            suppress_repeat_notification,
        ));
    }

    #[test]
    fn test_session_duration_is_derived() {
        let session = DetailedSession::new(1_000, 61_000).unwrap();
        assert_eq!(session.duration_ms(), 60_000);
    }

    #[test]
    fn test_session_rejects_negative_duration() {
        let err = DetailedSession::new(5_000, 4_999).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidTimeValue(_)));
    }

    #[test]
    fn test_session_log_has_no_dedupe() {
        let mut log = BoundedLog::new(SESSION_CAPACITY);
        let session = DetailedSession::new(0, 10).unwrap();
        log.append(session);
        log.append(session);
        assert_eq!(log.len(), 2);
    }
}
