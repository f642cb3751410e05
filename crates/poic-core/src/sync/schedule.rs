//! Sync trigger scheduling
//!
//! A pure debounce policy: "run a sync in N ms unless one is already
//! scheduled; coalesce". Callers feed it timestamps and poll for due
//! deadlines; no timers or UI framework involved.

/// Debounce-coalescing trigger policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncScheduler {
    debounce_ms: i64,
    due_at: Option<i64>,
}

impl SyncScheduler {
    #[must_use]
    pub const fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms: debounce_ms as i64,
            due_at: None,
        }
    }

    /// Ask for a sync. Arms a deadline `debounce_ms` from now unless one
    /// is already armed; a burst of edits collapses into one run.
    pub fn request(&mut self, now_ms: i64) {
        if self.due_at.is_none() {
            self.due_at = Some(now_ms + self.debounce_ms);
        }
    }

    /// Whether a run is scheduled.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.due_at.is_some()
    }

    /// Take a due deadline, if any. Returns `true` at most once per
    /// armed request.
    pub fn fire_due(&mut self, now_ms: i64) -> bool {
        match self.due_at {
            Some(due) if due <= now_ms => {
                self.due_at = None;
                true
            }
            _ => false,
        }
    }
}
