//! Caller-driven debouncing.
//!
//! The host owns the real timers; these objects only remember a single
//! pending deadline. `request` cancels and reschedules, `poll` fires at most
//! once per burst. Nothing here depends on event-loop ordering beyond
//! callbacks running to completion.

use std::cell::Cell;
use std::rc::Rc;

pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay_ms: u64,
    due_at: Option<u64>,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            due_at: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Push the deadline out to `now + delay`.
    pub fn request(&mut self, now_ms: u64) {
        self.due_at = Some(now_ms.saturating_add(self.delay_ms));
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    pub fn due_at(&self) -> Option<u64> {
        self.due_at
    }

    /// True exactly once when the deadline has passed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.due_at {
            Some(due) if now_ms >= due => {
                self.due_at = None;
                true
            }
            _ => false,
        }
    }

    /// Fire immediately if anything is pending, regardless of the deadline.
    pub fn flush(&mut self) -> bool {
        self.due_at.take().is_some()
    }
}

/// Coalesces store mutations into one persisted write per burst.
///
/// The store only sees a `FnMut()` hook (see [`SaveScheduler::hook`]); the
/// hook raises a shared flag which the next [`SaveScheduler::poll`] turns into
/// a rescheduled deadline.
#[derive(Debug)]
pub struct SaveScheduler {
    debouncer: Debouncer,
    requested: Rc<Cell<bool>>,
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_DEBOUNCE_MS)
    }
}

impl SaveScheduler {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            debouncer: Debouncer::new(delay_ms),
            requested: Rc::new(Cell::new(false)),
        }
    }

    /// Save hook to install on the store.
    pub fn hook(&self) -> impl FnMut() + 'static {
        let requested = Rc::clone(&self.requested);
        move || requested.set(true)
    }

    pub fn request(&mut self, now_ms: u64) {
        self.requested.set(false);
        self.debouncer.request(now_ms);
    }

    /// Returns true when the caller should write the store out now.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if self.requested.replace(false) {
            self.debouncer.request(now_ms);
        }
        self.debouncer.poll(now_ms)
    }

    /// Returns true when a write is owed; used on shutdown.
    pub fn flush(&mut self) -> bool {
        let requested = self.requested.replace(false);
        self.debouncer.flush() || requested
    }

    pub fn is_pending(&self) -> bool {
        self.requested.get() || self.debouncer.is_pending()
    }
}
