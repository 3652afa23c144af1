//! Reading time tracker.
//!
//! One tracker per open book view. The host fires [`ReadingTimeTracker::tick`]
//! on a fixed interval; time only accrues while the view is the active leaf
//! and the user did something recently. Accrued time is handed to the flush
//! callback once it passes a threshold, when the view goes to the background,
//! and on stop.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub tick_interval_ms: u64,
    /// Idle cutoff: no accrual when the last activity is older than this.
    pub activity_timeout_ms: u64,
    /// Upper bound for a single tick, absorbs sleep/wake gaps.
    pub max_tick_ms: u64,
    pub flush_threshold_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            activity_timeout_ms: 60_000,
            max_tick_ms: 5_000,
            flush_threshold_ms: 5_000,
        }
    }
}

/// Identifies one `start()`; ticks carrying an older handle are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHandle(u64);

pub type FlushCallback = Box<dyn FnMut(u64, &str)>;

pub struct ReadingTimeTracker<C: Clock> {
    config: TrackerConfig,
    clock: C,
    on_flush: FlushCallback,
    file_path: Option<String>,
    pending_ms: u64,
    last_tick_at: u64,
    is_active_leaf: bool,
    last_activity_at: Option<u64>,
    generation: u64,
    running: bool,
}

impl<C: Clock> std::fmt::Debug for ReadingTimeTracker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingTimeTracker")
            .field("file_path", &self.file_path)
            .field("pending_ms", &self.pending_ms)
            .field("is_active_leaf", &self.is_active_leaf)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl<C: Clock> ReadingTimeTracker<C> {
    pub fn new(config: TrackerConfig, clock: C, on_flush: impl FnMut(u64, &str) + 'static) -> Self {
        let now = clock.now_ms();
        Self {
            config,
            clock,
            on_flush: Box::new(on_flush),
            file_path: None,
            pending_ms: 0,
            last_tick_at: now,
            is_active_leaf: false,
            last_activity_at: None,
            generation: 0,
            running: false,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn current_file(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn pending_ms(&self) -> u64 {
        self.pending_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_active_leaf(&self) -> bool {
        self.is_active_leaf
    }

    /// Switch to another book (or none). Time pending for the previous book
    /// is flushed against it first, never against the new one.
    pub fn set_file(&mut self, path: Option<&str>) {
        if self.file_path.as_deref() == path {
            return;
        }
        self.flush();
        self.pending_ms = 0;
        self.file_path = path.map(str::to_string);
        self.last_activity_at = None;
        self.last_tick_at = self.clock.now_ms();
    }

    /// Begin ticking. The host schedules a repeating timer at
    /// `config.tick_interval_ms` and passes the returned handle to every
    /// tick. Calling `start` again invalidates earlier handles.
    pub fn start(&mut self) -> TickHandle {
        self.generation = self.generation.wrapping_add(1);
        self.running = true;
        self.last_tick_at = self.clock.now_ms();
        debug!(file = ?self.file_path, "Reading time tracker started");
        TickHandle(self.generation)
    }

    /// Stop ticking and flush. Ticks already queued by the host become
    /// no-ops because their handle is stale.
    pub fn stop(&mut self) {
        if self.running {
            self.generation = self.generation.wrapping_add(1);
            self.running = false;
        }
        self.flush();
        self.pending_ms = 0;
    }

    pub fn set_active_leaf(&mut self, active: bool) {
        let was_active = self.is_active_leaf;
        self.is_active_leaf = active;
        if was_active && !active {
            self.flush();
        }
        if was_active != active {
            self.last_tick_at = self.clock.now_ms();
        }
    }

    /// Evidence of engagement: scroll, selection, relocation.
    pub fn record_activity(&mut self) {
        self.last_activity_at = Some(self.clock.now_ms());
    }

    /// Timer callback. Returns the milliseconds accrued by this tick.
    pub fn tick(&mut self, handle: TickHandle) -> u64 {
        if !self.running || handle.0 != self.generation {
            trace!("Ignoring stale tracker tick");
            return 0;
        }

        let now = self.clock.now_ms();
        let delta = now.saturating_sub(self.last_tick_at);
        self.last_tick_at = now;
        if !self.should_accrue(now) {
            return 0;
        }

        let accrued = delta.min(self.config.max_tick_ms);
        self.pending_ms = self.pending_ms.saturating_add(accrued);
        if self.pending_ms >= self.config.flush_threshold_ms {
            self.flush();
        }
        accrued
    }

    /// Hand pending time to the callback. Never flushes without a file.
    pub fn flush(&mut self) {
        if self.pending_ms == 0 {
            return;
        }
        if let Some(path) = self.file_path.as_deref() {
            trace!(path, pending_ms = self.pending_ms, "Flushing reading time");
            (self.on_flush)(self.pending_ms, path);
            self.pending_ms = 0;
        }
    }

    fn should_accrue(&self, now: u64) -> bool {
        if self.file_path.is_none() || !self.is_active_leaf {
            return false;
        }
        match self.last_activity_at {
            Some(at) => now.saturating_sub(at) <= self.config.activity_timeout_ms,
            None => false,
        }
    }
}
