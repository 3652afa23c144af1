//! One open book view.
//!
//! `ReaderSession` is the glue between the store, the reading time tracker,
//! the backlink resolver and the two debouncers (backlink refresh and store
//! save). The host calls [`ReaderSession::poll`] from its event loop; the
//! session turns elapsed time into tracker ticks, refreshed highlights and
//! "write the store now" signals.

use crate::clock::Clock;
use crate::host::VaultIndex;
use crate::link::build_location_link;
use crate::paths::normalize_path;
use crate::resolver::{BacklinkHighlight, BacklinkResolver, DEFAULT_HIGHLIGHT_LIMIT};
use crate::scheduler::{DEFAULT_SAVE_DEBOUNCE_MS, Debouncer, SaveScheduler};
use crate::store::{Location, ProgressProvider};
use crate::tracker::{ReadingTimeTracker, TickHandle, TrackerConfig};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_REFRESH_DEBOUNCE_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub tracker: TrackerConfig,
    pub highlight_limit: usize,
    pub refresh_debounce_ms: u64,
    pub save_debounce_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            highlight_limit: DEFAULT_HIGHLIGHT_LIMIT,
            refresh_debounce_ms: DEFAULT_REFRESH_DEBOUNCE_MS,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
        }
    }
}

/// What the view needs to render a freshly opened book.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedBook {
    pub path: String,
    pub location: Option<Location>,
    pub highlights: Arc<Vec<BacklinkHighlight>>,
}

/// Result of one [`ReaderSession::poll`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollOutcome {
    pub accrued_ms: u64,
    /// New highlight set when a scheduled refresh fired.
    pub highlights: Option<Arc<Vec<BacklinkHighlight>>>,
    /// The store should be written out now.
    pub save_due: bool,
}

pub struct ReaderSession<P, I, C>
where
    P: ProgressProvider + 'static,
    I: VaultIndex,
    C: Clock + Clone,
{
    store: Rc<RefCell<P>>,
    tracker: ReadingTimeTracker<C>,
    resolver: BacklinkResolver<I>,
    clock: C,
    refresh: Debouncer,
    save: SaveScheduler,
    highlight_limit: usize,
    book: Option<String>,
    tick: Option<TickHandle>,
    next_tick_at: u64,
    highlights: Arc<Vec<BacklinkHighlight>>,
}

impl<P, I, C> std::fmt::Debug for ReaderSession<P, I, C>
where
    P: ProgressProvider + 'static,
    I: VaultIndex,
    C: Clock + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSession")
            .field("book", &self.book)
            .field("tracker", &self.tracker)
            .field("highlights", &self.highlights.len())
            .finish_non_exhaustive()
    }
}

impl<P, I, C> ReaderSession<P, I, C>
where
    P: ProgressProvider + 'static,
    I: VaultIndex,
    C: Clock + Clone,
{
    /// Reading time flushed by the tracker lands in `store`. The resolver
    /// interprets links with `book_ext` as the book extension.
    pub fn new(
        store: Rc<RefCell<P>>,
        index: I,
        book_ext: &str,
        clock: C,
        config: SessionConfig,
    ) -> Self {
        let sink = Rc::clone(&store);
        let tracker = ReadingTimeTracker::new(config.tracker, clock.clone(), move |ms, path: &str| {
            sink.borrow_mut().add_reading_time(path, ms as f64);
        });
        Self {
            store,
            tracker,
            resolver: BacklinkResolver::new(index, book_ext),
            clock,
            refresh: Debouncer::new(config.refresh_debounce_ms),
            save: SaveScheduler::new(config.save_debounce_ms),
            highlight_limit: config.highlight_limit,
            book: None,
            tick: None,
            next_tick_at: 0,
            highlights: Arc::new(Vec::new()),
        }
    }

    /// Hook to install as the store's save hook so mutations end up in
    /// [`PollOutcome::save_due`].
    pub fn save_hook(&self) -> impl FnMut() + 'static {
        self.save.hook()
    }

    pub fn store(&self) -> &Rc<RefCell<P>> {
        &self.store
    }

    pub fn current_book(&self) -> Option<&str> {
        self.book.as_deref()
    }

    pub fn highlights(&self) -> Arc<Vec<BacklinkHighlight>> {
        Arc::clone(&self.highlights)
    }

    pub fn tracker(&self) -> &ReadingTimeTracker<C> {
        &self.tracker
    }

    pub fn index_mut(&mut self) -> &mut I {
        self.resolver.index_mut()
    }

    /// Open `book_path` in this view, closing whatever was open before.
    pub fn open_book(&mut self, book_path: &str) -> OpenedBook {
        if self.book.is_some() {
            self.close();
        }
        let path = normalize_path(book_path);
        let location = {
            let mut store = self.store.borrow_mut();
            store.record_reading_session(&path);
            store.get_progress(&path)
        };

        self.tracker.set_file(Some(&path));
        self.tracker.set_active_leaf(true);
        self.tracker.record_activity();
        let handle = self.tracker.start();
        self.tick = Some(handle);
        self.next_tick_at = self
            .clock
            .now_ms()
            .saturating_add(self.tracker.config().tick_interval_ms);

        self.highlights = self.resolver.highlights_for_book(&path, self.highlight_limit);
        info!(
            book = %path,
            highlights = self.highlights.len(),
            "Opened book"
        );
        self.book = Some(path.clone());

        OpenedBook {
            path,
            location,
            highlights: Arc::clone(&self.highlights),
        }
    }

    /// Stop tracking (flushing pending time) and drop any scheduled refresh.
    pub fn close(&mut self) {
        let Some(book) = self.book.take() else {
            return;
        };
        self.tracker.stop();
        self.tracker.set_file(None);
        self.tick = None;
        self.refresh.cancel();
        self.highlights = Arc::new(Vec::new());
        debug!(book = %book, "Closed book");
    }

    /// The render engine moved to `location`.
    pub fn on_relocated(&mut self, location: Location) {
        let Some(book) = self.book.as_deref() else {
            return;
        };
        self.tracker.record_activity();
        self.store.borrow_mut().set_progress(book, location);
    }

    /// Shareable wikilink for a text selection.
    pub fn on_selection(&mut self, location_range: &str, text: &str) -> Option<String> {
        let book = self.book.as_deref()?;
        let link = build_location_link(book, location_range, text);
        self.tracker.record_activity();
        Some(link)
    }

    /// Scroll, keypress or any other engagement signal.
    pub fn record_activity(&mut self) {
        if self.book.is_some() {
            self.tracker.record_activity();
        }
    }

    /// The view became (or stopped being) the active pane.
    pub fn set_active(&mut self, active: bool) {
        self.tracker.set_active_leaf(active);
        if active && self.book.is_some() {
            self.schedule_backlink_refresh();
        }
    }

    /// Called on vault metadata changes; bursts collapse into one refresh.
    pub fn schedule_backlink_refresh(&mut self) {
        if self.book.is_some() {
            self.refresh.request(self.clock.now_ms());
        }
    }

    /// Drive timers up to the current clock time.
    pub fn poll(&mut self) -> PollOutcome {
        let now = self.clock.now_ms();
        let mut outcome = PollOutcome::default();

        if let Some(handle) = self.tick {
            if now >= self.next_tick_at {
                outcome.accrued_ms = self.tracker.tick(handle);
                self.next_tick_at = now.saturating_add(self.tracker.config().tick_interval_ms);
            }
        }

        if self.refresh.poll(now) {
            if let Some(book) = self.book.as_deref() {
                let highlights = self.resolver.highlights_for_book(book, self.highlight_limit);
                self.highlights = Arc::clone(&highlights);
                outcome.highlights = Some(highlights);
            }
        }

        outcome.save_due = self.save.poll(now);
        outcome
    }

    /// True when a save is owed; call on shutdown after [`Self::close`].
    pub fn flush_save(&mut self) -> bool {
        self.save.flush()
    }
}
