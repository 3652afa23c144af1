//! Location links, backlink highlights, reading time and persisted reading
//! state for an EPUB reader embedded in a Markdown notes vault.
//!
//! Everything here is synchronous and host-agnostic: time comes from a
//! [`clock::Clock`], vault metadata from a [`host::VaultIndex`], and the
//! store hands its document back to the caller for persistence.

pub mod bindings;
pub mod clock;
pub mod codec;
pub mod color;
pub mod host;
pub mod link;
pub mod notes;
pub mod paths;
pub mod resolver;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod text_utils;
pub mod tracker;

pub use bindings::export_ts_bindings;
pub use codec::{DecodeError, decode_location, encode_location};
pub use link::{LocationLink, build_location_link, parse_location_link};
pub use resolver::{BacklinkHighlight, BacklinkResolver};
pub use session::{ReaderSession, SessionConfig};
pub use store::{ProgressProvider, ReadingStore};
pub use tracker::{ReadingTimeTracker, TrackerConfig};
