//! Session tree store.
//!
//! This crate holds the synchronous core of the session tree: the window and
//! tab model, uid allocation, the hierarchy engine (indentation, collapse,
//! visibility) and the deferred-event queue. Everything that talks to the
//! browser lives a layer up; nothing here awaits.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut store = TreeStore::new();
//! let window = store.add_window(NewWindow::new(1, State::Open));
//! let parent = store.add_tab(NewTab::new(window.clone(), 10, State::Open, "Docs", "https://docs.rs"))?;
//! let child = store.add_tab(NewTab {
//!     index: Some(1),
//!     parent_uid: Some(parent.clone()),
//!     ..NewTab::new(window.clone(), 11, State::Open, "std", "https://doc.rust-lang.org/std")
//! })?;
//!
//! store.toggle_collapse_tab(&parent)?;
//! assert!(!store.tab(&child).unwrap().is_visible);
//!
//! // Persist
//! let records = store.snapshot_records();
//! ```

pub mod deferred;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod store;
pub mod uid;
mod validate;

pub use deferred::{DeferredEvent, DeferredEventQueue, MAX_EVENTS_PER_ID, STALE_EVENT_HORIZON};
pub use error::{TreeError, TreeResult};
pub use hierarchy::ChildrenMap;
pub use model::{
    HostId, LOADED_HOST_ID, LoadingStatus, NewTab, NewWindow, SAVED_HOST_ID, State, Tab,
    TabRecord, Uid, Window, WindowPosition, WindowRecord, is_live_host_id,
};
pub use store::TreeStore;
pub use uid::{NON_UNIQUE_UID, UidGenerator, UidSet};

/// Milliseconds since the Unix epoch, used for `saved_time`.
pub fn now_millis() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}
