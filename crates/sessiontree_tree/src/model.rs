//! Session tree data model.
//!
//! In memory the tree is an arena keyed by [`Uid`]: windows keep an ordered
//! list of tab uids and tabs point back at their window and parent by uid.
//! The persisted form ([`WindowRecord`] / [`TabRecord`]) nests each window's
//! tabs inline, which is the layout stored under the `sessionTree` key.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;

/// Identifier the browser assigns to a live window or tab.
pub type HostId = i64;

/// Host id carried by saved nodes.
pub const SAVED_HOST_ID: HostId = -1;

/// Host id assigned to nodes freshly loaded from storage.
pub const LOADED_HOST_ID: HostId = 0;

/// Returns true when `id` can refer to a live host object.
pub fn is_live_host_id(id: HostId) -> bool {
    id != SAVED_HOST_ID && id != LOADED_HOST_ID
}

/// Stable identifier of a tree node. Survives browser restarts and
/// save/open cycles, unlike the host id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of a window or tab. Persisted as its numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum State {
    Saved = 0,
    Open = 1,
    Discarded = 2,
    Other = 3,
}

impl State {
    /// OPEN and DISCARDED nodes are backed by a host object.
    pub fn is_live(self) -> bool {
        matches!(self, State::Open | State::Discarded)
    }
}

impl Default for State {
    fn default() -> Self {
        State::Saved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingStatus {
    Loading,
    Complete,
}

/// Last known on-screen bounds of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowPosition {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub uid: Uid,
    pub id: HostId,
    pub state: State,
    pub active: bool,
    pub active_tab_id: Option<HostId>,
    pub selected: bool,
    pub collapsed: bool,
    pub window_position: Option<WindowPosition>,
    pub saved_time: Option<i64>,
    pub indent_level: u32,
    pub(crate) tabs: Vec<Uid>,
}

impl Window {
    /// Tab uids in window order.
    pub fn tab_uids(&self) -> &[Uid] {
        &self.tabs
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_saved(&self) -> bool {
        self.state == State::Saved
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub uid: Uid,
    pub id: HostId,
    pub window_uid: Uid,
    pub state: State,
    pub title: String,
    pub url: String,
    pub parent_uid: Option<Uid>,
    pub indent_level: u32,
    pub is_parent: bool,
    pub is_visible: bool,
    pub collapsed: bool,
    pub pinned: bool,
    pub active: bool,
    pub selected: bool,
    pub saved_time: Option<i64>,
    pub loading_status: Option<LoadingStatus>,
}

impl Tab {
    pub fn is_saved(&self) -> bool {
        self.state == State::Saved
    }

    pub fn to_record(&self) -> TabRecord {
        TabRecord {
            uid: Some(self.uid.clone()),
            id: self.id,
            state: self.state,
            title: self.title.clone(),
            url: self.url.clone(),
            parent_uid: self.parent_uid.clone(),
            indent_level: Some(self.indent_level),
            is_parent: self.is_parent,
            collapsed: self.collapsed,
            pinned: self.pinned,
            active: self.active,
            selected: self.selected,
            saved_time: self.saved_time,
            loading_status: self.loading_status,
        }
    }
}

/// Fields for inserting a tab through [`crate::TreeStore::add_tab`].
///
/// `index` is a position in the window's full tab list (saved tabs
/// included). With an index and no `parent_uid`, the new tab adopts the
/// parent and indent of the tab it is inserted in front of.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTab {
    pub window_uid: Uid,
    pub id: HostId,
    pub state: State,
    pub title: String,
    pub url: String,
    pub active: bool,
    pub selected: bool,
    pub pinned: bool,
    pub index: Option<usize>,
    pub parent_uid: Option<Uid>,
    /// Reuse an existing uid instead of allocating one (moves).
    pub uid: Option<Uid>,
}

impl NewTab {
    pub fn new(
        window_uid: Uid,
        id: HostId,
        state: State,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            window_uid,
            id,
            state,
            title: title.into(),
            url: url.into(),
            active: false,
            selected: false,
            pinned: false,
            index: None,
            parent_uid: None,
            uid: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWindow {
    pub id: HostId,
    pub state: State,
    pub active: bool,
    pub active_tab_id: Option<HostId>,
    pub window_position: Option<WindowPosition>,
    pub saved_time: Option<i64>,
    /// Position in the window list; appended when absent.
    pub index: Option<usize>,
}

impl NewWindow {
    pub fn new(id: HostId, state: State) -> Self {
        Self {
            id,
            state,
            active: false,
            active_tab_id: None,
            window_position: None,
            saved_time: None,
            index: None,
        }
    }
}

fn default_record_state() -> State {
    State::Saved
}

/// Persisted window with its tabs nested in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRecord {
    #[serde(default)]
    pub uid: Option<Uid>,
    #[serde(default)]
    pub id: HostId,
    #[serde(default = "default_record_state")]
    pub state: State,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub active_tab_id: Option<HostId>,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub window_position: Option<WindowPosition>,
    #[serde(default)]
    pub saved_time: Option<i64>,
    #[serde(default)]
    pub indent_level: u32,
    #[serde(default)]
    pub tabs: Vec<TabRecord>,
}

/// Persisted tab. Visibility is derived and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRecord {
    #[serde(default)]
    pub uid: Option<Uid>,
    #[serde(default)]
    pub id: HostId,
    #[serde(default = "default_record_state")]
    pub state: State,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub parent_uid: Option<Uid>,
    #[serde(default)]
    pub indent_level: Option<u32>,
    #[serde(default)]
    pub is_parent: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub saved_time: Option<i64>,
    #[serde(default)]
    pub loading_status: Option<LoadingStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_as_number() {
        assert_eq!(serde_json::to_string(&State::Discarded).unwrap(), "2");
        let state: State = serde_json::from_str("0").unwrap();
        assert_eq!(state, State::Saved);
    }

    #[test]
    fn tab_record_tolerates_missing_fields() {
        let record: TabRecord =
            serde_json::from_str(r#"{"title":"Docs","url":"https://docs.rs"}"#).unwrap();
        assert!(record.uid.is_none());
        assert_eq!(record.state, State::Saved);
        assert!(record.indent_level.is_none());
    }

    #[test]
    fn live_host_ids_exclude_sentinels() {
        assert!(!is_live_host_id(SAVED_HOST_ID));
        assert!(!is_live_host_id(LOADED_HOST_ID));
        assert!(is_live_host_id(42));
    }
}
