//! Browser-side window and tab descriptions plus the events the browser
//! raises about them.

use serde::{Deserialize, Serialize};
use sessiontree_tree::{HostId, LoadingStatus, WindowPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    #[default]
    Normal,
    Popup,
    Panel,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostTab {
    pub id: HostId,
    pub window_id: HostId,
    pub index: usize,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub discarded: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<LoadingStatus>,
    #[serde(default)]
    pub fav_icon_url: Option<String>,
}

/// A browser window, with its tabs populated in index order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostWindow {
    pub id: HostId,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub window_type: WindowType,
    #[serde(default)]
    pub left: Option<i32>,
    #[serde(default)]
    pub top: Option<i32>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub tabs: Vec<HostTab>,
}

impl HostWindow {
    /// Bounds, when the browser reported all four of them.
    pub fn position(&self) -> Option<WindowPosition> {
        Some(WindowPosition {
            left: self.left?,
            top: self.top?,
            width: self.width?,
            height: self.height?,
        })
    }

    pub fn active_tab(&self) -> Option<&HostTab> {
        self.tabs.iter().find(|tab| tab.active)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateWindowProperties {
    pub urls: Vec<String>,
    /// Existing tabs to move into the new window.
    pub tab_ids: Vec<HostId>,
    pub window_type: Option<WindowType>,
    pub focused: Option<bool>,
    pub position: Option<WindowPosition>,
}

impl CreateWindowProperties {
    /// Number of tabs the browser will report for the new window.
    pub fn expected_tab_count(&self) -> usize {
        self.urls.len() + self.tab_ids.len()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateTabProperties {
    pub window_id: Option<HostId>,
    pub url: Option<String>,
    pub index: Option<usize>,
    pub active: Option<bool>,
    pub discarded: Option<bool>,
    pub pinned: Option<bool>,
    /// Only honoured for discarded tabs.
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowUpdate {
    pub focused: Option<bool>,
    pub left: Option<i32>,
    pub top: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl WindowUpdate {
    pub fn focus() -> Self {
        Self {
            focused: Some(true),
            ..Self::default()
        }
    }

    pub fn place(position: WindowPosition) -> Self {
        Self {
            left: Some(position.left),
            top: Some(position.top),
            width: Some(position.width),
            height: Some(position.height),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabUpdate {
    pub active: Option<bool>,
    pub pinned: Option<bool>,
}

/// Host id the browser reports when no window has focus.
pub const WINDOW_ID_NONE: HostId = -1;

/// Notifications raised by the browser.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    WindowCreated(HostWindow),
    WindowRemoved {
        window_id: HostId,
    },
    WindowFocusChanged {
        window_id: HostId,
    },
    TabCreated(HostTab),
    TabUpdated(HostTab),
    TabRemoved {
        tab_id: HostId,
        window_id: HostId,
        is_window_closing: bool,
    },
    TabMoved {
        tab_id: HostId,
        window_id: HostId,
        from_index: usize,
        to_index: usize,
    },
    TabAttached {
        tab_id: HostId,
        new_window_id: HostId,
        new_position: usize,
    },
    TabDetached {
        tab_id: HostId,
        old_window_id: HostId,
        old_position: usize,
    },
    TabActivated {
        tab_id: HostId,
        previous_tab_id: Option<HostId>,
        window_id: HostId,
    },
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::WindowCreated(_) => "window_created",
            HostEvent::WindowRemoved { .. } => "window_removed",
            HostEvent::WindowFocusChanged { .. } => "window_focus_changed",
            HostEvent::TabCreated(_) => "tab_created",
            HostEvent::TabUpdated(_) => "tab_updated",
            HostEvent::TabRemoved { .. } => "tab_removed",
            HostEvent::TabMoved { .. } => "tab_moved",
            HostEvent::TabAttached { .. } => "tab_attached",
            HostEvent::TabDetached { .. } => "tab_detached",
            HostEvent::TabActivated { .. } => "tab_activated",
        }
    }
}
