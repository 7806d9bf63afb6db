//! User-intent messages from presentation surfaces.

use std::sync::Arc;

use serde::Deserialize;
use sessiontree_tree::{Uid, WindowRecord};

use super::move_ops::MoveTabsRequest;
use super::state::SessionTree;
use super::tab_ops::OpenTabRequest;
use crate::error::SessionTreeResult;

/// A user action, tagged by its `action` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ActionMessage {
    CloseTab {
        tab_uid: Uid,
    },
    SaveTab {
        tab_uid: Uid,
    },
    OpenTab {
        tab_uid: Uid,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        discarded: bool,
    },
    ReloadTab {
        tab_uid: Uid,
    },
    FocusTab {
        tab_uid: Uid,
    },
    PinTab {
        tab_uid: Uid,
    },
    UnpinTab {
        tab_uid: Uid,
    },
    CloseWindow {
        window_uid: Uid,
    },
    /// Save the window and close it in the browser.
    SaveWindow {
        window_uid: Uid,
    },
    OpenWindow {
        window_uid: Uid,
    },
    FocusWindow {
        window_uid: Uid,
    },
    ToggleCollapseTab {
        tab_uid: Uid,
    },
    ToggleCollapseWindow {
        window_uid: Uid,
    },
    TabIndentIncrease {
        tab_uids: Vec<Uid>,
    },
    TabIndentDecrease {
        tab_uids: Vec<Uid>,
    },
    MoveTabs {
        #[serde(alias = "tabUIDs")]
        tab_uids: Vec<Uid>,
        target_window_uid: Uid,
        target_index: usize,
        #[serde(default)]
        parent_uid: Option<Uid>,
        #[serde(default)]
        copy: bool,
    },
    MoveWindows {
        #[serde(alias = "windowUIDs")]
        window_uids: Vec<Uid>,
        target_index: usize,
        #[serde(default)]
        copy: bool,
    },
    DeselectAllItems,
    OpenWindowsInSameLocationUpdated,
    OpenSessionTree,
    ReplaceSessionTree {
        windows: Vec<WindowRecord>,
    },
    ResetSessionTree,
    PrintSessionTree,
}

impl ActionMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ActionMessage::CloseTab { .. } => "close_tab",
            ActionMessage::SaveTab { .. } => "save_tab",
            ActionMessage::OpenTab { .. } => "open_tab",
            ActionMessage::ReloadTab { .. } => "reload_tab",
            ActionMessage::FocusTab { .. } => "focus_tab",
            ActionMessage::PinTab { .. } => "pin_tab",
            ActionMessage::UnpinTab { .. } => "unpin_tab",
            ActionMessage::CloseWindow { .. } => "close_window",
            ActionMessage::SaveWindow { .. } => "save_window",
            ActionMessage::OpenWindow { .. } => "open_window",
            ActionMessage::FocusWindow { .. } => "focus_window",
            ActionMessage::ToggleCollapseTab { .. } => "toggle_collapse_tab",
            ActionMessage::ToggleCollapseWindow { .. } => "toggle_collapse_window",
            ActionMessage::TabIndentIncrease { .. } => "tab_indent_increase",
            ActionMessage::TabIndentDecrease { .. } => "tab_indent_decrease",
            ActionMessage::MoveTabs { .. } => "move_tabs",
            ActionMessage::MoveWindows { .. } => "move_windows",
            ActionMessage::DeselectAllItems => "deselect_all_items",
            ActionMessage::OpenWindowsInSameLocationUpdated => "open_windows_in_same_location_updated",
            ActionMessage::OpenSessionTree => "open_session_tree",
            ActionMessage::ReplaceSessionTree { .. } => "replace_session_tree",
            ActionMessage::ResetSessionTree => "reset_session_tree",
            ActionMessage::PrintSessionTree => "print_session_tree",
        }
    }
}

impl SessionTree {
    /// Parses a raw message and dispatches it. Unknown or malformed messages
    /// are logged and dropped.
    pub async fn handle_message(self: &Arc<Self>, message: serde_json::Value) {
        match serde_json::from_value::<ActionMessage>(message) {
            Ok(action) => self.dispatch(action).await,
            Err(e) => log::warn!("action_parse_failed error={}", e),
        }
    }

    /// Runs a user action, then persists the tree and notifies listeners.
    pub async fn dispatch(self: &Arc<Self>, action: ActionMessage) {
        let name = action.name();
        log::debug!("action action={}", name);
        if let Err(e) = self.apply_action(action).await {
            log::warn!("action_failed action={} error={}", name, e);
        }
        self.commit().await;
    }

    pub(crate) async fn apply_action(self: &Arc<Self>, action: ActionMessage) -> SessionTreeResult<()> {
        match action {
            ActionMessage::CloseTab { tab_uid } => self.close_tab(&tab_uid).await,
            ActionMessage::SaveTab { tab_uid } => self.save_tab(&tab_uid).await,
            ActionMessage::OpenTab {
                tab_uid,
                url,
                discarded,
            } => {
                self.open_tab(OpenTabRequest {
                    tab_uid,
                    url,
                    discarded,
                })
                .await
            }
            ActionMessage::ReloadTab { tab_uid } => self.reload_tab(&tab_uid).await,
            ActionMessage::FocusTab { tab_uid } => self.focus_tab(&tab_uid).await,
            ActionMessage::PinTab { tab_uid } => self.pin_tab(&tab_uid).await,
            ActionMessage::UnpinTab { tab_uid } => self.unpin_tab(&tab_uid).await,
            ActionMessage::CloseWindow { window_uid } => self.close_window(&window_uid).await,
            ActionMessage::SaveWindow { window_uid } => {
                self.save_and_remove_window(&window_uid).await
            }
            ActionMessage::OpenWindow { window_uid } => self.open_window(&window_uid).await,
            ActionMessage::FocusWindow { window_uid } => self.focus_window(&window_uid).await,
            ActionMessage::ToggleCollapseTab { tab_uid } => self.toggle_collapse_tab(&tab_uid),
            ActionMessage::ToggleCollapseWindow { window_uid } => {
                self.toggle_collapse_window(&window_uid)
            }
            ActionMessage::TabIndentIncrease { tab_uids } => {
                self.tab_indent_increase(&tab_uids);
                Ok(())
            }
            ActionMessage::TabIndentDecrease { tab_uids } => {
                self.tab_indent_decrease(&tab_uids);
                Ok(())
            }
            ActionMessage::MoveTabs {
                tab_uids,
                target_window_uid,
                target_index,
                parent_uid,
                copy,
            } => self
                .move_tabs(MoveTabsRequest {
                    tab_uids,
                    target_window_uid,
                    target_index,
                    parent_uid,
                    copy,
                })
                .await
                .map(|_| ()),
            ActionMessage::MoveWindows {
                window_uids,
                target_index,
                copy,
            } => self.move_windows(&window_uids, target_index, copy),
            ActionMessage::DeselectAllItems => {
                self.deselect_all_items();
                Ok(())
            }
            ActionMessage::OpenWindowsInSameLocationUpdated => {
                self.update_window_position_interval();
                Ok(())
            }
            ActionMessage::OpenSessionTree => self.open_session_tree().await.map(|_| ()),
            ActionMessage::ReplaceSessionTree { windows } => {
                self.replace_session_tree(windows);
                Ok(())
            }
            ActionMessage::ResetSessionTree => self.reset_session_tree(),
            ActionMessage::PrintSessionTree => {
                self.print_session_tree();
                Ok(())
            }
        }
    }
}
