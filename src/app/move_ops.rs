//! Drag-and-drop moves and copies of tabs and windows.
//!
//! A move first changes the tree, then asks the browser to follow. Tabs of a
//! SAVED window only move in the tree. A live tab dropped into a SAVED window
//! reopens that window around it.

use std::collections::HashMap;

use sessiontree_host::CreateWindowProperties;
use sessiontree_tree::{
    HostId, NewTab, SAVED_HOST_ID, State, Tab, TreeError, TreeResult, Uid, WindowPosition,
    is_live_host_id, now_millis,
};

use super::state::SessionTree;
use super::tree_state::TreeState;
use crate::error::SessionTreeResult;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTabsRequest {
    pub tab_uids: Vec<Uid>,
    pub target_window_uid: Uid,
    pub target_index: usize,
    /// Parent for moved tabs whose own parent did not come along.
    pub parent_uid: Option<Uid>,
    pub copy: bool,
}

/// Where one tab of a batch lands.
struct MoveStep {
    index: usize,
    parent: Option<Uid>,
    /// The requested index was pushed to the pinned/unpinned boundary.
    adjusted: bool,
    requested: usize,
    source_index: Option<usize>,
}

enum HostMove {
    IntoSavedWindow {
        tab_id: HostId,
        position: Option<WindowPosition>,
    },
    Within {
        tab_id: HostId,
        window_id: HostId,
        index: usize,
    },
}

fn plan_step(
    state: &TreeState,
    tab: &Tab,
    request: &MoveTabsRequest,
    target_index: usize,
    uid_mapping: &HashMap<Uid, Uid>,
    settings: &Settings,
) -> Option<MoveStep> {
    state.tree.window(&request.target_window_uid)?;
    let tabs = state.tree.tabs_in_window(&request.target_window_uid);
    let mut index = target_index.min(tabs.len());
    let mut adjusted = false;

    // Pinned tabs stay in the pinned block, unpinned ones after it.
    if tab.pinned {
        let boundary = tabs.iter().rposition(|t| t.pinned).map_or(0, |i| i + 1);
        if boundary < index {
            index = boundary;
            adjusted = true;
        }
    } else {
        let boundary = tabs.iter().position(|t| !t.pinned).unwrap_or(tabs.len());
        if boundary > index {
            index = boundary;
            adjusted = true;
        }
    }

    let current_window = state
        .tree
        .tab(&tab.uid)
        .map_or(&tab.window_uid, |current| &current.window_uid);
    let source_index = if *current_window == request.target_window_uid {
        tabs.iter().position(|t| t.uid == tab.uid)
    } else {
        None
    };
    if !request.copy && source_index.is_some_and(|source| source < index) {
        index -= 1;
    }

    let parent = if adjusted {
        None
    } else {
        let mapped = if settings.try_to_maintain_hierarchy_of_dragged_items {
            tab.parent_uid
                .as_ref()
                .and_then(|parent| uid_mapping.get(parent))
                .cloned()
        } else {
            None
        };
        mapped.or_else(|| request.parent_uid.clone())
    };

    Some(MoveStep {
        index,
        parent,
        adjusted,
        requested: target_index,
        source_index,
    })
}

fn next_target_index(step: &MoveStep, copy: bool) -> usize {
    if !step.adjusted || step.index > step.requested {
        return step.index + 1;
    }
    // A pinned tab was pulled back into the pinned block: the rest of the
    // batch keeps aiming at the original drop point.
    let mut next = step.requested + 1;
    if !copy && step.source_index.is_some_and(|source| source < next) {
        next -= 1;
    }
    next
}

/// Adds a SAVED duplicate of `tab` at `index` in `window_uid`.
fn copy_tab(
    state: &mut TreeState,
    tab: &Tab,
    window_uid: &Uid,
    index: usize,
    parent_uid: Option<Uid>,
) -> TreeResult<Uid> {
    let uid = state.add_tab(NewTab {
        pinned: tab.pinned,
        index: Some(index),
        parent_uid,
        ..NewTab::new(
            window_uid.clone(),
            SAVED_HOST_ID,
            State::Saved,
            tab.title.clone(),
            tab.url.clone(),
        )
    })?;
    if let Some(copy) = state.tree.tab_mut(&uid) {
        copy.saved_time = Some(now_millis());
    }
    Ok(uid)
}

impl SessionTree {
    /// Moves or copies a selection of tabs to `target_index` of a window.
    ///
    /// Tabs are handled in tree order. When hierarchy is maintained a tab
    /// whose parent is part of the batch stays under that parent; collapsed
    /// parents are collapsed again afterwards. Returns the uids of the moved
    /// tabs or of the copies.
    pub async fn move_tabs(&self, request: MoveTabsRequest) -> SessionTreeResult<Vec<Uid>> {
        let settings = self.settings();
        let snapshots = self.with_state(|state| {
            state
                .tree
                .window(&request.target_window_uid)
                .ok_or_else(|| {
                    TreeError::NotFound(format!("window {}", request.target_window_uid))
                })?;
            let sorted = state.tree.sort_tabs_by_position(&request.tab_uids);
            if sorted.len() < request.tab_uids.len() {
                log::warn!(
                    "move_tabs_partial requested={} found={}",
                    request.tab_uids.len(),
                    sorted.len()
                );
            }
            Ok::<_, TreeError>(
                sorted
                    .iter()
                    .filter_map(|uid| state.tree.tab(uid).cloned())
                    .collect::<Vec<Tab>>(),
            )
        })?;

        let mut target_index = request.target_index;
        let mut uid_mapping: HashMap<Uid, Uid> = HashMap::new();
        let mut moved = Vec::with_capacity(snapshots.len());
        for tab in &snapshots {
            let step = self.with_state(|state| {
                plan_step(state, tab, &request, target_index, &uid_mapping, &settings)
            });
            let Some(step) = step else {
                log::warn!("move_tabs_aborted reason=target_window_gone");
                break;
            };
            let result = if request.copy {
                self.with_state(|state| {
                    copy_tab(
                        state,
                        tab,
                        &request.target_window_uid,
                        step.index,
                        step.parent.clone(),
                    )
                })
                .map_err(Into::into)
            } else {
                self.move_tab(
                    &tab.uid,
                    &request.target_window_uid,
                    step.index,
                    step.parent.clone(),
                )
                .await
                .map(|()| tab.uid.clone())
            };
            match result {
                Ok(uid) => {
                    uid_mapping.insert(tab.uid.clone(), uid.clone());
                    moved.push(uid);
                    target_index = next_target_index(&step, request.copy);
                }
                Err(e) => log::warn!("move_tab_failed uid={} error={}", tab.uid, e),
            }
        }

        if settings.try_to_maintain_collapsed_state_of_dragged_items {
            self.with_state(|state| {
                for tab in snapshots.iter().filter(|tab| tab.collapsed) {
                    let Some(uid) = uid_mapping.get(&tab.uid) else {
                        continue;
                    };
                    let reopen = state
                        .tree
                        .tab(uid)
                        .is_some_and(|moved| moved.is_parent && !moved.collapsed);
                    if reopen && let Err(e) = state.tree.toggle_collapse_tab(uid) {
                        log::warn!("collapse_restore_failed uid={} error={}", uid, e);
                    }
                }
            });
        }
        log::info!(
            "tabs_moved count={} target={} copy={}",
            moved.len(),
            request.target_window_uid,
            request.copy
        );
        Ok(moved)
    }

    /// Moves one tab in the tree and mirrors the move in the browser.
    ///
    /// `target_index` is the tree index after the tab has been taken out of
    /// its current place. Nothing happens when the tab is already there.
    pub async fn move_tab(
        &self,
        uid: &Uid,
        target_window_uid: &Uid,
        target_index: usize,
        parent_uid: Option<Uid>,
    ) -> SessionTreeResult<()> {
        let settings = self.settings();
        let plan = self.with_state(|state| {
            let tab = state
                .tree
                .tab(uid)
                .cloned()
                .ok_or_else(|| TreeError::NotFound(format!("tab {}", uid)))?;
            let target = state
                .tree
                .window(target_window_uid)
                .ok_or_else(|| TreeError::NotFound(format!("window {}", target_window_uid)))?;
            let target_saved = target.is_saved();
            let target_id = target.id;
            let position = target
                .window_position
                .filter(|_| settings.open_windows_in_same_location);
            let keep_active = target.state == State::Open
                && (target.active_tab_id.is_none() || target.uid == tab.window_uid)
                && tab.active;
            let browser_index_before = state
                .tree
                .live_tabs(target_window_uid)
                .iter()
                .position(|t| t.uid == *uid);

            if !state
                .tree
                .move_tab_in_tree(uid, target_window_uid, Some(target_index), parent_uid)?
            {
                return Ok(None);
            }
            if let Some(moved) = state.tree.tab_mut(uid) {
                moved.active = keep_active;
            }
            if !tab.state.is_live() || !is_live_host_id(tab.id) {
                return Ok(None);
            }
            if target_saved {
                state.update_window_state(target_window_uid, State::Open);
                return Ok(Some(HostMove::IntoSavedWindow {
                    tab_id: tab.id,
                    position,
                }));
            }

            let tabs = state.tree.tabs_in_window(target_window_uid);
            let new_position = tabs.iter().position(|t| t.uid == *uid).unwrap_or(0);
            let browser_index = tabs[..new_position]
                .iter()
                .filter(|t| t.state.is_live())
                .count();
            if tab.window_uid == *target_window_uid && browser_index_before == Some(browser_index) {
                return Ok(None);
            }
            Ok::<_, TreeError>(Some(HostMove::Within {
                tab_id: tab.id,
                window_id: target_id,
                index: browser_index,
            }))
        })?;

        match plan {
            None => Ok(()),
            Some(HostMove::IntoSavedWindow { tab_id, position }) => {
                let properties = CreateWindowProperties {
                    tab_ids: vec![tab_id],
                    position,
                    ..CreateWindowProperties::default()
                };
                let host_window = match self.pending.create_window_and_wait(properties).await {
                    Ok(host_window) => host_window,
                    Err(e) => {
                        self.with_state(|state| state.revert_window_reopen(target_window_uid, uid));
                        log::warn!("tab_move_window_failed uid={} error={}", uid, e);
                        return Err(e.into());
                    }
                };
                if !settings.focus_window_on_open {
                    self.refocus_session_tree().await;
                }
                self.with_state(|state| {
                    state.update_window_id(target_window_uid, host_window.id);
                    if let Some(host_tab) = host_window.tabs.first() {
                        state.update_tab_id(uid, host_tab.id);
                        state.update_tab_state(uid, State::Open);
                    }
                });
                Ok(())
            }
            Some(HostMove::Within {
                tab_id,
                window_id,
                index,
            }) => {
                match self.host.move_tab(tab_id, window_id, index).await {
                    Ok(host_tab) => {
                        let tracked = self.with_state(|state| state.tree.tab(uid).map(|t| t.id));
                        if tracked != Some(host_tab.id) {
                            log::error!(
                                "tab_move_id_mismatch uid={} tracked={:?} host={}",
                                uid,
                                tracked,
                                host_tab.id
                            );
                        }
                    }
                    Err(e) => log::warn!("host_tab_move_failed tab={} error={}", tab_id, e),
                }
                Ok(())
            }
        }
    }

    /// Moves or copies whole windows to `target_index` of the window list.
    /// Copies are SAVED.
    pub fn move_windows(&self, uids: &[Uid], target_index: usize, copy: bool) -> SessionTreeResult<()> {
        self.with_state(|state| {
            let mut sorted: Vec<Uid> = uids
                .iter()
                .filter(|uid| state.tree.window(uid).is_some())
                .cloned()
                .collect();
            sorted.sort_by_key(|uid| state.tree.window_index(uid));
            sorted.dedup();

            let mut index = target_index.min(state.tree.window_count());
            for uid in &sorted {
                if copy {
                    state.tree.duplicate_window(uid, index, now_millis())?;
                } else {
                    if state.tree.window_index(uid).is_some_and(|current| current < index) {
                        index -= 1;
                    }
                    state.tree.move_window(uid, index)?;
                }
                index += 1;
            }
            Ok::<_, TreeError>(())
        })?;
        Ok(())
    }
}
