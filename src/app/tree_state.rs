//! Synchronous lifecycle operations on the tree.
//!
//! [`TreeState`] bundles the tree store with the deferred-event queue so an
//! update that arrives before its window or tab is known can be parked and
//! replayed against the same state once the host id shows up. Nothing here
//! awaits; the async layer locks the state, calls into it and releases it
//! before touching the browser.

use sessiontree_host::{HostTab, HostWindow};
use sessiontree_tree::{
    DeferredEventQueue, HostId, LoadingStatus, NewTab, NewWindow, SAVED_HOST_ID, State, TreeError,
    TreeResult, TreeStore, Uid, WindowPosition, WindowRecord, is_live_host_id, now_millis,
};

use super::constants::UNTITLED_TAB;

/// Addresses a tab either by uid or by the host ids of its window and itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabTarget {
    Uid(Uid),
    Host { window_id: HostId, tab_id: HostId },
}

/// Field updates for a tab. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabChanges {
    pub id: Option<HostId>,
    pub state: Option<State>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub pinned: Option<bool>,
    pub active: Option<bool>,
    pub loading_status: Option<LoadingStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    Deferred,
    NotFound,
}

pub struct TreeState {
    pub tree: TreeStore,
    deferred: DeferredEventQueue<TreeState>,
    backup: Option<Vec<WindowRecord>>,
}

impl Default for TreeState {
    fn default() -> Self {
        Self::with_store(TreeStore::new())
    }
}

impl TreeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(tree: TreeStore) -> Self {
        Self {
            tree,
            deferred: DeferredEventQueue::new(),
            backup: None,
        }
    }

    pub fn deferred(&self) -> &DeferredEventQueue<TreeState> {
        &self.deferred
    }

    /// Adds a tab and replays any updates parked for its host id.
    pub fn add_tab(&mut self, new_tab: NewTab) -> TreeResult<Uid> {
        let id = new_tab.id;
        let live = new_tab.state.is_live();
        let uid = self.tree.add_tab(new_tab)?;
        if live && is_live_host_id(id) {
            self.process_deferred_tab_events(id);
        }
        Ok(uid)
    }

    /// Mirrors a browser window and its tabs into the tree as OPEN. Returns
    /// `None` when the browser reported no usable tab.
    pub fn insert_host_window(&mut self, host_window: &HostWindow, index: Option<usize>) -> Option<Uid> {
        let window_uid = self.tree.add_window(NewWindow {
            active: host_window.focused,
            active_tab_id: host_window.active_tab().map(|tab| tab.id),
            window_position: host_window.position(),
            index,
            ..NewWindow::new(host_window.id, State::Open)
        });
        for host_tab in &host_window.tabs {
            if let Err(e) = self.add_tab(new_tab_from_host(&window_uid, host_tab, None)) {
                log::warn!(
                    "host_tab_skipped window={} tab={} error={}",
                    host_window.id,
                    host_tab.id,
                    e
                );
            }
        }
        if self.tree.window(&window_uid).is_none_or(|w| w.tab_count() == 0) {
            log::warn!("host_window_skipped reason=no_tabs window={}", host_window.id);
            if let Err(e) = self.tree.remove_window(&window_uid) {
                log::debug!("empty_window_remove_failed uid={} error={}", window_uid, e);
            }
            return None;
        }
        log::info!(
            "window_added window={} uid={} tabs={}",
            host_window.id,
            window_uid,
            host_window.tabs.len()
        );
        self.process_deferred_window_events(host_window.id);
        Some(window_uid)
    }

    /// Applies `changes` to a tab. A host-addressed update for a window or
    /// tab the tree does not know yet is parked and replayed later.
    pub fn update_tab(&mut self, target: TabTarget, changes: TabChanges) -> UpdateOutcome {
        let uid = match &target {
            TabTarget::Uid(uid) => {
                if self.tree.tab(uid).is_none() {
                    log::debug!("tab_update_skipped reason=not_found uid={}", uid);
                    return UpdateOutcome::NotFound;
                }
                uid.clone()
            }
            TabTarget::Host { window_id, tab_id } => {
                let (window_id, tab_id) = (*window_id, *tab_id);
                let Some(window) = self.tree.find_window_by_host_id(window_id) else {
                    self.deferred.add_window_event(
                        window_id,
                        Box::new(move |state: &mut TreeState| {
                            state.update_tab(target, changes);
                        }),
                    );
                    return UpdateOutcome::Deferred;
                };
                let Some(tab) = self.tree.find_tab_in_window(&window.uid, tab_id) else {
                    self.deferred.add_tab_event(
                        tab_id,
                        Box::new(move |state: &mut TreeState| {
                            state.update_tab(target, changes);
                        }),
                    );
                    return UpdateOutcome::Deferred;
                };
                tab.uid.clone()
            }
        };

        match changes.pinned {
            Some(true) => {
                if let Err(e) = self.pin_tab_in_tree(&uid) {
                    log::warn!("tab_pin_failed uid={} error={}", uid, e);
                }
            }
            Some(false) => {
                if let Err(e) = self.unpin_tab_in_tree(&uid) {
                    log::warn!("tab_unpin_failed uid={} error={}", uid, e);
                }
            }
            None => {}
        }

        let Some(tab) = self.tree.tab_mut(&uid) else {
            return UpdateOutcome::NotFound;
        };
        if let Some(id) = changes.id {
            tab.id = id;
        }
        if let Some(state) = changes.state {
            tab.state = state;
        }
        if let Some(title) = changes.title {
            tab.title = title;
        }
        if let Some(url) = changes.url {
            tab.url = url;
        }
        if let Some(active) = changes.active {
            tab.active = active;
        }
        if let Some(status) = changes.loading_status {
            tab.loading_status = Some(status);
        }
        if let Some(id) = changes.id.filter(|id| is_live_host_id(*id)) {
            self.process_deferred_tab_events(id);
        }
        UpdateOutcome::Applied
    }

    pub fn update_tab_id(&mut self, uid: &Uid, id: HostId) {
        let Some(tab) = self.tree.tab_mut(uid) else {
            return;
        };
        tab.id = id;
        if is_live_host_id(id) {
            self.process_deferred_tab_events(id);
        }
    }

    pub fn update_tab_state(&mut self, uid: &Uid, state: State) {
        if let Some(tab) = self.tree.tab_mut(uid) {
            tab.state = state;
        }
    }

    pub fn update_window_id(&mut self, uid: &Uid, id: HostId) {
        let Some(window) = self.tree.window_mut(uid) else {
            return;
        };
        window.id = id;
        if is_live_host_id(id) {
            self.process_deferred_window_events(id);
        }
    }

    pub fn update_window_state(&mut self, uid: &Uid, state: State) {
        if let Some(window) = self.tree.window_mut(uid) {
            window.state = state;
        }
    }

    /// Records the last seen bounds of a live window.
    pub fn update_window_position(&mut self, window_id: HostId, position: WindowPosition) {
        let Some(uid) = self.tree.find_window_by_host_id(window_id).map(|w| w.uid.clone()) else {
            return;
        };
        if let Some(window) = self.tree.window_mut(&uid) {
            window.window_position = Some(position);
        }
    }

    /// Turns a tab into a SAVED record detached from any browser tab.
    pub fn set_tab_saved(&mut self, uid: &Uid) -> TreeResult<()> {
        let tab = self
            .tree
            .tab_mut(uid)
            .ok_or_else(|| TreeError::NotFound(format!("tab {}", uid)))?;
        tab.state = State::Saved;
        tab.id = SAVED_HOST_ID;
        tab.active = false;
        tab.saved_time = Some(now_millis());
        Ok(())
    }

    /// Turns a window and all its tabs into SAVED records.
    pub fn save_window(&mut self, uid: &Uid) -> TreeResult<()> {
        let now = now_millis();
        let window = self
            .tree
            .window_mut(uid)
            .ok_or_else(|| TreeError::NotFound(format!("window {}", uid)))?;
        window.state = State::Saved;
        window.id = SAVED_HOST_ID;
        window.active = false;
        window.active_tab_id = None;
        window.saved_time = Some(now);
        let tab_uids = window.tab_uids().to_vec();
        for tab_uid in &tab_uids {
            if let Some(tab) = self.tree.tab_mut(tab_uid) {
                tab.state = State::Saved;
                tab.id = SAVED_HOST_ID;
                tab.active = false;
                tab.saved_time = Some(now);
            }
        }
        log::info!("window_saved uid={} tabs={}", uid, tab_uids.len());
        Ok(())
    }

    /// Marks a tab pinned and moves it right after the last pinned tab.
    pub fn pin_tab_in_tree(&mut self, uid: &Uid) -> TreeResult<()> {
        let tab = self
            .tree
            .tab_mut(uid)
            .ok_or_else(|| TreeError::NotFound(format!("tab {}", uid)))?;
        if tab.pinned {
            return Ok(());
        }
        tab.pinned = true;
        let window_uid = tab.window_uid.clone();
        let last_pinned = self
            .tree
            .tabs_in_window(&window_uid)
            .iter()
            .rposition(|t| t.pinned && t.uid != *uid);
        let target = last_pinned.map_or(0, |index| index + 1);
        self.tree.move_tab_in_tree(uid, &window_uid, Some(target), None)?;
        Ok(())
    }

    /// Clears the pinned flag and moves the tab to the edge of the pinned
    /// block.
    pub fn unpin_tab_in_tree(&mut self, uid: &Uid) -> TreeResult<()> {
        let tab = self
            .tree
            .tab(uid)
            .ok_or_else(|| TreeError::NotFound(format!("tab {}", uid)))?;
        if !tab.pinned {
            return Ok(());
        }
        let window_uid = tab.window_uid.clone();
        let last_pinned = self
            .tree
            .tabs_in_window(&window_uid)
            .iter()
            .rposition(|t| t.pinned);
        if let Some(tab) = self.tree.tab_mut(uid) {
            tab.pinned = false;
        }
        let target = last_pinned.unwrap_or(0);
        self.tree.move_tab_in_tree(uid, &window_uid, Some(target), None)?;
        Ok(())
    }

    /// Marks the window with `window_id` active and every other window
    /// inactive. Returns false when the window is not in the tree yet.
    pub fn activate_window(&mut self, window_id: HostId) -> bool {
        let target = self.tree.find_window_by_host_id(window_id).map(|w| w.uid.clone());
        let previous: Vec<Uid> = self
            .tree
            .windows()
            .filter(|w| w.active && Some(&w.uid) != target.as_ref())
            .map(|w| w.uid.clone())
            .collect();
        for uid in previous {
            if let Some(window) = self.tree.window_mut(&uid) {
                window.active = false;
            }
        }
        match target.and_then(|uid| self.tree.window_mut(&uid)) {
            Some(window) => {
                window.active = true;
                true
            }
            None => false,
        }
    }

    /// Marks `tab_id` as the active tab of `window_id`. Returns false when
    /// either is not in the tree yet.
    pub fn activate_tab(&mut self, window_id: HostId, tab_id: HostId) -> bool {
        let Some(window_uid) = self.tree.find_window_by_host_id(window_id).map(|w| w.uid.clone())
        else {
            return false;
        };
        let Some(tab_uid) = self
            .tree
            .find_tab_in_window(&window_uid, tab_id)
            .map(|t| t.uid.clone())
        else {
            return false;
        };
        let previous: Vec<Uid> = self
            .tree
            .tabs_in_window(&window_uid)
            .into_iter()
            .filter(|t| t.active && t.uid != tab_uid)
            .map(|t| t.uid.clone())
            .collect();
        for uid in previous {
            if let Some(tab) = self.tree.tab_mut(&uid) {
                tab.active = false;
            }
        }
        if let Some(tab) = self.tree.tab_mut(&tab_uid) {
            tab.active = true;
        }
        if let Some(window) = self.tree.window_mut(&window_uid) {
            window.active_tab_id = Some(tab_id);
        }
        true
    }

    pub fn process_deferred_window_events(&mut self, window_id: HostId) {
        let events = self.deferred.take_window_events(window_id);
        if !events.is_empty() {
            log::debug!("deferred_events_replayed kind=window id={} count={}", window_id, events.len());
        }
        for event in events {
            event(self);
        }
    }

    pub fn process_deferred_tab_events(&mut self, tab_id: HostId) {
        let events = self.deferred.take_tab_events(tab_id);
        if !events.is_empty() {
            log::debug!("deferred_events_replayed kind=tab id={} count={}", tab_id, events.len());
        }
        for event in events {
            event(self);
        }
    }

    /// Undoes a live tab's move into a SAVED window whose reopen failed: the
    /// window goes back to SAVED and the tab with it. A tab removed in the
    /// meantime leaves only the window to revert.
    pub fn revert_window_reopen(&mut self, window_uid: &Uid, tab_uid: &Uid) {
        self.update_window_state(window_uid, State::Saved);
        if let Err(e) = self.set_tab_saved(tab_uid) {
            log::warn!("tab_move_revert_failed uid={} error={}", tab_uid, e);
        }
    }

    /// Keeps a copy of the current tree so a replacement can be undone.
    pub fn store_backup(&mut self) {
        self.backup = Some(self.tree.snapshot_records());
    }

    pub fn take_backup(&mut self) -> Option<Vec<WindowRecord>> {
        self.backup.take()
    }
}

/// Tree insertion for a browser tab reported by the host.
pub fn new_tab_from_host(window_uid: &Uid, host_tab: &HostTab, index: Option<usize>) -> NewTab {
    NewTab {
        active: host_tab.active,
        pinned: host_tab.pinned,
        index,
        ..NewTab::new(
            window_uid.clone(),
            host_tab.id,
            if host_tab.discarded {
                State::Discarded
            } else {
                State::Open
            },
            host_tab
                .title
                .clone()
                .unwrap_or_else(|| UNTITLED_TAB.to_string()),
            host_tab.url.clone().unwrap_or_default(),
        )
    }
}
