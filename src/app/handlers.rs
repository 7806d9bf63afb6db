//! Browser event handlers for SessionTree.
//!
//! Each event is handled to completion before the tree is committed. Errors
//! are logged; an event the tree cannot apply is dropped, never retried.

use sessiontree_host::{HostEvent, HostTab, HostWindow};
use sessiontree_tree::{HostId, LoadingStatus, State, TreeError, TreeStore, Uid};

use super::constants::ACTIVATION_RETRIES;
use super::notifications::TreeNotification;
use super::state::SessionTree;
use super::tree_state::{TabChanges, TabTarget, new_tab_from_host};
use crate::error::SessionTreeResult;

/// Tree index in front of which a tab reported at browser index
/// `host_index` belongs. `None` appends.
fn tree_index_for_host_index(tree: &TreeStore, window_uid: &Uid, host_index: usize) -> Option<usize> {
    let live = tree.live_tabs(window_uid);
    live.get(host_index)
        .and_then(|tab| tree.tab_index(&tab.uid))
}

impl SessionTree {
    pub async fn handle_host_event(&self, event: HostEvent) {
        let name = event.name();
        log::debug!("host_event event={}", name);
        let result = match event {
            HostEvent::WindowCreated(window) => self.windows_on_created(window).await,
            HostEvent::WindowRemoved { window_id } => self.windows_on_removed(window_id),
            HostEvent::WindowFocusChanged { window_id } => {
                self.set_active_window(window_id, ACTIVATION_RETRIES).await;
                Ok(())
            }
            HostEvent::TabCreated(tab) => self.tabs_on_created(tab).await,
            HostEvent::TabUpdated(tab) => {
                self.tabs_on_updated(tab);
                Ok(())
            }
            HostEvent::TabRemoved {
                tab_id,
                window_id,
                is_window_closing,
            } => self.tabs_on_removed(tab_id, window_id, is_window_closing),
            HostEvent::TabMoved {
                tab_id,
                window_id,
                to_index,
                ..
            } => self.tabs_on_moved(tab_id, window_id, to_index).await,
            HostEvent::TabAttached {
                tab_id,
                new_window_id,
                new_position,
            } => {
                self.tabs_on_attached(tab_id, new_window_id, new_position)
                    .await
            }
            HostEvent::TabDetached {
                tab_id,
                old_window_id,
                ..
            } => self.tabs_on_detached(tab_id, old_window_id),
            HostEvent::TabActivated {
                tab_id, window_id, ..
            } => {
                self.tab_on_activated(window_id, tab_id, ACTIVATION_RETRIES)
                    .await;
                Ok(())
            }
        };
        if let Err(e) = result {
            log::warn!("host_event_failed event={} error={}", name, e);
        }
        self.commit().await;
    }

    async fn windows_on_created(&self, window: HostWindow) -> SessionTreeResult<()> {
        if self.pending.is_new_window_extension_generated(window.id).await {
            log::debug!("window_created_skipped reason=extension window={}", window.id);
            return Ok(());
        }
        if Some(window.id) == self.session_tree_window_id() {
            return Ok(());
        }
        self.add_window(window.id).await?;
        Ok(())
    }

    /// A closed window is kept as SAVED when the settings ask for it,
    /// otherwise dropped.
    fn windows_on_removed(&self, window_id: HostId) -> SessionTreeResult<()> {
        self.remove_session_window_id(window_id);
        let settings = self.settings();
        self.with_state(|state| {
            let Some(window) = state.tree.find_window_by_host_id(window_id) else {
                return Ok(());
            };
            if window.is_saved() {
                return Ok(());
            }
            let uid = window.uid.clone();
            let previously_saved = window.saved_time.is_some_and(|time| time > 0);
            let tabs = state.tree.tabs_in_window(&uid);
            let tab_count = tabs.len();
            let contains_saved = tabs.iter().any(|tab| tab.is_saved());
            let single_tab_saved = tab_count == 1 && tabs[0].saved_time.is_some_and(|time| time > 0);

            let save_window = tab_count > 0
                && (settings.save_window_on_close
                    || (contains_saved && settings.save_window_on_close_if_contains_saved_tabs)
                    || (previously_saved && settings.save_window_on_close_if_previously_saved));
            let save_single_tab = tab_count == 1
                && (settings.save_tab_on_close
                    || (single_tab_saved && settings.save_tab_on_close_if_previously_saved));

            if save_window || save_single_tab {
                state.save_window(&uid)?;
            } else {
                state.tree.remove_window(&uid)?;
                log::info!("window_removed uid={} window={}", uid, window_id);
            }
            Ok::<_, TreeError>(())
        })?;
        Ok(())
    }

    async fn tabs_on_created(&self, tab: HostTab) -> SessionTreeResult<()> {
        if self.pending.is_new_tab_extension_generated(tab.id).await {
            log::debug!("tab_created_skipped reason=extension tab={}", tab.id);
            return Ok(());
        }
        self.with_state(|state| {
            let Some(window_uid) = state
                .tree
                .find_window_by_host_id(tab.window_id)
                .map(|window| window.uid.clone())
            else {
                // The window event adds this tab with the rest of the window.
                log::debug!("tab_created_skipped reason=unknown_window tab={}", tab.id);
                return Ok(());
            };
            if state.tree.find_tab_in_window(&window_uid, tab.id).is_some() {
                return Ok(());
            }
            let index = tree_index_for_host_index(&state.tree, &window_uid, tab.index);
            let uid = state.add_tab(new_tab_from_host(&window_uid, &tab, index))?;
            log::info!("tab_added uid={} tab={} window={}", uid, tab.id, tab.window_id);
            Ok::<_, TreeError>(())
        })?;
        Ok(())
    }

    fn tabs_on_updated(&self, tab: HostTab) {
        if Some(tab.window_id) == self.session_tree_window_id() {
            return;
        }
        let complete = tab.status == Some(LoadingStatus::Complete);
        if complete && let Some(fav_icon_url) = &tab.fav_icon_url {
            self.notify(TreeNotification::FaviconUpdated {
                tab_id: tab.id,
                fav_icon_url: fav_icon_url.clone(),
            });
        }
        let changes = TabChanges {
            state: Some(if tab.discarded {
                State::Discarded
            } else {
                State::Open
            }),
            title: tab.title.clone().filter(|_| complete),
            url: tab.url.clone().filter(|_| complete),
            pinned: Some(tab.pinned),
            loading_status: tab.status,
            ..TabChanges::default()
        };
        let target = TabTarget::Host {
            window_id: tab.window_id,
            tab_id: tab.id,
        };
        self.with_state(|state| state.update_tab(target, changes));
    }

    /// A closed tab is kept as SAVED when the settings ask for it. Tabs
    /// closing with their window are left to the window handler.
    fn tabs_on_removed(
        &self,
        tab_id: HostId,
        window_id: HostId,
        is_window_closing: bool,
    ) -> SessionTreeResult<()> {
        if is_window_closing {
            return Ok(());
        }
        let settings = self.settings();
        self.with_state(|state| {
            let Some(window) = state.tree.find_window_by_host_id(window_id) else {
                return Ok(());
            };
            let Some(tab) = state.tree.find_tab_in_window(&window.uid, tab_id) else {
                return Ok(());
            };
            if tab.is_saved() {
                return Ok(());
            }
            let uid = tab.uid.clone();
            let previously_saved = tab.saved_time.is_some_and(|time| time > 0);
            if settings.save_tab_on_close
                || (previously_saved && settings.save_tab_on_close_if_previously_saved)
            {
                state.set_tab_saved(&uid)
            } else {
                state.tree.remove_tab(&uid).map(|_| ())
            }
        })?;
        Ok(())
    }

    /// Reorders the tree after a tab was dragged inside a browser window.
    /// The tab is placed before the tab now to its right in the browser.
    async fn tabs_on_moved(&self, tab_id: HostId, window_id: HostId, to_index: usize) -> SessionTreeResult<()> {
        let host_tabs = self.host.query_tabs(window_id).await?;
        self.with_state(|state| {
            let Some(window_uid) = state
                .tree
                .find_window_by_host_id(window_id)
                .map(|window| window.uid.clone())
            else {
                log::warn!("tab_moved_skipped reason=unknown_window window={}", window_id);
                return Ok(());
            };
            let live = state.tree.live_tabs(&window_uid);
            let in_sync = live.len() == host_tabs.len()
                && live.iter().zip(&host_tabs).all(|(tree_tab, host_tab)| tree_tab.id == host_tab.id);
            if in_sync {
                return Ok(());
            }
            let Some(uid) = state
                .tree
                .find_tab_in_window(&window_uid, tab_id)
                .map(|tab| tab.uid.clone())
            else {
                return Ok(());
            };
            let current = state.tree.tab_index(&uid);
            let right = host_tabs
                .get(to_index + 1)
                .and_then(|right| state.tree.find_tab_in_window(&window_uid, right.id))
                .and_then(|right| state.tree.tab_index(&right.uid));
            let index = match (right, current) {
                (Some(right), Some(current)) if current < right => Some(right - 1),
                (right, _) => right,
            };
            state.tree.move_tab_in_tree(&uid, &window_uid, index, None)?;
            Ok::<_, TreeError>(())
        })?;
        Ok(())
    }

    async fn tabs_on_attached(
        &self,
        tab_id: HostId,
        new_window_id: HostId,
        new_position: usize,
    ) -> SessionTreeResult<()> {
        if self.pending.is_new_tab_extension_generated(tab_id).await {
            log::debug!("tab_attached_skipped reason=extension tab={}", tab_id);
            return Ok(());
        }
        if self.window_uid_by_host_id(new_window_id).is_none() {
            log::debug!("tab_attached_skipped reason=unknown_window window={}", new_window_id);
            return Ok(());
        }
        let host_tab = self.host.get_tab(tab_id).await?;
        self.with_state(|state| {
            let Some(window_uid) = state
                .tree
                .find_window_by_host_id(new_window_id)
                .map(|window| window.uid.clone())
            else {
                return Ok(());
            };
            if state.tree.find_tab_in_window(&window_uid, tab_id).is_some() {
                return Ok(());
            }
            let index = tree_index_for_host_index(&state.tree, &window_uid, new_position);
            // A tab whose detach event has not been seen yet moves instead.
            if let Some(existing) = state.tree.find_tab_by_host_id(tab_id).map(|tab| tab.uid.clone()) {
                state.tree.move_tab_in_tree(&existing, &window_uid, index, None)?;
                return Ok(());
            }
            state.add_tab(new_tab_from_host(&window_uid, &host_tab, index))?;
            Ok::<_, TreeError>(())
        })?;
        Ok(())
    }

    fn tabs_on_detached(&self, tab_id: HostId, old_window_id: HostId) -> SessionTreeResult<()> {
        self.with_state(|state| {
            let Some(window) = state.tree.find_window_by_host_id(old_window_id) else {
                return Ok(());
            };
            let Some(uid) = state
                .tree
                .find_tab_in_window(&window.uid, tab_id)
                .map(|tab| tab.uid.clone())
            else {
                return Ok(());
            };
            state.tree.remove_tab(&uid).map(|_| ())
        })?;
        Ok(())
    }
}
