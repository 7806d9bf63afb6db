//! Window operations on SessionTree.

use sessiontree_host::{
    CreateWindowProperties, SESSION_TREE_PAGE, WINDOW_ID_NONE, WindowType, WindowUpdate,
};
use sessiontree_tree::{HostId, SAVED_HOST_ID, State, TreeError, Uid, is_live_host_id};

use super::constants::ACTIVATION_RETRY_DELAY;
use super::state::SessionTree;
use super::tab_ops::OpenTabRequest;
use crate::error::SessionTreeResult;

impl SessionTree {
    /// Mirrors browser window `window_id` into the tree unless it is already
    /// there.
    pub async fn add_window(&self, window_id: HostId) -> SessionTreeResult<Option<Uid>> {
        if let Some(uid) = self.window_uid_by_host_id(window_id) {
            return Ok(Some(uid));
        }
        let host_window = self.host.get_window(window_id).await?;
        // The window may have been added while the host call was in flight.
        Ok(self.with_state(|state| {
            match state.tree.find_window_by_host_id(window_id) {
                Some(existing) => Some(existing.uid.clone()),
                None => state.insert_host_window(&host_window, None),
            }
        }))
    }

    pub fn remove_window(&self, uid: &Uid) -> SessionTreeResult<()> {
        self.with_state(|state| state.tree.remove_window(uid))?;
        log::info!("window_removed uid={}", uid);
        Ok(())
    }

    pub fn save_window(&self, uid: &Uid) -> SessionTreeResult<()> {
        self.with_state(|state| state.save_window(uid))?;
        Ok(())
    }

    pub fn toggle_collapse_window(&self, uid: &Uid) -> SessionTreeResult<()> {
        self.with_state(|state| state.tree.toggle_collapse_window(uid))?;
        Ok(())
    }

    /// Reopens a SAVED window in the browser.
    ///
    /// With `open_window_with_tabs_discarded` only the first tab is loaded
    /// when the window is created; the rest are added afterwards as
    /// discarded tabs. The window stays SAVED until the browser has created
    /// it, so a failed creation leaves the tree untouched.
    pub async fn open_window(&self, uid: &Uid) -> SessionTreeResult<()> {
        let settings = self.settings();
        let plan = self.with_state(|state| {
            let window = state
                .tree
                .window(uid)
                .ok_or_else(|| TreeError::NotFound(format!("window {}", uid)))?;
            if window.state.is_live() {
                return Ok(None);
            }
            let Some(opening) = self.begin_opening(uid) else {
                return Ok(None);
            };
            let position = window
                .window_position
                .filter(|_| settings.open_windows_in_same_location);
            let tabs = state.tree.tabs_in_window(uid);
            let tab_uids: Vec<Uid> = tabs.iter().map(|tab| tab.uid.clone()).collect();
            let urls: Vec<String> = tabs
                .iter()
                .map(|tab| self.window_creation_url(&tab.url, &tab.title))
                .collect();
            Ok::<_, TreeError>(Some((opening, tab_uids, urls, position)))
        })?;
        let Some((_opening, tab_uids, mut urls, position)) = plan else {
            log::debug!("window_open_skipped reason=live_or_opening uid={}", uid);
            return Ok(());
        };

        let lazy_tabs = if settings.open_window_with_tabs_discarded && urls.len() > 1 {
            urls.truncate(1);
            tab_uids[1..].to_vec()
        } else {
            Vec::new()
        };
        let created = urls.len();
        let properties = CreateWindowProperties {
            urls,
            position,
            ..CreateWindowProperties::default()
        };

        let host_window = match self.pending.create_window_and_wait(properties).await {
            Ok(host_window) => host_window,
            Err(e) => {
                log::warn!("window_open_failed uid={} error={}", uid, e);
                return Err(e.into());
            }
        };
        if !settings.focus_window_on_open {
            self.refocus_session_tree().await;
        }

        self.with_state(|state| {
            state.update_window_id(uid, host_window.id);
            state.update_window_state(uid, State::Open);
            for (tab_uid, host_tab) in tab_uids[..created].iter().zip(&host_window.tabs) {
                state.update_tab_id(tab_uid, host_tab.id);
                state.update_tab_state(
                    tab_uid,
                    if host_tab.discarded {
                        State::Discarded
                    } else {
                        State::Open
                    },
                );
            }
            if let Some(window) = state.tree.window_mut(uid) {
                window.active = host_window.focused;
                window.active_tab_id = host_window.active_tab().map(|tab| tab.id);
            }
        });
        log::info!(
            "window_opened uid={} window={} tabs={}",
            uid,
            host_window.id,
            tab_uids.len()
        );

        for tab_uid in lazy_tabs {
            let request = OpenTabRequest {
                tab_uid,
                url: None,
                discarded: true,
            };
            if let Err(e) = self.open_tab(request).await {
                log::warn!("window_open_tab_failed uid={} error={}", uid, e);
            }
        }
        Ok(())
    }

    /// Closes a window and drops it from the tree.
    pub async fn close_window(&self, uid: &Uid) -> SessionTreeResult<()> {
        let window_id = self.with_state(|state| {
            let window = state
                .tree
                .window(uid)
                .ok_or_else(|| TreeError::NotFound(format!("window {}", uid)))?;
            let window_id = if window.state.is_live() {
                window.id
            } else {
                SAVED_HOST_ID
            };
            state.tree.remove_window(uid)?;
            Ok::<_, TreeError>(window_id)
        })?;
        log::info!("window_closed uid={} window={}", uid, window_id);
        self.remove_host_window(window_id).await;
        Ok(())
    }

    /// Keeps the window in the tree as SAVED and closes it in the browser.
    pub async fn save_and_remove_window(&self, uid: &Uid) -> SessionTreeResult<()> {
        let window_id = self.with_state(|state| {
            let window_id = state
                .tree
                .window(uid)
                .map(|window| window.id)
                .ok_or_else(|| TreeError::NotFound(format!("window {}", uid)))?;
            state.save_window(uid)?;
            Ok::<_, TreeError>(window_id)
        })?;
        self.remove_host_window(window_id).await;
        Ok(())
    }

    async fn remove_host_window(&self, window_id: HostId) {
        if !is_live_host_id(window_id) {
            return;
        }
        if self.host.get_window(window_id).await.is_err() {
            log::debug!("host_window_gone window={}", window_id);
            return;
        }
        if let Err(e) = self.host.remove_window(window_id).await {
            log::warn!("host_window_remove_failed window={} error={}", window_id, e);
        }
    }

    /// Brings a live window to the front.
    pub async fn focus_window(&self, uid: &Uid) -> SessionTreeResult<()> {
        let window = self
            .window(uid)
            .ok_or_else(|| TreeError::NotFound(format!("window {}", uid)))?;
        if !window.state.is_live() {
            log::debug!("window_focus_skipped reason=saved uid={}", uid);
            return Ok(());
        }
        self.host
            .update_window(window.id, WindowUpdate::focus())
            .await?;
        Ok(())
    }

    /// Marks browser window `window_id` as the active one. Focus events can
    /// arrive before the window is in the tree, so lookups are retried.
    pub async fn set_active_window(&self, window_id: HostId, retries: u32) {
        if window_id == WINDOW_ID_NONE || Some(window_id) == self.session_tree_window_id() {
            return;
        }
        for attempt in 0..=retries {
            if self.with_state(|state| state.activate_window(window_id)) {
                return;
            }
            if attempt < retries {
                tokio::time::sleep(ACTIVATION_RETRY_DELAY).await;
            }
        }
        log::debug!("window_activation_gave_up window={}", window_id);
    }

    /// Focuses the session tree popup, creating it when it is not open.
    pub async fn open_session_tree(&self) -> SessionTreeResult<HostId> {
        if let Some(window_id) = self.session_tree_window_id() {
            match self.host.update_window(window_id, WindowUpdate::focus()).await {
                Ok(_) => return Ok(window_id),
                Err(e) => {
                    log::debug!("session_tree_popup_stale window={} error={}", window_id, e);
                    self.remove_session_window_id(window_id);
                }
            }
        }
        let position = if self.settings().open_session_tree_in_same_location {
            Some(self.load_popup_bounds().await)
        } else {
            None
        };
        let properties = CreateWindowProperties {
            urls: vec![self.host.extension_url(SESSION_TREE_PAGE)],
            window_type: Some(WindowType::Popup),
            position,
            ..CreateWindowProperties::default()
        };
        let window = self.pending.create_window_and_wait(properties).await?;
        self.set_session_tree_window_id(Some(window.id));
        log::info!("session_tree_popup_opened window={}", window.id);
        Ok(window.id)
    }
}
