//! Core SessionTree state and lifecycle methods.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sessiontree_host::{
    BrowserHost, KeyValueStorage, POPUP_BOUNDS_KEY, PendingCreationCoordinator, REDIRECT_PAGE,
    SESSION_TREE_KEY, WindowUpdate,
};
use sessiontree_tree::{
    HostId, State, Tab, TreeError, Uid, Window, WindowPosition, WindowRecord, now_millis,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::constants::{DEFAULT_POPUP_BOUNDS, NOTIFICATION_CAPACITY};
use super::notifications::TreeNotification;
use super::tree_state::TreeState;
use crate::error::{SessionTreeError, SessionTreeResult};
use crate::settings::Settings;
use crate::urls::{BLANK_URL, is_new_tab_url, is_privileged_url, redirect_query};

/// A window as presentation surfaces draw it: only tabs without a collapsed
/// ancestor, and none at all when the window itself is collapsed.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowView {
    pub window: Window,
    pub tabs: Vec<Tab>,
}

/// Held while a node is being created in the browser.
pub(crate) struct OpeningGuard<'a> {
    tree: &'a SessionTree,
    uid: Uid,
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        self.tree.opening.lock().remove(&self.uid);
    }
}

/// The session tree service.
///
/// Owns the tree behind a single lock and mediates every interaction with
/// the browser. Tree mutations happen synchronously under the lock; browser
/// calls happen with the lock released, so event handlers and user actions
/// interleave only at await points.
pub struct SessionTree {
    pub(crate) state: Mutex<TreeState>,
    pub(crate) host: Arc<dyn BrowserHost>,
    pub(crate) storage: Arc<dyn KeyValueStorage>,
    pub(crate) pending: PendingCreationCoordinator,
    settings: RwLock<Settings>,
    notifications: broadcast::Sender<TreeNotification>,
    session_tree_window_id: Mutex<Option<HostId>>,
    opening: Mutex<HashSet<Uid>>,
    pub(crate) position_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionTree {
    pub fn new(
        host: Arc<dyn BrowserHost>,
        storage: Arc<dyn KeyValueStorage>,
        settings: Settings,
    ) -> Arc<Self> {
        Self::with_tree_state(host, storage, settings, TreeState::new())
    }

    pub fn with_tree_state(
        host: Arc<dyn BrowserHost>,
        storage: Arc<dyn KeyValueStorage>,
        settings: Settings,
        state: TreeState,
    ) -> Arc<Self> {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Arc::new(Self {
            state: Mutex::new(state),
            pending: PendingCreationCoordinator::new(host.clone()),
            host,
            storage,
            settings: RwLock::new(settings),
            notifications,
            session_tree_window_id: Mutex::new(None),
            opening: Mutex::new(HashSet::new()),
            position_task: Mutex::new(None),
        })
    }

    /// Loads the saved tree, mirrors the browser's open windows, starts the
    /// window position tracker and optionally opens the tree popup.
    pub async fn start(self: &Arc<Self>) {
        self.initialize_windows().await;
        self.commit().await;
        self.update_window_position_interval();
        if self.settings().open_session_tree_on_startup
            && let Err(e) = self.open_session_tree().await
        {
            log::warn!("session_tree_open_failed error={}", e);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeNotification> {
        self.notifications.subscribe()
    }

    pub(crate) fn notify(&self, notification: TreeNotification) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Replaces the settings and restarts the position tracker so a changed
    /// interval takes effect.
    pub fn set_settings(self: &Arc<Self>, settings: Settings) {
        *self.settings.write() = settings;
        self.update_window_position_interval();
    }

    /// Runs `f` with the tree locked. Must not be used to hold the lock
    /// across an await.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut TreeState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    /// Claims `uid` for a browser creation in flight. `None` when another
    /// open of the same node has not finished yet.
    pub(crate) fn begin_opening(&self, uid: &Uid) -> Option<OpeningGuard<'_>> {
        self.opening.lock().insert(uid.clone()).then(|| OpeningGuard {
            tree: self,
            uid: uid.clone(),
        })
    }

    pub fn session_tree_window_id(&self) -> Option<HostId> {
        *self.session_tree_window_id.lock()
    }

    pub(crate) fn set_session_tree_window_id(&self, window_id: Option<HostId>) {
        *self.session_tree_window_id.lock() = window_id;
    }

    /// Forgets the tree popup once its window is gone.
    pub fn remove_session_window_id(&self, window_id: HostId) {
        let mut current = self.session_tree_window_id.lock();
        if *current == Some(window_id) {
            *current = None;
        }
    }

    /// Persists the tree and tells presentation surfaces to refresh.
    pub async fn commit(&self) {
        if let Err(e) = self.save_session_tree_to_storage().await {
            log::error!("session_tree_save_failed error={}", e);
        }
        self.notify(TreeNotification::TreeUpdated);
    }

    pub async fn save_session_tree_to_storage(&self) -> SessionTreeResult<()> {
        let records = self.snapshot();
        let value = serde_json::to_value(&records)?;
        self.storage.set(SESSION_TREE_KEY, value).await?;
        Ok(())
    }

    /// Replaces the tree with the stored one. Every stored node comes back
    /// SAVED; nothing is done when storage holds no tree.
    pub async fn load_session_tree_from_storage(&self) -> SessionTreeResult<()> {
        let Some(value) = self.storage.get(SESSION_TREE_KEY).await? else {
            log::info!("session_tree_load_skipped reason=empty_storage");
            return Ok(());
        };
        let records: Vec<WindowRecord> = serde_json::from_value(value)?;
        let count = records.len();
        self.with_state(|state| state.tree.load_saved_records(records, now_millis()));
        log::info!("session_tree_loaded windows={}", count);
        Ok(())
    }

    /// Builds the startup tree: stored windows first, then every window the
    /// browser currently has open.
    pub async fn initialize_windows(&self) {
        if let Err(e) = self.load_session_tree_from_storage().await {
            log::error!("session_tree_load_failed error={}", e);
        }
        let windows = match self.host.get_all_windows().await {
            Ok(windows) => windows,
            Err(e) => {
                log::warn!("host_windows_unavailable error={}", e);
                Vec::new()
            }
        };
        let popup = self.session_tree_window_id();
        self.with_state(|state| {
            for window in windows.iter().filter(|w| Some(w.id) != popup) {
                state.insert_host_window(window, None);
            }
            state.tree.recompute_session_tree();
        });
    }

    pub fn recompute_session_tree(&self) {
        self.with_state(|state| state.tree.recompute_session_tree());
    }

    /// Deep copy of the tree in its persisted shape.
    pub fn snapshot(&self) -> Vec<WindowRecord> {
        self.with_state(|state| state.tree.snapshot_records())
    }

    pub fn visible_windows(&self) -> Vec<WindowView> {
        self.with_state(|state| {
            state
                .tree
                .windows()
                .map(|window| WindowView {
                    window: window.clone(),
                    tabs: state
                        .tree
                        .tabs_in_window(&window.uid)
                        .into_iter()
                        .filter(|tab| tab.is_visible)
                        .cloned()
                        .collect(),
                })
                .collect()
        })
    }

    pub fn window(&self, uid: &Uid) -> Option<Window> {
        self.with_state(|state| state.tree.window(uid).cloned())
    }

    pub fn tab(&self, uid: &Uid) -> Option<Tab> {
        self.with_state(|state| state.tree.tab(uid).cloned())
    }

    /// Title of a tab; empty when the uid is unknown.
    pub fn get_tab_title(&self, uid: &Uid) -> String {
        self.with_state(|state| {
            state
                .tree
                .tab(uid)
                .map(|tab| tab.title.clone())
                .unwrap_or_default()
        })
    }

    /// State of a tab; [`State::Other`] when the uid is unknown.
    pub fn get_tab_state(&self, uid: &Uid) -> State {
        self.with_state(|state| state.tree.tab(uid).map_or(State::Other, |tab| tab.state))
    }

    pub(crate) fn window_uid_by_host_id(&self, window_id: HostId) -> Option<Uid> {
        self.with_state(|state| {
            state
                .tree
                .find_window_by_host_id(window_id)
                .map(|window| window.uid.clone())
        })
    }

    pub fn deselect_all_items(&self) {
        self.with_state(|state| state.tree.deselect_all());
    }

    pub fn print_session_tree(&self) {
        match serde_json::to_string_pretty(&self.snapshot()) {
            Ok(dump) => log::info!("session_tree_dump\n{}", dump),
            Err(e) => log::warn!("session_tree_dump_failed error={}", e),
        }
    }

    /// Swaps in a tree supplied by a presentation surface. The current tree
    /// is kept as a backup for [`SessionTree::reset_session_tree`].
    pub fn replace_session_tree(&self, records: Vec<WindowRecord>) {
        self.with_state(|state| {
            state.store_backup();
            state.tree.replace_with_records(records);
        });
        log::info!("session_tree_replaced");
    }

    /// Restores the tree saved by the last replacement.
    pub fn reset_session_tree(&self) -> SessionTreeResult<()> {
        self.with_state(|state| {
            let backup = state
                .take_backup()
                .ok_or_else(|| TreeError::NotFound("session tree backup".to_string()))?;
            state.tree.replace_with_records(backup);
            Ok::<_, SessionTreeError>(())
        })?;
        log::info!("session_tree_reset");
        Ok(())
    }

    /// URL to hand to the browser when reopening a saved tab. `None` for
    /// empty-tab URLs so the browser picks its own new-tab page; privileged
    /// ones go through the redirect page.
    pub(crate) fn creation_url(&self, url: &str, title: &str) -> Option<String> {
        if is_new_tab_url(url) {
            None
        } else if is_privileged_url(url) {
            Some(format!(
                "{}?{}",
                self.host.extension_url(REDIRECT_PAGE),
                redirect_query(url, title)
            ))
        } else {
            Some(url.to_string())
        }
    }

    pub(crate) fn window_creation_url(&self, url: &str, title: &str) -> String {
        self.creation_url(url, title)
            .unwrap_or_else(|| BLANK_URL.to_string())
    }

    /// Hands focus back to the tree popup after opening something in the
    /// background.
    pub(crate) async fn refocus_session_tree(&self) {
        let Some(window_id) = self.session_tree_window_id() else {
            return;
        };
        if let Err(e) = self.host.update_window(window_id, WindowUpdate::focus()).await {
            log::debug!("session_tree_refocus_failed window={} error={}", window_id, e);
        }
    }

    pub(crate) async fn load_popup_bounds(&self) -> WindowPosition {
        match self.storage.get(POPUP_BOUNDS_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or(DEFAULT_POPUP_BOUNDS),
            Ok(None) => DEFAULT_POPUP_BOUNDS,
            Err(e) => {
                log::warn!("popup_bounds_load_failed error={}", e);
                DEFAULT_POPUP_BOUNDS
            }
        }
    }

    pub(crate) async fn store_popup_bounds(&self, bounds: WindowPosition) {
        let result = match serde_json::to_value(bounds) {
            Ok(value) => self.storage.set(POPUP_BOUNDS_KEY, value).await,
            Err(e) => {
                log::warn!("popup_bounds_serialize_failed error={}", e);
                return;
            }
        };
        if let Err(e) = result {
            log::warn!("popup_bounds_store_failed error={}", e);
        }
    }
}

impl Drop for SessionTree {
    fn drop(&mut self) {
        if let Some(task) = self.position_task.lock().take() {
            task.abort();
        }
    }
}
