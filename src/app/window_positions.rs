//! Periodic sampling of window bounds so reopened windows land where they
//! were closed.

use std::sync::Arc;

use super::state::SessionTree;

impl SessionTree {
    /// (Re)starts the background task that samples window bounds. The task
    /// only holds a weak reference and stops once the tree is dropped.
    pub fn update_window_position_interval(self: &Arc<Self>) {
        if let Some(task) = self.position_task.lock().take() {
            task.abort();
        }
        let settings = self.settings();
        if !settings.open_windows_in_same_location && !settings.open_session_tree_in_same_location {
            log::debug!("window_position_tracker_stopped");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("window_position_tracker_skipped reason=no_runtime");
            return;
        };
        let period = settings.window_position_interval();
        let tree = Arc::downgrade(self);
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(tree) = tree.upgrade() else {
                    break;
                };
                tree.refresh_window_positions().await;
            }
        });
        *self.position_task.lock() = Some(task);
        log::debug!("window_position_tracker_started period_ms={}", period.as_millis());
    }

    /// Stores the current bounds of every live window, and of the tree popup
    /// under its own key.
    pub async fn refresh_window_positions(&self) {
        let windows = match self.host.get_all_windows().await {
            Ok(windows) => windows,
            Err(e) => {
                log::warn!("window_positions_unavailable error={}", e);
                return;
            }
        };
        let settings = self.settings();
        let popup = self.session_tree_window_id();
        let mut popup_bounds = None;
        self.with_state(|state| {
            for window in &windows {
                let Some(position) = window.position() else {
                    continue;
                };
                if Some(window.id) == popup {
                    popup_bounds = Some(position);
                } else if settings.open_windows_in_same_location {
                    state.update_window_position(window.id, position);
                }
            }
        });
        if settings.open_session_tree_in_same_location
            && let Some(bounds) = popup_bounds
        {
            self.store_popup_bounds(bounds).await;
        }
        if let Err(e) = self.save_session_tree_to_storage().await {
            log::warn!("window_positions_save_failed error={}", e);
        }
    }
}
