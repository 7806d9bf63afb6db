//! Tab operations on SessionTree.

use sessiontree_host::{CreateTabProperties, CreateWindowProperties, TabUpdate, WindowUpdate};
use sessiontree_tree::{HostId, NewTab, SAVED_HOST_ID, State, TreeError, Uid, is_live_host_id};

use super::constants::ACTIVATION_RETRY_DELAY;
use super::state::SessionTree;
use super::tree_state::{TabChanges, TabTarget, UpdateOutcome};
use crate::error::SessionTreeResult;
use crate::urls::discarded_url_precheck;

/// Reopens a SAVED tab. `url` overrides the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTabRequest {
    pub tab_uid: Uid,
    pub url: Option<String>,
    pub discarded: bool,
}

impl OpenTabRequest {
    pub fn new(tab_uid: Uid) -> Self {
        Self {
            tab_uid,
            url: None,
            discarded: false,
        }
    }
}

enum OpenPlan {
    InWindow(CreateTabProperties),
    NewWindow {
        window_uid: Uid,
        properties: CreateWindowProperties,
        pinned: bool,
    },
}

impl SessionTree {
    pub fn add_tab(&self, new_tab: NewTab) -> SessionTreeResult<Uid> {
        Ok(self.with_state(|state| state.add_tab(new_tab))?)
    }

    pub fn remove_tab(&self, uid: &Uid) -> SessionTreeResult<()> {
        self.with_state(|state| state.tree.remove_tab(uid))?;
        Ok(())
    }

    pub fn update_tab(&self, target: TabTarget, changes: TabChanges) -> UpdateOutcome {
        self.with_state(|state| state.update_tab(target, changes))
    }

    pub fn set_tab_saved(&self, uid: &Uid) -> SessionTreeResult<()> {
        self.with_state(|state| state.set_tab_saved(uid))?;
        Ok(())
    }

    pub fn toggle_collapse_tab(&self, uid: &Uid) -> SessionTreeResult<()> {
        self.with_state(|state| state.tree.toggle_collapse_tab(uid))?;
        Ok(())
    }

    pub fn tab_indent_increase(&self, uids: &[Uid]) {
        self.with_state(|state| state.tree.tab_indent_increase(uids));
    }

    pub fn tab_indent_decrease(&self, uids: &[Uid]) {
        self.with_state(|state| state.tree.tab_indent_decrease(uids));
    }

    /// Reopens a SAVED tab.
    ///
    /// Inside a live window the tab is created at the browser index matching
    /// its tree position. Inside a SAVED window a new browser window is
    /// created around it. Pinned tabs are never created discarded. The tab
    /// only turns live together with its browser id, so a failed creation
    /// leaves it SAVED.
    pub async fn open_tab(&self, request: OpenTabRequest) -> SessionTreeResult<()> {
        let settings = self.settings();
        let uid = request.tab_uid.clone();
        let plan = self.with_state(|state| {
            let tab = state
                .tree
                .tab(&uid)
                .ok_or_else(|| TreeError::NotFound(format!("tab {}", uid)))?;
            if tab.state.is_live() {
                return Ok(None);
            }
            let Some(tab_opening) = self.begin_opening(&uid) else {
                return Ok(None);
            };
            let window = state
                .tree
                .window(&tab.window_uid)
                .ok_or_else(|| TreeError::NotFound(format!("window {}", tab.window_uid)))?;
            let pinned = tab.pinned;
            let target_url = request.url.clone().unwrap_or_else(|| tab.url.clone());
            let url = self.creation_url(&target_url, &tab.title);
            let title = tab.title.clone();
            let window_uid = window.uid.clone();

            if window.is_saved() {
                // The window is created too, so it is claimed as well.
                let Some(window_opening) = self.begin_opening(&window_uid) else {
                    return Ok(None);
                };
                let properties = CreateWindowProperties {
                    urls: vec![self.window_creation_url(&target_url, &title)],
                    position: window
                        .window_position
                        .filter(|_| settings.open_windows_in_same_location),
                    ..CreateWindowProperties::default()
                };
                return Ok(Some((
                    vec![tab_opening, window_opening],
                    OpenPlan::NewWindow {
                        window_uid,
                        properties,
                        pinned,
                    },
                )));
            }

            let window_id = window.id;
            let tabs = state.tree.tabs_in_window(&window_uid);
            let position = tabs.iter().position(|t| t.uid == uid).unwrap_or(0);
            let live_before = tabs[..position].iter().filter(|t| t.state.is_live()).count();
            let live_after = tabs[position + 1..].iter().any(|t| t.state.is_live());
            let discarded = request.discarded
                && !pinned
                && url.as_deref().is_some_and(discarded_url_precheck);
            let properties = CreateTabProperties {
                window_id: Some(window_id),
                index: live_after.then_some(live_before),
                active: Some(!request.discarded && settings.focus_tab_on_open),
                discarded: discarded.then_some(true),
                pinned: pinned.then_some(true),
                title: discarded.then_some(title),
                url,
            };
            Ok::<_, TreeError>(Some((vec![tab_opening], OpenPlan::InWindow(properties))))
        })?;

        match plan {
            None => {
                log::debug!("tab_open_skipped reason=live_or_opening uid={}", uid);
                Ok(())
            }
            Some((_opening, OpenPlan::InWindow(properties))) => {
                match self.pending.create_tab_and_wait(properties).await {
                    Ok(host_tab) => {
                        self.with_state(|state| {
                            state.update_tab_id(&uid, host_tab.id);
                            state.update_tab_state(
                                &uid,
                                if host_tab.discarded {
                                    State::Discarded
                                } else {
                                    State::Open
                                },
                            );
                        });
                        log::info!("tab_opened uid={} tab={}", uid, host_tab.id);
                        Ok(())
                    }
                    Err(e) => {
                        log::warn!("tab_open_failed uid={} error={}", uid, e);
                        Err(e.into())
                    }
                }
            }
            Some((
                _opening,
                OpenPlan::NewWindow {
                    window_uid,
                    properties,
                    pinned,
                },
            )) => {
                let host_window = match self.pending.create_window_and_wait(properties).await {
                    Ok(host_window) => host_window,
                    Err(e) => {
                        log::warn!("tab_open_failed uid={} error={}", uid, e);
                        return Err(e.into());
                    }
                };
                if !settings.focus_window_on_open {
                    self.refocus_session_tree().await;
                }
                let host_tab = host_window.tabs.first().cloned();
                self.with_state(|state| {
                    let Some(host_tab) = &host_tab else {
                        log::warn!("tab_open_window_empty window={}", host_window.id);
                        return;
                    };
                    state.update_window_id(&window_uid, host_window.id);
                    state.update_window_state(&window_uid, State::Open);
                    state.update_tab_id(&uid, host_tab.id);
                    state.update_tab_state(&uid, State::Open);
                });
                if pinned && let Some(host_tab) = host_tab {
                    let update = TabUpdate {
                        pinned: Some(true),
                        ..TabUpdate::default()
                    };
                    if let Err(e) = self.host.update_tab(host_tab.id, update).await {
                        log::warn!("tab_pin_failed tab={} error={}", host_tab.id, e);
                    }
                }
                log::info!("tab_opened uid={} window={}", uid, host_window.id);
                Ok(())
            }
        }
    }

    /// Drops a tab from the tree and closes it in the browser. A window left
    /// without live tabs becomes SAVED.
    pub async fn close_tab(&self, uid: &Uid) -> SessionTreeResult<()> {
        let tab_id = self.with_state(|state| {
            let tab = state
                .tree
                .tab(uid)
                .ok_or_else(|| TreeError::NotFound(format!("tab {}", uid)))?;
            let tab_id = if tab.state.is_live() {
                tab.id
            } else {
                SAVED_HOST_ID
            };
            let window_uid = tab.window_uid.clone();
            state.tree.remove_tab(uid)?;
            let orphaned = state.tree.window(&window_uid).is_some_and(|window| {
                window.state.is_live() && state.tree.live_tabs(&window_uid).is_empty()
            });
            if orphaned {
                state.save_window(&window_uid)?;
            }
            Ok::<_, TreeError>(tab_id)
        })?;
        log::info!("tab_closed uid={} tab={}", uid, tab_id);
        self.remove_host_tab(tab_id).await;
        Ok(())
    }

    /// Keeps a tab as SAVED and closes it in the browser. Saving the last
    /// live tab of a window saves the whole window.
    pub async fn save_tab(&self, uid: &Uid) -> SessionTreeResult<()> {
        let tab_id = self.with_state(|state| {
            let tab = state
                .tree
                .tab(uid)
                .ok_or_else(|| TreeError::NotFound(format!("tab {}", uid)))?;
            if !tab.state.is_live() {
                return Ok(SAVED_HOST_ID);
            }
            let tab_id = tab.id;
            let window_uid = tab.window_uid.clone();
            if state.tree.live_tabs(&window_uid).len() == 1 {
                state.save_window(&window_uid)?;
            } else {
                state.set_tab_saved(uid)?;
            }
            Ok::<_, TreeError>(tab_id)
        })?;
        self.remove_host_tab(tab_id).await;
        Ok(())
    }

    async fn remove_host_tab(&self, tab_id: HostId) {
        if !is_live_host_id(tab_id) {
            return;
        }
        if self.host.get_tab(tab_id).await.is_err() {
            log::debug!("host_tab_gone tab={}", tab_id);
            return;
        }
        if let Err(e) = self.host.remove_tab(tab_id).await {
            log::warn!("host_tab_remove_failed tab={} error={}", tab_id, e);
        }
    }

    fn live_tab_ids(&self, uid: &Uid) -> SessionTreeResult<Option<(HostId, HostId)>> {
        self.with_state(|state| {
            let tab = state
                .tree
                .tab(uid)
                .ok_or_else(|| TreeError::NotFound(format!("tab {}", uid)))?;
            if !tab.state.is_live() {
                return Ok(None);
            }
            let window_id = state
                .tree
                .window(&tab.window_uid)
                .map_or(SAVED_HOST_ID, |window| window.id);
            Ok(Some((tab.id, window_id)))
        })
    }

    pub async fn reload_tab(&self, uid: &Uid) -> SessionTreeResult<()> {
        let Some((tab_id, _)) = self.live_tab_ids(uid)? else {
            log::debug!("tab_reload_skipped reason=saved uid={}", uid);
            return Ok(());
        };
        self.host.reload_tab(tab_id).await?;
        Ok(())
    }

    /// Activates a live tab and brings its window to the front.
    pub async fn focus_tab(&self, uid: &Uid) -> SessionTreeResult<()> {
        let Some((tab_id, window_id)) = self.live_tab_ids(uid)? else {
            log::debug!("tab_focus_skipped reason=saved uid={}", uid);
            return Ok(());
        };
        let update = TabUpdate {
            active: Some(true),
            ..TabUpdate::default()
        };
        self.host.update_tab(tab_id, update).await?;
        self.host
            .update_window(window_id, WindowUpdate::focus())
            .await?;
        Ok(())
    }

    pub async fn pin_tab(&self, uid: &Uid) -> SessionTreeResult<()> {
        self.set_tab_pinned(uid, true).await
    }

    pub async fn unpin_tab(&self, uid: &Uid) -> SessionTreeResult<()> {
        self.set_tab_pinned(uid, false).await
    }

    /// SAVED tabs are repositioned in the tree only; live tabs are pinned in
    /// the browser first.
    async fn set_tab_pinned(&self, uid: &Uid, pinned: bool) -> SessionTreeResult<()> {
        if let Some((tab_id, _)) = self.live_tab_ids(uid)? {
            let update = TabUpdate {
                pinned: Some(pinned),
                ..TabUpdate::default()
            };
            self.host.update_tab(tab_id, update).await?;
        }
        self.with_state(|state| {
            if pinned {
                state.pin_tab_in_tree(uid)
            } else {
                state.unpin_tab_in_tree(uid)
            }
        })?;
        Ok(())
    }

    /// Marks a browser tab active. Activation can race ahead of the tab
    /// creation event, so lookups are retried.
    pub async fn tab_on_activated(&self, window_id: HostId, tab_id: HostId, retries: u32) {
        for attempt in 0..=retries {
            if self.with_state(|state| state.activate_tab(window_id, tab_id)) {
                return;
            }
            if attempt < retries {
                tokio::time::sleep(ACTIVATION_RETRY_DELAY).await;
            }
        }
        log::debug!("tab_activation_gave_up window={} tab={}", window_id, tab_id);
    }
}
