//! Pending-creation coordinator.
//!
//! When the extension itself creates a window or tab, the browser reports it
//! twice: once as the result of the create call and once through the
//! "created" event. The coordinator pairs those two sides so the event
//! listener can tell extension-generated objects from user-generated ones.
//!
//! The creator bumps a pending count before calling the browser. A listener
//! that sees a zero count answers "user-generated" immediately; otherwise it
//! registers the id and waits until the creator claims the same id, until
//! the count drains to zero, or until the wait times out. Waits never block
//! forever: a timeout resolves the listener as "user-generated".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use sessiontree_tree::HostId;
use tokio::sync::watch;

use crate::browser::BrowserHost;
use crate::error::HostResult;
use crate::model::{CreateTabProperties, CreateWindowProperties, HostTab, HostWindow, WindowUpdate};

/// Longest either side waits for its counterpart.
pub const PENDING_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Window,
    Tab,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Kind::Window => "window",
            Kind::Tab => "tab",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PendingItem {
    creator_resolved: bool,
    listener_resolved: bool,
    complete: bool,
}

#[derive(Debug, Default)]
struct PendingQueue {
    items: HashMap<HostId, PendingItem>,
    count: usize,
}

#[derive(Debug, Default)]
struct PendingState {
    windows: PendingQueue,
    tabs: PendingQueue,
}

impl PendingState {
    fn queue(&mut self, kind: Kind) -> &mut PendingQueue {
        match kind {
            Kind::Window => &mut self.windows,
            Kind::Tab => &mut self.tabs,
        }
    }
}

pub struct PendingCreationCoordinator {
    host: Arc<dyn BrowserHost>,
    state: Mutex<PendingState>,
    changed: watch::Sender<u64>,
    wait_timeout: Duration,
}

impl PendingCreationCoordinator {
    pub fn new(host: Arc<dyn BrowserHost>) -> Self {
        Self::with_timeout(host, PENDING_WAIT_TIMEOUT)
    }

    pub fn with_timeout(host: Arc<dyn BrowserHost>, wait_timeout: Duration) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            host,
            state: Mutex::new(PendingState::default()),
            changed,
            wait_timeout,
        }
    }

    pub fn pending_window_count(&self) -> usize {
        self.state.lock().windows.count
    }

    pub fn pending_tab_count(&self) -> usize {
        self.state.lock().tabs.count
    }

    /// Creates a window and returns once the browser's "created" events for
    /// it and its tabs have been claimed.
    pub async fn create_window_and_wait(
        &self,
        properties: CreateWindowProperties,
    ) -> HostResult<HostWindow> {
        let tab_count = properties.expected_tab_count();
        let position = properties.position;
        self.expect(Kind::Window, 1);
        self.expect(Kind::Tab, tab_count);

        let window = match self.host.create_window(properties).await {
            Ok(window) => window,
            Err(e) => {
                self.retract(Kind::Window, 1);
                self.retract(Kind::Tab, tab_count);
                log::warn!("pending_create_failed kind=window error={}", e);
                return Err(e);
            }
        };

        if let Some(position) = position
            && let Err(e) = self
                .host
                .update_window(window.id, WindowUpdate::place(position))
                .await
        {
            log::warn!("window_position_apply_failed window={} error={}", window.id, e);
        }

        self.resolve_creator(Kind::Window, window.id).await;
        if tab_count > 0 {
            join_all(
                window
                    .tabs
                    .iter()
                    .map(|tab| self.resolve_creator(Kind::Tab, tab.id)),
            )
            .await;
        }
        Ok(window)
    }

    /// Creates a tab and returns once its "created" event has been claimed.
    pub async fn create_tab_and_wait(&self, properties: CreateTabProperties) -> HostResult<HostTab> {
        self.expect(Kind::Tab, 1);
        let tab = match self.host.create_tab(properties).await {
            Ok(tab) => tab,
            Err(e) => {
                self.retract(Kind::Tab, 1);
                log::warn!("pending_create_failed kind=tab error={}", e);
                return Err(e);
            }
        };
        self.resolve_creator(Kind::Tab, tab.id).await;
        Ok(tab)
    }

    /// Listener side for window "created" events.
    pub async fn is_new_window_extension_generated(&self, window_id: HostId) -> bool {
        self.resolve_listener(Kind::Window, window_id).await
    }

    /// Listener side for tab "created" and "attached" events.
    pub async fn is_new_tab_extension_generated(&self, tab_id: HostId) -> bool {
        self.resolve_listener(Kind::Tab, tab_id).await
    }

    fn expect(&self, kind: Kind, count: usize) {
        if count == 0 {
            return;
        }
        self.state.lock().queue(kind).count += count;
        self.notify();
    }

    fn retract(&self, kind: Kind, count: usize) {
        if count == 0 {
            return;
        }
        {
            let mut state = self.state.lock();
            let queue = state.queue(kind);
            queue.count = queue.count.saturating_sub(count);
        }
        self.notify();
    }

    fn notify(&self) {
        self.changed.send_modify(|version| *version = version.wrapping_add(1));
    }

    async fn resolve_creator(&self, kind: Kind, id: HostId) {
        {
            let mut state = self.state.lock();
            state.queue(kind).items.entry(id).or_default().creator_resolved = true;
        }
        self.notify();

        let matched = self
            .wait_until(|state| {
                let item = state.queue(kind).items.get_mut(&id)?;
                if item.creator_resolved && item.listener_resolved {
                    item.complete = true;
                    Some(true)
                } else {
                    None
                }
            })
            .await;

        match matched {
            Some(_) => self.notify(),
            None => {
                log::warn!("pending_creator_timeout kind={} id={}", kind.label(), id);
                {
                    let mut state = self.state.lock();
                    let queue = state.queue(kind);
                    queue.items.remove(&id);
                    queue.count = queue.count.saturating_sub(1);
                }
                self.notify();
            }
        }
    }

    async fn resolve_listener(&self, kind: Kind, id: HostId) -> bool {
        {
            let mut state = self.state.lock();
            let queue = state.queue(kind);
            if queue.count == 0 {
                return false;
            }
            queue.items.entry(id).or_default().listener_resolved = true;
        }
        self.notify();

        let outcome = self
            .wait_until(|state| {
                let queue = state.queue(kind);
                if queue.items.get(&id).is_some_and(|item| item.complete) {
                    queue.items.remove(&id);
                    queue.count = queue.count.saturating_sub(1);
                    return Some(true);
                }
                if queue.count == 0 {
                    queue.items.remove(&id);
                    return Some(false);
                }
                None
            })
            .await;

        let extension_generated = match outcome {
            Some(result) => result,
            None => {
                log::warn!("pending_listener_timeout kind={} id={}", kind.label(), id);
                self.state.lock().queue(kind).items.remove(&id);
                false
            }
        };
        self.notify();
        extension_generated
    }

    /// Re-runs `check` after every state change until it yields a value or
    /// the wait timeout elapses.
    async fn wait_until<T>(&self, mut check: impl FnMut(&mut PendingState) -> Option<T>) -> Option<T> {
        let mut changes = self.changed.subscribe();
        let wait = async {
            loop {
                let outcome = {
                    let mut state = self.state.lock();
                    check(&mut *state)
                };
                if let Some(value) = outcome {
                    return Some(value);
                }
                if changes.changed().await.is_err() {
                    return None;
                }
            }
        };
        tokio::time::timeout(self.wait_timeout, wait).await.ok().flatten()
    }
}
