//! Scriptable browser for tests.
//!
//! [`FakeHost`] keeps an in-memory set of windows and tabs, records every
//! call, can fail the next call of a given name, and raises the same events
//! a browser would. [`Harness`] wires it to a [`SessionTree`] and pumps those
//! events through `handle_host_event` on a background task, the way the
//! extension's event loop does.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sessiontree_host::{
    BrowserHost, CreateTabProperties, CreateWindowProperties, HostError, HostEvent, HostResult,
    HostTab, HostWindow, KeyValueStorage, MemoryStorage, SESSION_TREE_KEY, TabUpdate, WindowType,
    WindowUpdate,
};
use sessiontree_tree::{HostId, LoadingStatus, Uid};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::state::SessionTree;
use crate::settings::Settings;

const NEW_TAB_PAGE: &str = "about:newtab";

#[derive(Default)]
struct Browser {
    next_id: HostId,
    windows: Vec<HostWindow>,
    fail_next: HashSet<String>,
    calls: Vec<String>,
}

impl Browser {
    fn alloc(&mut self) -> HostId {
        self.next_id += 1;
        self.next_id
    }

    fn window_mut(&mut self, window_id: HostId) -> HostResult<&mut HostWindow> {
        self.windows
            .iter_mut()
            .find(|w| w.id == window_id)
            .ok_or_else(|| HostError::NotFound(format!("window {}", window_id)))
    }

    fn find_tab(&self, tab_id: HostId) -> Option<(usize, usize)> {
        self.windows.iter().enumerate().find_map(|(wi, window)| {
            window
                .tabs
                .iter()
                .position(|tab| tab.id == tab_id)
                .map(|ti| (wi, ti))
        })
    }

    fn tab(&self, tab_id: HostId) -> HostResult<HostTab> {
        let (wi, ti) = self
            .find_tab(tab_id)
            .ok_or_else(|| HostError::NotFound(format!("tab {}", tab_id)))?;
        Ok(self.windows[wi].tabs[ti].clone())
    }

    fn new_tab(&mut self, window_id: HostId, url: Option<String>) -> HostTab {
        let url = url.unwrap_or_else(|| NEW_TAB_PAGE.to_string());
        HostTab {
            id: self.alloc(),
            window_id,
            title: Some(url.clone()),
            url: Some(url),
            status: Some(LoadingStatus::Complete),
            ..HostTab::default()
        }
    }

    fn new_window(&mut self, urls: &[String], window_type: WindowType) -> HostWindow {
        let id = self.alloc();
        let focused = self.windows.is_empty();
        let mut window = HostWindow {
            id,
            focused,
            window_type,
            left: Some(0),
            top: Some(0),
            width: Some(800),
            height: Some(600),
            tabs: Vec::new(),
        };
        let urls: Vec<Option<String>> = if urls.is_empty() {
            vec![None]
        } else {
            urls.iter().cloned().map(Some).collect()
        };
        for url in urls {
            let tab = self.new_tab(id, url);
            window.tabs.push(tab);
        }
        window.tabs[0].active = true;
        reindex(&mut window);
        window
    }

    /// Takes a tab out of its window. Returns the tab, its old position and
    /// whether the window closed because of it.
    fn take_tab(&mut self, tab_id: HostId) -> Option<(HostTab, usize, bool)> {
        let (wi, ti) = self.find_tab(tab_id)?;
        let tab = self.windows[wi].tabs.remove(ti);
        let emptied = self.windows[wi].tabs.is_empty();
        if emptied {
            self.windows.remove(wi);
        } else {
            let window = &mut self.windows[wi];
            if tab.active && !window.tabs.iter().any(|t| t.active) {
                let idx = ti.min(window.tabs.len() - 1);
                window.tabs[idx].active = true;
            }
            reindex(window);
        }
        Some((tab, ti, emptied))
    }
}

fn reindex(window: &mut HostWindow) {
    for (index, tab) in window.tabs.iter_mut().enumerate() {
        tab.index = index;
        tab.window_id = window.id;
    }
}

pub struct FakeHost {
    browser: Mutex<Browser>,
    events: mpsc::UnboundedSender<HostEvent>,
    emitted: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<HostEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let host = Arc::new(Self {
            browser: Mutex::new(Browser {
                next_id: 100,
                ..Browser::default()
            }),
            events,
            emitted: AtomicUsize::new(0),
        });
        (host, receiver)
    }

    pub fn emit(&self, event: HostEvent) {
        self.emitted.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.send(event);
    }

    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, call: &str) {
        self.browser.lock().fail_next.insert(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.browser.lock().calls.clone()
    }

    pub fn calls_named(&self, call: &str) -> usize {
        self.browser.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn window(&self, window_id: HostId) -> Option<HostWindow> {
        self.browser
            .lock()
            .windows
            .iter()
            .find(|w| w.id == window_id)
            .cloned()
    }

    pub fn window_count(&self) -> usize {
        self.browser.lock().windows.len()
    }

    pub fn tab(&self, tab_id: HostId) -> Option<HostTab> {
        self.browser.lock().tab(tab_id).ok()
    }

    fn record(&self, call: &str) -> HostResult<()> {
        let mut browser = self.browser.lock();
        browser.calls.push(call.to_string());
        if browser.fail_next.remove(call) {
            return Err(HostError::CallFailed(format!("{} (scripted)", call)));
        }
        Ok(())
    }

    /// A window that was already open before the tree started. No events.
    pub fn seed_window(&self, urls: &[&str]) -> HostWindow {
        let urls: Vec<String> = urls.iter().map(|u| u.to_string()).collect();
        let mut browser = self.browser.lock();
        let window = browser.new_window(&urls, WindowType::Normal);
        browser.windows.push(window.clone());
        window
    }

    pub fn user_open_window(&self, urls: &[&str]) -> HostWindow {
        let window = self.seed_window(urls);
        self.emit(HostEvent::WindowCreated(window.clone()));
        for tab in &window.tabs {
            self.emit(HostEvent::TabCreated(tab.clone()));
        }
        window
    }

    pub fn user_open_tab(&self, window_id: HostId, url: &str, index: Option<usize>) -> HostTab {
        let tab = {
            let mut browser = self.browser.lock();
            let mut tab = browser.new_tab(window_id, Some(url.to_string()));
            let Ok(window) = browser.window_mut(window_id) else {
                panic!("no window {window_id}");
            };
            let index = index.unwrap_or(window.tabs.len()).min(window.tabs.len());
            tab.index = index;
            window.tabs.insert(index, tab.clone());
            reindex(window);
            tab
        };
        self.emit(HostEvent::TabCreated(tab.clone()));
        tab
    }

    pub fn user_close_window(&self, window_id: HostId) {
        let removed = {
            let mut browser = self.browser.lock();
            let position = browser.windows.iter().position(|w| w.id == window_id);
            position.map(|index| browser.windows.remove(index))
        };
        let Some(window) = removed else {
            return;
        };
        for tab in &window.tabs {
            self.emit(HostEvent::TabRemoved {
                tab_id: tab.id,
                window_id,
                is_window_closing: true,
            });
        }
        self.emit(HostEvent::WindowRemoved { window_id });
    }

    pub fn user_close_tab(&self, tab_id: HostId) {
        let taken = self.browser.lock().take_tab(tab_id);
        let Some((tab, _, emptied)) = taken else {
            return;
        };
        self.emit(HostEvent::TabRemoved {
            tab_id,
            window_id: tab.window_id,
            is_window_closing: emptied,
        });
        if emptied {
            self.emit(HostEvent::WindowRemoved {
                window_id: tab.window_id,
            });
        }
    }

    pub fn user_move_tab(&self, tab_id: HostId, to_index: usize) {
        let moved = {
            let mut browser = self.browser.lock();
            browser.find_tab(tab_id).map(|(wi, from)| {
                let window = &mut browser.windows[wi];
                let tab = window.tabs.remove(from);
                let to = to_index.min(window.tabs.len());
                window.tabs.insert(to, tab);
                reindex(window);
                (window.id, from, to)
            })
        };
        if let Some((window_id, from_index, to_index)) = moved {
            self.emit(HostEvent::TabMoved {
                tab_id,
                window_id,
                from_index,
                to_index,
            });
        }
    }

    /// Moves a tab between windows and raises detach/attach events.
    fn transfer_tab(&self, tab_id: HostId, window_id: HostId, index: usize) -> HostResult<HostTab> {
        let (tab, old_position, old_window_id, emptied) = {
            let mut browser = self.browser.lock();
            browser.window_mut(window_id)?;
            let (mut tab, old_position, emptied) = browser
                .take_tab(tab_id)
                .ok_or_else(|| HostError::NotFound(format!("tab {}", tab_id)))?;
            let old_window_id = tab.window_id;
            let window = browser.window_mut(window_id)?;
            let index = index.min(window.tabs.len());
            tab.active = false;
            window.tabs.insert(index, tab);
            reindex(window);
            (window.tabs[index].clone(), old_position, old_window_id, emptied)
        };
        self.emit(HostEvent::TabDetached {
            tab_id,
            old_window_id,
            old_position,
        });
        self.emit(HostEvent::TabAttached {
            tab_id,
            new_window_id: window_id,
            new_position: tab.index,
        });
        if emptied {
            self.emit(HostEvent::WindowRemoved {
                window_id: old_window_id,
            });
        }
        Ok(tab)
    }
}

#[async_trait]
impl BrowserHost for FakeHost {
    async fn create_window(&self, properties: CreateWindowProperties) -> HostResult<HostWindow> {
        self.record("create_window")?;
        let window_type = properties.window_type.unwrap_or_default();
        let window = {
            let mut browser = self.browser.lock();
            let mut window = browser.new_window(&properties.urls, window_type);
            // Windows built around existing tabs start empty.
            if properties.urls.is_empty() && !properties.tab_ids.is_empty() {
                window.tabs.clear();
            }
            if let Some(position) = properties.position {
                window.left = Some(position.left);
                window.top = Some(position.top);
                window.width = Some(position.width);
                window.height = Some(position.height);
            }
            browser.windows.push(window.clone());
            window
        };
        self.emit(HostEvent::WindowCreated(window.clone()));
        for tab in &window.tabs {
            self.emit(HostEvent::TabCreated(tab.clone()));
        }
        for tab_id in &properties.tab_ids {
            let index = self.window(window.id).map_or(0, |w| w.tabs.len());
            self.transfer_tab(*tab_id, window.id, index)?;
        }
        self.window(window.id)
            .ok_or_else(|| HostError::NotFound(format!("window {}", window.id)))
    }

    async fn get_window(&self, window_id: HostId) -> HostResult<HostWindow> {
        self.record("get_window")?;
        self.window(window_id)
            .ok_or_else(|| HostError::NotFound(format!("window {}", window_id)))
    }

    async fn get_all_windows(&self) -> HostResult<Vec<HostWindow>> {
        self.record("get_all_windows")?;
        Ok(self.browser.lock().windows.clone())
    }

    async fn update_window(&self, window_id: HostId, update: WindowUpdate) -> HostResult<HostWindow> {
        self.record("update_window")?;
        let (window, focus_changed) = {
            let mut browser = self.browser.lock();
            let focus = update.focused == Some(true);
            let was_focused = browser.window_mut(window_id)?.focused;
            if focus {
                for window in &mut browser.windows {
                    window.focused = false;
                }
            }
            let window = browser.window_mut(window_id)?;
            if focus {
                window.focused = true;
            }
            window.left = update.left.or(window.left);
            window.top = update.top.or(window.top);
            window.width = update.width.or(window.width);
            window.height = update.height.or(window.height);
            (window.clone(), focus && !was_focused)
        };
        if focus_changed {
            self.emit(HostEvent::WindowFocusChanged { window_id });
        }
        Ok(window)
    }

    async fn remove_window(&self, window_id: HostId) -> HostResult<()> {
        self.record("remove_window")?;
        if self.window(window_id).is_none() {
            return Err(HostError::NotFound(format!("window {}", window_id)));
        }
        self.user_close_window(window_id);
        Ok(())
    }

    async fn create_tab(&self, properties: CreateTabProperties) -> HostResult<HostTab> {
        self.record("create_tab")?;
        let tab = {
            let mut browser = self.browser.lock();
            let window_id = properties
                .window_id
                .ok_or_else(|| HostError::InvalidResponse("create_tab without window".to_string()))?;
            browser.window_mut(window_id)?;
            let mut tab = browser.new_tab(window_id, properties.url.clone());
            tab.discarded = properties.discarded.unwrap_or(false);
            tab.pinned = properties.pinned.unwrap_or(false);
            tab.active = properties.active.unwrap_or(true);
            if let Some(title) = properties.title.clone() {
                tab.title = Some(title);
            }
            let window = browser.window_mut(window_id)?;
            if tab.active {
                for other in &mut window.tabs {
                    other.active = false;
                }
            }
            let index = properties
                .index
                .unwrap_or(window.tabs.len())
                .min(window.tabs.len());
            window.tabs.insert(index, tab);
            reindex(window);
            window.tabs[index].clone()
        };
        self.emit(HostEvent::TabCreated(tab.clone()));
        Ok(tab)
    }

    async fn get_tab(&self, tab_id: HostId) -> HostResult<HostTab> {
        self.record("get_tab")?;
        self.browser.lock().tab(tab_id)
    }

    async fn query_tabs(&self, window_id: HostId) -> HostResult<Vec<HostTab>> {
        self.record("query_tabs")?;
        Ok(self.browser.lock().window_mut(window_id)?.tabs.clone())
    }

    async fn update_tab(&self, tab_id: HostId, update: TabUpdate) -> HostResult<HostTab> {
        self.record("update_tab")?;
        let mut events = Vec::new();
        let tab = {
            let mut browser = self.browser.lock();
            let (wi, mut ti) = browser
                .find_tab(tab_id)
                .ok_or_else(|| HostError::NotFound(format!("tab {}", tab_id)))?;
            let window = &mut browser.windows[wi];
            if update.active == Some(true) && !window.tabs[ti].active {
                let previous_tab_id = window.tabs.iter().find(|t| t.active).map(|t| t.id);
                for other in &mut window.tabs {
                    other.active = false;
                }
                window.tabs[ti].active = true;
                events.push(HostEvent::TabActivated {
                    tab_id,
                    previous_tab_id,
                    window_id: window.id,
                });
            }
            if let Some(pinned) = update.pinned
                && window.tabs[ti].pinned != pinned
            {
                let mut tab = window.tabs.remove(ti);
                tab.pinned = pinned;
                // Pinned tabs end the pinned block; unpinned ones start the rest.
                let to = window.tabs.iter().position(|t| !t.pinned).unwrap_or(window.tabs.len());
                window.tabs.insert(to, tab);
                reindex(window);
                if to != ti {
                    events.push(HostEvent::TabMoved {
                        tab_id,
                        window_id: window.id,
                        from_index: ti,
                        to_index: to,
                    });
                }
                ti = to;
                events.push(HostEvent::TabUpdated(window.tabs[ti].clone()));
            }
            window.tabs[ti].clone()
        };
        for event in events {
            self.emit(event);
        }
        Ok(tab)
    }

    async fn move_tab(&self, tab_id: HostId, window_id: HostId, index: usize) -> HostResult<HostTab> {
        self.record("move_tab")?;
        let current = self.browser.lock().tab(tab_id)?;
        if current.window_id == window_id {
            self.user_move_tab(tab_id, index);
            return self.browser.lock().tab(tab_id);
        }
        self.transfer_tab(tab_id, window_id, index)
    }

    async fn reload_tab(&self, tab_id: HostId) -> HostResult<()> {
        self.record("reload_tab")?;
        self.browser.lock().tab(tab_id).map(|_| ())
    }

    async fn remove_tab(&self, tab_id: HostId) -> HostResult<()> {
        self.record("remove_tab")?;
        if self.tab(tab_id).is_none() {
            return Err(HostError::NotFound(format!("tab {}", tab_id)));
        }
        self.user_close_tab(tab_id);
        Ok(())
    }

    fn extension_url(&self, path: &str) -> String {
        format!("moz-extension://fake{}", path)
    }
}

/// A session tree wired to a [`FakeHost`] with its events pumped in the
/// background.
pub struct Harness {
    pub tree: Arc<SessionTree>,
    pub host: Arc<FakeHost>,
    pub storage: Arc<MemoryStorage>,
    handled: Arc<AtomicUsize>,
    violations: Arc<Mutex<Vec<String>>>,
    pump: JoinHandle<()>,
}

#[derive(Default)]
pub struct HarnessBuilder {
    settings: Settings,
    windows: Vec<Vec<String>>,
    stored_tree: Option<Value>,
    storage: Option<Arc<MemoryStorage>>,
}

impl HarnessBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// A browser window open before startup.
    pub fn window(mut self, urls: &[&str]) -> Self {
        self.windows.push(urls.iter().map(|u| u.to_string()).collect());
        self
    }

    pub fn stored_tree(mut self, tree: Value) -> Self {
        self.stored_tree = Some(tree);
        self
    }

    pub fn storage(mut self, storage: Arc<MemoryStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub async fn start(self) -> Harness {
        let _ = env_logger::builder().is_test(true).try_init();
        let (host, mut events) = FakeHost::new();
        for urls in &self.windows {
            let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
            host.seed_window(&urls);
        }
        let storage = self.storage.unwrap_or_default();
        if let Some(tree) = self.stored_tree {
            storage
                .set(SESSION_TREE_KEY, tree)
                .await
                .expect("memory storage never fails");
        }
        let tree = SessionTree::new(host.clone(), storage.clone(), self.settings);
        tree.initialize_windows().await;

        let handled = Arc::new(AtomicUsize::new(0));
        let violations = Arc::new(Mutex::new(Vec::new()));
        let pump = {
            let tree = tree.clone();
            let handled = handled.clone();
            let violations = violations.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    tree.handle_host_event(event).await;
                    let found = tree.with_state(|state| state.tree.invariant_violations());
                    violations.lock().extend(found);
                    handled.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        Harness {
            tree,
            host,
            storage,
            handled,
            violations,
            pump,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Waits until every event raised so far has been handled.
    pub async fn settle(&self) {
        for _ in 0..5_000 {
            if self.handled.load(Ordering::SeqCst) >= self.host.emitted() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!(
            "host events did not settle: handled={} emitted={}",
            self.handled.load(Ordering::SeqCst),
            self.host.emitted()
        );
    }

    pub fn window_uids(&self) -> Vec<Uid> {
        self.tree.with_state(|state| state.tree.window_uids().to_vec())
    }

    pub fn first_window(&self) -> Uid {
        self.window_uids()
            .into_iter()
            .next()
            .expect("tree has a window")
    }

    pub fn tab_uids(&self, window: &Uid) -> Vec<Uid> {
        self.tree.with_state(|state| {
            state
                .tree
                .window(window)
                .map(|w| w.tab_uids().to_vec())
                .unwrap_or_default()
        })
    }

    pub fn assert_valid(&self) {
        self.tree.with_state(|state| {
            if let Err(e) = state.tree.validate() {
                panic!("tree invariants violated: {e}");
            }
        });
    }

    /// Forgets violations recorded so far, so a test can watch one operation.
    pub fn clear_violations(&self) {
        self.violations.lock().clear();
    }

    /// Like `assert_valid`, but also fails on violations seen after any
    /// handled host event, including those raised while an operation was
    /// still waiting on the browser.
    pub fn assert_valid_throughout(&self) {
        let seen = self.violations.lock().clone();
        assert!(seen.is_empty(), "transient invariant violations: {seen:?}");
        self.assert_valid();
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
