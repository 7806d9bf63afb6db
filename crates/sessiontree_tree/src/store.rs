//! Arena-backed tree store.

use std::collections::{HashMap, HashSet};

use crate::error::{TreeError, TreeResult};
use crate::model::{
    HostId, LOADED_HOST_ID, NewTab, NewWindow, SAVED_HOST_ID, State, Tab, Uid, Window,
    WindowRecord, is_live_host_id,
};
use crate::uid::{UidGenerator, UidSet};

/// Owns every window and tab of the session tree.
///
/// Windows are kept in display order in `window_order`; each window keeps
/// its tabs' uids in display order. Tabs and windows live in uid-keyed maps
/// so parent links and lookups never hold references into each other.
#[derive(Debug, Default)]
pub struct TreeStore {
    pub(crate) window_order: Vec<Uid>,
    pub(crate) windows: HashMap<Uid, Window>,
    pub(crate) tabs: HashMap<Uid, Tab>,
    pub(crate) existing_uids: UidSet,
    uid_generator: UidGenerator,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uid_generator(uid_generator: UidGenerator) -> Self {
        Self {
            uid_generator,
            ..Self::default()
        }
    }

    /// Allocates a fresh uid and registers it as taken.
    pub fn create_uid(&mut self) -> Uid {
        self.uid_generator.create(&mut self.existing_uids)
    }

    pub fn contains_uid(&self, uid: &Uid) -> bool {
        self.existing_uids.contains(uid)
    }

    pub fn window(&self, uid: &Uid) -> Option<&Window> {
        self.windows.get(uid)
    }

    pub fn window_mut(&mut self, uid: &Uid) -> Option<&mut Window> {
        self.windows.get_mut(uid)
    }

    pub fn tab(&self, uid: &Uid) -> Option<&Tab> {
        self.tabs.get(uid)
    }

    pub fn tab_mut(&mut self, uid: &Uid) -> Option<&mut Tab> {
        self.tabs.get_mut(uid)
    }

    /// Windows in display order.
    pub fn windows(&self) -> impl Iterator<Item = &Window> + '_ {
        self.window_order
            .iter()
            .filter_map(|uid| self.windows.get(uid))
    }

    pub fn window_uids(&self) -> &[Uid] {
        &self.window_order
    }

    pub fn window_count(&self) -> usize {
        self.window_order.len()
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window_order.is_empty()
    }

    /// Tabs of a window in display order.
    pub fn tabs_in_window(&self, window_uid: &Uid) -> Vec<&Tab> {
        self.windows
            .get(window_uid)
            .map(|window| {
                window
                    .tabs
                    .iter()
                    .filter_map(|uid| self.tabs.get(uid))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// OPEN and DISCARDED tabs of a window, in display order. Positions in
    /// this list match the browser's own tab indices.
    pub fn live_tabs(&self, window_uid: &Uid) -> Vec<&Tab> {
        self.tabs_in_window(window_uid)
            .into_iter()
            .filter(|tab| tab.state.is_live())
            .collect()
    }

    pub fn window_index(&self, uid: &Uid) -> Option<usize> {
        self.window_order.iter().position(|w| w == uid)
    }

    /// Position of a tab within its window's full tab list.
    pub fn tab_index(&self, tab_uid: &Uid) -> Option<usize> {
        let tab = self.tabs.get(tab_uid)?;
        self.windows
            .get(&tab.window_uid)?
            .tabs
            .iter()
            .position(|uid| uid == tab_uid)
    }

    pub fn find_window_by_host_id(&self, id: HostId) -> Option<&Window> {
        if !is_live_host_id(id) {
            return None;
        }
        self.windows().find(|window| window.id == id)
    }

    pub fn find_tab_in_window(&self, window_uid: &Uid, tab_id: HostId) -> Option<&Tab> {
        if !is_live_host_id(tab_id) {
            return None;
        }
        self.tabs_in_window(window_uid)
            .into_iter()
            .find(|tab| tab.id == tab_id)
    }

    /// Finds a live tab by host id anywhere in the tree.
    pub fn find_tab_by_host_id(&self, tab_id: HostId) -> Option<&Tab> {
        if !is_live_host_id(tab_id) {
            return None;
        }
        self.tabs
            .values()
            .find(|tab| tab.id == tab_id && tab.state.is_live())
    }

    pub fn active_window(&self) -> Option<&Window> {
        self.windows().find(|window| window.active)
    }

    /// Inserts an empty window. Callers add its tabs right after.
    pub fn add_window(&mut self, new_window: NewWindow) -> Uid {
        let uid = self.create_uid();
        let window = Window {
            uid: uid.clone(),
            id: new_window.id,
            state: new_window.state,
            active: new_window.active,
            active_tab_id: new_window.active_tab_id,
            selected: false,
            collapsed: false,
            window_position: new_window.window_position,
            saved_time: new_window.saved_time,
            indent_level: 0,
            tabs: Vec::new(),
        };
        let len = self.window_order.len();
        let index = new_window.index.map_or(len, |index| index.min(len));
        self.window_order.insert(index, uid.clone());
        self.windows.insert(uid.clone(), window);
        uid
    }

    /// Inserts a tab and returns its uid.
    ///
    /// With an index and an explicit parent the tab becomes that parent's
    /// child. With an index and no parent it joins the hierarchy level of
    /// the tab currently at that index. Without an index it is appended as
    /// a root tab.
    pub fn add_tab(&mut self, new_tab: NewTab) -> TreeResult<Uid> {
        if let Some(uid) = &new_tab.uid
            && (self.tabs.contains_key(uid) || self.windows.contains_key(uid))
        {
            return Err(TreeError::DuplicateUid(uid.to_string()));
        }
        if new_tab.state.is_live()
            && let Some(existing) = self.find_tab_by_host_id(new_tab.id)
        {
            return Err(TreeError::InvalidState(format!(
                "host tab {} is already tracked as {}",
                new_tab.id, existing.uid
            )));
        }
        let Some(window) = self.windows.get(&new_tab.window_uid) else {
            return Err(TreeError::NotFound(format!("window {}", new_tab.window_uid)));
        };

        let window_len = window.tabs.len();
        let mut parent_uid = None;
        let mut indent_level = 1;
        let index = match new_tab.index {
            Some(index) => {
                let index = if index > window_len {
                    log::warn!(
                        "tab_index_clamped window={} index={} len={}",
                        new_tab.window_uid,
                        index,
                        window_len
                    );
                    window_len
                } else {
                    index
                };
                match &new_tab.parent_uid {
                    Some(requested) => match self
                        .tabs
                        .get(requested)
                        .filter(|parent| parent.window_uid == new_tab.window_uid)
                    {
                        Some(parent) => {
                            parent_uid = Some(parent.uid.clone());
                            indent_level = parent.indent_level + 1;
                        }
                        None => log::warn!(
                            "tab_parent_missing window={} parent={}",
                            new_tab.window_uid,
                            requested
                        ),
                    },
                    None => {
                        if let Some(right) = window.tabs.get(index).and_then(|u| self.tabs.get(u)) {
                            parent_uid = right.parent_uid.clone();
                            indent_level = right.indent_level;
                        }
                    }
                }
                index
            }
            None => window_len,
        };

        let uid = match new_tab.uid {
            Some(uid) => {
                self.existing_uids.insert(uid.clone());
                uid
            }
            None => self.create_uid(),
        };

        if let Some(parent) = parent_uid.as_ref().and_then(|p| self.tabs.get_mut(p)) {
            parent.is_parent = true;
        }

        let tab = Tab {
            uid: uid.clone(),
            id: new_tab.id,
            window_uid: new_tab.window_uid.clone(),
            state: new_tab.state,
            title: new_tab.title,
            url: new_tab.url,
            parent_uid,
            indent_level,
            is_parent: false,
            is_visible: true,
            collapsed: false,
            pinned: new_tab.pinned,
            active: new_tab.active,
            selected: new_tab.selected,
            saved_time: None,
            loading_status: None,
        };
        self.tabs.insert(uid.clone(), tab);
        if let Some(window) = self.windows.get_mut(&new_tab.window_uid) {
            window.tabs.insert(index, uid.clone());
        }
        self.recompute_session_tree();
        Ok(uid)
    }

    /// Removes a tab, lifting its children one level up to its parent.
    /// A window left without tabs is removed as well.
    pub fn remove_tab(&mut self, uid: &Uid) -> TreeResult<Tab> {
        let Some(tab) = self.tabs.get(uid) else {
            return Err(TreeError::NotFound(format!("tab {}", uid)));
        };
        let window_uid = tab.window_uid.clone();
        let parent_uid = tab.parent_uid.clone();
        let children_map = self.children_map(&window_uid);
        let children = children_map
            .get(&Some(uid.clone()))
            .cloned()
            .unwrap_or_default();

        if children.is_empty() {
            if let Some(parent_uid) = &parent_uid {
                let siblings = children_map
                    .get(&Some(parent_uid.clone()))
                    .map_or(0, Vec::len);
                if siblings <= 1
                    && let Some(parent) = self.tabs.get_mut(parent_uid)
                {
                    parent.is_parent = false;
                }
            }
        } else {
            for child in &children {
                if let Some(child) = self.tabs.get_mut(child) {
                    child.parent_uid = parent_uid.clone();
                }
            }
            self.decrease_indent_recursively(&children, &children_map);
        }

        let removed = self
            .tabs
            .remove(uid)
            .ok_or_else(|| TreeError::NotFound(format!("tab {}", uid)))?;
        self.existing_uids.remove(uid);

        let window_empty = match self.windows.get_mut(&window_uid) {
            Some(window) => {
                window.tabs.retain(|t| t != uid);
                window.tabs.is_empty()
            }
            None => false,
        };
        if window_empty {
            log::info!("window_removed_empty window={}", window_uid);
            self.drop_window(&window_uid);
        }
        self.recompute_session_tree();
        Ok(removed)
    }

    /// Removes a window together with all of its tabs.
    pub fn remove_window(&mut self, uid: &Uid) -> TreeResult<Window> {
        let window = self
            .drop_window(uid)
            .ok_or_else(|| TreeError::NotFound(format!("window {}", uid)))?;
        self.recompute_session_tree();
        Ok(window)
    }

    fn drop_window(&mut self, uid: &Uid) -> Option<Window> {
        let window = self.windows.remove(uid)?;
        for tab_uid in &window.tabs {
            self.tabs.remove(tab_uid);
            self.existing_uids.remove(tab_uid);
        }
        self.window_order.retain(|w| w != uid);
        self.existing_uids.remove(uid);
        Some(window)
    }

    /// Moves a window to `index` in the window list.
    pub fn move_window(&mut self, uid: &Uid, index: usize) -> TreeResult<()> {
        let Some(current) = self.window_index(uid) else {
            return Err(TreeError::NotFound(format!("window {}", uid)));
        };
        self.window_order.remove(current);
        let index = index.min(self.window_order.len());
        self.window_order.insert(index, uid.clone());
        Ok(())
    }

    /// Relocates a tab inside the tree, keeping its uid and host id.
    ///
    /// `index` is interpreted after the tab has been taken out of its
    /// current window; `None` appends it as a root tab. Returns `false`
    /// when the tab already sits at the requested place.
    pub fn move_tab_in_tree(
        &mut self,
        uid: &Uid,
        target_window_uid: &Uid,
        index: Option<usize>,
        parent_uid: Option<Uid>,
    ) -> TreeResult<bool> {
        let Some(tab) = self.tabs.get(uid) else {
            return Err(TreeError::NotFound(format!("tab {}", uid)));
        };
        let Some(target) = self.windows.get(target_window_uid) else {
            return Err(TreeError::NotFound(format!("window {}", target_window_uid)));
        };
        if tab.window_uid == *target_window_uid {
            if target.tabs.len() == 1 {
                return Ok(false);
            }
            let current = target.tabs.iter().position(|t| t == uid);
            if index.is_some() && current == index && tab.parent_uid == parent_uid {
                return Ok(false);
            }
        }

        let removed = self.remove_tab(uid)?;
        if !self.windows.contains_key(target_window_uid) {
            return Err(TreeError::InvalidState(format!(
                "window {} vanished while moving tab {}",
                target_window_uid, uid
            )));
        }
        self.add_tab(NewTab {
            window_uid: target_window_uid.clone(),
            id: removed.id,
            state: removed.state,
            title: removed.title,
            url: removed.url,
            active: removed.active,
            selected: removed.selected,
            pinned: removed.pinned,
            index,
            parent_uid,
            uid: Some(removed.uid),
        })?;
        if let Some(tab) = self.tabs.get_mut(uid) {
            tab.saved_time = removed.saved_time;
            tab.loading_status = removed.loading_status;
        }
        Ok(true)
    }

    /// Inserts a SAVED copy of a window and its tabs at `index`. Every copied
    /// node gets a fresh uid; the hierarchy is carried over.
    pub fn duplicate_window(&mut self, uid: &Uid, index: usize, saved_time: i64) -> TreeResult<Uid> {
        let Some(source) = self.windows.get(uid).cloned() else {
            return Err(TreeError::NotFound(format!("window {}", uid)));
        };
        let source_tabs: Vec<Tab> = source
            .tabs
            .iter()
            .filter_map(|t| self.tabs.get(t).cloned())
            .collect();

        let window_uid = self.add_window(NewWindow {
            window_position: source.window_position,
            saved_time: Some(saved_time),
            index: Some(index),
            ..NewWindow::new(SAVED_HOST_ID, State::Saved)
        });
        if let Some(window) = self.windows.get_mut(&window_uid) {
            window.collapsed = source.collapsed;
        }

        let mapping: HashMap<Uid, Uid> = source_tabs
            .iter()
            .map(|tab| (tab.uid.clone(), self.create_uid()))
            .collect();
        let mut tab_uids = Vec::with_capacity(source_tabs.len());
        for tab in source_tabs {
            let Some(new_uid) = mapping.get(&tab.uid).cloned() else {
                continue;
            };
            let copy = Tab {
                uid: new_uid.clone(),
                id: SAVED_HOST_ID,
                window_uid: window_uid.clone(),
                state: State::Saved,
                parent_uid: tab.parent_uid.as_ref().and_then(|p| mapping.get(p)).cloned(),
                active: false,
                selected: false,
                saved_time: Some(saved_time),
                loading_status: None,
                ..tab
            };
            self.tabs.insert(new_uid.clone(), copy);
            tab_uids.push(new_uid);
        }
        if let Some(window) = self.windows.get_mut(&window_uid) {
            window.tabs = tab_uids;
        }
        self.repair_hierarchy(&window_uid);
        self.recompute_session_tree();
        Ok(window_uid)
    }

    pub fn deselect_all(&mut self) {
        for window in self.windows.values_mut() {
            window.selected = false;
        }
        for tab in self.tabs.values_mut() {
            tab.selected = false;
        }
    }

    pub fn clear(&mut self) {
        self.window_order.clear();
        self.windows.clear();
        self.tabs.clear();
        self.existing_uids.clear();
    }

    /// Deep copy of the tree in its persisted shape.
    pub fn snapshot_records(&self) -> Vec<WindowRecord> {
        self.windows()
            .map(|window| WindowRecord {
                uid: Some(window.uid.clone()),
                id: window.id,
                state: window.state,
                active: window.active,
                active_tab_id: window.active_tab_id,
                selected: window.selected,
                collapsed: window.collapsed,
                window_position: window.window_position,
                saved_time: window.saved_time,
                indent_level: window.indent_level,
                tabs: window
                    .tabs
                    .iter()
                    .filter_map(|uid| self.tabs.get(uid))
                    .map(Tab::to_record)
                    .collect(),
            })
            .collect()
    }

    /// Replaces the tree with records read from storage. Every node comes
    /// back SAVED with the "loaded" host id; a missing saved time is
    /// backfilled with `now_ms`.
    pub fn load_saved_records(&mut self, records: Vec<WindowRecord>, now_ms: i64) {
        self.ingest_records(records, Some(now_ms));
    }

    /// Replaces the tree with records as given, states included.
    pub fn replace_with_records(&mut self, records: Vec<WindowRecord>) {
        self.ingest_records(records, None);
    }

    fn ingest_records(&mut self, records: Vec<WindowRecord>, normalize_at: Option<i64>) {
        self.clear();
        for record in records {
            if record.tabs.is_empty() {
                log::warn!("window_record_skipped reason=no_tabs uid={:?}", record.uid);
                continue;
            }
            let window_uid = self.claim_uid(record.uid);
            let mut window = Window {
                uid: window_uid.clone(),
                id: record.id,
                state: record.state,
                active: record.active,
                active_tab_id: record.active_tab_id,
                selected: record.selected,
                collapsed: record.collapsed,
                window_position: record.window_position,
                saved_time: record.saved_time,
                indent_level: 0,
                tabs: Vec::with_capacity(record.tabs.len()),
            };
            if let Some(now_ms) = normalize_at {
                window.id = LOADED_HOST_ID;
                window.state = State::Saved;
                window.active = false;
                window.active_tab_id = None;
                window.selected = false;
                window.saved_time.get_or_insert(now_ms);
            }

            for record in record.tabs {
                let tab_uid = self.claim_uid(record.uid);
                let mut tab = Tab {
                    uid: tab_uid.clone(),
                    id: record.id,
                    window_uid: window_uid.clone(),
                    state: record.state,
                    title: record.title,
                    url: record.url,
                    parent_uid: record.parent_uid,
                    indent_level: record.indent_level.unwrap_or(0),
                    is_parent: record.is_parent,
                    is_visible: true,
                    collapsed: record.collapsed,
                    pinned: record.pinned,
                    active: record.active,
                    selected: record.selected,
                    saved_time: record.saved_time,
                    loading_status: record.loading_status,
                };
                if let Some(now_ms) = normalize_at {
                    tab.id = LOADED_HOST_ID;
                    tab.state = State::Saved;
                    tab.active = false;
                    tab.selected = false;
                    tab.saved_time.get_or_insert(now_ms);
                }
                window.tabs.push(tab_uid.clone());
                self.tabs.insert(tab_uid, tab);
            }

            self.window_order.push(window_uid.clone());
            self.windows.insert(window_uid.clone(), window);
            self.repair_hierarchy(&window_uid);
        }
        self.recompute_session_tree();
    }

    fn claim_uid(&mut self, uid: Option<Uid>) -> Uid {
        match uid {
            Some(uid) if !uid.as_str().is_empty() && self.existing_uids.insert(uid.clone()) => uid,
            Some(uid) => {
                log::warn!("uid_reassigned reason=duplicate uid={}", uid);
                self.create_uid()
            }
            None => self.create_uid(),
        }
    }

    /// Makes a window's parent links, indent levels and parent flags agree.
    ///
    /// A parent must be an earlier tab of the same window; links that break
    /// this are cut and the tab becomes a root.
    pub(crate) fn repair_hierarchy(&mut self, window_uid: &Uid) {
        let Some(order) = self.windows.get(window_uid).map(|w| w.tabs.clone()) else {
            return;
        };
        let mut seen: HashMap<Uid, u32> = HashMap::new();
        let mut parents: HashSet<Uid> = HashSet::new();
        for uid in &order {
            let Some(tab) = self.tabs.get_mut(uid) else {
                continue;
            };
            let parent_indent = tab.parent_uid.as_ref().and_then(|p| seen.get(p).copied());
            match (parent_indent, &tab.parent_uid) {
                (Some(indent), Some(parent)) => {
                    parents.insert(parent.clone());
                    tab.indent_level = indent + 1;
                }
                (None, Some(parent)) => {
                    log::warn!("tab_parent_cut tab={} parent={}", tab.uid, parent);
                    tab.parent_uid = None;
                    tab.indent_level = 1;
                }
                (_, None) => tab.indent_level = 1,
            }
            seen.insert(uid.clone(), tab.indent_level);
        }
        for uid in &order {
            if let Some(tab) = self.tabs.get_mut(uid) {
                tab.is_parent = parents.contains(uid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_tab, open_window};

    #[test]
    fn add_tab_appends_root_tabs() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let a = store.add_tab(open_tab(&window, 10)).unwrap();
        let b = store.add_tab(open_tab(&window, 11)).unwrap();
        assert_eq!(store.window(&window).unwrap().tab_uids(), &[a, b.clone()]);
        let b = store.tab(&b).unwrap();
        assert_eq!(b.indent_level, 1);
        assert!(b.parent_uid.is_none());
        store.validate().unwrap();
    }

    #[test]
    fn add_tab_with_parent_nests_under_it() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let parent = store.add_tab(open_tab(&window, 10)).unwrap();
        let child = store
            .add_tab(NewTab {
                index: Some(1),
                parent_uid: Some(parent.clone()),
                ..open_tab(&window, 11)
            })
            .unwrap();
        assert!(store.tab(&parent).unwrap().is_parent);
        let child = store.tab(&child).unwrap();
        assert_eq!(child.indent_level, 2);
        assert_eq!(child.parent_uid.as_ref(), Some(&parent));
        store.validate().unwrap();
    }

    #[test]
    fn add_tab_at_index_adopts_right_neighbour_level() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let parent = store.add_tab(open_tab(&window, 10)).unwrap();
        store
            .add_tab(NewTab {
                index: Some(1),
                parent_uid: Some(parent.clone()),
                ..open_tab(&window, 11)
            })
            .unwrap();
        let inserted = store
            .add_tab(NewTab {
                index: Some(1),
                ..open_tab(&window, 12)
            })
            .unwrap();
        let inserted = store.tab(&inserted).unwrap();
        assert_eq!(inserted.parent_uid.as_ref(), Some(&parent));
        assert_eq!(inserted.indent_level, 2);
        store.validate().unwrap();
    }

    #[test]
    fn add_tab_rejects_duplicate_uid_and_missing_window() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let a = store.add_tab(open_tab(&window, 10)).unwrap();
        let duplicate = store.add_tab(NewTab {
            uid: Some(a),
            ..open_tab(&window, 11)
        });
        assert!(matches!(duplicate, Err(TreeError::DuplicateUid(_))));
        let missing = store.add_tab(open_tab(&Uid::from("nope"), 12));
        assert!(matches!(missing, Err(TreeError::NotFound(_))));
    }

    #[test]
    fn add_tab_rejects_second_live_tab_with_same_host_id() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        store.add_tab(open_tab(&window, 10)).unwrap();
        let result = store.add_tab(open_tab(&window, 10));
        assert!(matches!(result, Err(TreeError::InvalidState(_))));
    }

    #[test]
    fn remove_tab_reparents_children() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let a = store.add_tab(open_tab(&window, 10)).unwrap();
        let b = store
            .add_tab(NewTab {
                index: Some(1),
                parent_uid: Some(a.clone()),
                ..open_tab(&window, 11)
            })
            .unwrap();
        let c = store
            .add_tab(NewTab {
                index: Some(2),
                parent_uid: Some(b.clone()),
                ..open_tab(&window, 12)
            })
            .unwrap();

        store.remove_tab(&a).unwrap();
        let b_tab = store.tab(&b).unwrap();
        assert!(b_tab.parent_uid.is_none());
        assert_eq!(b_tab.indent_level, 1);
        let c_tab = store.tab(&c).unwrap();
        assert_eq!(c_tab.parent_uid.as_ref(), Some(&b));
        assert_eq!(c_tab.indent_level, 2);
        assert!(!store.contains_uid(&a));
        store.validate().unwrap();
    }

    #[test]
    fn removing_only_child_clears_parent_flag() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let a = store.add_tab(open_tab(&window, 10)).unwrap();
        let b = store
            .add_tab(NewTab {
                index: Some(1),
                parent_uid: Some(a.clone()),
                ..open_tab(&window, 11)
            })
            .unwrap();
        store.remove_tab(&b).unwrap();
        assert!(!store.tab(&a).unwrap().is_parent);
        store.validate().unwrap();
    }

    #[test]
    fn removing_last_tab_removes_window() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let a = store.add_tab(open_tab(&window, 10)).unwrap();
        store.remove_tab(&a).unwrap();
        assert!(store.window(&window).is_none());
        assert!(store.is_empty());
        assert!(!store.contains_uid(&window));
    }

    #[test]
    fn move_tab_in_tree_keeps_uid_and_host_id() {
        let mut store = TreeStore::new();
        let first = open_window(&mut store, 1);
        let second = open_window(&mut store, 2);
        let a = store.add_tab(open_tab(&first, 10)).unwrap();
        store.add_tab(open_tab(&first, 11)).unwrap();
        store.add_tab(open_tab(&second, 20)).unwrap();

        assert!(store.move_tab_in_tree(&a, &second, Some(0), None).unwrap());
        let moved = store.tab(&a).unwrap();
        assert_eq!(moved.window_uid, second);
        assert_eq!(moved.id, 10);
        assert_eq!(store.tab_index(&a), Some(0));
        store.validate().unwrap();
    }

    #[test]
    fn move_tab_in_tree_is_noop_when_in_place() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let a = store.add_tab(open_tab(&window, 10)).unwrap();
        store.add_tab(open_tab(&window, 11)).unwrap();
        assert!(!store.move_tab_in_tree(&a, &window, Some(0), None).unwrap());
    }

    #[test]
    fn duplicate_window_copies_hierarchy_with_new_uids() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let a = store.add_tab(open_tab(&window, 10)).unwrap();
        store
            .add_tab(NewTab {
                index: Some(1),
                parent_uid: Some(a.clone()),
                ..open_tab(&window, 11)
            })
            .unwrap();

        let copy = store.duplicate_window(&window, 1, 1_000).unwrap();
        let tabs = store.tabs_in_window(&copy);
        assert_eq!(tabs.len(), 2);
        assert!(tabs.iter().all(|t| t.state == State::Saved && t.id == SAVED_HOST_ID));
        assert!(tabs[0].is_parent);
        assert_eq!(tabs[1].parent_uid.as_ref(), Some(&tabs[0].uid));
        assert_ne!(tabs[0].uid, a);
        assert_eq!(store.window_uids(), &[window, copy]);
        store.validate().unwrap();
    }

    #[test]
    fn loading_records_normalizes_to_saved() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let a = store.add_tab(open_tab(&window, 10)).unwrap();
        store
            .add_tab(NewTab {
                index: Some(1),
                parent_uid: Some(a.clone()),
                ..open_tab(&window, 11)
            })
            .unwrap();
        let records = store.snapshot_records();

        let mut loaded = TreeStore::new();
        loaded.load_saved_records(records, 42);
        let restored = loaded.window(&window).unwrap();
        assert_eq!(restored.state, State::Saved);
        assert_eq!(restored.id, LOADED_HOST_ID);
        assert_eq!(restored.saved_time, Some(42));
        let tabs = loaded.tabs_in_window(&window);
        assert_eq!(tabs[0].uid, a);
        assert!(tabs[0].is_parent);
        assert_eq!(tabs[1].indent_level, 2);
        assert!(tabs.iter().all(|t| t.state == State::Saved && !t.active));
        loaded.validate().unwrap();
    }

    #[test]
    fn loading_records_repairs_dangling_parents() {
        let json = r#"[{"uid":"w","tabs":[
            {"uid":"a","title":"A","url":"https://a.test","parentUid":"ghost","indentLevel":3}
        ]}]"#;
        let records: Vec<WindowRecord> = serde_json::from_str(json).unwrap();
        let mut store = TreeStore::new();
        store.load_saved_records(records, 1);
        let tab = store.tab(&Uid::from("a")).unwrap();
        assert!(tab.parent_uid.is_none());
        assert_eq!(tab.indent_level, 1);
        store.validate().unwrap();
    }
}
