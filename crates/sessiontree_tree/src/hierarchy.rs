//! Parent/child relationships, indentation and visibility.
//!
//! Hierarchy is encoded flat: each tab carries `parent_uid` and
//! `indent_level`, and a tab's subtree is the run of deeper tabs right after
//! it. Visibility is never patched in place; it is recomputed from the
//! collapsed flags after every structural change.

use std::collections::{HashMap, HashSet};

use crate::error::{TreeError, TreeResult};
use crate::model::Uid;
use crate::store::TreeStore;

/// Direct children per parent uid; `None` keys the root tabs. Child lists
/// follow window order.
pub type ChildrenMap = HashMap<Option<Uid>, Vec<Uid>>;

impl TreeStore {
    pub fn children_map(&self, window_uid: &Uid) -> ChildrenMap {
        let mut map = ChildrenMap::new();
        for tab in self.tabs_in_window(window_uid) {
            map.entry(tab.parent_uid.clone())
                .or_default()
                .push(tab.uid.clone());
        }
        map
    }

    /// Backfills indent levels and recomputes visibility for every window.
    pub fn recompute_session_tree(&mut self) {
        let window_uids = self.window_order.clone();
        for window_uid in &window_uids {
            let (tab_uids, window_collapsed) = match self.windows.get_mut(window_uid) {
                Some(window) => {
                    window.indent_level = 0;
                    (window.tabs.clone(), window.collapsed)
                }
                None => continue,
            };
            for uid in &tab_uids {
                if let Some(tab) = self.tabs.get_mut(uid)
                    && tab.indent_level == 0
                {
                    tab.indent_level = 1;
                }
            }
            let children_map = self.children_map(window_uid);
            let roots = children_map.get(&None).cloned().unwrap_or_default();
            self.set_visibility_recursively(&roots, &children_map, !window_collapsed);
        }
    }

    fn set_visibility_recursively(&mut self, uids: &[Uid], children_map: &ChildrenMap, visible: bool) {
        for uid in uids {
            let Some(tab) = self.tabs.get_mut(uid) else {
                continue;
            };
            tab.is_visible = visible;
            let children_visible = visible && !tab.collapsed;
            if let Some(children) = children_map.get(&Some(uid.clone())) {
                self.set_visibility_recursively(children, children_map, children_visible);
            }
        }
    }

    pub(crate) fn increase_indent_recursively(&mut self, uids: &[Uid], children_map: &ChildrenMap) {
        for uid in uids {
            if let Some(tab) = self.tabs.get_mut(uid) {
                tab.indent_level += 1;
            }
            if let Some(children) = children_map.get(&Some(uid.clone())) {
                self.increase_indent_recursively(children, children_map);
            }
        }
    }

    pub(crate) fn decrease_indent_recursively(&mut self, uids: &[Uid], children_map: &ChildrenMap) {
        for uid in uids {
            if let Some(tab) = self.tabs.get_mut(uid) {
                tab.indent_level = tab.indent_level.saturating_sub(1).max(1);
            }
            if let Some(children) = children_map.get(&Some(uid.clone())) {
                self.decrease_indent_recursively(children, children_map);
            }
        }
    }

    pub fn toggle_collapse_tab(&mut self, uid: &Uid) -> TreeResult<()> {
        let tab = self
            .tabs
            .get_mut(uid)
            .ok_or_else(|| TreeError::NotFound(format!("tab {}", uid)))?;
        tab.collapsed = !tab.collapsed;
        self.recompute_session_tree();
        Ok(())
    }

    pub fn toggle_collapse_window(&mut self, uid: &Uid) -> TreeResult<()> {
        let window = self
            .windows
            .get_mut(uid)
            .ok_or_else(|| TreeError::NotFound(format!("window {}", uid)))?;
        window.collapsed = !window.collapsed;
        self.recompute_session_tree();
        Ok(())
    }

    /// True when `ancestor` appears on the parent chain of `uid`.
    pub fn is_descendant_of(&self, uid: &Uid, ancestor: &Uid) -> bool {
        let mut current = self.tabs.get(uid).and_then(|t| t.parent_uid.clone());
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == *ancestor {
                return true;
            }
            steps += 1;
            if steps > self.tabs.len() {
                return false;
            }
            current = self.tabs.get(&parent).and_then(|t| t.parent_uid.clone());
        }
        false
    }

    /// Drops every uid that descends from another uid in the same list, so
    /// subtree operations act once per selected subtree.
    pub fn remove_descendant_tabs(&self, uids: &[Uid]) -> Vec<Uid> {
        let selected: HashSet<&Uid> = uids.iter().collect();
        uids.iter()
            .filter(|uid| {
                !selected
                    .iter()
                    .any(|other| *other != *uid && self.is_descendant_of(uid, other))
            })
            .cloned()
            .collect()
    }

    /// Orders tab uids by window position, then by position inside the
    /// window. Unknown uids are dropped.
    pub fn sort_tabs_by_position(&self, uids: &[Uid]) -> Vec<Uid> {
        let mut keyed: Vec<((usize, usize), Uid)> = uids
            .iter()
            .filter_map(|uid| {
                let tab = self.tabs.get(uid)?;
                let window_index = self.window_index(&tab.window_uid)?;
                let tab_index = self.tab_index(uid)?;
                Some(((window_index, tab_index), uid.clone()))
            })
            .collect();
        keyed.sort_by_key(|(key, _)| *key);
        keyed.dedup_by(|a, b| a.1 == b.1);
        keyed.into_iter().map(|(_, uid)| uid).collect()
    }

    /// Scans upward from `index` for a tab on the same level before any
    /// shallower tab.
    fn tab_has_siblings_above(&self, window_uid: &Uid, index: usize) -> bool {
        let tabs = self.tabs_in_window(window_uid);
        let Some(target) = tabs.get(index).map(|t| t.indent_level) else {
            return false;
        };
        for tab in tabs[..index].iter().rev() {
            if tab.indent_level == target {
                return true;
            }
            if tab.indent_level < target {
                return false;
            }
        }
        false
    }

    /// Nearest tab above `index` one level shallower than `indent_level`.
    fn find_parent_tab(&self, window_uid: &Uid, index: usize, indent_level: u32) -> Option<Uid> {
        if indent_level <= 1 {
            return None;
        }
        self.tabs_in_window(window_uid)[..index]
            .iter()
            .rev()
            .find(|tab| tab.indent_level == indent_level - 1)
            .map(|tab| tab.uid.clone())
    }

    /// Makes each selected tab a child of the sibling directly above it,
    /// carrying its subtree along. Tabs without such a sibling are skipped.
    pub fn tab_indent_increase(&mut self, uids: &[Uid]) {
        let uids = self.remove_descendant_tabs(&self.sort_tabs_by_position(uids));
        for uid in &uids {
            let (Some(tab), Some(index)) = (self.tabs.get(uid), self.tab_index(uid)) else {
                continue;
            };
            if index == 0 {
                continue;
            }
            let window_uid = tab.window_uid.clone();
            let parent_index = tab.parent_uid.as_ref().and_then(|p| self.tab_index(p));
            if parent_index == Some(index - 1) {
                continue;
            }
            if !self.tab_has_siblings_above(&window_uid, index) {
                continue;
            }

            let children_map = self.children_map(&window_uid);
            let new_indent = tab.indent_level + 1;
            let new_parent = self.find_parent_tab(&window_uid, index, new_indent);
            if let Some(tab) = self.tabs.get_mut(uid) {
                tab.indent_level = new_indent;
                tab.parent_uid = new_parent.clone();
            }
            if let Some(parent) = new_parent.as_ref().and_then(|p| self.tabs.get_mut(p)) {
                parent.is_parent = true;
            }
            let children = children_map.get(&Some(uid.clone())).cloned().unwrap_or_default();
            self.increase_indent_recursively(&children, &children_map);
        }
        self.recompute_session_tree();
    }

    /// Lifts each selected tab one level. Siblings below it become its
    /// children so the flat order stays a valid tree.
    pub fn tab_indent_decrease(&mut self, uids: &[Uid]) {
        let uids = self.remove_descendant_tabs(&self.sort_tabs_by_position(uids));
        for uid in &uids {
            let (Some(tab), Some(index)) = (self.tabs.get(uid), self.tab_index(uid)) else {
                continue;
            };
            if index == 0 || tab.indent_level <= 1 {
                continue;
            }
            let window_uid = tab.window_uid.clone();
            let old_parent = tab.parent_uid.clone();
            let new_indent = tab.indent_level - 1;

            let children_map = self.children_map(&window_uid);
            let children = children_map.get(&Some(uid.clone())).cloned().unwrap_or_default();
            let siblings = children_map.get(&old_parent).cloned().unwrap_or_default();
            let position = siblings.iter().position(|s| s == uid).unwrap_or(0);
            let (earlier_siblings, rest) = siblings.split_at(position);
            let lower_siblings: Vec<Uid> = rest.iter().skip(1).cloned().collect();

            if earlier_siblings.is_empty()
                && let Some(parent) = old_parent.as_ref().and_then(|p| self.tabs.get_mut(p))
            {
                parent.is_parent = false;
            }
            for sibling in &lower_siblings {
                if let Some(sibling) = self.tabs.get_mut(sibling) {
                    sibling.parent_uid = Some(uid.clone());
                }
            }

            let new_parent = self.find_parent_tab(&window_uid, index, new_indent);
            if let Some(tab) = self.tabs.get_mut(uid) {
                tab.indent_level = new_indent;
                tab.parent_uid = new_parent.clone();
                if !lower_siblings.is_empty() {
                    tab.is_parent = true;
                }
            }
            if let Some(parent) = new_parent.as_ref().and_then(|p| self.tabs.get_mut(p)) {
                parent.is_parent = true;
            }
            self.decrease_indent_recursively(&children, &children_map);
        }
        self.recompute_session_tree();
    }
}

#[cfg(test)]
mod tests {
    use crate::model::NewTab;
    use crate::store::TreeStore;
    use crate::test_support::{open_tab, open_window};

    use super::*;

    fn flat_window(store: &mut TreeStore, count: i64) -> (Uid, Vec<Uid>) {
        let window = open_window(store, 1);
        let tabs = (0..count)
            .map(|i| store.add_tab(open_tab(&window, 10 + i)).unwrap())
            .collect();
        (window, tabs)
    }

    #[test]
    fn indent_increase_nests_under_sibling_above() {
        let mut store = TreeStore::new();
        let (_, tabs) = flat_window(&mut store, 3);
        store.tab_indent_increase(&[tabs[1].clone()]);

        let b = store.tab(&tabs[1]).unwrap();
        assert_eq!(b.indent_level, 2);
        assert_eq!(b.parent_uid.as_ref(), Some(&tabs[0]));
        assert!(store.tab(&tabs[0]).unwrap().is_parent);
        store.validate().unwrap();
    }

    #[test]
    fn indent_increase_skips_first_tab_and_direct_children() {
        let mut store = TreeStore::new();
        let (_, tabs) = flat_window(&mut store, 2);
        store.tab_indent_increase(&[tabs[0].clone()]);
        assert_eq!(store.tab(&tabs[0]).unwrap().indent_level, 1);

        store.tab_indent_increase(&[tabs[1].clone()]);
        store.tab_indent_increase(&[tabs[1].clone()]);
        assert_eq!(store.tab(&tabs[1]).unwrap().indent_level, 2);
        store.validate().unwrap();
    }

    #[test]
    fn indent_increase_moves_subtree() {
        let mut store = TreeStore::new();
        let window = open_window(&mut store, 1);
        let a = store.add_tab(open_tab(&window, 10)).unwrap();
        let b = store.add_tab(open_tab(&window, 11)).unwrap();
        let c = store
            .add_tab(NewTab {
                index: Some(2),
                parent_uid: Some(b.clone()),
                ..open_tab(&window, 12)
            })
            .unwrap();

        store.tab_indent_increase(&[b.clone(), c.clone()]);
        assert_eq!(store.tab(&b).unwrap().parent_uid.as_ref(), Some(&a));
        assert_eq!(store.tab(&b).unwrap().indent_level, 2);
        assert_eq!(store.tab(&c).unwrap().indent_level, 3);
        assert_eq!(store.tab(&c).unwrap().parent_uid.as_ref(), Some(&b));
        store.validate().unwrap();
    }

    #[test]
    fn indent_decrease_adopts_lower_siblings() {
        let mut store = TreeStore::new();
        let (_, tabs) = flat_window(&mut store, 4);
        store.tab_indent_increase(&tabs[1..].to_vec());
        // A > {B, C, D}
        store.tab_indent_decrease(&[tabs[2].clone()]);

        let c = store.tab(&tabs[2]).unwrap();
        assert_eq!(c.indent_level, 1);
        assert!(c.parent_uid.is_none());
        assert!(c.is_parent);
        let d = store.tab(&tabs[3]).unwrap();
        assert_eq!(d.parent_uid.as_ref(), Some(&tabs[2]));
        assert_eq!(d.indent_level, 2);
        assert!(store.tab(&tabs[0]).unwrap().is_parent);
        store.validate().unwrap();
    }

    #[test]
    fn indent_decrease_of_only_child_clears_parent_flag() {
        let mut store = TreeStore::new();
        let (_, tabs) = flat_window(&mut store, 2);
        store.tab_indent_increase(&[tabs[1].clone()]);
        store.tab_indent_decrease(&[tabs[1].clone()]);
        assert!(!store.tab(&tabs[0]).unwrap().is_parent);
        assert_eq!(store.tab(&tabs[1]).unwrap().indent_level, 1);
        store.validate().unwrap();
    }

    #[test]
    fn indent_decrease_of_first_child_with_parent_at_index_zero() {
        let mut store = TreeStore::new();
        let (_, tabs) = flat_window(&mut store, 3);
        store.tab_indent_increase(&tabs[1..].to_vec());
        store.tab_indent_decrease(&[tabs[1].clone()]);
        assert!(!store.tab(&tabs[0]).unwrap().is_parent);
        assert_eq!(store.tab(&tabs[2]).unwrap().parent_uid.as_ref(), Some(&tabs[1]));
        store.validate().unwrap();
    }

    #[test]
    fn collapse_hides_descendants() {
        let mut store = TreeStore::new();
        let (_, tabs) = flat_window(&mut store, 3);
        store.tab_indent_increase(&[tabs[1].clone()]);
        store.tab_indent_increase(&[tabs[2].clone()]);
        store.tab_indent_increase(&[tabs[2].clone()]);
        // A > B > C
        store.toggle_collapse_tab(&tabs[0]).unwrap();
        assert!(store.tab(&tabs[0]).unwrap().is_visible);
        assert!(!store.tab(&tabs[1]).unwrap().is_visible);
        assert!(!store.tab(&tabs[2]).unwrap().is_visible);

        store.toggle_collapse_tab(&tabs[0]).unwrap();
        assert!(store.tab(&tabs[2]).unwrap().is_visible);
        store.validate().unwrap();
    }

    #[test]
    fn collapsed_window_hides_every_tab() {
        let mut store = TreeStore::new();
        let (window, tabs) = flat_window(&mut store, 2);
        store.tab_indent_increase(&[tabs[1].clone()]);

        store.toggle_collapse_window(&window).unwrap();
        assert!(store.window(&window).unwrap().collapsed);
        assert!(tabs.iter().all(|uid| !store.tab(uid).unwrap().is_visible));
        store.validate().unwrap();

        // Tabs added while collapsed stay hidden.
        let late = store.add_tab(open_tab(&window, 30)).unwrap();
        assert!(!store.tab(&late).unwrap().is_visible);

        store.toggle_collapse_window(&window).unwrap();
        assert!(tabs.iter().all(|uid| store.tab(uid).unwrap().is_visible));
        assert!(store.tab(&late).unwrap().is_visible);
        store.validate().unwrap();
    }

    #[test]
    fn collapsed_window_keeps_tab_collapse_on_expand() {
        let mut store = TreeStore::new();
        let (window, tabs) = flat_window(&mut store, 2);
        store.tab_indent_increase(&[tabs[1].clone()]);
        store.toggle_collapse_tab(&tabs[0]).unwrap();

        store.toggle_collapse_window(&window).unwrap();
        store.toggle_collapse_window(&window).unwrap();
        assert!(store.tab(&tabs[0]).unwrap().is_visible);
        assert!(!store.tab(&tabs[1]).unwrap().is_visible);
        store.validate().unwrap();
    }

    #[test]
    fn validator_rejects_visible_tabs_in_collapsed_window() {
        let mut store = TreeStore::new();
        let (window, _) = flat_window(&mut store, 2);
        store.window_mut(&window).unwrap().collapsed = true;
        assert!(store.validate().is_err());

        store.recompute_session_tree();
        store.validate().unwrap();
    }

    #[test]
    fn descendant_filter_keeps_topmost_selection() {
        let mut store = TreeStore::new();
        let (_, tabs) = flat_window(&mut store, 3);
        store.tab_indent_increase(&[tabs[1].clone()]);
        let filtered = store.remove_descendant_tabs(&tabs);
        assert_eq!(filtered, vec![tabs[0].clone(), tabs[2].clone()]);
    }
}
