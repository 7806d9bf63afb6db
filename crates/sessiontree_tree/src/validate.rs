//! Structural consistency checks.

use std::collections::{HashMap, HashSet};

use crate::error::{TreeError, TreeResult};
use crate::model::{HostId, Uid, is_live_host_id};
use crate::store::TreeStore;

impl TreeStore {
    /// Lists every violated tree invariant. Empty when the tree is sound.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        let ordered: HashSet<&Uid> = self.window_order.iter().collect();
        if ordered.len() != self.window_order.len() {
            violations.push("window order lists a window twice".to_string());
        }
        if ordered.len() != self.windows.len() || self.windows.keys().any(|k| !ordered.contains(k)) {
            violations.push("window order and window map disagree".to_string());
        }

        let mut placed: HashMap<&Uid, &Uid> = HashMap::new();
        let mut live_windows: HashMap<HostId, &Uid> = HashMap::new();
        let mut live_tabs: HashMap<HostId, &Uid> = HashMap::new();

        for window in self.windows() {
            if window.tabs.is_empty() {
                violations.push(format!("window {} has no tabs", window.uid));
            }
            if window.indent_level != 0 {
                violations.push(format!("window {} is indented", window.uid));
            }
            if !self.existing_uids.contains(&window.uid) {
                violations.push(format!("window {} uid is not registered", window.uid));
            }
            if window.state.is_live() {
                if !is_live_host_id(window.id) {
                    violations.push(format!("live window {} has sentinel id", window.uid));
                } else if let Some(other) = live_windows.insert(window.id, &window.uid) {
                    violations.push(format!(
                        "windows {} and {} share host id {}",
                        other, window.uid, window.id
                    ));
                }
            }

            let mut positions: HashMap<&Uid, usize> = HashMap::new();
            for (index, tab_uid) in window.tabs.iter().enumerate() {
                positions.insert(tab_uid, index);
                if let Some(previous) = placed.insert(tab_uid, &window.uid) {
                    violations.push(format!(
                        "tab {} listed in windows {} and {}",
                        tab_uid, previous, window.uid
                    ));
                }
                let Some(tab) = self.tabs.get(tab_uid) else {
                    violations.push(format!("window {} lists unknown tab {}", window.uid, tab_uid));
                    continue;
                };
                if tab.window_uid != window.uid {
                    violations.push(format!("tab {} points at the wrong window", tab.uid));
                }
                if !self.existing_uids.contains(&tab.uid) {
                    violations.push(format!("tab {} uid is not registered", tab.uid));
                }
                if window.is_saved() && !tab.is_saved() {
                    violations.push(format!("live tab {} inside saved window {}", tab.uid, window.uid));
                }
                if tab.state.is_live() {
                    if !is_live_host_id(tab.id) {
                        violations.push(format!("live tab {} has sentinel id", tab.uid));
                    } else if let Some(other) = live_tabs.insert(tab.id, &tab.uid) {
                        violations.push(format!("tabs {} and {} share host id {}", other, tab.uid, tab.id));
                    }
                }

                match &tab.parent_uid {
                    None if tab.indent_level != 1 => {
                        violations.push(format!("root tab {} has indent {}", tab.uid, tab.indent_level));
                    }
                    None => {}
                    Some(parent_uid) => match self.tabs.get(parent_uid) {
                        None => violations.push(format!("tab {} has unknown parent", tab.uid)),
                        Some(parent) => {
                            if parent.window_uid != tab.window_uid {
                                violations.push(format!("tab {} has parent in another window", tab.uid));
                            }
                            if positions.get(parent_uid).is_none_or(|p| *p >= index) {
                                violations.push(format!("tab {} precedes its parent", tab.uid));
                            }
                            if tab.indent_level != parent.indent_level + 1 {
                                violations.push(format!(
                                    "tab {} indent {} under parent indent {}",
                                    tab.uid, tab.indent_level, parent.indent_level
                                ));
                            }
                        }
                    },
                }
            }

            let children_map = self.children_map(&window.uid);
            for tab in self.tabs_in_window(&window.uid) {
                let has_children = children_map
                    .get(&Some(tab.uid.clone()))
                    .is_some_and(|c| !c.is_empty());
                if tab.is_parent != has_children {
                    violations.push(format!(
                        "tab {} parent flag {} but has_children {}",
                        tab.uid, tab.is_parent, has_children
                    ));
                }
                let expected_visible = !window.collapsed && !self.has_collapsed_ancestor(&tab.uid);
                if tab.is_visible != expected_visible {
                    violations.push(format!("tab {} visibility is stale", tab.uid));
                }
            }
        }

        if placed.len() != self.tabs.len() {
            violations.push(format!(
                "{} tabs stored but {} placed in windows",
                self.tabs.len(),
                placed.len()
            ));
        }
        violations
    }

    pub fn validate(&self) -> TreeResult<()> {
        let violations = self.invariant_violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(TreeError::InvalidState(violations.join("; ")))
        }
    }

    fn has_collapsed_ancestor(&self, uid: &Uid) -> bool {
        let mut current = self.tabs.get(uid).and_then(|t| t.parent_uid.as_ref());
        let mut steps = 0;
        while let Some(parent_uid) = current {
            let Some(parent) = self.tabs.get(parent_uid) else {
                return false;
            };
            if parent.collapsed {
                return true;
            }
            steps += 1;
            if steps > self.tabs.len() {
                return false;
            }
            current = parent.parent_uid.as_ref();
        }
        false
    }
}
