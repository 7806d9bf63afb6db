use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    #[default]
    Seconds,
    Minutes,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    // Windows
    pub focus_window_on_open: bool,
    pub open_windows_in_same_location: bool,
    pub open_windows_in_same_location_update_interval: u64,
    pub open_windows_in_same_location_update_interval_unit: IntervalUnit,
    pub open_window_with_tabs_discarded: bool,
    pub save_window_on_close: bool,
    pub save_window_on_close_if_contains_saved_tabs: bool,
    pub save_window_on_close_if_previously_saved: bool,

    // Tabs
    pub focus_tab_on_open: bool,
    pub save_tab_on_close: bool,
    pub save_tab_on_close_if_previously_saved: bool,

    // Moves
    pub try_to_maintain_hierarchy_of_dragged_items: bool,
    pub try_to_maintain_collapsed_state_of_dragged_items: bool,

    // Session tree popup
    pub open_session_tree_in_same_location: bool,
    pub open_session_tree_on_startup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_window_on_open: true,
            open_windows_in_same_location: true,
            open_windows_in_same_location_update_interval: 60,
            open_windows_in_same_location_update_interval_unit: IntervalUnit::Seconds,
            open_window_with_tabs_discarded: true,
            save_window_on_close: false,
            save_window_on_close_if_contains_saved_tabs: true,
            save_window_on_close_if_previously_saved: true,

            focus_tab_on_open: true,
            save_tab_on_close: false,
            save_tab_on_close_if_previously_saved: true,

            try_to_maintain_hierarchy_of_dragged_items: true,
            try_to_maintain_collapsed_state_of_dragged_items: true,

            open_session_tree_in_same_location: true,
            open_session_tree_on_startup: false,
        }
    }
}

impl Settings {
    /// Get the settings file path
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sessiontree").join("settings.toml"))
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| match toml::from_str(&content) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    log::warn!("settings_parse_failed path={} error={}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Save settings to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(path) = Self::settings_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// How often live window bounds are sampled. Never zero.
    pub fn window_position_interval(&self) -> Duration {
        let amount = self.open_windows_in_same_location_update_interval.max(1);
        match self.open_windows_in_same_location_update_interval_unit {
            IntervalUnit::Seconds => Duration::from_secs(amount),
            IntervalUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load_from(&temp.path().join("settings.toml"));
        assert_eq!(settings, Settings::default());
        assert!(settings.save_tab_on_close_if_previously_saved);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        std::fs::write(&path, "saveWindowOnClose = true\nopenWindowsInSameLocationUpdateIntervalUnit = \"minutes\"\n").unwrap();

        let settings = Settings::load_from(&path);
        assert!(settings.save_window_on_close);
        assert!(settings.focus_window_on_open);
        assert_eq!(settings.window_position_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn extension_settings_keys_are_read() {
        let content = r#"
            openWindowsInSameLocationUpdateInterval = 5
            openWindowsInSameLocationUpdateIntervalUnit = "minutes"
            tryToMaintainHierarchyOfDraggedItems = false
            tryToMaintainCollapsedStateOfDraggedItems = false
            saveTabOnCloseIfPreviouslySaved = false
        "#;
        let settings: Settings = toml::from_str(content).unwrap();
        assert_eq!(settings.open_windows_in_same_location_update_interval, 5);
        assert_eq!(
            settings.open_windows_in_same_location_update_interval_unit,
            IntervalUnit::Minutes
        );
        assert!(!settings.try_to_maintain_hierarchy_of_dragged_items);
        assert!(!settings.try_to_maintain_collapsed_state_of_dragged_items);
        assert!(!settings.save_tab_on_close_if_previously_saved);
        assert_eq!(settings.window_position_interval(), Duration::from_secs(300));

        let written = toml::to_string_pretty(&Settings::default()).unwrap();
        assert!(written.contains("openWindowsInSameLocationUpdateInterval = 60"));
        assert!(written.contains("tryToMaintainHierarchyOfDraggedItems = true"));
        assert!(written.contains(r#"openWindowsInSameLocationUpdateIntervalUnit = "seconds""#));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("settings.toml");
        let settings = Settings {
            focus_tab_on_open: false,
            open_windows_in_same_location_update_interval: 5,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let settings = Settings {
            open_windows_in_same_location_update_interval: 0,
            ..Settings::default()
        };
        assert_eq!(settings.window_position_interval(), Duration::from_secs(1));
    }
}
