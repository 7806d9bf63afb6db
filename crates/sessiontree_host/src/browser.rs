use async_trait::async_trait;
use sessiontree_tree::HostId;

use crate::error::HostResult;
use crate::model::{
    CreateTabProperties, CreateWindowProperties, HostTab, HostWindow, TabUpdate, WindowUpdate,
};

/// Extension page that forwards to a privileged URL the browser refuses to
/// open directly.
pub const REDIRECT_PAGE: &str = "/redirect.html";

/// Extension page hosting the session tree view.
pub const SESSION_TREE_PAGE: &str = "/sessiontree.html";

/// The browser's windows and tabs API.
///
/// Windows are always returned with their tabs populated. Every call may
/// fail; callers decide whether a failure is fatal to their operation.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    async fn create_window(&self, properties: CreateWindowProperties) -> HostResult<HostWindow>;

    async fn get_window(&self, window_id: HostId) -> HostResult<HostWindow>;

    async fn get_all_windows(&self) -> HostResult<Vec<HostWindow>>;

    async fn update_window(&self, window_id: HostId, update: WindowUpdate) -> HostResult<HostWindow>;

    async fn remove_window(&self, window_id: HostId) -> HostResult<()>;

    async fn create_tab(&self, properties: CreateTabProperties) -> HostResult<HostTab>;

    async fn get_tab(&self, tab_id: HostId) -> HostResult<HostTab>;

    /// Tabs of a window ordered by index.
    async fn query_tabs(&self, window_id: HostId) -> HostResult<Vec<HostTab>>;

    async fn update_tab(&self, tab_id: HostId, update: TabUpdate) -> HostResult<HostTab>;

    async fn move_tab(&self, tab_id: HostId, window_id: HostId, index: usize) -> HostResult<HostTab>;

    async fn reload_tab(&self, tab_id: HostId) -> HostResult<()>;

    async fn remove_tab(&self, tab_id: HostId) -> HostResult<()>;

    /// Absolute URL of a page bundled with the extension.
    fn extension_url(&self, path: &str) -> String;
}
