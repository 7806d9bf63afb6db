//! Session tree for browser extensions.
//!
//! Keeps a hierarchical, persistent tree of browser windows and tabs in sync
//! with the live browser. Windows and tabs can be saved (closed but kept),
//! reopened, nested, collapsed, and dragged between windows.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let host: Arc<dyn BrowserHost> = Arc::new(MyExtensionHost::new());
//! let storage = Arc::new(FileStorage::open_default_profile());
//! let tree = SessionTree::new(host, storage, Settings::load());
//! tree.start().await;
//!
//! // Browser events
//! while let Some(event) = events.recv().await {
//!     tree.handle_host_event(event).await;
//! }
//!
//! // User actions from the tree view
//! tree.handle_message(serde_json::json!({ "action": "saveTab", "tabUid": uid })).await;
//! ```

pub mod app;
pub mod error;
pub mod settings;
pub mod urls;

pub use app::{
    ActionMessage, MoveTabsRequest, OpenTabRequest, SessionTree, TabChanges, TabTarget,
    TreeNotification, WindowView,
};
pub use error::{SessionTreeError, SessionTreeResult};
pub use settings::{IntervalUnit, Settings};
pub use sessiontree_host as host;
pub use sessiontree_tree as tree;
