//! Browser host boundary for the session tree.
//!
//! Everything the session tree needs from the outside world goes through
//! this crate: the [`BrowserHost`] windows/tabs API, the events the browser
//! raises ([`HostEvent`]), key-value persistence ([`KeyValueStorage`]) and
//! the [`PendingCreationCoordinator`] that keeps extension-initiated
//! creations from being mistaken for user actions.

pub mod browser;
pub mod error;
pub mod model;
pub mod pending;
pub mod storage;

pub use browser::{BrowserHost, REDIRECT_PAGE, SESSION_TREE_PAGE};
pub use error::{HostError, HostResult, StorageError, StorageResult};
pub use model::{
    CreateTabProperties, CreateWindowProperties, HostEvent, HostTab, HostWindow, TabUpdate,
    WINDOW_ID_NONE, WindowType, WindowUpdate,
};
pub use pending::{PENDING_WAIT_TIMEOUT, PendingCreationCoordinator};
pub use storage::{
    FileStorage, KeyValueStorage, MemoryStorage, POPUP_BOUNDS_KEY, SESSION_TREE_KEY,
    default_storage_root,
};
