//! The session tree service.
//!
//! [`SessionTree`] is the context object every operation hangs off. Browser
//! events enter through [`SessionTree::handle_host_event`], user intent
//! through [`SessionTree::dispatch`]; both mutate the tree under its lock,
//! call the browser with the lock released, then persist and notify.

pub mod actions;
pub mod constants;
mod handlers;
pub mod move_ops;
pub mod notifications;
mod state;
pub mod tab_ops;
pub mod tree_state;
mod window_ops;
mod window_positions;

#[cfg(test)]
pub(crate) mod test_host;

pub use actions::ActionMessage;
pub use move_ops::MoveTabsRequest;
pub use notifications::TreeNotification;
pub use state::{SessionTree, WindowView};
pub use tab_ops::OpenTabRequest;
pub use tree_state::{TabChanges, TabTarget, TreeState, UpdateOutcome, new_tab_from_host};
