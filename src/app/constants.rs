//! Timing and layout constants for the session tree.

use std::time::Duration;

use sessiontree_tree::WindowPosition;

// Activation events can race ahead of the window/tab they refer to.
pub const ACTIVATION_RETRIES: u32 = 5;
pub const ACTIVATION_RETRY_DELAY: Duration = Duration::from_millis(100);

// Session tree popup
pub const DEFAULT_POPUP_BOUNDS: WindowPosition = WindowPosition {
    left: 50,
    top: 50,
    width: 300,
    height: 700,
};

// Fallbacks for tabs the browser reports without a title or url
pub const UNTITLED_TAB: &str = "Untitled";

// Broadcast buffer for outbound notifications
pub const NOTIFICATION_CAPACITY: usize = 64;
