use serde::Serialize;
use sessiontree_tree::HostId;

/// Messages pushed to presentation surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TreeNotification {
    /// The tree changed; re-read the snapshot.
    TreeUpdated,
    FaviconUpdated { tab_id: HostId, fav_icon_url: String },
}
