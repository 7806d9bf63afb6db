//! URL classification for reopening saved tabs.

use url::form_urlencoded;

/// Schemes the browser refuses to open from an extension. Tabs pointing at
/// them are reopened through the redirect page instead.
pub const PRIVILEGED_URL_PREFIXES: &[&str] = &[
    "chrome:",
    "javascript:",
    "data:",
    "file:",
    "view-source:",
    "resource:",
    "jar:",
];

/// URLs that mean "empty tab". They are not passed to the browser at all.
pub const NEW_TAB_URLS: &[&str] = &[
    "about:newtab",
    "about:blank",
    "about:home",
    "chrome://browser/content/blanktab.html",
];

pub const BLANK_URL: &str = "about:blank";

pub fn is_new_tab_url(url: &str) -> bool {
    url.is_empty() || NEW_TAB_URLS.contains(&url)
}

pub fn is_privileged_url(url: &str) -> bool {
    if PRIVILEGED_URL_PREFIXES
        .iter()
        .any(|prefix| url.starts_with(prefix))
    {
        return true;
    }
    url.starts_with("about:") && url != "about:blank" && url != "about:newtab"
}

/// The browser only creates discarded tabs for plain web URLs.
pub fn discarded_url_precheck(url: &str) -> bool {
    !is_new_tab_url(url) && !is_privileged_url(url)
}

/// Query string for the redirect page carrying the original target.
pub fn redirect_query(target_url: &str, target_title: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("targetUrl", target_url)
        .append_pair("targetTitle", target_title)
        .finish()
}
