//! Best-effort mapping from input URIs to the worker host holding the data.

/// Scheme prefixes whose authority component names the node that stores the
/// addressed data.
const LOCAL_SCHEMES: [&str; 3] = ["disco://", "dir://", "http://"];

/// Extract the preferred worker host for an input URI.
///
/// Returns the authority component for `disco://`, `dir://` and `http://`
/// URIs; any other input carries no locality hint and yields `None`. The
/// hint is advisory only, the scheduler is free to ignore it.
pub fn pref_host(uri: &str) -> Option<String> {
    for scheme in LOCAL_SCHEMES {
        if let Some(rest) = uri.strip_prefix(scheme) {
            let host = rest.split('/').next().unwrap_or_default();
            if host.is_empty() {
                return None;
            }
            return Some(host.to_string());
        }
    }
    None
}
