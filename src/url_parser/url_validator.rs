use tracing::trace;

/// Schemes accepted for hosts that have no dot in them
const RECOGNIZED_SCHEMES: &[&str] = &["http", "https", "ftp", "ftps", "sftp", "ws", "wss"];

/// Normalizes a raw line before parsing
///
/// Trims the ends, removes every interior whitespace character and strips
/// trailing slashes. Returns `None` when nothing is left.
pub fn normalize(raw: &str) -> Option<String> {
    let collapsed: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let normalized = collapsed.trim_end_matches('/');

    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_owned())
    }
}

/// Cheap plausibility check run before the real parse
///
/// A lenient parser accepts bare words such as `not-a-url`. Those are rejected
/// here unless they carry a recognized scheme or name `localhost` or an IP literal.
pub fn passes_precheck(normalized: &str) -> bool {
    if normalized.starts_with("://") {
        trace!("Rejecting input with an empty scheme: {}", normalized);
        return false;
    }

    if normalized.contains('.') || has_recognized_scheme(normalized) {
        return true;
    }

    let host = host_candidate(normalized);
    let accepted = host.eq_ignore_ascii_case("localhost") || host.starts_with('[');
    if !accepted {
        trace!("Rejecting dotless input without a scheme: {}", normalized);
    }
    accepted
}

/// Returns true if the string starts with `<scheme>://` for a known scheme
pub fn has_recognized_scheme(normalized: &str) -> bool {
    normalized
        .split_once("://")
        .map_or(false, |(scheme, _)| {
            RECOGNIZED_SCHEMES
                .iter()
                .any(|known| known.eq_ignore_ascii_case(scheme))
        })
}

// Host portion of a scheme-less string: drop path, query, fragment, userinfo and port
fn host_candidate(normalized: &str) -> &str {
    let authority = normalized
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or(normalized);
    let host_port = authority.rsplit('@').next().unwrap_or(authority);

    if host_port.starts_with('[') {
        return host_port;
    }
    host_port.split(':').next().unwrap_or(host_port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_whitespace_and_trailing_slashes() {
        assert_eq!(normalize("  https://exa mple.com/path//  ").as_deref(), Some("https://example.com/path"));
        assert_eq!(normalize("example.com\t/a\n").as_deref(), Some("example.com/a"));
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   \t "), None);
        assert_eq!(normalize("///"), None);
    }

    #[test]
    fn test_precheck_rejects_garbage() {
        assert!(!passes_precheck("not-a-url"));
        assert!(!passes_precheck("://example.com"));
        assert!(!passes_precheck("hello"));
        assert!(!passes_precheck("chrome://settings"));
    }

    #[test]
    fn test_precheck_accepts_hosts() {
        assert!(passes_precheck("example.com"));
        assert!(passes_precheck("localhost"));
        assert!(passes_precheck("localhost:3000/api"));
        assert!(passes_precheck("[::1]:8080"));
        assert!(passes_precheck("http://intranet"));
    }
}
