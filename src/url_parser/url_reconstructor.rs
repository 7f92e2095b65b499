use super::parser::UrlComponents;

/// Rebuilds a URL from its components with the query string removed
///
/// Userinfo and the fragment are kept. A scheme is only written when the input had one.
pub fn strip_parameters(components: &UrlComponents) -> String {
    let mut rebuilt = prefix(components);
    rebuilt.push_str(&components.path);
    if !components.fragment.is_empty() {
        rebuilt.push('#');
        rebuilt.push_str(&components.fragment);
    }
    rebuilt
}

/// Rebuilds a URL with the last path segment removed
///
/// A trailing slash does not count as a segment. Query and fragment belong to
/// the removed resource and are dropped; the result keeps at least `/`.
pub fn trim_last_segment(components: &UrlComponents) -> String {
    let mut rebuilt = prefix(components);
    rebuilt.push_str(parent_path(&components.path));
    rebuilt
}

/// Path of the parent directory, `/` at the root
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &trimmed[..idx],
    }
}

fn prefix(components: &UrlComponents) -> String {
    if components.explicit_scheme {
        format!("{}://{}", components.protocol, components.authority())
    } else {
        components.authority()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_parser::classify;

    fn components(raw: &str) -> UrlComponents {
        classify(raw).outcome.unwrap()
    }

    #[test]
    fn test_strip_parameters() {
        let c = components("https://example.com/page?utm_source=google&ref=123");
        assert_eq!(strip_parameters(&c), "https://example.com/page");
    }

    #[test]
    fn test_strip_parameters_keeps_fragment_and_port() {
        let c = components("http://example.com:8080/docs?x=1#intro");
        assert_eq!(strip_parameters(&c), "http://example.com:8080/docs#intro");
    }

    #[test]
    fn test_strip_parameters_without_scheme() {
        let c = components("example.com/search?q=rust");
        assert_eq!(strip_parameters(&c), "example.com/search");
    }

    #[test]
    fn test_userinfo_survives_rebuild() {
        let c = components("https://user:pw@example.com/a?x=1");
        assert_eq!(strip_parameters(&c), "https://user:pw@example.com/a");

        let c = components("https://user:pw@example.com/a/b");
        assert_eq!(trim_last_segment(&c), "https://user:pw@example.com/a");

        let c = components("http://deploy@example.com:8080/x?y=2#z");
        assert_eq!(strip_parameters(&c), "http://deploy@example.com:8080/x#z");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/a/b/c"), "/a/b");
        assert_eq!(parent_path("/a/b/"), "/a");
        assert_eq!(parent_path("/a"), "/");
        assert_eq!(parent_path(""), "/");
        assert_eq!(parent_path("/"), "/");
    }

    #[test]
    fn test_trim_last_segment() {
        let c = components("https://example.com/blog/2024/post.html?ref=1");
        assert_eq!(trim_last_segment(&c), "https://example.com/blog/2024");

        let c = components("https://example.com/about");
        assert_eq!(trim_last_segment(&c), "https://example.com/");

        let c = components("example.com");
        assert_eq!(trim_last_segment(&c), "example.com/");
    }
}
