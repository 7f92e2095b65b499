use std::borrow::Cow;

use crate::url_parser::UrlComponents;

/// Key used to deduplicate or order projected entries
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderKey {
    Text(String),
    Length(usize),
}

/// Extension-less name of the resource a URL points at
///
/// Uses the last path segment with its extension removed. Falls back to the
/// second-to-last segment, then to the hostname, when that leaves nothing.
pub fn filename_stem(components: &UrlComponents) -> String {
    let segments: Vec<Cow<'_, str>> = components
        .path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect();

    let stem = segments.last().map(|last| strip_extension(last)).unwrap_or("");
    if !stem.is_empty() {
        return stem.to_owned();
    }

    if segments.len() >= 2 {
        let parent = &segments[segments.len() - 2];
        if !parent.is_empty() {
            return parent.to_string();
        }
    }

    components.hostname.clone()
}

/// Text before the final '.', unless that dot starts the segment
pub fn strip_extension(segment: &str) -> &str {
    match segment.rfind('.') {
        Some(idx) if idx > 0 => &segment[..idx],
        _ => segment,
    }
}

fn decode_segment(segment: &str) -> Cow<'_, str> {
    urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment))
}
