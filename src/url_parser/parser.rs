use thiserror::Error;
use tracing::trace;
use url::{Host, Url};

use super::domain_info::{CompoundTlds, DomainInfo};
use super::url_validator::{normalize, passes_precheck};

/// Why a raw entry could not be classified
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("empty or invalid input")]
    EmptyInput,

    #[error("cannot parse")]
    CannotParse,

    #[error("missing hostname")]
    MissingHost,
}

/// Structured parts of a URL that classified as valid
///
/// Absent components are empty strings rather than `Option`s, so they compare
/// and sort without special cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlComponents {
    pub protocol: String,       // Scheme without "://", `http` when none was given
    pub explicit_scheme: bool,  // Whether the input spelled out a scheme
    pub username: String,       // Userinfo, kept percent-encoded
    pub password: String,
    pub hostname: String,       // Lower-cased host without a trailing '.'
    pub domain: String,
    pub subdomain: String,
    pub tld: String,
    pub public_suffix: String,
    pub path: String,           // Empty for the root path
    pub parameters: Vec<(String, String)>, // Decoded query pairs, last write wins
    pub fragment: String,       // Without the leading '#'
    pub port: String,           // Empty for a default or missing port
    pub is_ip_address: bool,
}

impl UrlComponents {
    /// `domain.suffix`, or just the domain for hosts without a suffix
    ///
    /// Uses the full compound suffix, so `www.example.co.uk` yields `example.co.uk`.
    pub fn registrable_domain(&self) -> String {
        if self.public_suffix.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", self.domain, self.public_suffix)
        }
    }

    /// `user[:password]@`, or empty when the URL carries no userinfo
    pub fn userinfo(&self) -> String {
        match (self.username.is_empty(), self.password.is_empty()) {
            (true, true) => String::new(),
            (_, true) => format!("{}@", self.username),
            _ => format!("{}:{}@", self.username, self.password),
        }
    }

    /// Userinfo, host and explicit port
    pub fn authority(&self) -> String {
        let mut authority = self.userinfo();
        authority.push_str(&self.hostname);
        if !self.port.is_empty() {
            authority.push(':');
            authority.push_str(&self.port);
        }
        authority
    }

    /// Value of a query parameter
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A raw input string together with its classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedUrl {
    pub original: String,
    pub outcome: Result<UrlComponents, ClassifyError>,
}

impl ClassifiedUrl {
    pub fn is_valid(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn components(&self) -> Option<&UrlComponents> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ClassifyError> {
        self.outcome.as_ref().err()
    }
}

/// Classifies a raw string using the built-in compound suffix table
///
/// Never fails: invalid input yields a `ClassifiedUrl` carrying the reason.
pub fn classify(raw: &str) -> ClassifiedUrl {
    classify_with(raw, CompoundTlds::builtin())
}

/// Returns true if `raw` classifies as a valid URL
pub fn is_valid(raw: &str) -> bool {
    classify(raw).is_valid()
}

/// Classifies a raw string against the given compound suffix table
///
/// # Arguments
/// * `raw` - The input line, untrimmed
/// * `table` - Compound suffixes used when splitting the host
///
/// # Returns
/// * `ClassifiedUrl` - The original string and either its components or the failure reason
pub fn classify_with(raw: &str, table: &CompoundTlds) -> ClassifiedUrl {
    ClassifiedUrl {
        original: raw.to_owned(),
        outcome: parse_components(raw, table),
    }
}

fn parse_components(raw: &str, table: &CompoundTlds) -> Result<UrlComponents, ClassifyError> {
    let normalized = normalize(raw).ok_or(ClassifyError::EmptyInput)?;

    if !passes_precheck(&normalized) {
        return Err(ClassifyError::CannotParse);
    }

    let (parsed, explicit_scheme) = parse_lenient(&normalized)?;
    let mut hostname = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(ClassifyError::MissingHost)?
        .to_lowercase();

    if let Some(Host::Domain(_)) = parsed.host() {
        if hostname.ends_with('.') {
            hostname.pop();
        }
        if hostname.split('.').any(str::is_empty) {
            trace!("Rejected {}: empty label in host {:?}", raw, hostname);
            return Err(ClassifyError::CannotParse);
        }
    }

    let info = DomainInfo::from_host(parsed.host(), &hostname, table);

    let path = match parsed.path() {
        "/" => String::new(),
        other => other.to_owned(),
    };

    let mut parameters: Vec<(String, String)> = Vec::new();
    for (key, value) in parsed.query_pairs() {
        match parameters.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value.into_owned(),
            None => parameters.push((key.into_owned(), value.into_owned())),
        }
    }

    trace!("Classified {} as host={} domain={} tld={}", raw, hostname, info.domain, info.tld);

    Ok(UrlComponents {
        protocol: parsed.scheme().to_owned(),
        explicit_scheme,
        username: parsed.username().to_owned(),
        password: parsed.password().unwrap_or_default().to_owned(),
        hostname,
        domain: info.domain,
        subdomain: info.subdomain,
        tld: info.tld,
        public_suffix: info.public_suffix,
        path,
        parameters,
        fragment: parsed.fragment().unwrap_or_default().to_owned(),
        port: parsed.port().map(|p| p.to_string()).unwrap_or_default(),
        is_ip_address: info.is_ip_address,
    })
}

// Parses as-is first, then retries with an http:// prefix when no scheme separator was given.
// Strings like `localhost:3000` parse with `localhost` as the scheme; the missing host
// sends those down the retry path too.
fn parse_lenient(normalized: &str) -> Result<(Url, bool), ClassifyError> {
    let has_separator = normalized.contains("://");

    match Url::parse(normalized) {
        Ok(parsed) if parsed.host_str().map_or(false, |h| !h.is_empty()) => {
            return Ok((parsed, true));
        }
        Ok(_) if has_separator => return Err(ClassifyError::MissingHost),
        Err(e) if has_separator => {
            trace!("Failed to parse {}: {}", normalized, e);
            return Err(ClassifyError::CannotParse);
        }
        _ => {}
    }

    Url::parse(&format!("http://{}", normalized))
        .map(|parsed| (parsed, false))
        .map_err(|e| {
            trace!("Failed to parse {} with http:// prefix: {}", normalized, e);
            ClassifyError::CannotParse
        })
}
