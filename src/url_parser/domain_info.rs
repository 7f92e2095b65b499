use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use url::Host;

/// Second-level labels that form a compound suffix with their top-level label
///
/// This is a fixed, deliberately small table rather than the public suffix
/// list. Hosts can extend it through `ProcessorConfig::compound_tlds`.
const BUILTIN_COMPOUND_TLDS: &[&str] = &[
    "co.uk", "org.uk", "gov.uk", "ac.uk", "me.uk", "net.uk", "ltd.uk", "plc.uk", "nhs.uk",
    "com.au", "net.au", "org.au", "edu.au", "gov.au", "asn.au", "id.au",
    "co.nz", "org.nz", "net.nz", "govt.nz", "ac.nz",
    "com.br", "net.br", "org.br", "gov.br", "edu.br",
    "co.jp", "ne.jp", "or.jp", "ac.jp", "go.jp",
    "co.in", "net.in", "org.in", "gov.in", "ac.in",
    "co.za", "org.za", "gov.za", "ac.za",
    "com.cn", "net.cn", "org.cn", "gov.cn", "edu.cn",
    "com.mx", "org.mx", "gob.mx",
    "com.ar", "com.tr", "com.sg", "com.hk", "com.tw", "com.my",
    "co.kr", "or.kr", "co.il", "co.id", "co.th",
];

static DEFAULT_TABLE: Lazy<CompoundTlds> =
    Lazy::new(|| CompoundTlds::from_suffixes(BUILTIN_COMPOUND_TLDS.iter().copied()));

/// Lookup table of compound suffixes, keyed by top-level label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundTlds {
    by_top_level: HashMap<String, HashSet<String>>,
}

impl CompoundTlds {
    /// Builds a table from `second.top` suffixes; malformed entries are skipped
    pub fn from_suffixes<'a, I>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut table = Self::default();
        table.extend(suffixes);
        table
    }

    /// The built-in table
    pub fn builtin() -> &'static CompoundTlds {
        &DEFAULT_TABLE
    }

    /// The built-in table plus the given extra suffixes
    pub fn with_extra<S: AsRef<str>>(extra: &[S]) -> Self {
        let mut table = DEFAULT_TABLE.clone();
        table.extend(extra.iter().map(|s| s.as_ref()));
        table
    }

    pub fn extend<'a, I>(&mut self, suffixes: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for suffix in suffixes {
            let suffix = suffix.trim().trim_start_matches('.').to_ascii_lowercase();
            if let Some((second, top)) = suffix.split_once('.') {
                if second.is_empty() || top.is_empty() || top.contains('.') {
                    continue;
                }
                self.by_top_level
                    .entry(top.to_owned())
                    .or_default()
                    .insert(second.to_owned());
            }
        }
    }

    /// Exact membership test of `second.top`
    pub fn contains(&self, second: &str, top: &str) -> bool {
        self.by_top_level
            .get(top)
            .map_or(false, |seconds| seconds.contains(second))
    }

    pub fn len(&self) -> usize {
        self.by_top_level.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_top_level.is_empty()
    }
}

/// Host split into subdomain, domain and suffix parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainInfo {
    pub subdomain: String,     // Labels left of the domain, joined by '.'
    pub domain: String,        // The registrable label
    pub tld: String,           // Last label only, `uk` for `co.uk`
    pub public_suffix: String, // Full suffix, `co.uk` for `co.uk`
    pub is_ip_address: bool,
}

impl DomainInfo {
    /// Splits a lower-cased hostname into its parts
    ///
    /// # Arguments
    /// * `host` - The parsed host, used to recognise IP literals
    /// * `hostname` - The lower-cased host string
    /// * `table` - Compound suffixes checked for hosts with three or more labels
    pub fn from_host(host: Option<Host<&str>>, hostname: &str, table: &CompoundTlds) -> Self {
        match host {
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => Self {
                domain: hostname.to_owned(),
                is_ip_address: true,
                ..Default::default()
            },
            _ => Self::split_labels(hostname, table),
        }
    }

    fn split_labels(hostname: &str, table: &CompoundTlds) -> Self {
        let labels: Vec<&str> = hostname.split('.').collect();

        match labels.as_slice() {
            [] | [_] => Self {
                domain: hostname.to_owned(),
                ..Default::default()
            },
            [domain, tld] => Self {
                domain: (*domain).to_owned(),
                tld: (*tld).to_owned(),
                public_suffix: (*tld).to_owned(),
                ..Default::default()
            },
            [rest @ .., second, top] => {
                if table.contains(second, top) {
                    // rest is non-empty here: three or more labels
                    let (domain, subdomain) = match rest.split_last() {
                        Some((domain, subdomain)) => (*domain, subdomain.join(".")),
                        None => ("", String::new()),
                    };
                    Self {
                        subdomain,
                        domain: domain.to_owned(),
                        tld: (*top).to_owned(),
                        public_suffix: format!("{}.{}", second, top),
                        is_ip_address: false,
                    }
                } else {
                    Self {
                        subdomain: rest.join("."),
                        domain: (*second).to_owned(),
                        tld: (*top).to_owned(),
                        public_suffix: (*top).to_owned(),
                        is_ip_address: false,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(hostname: &str) -> DomainInfo {
        DomainInfo::from_host(Some(Host::Domain(hostname)), hostname, CompoundTlds::builtin())
    }

    #[test]
    fn test_single_label() {
        let info = split("localhost");
        assert_eq!(info.domain, "localhost");
        assert!(info.tld.is_empty());
        assert!(info.subdomain.is_empty());
    }

    #[test]
    fn test_two_labels() {
        let info = split("example.com");
        assert_eq!(info.domain, "example");
        assert_eq!(info.tld, "com");
        assert!(info.subdomain.is_empty());
    }

    #[test]
    fn test_compound_suffix() {
        let info = split("shop.news.bbc.co.uk");
        assert_eq!(info.domain, "bbc");
        assert_eq!(info.tld, "uk");
        assert_eq!(info.public_suffix, "co.uk");
        assert_eq!(info.subdomain, "shop.news");
    }

    #[test]
    fn test_plain_three_labels() {
        let info = split("api.service.com");
        assert_eq!(info.domain, "service");
        assert_eq!(info.tld, "com");
        assert_eq!(info.subdomain, "api");
    }

    #[test]
    fn test_bare_compound_suffix_is_not_split() {
        // Only two labels, so the compound table is never consulted
        let info = split("co.uk");
        assert_eq!(info.domain, "co");
        assert_eq!(info.tld, "uk");
    }

    #[test]
    fn test_ip_literal() {
        let info = DomainInfo::from_host(
            Some(Host::Ipv4("192.168.1.1".parse().unwrap())),
            "192.168.1.1",
            CompoundTlds::builtin(),
        );
        assert!(info.is_ip_address);
        assert_eq!(info.domain, "192.168.1.1");
        assert!(info.tld.is_empty());
    }

    #[test]
    fn test_extra_suffixes() {
        let table = CompoundTlds::with_extra(&["ac.kr", "bogus", ".edu.pl"]);
        assert!(table.contains("ac", "kr"));
        assert!(table.contains("edu", "pl"));
        assert!(table.contains("co", "uk"));
        assert_eq!(table.len(), CompoundTlds::builtin().len() + 2);
    }
}
