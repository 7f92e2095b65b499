use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use super::keys::{filename_stem, OrderKey};
use super::{DedupScope, FilterMode, OperationKind, OperationRequest};
use crate::error::ProcessingError;
use crate::url_parser::{classify_with, strip_parameters, trim_last_segment, CompoundTlds};

/// Outcome of applying an operation to a single entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// The entry survives with this output value and optional key
    Keep(Keyed),
    /// The entry is valid but the operation removes it
    Dropped,
    /// The entry is blank or does not classify
    Invalid,
}

/// An output value with the key used by the global dedup or sort step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyed {
    pub value: String,
    pub key: Option<OrderKey>,
}

/// Result of applying an operation to a list of entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub results: Vec<String>,
    pub invalid_count: usize,
}

/// Applies operations to URL lists
///
/// Work is split in two phases: `project` handles one entry at a time and can
/// run chunk by chunk, `finalize` runs once over all kept entries so that
/// deduplication and sorting see the whole input.
#[derive(Debug, Clone)]
pub struct OperationEngine {
    compound_tlds: Arc<CompoundTlds>,
}

impl Default for OperationEngine {
    fn default() -> Self {
        Self::new(CompoundTlds::builtin().clone())
    }
}

impl OperationEngine {
    pub fn new(compound_tlds: CompoundTlds) -> Self {
        Self {
            compound_tlds: Arc::new(compound_tlds),
        }
    }

    pub fn compound_tlds(&self) -> &CompoundTlds {
        &self.compound_tlds
    }

    /// Applies one operation to every entry
    ///
    /// # Arguments
    /// * `urls` - Input lines; never modified
    /// * `request` - The operation to apply
    ///
    /// # Returns
    /// * `Result<EngineOutput, ProcessingError>` - Output lines and the invalid count,
    ///   or a request error with no partial results
    pub fn apply<S: AsRef<str>>(
        &self,
        urls: &[S],
        request: &OperationRequest,
    ) -> Result<EngineOutput, ProcessingError> {
        request.validate()?;

        let needle = request.needle();
        let mut kept = Vec::with_capacity(urls.len());
        let mut invalid_count = 0;

        for url in urls {
            match self.project(url.as_ref(), request.kind, &needle) {
                Projection::Keep(keyed) => kept.push(keyed),
                Projection::Dropped => {}
                Projection::Invalid => invalid_count += 1,
            }
        }

        let results = Self::finalize(request.kind, kept);
        debug!(
            "Applied {:?} to {} entries: {} kept, {} invalid",
            request.kind,
            urls.len(),
            results.len(),
            invalid_count
        );

        Ok(EngineOutput { results, invalid_count })
    }

    /// Projects one entry
    ///
    /// Every operation requires the entry to classify; blank and unparseable
    /// entries come back as `Projection::Invalid`.
    ///
    /// # Arguments
    /// * `raw` - The input line
    /// * `kind` - Operation kind and subtype
    /// * `needle` - Lower-cased match string, only read by filters
    pub fn project(&self, raw: &str, kind: OperationKind, needle: &str) -> Projection {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Projection::Invalid;
        }

        let classified = classify_with(trimmed, &self.compound_tlds);
        let components = match classified.components() {
            Some(components) => components,
            None => {
                trace!("Dropping invalid entry {:?}: {:?}", trimmed, classified.error());
                return Projection::Invalid;
            }
        };

        let keep = |value: String, key: Option<OrderKey>| Projection::Keep(Keyed { value, key });

        match kind {
            OperationKind::RemoveParameters => keep(strip_parameters(components), None),
            OperationKind::Deduplicate(scope) => {
                let key = match scope {
                    DedupScope::Tld => components.tld.to_lowercase(),
                    DedupScope::Domain => components.hostname.to_lowercase(),
                    DedupScope::Full => trimmed.to_lowercase(),
                };
                keep(trimmed.to_owned(), Some(OrderKey::Text(key)))
            }
            OperationKind::Filter(mode) => {
                let contains = trimmed.to_lowercase().contains(needle);
                match (mode, contains) {
                    (FilterMode::Include, true) | (FilterMode::Exclude, false) => {
                        keep(trimmed.to_owned(), None)
                    }
                    _ => Projection::Dropped,
                }
            }
            OperationKind::KeepTldOnly => {
                if components.subdomain.is_empty() {
                    keep(trimmed.to_owned(), None)
                } else {
                    Projection::Dropped
                }
            }
            OperationKind::TrimLastPathSegment => keep(trim_last_segment(components), None),
            OperationKind::ExtractRegistrableDomain => {
                let registrable = components.registrable_domain().to_lowercase();
                keep(registrable.clone(), Some(OrderKey::Text(registrable)))
            }
            OperationKind::SortByHost => keep(
                trimmed.to_owned(),
                Some(OrderKey::Text(components.hostname.to_lowercase())),
            ),
            OperationKind::SortByLength => keep(
                trimmed.to_owned(),
                Some(OrderKey::Length(trimmed.chars().count())),
            ),
            OperationKind::SortByFilenameStem => keep(
                trimmed.to_owned(),
                Some(OrderKey::Text(filename_stem(components).to_lowercase())),
            ),
        }
    }

    /// Turns kept entries, in input order, into the final output
    ///
    /// Dedup kinds keep the first entry per key, sort kinds stable-sort by key,
    /// everything else passes through unchanged.
    ///
    /// Text keys are lower-cased and compared byte-wise, not by locale collation,
    /// so `_` sorts after ASCII letters.
    pub fn finalize(kind: OperationKind, kept: Vec<Keyed>) -> Vec<String> {
        if kind.deduplicates() {
            let mut seen: HashSet<OrderKey> = HashSet::with_capacity(kept.len());
            return kept
                .into_iter()
                .filter(|entry| match &entry.key {
                    Some(key) => seen.insert(key.clone()),
                    None => true,
                })
                .map(|entry| entry.value)
                .collect();
        }

        if kind.sorts() {
            let mut kept = kept;
            // sort_by is stable: equal keys keep their input order
            kept.sort_by(|a, b| a.key.cmp(&b.key));
            return kept.into_iter().map(|entry| entry.value).collect();
        }

        kept.into_iter().map(|entry| entry.value).collect()
    }
}

/// Applies one operation using the built-in compound suffix table
pub fn apply<S: AsRef<str>>(
    urls: &[S],
    request: &OperationRequest,
) -> Result<EngineOutput, ProcessingError> {
    OperationEngine::default().apply(urls, request)
}
