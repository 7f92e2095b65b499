//! The operation vocabulary and the engine that applies one operation to a list of URLs.

pub mod engine;
pub mod keys;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;

pub use engine::{apply, EngineOutput, Keyed, OperationEngine, Projection};
pub use keys::{filename_stem, OrderKey};

/// Public operation names, as used by the UI and the offload wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "removeParams")]
    RemoveParams,
    #[serde(rename = "deduplicateTLD")]
    DeduplicateTld,
    #[serde(rename = "deduplicateDomain")]
    DeduplicateDomain,
    #[serde(rename = "deduplicateFull")]
    DeduplicateFull,
    #[serde(rename = "filterKeep")]
    FilterKeep,
    #[serde(rename = "filterRemove")]
    FilterRemove,
    #[serde(rename = "keepTLD")]
    KeepTld,
    #[serde(rename = "trimLastPath")]
    TrimLastPath,
    #[serde(rename = "extractTLD")]
    ExtractTld,
    #[serde(rename = "sortByDomain")]
    SortByDomain,
    #[serde(rename = "sortByLength")]
    SortByLength,
    #[serde(rename = "sortByFilename")]
    SortByFilename,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::RemoveParams,
        Operation::DeduplicateTld,
        Operation::DeduplicateDomain,
        Operation::DeduplicateFull,
        Operation::FilterKeep,
        Operation::FilterRemove,
        Operation::KeepTld,
        Operation::TrimLastPath,
        Operation::ExtractTld,
        Operation::SortByDomain,
        Operation::SortByLength,
        Operation::SortByFilename,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::RemoveParams => "removeParams",
            Operation::DeduplicateTld => "deduplicateTLD",
            Operation::DeduplicateDomain => "deduplicateDomain",
            Operation::DeduplicateFull => "deduplicateFull",
            Operation::FilterKeep => "filterKeep",
            Operation::FilterRemove => "filterRemove",
            Operation::KeepTld => "keepTLD",
            Operation::TrimLastPath => "trimLastPath",
            Operation::ExtractTld => "extractTLD",
            Operation::SortByDomain => "sortByDomain",
            Operation::SortByLength => "sortByLength",
            Operation::SortByFilename => "sortByFilename",
        }
    }

    /// Internal kind and subtype of this operation
    pub fn kind(self) -> OperationKind {
        match self {
            Operation::RemoveParams => OperationKind::RemoveParameters,
            Operation::DeduplicateTld => OperationKind::Deduplicate(DedupScope::Tld),
            Operation::DeduplicateDomain => OperationKind::Deduplicate(DedupScope::Domain),
            Operation::DeduplicateFull => OperationKind::Deduplicate(DedupScope::Full),
            Operation::FilterKeep => OperationKind::Filter(FilterMode::Include),
            Operation::FilterRemove => OperationKind::Filter(FilterMode::Exclude),
            Operation::KeepTld => OperationKind::KeepTldOnly,
            Operation::TrimLastPath => OperationKind::TrimLastPathSegment,
            Operation::ExtractTld => OperationKind::ExtractRegistrableDomain,
            Operation::SortByDomain => OperationKind::SortByHost,
            Operation::SortByLength => OperationKind::SortByLength,
            Operation::SortByFilename => OperationKind::SortByFilenameStem,
        }
    }

    fn accepted_names() -> String {
        Self::ALL.iter().map(|op| op.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| {
                ProcessingError::Configuration(format!(
                    "unknown operation '{}', expected one of: {}",
                    s,
                    Self::accepted_names()
                ))
            })
    }
}

/// Which key a deduplication compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupScope {
    Tld,
    Domain,
    Full,
}

/// Whether a filter keeps or removes matching entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Include,
    Exclude,
}

/// Internal operation kind, subtype included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    RemoveParameters,
    Deduplicate(DedupScope),
    Filter(FilterMode),
    KeepTldOnly,
    TrimLastPathSegment,
    ExtractRegistrableDomain,
    SortByHost,
    SortByLength,
    SortByFilenameStem,
}

impl OperationKind {
    /// Keeps the first entry per key
    pub fn deduplicates(self) -> bool {
        matches!(
            self,
            OperationKind::Deduplicate(_) | OperationKind::ExtractRegistrableDomain
        )
    }

    /// Stable-sorts entries by key
    pub fn sorts(self) -> bool {
        matches!(
            self,
            OperationKind::SortByHost | OperationKind::SortByLength | OperationKind::SortByFilenameStem
        )
    }

    /// Results depend on the whole input, not just on each entry
    pub fn needs_global_pass(self) -> bool {
        self.deduplicates() || self.sorts()
    }
}

impl From<OperationKind> for Operation {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::RemoveParameters => Operation::RemoveParams,
            OperationKind::Deduplicate(DedupScope::Tld) => Operation::DeduplicateTld,
            OperationKind::Deduplicate(DedupScope::Domain) => Operation::DeduplicateDomain,
            OperationKind::Deduplicate(DedupScope::Full) => Operation::DeduplicateFull,
            OperationKind::Filter(FilterMode::Include) => Operation::FilterKeep,
            OperationKind::Filter(FilterMode::Exclude) => Operation::FilterRemove,
            OperationKind::KeepTldOnly => Operation::KeepTld,
            OperationKind::TrimLastPathSegment => Operation::TrimLastPath,
            OperationKind::ExtractRegistrableDomain => Operation::ExtractTld,
            OperationKind::SortByHost => Operation::SortByDomain,
            OperationKind::SortByLength => Operation::SortByLength,
            OperationKind::SortByFilenameStem => Operation::SortByFilename,
        }
    }
}

/// One operation to apply, immutable for the duration of a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub match_string: Option<String>,
    pub process_all: bool,
}

impl OperationRequest {
    /// A request over the full input with no match string
    pub fn new(operation: Operation) -> Self {
        Self {
            kind: operation.kind(),
            match_string: None,
            process_all: true,
        }
    }

    pub fn with_match(mut self, match_string: impl Into<String>) -> Self {
        self.match_string = Some(match_string.into());
        self
    }

    /// Limits the call to the preview prefix when `false`
    pub fn process_all(mut self, process_all: bool) -> Self {
        self.process_all = process_all;
        self
    }

    pub fn operation(&self) -> Operation {
        self.kind.into()
    }

    /// Rejects requests that cannot succeed on any input
    pub fn validate(&self) -> Result<(), ProcessingError> {
        if let OperationKind::Filter(_) = self.kind {
            let has_match = self
                .match_string
                .as_deref()
                .map_or(false, |m| !m.trim().is_empty());
            if !has_match {
                return Err(ProcessingError::Validation(format!(
                    "{} requires a non-empty match string",
                    self.operation()
                )));
            }
        }
        Ok(())
    }

    /// Lower-cased match string, empty when none was given
    pub fn needle(&self) -> String {
        self.match_string
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default()
    }

    /// Identity of this request for per-entry caching
    pub fn signature(&self) -> String {
        match self.kind {
            OperationKind::Filter(_) => format!("{}|{}", self.operation(), self.needle()),
            _ => self.operation().to_string(),
        }
    }
}
