use serde::{Deserialize, Serialize};

use crate::batch::{ProcessingResult, ProcessingStats, ProgressEvent};
use crate::error::ProcessingError;
use crate::operations::{Operation, OperationRequest};

/// Options travelling with an offloaded request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_string: Option<String>,

    #[serde(default = "default_process_all")]
    pub process_all: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
}

fn default_process_all() -> bool {
    true
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            match_string: None,
            process_all: true,
            chunk_size: None,
        }
    }
}

/// Request sent to the offload context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    pub id: String,
    pub operation_kind: String,
    pub urls: Vec<String>,
    #[serde(default)]
    pub options: WorkerOptions,
}

impl WorkerRequest {
    pub fn new(id: String, request: &OperationRequest, urls: Vec<String>, chunk_size: Option<usize>) -> Self {
        Self {
            id,
            operation_kind: request.operation().name().to_owned(),
            urls,
            options: WorkerOptions {
                match_string: request.match_string.clone(),
                process_all: request.process_all,
                chunk_size,
            },
        }
    }

    /// Rebuilds the operation request on the worker side
    pub fn operation_request(&self) -> Result<OperationRequest, ProcessingError> {
        let operation: Operation = self.operation_kind.parse()?;
        let mut request = OperationRequest::new(operation).process_all(self.options.process_all);
        request.match_string = self.options.match_string.clone();
        Ok(request)
    }
}

/// Message types sent back by the offload context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Ready,
    Start,
    Progress,
    Complete,
    Error,
}

/// Category of a reported `error` message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Configuration,
    Internal,
}

/// Message sent back by the offload context
///
/// `ready` carries no id; every other type belongs to exactly one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub kind: MessageType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ProcessingStats>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl WorkerResponse {
    fn empty(id: Option<String>, kind: MessageType) -> Self {
        Self {
            id,
            kind,
            processed: None,
            total: None,
            percentage: None,
            batch_index: None,
            total_batches: None,
            results: None,
            stats: None,
            error: None,
            error_kind: None,
        }
    }

    pub fn ready() -> Self {
        Self::empty(None, MessageType::Ready)
    }

    pub fn start(id: &str) -> Self {
        Self::empty(Some(id.to_owned()), MessageType::Start)
    }

    pub fn progress(id: &str, event: &ProgressEvent) -> Self {
        Self {
            processed: Some(event.processed_count),
            total: Some(event.total_count),
            percentage: Some(event.percentage),
            batch_index: Some(event.batch_index),
            total_batches: Some(event.total_batches),
            ..Self::empty(Some(id.to_owned()), MessageType::Progress)
        }
    }

    pub fn complete(id: &str, result: ProcessingResult) -> Self {
        let stats = result.stats();
        Self {
            processed: Some(result.input_count),
            total: Some(result.input_count),
            percentage: Some(100.0),
            results: Some(result.results),
            stats: Some(stats),
            ..Self::empty(Some(id.to_owned()), MessageType::Complete)
        }
    }

    pub fn error(id: &str, err: &ProcessingError) -> Self {
        let (kind, message) = match err {
            ProcessingError::Validation(msg) => (ErrorKind::Validation, msg.clone()),
            ProcessingError::Configuration(msg) => (ErrorKind::Configuration, msg.clone()),
            other => (ErrorKind::Internal, other.to_string()),
        };
        Self {
            error: Some(message),
            error_kind: Some(kind),
            ..Self::empty(Some(id.to_owned()), MessageType::Error)
        }
    }

    /// Whether this message ends its request
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, MessageType::Complete | MessageType::Error)
    }

    /// Progress event carried by a `progress` message
    pub fn progress_event(&self) -> Option<ProgressEvent> {
        match (self.kind, self.processed, self.total) {
            (MessageType::Progress, Some(processed), Some(total)) => Some(ProgressEvent {
                processed_count: processed,
                total_count: total,
                percentage: self.percentage.unwrap_or_else(|| crate::batch::progress::percentage(processed, total)),
                batch_index: self.batch_index.unwrap_or_default(),
                total_batches: self.total_batches.unwrap_or_default(),
            }),
            _ => None,
        }
    }

    /// Converts a terminal message into the caller-facing outcome
    pub fn into_outcome(self) -> Result<ProcessingResult, ProcessingError> {
        match self.kind {
            MessageType::Complete => {
                let results = self.results.unwrap_or_default();
                let stats = self.stats.unwrap_or_else(|| ProcessingStats {
                    input_count: results.len(),
                    output_count: results.len(),
                    ..Default::default()
                });
                Ok(ProcessingResult::from_parts(results, stats))
            }
            MessageType::Error => {
                let message = self.error.unwrap_or_else(|| "offloaded request failed".to_owned());
                Err(match self.error_kind {
                    Some(ErrorKind::Validation) => ProcessingError::Validation(message),
                    Some(ErrorKind::Configuration) => ProcessingError::Configuration(message),
                    _ => ProcessingError::Internal(message),
                })
            }
            other => Err(ProcessingError::Internal(format!(
                "{:?} is not a terminal message",
                other
            ))),
        }
    }
}
