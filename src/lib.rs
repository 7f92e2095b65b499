//! URL list processing: classification, list operations, chunked batch
//! execution and an offload channel for large inputs.

pub mod batch;
pub mod config;
pub mod error;
pub mod offload;
pub mod operations;
pub mod processor;
pub mod url_parser;
pub mod utils;

pub use batch::{BatchBudget, BatchScheduler, MemoryProbe, ProcessingResult, ProcessingStats, ProgressCallback, ProgressEvent};
pub use config::ProcessorConfig;
pub use error::ProcessingError;
pub use offload::{ChannelState, OffloadChannel};
pub use operations::{apply, Operation, OperationEngine, OperationRequest};
pub use processor::{ExecutionMode, ProcessOptions, UrlProcessor};
pub use url_parser::{classify, is_valid, ClassifiedUrl, ClassifyError, UrlComponents};
