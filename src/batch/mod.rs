//! Chunked, cooperative execution of operations over large inputs.

pub mod cache;
pub mod memory;
pub mod progress;
pub mod result;
pub mod scheduler;

pub use cache::ResultCache;
pub use memory::{next_chunk_size, FixedMemoryProbe, MemoryProbe};
pub use progress::{ProgressCallback, ProgressEvent, ProgressThrottle};
pub use result::{ProcessingResult, ProcessingStats};
pub use scheduler::{BatchBudget, BatchScheduler};
