//! Offloaded execution of large requests on an isolated worker thread.
//!
//! The caller and the worker exchange JSON messages only. The worker runs
//! its own scheduler, runtime and cache.

pub mod channel;
pub mod models;
pub mod workers;

pub use channel::{ChannelState, OffloadChannel};
pub use models::{ErrorKind, MessageType, WorkerOptions, WorkerRequest, WorkerResponse};
pub use workers::{run_worker, WorkerEndpoint};
