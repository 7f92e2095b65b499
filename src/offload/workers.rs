use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::batch::{BatchBudget, BatchScheduler, ProcessingResult, ProgressThrottle};
use crate::config::ProcessorConfig;
use crate::error::ProcessingError;
use crate::offload::models::{WorkerRequest, WorkerResponse};

/// The worker's half of an offload channel
///
/// All traffic is serialized JSON text; the two sides never share memory.
pub struct WorkerEndpoint {
    pub requests: mpsc::UnboundedReceiver<String>,
    pub responses: mpsc::UnboundedSender<String>,
    pub shutdown: oneshot::Receiver<()>,
}

/// Runs the offload worker until shutdown, on the current OS thread
///
/// The worker owns a single-threaded runtime, its own scheduler and its own
/// result cache. Dropping the runtime on exit cancels any request still in
/// flight at its next chunk boundary.
///
/// # Arguments
/// * `endpoint` - Worker side of the channel
/// * `config` - Processor settings used by the worker's scheduler
pub fn run_worker(endpoint: WorkerEndpoint, config: ProcessorConfig) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            // Returning drops the endpoint, which the caller observes as a fault
            error!("Failed to build offload runtime: {}", e);
            return;
        }
    };

    runtime.block_on(worker_loop(endpoint, config));
    info!("Offload worker stopped");
}

async fn worker_loop(endpoint: WorkerEndpoint, config: ProcessorConfig) {
    let WorkerEndpoint {
        mut requests,
        responses,
        mut shutdown,
    } = endpoint;

    let scheduler = Arc::new(BatchScheduler::new(config));
    post(&responses, &WorkerResponse::ready());
    debug!("Offload worker ready");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Offload worker shutting down - terminate requested");
                break;
            }
            message = requests.recv() => match message {
                Some(text) => {
                    tokio::spawn(handle_message(text, scheduler.clone(), responses.clone()));
                }
                None => {
                    info!("Offload worker shutting down - channel closed");
                    break;
                }
            }
        }
    }
}

/// Handles one request message, always ending with exactly one terminal message
async fn handle_message(text: String, scheduler: Arc<BatchScheduler>, responses: mpsc::UnboundedSender<String>) {
    let request: WorkerRequest = match serde_json::from_str(&text) {
        Ok(request) => request,
        Err(e) => {
            reject_malformed(&text, e, &responses);
            return;
        }
    };

    let id = request.id.clone();
    debug!("Offload worker processing request {} ({} urls)", id, request.urls.len());
    post(&responses, &WorkerResponse::start(&id));

    // A panic inside the processing task still yields a terminal message
    let task = tokio::spawn(process_request(request, scheduler, responses.clone()));
    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => Err(ProcessingError::Internal(format!("worker task failed: {}", e))),
    };

    match outcome {
        Ok(result) => {
            debug!("Offload request {} completed", id);
            post(&responses, &WorkerResponse::complete(&id, result));
        }
        Err(e) => {
            if e.is_request_error() {
                warn!("Offload request {} rejected: {}", id, e);
            } else {
                error!("Offload request {} failed: {}", id, e);
            }
            post(&responses, &WorkerResponse::error(&id, &e));
        }
    }
}

async fn process_request(
    request: WorkerRequest,
    scheduler: Arc<BatchScheduler>,
    responses: mpsc::UnboundedSender<String>,
) -> Result<ProcessingResult, ProcessingError> {
    let operation = request.operation_request()?;
    operation.validate()?;

    let throttle = Mutex::new(ProgressThrottle::new(scheduler.config().progress_interval()));
    let id = request.id.clone();
    let sink = responses.clone();
    let mut budget = BatchBudget::default().with_progress(Arc::new(move |event| {
        let emit = throttle
            .lock()
            .map(|mut throttle| throttle.should_emit(Instant::now()))
            .unwrap_or(false);
        if emit {
            post(&sink, &WorkerResponse::progress(&id, &event));
        }
    }));
    if let Some(chunk_size) = request.options.chunk_size {
        budget = budget.with_chunk_size(chunk_size);
    }

    let result = scheduler.run(&request.urls, &operation, budget).await;
    if result.success {
        Ok(result)
    } else {
        Err(ProcessingError::Validation(result.errors.join("; ")))
    }
}

/// Answers an unparseable request if it at least carries an id
fn reject_malformed(text: &str, err: serde_json::Error, responses: &mpsc::UnboundedSender<String>) {
    let id = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| value.get("id").and_then(|id| id.as_str()).map(str::to_owned));

    match id {
        Some(id) => {
            warn!("Offload request {} is malformed: {}", id, err);
            let fault = ProcessingError::Configuration(format!("malformed request: {}", err));
            post(responses, &WorkerResponse::error(&id, &fault));
        }
        None => warn!("Discarding offload message without id: {}", err),
    }
}

fn post(responses: &mpsc::UnboundedSender<String>, message: &WorkerResponse) {
    match serde_json::to_string(message) {
        Ok(text) => {
            if responses.send(text).is_err() {
                trace!("Dropping {:?} message - caller side closed", message.kind);
            }
        }
        Err(e) => error!("Failed to encode {:?} message: {}", message.kind, e),
    }
}
