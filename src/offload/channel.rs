use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::batch::{ProcessingResult, ProgressCallback};
use crate::config::ProcessorConfig;
use crate::error::ProcessingError;
use crate::offload::models::{MessageType, WorkerRequest, WorkerResponse};
use crate::offload::workers::{run_worker, WorkerEndpoint};
use crate::operations::OperationRequest;

const WORKER_THREAD_NAME: &str = "url-sifter-offload";

/// Lifecycle of an offload channel
///
/// Any number of requests may be in flight while `Ready`. `Terminated` is
/// final: a new channel has to be initialized for further offloaded calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Uninitialized,
    Initializing,
    Ready,
    Terminated,
}

type Outcome = Result<ProcessingResult, ProcessingError>;

struct PendingRequest {
    responder: oneshot::Sender<Outcome>,
    progress: Option<ProgressCallback>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingRequest>>>;

/// Caller-side manager of an isolated processing context
///
/// Requests are tagged with a fresh id and parked in a pending map until the
/// worker sends their terminal message. A background reader routes every
/// incoming message to its request.
pub struct OffloadChannel {
    state: Arc<Mutex<ChannelState>>,
    requests: mpsc::UnboundedSender<String>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    pending: PendingMap,
    reader: JoinHandle<()>,
}

impl OffloadChannel {
    /// Starts the standard worker and waits for it to signal readiness
    ///
    /// # Arguments
    /// * `config` - Settings for the worker's scheduler and the readiness timeout
    ///
    /// # Returns
    /// * `Result<Self, ProcessingError>` - `ChannelFault` if the worker does not become ready in time
    pub async fn initialize(config: ProcessorConfig) -> Result<Self, ProcessingError> {
        let init_timeout = config.offload_init_timeout();
        Self::initialize_with(init_timeout, move |endpoint| run_worker(endpoint, config)).await
    }

    /// Starts `worker` on a dedicated thread and waits for its `ready` message
    pub async fn initialize_with<F>(init_timeout: Duration, worker: F) -> Result<Self, ProcessingError>
    where
        F: FnOnce(WorkerEndpoint) + Send + 'static,
    {
        let state = Arc::new(Mutex::new(ChannelState::Initializing));
        debug!("Offload channel initializing");

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, mut response_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let endpoint = WorkerEndpoint {
            requests: request_rx,
            responses: response_tx,
            shutdown: shutdown_rx,
        };

        std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker(endpoint))
            .map_err(|e| ProcessingError::ChannelFault(format!("cannot start offload thread: {}", e)))?;

        let readiness = match timeout(init_timeout, await_ready(&mut response_rx)).await {
            Ok(readiness) => readiness,
            Err(_) => Err(ProcessingError::ChannelFault(format!(
                "offload context did not signal readiness within {} ms",
                init_timeout.as_millis()
            ))),
        };
        if let Err(e) = readiness {
            warn!("Offload channel initialization failed: {}", e);
            *lock(&state) = ChannelState::Terminated;
            let _ = shutdown_tx.send(());
            return Err(e);
        }

        *lock(&state) = ChannelState::Ready;
        info!("Offload channel ready");

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(route_responses(response_rx, pending.clone(), state.clone()));

        Ok(Self {
            state,
            requests: request_tx,
            shutdown: Mutex::new(Some(shutdown_tx)),
            pending,
            reader,
        })
    }

    pub fn state(&self) -> ChannelState {
        *lock(&self.state)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ChannelState::Ready
    }

    /// Number of requests still waiting for a terminal message
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Runs one request in the worker and waits for its terminal message
    ///
    /// # Arguments
    /// * `urls` - Raw input lines, moved across the channel
    /// * `request` - The operation to apply
    /// * `progress` - Receives the worker's throttled progress messages
    /// * `chunk_size` - Overrides the worker's configured chunk size
    pub async fn process(
        &self,
        urls: Vec<String>,
        request: &OperationRequest,
        progress: Option<ProgressCallback>,
        chunk_size: Option<usize>,
    ) -> Outcome {
        let id = Uuid::new_v4().to_string();
        let message = serde_json::to_string(&WorkerRequest::new(id.clone(), request, urls, chunk_size))
            .map_err(|e| ProcessingError::Internal(format!("cannot encode request: {}", e)))?;

        let (responder, response) = oneshot::channel();
        {
            // The state is read under the pending lock so a concurrent fault drains this entry
            let mut pending = lock(&self.pending);
            let state = self.state();
            if state != ChannelState::Ready {
                return Err(ProcessingError::ChannelFault(format!(
                    "offload channel is {:?}",
                    state
                )));
            }
            pending.insert(id.clone(), PendingRequest { responder, progress });
        }

        trace!("Posting offload request {}", id);
        if self.requests.send(message).is_err() {
            lock(&self.pending).remove(&id);
            return Err(ProcessingError::ChannelFault("offload context is gone".to_string()));
        }

        match response.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProcessingError::ChannelFault(format!(
                "request {} was dropped without a response",
                id
            ))),
        }
    }

    /// Stops the worker outright and rejects every pending request
    ///
    /// No partial results are produced. Calling it again is a no-op.
    pub fn terminate(&self) {
        {
            let mut state = lock(&self.state);
            if *state == ChannelState::Terminated {
                return;
            }
            *state = ChannelState::Terminated;
        }

        info!("Terminating offload channel");
        if let Some(shutdown) = lock(&self.shutdown).take() {
            let _ = shutdown.send(());
        }
        self.reader.abort();
        reject_all(&self.pending, "offload channel terminated");
    }
}

impl Drop for OffloadChannel {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn await_ready(responses: &mut mpsc::UnboundedReceiver<String>) -> Result<(), ProcessingError> {
    while let Some(text) = responses.recv().await {
        match serde_json::from_str::<WorkerResponse>(&text) {
            Ok(message) if message.kind == MessageType::Ready => return Ok(()),
            Ok(message) => warn!("Ignoring {:?} message before ready", message.kind),
            Err(e) => warn!("Ignoring malformed message before ready: {}", e),
        }
    }
    Err(ProcessingError::ChannelFault(
        "offload context exited during initialization".to_string(),
    ))
}

/// Routes worker messages to pending requests until the worker goes away
async fn route_responses(
    mut responses: mpsc::UnboundedReceiver<String>,
    pending: PendingMap,
    state: Arc<Mutex<ChannelState>>,
) {
    while let Some(text) = responses.recv().await {
        let message: WorkerResponse = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding malformed offload message: {}", e);
                continue;
            }
        };

        let Some(id) = message.id.clone() else {
            trace!("Offload message {:?} without id", message.kind);
            continue;
        };

        match message.kind {
            MessageType::Progress => {
                let callback = lock(&pending).get(&id).and_then(|p| p.progress.clone());
                if let (Some(callback), Some(event)) = (callback, message.progress_event()) {
                    callback(event);
                }
            }
            MessageType::Complete | MessageType::Error => {
                let request = lock(&pending).remove(&id);
                match request {
                    Some(request) => {
                        if request.responder.send(message.into_outcome()).is_err() {
                            debug!("Caller for offload request {} is gone", id);
                        }
                    }
                    None => warn!("Terminal message for unknown offload request {}", id),
                }
            }
            MessageType::Start | MessageType::Ready => trace!("Offload request {} {:?}", id, message.kind),
        }
    }

    // The worker closed its side without being asked to
    {
        let mut state = lock(&state);
        if *state == ChannelState::Terminated {
            return;
        }
        *state = ChannelState::Terminated;
    }
    error!("Offload context stopped unexpectedly");
    reject_all(&pending, "offload context stopped unexpectedly");
}

fn reject_all(pending: &PendingMap, reason: &str) {
    let drained: Vec<(String, PendingRequest)> = lock(pending).drain().collect();
    if !drained.is_empty() {
        warn!("Rejecting {} pending offload requests: {}", drained.len(), reason);
    }
    for (_, request) in drained {
        let _ = request
            .responder
            .send(Err(ProcessingError::ChannelFault(reason.to_string())));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::Operation;

    fn ready_text() -> String {
        serde_json::to_string(&WorkerResponse::ready()).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_process() {
        let channel = OffloadChannel::initialize(ProcessorConfig::default()).await.unwrap();
        assert_eq!(channel.state(), ChannelState::Ready);

        let urls = vec!["https://b.com".to_string(), "https://a.com".to_string()];
        let result = channel
            .process(urls, &OperationRequest::new(Operation::SortByDomain), None, None)
            .await
            .unwrap();

        assert_eq!(result.results, vec!["https://a.com", "https://b.com"]);
        assert_eq!(channel.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_init_times_out_without_ready() {
        let outcome = OffloadChannel::initialize_with(Duration::from_millis(50), |endpoint| {
            let _ = endpoint.shutdown.blocking_recv();
        })
        .await;

        match outcome {
            Err(ProcessingError::ChannelFault(msg)) => assert!(msg.contains("readiness")),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("initialization should time out"),
        }
    }

    #[tokio::test]
    async fn test_worker_exit_during_init() {
        let outcome = OffloadChannel::initialize_with(Duration::from_secs(5), drop).await;
        assert!(matches!(outcome, Err(ProcessingError::ChannelFault(_))));
    }

    #[tokio::test]
    async fn test_fault_rejects_pending_requests() {
        let channel = OffloadChannel::initialize_with(Duration::from_secs(5), |mut endpoint| {
            endpoint.responses.send(ready_text()).unwrap();
            // Accept one request, then die without answering
            let _ = endpoint.requests.blocking_recv();
        })
        .await
        .unwrap();

        let outcome = channel
            .process(vec!["https://a.com".into()], &OperationRequest::new(Operation::KeepTld), None, None)
            .await;

        assert!(matches!(outcome, Err(ProcessingError::ChannelFault(_))));
        assert_eq!(channel.state(), ChannelState::Terminated);
        assert_eq!(channel.pending_count(), 0);

        let again = channel
            .process(vec!["https://a.com".into()], &OperationRequest::new(Operation::KeepTld), None, None)
            .await;
        assert!(matches!(again, Err(ProcessingError::ChannelFault(_))));
    }

    #[tokio::test]
    async fn test_terminate_is_final() {
        let channel = OffloadChannel::initialize(ProcessorConfig::default()).await.unwrap();
        channel.terminate();
        channel.terminate();

        assert_eq!(channel.state(), ChannelState::Terminated);
        let outcome = channel
            .process(vec!["https://a.com".into()], &OperationRequest::new(Operation::KeepTld), None, None)
            .await;
        assert!(matches!(outcome, Err(ProcessingError::ChannelFault(_))));
    }
}
