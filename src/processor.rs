use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::batch::{BatchBudget, BatchScheduler, MemoryProbe, ProcessingResult, ProgressCallback};
use crate::config::ProcessorConfig;
use crate::error::ProcessingError;
use crate::offload::{run_worker, ChannelState, OffloadChannel, WorkerEndpoint};
use crate::operations::OperationRequest;

/// Starts the worker side of an offload channel on its dedicated thread
pub type WorkerFactory = Arc<dyn Fn(WorkerEndpoint, ProcessorConfig) + Send + Sync>;

/// Where a processor runs its calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Always on the caller's runtime
    InProcess,
    /// Always on the offload worker, unless the call opts out
    Offload,
    /// Offload once the input reaches `offload_threshold`
    #[default]
    Auto,
}

/// Per-call options for `UrlProcessor::process_operation`
#[derive(Clone, Default)]
pub struct ProcessOptions {
    pub progress: Option<ProgressCallback>,
    /// Forces or forbids offloading for this call
    pub use_offload: Option<bool>,
    pub chunk_size: Option<usize>,
    /// Only consulted in-process; the worker has no access to the caller's memory
    pub memory_probe: Option<Arc<dyn MemoryProbe>>,
    /// Overrides the configured wall-clock budget
    pub timeout: Option<Duration>,
}

impl ProcessOptions {
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_offload(mut self, use_offload: bool) -> Self {
        self.use_offload = Some(use_offload);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory_probe = Some(probe);
        self
    }

    pub fn with_timeout(mut self, budget: Duration) -> Self {
        self.timeout = Some(budget);
        self
    }
}

/// Entry point combining dispatch, batching and offloading
///
/// In-process calls share one scheduler and its cache. Offloaded calls share
/// one lazily started channel; a terminated or faulted channel is replaced on
/// the next offloaded call.
pub struct UrlProcessor {
    config: ProcessorConfig,
    mode: ExecutionMode,
    scheduler: Arc<BatchScheduler>,
    channel: Mutex<Option<Arc<OffloadChannel>>>,
    worker: WorkerFactory,
}

impl UrlProcessor {
    pub fn new(config: ProcessorConfig, mode: ExecutionMode) -> Self {
        Self {
            scheduler: Arc::new(BatchScheduler::new(config.clone())),
            config,
            mode,
            channel: Mutex::new(None),
            worker: Arc::new(run_worker),
        }
    }

    /// Replaces the worker started for offloaded calls
    pub fn with_worker<F>(mut self, worker: F) -> Self
    where
        F: Fn(WorkerEndpoint, ProcessorConfig) + Send + Sync + 'static,
    {
        self.worker = Arc::new(worker);
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn scheduler(&self) -> &Arc<BatchScheduler> {
        &self.scheduler
    }

    /// State of the current offload channel, `Uninitialized` if none is held
    pub async fn offload_state(&self) -> ChannelState {
        match self.channel.lock().await.as_ref() {
            Some(channel) => channel.state(),
            None => ChannelState::Uninitialized,
        }
    }

    /// Applies one operation to `urls` and returns the aggregated result
    ///
    /// Request errors are rejected before any work starts. When offloading is
    /// chosen but the channel cannot be initialized, the call falls back to
    /// in-process execution.
    ///
    /// # Arguments
    /// * `urls` - Raw input lines
    /// * `request` - The operation to apply
    /// * `options` - Progress callback, dispatch override, chunk size, memory probe and time budget
    ///
    /// # Returns
    /// * `Result<ProcessingResult, ProcessingError>` - The result, or the call-level failure
    #[instrument(level = "debug", skip_all, fields(operation = %request.operation(), entries = urls.len()))]
    pub async fn process_operation(
        &self,
        urls: Vec<String>,
        request: &OperationRequest,
        options: ProcessOptions,
    ) -> Result<ProcessingResult, ProcessingError> {
        request.validate()?;
        let budget = options.timeout.unwrap_or_else(|| self.config.timeout());

        if self.should_offload(&urls, request, &options) {
            match self.offload_channel().await {
                Ok(channel) => return self.run_offloaded(channel, urls, request, options, budget).await,
                Err(e) => warn!("Offload unavailable, processing in-process: {}", e),
            }
        }

        self.run_in_process(urls, request, options, budget).await
    }

    /// Terminates the offload channel, if one is running
    pub async fn shutdown(&self) {
        if let Some(channel) = self.channel.lock().await.take() {
            channel.terminate();
        }
    }

    fn should_offload(&self, urls: &[String], request: &OperationRequest, options: &ProcessOptions) -> bool {
        match (self.mode, options.use_offload) {
            (ExecutionMode::InProcess, _) => false,
            (_, Some(explicit)) => explicit,
            (ExecutionMode::Offload, None) => true,
            (ExecutionMode::Auto, None) => {
                let mut size = urls.iter().filter(|u| !u.trim().is_empty()).count();
                if !request.process_all {
                    size = size.min(self.config.preview_limit);
                }
                size >= self.config.offload_threshold
            }
        }
    }

    /// Returns the live channel, starting a new one if needed
    async fn offload_channel(&self) -> Result<Arc<OffloadChannel>, ProcessingError> {
        let mut slot = self.channel.lock().await;
        if let Some(channel) = slot.as_ref() {
            if channel.is_ready() {
                return Ok(channel.clone());
            }
            debug!("Replacing offload channel in state {:?}", channel.state());
        }

        let worker = self.worker.clone();
        let config = self.config.clone();
        let channel = Arc::new(
            OffloadChannel::initialize_with(self.config.offload_init_timeout(), move |endpoint| {
                worker(endpoint, config)
            })
            .await?,
        );
        *slot = Some(channel.clone());
        Ok(channel)
    }

    /// Drops `channel` from the slot unless it was already replaced
    async fn discard_channel(&self, channel: &Arc<OffloadChannel>) {
        let mut slot = self.channel.lock().await;
        if slot.as_ref().map_or(false, |current| Arc::ptr_eq(current, channel)) {
            *slot = None;
        }
    }

    async fn run_offloaded(
        &self,
        channel: Arc<OffloadChannel>,
        urls: Vec<String>,
        request: &OperationRequest,
        options: ProcessOptions,
        budget: Duration,
    ) -> Result<ProcessingResult, ProcessingError> {
        debug!("Offloading {} entries", urls.len());
        let call = channel.process(urls, request, options.progress, options.chunk_size);

        match timeout(budget, call).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                if matches!(e, ProcessingError::ChannelFault(_)) {
                    self.discard_channel(&channel).await;
                }
                Err(e)
            }
            Err(_) => {
                warn!("Offloaded {} exceeded {:?}, terminating the worker", request.operation(), budget);
                channel.terminate();
                self.discard_channel(&channel).await;
                Err(ProcessingError::Timeout { budget_ms: budget_ms(budget) })
            }
        }
    }

    async fn run_in_process(
        &self,
        urls: Vec<String>,
        request: &OperationRequest,
        options: ProcessOptions,
        budget: Duration,
    ) -> Result<ProcessingResult, ProcessingError> {
        let mut batch = BatchBudget::default();
        batch.chunk_size = options.chunk_size;
        batch.progress = options.progress;
        batch.memory_probe = options.memory_probe;

        let scheduler = self.scheduler.clone();
        let owned_request = request.clone();
        let task = tokio::spawn(async move { scheduler.run(&urls, &owned_request, batch).await });

        match timeout(budget, task).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(ProcessingError::Internal(format!("processing task failed: {}", e))),
            Err(_) => {
                // Dropping the handle detaches the task; it finishes its chunks unobserved
                info!("{} exceeded {:?}, leaving it to finish in the background", request.operation(), budget);
                Err(ProcessingError::Timeout { budget_ms: budget_ms(budget) })
            }
        }
    }
}

fn budget_ms(budget: Duration) -> u64 {
    budget.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FixedMemoryProbe;
    use crate::operations::Operation;

    fn urls(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_rejects_invalid_request_up_front() {
        let processor = UrlProcessor::new(ProcessorConfig::default(), ExecutionMode::Auto);
        let outcome = processor
            .process_operation(urls(&["https://a.com"]), &OperationRequest::new(Operation::FilterKeep), ProcessOptions::default())
            .await;

        assert!(matches!(outcome, Err(ProcessingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_auto_mode_keeps_small_inputs_in_process() {
        let processor = UrlProcessor::new(ProcessorConfig::default(), ExecutionMode::Auto);
        let result = processor
            .process_operation(
                urls(&["https://example.com/a?x=1", "https://EXAMPLE.com/b"]),
                &OperationRequest::new(Operation::DeduplicateDomain),
                ProcessOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.results, vec!["https://example.com/a?x=1"]);
        assert_eq!(processor.offload_state().await, ChannelState::Uninitialized);
    }

    #[tokio::test]
    async fn test_offload_mode_matches_in_process() {
        let input = urls(&["https://b.com/x", "junk", "https://a.com/y?z=1", "https://b.com/x"]);
        let request = OperationRequest::new(Operation::SortByDomain);

        let local = UrlProcessor::new(ProcessorConfig::default(), ExecutionMode::InProcess);
        let remote = UrlProcessor::new(ProcessorConfig::default(), ExecutionMode::Offload);

        let expected = local.process_operation(input.clone(), &request, ProcessOptions::default()).await.unwrap();
        let actual = remote.process_operation(input, &request, ProcessOptions::default()).await.unwrap();

        assert_eq!(actual.results, expected.results);
        assert_eq!(actual.invalid_count, 1);
        assert_eq!(remote.offload_state().await, ChannelState::Ready);
        remote.shutdown().await;
        assert_eq!(remote.offload_state().await, ChannelState::Uninitialized);
    }

    #[tokio::test]
    async fn test_falls_back_when_offload_never_ready() {
        let config = ProcessorConfig { offload_init_timeout_ms: 50, ..Default::default() };
        let processor = UrlProcessor::new(config, ExecutionMode::Offload).with_worker(|endpoint, _| {
            let _ = endpoint.shutdown.blocking_recv();
        });

        let result = processor
            .process_operation(urls(&["https://a.com/x?y=1"]), &OperationRequest::new(Operation::RemoveParams), ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(result.results, vec!["https://a.com/x"]);
        assert_eq!(processor.offload_state().await, ChannelState::Uninitialized);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_in_process_timeout() {
        let processor = UrlProcessor::new(ProcessorConfig::default(), ExecutionMode::InProcess);
        let slow_probe = Arc::new(|| {
            std::thread::sleep(Duration::from_millis(5));
            0.0
        });
        let options = ProcessOptions::default()
            .with_chunk_size(100)
            .with_memory_probe(slow_probe)
            .with_timeout(Duration::from_millis(10));

        let input: Vec<String> = (0..5000).map(|i| format!("https://h{}.com/{}", i, i)).collect();
        let outcome = processor
            .process_operation(input, &OperationRequest::new(Operation::KeepTld), options)
            .await;

        assert_eq!(outcome, Err(ProcessingError::Timeout { budget_ms: 10 }));
    }

    #[tokio::test]
    async fn test_explicit_opt_out_of_offload() {
        let processor = UrlProcessor::new(ProcessorConfig::default(), ExecutionMode::Offload);
        let options = ProcessOptions::default()
            .with_offload(false)
            .with_memory_probe(Arc::new(FixedMemoryProbe(0.9)));

        let result = processor
            .process_operation(urls(&["https://a.com"]), &OperationRequest::new(Operation::KeepTld), options)
            .await
            .unwrap();

        assert_eq!(result.results, vec!["https://a.com"]);
        assert_eq!(processor.offload_state().await, ChannelState::Uninitialized);
    }
}
