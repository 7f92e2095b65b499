use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use super::cache::ResultCache;
use super::memory::{next_chunk_size, FixedMemoryProbe, MemoryProbe};
use super::progress::{ProgressCallback, ProgressEvent};
use super::result::ProcessingResult;
use crate::config::ProcessorConfig;
use crate::operations::{Keyed, OperationEngine, OperationRequest, Projection};
use crate::url_parser::CompoundTlds;

/// Per-call knobs for a scheduler run
#[derive(Clone, Default)]
pub struct BatchBudget {
    /// Overrides the configured chunk size
    pub chunk_size: Option<usize>,
    /// Receives one event per finished chunk
    pub progress: Option<ProgressCallback>,
    /// Consulted before each chunk; defaults to a probe reporting no pressure
    pub memory_probe: Option<Arc<dyn MemoryProbe>>,
}

impl BatchBudget {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory_probe = Some(probe);
        self
    }
}

/// Runs operations over large inputs in cooperative chunks
///
/// Entries are projected chunk by chunk with a yield to the runtime after
/// each chunk. Dedup and sort kinds are finalized once over all chunks, so
/// the chunk size never changes the output.
pub struct BatchScheduler {
    engine: OperationEngine,
    config: ProcessorConfig,
    cache: Option<Arc<Mutex<ResultCache>>>,
}

impl BatchScheduler {
    pub fn new(config: ProcessorConfig) -> Self {
        let engine = OperationEngine::new(CompoundTlds::with_extra(&config.compound_tlds));
        let cache = ResultCache::new(config.cache_capacity).map(|cache| Arc::new(Mutex::new(cache)));
        Self { engine, config, cache }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn engine(&self) -> &OperationEngine {
        &self.engine
    }

    /// Cache hit and miss counters, if caching is enabled
    pub async fn cache_stats(&self) -> Option<(u64, u64)> {
        match &self.cache {
            Some(cache) => {
                let cache = cache.lock().await;
                Some((cache.hits(), cache.misses()))
            }
            None => None,
        }
    }

    /// Applies one operation to `urls`, chunk by chunk
    ///
    /// Blank lines are dropped before counting. Without `process_all` only the
    /// preview prefix is processed.
    ///
    /// # Arguments
    /// * `urls` - Raw input lines
    /// * `request` - The operation to apply
    /// * `budget` - Chunk size, progress callback and memory probe for this call
    ///
    /// # Returns
    /// * `ProcessingResult` - `success: false` with the error message for request errors
    #[instrument(level = "debug", skip_all, fields(operation = %request.operation(), entries = urls.len()))]
    pub async fn run<S>(&self, urls: &[S], request: &OperationRequest, budget: BatchBudget) -> ProcessingResult
    where
        S: AsRef<str> + Sync,
    {
        let started = Instant::now();

        let mut lines: Vec<&str> = urls
            .iter()
            .map(|u| u.as_ref().trim())
            .filter(|u| !u.is_empty())
            .collect();
        if !request.process_all && lines.len() > self.config.preview_limit {
            debug!("Preview mode: limiting {} lines to {}", lines.len(), self.config.preview_limit);
            lines.truncate(self.config.preview_limit);
        }
        let input_count = lines.len();

        // Request errors are deterministic, so one check before the first chunk covers all chunks
        if let Err(e) = request.validate() {
            warn!("Rejecting {} request: {}", request.operation(), e);
            return ProcessingResult::failure(input_count, e.to_string(), elapsed_ms(started));
        }

        let probe: Arc<dyn MemoryProbe> = budget
            .memory_probe
            .clone()
            .unwrap_or_else(|| Arc::new(FixedMemoryProbe::default()));
        let mut chunk_size = budget
            .chunk_size
            .unwrap_or(self.config.chunk_size)
            .max(self.config.min_chunk_size);

        let signature = request.signature();
        let needle = request.needle();
        let mut kept: Vec<Keyed> = Vec::with_capacity(input_count);
        let mut invalid_count = 0;
        let mut offset = 0;
        let mut batch_index = 0;

        while offset < input_count {
            chunk_size = next_chunk_size(chunk_size, probe.as_ref(), &self.config);
            let end = (offset + chunk_size).min(input_count);
            let chunk = &lines[offset..end];
            trace!("Processing chunk {} ({}..{})", batch_index, offset, end);

            {
                let mut cache = match &self.cache {
                    Some(cache) => Some(cache.lock().await),
                    None => None,
                };

                for line in chunk {
                    let projection = match cache.as_mut() {
                        Some(cache) => match cache.get(&signature, line) {
                            Some(hit) => hit,
                            None => {
                                let projection = self.engine.project(line, request.kind, &needle);
                                cache.put(&signature, line, projection.clone());
                                projection
                            }
                        },
                        None => self.engine.project(line, request.kind, &needle),
                    };

                    match projection {
                        Projection::Keep(keyed) => kept.push(keyed),
                        Projection::Dropped => {}
                        Projection::Invalid => invalid_count += 1,
                    }
                }
            }

            offset = end;
            batch_index += 1;

            if let Some(progress) = &budget.progress {
                let remaining = input_count - offset;
                let total_batches = batch_index + remaining.div_ceil(chunk_size);
                progress(ProgressEvent::new(offset, input_count, batch_index, total_batches));
            }

            tokio::task::yield_now().await;
        }

        let results = OperationEngine::finalize(request.kind, kept);
        let result = ProcessingResult::success(input_count, results, invalid_count, elapsed_ms(started));

        info!(
            "{} finished: {} in, {} out, {} invalid, {} chunks in {} ms",
            request.operation(),
            result.input_count,
            result.output_count,
            result.invalid_count,
            batch_index,
            result.processing_time_ms
        );
        result
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::Operation;
    use std::sync::Mutex as StdMutex;

    fn scheduler() -> BatchScheduler {
        BatchScheduler::new(ProcessorConfig::default())
    }

    fn numbered_urls(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("https://host{}.example{}.com/page/{}?id={}", i % 37, i % 5, i, i))
            .collect()
    }

    #[tokio::test]
    async fn test_counts_skip_blank_lines() {
        let urls = vec!["not-a-url", "", "https://valid.com"];
        let result = scheduler()
            .run(&urls, &OperationRequest::new(Operation::RemoveParams), BatchBudget::default())
            .await;

        assert!(result.success);
        assert_eq!(result.input_count, 2);
        assert_eq!(result.invalid_count, 1);
        assert_eq!(result.results, vec!["https://valid.com"]);
        assert_eq!(result.removed_count, 1);
    }

    #[tokio::test]
    async fn test_validation_error_fails_call() {
        let urls = vec!["https://a.com"];
        let result = scheduler()
            .run(&urls, &OperationRequest::new(Operation::FilterKeep), BatchBudget::default())
            .await;

        assert!(!result.success);
        assert!(result.results.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("match string"));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let sink = events.clone();
        let budget = BatchBudget::default()
            .with_chunk_size(100)
            .with_progress(Arc::new(move |event| sink.lock().unwrap().push(event)));

        let urls = numbered_urls(450);
        scheduler()
            .run(&urls, &OperationRequest::new(Operation::RemoveParams), budget)
            .await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 5);
        assert!(events.windows(2).all(|w| w[0].processed_count <= w[1].processed_count));
        let last = events.last().unwrap();
        assert_eq!(last.processed_count, 450);
        assert_eq!(last.batch_index, 5);
        assert_eq!(last.total_batches, 5);
        assert_eq!(last.percentage, 100.0);
    }

    #[tokio::test]
    async fn test_memory_pressure_shrinks_chunks() {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let sink = events.clone();
        let budget = BatchBudget::default()
            .with_chunk_size(1000)
            .with_memory_probe(Arc::new(FixedMemoryProbe(0.95)))
            .with_progress(Arc::new(move |event| sink.lock().unwrap().push(event)));

        let urls = numbered_urls(1200);
        scheduler()
            .run(&urls, &OperationRequest::new(Operation::KeepTld), budget)
            .await;

        let processed: Vec<usize> = events.lock().unwrap().iter().map(|e| e.processed_count).collect();
        assert_eq!(processed, vec![500, 1000, 1200]);
    }

    #[tokio::test]
    async fn test_preview_limits_input() {
        let urls = numbered_urls(1500);
        let request = OperationRequest::new(Operation::RemoveParams).process_all(false);
        let result = scheduler().run(&urls, &request, BatchBudget::default()).await;

        assert_eq!(result.input_count, 1000);
        assert_eq!(result.output_count, 1000);
    }

    #[tokio::test]
    async fn test_chunking_does_not_change_dedup_or_sort() {
        let urls = numbered_urls(1000);
        let scheduler = scheduler();

        for op in [Operation::DeduplicateDomain, Operation::DeduplicateTld, Operation::SortByDomain, Operation::ExtractTld] {
            let request = OperationRequest::new(op);
            let chunked = scheduler.run(&urls, &request, BatchBudget::default().with_chunk_size(100)).await;
            let single = scheduler.run(&urls, &request, BatchBudget::default().with_chunk_size(1000)).await;
            assert_eq!(chunked.results, single.results, "{} differs when chunked", op);
        }
    }

    #[tokio::test]
    async fn test_cache_is_reused_across_calls() {
        let scheduler = scheduler();
        let urls = vec!["https://a.com/x?y=1", "https://b.com/z"];
        let request = OperationRequest::new(Operation::RemoveParams);

        let first = scheduler.run(&urls, &request, BatchBudget::default()).await;
        let second = scheduler.run(&urls, &request, BatchBudget::default()).await;

        assert_eq!(first.results, second.results);
        assert_eq!(scheduler.cache_stats().await, Some((2, 2)));
    }

    #[tokio::test]
    async fn test_cache_can_be_disabled() {
        let scheduler = BatchScheduler::new(ProcessorConfig { cache_capacity: 0, ..Default::default() });
        let urls = vec!["https://a.com"];
        scheduler
            .run(&urls, &OperationRequest::new(Operation::KeepTld), BatchBudget::default())
            .await;
        assert_eq!(scheduler.cache_stats().await, None);
    }
}
