use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Progress of one call, emitted after each chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub processed_count: usize,
    pub total_count: usize,
    pub percentage: f64,
    pub batch_index: usize,
    pub total_batches: usize,
}

impl ProgressEvent {
    pub fn new(processed_count: usize, total_count: usize, batch_index: usize, total_batches: usize) -> Self {
        Self {
            processed_count,
            total_count,
            percentage: percentage(processed_count, total_count),
            batch_index,
            total_batches,
        }
    }
}

/// Callback receiving progress events
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Share of `total` done, 100 for empty inputs
pub fn percentage(processed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        (processed as f64 * 100.0) / total as f64
    }
}

/// Limits how often progress is forwarded
///
/// The first event always passes, later ones only once `interval` has elapsed.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_emit: None }
    }

    pub fn should_emit(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }
}
