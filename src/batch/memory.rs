use tracing::debug;

use crate::config::ProcessorConfig;

/// Reports how much of the host's memory budget is in use
///
/// Hosts without memory introspection use `FixedMemoryProbe`, which always
/// reports the same ratio.
pub trait MemoryProbe: Send + Sync {
    /// Used fraction of available memory, in `[0, 1]`
    fn used_ratio(&self) -> f64;
}

/// Probe returning a constant ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedMemoryProbe(pub f64);

impl Default for FixedMemoryProbe {
    fn default() -> Self {
        FixedMemoryProbe(0.0)
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn used_ratio(&self) -> f64 {
        self.0
    }
}

impl<F> MemoryProbe for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn used_ratio(&self) -> f64 {
        self()
    }
}

/// Picks the size of the next chunk
///
/// Shrinks to `pressure_chunk_size` while usage is above the high-water mark
/// and never goes below `min_chunk_size`.
pub fn next_chunk_size(current: usize, probe: &dyn MemoryProbe, config: &ProcessorConfig) -> usize {
    let ratio = probe.used_ratio();
    let size = if ratio > config.memory_high_water {
        let shrunk = current.min(config.pressure_chunk_size);
        if shrunk < current {
            debug!("Memory usage at {:.2}, shrinking chunks from {} to {}", ratio, current, shrunk);
        }
        shrunk
    } else {
        current
    };
    size.max(config.min_chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_pressure_keeps_size() {
        let config = ProcessorConfig::default();
        assert_eq!(next_chunk_size(1000, &FixedMemoryProbe(0.1), &config), 1000);
    }

    #[test]
    fn test_pressure_shrinks_size() {
        let config = ProcessorConfig::default();
        assert_eq!(next_chunk_size(1000, &FixedMemoryProbe(0.95), &config), 500);
        assert_eq!(next_chunk_size(300, &FixedMemoryProbe(0.95), &config), 300);
    }

    #[test]
    fn test_floor_applies() {
        let config = ProcessorConfig::default();
        assert_eq!(next_chunk_size(10, &FixedMemoryProbe(0.0), &config), 100);
    }

    #[test]
    fn test_closure_probe() {
        let probe = || 0.9;
        let config = ProcessorConfig::default();
        assert_eq!(next_chunk_size(2000, &probe, &config), 500);
    }
}
