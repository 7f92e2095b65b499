use serde::{Deserialize, Serialize};

/// Outcome of one processing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub success: bool,
    pub input_count: usize,     // Non-blank lines considered
    pub output_count: usize,
    pub removed_count: usize,   // input_count - output_count
    pub invalid_count: usize,
    pub results: Vec<String>,
    pub errors: Vec<String>,
    pub processing_time_ms: u64,
}

/// Counters of a `ProcessingResult` without the result lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub input_count: usize,
    pub output_count: usize,
    pub removed_count: usize,
    pub invalid_count: usize,
    pub processing_time_ms: u64,
}

impl ProcessingResult {
    pub fn success(input_count: usize, results: Vec<String>, invalid_count: usize, processing_time_ms: u64) -> Self {
        let output_count = results.len();
        Self {
            success: true,
            input_count,
            output_count,
            removed_count: input_count.saturating_sub(output_count),
            invalid_count,
            results,
            errors: Vec::new(),
            processing_time_ms,
        }
    }

    /// A failed call: no results, everything counted as removed
    pub fn failure(input_count: usize, error: impl Into<String>, processing_time_ms: u64) -> Self {
        Self {
            success: false,
            input_count,
            output_count: 0,
            removed_count: input_count,
            invalid_count: 0,
            results: Vec::new(),
            errors: vec![error.into()],
            processing_time_ms,
        }
    }

    pub fn stats(&self) -> ProcessingStats {
        ProcessingStats {
            input_count: self.input_count,
            output_count: self.output_count,
            removed_count: self.removed_count,
            invalid_count: self.invalid_count,
            processing_time_ms: self.processing_time_ms,
        }
    }

    /// Rebuilds a successful result from the offload wire payload
    pub fn from_parts(results: Vec<String>, stats: ProcessingStats) -> Self {
        Self {
            success: true,
            input_count: stats.input_count,
            output_count: results.len(),
            removed_count: stats.input_count.saturating_sub(results.len()),
            invalid_count: stats.invalid_count,
            results,
            errors: Vec::new(),
            processing_time_ms: stats.processing_time_ms,
        }
    }
}
