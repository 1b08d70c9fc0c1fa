//! Aggregate statistics over one work item's samples.

use serde::{Deserialize, Serialize};

/// Average and maximum of an item's measurements (heart rate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub avg_metric: f64,
    pub max_metric: i64,
}

impl Aggregates {
    /// Aggregate a slice of samples. `None` when there are no samples
    /// (the average is undefined).
    pub fn from_samples(samples: &[i64]) -> Option<Self> {
        let max_metric = *samples.iter().max()?;
        let sum: i128 = samples.iter().map(|&s| s as i128).sum();
        Some(Self {
            avg_metric: sum as f64 / samples.len() as f64,
            max_metric,
        })
    }
}
