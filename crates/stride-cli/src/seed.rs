//! Workout fixtures for the in-memory store.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use stride_core::domain::WorkItemId;
use stride_core::impls::InMemoryWorkoutStore;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedWorkout {
    pub id: u64,
    #[serde(default)]
    pub heart_rates: Vec<i64>,
}

/// W1 completes, W2 has no samples and fails, W3 completes.
pub fn builtin() -> Vec<SeedWorkout> {
    vec![
        SeedWorkout {
            id: 1,
            heart_rates: vec![60, 70, 80],
        },
        SeedWorkout {
            id: 2,
            heart_rates: Vec::new(),
        },
        SeedWorkout {
            id: 3,
            heart_rates: vec![95, 120, 150, 131],
        },
    ]
}

pub fn parse(raw: &str) -> anyhow::Result<Vec<SeedWorkout>> {
    serde_json::from_str(raw).context("seed must be a JSON array of {id, heart_rates}")
}

pub fn load(path: Option<&Path>) -> anyhow::Result<Vec<SeedWorkout>> {
    let Some(path) = path else {
        return Ok(builtin());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    parse(&raw)
}

pub async fn apply(store: &InMemoryWorkoutStore, workouts: Vec<SeedWorkout>) {
    for w in workouts {
        store.add_workout(WorkItemId::new(w.id), w.heart_rates).await;
    }
}
