//! InMemoryWorkoutStore - workouts, samples and results in one map set.
//!
//! Implements both `AggregationStore` and `ResultStore`, because discovery
//! ("no result record yet") reads the result table.
//!
//! Test hooks:
//! - `fail_next_creates(n)`, `fail_next_saves(n)`,
//!   `fail_next_completions(n)` and `fail_next_aggregates(n)` inject
//!   `Unavailable`
//! - `set_listing_unavailable(true)` breaks discovery
//! - `write_count()` counts creates and saves

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Aggregates, ProcessingResult, StoreError, WorkItemId};
use crate::observability::ResultCounts;
use crate::ports::{AggregationStore, Clock, ResultStore, SystemClock};

#[derive(Default)]
struct StoreState {
    /// workout -> heart-rate samples
    samples: BTreeMap<WorkItemId, Vec<i64>>,
    results: HashMap<WorkItemId, ProcessingResult>,
}

pub struct InMemoryWorkoutStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
    writes: AtomicUsize,
    failing_creates: AtomicU32,
    failing_saves: AtomicU32,
    failing_completions: AtomicU32,
    failing_aggregates: AtomicU32,
    listing_unavailable: AtomicBool,
}

impl InMemoryWorkoutStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock,
            writes: AtomicUsize::new(0),
            failing_creates: AtomicU32::new(0),
            failing_saves: AtomicU32::new(0),
            failing_completions: AtomicU32::new(0),
            failing_aggregates: AtomicU32::new(0),
            listing_unavailable: AtomicBool::new(false),
        }
    }

    /// Register a workout and its samples. An empty slice models a workout
    /// without measurements.
    pub async fn add_workout(&self, id: WorkItemId, samples: Vec<i64>) {
        let mut state = self.state.lock().await;
        state.samples.insert(id, samples);
    }

    /// Number of writes (creates + saves) so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_next_creates(&self, n: u32) {
        self.failing_creates.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_saves(&self, n: u32) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    /// Like `fail_next_saves`, but only for saves of a Completed record.
    pub fn fail_next_completions(&self, n: u32) {
        self.failing_completions.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_aggregates(&self, n: u32) {
        self.failing_aggregates.store(n, Ordering::SeqCst);
    }

    pub fn set_listing_unavailable(&self, unavailable: bool) {
        self.listing_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn counts_by_status(&self) -> ResultCounts {
        let state = self.state.lock().await;
        let mut counts = ResultCounts::from_results(state.results.values());
        counts.unprocessed = state
            .samples
            .keys()
            .filter(|id| !state.results.contains_key(id))
            .count();
        counts
    }

    pub async fn results(&self) -> Vec<ProcessingResult> {
        let state = self.state.lock().await;
        let mut all: Vec<_> = state.results.values().cloned().collect();
        all.sort_by_key(|r| r.work_item_id);
        all
    }

    /// Consume one injected failure, if any is armed.
    fn take_fault(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for InMemoryWorkoutStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AggregationStore for InMemoryWorkoutStore {
    async fn list_unprocessed_ids(&self) -> Result<Vec<WorkItemId>, StoreError> {
        if self.listing_unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("listing switched off".to_string()));
        }
        let state = self.state.lock().await;
        Ok(state
            .samples
            .keys()
            .filter(|id| !state.results.contains_key(id))
            .copied()
            .collect())
    }

    async fn aggregate(&self, id: WorkItemId) -> Result<Aggregates, StoreError> {
        if Self::take_fault(&self.failing_aggregates) {
            return Err(StoreError::Unavailable(format!("aggregate {id} failed")));
        }
        let state = self.state.lock().await;
        state
            .samples
            .get(&id)
            .and_then(|samples| Aggregates::from_samples(samples))
            .ok_or(StoreError::NotFound(id))
    }
}

#[async_trait]
impl ResultStore for InMemoryWorkoutStore {
    async fn get_or_create(&self, id: WorkItemId) -> Result<(ProcessingResult, bool), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.results.get(&id) {
            return Ok((existing.clone(), false));
        }
        if Self::take_fault(&self.failing_creates) {
            return Err(StoreError::Unavailable(format!("create {id} failed")));
        }
        let record = ProcessingResult::pending(id, self.clock.now());
        state.results.insert(id, record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok((record, true))
    }

    async fn save(&self, result: &ProcessingResult) -> Result<(), StoreError> {
        let completing = result.is_completed() && Self::take_fault(&self.failing_completions);
        if completing || Self::take_fault(&self.failing_saves) {
            return Err(StoreError::Unavailable(format!(
                "save {} failed",
                result.work_item_id
            )));
        }
        let mut state = self.state.lock().await;
        state.results.insert(result.work_item_id, result.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, id: WorkItemId) -> Result<Option<ProcessingResult>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.results.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResultStatus;

    #[tokio::test]
    async fn aggregate_heart_rates() {
        let store = InMemoryWorkoutStore::new();
        store.add_workout(WorkItemId::new(1), vec![60, 70, 80]).await;

        let a = store.aggregate(WorkItemId::new(1)).await.unwrap();
        assert_eq!(a.avg_metric, 70.0);
        assert_eq!(a.max_metric, 80);
    }

    #[tokio::test]
    async fn aggregate_without_samples_is_not_found() {
        let store = InMemoryWorkoutStore::new();
        store.add_workout(WorkItemId::new(2), Vec::new()).await;

        let err = store.aggregate(WorkItemId::new(2)).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound(WorkItemId::new(2)));
        let err = store.aggregate(WorkItemId::new(99)).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound(WorkItemId::new(99)));
    }

    #[tokio::test]
    async fn any_result_record_hides_item_from_discovery() {
        let store = InMemoryWorkoutStore::new();
        store.add_workout(WorkItemId::new(1), vec![1]).await;
        store.add_workout(WorkItemId::new(2), vec![2]).await;

        let (record, created) = store.get_or_create(WorkItemId::new(1)).await.unwrap();
        assert!(created);
        assert_eq!(record.status, ResultStatus::Pending);

        let ids = store.list_unprocessed_ids().await.unwrap();
        assert_eq!(ids, vec![WorkItemId::new(2)]);
    }

    #[tokio::test]
    async fn get_or_create_existing_does_not_write() {
        let store = InMemoryWorkoutStore::new();
        store.get_or_create(WorkItemId::new(1)).await.unwrap();
        assert_eq!(store.write_count(), 1);

        let (_, created) = store.get_or_create(WorkItemId::new(1)).await.unwrap();
        assert!(!created);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn injected_save_failures_are_consumed() {
        let store = InMemoryWorkoutStore::new();
        let (record, _) = store.get_or_create(WorkItemId::new(1)).await.unwrap();
        store.fail_next_saves(1);

        assert!(matches!(
            store.save(&record).await,
            Err(StoreError::Unavailable(_))
        ));
        store.save(&record).await.unwrap();
    }

    #[tokio::test]
    async fn counts_include_unprocessed() {
        let store = InMemoryWorkoutStore::new();
        store.add_workout(WorkItemId::new(1), vec![1]).await;
        store.add_workout(WorkItemId::new(2), vec![2]).await;
        store.get_or_create(WorkItemId::new(1)).await.unwrap();

        let counts = store.counts_by_status().await;
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.unprocessed, 1);
    }
}
