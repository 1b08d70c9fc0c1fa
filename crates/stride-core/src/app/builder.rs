//! WorkerAppBuilder - wiring of config, ports and handlers.
//!
//! Fail-fast: `build()` validates the config and refuses to start with a
//! missing port, so a misconfigured process dies at startup instead of on
//! its first job.

use std::sync::Arc;

use tracing::info;

use super::dispatcher::DispatchCycle;
use super::lock_service::LockService;
use super::processor::{ItemProcessor, ProcessItemJob};
use super::scheduler::Scheduler;
use super::worker_loop::WorkerGroup;
use crate::config::{ConfigError, StrideConfig};
use crate::domain::RetryDecider;
use crate::ports::{AggregationStore, Clock, CoordinationStore, JobQueue, ResultStore, SystemClock};
use crate::typed::{JobRegistry, RegistryError};

/// # Example
/// ```ignore
/// let store = Arc::new(InMemoryWorkoutStore::new());
/// let app = WorkerAppBuilder::new(StrideConfig::default())
///     .coordination(Arc::new(InMemoryCoordinationStore::new()))
///     .aggregation(store.clone())
///     .results(store)
///     .queue(Arc::new(InMemoryJobQueue::new()))
///     .build()?;
/// ```
pub struct WorkerAppBuilder {
    config: StrideConfig,
    coordination: Option<Arc<dyn CoordinationStore>>,
    aggregation: Option<Arc<dyn AggregationStore>>,
    results: Option<Arc<dyn ResultStore>>,
    queue: Option<Arc<dyn JobQueue>>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing component: {0}")]
    MissingComponent(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl WorkerAppBuilder {
    pub fn new(config: StrideConfig) -> Self {
        Self {
            config,
            coordination: None,
            aggregation: None,
            results: None,
            queue: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn coordination(mut self, store: Arc<dyn CoordinationStore>) -> Self {
        self.coordination = Some(store);
        self
    }

    pub fn aggregation(mut self, store: Arc<dyn AggregationStore>) -> Self {
        self.aggregation = Some(store);
        self
    }

    pub fn results(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.results = Some(store);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<WorkerApp, BuildError> {
        self.config.validate()?;
        let coordination = self
            .coordination
            .ok_or(BuildError::MissingComponent("coordination store"))?;
        let aggregation = self
            .aggregation
            .ok_or(BuildError::MissingComponent("aggregation store"))?;
        let results = self
            .results
            .ok_or(BuildError::MissingComponent("result store"))?;
        let queue = self.queue.ok_or(BuildError::MissingComponent("job queue"))?;

        let locks = LockService::new(coordination);
        let mut processor = ItemProcessor::new(
            results,
            Arc::clone(&aggregation),
            RetryDecider::new(self.config.backoff_policy()),
            self.clock,
        );
        if self.config.processor.item_lock {
            processor = processor.with_item_lock(locks.clone(), self.config.item_lock_ttl());
        }

        let mut registry = JobRegistry::new();
        registry.register::<ProcessItemJob, _>(processor)?;

        let dispatch = Arc::new(DispatchCycle::new(
            locks,
            aggregation,
            Arc::clone(&queue),
            self.config.dispatch_config(),
        ));

        info!(
            item_lock = self.config.processor.item_lock,
            max_attempts = self.config.retry.max_attempts,
            job_types = ?registry.registered_types(),
            "worker app built"
        );
        Ok(WorkerApp {
            dispatch,
            registry: Arc::new(registry),
            queue,
            config: self.config,
        })
    }
}

/// A wired process: dispatch cycle, handler registry, and its queue.
pub struct WorkerApp {
    pub dispatch: Arc<DispatchCycle>,
    pub registry: Arc<JobRegistry>,
    pub queue: Arc<dyn JobQueue>,
    pub config: StrideConfig,
}

/// Running scheduler and workers of a `WorkerApp`.
pub struct RunningApp {
    scheduler: Option<Scheduler>,
    workers: WorkerGroup,
}

impl WorkerApp {
    pub fn start_workers(&self) -> WorkerGroup {
        WorkerGroup::spawn(
            self.config.worker.concurrency,
            Arc::clone(&self.queue),
            Arc::clone(&self.registry),
            self.config.poll_timeout(),
        )
    }

    /// Scheduler plus workers.
    pub fn start(&self) -> RunningApp {
        RunningApp {
            scheduler: Some(Scheduler::spawn(
                Arc::clone(&self.dispatch),
                self.config.dispatch_period(),
            )),
            workers: self.start_workers(),
        }
    }
}

impl RunningApp {
    /// Stop dispatching first, then let the workers finish their jobs.
    pub async fn shutdown(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown_and_join().await;
        }
        self.workers.shutdown_and_join().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dispatcher::DispatchReport;
    use crate::domain::{ResultStatus, WorkItemId};
    use crate::impls::{InMemoryCoordinationStore, InMemoryJobQueue, InMemoryWorkoutStore};
    use crate::typed::Job;
    use std::time::Duration;

    fn builder(store: &Arc<InMemoryWorkoutStore>) -> WorkerAppBuilder {
        WorkerAppBuilder::new(StrideConfig::default())
            .coordination(Arc::new(InMemoryCoordinationStore::new()))
            .aggregation(store.clone())
            .results(store.clone())
            .queue(Arc::new(InMemoryJobQueue::new()))
    }

    #[test]
    fn build_registers_processor() {
        let store = Arc::new(InMemoryWorkoutStore::new());
        let app = builder(&store).build().unwrap();
        assert_eq!(
            app.registry.registered_types(),
            vec![ProcessItemJob::TYPE.to_string()]
        );
    }

    #[test]
    fn missing_queue_is_rejected() {
        let store = Arc::new(InMemoryWorkoutStore::new());
        let result = WorkerAppBuilder::new(StrideConfig::default())
            .coordination(Arc::new(InMemoryCoordinationStore::new()))
            .aggregation(store.clone())
            .results(store)
            .build();
        assert!(matches!(result, Err(BuildError::MissingComponent("job queue"))));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let store = Arc::new(InMemoryWorkoutStore::new());
        let mut config = StrideConfig::default();
        config.worker.concurrency = 0;
        let result = WorkerAppBuilder::new(config)
            .coordination(Arc::new(InMemoryCoordinationStore::new()))
            .aggregation(store.clone())
            .results(store)
            .queue(Arc::new(InMemoryJobQueue::new()))
            .build();
        assert!(matches!(result, Err(BuildError::Config(_))));
    }

    #[tokio::test]
    async fn dispatch_then_workers_complete_items() {
        let store = Arc::new(InMemoryWorkoutStore::new());
        store.add_workout(WorkItemId::new(1), vec![60, 70, 80]).await;
        store
            .add_workout(WorkItemId::new(3), vec![95, 120, 150, 131])
            .await;
        let app = builder(&store).build().unwrap();

        let report = app.dispatch.run_once().await.unwrap();
        assert!(matches!(report, DispatchReport::Dispatched { submitted: 2, .. }));

        let workers = app.start_workers();
        for _ in 0..200 {
            if store.counts_by_status().await.completed == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        workers.shutdown_and_join().await;

        let results = store.results().await;
        assert!(results.iter().all(|r| r.status == ResultStatus::Completed));
        assert_eq!(results[1].max_metric, Some(150));
        assert_eq!(results[1].avg_metric, Some(124.0));
    }
}
