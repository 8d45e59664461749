//! Batch dispatcher: runs persona tasks on a bounded worker pool
//!
//! Small batches run sequentially on the calling thread. Larger batches run
//! on a dedicated rayon pool whose size equals the rate limit, so pool size
//! and limiter co-bound concurrency. Results come back in submission order
//! regardless of completion order, and one failing task never affects the
//! others.

use super::params::ParameterMode;
use super::prompt::PromptTemplate;
use super::rate_limiter::RateLimiter;
use super::task::{GenerationTask, PersonaTask, TaskFailure, TaskResult};
use crate::demographics::DemographicSource;
use crate::error::{DispatchError, GenerationError};
use crate::llm::CompletionService;
use crate::store::PersonaEntry;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Progress callback: (completed, total, message). Called from worker threads.
pub type ProgressFn<'a> = dyn Fn(usize, usize, &str) + Sync + 'a;

/// Settings for a dispatch run
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum completion requests per second; also the worker pool size
    pub rate_limit_per_second: usize,

    /// Batches smaller than this run sequentially
    pub parallel_threshold: usize,

    /// Sampling temperature passed to the completion service
    pub temperature: f64,

    /// Token budget per completion
    pub max_tokens: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_second: 5,
            parallel_threshold: 5,
            temperature: 0.7,
            max_tokens: 3000,
        }
    }
}

/// Cooperative cancellation, checked before each task starts
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Successful personas and failures, both in submission order
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub personas: Vec<PersonaEntry>,
    pub failures: Vec<TaskFailure>,
}

impl BatchOutcome {
    fn from_results(results: Vec<TaskResult>) -> Self {
        let mut outcome = BatchOutcome::default();
        for result in results {
            match result {
                TaskResult::Success { entry, .. } => outcome.personas.push(*entry),
                TaskResult::Failure(failure) => outcome.failures.push(failure),
            }
        }
        outcome
    }

    /// Human-readable error messages
    pub fn errors(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.message.clone()).collect()
    }

    /// Positions to resubmit
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

/// Runs batches of persona generation against one completion service
pub struct BatchDispatcher {
    service: Arc<dyn CompletionService>,
    source: Arc<dyn DemographicSource>,
    template: PromptTemplate,
    config: DispatchConfig,
    limiter: RateLimiter,
}

impl BatchDispatcher {
    pub fn new(
        service: Arc<dyn CompletionService>,
        source: Arc<dyn DemographicSource>,
        template: PromptTemplate,
        config: DispatchConfig,
    ) -> Self {
        let limiter = RateLimiter::per_second(config.rate_limit_per_second);
        Self {
            service,
            source,
            template,
            config,
            limiter,
        }
    }

    /// Replace the limiter; the worker pool follows its limit
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Worker pool size for parallel runs
    pub fn pool_size(&self) -> usize {
        self.limiter.max_per_window()
    }

    /// Generate `count` personas
    pub fn dispatch(
        &self,
        count: usize,
        mode: &ParameterMode,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<BatchOutcome, DispatchError> {
        self.dispatch_cancellable(count, mode, progress, &CancellationToken::new())
    }

    /// Generate `count` personas, skipping tasks that have not started once `cancel` fires
    pub fn dispatch_cancellable(
        &self,
        count: usize,
        mode: &ParameterMode,
        progress: Option<&ProgressFn<'_>>,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, DispatchError> {
        if count == 0 {
            return Ok(BatchOutcome::default());
        }

        let start = Instant::now();
        let parallel = count >= self.config.parallel_threshold;
        log::info!(
            "Generating {} personas ({}, {} parameters)",
            count,
            if parallel { "parallel" } else { "sequential" },
            if mode.is_randomized() { "randomized" } else { "fixed" },
        );

        let results = if parallel {
            self.run_parallel(count, mode, progress, cancel)?
        } else {
            self.run_sequential(count, mode, progress, cancel)
        };

        let outcome = BatchOutcome::from_results(results);
        log::info!(
            "Batch finished in {:?}: {} personas, {} errors",
            start.elapsed(),
            outcome.personas.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    fn run_sequential(
        &self,
        count: usize,
        mode: &ParameterMode,
        progress: Option<&ProgressFn<'_>>,
        cancel: &CancellationToken,
    ) -> Vec<TaskResult> {
        (0..count)
            .map(|index| {
                let result = self.run_one(index, mode, cancel);
                report(progress, index + 1, count);
                result
            })
            .collect()
    }

    fn run_parallel(
        &self,
        count: usize,
        mode: &ParameterMode,
        progress: Option<&ProgressFn<'_>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TaskResult>, DispatchError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.pool_size())
            .thread_name(|i| format!("persona-worker-{}", i))
            .build()?;

        let completed = AtomicUsize::new(0);

        // Collecting an indexed iterator writes each result into its submission slot
        let results = pool.install(|| {
            (0..count)
                .into_par_iter()
                .with_max_len(1)
                .map(|index| {
                    let result = self.run_one(index, mode, cancel);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    report(progress, done, count);
                    result
                })
                .collect::<Vec<_>>()
        });

        Ok(results)
    }

    /// Run one task, converting every failure (including a panic) into a result
    fn run_one(&self, index: usize, mode: &ParameterMode, cancel: &CancellationToken) -> TaskResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.generate(index, mode, cancel)))
            .unwrap_or_else(|payload| Err(GenerationError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(entry) => TaskResult::Success {
                index,
                entry: Box::new(entry),
            },
            Err(error) => {
                let failure = TaskFailure::new(index, &error);
                log::warn!("{}", failure.message);
                TaskResult::Failure(failure)
            }
        }
    }

    fn prepare(&self, index: usize, mode: &ParameterMode) -> Result<GenerationTask, GenerationError> {
        let sample = self
            .source
            .draw_for(index)
            .ok_or(GenerationError::NoDemographicSample)?;
        let params = mode.resolve(&mut rand::thread_rng());
        Ok(GenerationTask { index, sample, params })
    }

    fn generate(
        &self,
        index: usize,
        mode: &ParameterMode,
        cancel: &CancellationToken,
    ) -> Result<PersonaEntry, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let task = self.prepare(index, mode)?;
        log::debug!("Generating persona {}", index + 1);

        let persona = PersonaTask::new(
            self.service.as_ref(),
            &self.limiter,
            &self.template,
            self.config.temperature,
            self.config.max_tokens,
        )
        .run(&task.sample, &task.params)?;

        Ok(PersonaEntry::new(task.index, persona, task.sample, task.params))
    }
}

fn report(progress: Option<&ProgressFn<'_>>, done: usize, total: usize) {
    if let Some(callback) = progress {
        callback(done, total, &format!("Completed {}/{} personas", done, total));
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demographics::{AttributeValue, DemographicPool, DemographicSample};
    use crate::error::CompletionError;
    use crate::generation::params::{BankingParameters, NetWorth};
    use crate::llm::CompletionRequest;
    use rand::Rng;
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};
    use std::time::Duration;

    /// Source whose sample for task `i` carries `task: i`
    struct IndexedSource;

    impl DemographicSource for IndexedSource {
        fn draw(&self) -> Option<DemographicSample> {
            self.draw_for(0)
        }

        fn draw_for(&self, index: usize) -> Option<DemographicSample> {
            Some(
                vec![("task".to_string(), AttributeValue::Number(index as f64))]
                    .into_iter()
                    .collect(),
            )
        }
    }

    /// Echoes the task index back as a persona, with configurable misbehaviour
    #[derive(Default)]
    struct StubService {
        delay: Duration,
        random_delay_ms: u64,
        fail_on: Vec<usize>,
        panic_on: Vec<usize>,
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        spans: Mutex<Vec<(Instant, Instant, ThreadId)>>,
    }

    impl CompletionService for StubService {
        fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            let started = Instant::now();
            self.calls.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            let index: usize = request
                .prompt
                .trim()
                .trim_start_matches("task: ")
                .parse()
                .expect("prompt carries the task index");

            let mut delay = self.delay;
            if self.random_delay_ms > 0 {
                delay += Duration::from_millis(rand::thread_rng().gen_range(0..self.random_delay_ms));
            }
            thread::sleep(delay);

            self.active.fetch_sub(1, Ordering::SeqCst);
            self.spans
                .lock()
                .unwrap()
                .push((started, Instant::now(), thread::current().id()));

            if self.panic_on.contains(&index) {
                panic!("stub exploded on {}", index);
            }
            if self.fail_on.contains(&index) {
                return Err(CompletionError::Service {
                    status: 500,
                    message: format!("rigged failure {}", index),
                });
            }
            Ok(format!("```json\n{{\"task\": {}}}\n```", index))
        }
    }

    fn dispatcher(service: Arc<StubService>, window: Duration) -> BatchDispatcher {
        BatchDispatcher::new(
            service,
            Arc::new(IndexedSource),
            PromptTemplate::new("system", "{statistical_data}"),
            DispatchConfig::default(),
        )
        .with_limiter(RateLimiter::with_window(5, window))
    }

    fn task_ids(outcome: &BatchOutcome) -> Vec<usize> {
        outcome
            .personas
            .iter()
            .map(|p| p.persona["task"].as_u64().unwrap() as usize)
            .collect()
    }

    #[test]
    fn test_zero_count_starts_nothing() {
        let service = Arc::new(StubService::default());
        let outcome = dispatcher(Arc::clone(&service), Duration::from_millis(10))
            .dispatch(0, &ParameterMode::default(), None)
            .unwrap();

        assert!(outcome.personas.is_empty());
        assert!(outcome.failures.is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_order_preserved_despite_random_completion() {
        let service = Arc::new(StubService {
            random_delay_ms: 40,
            ..Default::default()
        });
        let progress_seen = Mutex::new(Vec::new());
        let progress: &ProgressFn<'_> = &|done, total, _| {
            progress_seen.lock().unwrap().push((done, total));
        };

        let outcome = dispatcher(Arc::clone(&service), Duration::from_millis(20))
            .dispatch(12, &ParameterMode::default(), Some(progress))
            .unwrap();

        assert_eq!(task_ids(&outcome), (0..12).collect::<Vec<_>>());
        assert!(outcome.personas.iter().enumerate().all(|(i, p)| p.index == i));
        assert!(outcome.failures.is_empty());

        let mut seen = progress_seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, (1..=12).map(|d| (d, 12)).collect::<Vec<_>>());
    }

    #[test]
    fn test_failing_task_is_isolated() {
        let service = Arc::new(StubService {
            random_delay_ms: 10,
            fail_on: vec![3],
            ..Default::default()
        });
        let outcome = dispatcher(service, Duration::from_millis(20))
            .dispatch(6, &ParameterMode::default(), None)
            .unwrap();

        assert_eq!(task_ids(&outcome), vec![0, 1, 2, 4, 5]);
        assert_eq!(outcome.failed_indices(), vec![3]);
        assert!(outcome.errors()[0].starts_with("Error generating persona 4:"));
        assert!(outcome.errors()[0].contains("rigged failure 3"));
    }

    #[test]
    fn test_all_tasks_failing_is_not_a_dispatch_error() {
        let service = Arc::new(StubService {
            fail_on: (0..5).collect(),
            ..Default::default()
        });
        let outcome = dispatcher(service, Duration::from_millis(20))
            .dispatch(5, &ParameterMode::default(), None)
            .unwrap();

        assert!(outcome.personas.is_empty());
        assert_eq!(outcome.failed_indices(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_panicking_task_becomes_failure() {
        let service = Arc::new(StubService {
            panic_on: vec![1],
            ..Default::default()
        });
        let outcome = dispatcher(service, Duration::from_millis(20))
            .dispatch(6, &ParameterMode::default(), None)
            .unwrap();

        assert_eq!(outcome.personas.len(), 5);
        assert_eq!(outcome.failed_indices(), vec![1]);
        assert!(outcome.errors()[0].contains("stub exploded on 1"));
    }

    #[test]
    fn test_end_to_end_seven_personas() {
        let service = Arc::new(StubService {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let dispatcher = BatchDispatcher::new(
            Arc::clone(&service) as Arc<dyn CompletionService>,
            Arc::new(IndexedSource),
            PromptTemplate::new("system", "{statistical_data}"),
            DispatchConfig::default(),
        );
        assert_eq!(dispatcher.pool_size(), 5);

        let start = Instant::now();
        let outcome = dispatcher.dispatch(7, &ParameterMode::default(), None).unwrap();

        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(task_ids(&outcome), (0..7).collect::<Vec<_>>());
        assert!(outcome.failures.is_empty());
        assert!(service.max_active.load(Ordering::SeqCst) <= 5);
    }

    #[test]
    fn test_pool_bounds_concurrency() {
        let service = Arc::new(StubService {
            delay: Duration::from_millis(30),
            ..Default::default()
        });
        let outcome = dispatcher(Arc::clone(&service), Duration::from_millis(1))
            .dispatch(20, &ParameterMode::default(), None)
            .unwrap();

        assert_eq!(outcome.personas.len(), 20);
        let max_active = service.max_active.load(Ordering::SeqCst);
        assert!(max_active <= 5, "max concurrent calls {}", max_active);
        assert!(max_active >= 2, "expected overlapping calls, got {}", max_active);
    }

    #[test]
    fn test_small_batch_runs_sequentially_on_caller() {
        let service = Arc::new(StubService {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let outcome = dispatcher(Arc::clone(&service), Duration::from_millis(10))
            .dispatch(3, &ParameterMode::default(), None)
            .unwrap();
        assert_eq!(task_ids(&outcome), vec![0, 1, 2]);

        let spans = service.spans.lock().unwrap().clone();
        assert_eq!(spans.len(), 3);
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "calls overlapped");
        }
        let caller = thread::current().id();
        assert!(spans.iter().all(|(_, _, id)| *id == caller));
    }

    #[test]
    fn test_cancelled_batch_skips_tasks() {
        let service = Arc::new(StubService::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = dispatcher(Arc::clone(&service), Duration::from_millis(10))
            .dispatch_cancellable(6, &ParameterMode::default(), None, &cancel)
            .unwrap();

        assert!(outcome.personas.is_empty());
        assert_eq!(outcome.failures.len(), 6);
        assert!(outcome.errors()[0].contains("cancelled"));
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_source_fails_each_task() {
        let dispatcher = BatchDispatcher::new(
            Arc::new(StubService::default()),
            Arc::new(DemographicPool::default()),
            PromptTemplate::default(),
            DispatchConfig::default(),
        );
        let outcome = dispatcher.dispatch(2, &ParameterMode::default(), None).unwrap();

        assert!(outcome.personas.is_empty());
        assert_eq!(
            outcome.errors()[1],
            "Error generating persona 2: No demographic sample matches the active filters"
        );
    }

    #[test]
    fn test_fixed_parameters_recorded_on_each_persona() {
        let params = BankingParameters {
            net_worth: NetWorth::Over100k,
            ..Default::default()
        };
        let outcome = dispatcher(Arc::new(StubService::default()), Duration::from_millis(10))
            .dispatch(4, &ParameterMode::Fixed(params), None)
            .unwrap();

        assert_eq!(outcome.personas.len(), 4);
        assert!(outcome.personas.iter().all(|p| p.parameters_used == params));
        assert!(outcome.personas.iter().all(|p| p.source_data.number("task").is_some()));
    }
}
