//! Parallel test execution
//!
//! A bounded pool of tokio tasks, one per in-flight case. The scheduler
//! fills the pool, then waits on a completion queue before launching more.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::sink::ResultSink;
use crate::error::EngineError;
use crate::models::{RunSummary, TestCase, TestResult, TestSuite};

/// Something that can run a single test case
#[async_trait]
pub trait CaseRunner: Send + Sync {
    async fn run_case(&self, suite: &TestSuite, case: &TestCase) -> TestResult;
}

struct Completion {
    failed: bool,
}

/// Parallel test executor
pub struct ParallelExecutor {
    runner: Arc<dyn CaseRunner>,
    concurrency: usize,
    fail_fast: bool,
}

impl ParallelExecutor {
    pub fn new(runner: Arc<dyn CaseRunner>, concurrency: usize) -> Self {
        Self {
            runner,
            concurrency: concurrency.max(1),
            fail_fast: false,
        }
    }

    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Run every case, stopping early on Ctrl-C
    pub async fn run(
        &self,
        suites: Arc<Vec<TestSuite>>,
        sink: Arc<ResultSink>,
    ) -> Result<RunSummary, EngineError> {
        self.run_until(suites, sink, tokio::signal::ctrl_c()).await
    }

    /// Run every case, stopping early when `interrupt` resolves
    pub async fn run_until<F>(
        &self,
        suites: Arc<Vec<TestSuite>>,
        sink: Arc<ResultSink>,
        interrupt: F,
    ) -> Result<RunSummary, EngineError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let mut queue: VecDeque<(usize, usize)> = suites
            .iter()
            .enumerate()
            .flat_map(|(s, suite)| (0..suite.cases.len()).map(move |c| (s, c)))
            .collect();

        info!(
            "Running {} tests from {} suites (concurrency {})",
            queue.len(),
            suites.len(),
            self.concurrency
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        let mut in_flight = 0usize;
        let mut stopping = false;
        let mut interrupt_armed = true;
        tokio::pin!(interrupt);

        loop {
            while in_flight < self.concurrency && !stopping {
                let Some((s, c)) = queue.pop_front() else {
                    break;
                };
                handles.push(self.spawn_case(s, c, suites.clone(), sink.clone(), tx.clone()));
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }

            tokio::select! {
                completion = rx.recv() => {
                    let Some(completion) = completion else {
                        break;
                    };
                    in_flight -= 1;
                    if completion.failed && self.fail_fast && !stopping {
                        info!(
                            "Fail-fast: not launching {} remaining tests",
                            queue.len()
                        );
                        stopping = true;
                    }
                }
                signal = &mut interrupt, if interrupt_armed => {
                    match signal {
                        Ok(()) => {
                            warn!("Interrupted, aborting {} running tests", in_flight);
                            sink.close();
                            for handle in &handles {
                                handle.abort();
                            }
                            // Dropping the aborted tasks kills each simulator process group
                            join_all(handles).await;
                            return Err(EngineError::Interrupted);
                        }
                        Err(e) => {
                            warn!("Cannot listen for interrupts: {}", e);
                            interrupt_armed = false;
                        }
                    }
                }
            }
        }

        Ok(sink.finish(false).await)
    }

    fn spawn_case(
        &self,
        suite_idx: usize,
        case_idx: usize,
        suites: Arc<Vec<TestSuite>>,
        sink: Arc<ResultSink>,
        done: mpsc::UnboundedSender<Completion>,
    ) -> JoinHandle<()> {
        let runner = self.runner.clone();
        tokio::spawn(async move {
            let suite = &suites[suite_idx];
            let case = &suite.cases[case_idx];
            debug!("Starting {}.{}", suite.name, case.name);

            sink.suite_started(suite_idx).await;
            let result = runner.run_case(suite, case).await;
            let failed = result.status.is_failure();
            sink.forward(suite_idx, case_idx, result).await;

            let _ = done.send(Completion { failed });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestStatus;
    use crate::output::{OutputFormat, ResultFormatter};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails cases whose name starts with `fail`, tracking peak concurrency
    #[derive(Default)]
    struct MockRunner {
        delay_ms: u64,
        running: AtomicUsize,
        peak: AtomicUsize,
        started: AtomicUsize,
    }

    impl MockRunner {
        fn with_delay(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CaseRunner for MockRunner {
        async fn run_case(&self, suite: &TestSuite, case: &TestCase) -> TestResult {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

            self.running.fetch_sub(1, Ordering::SeqCst);
            if case.name.starts_with("fail") {
                TestResult::fail(suite, case, self.delay_ms, "mismatch")
            } else {
                TestResult::pass(suite, case, self.delay_ms)
            }
        }
    }

    fn suite(name: &str, cases: &[&str]) -> TestSuite {
        TestSuite {
            name: name.to_string(),
            class_name: None,
            requires_elements: Vec::new(),
            defaults: Default::default(),
            cases: cases.iter().map(|c| TestCase::new(*c, "m.py")).collect(),
            path: PathBuf::from(format!("testsuite_default_{name}.yaml")),
            test_type: "default".to_string(),
        }
    }

    fn sink(suites: &[TestSuite]) -> Arc<ResultSink> {
        Arc::new(ResultSink::new(
            suites,
            ResultFormatter::new(OutputFormat::Json),
            false,
        ))
    }

    fn statuses(summary: &RunSummary) -> Vec<(String, TestStatus)> {
        summary
            .suites
            .iter()
            .flat_map(|s| s.results.iter())
            .map(|r| (r.qualified_name(), r.status))
            .collect()
    }

    fn many_suites() -> Arc<Vec<TestSuite>> {
        Arc::new(vec![
            suite("alpha", &["a1", "fail_a2", "a3", "a4"]),
            suite("beta", &["b1", "b2", "b3"]),
            suite("gamma", &["g1", "fail_g2", "g3"]),
        ])
    }

    #[tokio::test]
    async fn test_concurrency_limit_respected() {
        let suites = many_suites();
        let runner = Arc::new(MockRunner::with_delay(30));
        let executor = ParallelExecutor::new(runner.clone(), 3);

        let summary = executor.run(suites.clone(), sink(&suites)).await.unwrap();

        assert_eq!(summary.total, 10);
        assert_eq!(summary.failed, 2);
        assert_eq!(runner.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sequential_matches_parallel() {
        let suites = many_suites();

        let sequential = ParallelExecutor::new(Arc::new(MockRunner::with_delay(5)), 1)
            .run(suites.clone(), sink(&suites))
            .await
            .unwrap();
        let parallel = ParallelExecutor::new(Arc::new(MockRunner::with_delay(5)), 8)
            .run(suites.clone(), sink(&suites))
            .await
            .unwrap();

        assert_eq!(statuses(&sequential), statuses(&parallel));
        assert_eq!(statuses(&sequential)[0].0, "alpha.a1");
    }

    #[tokio::test]
    async fn test_single_worker_is_sequential() {
        let suites = many_suites();
        let runner = Arc::new(MockRunner::with_delay(5));

        ParallelExecutor::new(runner.clone(), 1)
            .run(suites.clone(), sink(&suites))
            .await
            .unwrap();

        assert_eq!(runner.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_launching() {
        let suites = many_suites();
        let runner = Arc::new(MockRunner::with_delay(5));

        let summary = ParallelExecutor::new(runner.clone(), 1)
            .fail_fast(true)
            .run(suites.clone(), sink(&suites))
            .await
            .unwrap();

        assert_eq!(runner.started.load(Ordering::SeqCst), 2);
        assert_eq!(summary.total, 2);
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn test_interrupt_aborts_run() {
        let suites = many_suites();
        let sink = sink(&suites);
        let runner = Arc::new(MockRunner::with_delay(10_000));

        let interrupt = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<(), std::io::Error>(())
        };
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            ParallelExecutor::new(runner, 2).run_until(suites.clone(), sink.clone(), interrupt),
        )
        .await
        .expect("interrupt should end the run promptly");

        assert!(matches!(result, Err(EngineError::Interrupted)));
        assert!(sink.is_closed());
        assert_eq!(sink.finish(true).await.total, 0);
    }

    #[tokio::test]
    async fn test_interrupt_listener_failure_is_ignored() {
        let suites = Arc::new(vec![suite("solo", &["s1", "s2"])]);
        let interrupt = async { Err::<(), _>(std::io::Error::other("no signal handler")) };

        let summary = ParallelExecutor::new(Arc::new(MockRunner::with_delay(20)), 1)
            .run_until(suites.clone(), sink(&suites), interrupt)
            .await
            .unwrap();

        assert_eq!(summary.passed, 2);
    }
}
