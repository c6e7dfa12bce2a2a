//! Chaos scheduler background task.
//!
//! A `Workload` owns the immutable targeting configuration, a shared handle
//! to the cluster collaborator and its own random generator. `start` moves it
//! into a background task that runs one list → filter → select → terminate
//! pass per interval and reports per-tick failures on a bounded outcome
//! stream without ever stopping the loop.
//!
//! # Ordering
//!
//! Ticks never overlap: the next timer wait begins only after the current
//! tick, including its cluster calls, has completed. Missed ticks are
//! delayed rather than burst.
//!
//! # Graceful Shutdown
//!
//! Cancellation is cooperative and observed between ticks. A tick already in
//! progress runs to completion; afterwards the loop exits, the state becomes
//! `Stopped` and the outcome stream closes.
//!
//! # Outcome Stream
//!
//! Failures are delivered with `try_send` on a bounded channel. When the
//! channel is full the newest failure is dropped (logged and counted), so a
//! slow consumer can never stall the scheduler.

use crate::errors::{ChaosError, ClusterError};
use crate::models::{ChaosFailure, SchedulerState, SelectConfig, TickOutcome};
use crate::observability::metrics;
use crate::services::pod_client::PodClientTrait;
use crate::services::pod_selection::{pick_candidate, select_candidates};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Default capacity of the outcome stream.
pub const DEFAULT_OUTCOME_BUFFER: usize = 16;

/// Default deadline for a single cluster API call.
pub const DEFAULT_API_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse a Go-style duration string (`1ms`, `10s`, `1h30m`) into a strictly
/// positive interval.
///
/// # Errors
///
/// - `ChaosError::Configuration` - unparseable or zero duration
pub fn parse_interval(spec: &str) -> Result<Duration, ChaosError> {
    let trimmed = spec.trim();
    let interval = humantime::parse_duration(trimmed).map_err(|e| {
        ChaosError::Configuration(format!("invalid schedule '{spec}': {e}"))
    })?;

    if interval.is_zero() {
        return Err(ChaosError::Configuration(format!(
            "schedule must be a positive duration, got '{spec}'"
        )));
    }

    Ok(interval)
}

/// A single-use chaos workload targeting one namespace.
pub struct Workload {
    namespace: String,
    interval: Duration,
    self_pod_name: String,
    select_config: SelectConfig,
    client: Arc<dyn PodClientTrait>,
    rng: StdRng,
    outcome_buffer: usize,
    call_timeout: Duration,
    ticks: u64,
}

impl fmt::Debug for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workload")
            .field("namespace", &self.namespace)
            .field("interval", &self.interval)
            .field("self_pod_name", &self.self_pod_name)
            .field("select_config", &self.select_config)
            .field("outcome_buffer", &self.outcome_buffer)
            .field("call_timeout", &self.call_timeout)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl Workload {
    /// Create a workload. No I/O happens here.
    ///
    /// # Arguments
    ///
    /// * `namespace` - Namespace to list and delete pods in
    /// * `interval_spec` - Tick interval as a duration string (e.g. "10s")
    /// * `self_pod_name` - Pod this process runs in; empty disables self-exclusion
    /// * `select_config` - Label selector; empty selects all pods
    /// * `client` - Shared cluster collaborator
    ///
    /// # Errors
    ///
    /// - `ChaosError::Configuration` - `interval_spec` is not a positive duration
    pub fn create(
        namespace: impl Into<String>,
        interval_spec: &str,
        self_pod_name: impl Into<String>,
        select_config: SelectConfig,
        client: Arc<dyn PodClientTrait>,
    ) -> Result<Self, ChaosError> {
        let interval = parse_interval(interval_spec)?;

        Ok(Self {
            namespace: namespace.into(),
            interval,
            self_pod_name: self_pod_name.into(),
            select_config,
            client,
            rng: StdRng::from_entropy(),
            outcome_buffer: DEFAULT_OUTCOME_BUFFER,
            call_timeout: DEFAULT_API_CALL_TIMEOUT,
            ticks: 0,
        })
    }

    /// Replace the generator, e.g. with a seeded one for reproducible picks.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Capacity of the outcome stream (at least 1).
    #[must_use]
    pub fn with_outcome_buffer(mut self, capacity: usize) -> Self {
        self.outcome_buffer = capacity.max(1);
        self
    }

    /// Deadline applied to each list and delete call.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn self_pod_name(&self) -> &str {
        &self.self_pod_name
    }

    pub fn select_config(&self) -> &SelectConfig {
        &self.select_config
    }

    /// An unstarted workload is always idle; `start` consumes it.
    pub fn state(&self) -> SchedulerState {
        SchedulerState::Idle
    }

    /// Run one list → filter → select → terminate pass.
    ///
    /// Never retries within the pass; any failure ends it.
    pub async fn run_tick(&mut self) -> TickOutcome {
        self.ticks += 1;

        debug!(
            target: "chaos.task.scheduler",
            tick = self.ticks,
            namespace = %self.namespace,
            "Getting pod list"
        );

        let outcome = match self.terminate_random_pod().await {
            Ok(pod) => TickOutcome::Terminated { pod },
            Err(e) => TickOutcome::Failed(e),
        };

        metrics::record_tick(outcome.label());
        outcome
    }

    async fn terminate_random_pod(&mut self) -> Result<String, ChaosError> {
        let pods = call_with_deadline(
            "list",
            self.call_timeout,
            self.client
                .list_pods(&self.namespace, &self.select_config.labels),
        )
        .await
        .map_err(|source| ChaosError::List {
            namespace: self.namespace.clone(),
            source,
        })?;

        let candidates = match select_candidates(&pods, &self.self_pod_name) {
            Ok(candidates) => candidates,
            Err(e) => {
                metrics::set_candidates(0);
                return Err(e);
            }
        };
        metrics::set_candidates(candidates.len());

        let victim = pick_candidate(&candidates, &mut self.rng)
            .map(|pod| pod.name.clone())
            .ok_or(ChaosError::NoCandidates { listed: pods.len() })?;

        info!(
            target: "chaos.task.scheduler",
            tick = self.ticks,
            namespace = %self.namespace,
            pod = %victim,
            candidate_count = candidates.len(),
            "Deleting pod"
        );

        call_with_deadline(
            "delete",
            self.call_timeout,
            self.client.delete_pod(&self.namespace, &victim),
        )
        .await
        .map_err(|source| ChaosError::Delete {
            namespace: self.namespace.clone(),
            pod: victim.clone(),
            source,
        })?;

        metrics::record_pod_terminated();
        Ok(victim)
    }

    /// Move the workload into a background task and return immediately.
    ///
    /// The first tick fires one full interval after this call. Must be called
    /// from within a Tokio runtime.
    pub fn start(self, cancel_token: CancellationToken) -> ChaosHandle {
        let (failure_tx, failure_rx) = mpsc::channel(self.outcome_buffer);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Running);

        let span = tracing::info_span!(
            "chaos.task.scheduler",
            namespace = %self.namespace
        );
        let join = tokio::spawn(
            self.run(cancel_token, failure_tx, state_tx)
                .instrument(span),
        );

        ChaosHandle {
            failures: Some(failure_rx),
            state: state_rx,
            join,
        }
    }

    async fn run(
        mut self,
        cancel_token: CancellationToken,
        failures: mpsc::Sender<ChaosFailure>,
        state: watch::Sender<SchedulerState>,
    ) {
        info!(
            target: "chaos.task.scheduler",
            namespace = %self.namespace,
            interval_ms = self.interval.as_millis() as u64,
            label_selector = %self.select_config.labels,
            self_pod_name = %self.self_pod_name,
            "Starting chaos scheduler"
        );

        let mut interval = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    info!(
                        target: "chaos.task.scheduler",
                        "Chaos scheduler received shutdown signal, exiting"
                    );
                    break;
                }
                _ = interval.tick() => {
                    if let TickOutcome::Failed(error) = self.run_tick().await {
                        report_failure(&failures, ChaosFailure { tick: self.ticks, error });
                    }
                }
            }
        }

        state.send_replace(SchedulerState::Stopped);
        drop(failures);

        info!(
            target: "chaos.task.scheduler",
            ticks = self.ticks,
            "Chaos scheduler stopped"
        );
    }
}

/// Await a cluster call under a deadline, recording its latency.
async fn call_with_deadline<T, F>(
    operation: &'static str,
    deadline: Duration,
    call: F,
) -> Result<T, ClusterError>
where
    F: Future<Output = Result<T, ClusterError>>,
{
    let started = Instant::now();
    let (status, result) = match tokio::time::timeout(deadline, call).await {
        Ok(Ok(value)) => ("success", Ok(value)),
        Ok(Err(e)) => ("error", Err(e)),
        Err(_) => ("timeout", Err(ClusterError::Timeout(deadline))),
    };
    metrics::record_api_call(operation, status, started.elapsed());
    result
}

/// Queue a failure without blocking; drop it if the stream is full.
fn report_failure(failures: &mpsc::Sender<ChaosFailure>, failure: ChaosFailure) {
    warn!(
        target: "chaos.task.scheduler",
        tick = failure.tick,
        error_kind = failure.kind(),
        error = %failure.error,
        "Chaos tick failed"
    );

    match failures.try_send(failure) {
        Ok(()) => {}
        Err(TrySendError::Full(dropped)) => {
            metrics::record_outcome_dropped();
            warn!(
                target: "chaos.task.scheduler",
                tick = dropped.tick,
                error_kind = dropped.kind(),
                "Outcome stream full, dropping failure"
            );
        }
        Err(TrySendError::Closed(_)) => {
            debug!(
                target: "chaos.task.scheduler",
                "Outcome stream receiver gone, failure not delivered"
            );
        }
    }
}

/// Handle to a running workload.
#[derive(Debug)]
pub struct ChaosHandle {
    failures: Option<mpsc::Receiver<ChaosFailure>>,
    state: watch::Receiver<SchedulerState>,
    join: JoinHandle<()>,
}

impl ChaosHandle {
    /// Current lifecycle state: `Running` until the loop exits, then `Stopped`.
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Receive the next failure; `None` once the stream is closed (or taken).
    pub async fn next_failure(&mut self) -> Option<ChaosFailure> {
        match self.failures.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Take ownership of the outcome stream, e.g. to drain it in another task.
    pub fn take_failures(&mut self) -> Option<mpsc::Receiver<ChaosFailure>> {
        self.failures.take()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the background task to exit. Cancel the token first.
    pub async fn join(self) -> Result<(), JoinError> {
        self.join.await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{PodCondition, PodSummary};
    use crate::services::pod_client::mock::MockPodClient;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

    fn ready(name: &str) -> PodSummary {
        PodSummary::new(name, "namespace1").with_condition(PodCondition::ready(true))
    }

    fn unready(name: &str) -> PodSummary {
        PodSummary::new(name, "namespace1").with_condition(PodCondition::ready(false))
    }

    fn workload(mock: &Arc<MockPodClient>, interval: &str, self_pod: &str) -> Workload {
        Workload::create(
            "namespace1",
            interval,
            self_pod,
            SelectConfig::default(),
            Arc::clone(mock) as Arc<dyn PodClientTrait>,
        )
        .unwrap()
        .with_rng(StdRng::seed_from_u64(11))
    }

    #[test]
    fn test_parse_interval_valid() {
        assert_eq!(parse_interval("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_interval("1ms").unwrap(), Duration::from_millis(1));
        assert_eq!(parse_interval("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_interval(" 2m ").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn test_parse_interval_invalid() {
        for spec in ["", "abc", "10", "0s", "-1s", "ten seconds"] {
            let result = parse_interval(spec);
            assert!(
                matches!(result, Err(ChaosError::Configuration(_))),
                "'{}' should be rejected, got {:?}",
                spec,
                result
            );
        }
    }

    #[test]
    fn test_create_rejects_bad_schedule() {
        let mock = Arc::new(MockPodClient::with_pods(vec![]));
        let result = Workload::create(
            "namespace1",
            "soon",
            "",
            SelectConfig::default(),
            mock as Arc<dyn PodClientTrait>,
        );
        assert!(matches!(result, Err(ChaosError::Configuration(msg)) if msg.contains("soon")));
    }

    #[test]
    fn test_create_keeps_configuration() {
        let mock = Arc::new(MockPodClient::with_pods(vec![]));
        let wl = Workload::create(
            "namespace1",
            "1s",
            "self-pod",
            SelectConfig::new("app=web"),
            mock as Arc<dyn PodClientTrait>,
        )
        .unwrap();

        assert_eq!(wl.namespace(), "namespace1");
        assert_eq!(wl.interval(), Duration::from_secs(1));
        assert_eq!(wl.self_pod_name(), "self-pod");
        assert_eq!(wl.select_config().labels, "app=web");
        assert_eq!(wl.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_create_performs_no_io() {
        let mock = Arc::new(MockPodClient::with_pods(vec![ready("pod1")]));
        let _wl = workload(&mock, "1s", "");
        assert_eq!(mock.list_calls(), 0);
        assert!(mock.deleted().is_empty());
    }

    #[test]
    fn test_outcome_buffer_is_at_least_one() {
        let mock = Arc::new(MockPodClient::with_pods(vec![]));
        let wl = workload(&mock, "1s", "").with_outcome_buffer(0);
        assert_eq!(wl.outcome_buffer, 1);
    }

    #[tokio::test]
    async fn test_run_tick_terminates_ready_pod() {
        let mock = Arc::new(MockPodClient::with_pods(vec![
            unready("pod1"),
            ready("pod2"),
            ready("self-pod"),
        ]));
        let mut wl = workload(&mock, "1s", "self-pod");

        let outcome = wl.run_tick().await;

        assert_eq!(
            outcome,
            TickOutcome::Terminated {
                pod: "pod2".to_string()
            }
        );
        assert_eq!(mock.deleted(), vec!["pod2".to_string()]);
    }

    #[tokio::test]
    async fn test_run_tick_list_failure() {
        let mock = Arc::new(MockPodClient::with_pods(vec![ready("pod1")]).failing_lists(1));
        let mut wl = workload(&mock, "1s", "");

        let outcome = wl.run_tick().await;

        assert!(matches!(
            outcome,
            TickOutcome::Failed(ChaosError::List { ref namespace, .. }) if namespace == "namespace1"
        ));
        assert!(mock.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_run_tick_no_candidates() {
        let mock = Arc::new(MockPodClient::with_pods(vec![ready("self-pod"), unready("pod1")]));
        let mut wl = workload(&mock, "1s", "self-pod");

        let outcome = wl.run_tick().await;

        assert_eq!(
            outcome,
            TickOutcome::Failed(ChaosError::NoCandidates { listed: 2 })
        );
        assert!(mock.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_run_tick_delete_failure_is_not_retried() {
        let mock = Arc::new(MockPodClient::with_pods(vec![ready("pod1")]).failing_deletes(1));
        let mut wl = workload(&mock, "1s", "");

        let outcome = wl.run_tick().await;

        assert!(matches!(
            outcome,
            TickOutcome::Failed(ChaosError::Delete { ref pod, .. }) if pod == "pod1"
        ));
        assert!(mock.deleted().is_empty());
        assert_eq!(mock.list_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_tick_list_deadline() {
        let mock = Arc::new(
            MockPodClient::with_pods(vec![ready("pod1")]).with_list_delay(Duration::from_secs(60)),
        );
        let mut wl = workload(&mock, "1s", "").with_call_timeout(Duration::from_secs(5));

        let outcome = wl.run_tick().await;

        assert!(matches!(
            outcome,
            TickOutcome::Failed(ChaosError::List {
                source: ClusterError::Timeout(d),
                ..
            }) if d == Duration::from_secs(5)
        ));
    }

    #[tokio::test]
    async fn test_candidates_gauge_resets_when_none_eligible() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        let mock = Arc::new(MockPodClient::with_pods(vec![ready("pod1"), ready("pod2")]));
        let mut wl = workload(&mock, "1s", "");

        assert!(matches!(wl.run_tick().await, TickOutcome::Terminated { .. }));
        assert_eq!(candidates_gauge(&snapshotter), Some(2.0));

        assert!(matches!(wl.run_tick().await, TickOutcome::Terminated { .. }));
        assert_eq!(candidates_gauge(&snapshotter), Some(1.0));

        assert_eq!(
            wl.run_tick().await,
            TickOutcome::Failed(ChaosError::NoCandidates { listed: 0 })
        );
        assert_eq!(candidates_gauge(&snapshotter), Some(0.0));
    }

    fn candidates_gauge(snapshotter: &Snapshotter) -> Option<f64> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find(|(key, _, _, _)| key.key().name() == "chaos_candidates")
            .and_then(|(_, _, _, value)| match value {
                DebugValue::Gauge(v) => Some(v.into_inner()),
                _ => None,
            })
    }

    #[tokio::test]
    async fn test_same_seed_same_victims() {
        let pods: Vec<PodSummary> = (0..8).map(|i| ready(&format!("pod{i}"))).collect();
        let first = Arc::new(MockPodClient::with_pods(pods.clone()));
        let second = Arc::new(MockPodClient::with_pods(pods));

        let mut a = workload(&first, "1s", "");
        let mut b = workload(&second, "1s", "");
        for _ in 0..5 {
            a.run_tick().await;
            b.run_tick().await;
        }

        assert_eq!(first.deleted().len(), 5);
        assert_eq!(first.deleted(), second.deleted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let mock = Arc::new(MockPodClient::with_pods(vec![ready("pod1"), ready("pod2")]));
        let token = CancellationToken::new();
        let handle = workload(&mock, "10s", "").start(token.clone());

        assert_eq!(handle.state(), SchedulerState::Running);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(mock.list_calls(), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(mock.list_calls(), 1);
        assert_eq!(mock.deleted().len(), 1);

        token.cancel();
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_stop_loop() {
        let mock = Arc::new(MockPodClient::with_pods(vec![ready("pod1"), ready("pod2")]).failing_lists(1));
        let token = CancellationToken::new();
        let mut handle = workload(&mock, "1s", "").start(token.clone());

        let failure = handle.next_failure().await.unwrap();
        assert_eq!(failure.tick, 1);
        assert_eq!(failure.kind(), "list");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(mock.list_calls(), 2);
        assert_eq!(mock.deleted().len(), 1);

        token.cancel();
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_loop_and_closes_stream() {
        let mock = Arc::new(MockPodClient::with_pods(vec![]));
        let token = CancellationToken::new();
        let mut handle = workload(&mock, "1s", "").start(token.clone());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        token.cancel();

        let mut failures = handle.take_failures().unwrap();
        let mut ticks = Vec::new();
        while let Some(failure) = failures.recv().await {
            ticks.push(failure.tick);
        }
        assert_eq!(ticks, vec![1, 2]);

        let calls_at_cancel = mock.list_calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(mock.list_calls(), calls_at_cancel);

        assert!(handle.is_finished());
        assert_eq!(handle.state(), SchedulerState::Stopped);
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_progress_tick_completes_after_cancel() {
        let mock = Arc::new(
            MockPodClient::with_pods(vec![ready("pod1")]).with_list_delay(Duration::from_secs(5)),
        );
        let token = CancellationToken::new();
        let handle = workload(&mock, "1s", "").start(token.clone());

        // Tick 1 starts at 1s and sits in the list call until 6s.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(mock.list_calls(), 1);
        token.cancel();

        handle.join().await.unwrap();
        assert_eq!(mock.list_calls(), 1);
        assert_eq!(mock.deleted(), vec!["pod1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_stream_drops_newest() {
        let mock = Arc::new(MockPodClient::with_pods(vec![]));
        let token = CancellationToken::new();
        let mut handle = workload(&mock, "1s", "")
            .with_outcome_buffer(1)
            .start(token.clone());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(mock.list_calls(), 3);
        token.cancel();

        let first = handle.next_failure().await.unwrap();
        assert_eq!(first.tick, 1);
        assert!(handle.next_failure().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_receiver_does_not_stop_loop() {
        let mock = Arc::new(MockPodClient::with_pods(vec![]));
        let token = CancellationToken::new();
        let mut handle = workload(&mock, "1s", "").start(token.clone());
        drop(handle.take_failures());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(mock.list_calls(), 3);
        assert!(!handle.is_finished());

        token.cancel();
        handle.join().await.unwrap();
    }
}
