use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;
use crate::types::{JobSnapshot, JobStatus, PollOutcome};

/// Configuration for the status poll loop.
///
/// Use [`PollConfig::builder()`] for ergonomic construction, or
/// [`PollConfig::default()`] for the service defaults (2 s interval, no
/// overall timeout, unlimited tolerance of transient failures).
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between status queries while the job is non-terminal.
    pub interval: Duration,

    /// Overall deadline for the watch. `None` = wait indefinitely.
    pub timeout: Option<Duration>,

    /// Consecutive transient-failure ceiling before the loop gives up
    /// (0 = unlimited; the loop keeps polling through outages).
    pub max_consecutive_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            timeout: None,
            max_consecutive_failures: 0,
        }
    }
}

impl PollConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> PollConfigBuilder {
        PollConfigBuilder::default()
    }
}

/// Builder for [`PollConfig`].
#[derive(Default)]
pub struct PollConfigBuilder {
    config: PollConfig,
}

impl PollConfigBuilder {
    /// Set the delay between status queries.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set an overall deadline for the watch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the consecutive transient-failure ceiling (0 = unlimited).
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.config.max_consecutive_failures = max;
        self
    }

    /// Build the final [`PollConfig`].
    pub fn build(self) -> PollConfig {
        self.config
    }
}

/// Ordering gate for applying job snapshots to displayed state.
///
/// Responses are applied last-observed-wins by issuance order, with one
/// override: once a terminal snapshot has been applied, a non-terminal
/// snapshot can never replace it, no matter when it arrives. A terminal
/// snapshot beats any non-terminal one even if it was issued earlier.
#[derive(Debug, Default)]
pub struct JobTracker {
    latest: Option<JobSnapshot>,
    latest_seq: u64,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot currently considered authoritative.
    pub fn latest(&self) -> Option<&JobSnapshot> {
        self.latest.as_ref()
    }

    /// Offer a snapshot observed from the request issued as `seq`.
    /// Returns true when the snapshot became the authoritative state.
    pub fn apply(&mut self, seq: u64, snapshot: JobSnapshot) -> bool {
        if let Some(current) = &self.latest {
            let stale = seq < self.latest_seq;
            if current.status.is_terminal() {
                // Terminal state only advances to a newer terminal snapshot.
                if stale || !snapshot.status.is_terminal() {
                    return false;
                }
            } else if stale && !snapshot.status.is_terminal() {
                return false;
            }
        }
        self.latest_seq = self.latest_seq.max(seq);
        self.latest = Some(snapshot);
        true
    }
}

/// Poll a job's status until it reaches a terminal state, is cancelled,
/// or times out.
///
/// This is the restartable, cancellable core of the job lifecycle:
/// parameterized by a snapshot fetcher so the loop itself owns no network
/// concerns. [`crate::CollageClient::watch_job`] supplies the real fetcher.
///
/// Contract:
/// - `cancel` is checked before each fetch and again before each
///   state-applying step; nothing mutates after it is set.
/// - Each applied snapshot passes through a [`JobTracker`], so a stale
///   response can never roll back an observed terminal state.
/// - The loop returns the instant a terminal state is observed; no
///   further fetches are issued for that job.
/// - A transient fetch error is logged and polling continues on the next
///   tick, unless `max_consecutive_failures` is configured and reached.
pub async fn poll_job<F, Fut, U>(
    mut fetch: F,
    config: &PollConfig,
    cancel: &Arc<AtomicBool>,
    mut on_update: U,
) -> Result<PollOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobSnapshot>>,
    U: FnMut(&JobSnapshot),
{
    let start = Instant::now();
    let mut tracker = JobTracker::new();
    let mut seq: u64 = 0;
    let mut failures: u32 = 0;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(PollOutcome::Cancelled);
        }
        if let Some(timeout) = config.timeout {
            if start.elapsed() > timeout {
                return Ok(PollOutcome::TimedOut);
            }
        }

        seq += 1;
        match fetch().await {
            Ok(snapshot) => {
                failures = 0;
                // The request may have been cancelled while in flight;
                // its result must then be discarded.
                if cancel.load(Ordering::Relaxed) {
                    return Ok(PollOutcome::Cancelled);
                }
                if tracker.apply(seq, snapshot) {
                    let latest = tracker.latest().unwrap();
                    on_update(latest);
                    match latest.status {
                        JobStatus::Completed => {
                            return Ok(PollOutcome::Completed {
                                snapshot: latest.clone(),
                            });
                        }
                        JobStatus::Failed => {
                            return Ok(PollOutcome::Failed {
                                snapshot: latest.clone(),
                            });
                        }
                        _ => {}
                    }
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("[collage-client] status poll failed: {}", e);
                if config.max_consecutive_failures > 0
                    && failures >= config.max_consecutive_failures
                {
                    return Err(e);
                }
            }
        }

        tokio::time::sleep(config.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn snap(status: JobStatus, progress: u8) -> JobSnapshot {
        JobSnapshot {
            id: "job-1".to_string(),
            status,
            progress,
            created_at: None,
            completed_at: None,
            error_message: None,
            output_file: if status == JobStatus::Completed {
                Some("out.jpg".to_string())
            } else {
                None
            },
        }
    }

    // --- JobTracker ---

    #[test]
    fn test_tracker_applies_in_order() {
        let mut tracker = JobTracker::new();
        assert!(tracker.apply(1, snap(JobStatus::Pending, 0)));
        assert!(tracker.apply(2, snap(JobStatus::Processing, 40)));
        assert_eq!(tracker.latest().unwrap().progress, 40);
    }

    #[test]
    fn test_tracker_rejects_stale_nonterminal() {
        let mut tracker = JobTracker::new();
        assert!(tracker.apply(3, snap(JobStatus::Processing, 60)));
        assert!(!tracker.apply(2, snap(JobStatus::Processing, 30)));
        assert_eq!(tracker.latest().unwrap().progress, 60);
    }

    #[test]
    fn test_tracker_never_regresses_from_terminal() {
        let mut tracker = JobTracker::new();
        assert!(tracker.apply(5, snap(JobStatus::Completed, 100)));
        // Late in-flight responses, both older and newer issuance
        assert!(!tracker.apply(4, snap(JobStatus::Processing, 80)));
        assert!(!tracker.apply(6, snap(JobStatus::Pending, 0)));
        assert_eq!(tracker.latest().unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_tracker_terminal_beats_stale_issuance() {
        let mut tracker = JobTracker::new();
        assert!(tracker.apply(4, snap(JobStatus::Processing, 90)));
        // A terminal response from an earlier request still wins
        assert!(tracker.apply(3, snap(JobStatus::Failed, 90)));
        assert_eq!(tracker.latest().unwrap().status, JobStatus::Failed);
    }

    // --- poll_job ---

    fn scripted_fetch(
        script: Vec<Result<JobSnapshot>>,
    ) -> (
        impl FnMut() -> std::future::Ready<Result<JobSnapshot>>,
        Arc<AtomicUsize>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let script = Mutex::new(script.into_iter());
        let fetch = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let next = script
                .lock()
                .unwrap()
                .next()
                .expect("fetch called after script exhausted");
            std::future::ready(next)
        };
        (fetch, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_completed_then_stops() {
        let (fetch, calls) = scripted_fetch(vec![
            Ok(snap(JobStatus::Pending, 0)),
            Ok(snap(JobStatus::Processing, 40)),
            Ok(snap(JobStatus::Completed, 100)),
        ]);
        let cancel = Arc::new(AtomicBool::new(false));
        let mut seen = Vec::new();

        let outcome = poll_job(fetch, &PollConfig::default(), &cancel, |s| {
            seen.push((s.status, s.progress));
        })
        .await
        .unwrap();

        assert!(outcome.is_completed());
        // No further requests after the terminal status was observed
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            seen,
            vec![
                (JobStatus::Pending, 0),
                (JobStatus::Processing, 40),
                (JobStatus::Completed, 100)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_is_an_outcome_not_an_error() {
        let (fetch, _) = scripted_fetch(vec![
            Ok(snap(JobStatus::Processing, 10)),
            Ok(snap(JobStatus::Failed, 10)),
        ]);
        let cancel = Arc::new(AtomicBool::new(false));

        let outcome = poll_job(fetch, &PollConfig::default(), &cancel, |_| {})
            .await
            .unwrap();
        match outcome {
            PollOutcome::Failed { snapshot } => {
                assert_eq!(snapshot.status, JobStatus::Failed)
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_issues_no_fetch() {
        let (fetch, calls) = scripted_fetch(vec![]);
        let cancel = Arc::new(AtomicBool::new(true));

        let outcome = poll_job(fetch, &PollConfig::default(), &cancel, |_| {})
            .await
            .unwrap();
        assert!(matches!(outcome, PollOutcome::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_in_flight_discards_response() {
        // The fetcher flips the cancel flag while the request is in
        // flight; the returned snapshot must not reach the callback.
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let fetch = move || {
            flag.store(true, Ordering::Relaxed);
            std::future::ready(Ok(snap(JobStatus::Completed, 100)))
        };
        let mut updates = 0;

        let outcome = poll_job(fetch, &PollConfig::default(), &cancel, |_| {
            updates += 1;
        })
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::Cancelled));
        assert_eq!(updates, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_keeps_polling() {
        let (fetch, calls) = scripted_fetch(vec![
            Ok(snap(JobStatus::Processing, 20)),
            Err(crate::CollageError::Other("connection reset".into())),
            Ok(snap(JobStatus::Completed, 100)),
        ]);
        let cancel = Arc::new(AtomicBool::new(false));

        let outcome = poll_job(fetch, &PollConfig::default(), &cancel, |_| {})
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_ceiling_stops_the_loop() {
        let (fetch, calls) = scripted_fetch(vec![
            Err(crate::CollageError::Other("down".into())),
            Err(crate::CollageError::Other("down".into())),
        ]);
        let cancel = Arc::new(AtomicBool::new(false));
        let config = PollConfig::builder().with_max_consecutive_failures(2).build();

        let result = poll_job(fetch, &config, &cancel, |_| {}).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_counter() {
        let (fetch, _) = scripted_fetch(vec![
            Err(crate::CollageError::Other("blip".into())),
            Ok(snap(JobStatus::Processing, 50)),
            Err(crate::CollageError::Other("blip".into())),
            Ok(snap(JobStatus::Completed, 100)),
        ]);
        let cancel = Arc::new(AtomicBool::new(false));
        let config = PollConfig::builder().with_max_consecutive_failures(2).build();

        let outcome = poll_job(fetch, &config, &cancel, |_| {}).await.unwrap();
        assert!(outcome.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_elapses() {
        let cancel = Arc::new(AtomicBool::new(false));
        let config = PollConfig::builder()
            .with_interval(Duration::from_secs(2))
            .with_timeout(Duration::from_secs(7))
            .build();
        let fetch = || std::future::ready(Ok(snap(JobStatus::Processing, 10)));

        let outcome = poll_job(fetch, &config, &cancel, |_| {}).await.unwrap();
        assert!(matches!(outcome, PollOutcome::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_interval_is_two_seconds() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_millis(2000));
        assert!(config.timeout.is_none());
        assert_eq!(config.max_consecutive_failures, 0);
    }
}
