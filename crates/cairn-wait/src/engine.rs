//! Condition-wait engine
//!
//! Repeatedly samples a remote object through a fallible fetch, evaluates a
//! condition against each snapshot and resolves to success, a timeout
//! carrying the last observation, or a terminal error.
//!
//! Polling is fixed-interval and immediate-first: the first fetch happens as
//! soon as the wait starts, then once per poll interval until the deadline.
//! A fetch still outstanding at the deadline is dropped, so a hung API call
//! cannot hold the wait past its timeout.
//! Only two things end a wait early: the condition reporting completion, or
//! a fetch error the retry classifier considers terminal. A condition that
//! reports a problem without reporting completion ([`Verdict::Degraded`]) is
//! logged and the wait keeps going, since many lifecycle phases flip back
//! and forth between polls.
//!
//! # Example
//!
//! ```ignore
//! use cairn_wait::{fetch_fn, Verdict, WaitRequest, Waiter};
//!
//! let waiter = Waiter::new(&WaitConfig::default())?;
//! let request = WaitRequest::new("waiting for cluster prod to be running", timeout);
//! waiter
//!     .wait_for(&request, &fetch_fn(|| source.describe_cluster("prod")), &|c: &Cluster| {
//!         if c.phase() == ClusterPhase::Running { Verdict::Satisfied } else { Verdict::Pending }
//!     })
//!     .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use cairn_common::retry::should_retry;
use cairn_common::{Error, WaitConfig};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ConditionError, TimeoutError, WaitError};

/// A domain object that can be observed by the engine
///
/// Only used for diagnostics: each observation is logged with the object's
/// name and a short state summary.
pub trait Snapshot: Send + Sync + 'static {
    /// Identity of the observed object
    fn name(&self) -> String;

    /// Short state summary (e.g., "Phase=Installing")
    fn state(&self) -> String;
}

/// Decision of a condition for one snapshot
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Condition met; the wait succeeds
    Satisfied,
    /// Condition met, but the final observation reported a problem.
    /// The wait still succeeds; the error is attached to [`Completed`].
    SatisfiedWithError(ConditionError),
    /// Not there yet; keep polling
    Pending,
    /// Not there yet and something looks wrong; logged, keep polling
    Degraded(ConditionError),
}

impl Verdict {
    /// Whether this verdict ends the wait
    pub fn is_done(&self) -> bool {
        matches!(self, Verdict::Satisfied | Verdict::SatisfiedWithError(_))
    }
}

/// Predicate evaluated against every successful observation
///
/// Implemented for any `Fn(&T) -> Verdict`, so closures work directly.
pub trait Condition<T>: Send + Sync {
    /// Evaluate the condition against a snapshot
    fn check(&self, observed: &T) -> Verdict;
}

impl<T, F> Condition<T> for F
where
    F: Fn(&T) -> Verdict + Send + Sync,
{
    fn check(&self, observed: &T) -> Verdict {
        self(observed)
    }
}

/// Fallible remote read of a domain object
///
/// Returns a small ordered list of matching objects; the engine only looks at
/// whether it is empty and at its first element.
#[async_trait]
pub trait Fetch<T>: Send + Sync {
    /// Read the current state of the object
    async fn fetch(&self) -> Result<Vec<T>, Error>;
}

/// Adapter turning an async closure into a [`Fetch`]
pub struct FnFetch<F>(F);

/// Wrap a closure returning a future of `Result<Vec<T>, Error>` as a fetch
pub fn fetch_fn<F>(f: F) -> FnFetch<F> {
    FnFetch(f)
}

#[async_trait]
impl<T, F, Fut> Fetch<T> for FnFetch<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<T>, Error>> + Send,
{
    async fn fetch(&self) -> Result<Vec<T>, Error> {
        (self.0)().await
    }
}

/// How to treat a "not found" fetch error
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NotFound {
    /// The object may not exist yet; keep polling
    #[default]
    KeepWaiting,
    /// The object is gone, which is what we are waiting for
    Satisfied,
    /// A missing object is a terminal error
    Fail,
}

/// Parameters of a single wait call
#[derive(Clone, Debug)]
pub struct WaitRequest {
    action: String,
    timeout: Duration,
    not_found: NotFound,
    empty_satisfies: bool,
}

impl WaitRequest {
    /// Wait for up to `timeout`; `action` describes the wait in logs and
    /// errors (e.g., "waiting for cluster prod to be running")
    pub fn new(action: impl Into<String>, timeout: Duration) -> Self {
        Self {
            action: action.into(),
            timeout,
            not_found: NotFound::default(),
            empty_satisfies: false,
        }
    }

    /// Set how "not found" fetch errors are treated
    pub fn on_not_found(mut self, policy: NotFound) -> Self {
        self.not_found = policy;
        self
    }

    /// Treat an empty fetch result as success (waiting for removal)
    pub fn empty_satisfies(mut self) -> Self {
        self.empty_satisfies = true;
        self
    }

    /// Description of the wait
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Deadline measured from the start of the wait
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Diagnostics of a successful wait
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completed {
    /// Number of fetch attempts made
    pub attempts: u32,
    /// Time from start to completion
    pub elapsed: Duration,
    /// Problem reported by the condition on the final observation, if any
    pub final_observation_error: Option<ConditionError>,
}

/// What the fetch-error handler decided
#[derive(Debug)]
pub enum FetchErrorAction {
    /// Transient or expected error; keep polling
    Continue(Error),
    /// Terminal error; stop the wait immediately
    Stop(Error),
    /// Cancelled while backing off
    Cancelled,
}

/// Runs condition waits at a configured cadence
///
/// Holds no state shared between calls; clone it freely and run independent
/// waits concurrently.
#[derive(Clone, Debug)]
pub struct Waiter {
    poll_interval: Duration,
    default_timeout: Duration,
    max_retry_delay: Duration,
    cancel: CancellationToken,
}

impl Waiter {
    /// Create a waiter, rejecting configurations that would busy-loop
    pub fn new(config: &WaitConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            poll_interval: config.poll_interval,
            default_timeout: config.default_timeout,
            max_retry_delay: config.max_retry_delay,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort waits when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A copy of this waiter polling at a different cadence
    pub fn with_poll_interval(&self, interval: Duration) -> Result<Self, Error> {
        WaitConfig::default()
            .with_poll_interval(interval)
            .validate()?;
        Ok(Self {
            poll_interval: interval,
            ..self.clone()
        })
    }

    /// Time between observations
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Deadline for waits that do not choose one
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Poll `fetch` until `condition` is satisfied, the deadline passes, a
    /// terminal fetch error occurs, or the waiter is cancelled.
    pub async fn wait_for<T, F, C>(
        &self,
        request: &WaitRequest,
        fetch: &F,
        condition: &C,
    ) -> Result<Completed, WaitError<T>>
    where
        T: Snapshot,
        F: Fetch<T> + ?Sized,
        C: Condition<T> + ?Sized,
    {
        let action = request.action();
        let timeout = request.timeout();
        let start = Instant::now();
        let deadline = start + timeout;
        let mut attempts: u32 = 0;
        let mut last_observed: Option<T> = None;
        let mut last_error: Option<Error> = None;

        info!(action, timeout_secs = timeout.as_secs(), "Waiting up to {:?} while {}", timeout, action);

        loop {
            if attempts > 0 && start.elapsed() >= timeout {
                break;
            }
            if self.cancel.is_cancelled() {
                return Err(cancelled(action, last_observed));
            }

            attempts += 1;
            // Fetch is polled before the deadline so the first read always
            // starts, even with a zero timeout.
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancelled(action, last_observed)),
                result = fetch.fetch() => result,
                _ = sleep_until(deadline) => {
                    warn!(action, attempt = attempts, "Fetch still running at the deadline");
                    break;
                }
            };
            match fetched {
                Err(err) => {
                    if err.is_not_found() && request.not_found == NotFound::Satisfied {
                        info!(action, attempt = attempts, "Object not found, wait complete");
                        return Ok(completed(attempts, start, None));
                    }
                    let not_found_is_progress = request.not_found == NotFound::KeepWaiting;
                    match self.handle_fetch_error(err, not_found_is_progress, action).await {
                        FetchErrorAction::Continue(err) => last_error = Some(err),
                        FetchErrorAction::Stop(err) => {
                            // Past the deadline the last observed state says more
                            // than the error that happened to end the loop.
                            if start.elapsed() >= timeout {
                                if let Some(observed) = last_observed {
                                    return Err(timed_out(action, observed, start, attempts));
                                }
                            }
                            return Err(WaitError::Fetch {
                                action: action.to_string(),
                                source: err,
                            });
                        }
                        FetchErrorAction::Cancelled => {
                            return Err(cancelled(action, last_observed));
                        }
                    }
                }
                Ok(items) => {
                    last_error = None;
                    match items.into_iter().next() {
                        None if request.empty_satisfies => {
                            info!(action, attempt = attempts, "No object returned, wait complete");
                            return Ok(completed(attempts, start, None));
                        }
                        None => {
                            debug!(action, attempt = attempts, "No object returned yet");
                        }
                        Some(observed) => {
                            debug!(
                                object = %observed.name(),
                                state = %observed.state(),
                                elapsed_ms = start.elapsed().as_millis() as u64,
                                "Observed object while {}",
                                action
                            );
                            let verdict = condition.check(&observed);
                            last_observed = Some(observed);
                            match verdict {
                                Verdict::Satisfied => {
                                    info!(action, attempt = attempts, "Condition satisfied");
                                    return Ok(completed(attempts, start, None));
                                }
                                Verdict::SatisfiedWithError(e) => {
                                    warn!(
                                        action,
                                        error = %e,
                                        "Condition satisfied with an error on the final observation"
                                    );
                                    return Ok(completed(attempts, start, Some(e)));
                                }
                                Verdict::Degraded(e) => {
                                    warn!(action, error = %e, "Error evaluating condition, still waiting");
                                }
                                Verdict::Pending => {}
                            }
                        }
                    }
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                break;
            }
            let pause = self.poll_interval.min(timeout - elapsed);
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(cancelled(action, last_observed)),
                _ = sleep(pause) => {}
            }
        }

        match last_observed {
            Some(observed) => Err(timed_out(action, observed, start, attempts)),
            None => {
                warn!(action, attempts, "Timed out without observing the object");
                Err(WaitError::NothingObserved {
                    action: action.to_string(),
                    last_error,
                })
            }
        }
    }

    /// Decide what a fetch error means for the enclosing wait.
    ///
    /// "Not found" keeps the wait going when `not_found_is_progress` is set.
    /// Errors the retry classifier marks as transient keep it going after the
    /// suggested pause (capped by the configured maximum). Anything else is
    /// terminal.
    pub async fn handle_fetch_error(
        &self,
        err: Error,
        not_found_is_progress: bool,
        action: &str,
    ) -> FetchErrorAction {
        if not_found_is_progress && err.is_not_found() {
            debug!(action, "Ignoring NotFound error while {}", action);
            return FetchErrorAction::Continue(err);
        }

        let decision = should_retry(&err);
        if decision.retry {
            let delay = decision.delay.min(self.max_retry_delay);
            warn!(
                action,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "Retryable error while {}", action
            );
            if !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return FetchErrorAction::Cancelled,
                    _ = sleep(delay) => {}
                }
            }
            return FetchErrorAction::Continue(err);
        }

        error!(action, error = %err, "Non-retryable error while {}", action);
        FetchErrorAction::Stop(err)
    }
}

fn completed(attempts: u32, start: Instant, error: Option<ConditionError>) -> Completed {
    Completed {
        attempts,
        elapsed: start.elapsed(),
        final_observation_error: error,
    }
}

fn timed_out<T>(action: &str, observed: T, start: Instant, attempts: u32) -> WaitError<T> {
    WaitError::Timeout(TimeoutError::new(
        format!("timed out while {}", action),
        observed,
        start.elapsed(),
        attempts,
    ))
}

fn cancelled<T>(action: &str, last_observed: Option<T>) -> WaitError<T> {
    info!(action, "Wait cancelled");
    WaitError::Cancelled {
        action: action.to_string(),
        last_observed: last_observed.map(Box::new),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Phase(&'static str);

    impl Snapshot for Phase {
        fn name(&self) -> String {
            "test".to_string()
        }
        fn state(&self) -> String {
            format!("Phase={}", self.0)
        }
    }

    /// Fetch double replaying a script; the last entry repeats forever.
    struct Scripted {
        script: Mutex<VecDeque<Result<Vec<Phase>, Error>>>,
        repeat: fn() -> Result<Vec<Phase>, Error>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(
            script: Vec<Result<Vec<Phase>, Error>>,
            repeat: fn() -> Result<Vec<Phase>, Error>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into()),
                repeat,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetch<Phase> for Scripted {
        async fn fetch(&self) -> Result<Vec<Phase>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(self.repeat)
        }
    }

    fn running(p: &Phase) -> Verdict {
        if p.0 == "Running" {
            Verdict::Satisfied
        } else {
            Verdict::Pending
        }
    }

    fn waiter(poll_secs: u64) -> Waiter {
        Waiter::new(&WaitConfig::default().with_poll_interval(Duration::from_secs(poll_secs)))
            .unwrap()
    }

    fn request(timeout_secs: u64) -> WaitRequest {
        WaitRequest::new("waiting for test to be running", Duration::from_secs(timeout_secs))
    }

    #[test]
    fn test_zero_poll_interval_rejected_at_construction() {
        let config = WaitConfig::default().with_poll_interval(Duration::ZERO);
        assert!(Waiter::new(&config).is_err());
        assert!(waiter(15).with_poll_interval(Duration::ZERO).is_err());
        assert_eq!(
            waiter(15)
                .with_poll_interval(Duration::from_secs(2))
                .unwrap()
                .poll_interval(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_verdict_is_done() {
        assert!(Verdict::Satisfied.is_done());
        assert!(Verdict::SatisfiedWithError(ConditionError::new("x")).is_done());
        assert!(!Verdict::Pending.is_done());
        assert!(!Verdict::Degraded(ConditionError::new("x")).is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_immediately_even_when_timeout_shorter_than_interval() {
        let fetch = Scripted::new(vec![], || Ok(vec![Phase("Installing")]));
        let start = Instant::now();

        let err = waiter(15)
            .wait_for(&request(5), &fetch, &running)
            .await
            .unwrap_err();

        assert_eq!(fetch.calls(), 1);
        assert!(err.is_timeout());
        // Sleeps only until the deadline, not a full interval
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_fetch_happens_before_deadline() {
        let fetch = Scripted::new(vec![], || Ok(vec![Phase("Installing")]));
        let start = Instant::now();

        let err = waiter(15)
            .wait_for(&request(40), &fetch, &running)
            .await
            .unwrap_err();

        // t=0, 15, 30
        assert_eq!(fetch.calls(), 3);
        assert_eq!(err.as_timeout().unwrap().attempts(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_do_not_replace_snapshot() {
        let fetch = Scripted::new(
            vec![Ok(vec![Phase("Installing")])],
            || Err(Error::internal_server("etcd hiccup")),
        );

        let err = waiter(15)
            .wait_for(&request(60), &fetch, &running)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.last_observed(), Some(&Phase("Installing")));
        assert_eq!(fetch.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_most_recent_snapshot() {
        let fetch = Scripted::new(
            vec![
                Ok(vec![Phase("Pending")]),
                Ok(vec![Phase("Installing")]),
            ],
            || Ok(vec![Phase("Updating")]),
        );

        let err = waiter(10)
            .wait_for(&request(30), &fetch, &running)
            .await
            .unwrap_err();

        assert_eq!(err.last_observed(), Some(&Phase("Updating")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_first_item_is_evaluated() {
        let fetch = Scripted::new(vec![], || {
            Ok(vec![Phase("Installing"), Phase("Running")])
        });

        let err = waiter(15)
            .wait_for(&request(15), &fetch, &running)
            .await
            .unwrap_err();

        assert_eq!(err.last_observed(), Some(&Phase("Installing")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_never_short_circuits() {
        let fetch = Scripted::new(vec![], || Ok(vec![Phase("RestoreFailed")]));
        let degraded = |_: &Phase| Verdict::Degraded(ConditionError::new("restore failed"));

        let err = waiter(5)
            .wait_for(&request(30), &fetch, &degraded)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        // t=0, 5, 10, 15, 20, 25
        assert_eq!(fetch.calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_satisfied_with_error_completes() {
        let fetch = Scripted::new(vec![], || Ok(vec![Phase("Running")]));
        let condition =
            |_: &Phase| Verdict::SatisfiedWithError(ConditionError::new("addon check flaked"));

        let done = waiter(15)
            .wait_for(&request(60), &fetch, &condition)
            .await
            .unwrap();

        assert_eq!(done.attempts, 1);
        assert_eq!(
            done.final_observation_error,
            Some(ConditionError::new("addon check flaked"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_keeps_waiting_by_default() {
        let fetch = Scripted::new(
            vec![
                Err(Error::not_found("cluster", "test")),
                Err(Error::not_found("cluster", "test")),
            ],
            || Ok(vec![Phase("Running")]),
        );

        let done = waiter(15)
            .wait_for(&request(60), &fetch, &running)
            .await
            .unwrap();

        assert_eq!(done.attempts, 3);
        assert_eq!(done.elapsed, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_can_be_terminal() {
        let fetch = Scripted::new(vec![], || Err(Error::not_found("cluster", "test")));

        let err = waiter(15)
            .wait_for(&request(60).on_not_found(NotFound::Fail), &fetch, &running)
            .await
            .unwrap_err();

        assert!(err.fetch_error().unwrap().is_not_found());
        assert_eq!(fetch.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_result_can_satisfy() {
        let fetch = Scripted::new(vec![Ok(vec![Phase("Available")])], || Ok(vec![]));
        let still_present = |_: &Phase| Verdict::Pending;

        let done = waiter(15)
            .wait_for(&request(60).empty_satisfies(), &fetch, &still_present)
            .await
            .unwrap();

        assert_eq!(done.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_observed_surfaces_last_transient_error() {
        let fetch = Scripted::new(vec![], || Err(Error::too_many_requests("throttled")));

        let err = waiter(15)
            .wait_for(&request(30), &fetch, &running)
            .await
            .unwrap_err();

        assert!(!err.is_timeout());
        assert!(matches!(err, WaitError::NothingObserved { .. }));
        assert!(err.fetch_error().unwrap().is_too_many_requests());
        assert_eq!(fetch.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_after_deadline_prefers_timeout() {
        /// Fetch whose second call takes longer than the remaining time
        struct SlowForbidden {
            calls: AtomicU32,
        }

        #[async_trait]
        impl Fetch<Phase> for SlowForbidden {
            async fn fetch(&self) -> Result<Vec<Phase>, Error> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Ok(vec![Phase("Installing")]);
                }
                sleep(Duration::from_secs(60)).await;
                Err(Error::forbidden("token expired"))
            }
        }

        let fetch = SlowForbidden {
            calls: AtomicU32::new(0),
        };
        let start = Instant::now();
        let err = waiter(15)
            .wait_for(&request(30), &fetch, &running)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.last_observed(), Some(&Phase("Installing")));
        // The slow fetch is abandoned at the deadline, not awaited
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    /// Story: the API server accepts the connection but never answers. The
    /// wait must still come back at its deadline with what it saw before.
    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_is_cut_at_deadline() {
        let calls = AtomicU32::new(0);
        let fetch = fetch_fn(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n > 0 {
                    std::future::pending::<()>().await;
                }
                Ok::<_, Error>(vec![Phase("Installing")])
            }
        });
        let start = Instant::now();

        let err = waiter(15)
            .wait_for(&request(30), &fetch, &running)
            .await
            .unwrap_err();

        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert!(err.is_timeout());
        assert_eq!(err.last_observed(), Some(&Phase("Installing")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_first_fetch_reports_nothing_observed() {
        let fetch = fetch_fn(|| async {
            std::future::pending::<()>().await;
            Ok::<_, Error>(vec![Phase("Running")])
        });
        let start = Instant::now();

        let err = waiter(15)
            .wait_for(&request(30), &fetch, &running)
            .await
            .unwrap_err();

        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert!(matches!(err, WaitError::NothingObserved { last_error: None, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_still_fetches_once() {
        let fetch = Scripted::new(vec![], || Ok(vec![Phase("Running")]));

        let done = waiter(15)
            .wait_for(&request(0), &fetch, &running)
            .await
            .unwrap();

        assert_eq!(done.attempts, 1);
        assert_eq!(fetch.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_hung_fetch() {
        let token = CancellationToken::new();
        let fetch = fetch_fn(|| async {
            std::future::pending::<()>().await;
            Ok::<_, Error>(vec![Phase("Running")])
        });
        let w = waiter(15).with_cancellation(token.clone());

        let cancel = async {
            sleep(Duration::from_secs(5)).await;
            token.cancel();
        };
        let req = request(600);
        let (result, ()) = tokio::join!(w.wait_for(&req, &fetch, &running), cancel);

        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_before_deadline_is_returned() {
        let fetch = Scripted::new(
            vec![Ok(vec![Phase("Installing")])],
            || Err(Error::forbidden("token expired")),
        );

        let err = waiter(15)
            .wait_for(&request(60), &fetch, &running)
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Fetch { .. }));
        assert_eq!(fetch.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_sleep_returns_snapshot() {
        let token = CancellationToken::new();
        let fetch = Scripted::new(vec![], || Ok(vec![Phase("Installing")]));
        let w = waiter(15).with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            sleep(Duration::from_secs(20)).await;
            token.cancel();
        });

        let start = Instant::now();
        let err = w.wait_for(&request(600), &fetch, &running).await.unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert_eq!(err.last_observed(), Some(&Phase("Installing")));
        assert_eq!(fetch.calls(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_fetches_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let fetch = Scripted::new(vec![], || Ok(vec![Phase("Running")]));

        let err = waiter(15)
            .with_cancellation(token)
            .wait_for(&request(60), &fetch, &running)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.last_observed(), None);
        assert_eq!(fetch.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_fn_adapter() {
        let calls = AtomicU32::new(0);
        let fetch = fetch_fn(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let phase = if n < 1 { "Installing" } else { "Running" };
                Ok::<_, Error>(vec![Phase(phase)])
            }
        });

        let done = waiter(15)
            .wait_for(&request(60), &fetch, &running)
            .await
            .unwrap();

        assert_eq!(done.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_fetch_error_branches() {
        let w = waiter(15);

        match w
            .handle_fetch_error(Error::not_found("cluster", "c"), true, "getting cluster c")
            .await
        {
            FetchErrorAction::Continue(e) => assert!(e.is_not_found()),
            other => panic!("expected Continue, got {other:?}"),
        }
        assert!(matches!(
            w.handle_fetch_error(Error::not_found("cluster", "c"), false, "getting cluster c")
                .await,
            FetchErrorAction::Stop(_)
        ));
        assert!(matches!(
            w.handle_fetch_error(Error::internal_server("boom"), false, "getting cluster c")
                .await,
            FetchErrorAction::Continue(_)
        ));
        assert!(matches!(
            w.handle_fetch_error(Error::forbidden("no"), true, "getting cluster c")
                .await,
            FetchErrorAction::Stop(_)
        ));
    }
}
