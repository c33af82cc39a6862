//! Waiting on asynchronous Nutanix operations.
//!
//! Every mutating call hands back a task handle (a v3 task UUID, a v4 task
//! extId or an NDB operation id). `wait_for_state` polls a refresh closure
//! until the reported state reaches a target, bounded by a timeout and the
//! provider-wide cancellation token. The refresh closure itself turns failure
//! states into errors so their detail surfaces immediately.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

pub const STATE_QUEUED: &str = "QUEUED";
pub const STATE_RUNNING: &str = "RUNNING";
pub const STATE_PENDING: &str = "PENDING";
pub const STATE_SUCCEEDED: &str = "SUCCEEDED";
pub const STATE_FAILED: &str = "FAILED";
pub const STATE_INVALID_UUID: &str = "INVALID_UUID";
pub const STATE_CANCELED: &str = "CANCELED";
pub const STATE_DELETE_PENDING: &str = "DELETE_PENDING";
pub const STATE_DELETED_PENDING: &str = "DELETED_PENDING";
pub const STATE_COMPLETED: &str = "COMPLETED";

/// NDB operations report progress slowly; the first poll waits a minute.
pub const ERA_DELAY: Duration = Duration::from_secs(60);
/// Default NDB provisioning timeout.
pub const ERA_PROVISION_TIMEOUT: Duration = Duration::from_secs(75 * 60);

/// Pending/target description of one wait.
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    /// Sleep before the first poll.
    pub delay: Duration,
    /// Sleep between polls.
    pub min_timeout: Duration,
    pub timeout: Duration,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            min_timeout: Duration::from_secs(3),
            timeout,
        }
    }

    /// v3 intent API tasks.
    pub fn v3(timeout: Duration) -> Self {
        Self::new(&[STATE_QUEUED, STATE_RUNNING, STATE_PENDING], &[STATE_SUCCEEDED], timeout)
            .with_delay(Duration::from_secs(10))
    }

    /// Prism v4 tasks.
    pub fn prism_v4(timeout: Duration) -> Self {
        Self::new(&[STATE_PENDING, STATE_RUNNING, STATE_QUEUED], &[STATE_SUCCEEDED], timeout)
    }

    /// NDB operations.
    pub fn era(timeout: Duration) -> Self {
        Self::new(&[STATE_PENDING], &[STATE_COMPLETED], timeout)
            .with_delay(ERA_DELAY)
            .with_min_timeout(Duration::from_secs(10))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn with_pending(mut self, extra: &[&str]) -> Self {
        self.pending.extend(extra.iter().map(|s| s.to_string()));
        self
    }

    fn is_target(&self, state: &str) -> bool {
        self.target.iter().any(|t| t == state)
    }

    fn is_pending(&self, state: &str) -> bool {
        self.pending.iter().any(|p| p == state)
    }
}

/// One observation of a polled operation.
#[derive(Debug, Clone)]
pub struct Refresh<T> {
    pub value: T,
    pub state: String,
}

impl<T> Refresh<T> {
    pub fn new(value: T, state: impl Into<String>) -> Self {
        Self {
            value,
            state: state.into(),
        }
    }
}

/// Polls `refresh` until it reports a target state.
///
/// `id` only names the operation in timeout errors and logs.
pub async fn wait_for_state<T, F, Fut>(
    id: &str,
    conf: &StateChangeConf,
    cancel: &CancellationToken,
    mut refresh: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Refresh<T>>>,
{
    let poll = async {
        sleep_or_cancel(conf.delay, cancel).await?;
        loop {
            let observed = refresh().await?;
            debug!("operation {} is {}", id, observed.state);

            if conf.is_target(&observed.state) {
                return Ok(observed.value);
            }
            if !conf.is_pending(&observed.state) {
                return Err(Error::UnexpectedState {
                    state: observed.state,
                    target: conf.target.join(", "),
                });
            }
            sleep_or_cancel(conf.min_timeout, cancel).await?;
        }
    };

    match tokio::time::timeout(conf.timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            id: id.to_string(),
            seconds: conf.timeout.as_secs(),
        }),
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(Error::Cancelled),
    }
}

/// Failure detail in the shape the v3 task API reports it.
pub fn task_failure_detail(error_detail: Option<&str>, progress_message: Option<&str>) -> String {
    format!(
        "error_detail: {}, progress_message: {}",
        error_detail.unwrap_or_default(),
        progress_message.unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast(timeout: Duration) -> StateChangeConf {
        StateChangeConf::v3(timeout)
            .with_delay(Duration::ZERO)
            .with_min_timeout(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_on_the_nth_poll_and_no_earlier() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        let conf = fast(Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let result = wait_for_state("task-1", &conf, &cancel, || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let state = match n {
                    1 => STATE_QUEUED,
                    2..=3 => STATE_RUNNING,
                    _ => STATE_SUCCEEDED,
                };
                Ok(Refresh::new(n, state))
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 4);
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn immediate_failure_surfaces_error_detail() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        let conf = fast(Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let err = wait_for_state::<(), _, _>("task-1", &conf, &cancel, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::TaskFailed {
                    id: "task-1".to_string(),
                    detail: task_failure_detail(Some("X"), Some("boom")),
                })
            }
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("X"));
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_state_is_rejected() {
        let conf = fast(Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let err = wait_for_state::<(), _, _>("task-1", &conf, &cancel, || async {
            Ok(Refresh::new((), "ABORTED"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::UnexpectedState { ref state, .. } if state == "ABORTED"));
    }

    #[tokio::test]
    async fn never_finishing_task_times_out() {
        let conf = fast(Duration::from_millis(30));
        let cancel = CancellationToken::new();

        let err = wait_for_state::<(), _, _>("task-9", &conf, &cancel, || async {
            Ok(Refresh::new((), STATE_RUNNING))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Timeout { ref id, .. } if id == "task-9"));
    }

    #[tokio::test]
    async fn cancellation_stops_the_wait() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let conf = fast(Duration::from_secs(5));

        let err = wait_for_state::<(), _, _>("task-1", &conf, &cancel, || async {
            Ok(Refresh::new((), STATE_RUNNING))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn era_conf_waits_a_minute_before_polling() {
        let conf = StateChangeConf::era(ERA_PROVISION_TIMEOUT);
        assert_eq!(conf.delay, ERA_DELAY);
        assert_eq!(conf.target, vec![STATE_COMPLETED.to_string()]);
        assert_eq!(conf.timeout, Duration::from_secs(4500));
    }

    #[test]
    fn delete_waits_accept_delete_pending() {
        let conf =
            StateChangeConf::v3(Duration::from_secs(60)).with_pending(&[STATE_DELETE_PENDING]);
        assert!(conf.is_pending(STATE_DELETE_PENDING));
        assert!(conf.is_pending(STATE_QUEUED));
        assert!(!conf.is_pending(STATE_FAILED));
    }
}
