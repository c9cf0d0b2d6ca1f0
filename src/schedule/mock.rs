//! Mock schedule source
//!
//! Scripted stand-in for the scheduling service, for tests and for running
//! the CLI without network access. Responses are consumed in order; once the
//! script runs out, the fallback response is returned forever.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{PiRecord, ScheduleError, ScheduleSource};

/// One scripted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// A schedule entry with this PI.
    Scheduled(PiRecord),
    /// An empty schedule (`[]`).
    Empty,
    /// An HTTP error status.
    Unavailable(u16),
    /// A body that fails to decode.
    Malformed(String),
}

impl MockResponse {
    fn to_result(&self, endstation: &str) -> Result<Option<PiRecord>, ScheduleError> {
        match self {
            MockResponse::Scheduled(pi) => Ok(Some(pi.clone())),
            MockResponse::Empty => Ok(None),
            MockResponse::Unavailable(status) => Err(ScheduleError::Status {
                status: *status,
                url: format!("mock://schedule/{endstation}"),
            }),
            MockResponse::Malformed(body) => super::first_pi(body),
        }
    }
}

/// Scripted schedule source.
///
/// # Example
///
/// ```rust,ignore
/// let schedule = Arc::new(MockSchedule::new(MockResponse::Empty));
/// schedule.push(MockResponse::Scheduled(PiRecord::new("A. Researcher", "ar@lab.org"))).await;
/// ```
pub struct MockSchedule {
    script: Mutex<VecDeque<MockResponse>>,
    fallback: Mutex<MockResponse>,
    last_query: Mutex<Option<(String, DateTime<Utc>)>>,
    calls: AtomicUsize,
}

impl MockSchedule {
    /// Create a mock that answers `fallback` until something is pushed.
    pub fn new(fallback: MockResponse) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            last_query: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Mock that always reports `pi` as scheduled.
    pub fn always(pi: PiRecord) -> Self {
        Self::new(MockResponse::Scheduled(pi))
    }

    /// Queue a one-shot response.
    pub async fn push(&self, response: MockResponse) {
        self.script.lock().await.push_back(response);
    }

    /// Replace the response returned once the script is exhausted.
    pub async fn set_fallback(&self, response: MockResponse) {
        *self.fallback.lock().await = response;
    }

    /// Number of queries answered so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Endstation and time of the most recent query.
    pub async fn last_query(&self) -> Option<(String, DateTime<Utc>)> {
        self.last_query.lock().await.clone()
    }
}

#[async_trait]
impl ScheduleSource for MockSchedule {
    async fn current_pi(
        &self,
        endstation: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PiRecord>, ScheduleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().await = Some((endstation.to_string(), at));

        let scripted = self.script.lock().await.pop_front();
        match scripted {
            Some(response) => response.to_result(endstation),
            None => self.fallback.lock().await.to_result(endstation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let mock = MockSchedule::new(MockResponse::Empty);
        mock.push(MockResponse::Scheduled(PiRecord::new("A", "a@lab.org")))
            .await;
        let now = Utc::now();

        let first = mock.current_pi("7.0.1.1", now).await.unwrap();
        assert_eq!(first.unwrap().email, "a@lab.org");
        assert!(mock.current_pi("7.0.1.1", now).await.unwrap().is_none());
        assert!(mock.current_pi("7.0.1.1", now).await.unwrap().is_none());
        assert_eq!(mock.calls(), 3);
        assert_eq!(mock.last_query().await.unwrap().0, "7.0.1.1");
    }

    #[tokio::test]
    async fn test_failures() {
        let mock = MockSchedule::new(MockResponse::Unavailable(503));
        mock.push(MockResponse::Malformed("not json".into())).await;
        let now = Utc::now();

        assert!(matches!(
            mock.current_pi("7.0.1.1", now).await,
            Err(ScheduleError::Decode(_))
        ));
        assert!(matches!(
            mock.current_pi("7.0.1.1", now).await,
            Err(ScheduleError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_fallback_can_be_replaced() {
        let mock = MockSchedule::new(MockResponse::Empty);
        let now = Utc::now();
        assert!(mock.current_pi("7.0.1.1", now).await.unwrap().is_none());

        mock.set_fallback(MockResponse::Scheduled(PiRecord::new("B", "b@lab.org")))
            .await;
        for _ in 0..2 {
            let pi = mock.current_pi("7.0.1.1", now).await.unwrap().unwrap();
            assert_eq!(pi.email, "b@lab.org");
        }
    }
}
