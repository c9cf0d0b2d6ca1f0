//! Client for the ALSHub/ESAF scheduling service.
//!
//! The service answers `GET {base_url}{endstation}` with a JSON array of
//! schedule entries overlapping the requested window. Each entry carries a
//! `PI` object (`Name`, `Email`). Querying with `start == stop == now` yields
//! the entry that is active right now; only the first entry is consulted.
//! `start`/`stop` are wall-clock times in the `tz_id` zone, so the instant is
//! converted to that zone before formatting, whatever the host's zone.
//!
//! # Architecture
//!
//! ```text
//! PiService ──> dyn ScheduleSource ──┬──> EsafClient (reqwest, production)
//!                                    └──> MockSchedule (scripted, tests/offline)
//! ```
//!
//! Failures are reported as [`ScheduleError`] rather than collapsed into "no
//! PI"; what a failure means for the stored PI is decided by the service's
//! [`PollFailurePolicy`](crate::reconcile::PollFailurePolicy).

pub mod mock;

use crate::config::ScheduleConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

pub use mock::MockSchedule;

/// Staging deployment of the scheduling API.
pub const DEFAULT_BASE_URL: &str = "https://experiment-staging.als.lbl.gov/";

/// Time zone the facility schedule is kept in.
pub const DEFAULT_TZ_ID: &str = "America/Los_Angeles";

/// Public API key used by beamline acquisition clients.
pub const DEFAULT_API_KEY: &str = "6bdcc7fcb3e55b7e995b27e229e172ac";

/// Principal investigator of a schedule entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiRecord {
    /// Display name, used in the welcome notification.
    #[serde(rename = "Name", default)]
    pub name: String,
    /// ALSHub account email.
    #[serde(rename = "Email")]
    pub email: String,
}

impl PiRecord {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// One element of the service's response array. Other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleEntry {
    /// Scheduled PI for this slot.
    #[serde(rename = "PI")]
    pub pi: PiRecord,
}

/// Why a schedule query produced no usable answer.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// Connection, TLS, timeout or body transfer failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service returned {status} for {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request URL, without the API key.
        url: String,
    },

    /// The body was not a JSON array of schedule entries.
    #[error("malformed schedule response: {0}")]
    Decode(#[from] serde_json::Error),

    /// `tz_id` is not a known IANA time zone.
    #[error("unknown time zone: {0}")]
    TimeZone(String),
}

/// Source of "who is scheduled on this endstation right now".
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Returns the PI of the first schedule entry covering `at`, `None` when
    /// nothing is scheduled.
    async fn current_pi(
        &self,
        endstation: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PiRecord>, ScheduleError>;
}

/// Extract the first entry's PI from a response body.
///
/// An empty array means nothing is scheduled. Entries after the first are
/// ignored without being decoded.
pub fn first_pi(body: &str) -> Result<Option<PiRecord>, ScheduleError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)?;
    match entries.into_iter().next() {
        None => Ok(None),
        Some(first) => {
            let entry: ScheduleEntry = serde_json::from_value(first)?;
            Ok(Some(entry.pi))
        }
    }
}

/// Format a timestamp the way the service expects in `start`/`stop`.
pub fn format_query_time(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// HTTP client for the scheduling service.
pub struct EsafClient {
    client: reqwest::Client,
    base_url: String,
    tz: Tz,
    api_key: String,
    include_unscheduled: bool,
}

impl EsafClient {
    /// Build a client from the `[schedule]` configuration section.
    pub fn new(config: &ScheduleConfig) -> Result<Self, ScheduleError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("alshub/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        Self::with_client(config, client)
    }

    /// Use a caller-built `reqwest::Client` (proxy, TLS roots). The
    /// configured request timeout is not applied to it.
    pub fn with_client(
        config: &ScheduleConfig,
        client: reqwest::Client,
    ) -> Result<Self, ScheduleError> {
        let tz: Tz = config
            .tz_id
            .parse()
            .map_err(|_| ScheduleError::TimeZone(config.tz_id.clone()))?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
            tz,
            api_key: config.api_key.clone(),
            include_unscheduled: config.include_unscheduled,
        })
    }

    /// Build (but do not send) the schedule request for `endstation` at `at`.
    pub fn build_request(
        &self,
        endstation: &str,
        at: DateTime<Utc>,
    ) -> Result<reqwest::Request, ScheduleError> {
        let when = format_query_time(at.with_timezone(&self.tz).naive_local());
        let include_unscheduled = if self.include_unscheduled {
            "true"
        } else {
            "false"
        };

        let request = self
            .client
            .get(format!("{}{}", self.base_url, endstation))
            .query(&[
                ("start", when.as_str()),
                ("stop", when.as_str()),
                ("tz_id", self.tz.name()),
                ("include_unscheduled", include_unscheduled),
                ("api-key", self.api_key.as_str()),
            ])
            .build()?;

        Ok(request)
    }
}

#[async_trait]
impl ScheduleSource for EsafClient {
    #[instrument(skip(self))]
    async fn current_pi(
        &self,
        endstation: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PiRecord>, ScheduleError> {
        let request = self.build_request(endstation, at)?;
        let mut redacted = request.url().clone();
        redacted.set_query(None);

        let response = self.client.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScheduleError::Status {
                status: status.as_u16(),
                url: redacted.to_string(),
            });
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "Schedule response received");
        first_pi(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SCHEDULED: &str = r#"[{"PI":{"Name":"A. Researcher","Email":"ar@lab.org"}}]"#;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_micro_opt(12, 30, 0, 250)
            .unwrap()
    }

    /// 12:30 Pacific standard time, as a UTC instant.
    fn noon_pacific() -> DateTime<Utc> {
        Utc.from_utc_datetime(&(noon() + chrono::Duration::hours(8)))
    }

    /// Serve exactly one canned HTTP response; returns the base URL and the
    /// raw request line the client sent.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut received = Vec::new();
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            let request = String::from_utf8_lossy(&received).to_string();
            request.lines().next().unwrap_or_default().to_string()
        });

        (format!("http://{addr}/"), server)
    }

    fn client_for(base_url: String) -> EsafClient {
        let config = ScheduleConfig {
            base_url,
            ..ScheduleConfig::default()
        };
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(config.request_timeout)
            .build()
            .unwrap();
        EsafClient::with_client(&config, http).unwrap()
    }

    #[test]
    fn test_first_pi_takes_entry_zero() {
        let body = r#"[
            {"PI": {"Name": "A. Researcher", "Email": "ar@lab.org"}, "Proposal": "ALS-1"},
            {"PI": {"Name": "B. Later", "Email": "bl@lab.org"}}
        ]"#;

        let pi = first_pi(body).unwrap().unwrap();
        assert_eq!(pi, PiRecord::new("A. Researcher", "ar@lab.org"));
    }

    #[test]
    fn test_first_pi_ignores_malformed_later_entries() {
        let body = r#"[{"PI": {"Name": "A", "Email": "a@lab.org"}}, {"nonsense": 1}]"#;
        assert_eq!(first_pi(body).unwrap().unwrap().email, "a@lab.org");
    }

    #[test]
    fn test_first_pi_empty_schedule() {
        assert!(first_pi("[]").unwrap().is_none());
    }

    #[test]
    fn test_first_pi_decode_errors() {
        assert!(matches!(first_pi("<html>"), Err(ScheduleError::Decode(_))));
        assert!(matches!(first_pi(r#"{"PI": {}}"#), Err(ScheduleError::Decode(_))));
        assert!(matches!(
            first_pi(r#"[{"Proposal": "ALS-1"}]"#),
            Err(ScheduleError::Decode(_))
        ));
        assert!(matches!(
            first_pi(r#"[{"PI": {"Name": "No Email"}}]"#),
            Err(ScheduleError::Decode(_))
        ));
    }

    #[test]
    fn test_missing_name_defaults_to_empty() {
        let pi = first_pi(r#"[{"PI": {"Email": "x@lab.org"}}]"#)
            .unwrap()
            .unwrap();
        assert_eq!(pi.name, "");
        assert_eq!(pi.email, "x@lab.org");
    }

    #[test]
    fn test_format_query_time() {
        assert_eq!(format_query_time(noon()), "2024-03-05 12:30:00.000250");
    }

    #[test]
    fn test_build_request_url() {
        let client = EsafClient::new(&ScheduleConfig::default()).unwrap();
        let request = client.build_request("7.0.1.1", noon_pacific()).unwrap();
        let url = request.url();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(url.host_str(), Some("experiment-staging.als.lbl.gov"));
        assert_eq!(url.path(), "/7.0.1.1");

        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["start"], "2024-03-05 12:30:00.000250");
        assert_eq!(query["stop"], query["start"]);
        assert_eq!(query["tz_id"], "America/Los_Angeles");
        assert_eq!(query["include_unscheduled"], "false");
        assert_eq!(query["api-key"], DEFAULT_API_KEY);

        // The zone separator travels percent-encoded.
        assert!(url.as_str().contains("tz_id=America%2FLos_Angeles"));
    }

    #[test]
    fn test_base_url_without_trailing_slash() {
        let config = ScheduleConfig {
            base_url: "https://schedule.example.org/api".to_string(),
            ..ScheduleConfig::default()
        };
        let client = EsafClient::new(&config).unwrap();
        let request = client.build_request("8.3.2", noon_pacific()).unwrap();
        assert_eq!(request.url().path(), "/api/8.3.2");
    }

    #[test]
    fn test_query_time_uses_schedule_zone() {
        let config = ScheduleConfig {
            tz_id: "UTC".to_string(),
            ..ScheduleConfig::default()
        };
        let client = EsafClient::new(&config).unwrap();
        let request = client.build_request("7.0.1.1", noon_pacific()).unwrap();

        let query: HashMap<String, String> = request.url().query_pairs().into_owned().collect();
        assert_eq!(query["start"], "2024-03-05 20:30:00.000250");
        assert_eq!(query["tz_id"], "UTC");
    }

    #[test]
    fn test_unknown_time_zone_rejected() {
        let config = ScheduleConfig {
            tz_id: "Pacific Time".to_string(),
            ..ScheduleConfig::default()
        };
        assert!(matches!(
            EsafClient::new(&config),
            Err(ScheduleError::TimeZone(ref tz)) if tz == "Pacific Time"
        ));
    }

    #[tokio::test]
    async fn test_current_pi_over_http() {
        let (base_url, server) = serve_once("200 OK", SCHEDULED).await;
        let client = client_for(base_url);

        let pi = client.current_pi("7.0.1.1", noon_pacific()).await.unwrap();
        assert_eq!(pi, Some(PiRecord::new("A. Researcher", "ar@lab.org")));

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /7.0.1.1?start="));
        assert!(request_line.contains("api-key="));
    }

    #[tokio::test]
    async fn test_empty_schedule_over_http() {
        let (base_url, server) = serve_once("200 OK", "[]").await;
        let client = client_for(base_url);

        assert_eq!(client.current_pi("7.0.1.1", noon_pacific()).await.unwrap(), None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_keeps_api_key_out_of_url() {
        let (base_url, server) = serve_once("503 Service Unavailable", "").await;
        let client = client_for(base_url);

        let err = client.current_pi("7.0.1.1", noon_pacific()).await.unwrap_err();
        match err {
            ScheduleError::Status { status, url } => {
                assert_eq!(status, 503);
                assert!(url.ends_with("/7.0.1.1"));
                assert!(!url.contains("api-key"));
                assert!(!url.contains(DEFAULT_API_KEY));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_html_body_is_decode_error() {
        let (base_url, server) = serve_once("200 OK", "<html>maintenance</html>").await;
        let client = client_for(base_url);

        assert!(matches!(
            client.current_pi("7.0.1.1", noon_pacific()).await,
            Err(ScheduleError::Decode(_))
        ));
        server.await.unwrap();
    }
}
