//! URL reachability probing

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::model::ProbeOutcome;

/// Answer from a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub outcome: ProbeOutcome,
    pub detail: Option<String>,
    /// Worth asking again later (rate limiting, server errors, timeouts)
    pub transient: bool,
    /// Full explanation for the diagnostic stream; `detail` stays short
    pub note: Option<String>,
}

impl Probe {
    pub fn ok() -> Self {
        Self {
            outcome: ProbeOutcome::Ok,
            detail: None,
            transient: false,
            note: None,
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self {
            outcome: ProbeOutcome::Unreachable,
            detail: Some(detail.into()),
            transient: false,
            note: None,
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self {
            outcome: ProbeOutcome::Timeout,
            detail: Some(detail.into()),
            transient: true,
            note: None,
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self {
            outcome: ProbeOutcome::Malformed,
            detail: Some(reason.into()),
            transient: false,
            note: None,
        }
    }

    pub fn unsupported(scheme: &str) -> Self {
        Self {
            outcome: ProbeOutcome::Unsupported,
            detail: Some(format!("{} URLs are not checked", scheme)),
            transient: false,
            note: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            outcome: ProbeOutcome::Skipped,
            detail: None,
            transient: false,
            note: None,
        }
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[async_trait]
pub trait UrlProber: Send + Sync {
    /// Check that `url` answers. Only called for supported schemes.
    async fn probe(&self, url: &Url) -> Probe;

    fn supports_scheme(&self, scheme: &str) -> bool {
        matches!(scheme, "http" | "https")
    }
}

/// Parse a declared URL, rejecting anything without a scheme and host.
pub fn parse_probe_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() || url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".to_string());
    }
    Ok(url)
}

/// Classify and, where possible, probe one URL. Malformed and unsupported
/// URLs never reach the prober.
pub async fn check_url(prober: &dyn UrlProber, raw: &str, recheck: Option<Duration>) -> Probe {
    let url = match parse_probe_url(raw) {
        Ok(url) => url,
        Err(reason) => return Probe::malformed(reason),
    };
    if !prober.supports_scheme(url.scheme()) {
        return Probe::unsupported(url.scheme());
    }

    let mut probe = prober.probe(&url).await;
    if probe.transient {
        if let Some(delay) = recheck {
            debug!("Rechecking {} after {:?}", url, probe.detail);
            tokio::time::sleep(delay).await;
            probe = prober.probe(&url).await;
        }
    }
    probe
}

/// Classification without any network access: malformed URLs are still
/// reported, everything else is marked skipped.
pub fn classify_unchecked(raw: &str) -> Probe {
    match parse_probe_url(raw) {
        Ok(_) => Probe::skipped(),
        Err(reason) => Probe::malformed(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        answers: Mutex<Vec<Probe>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(mut answers: Vec<Probe>) -> Self {
            answers.reverse();
            Self {
                answers: Mutex::new(answers),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl UrlProber for Scripted {
        async fn probe(&self, url: &Url) -> Probe {
            self.calls.lock().unwrap().push(url.to_string());
            self.answers.lock().unwrap().pop().unwrap_or_else(Probe::ok)
        }
    }

    #[test]
    fn test_parse_probe_url() {
        assert!(parse_probe_url("https://example.org/foo").is_ok());
        assert!(parse_probe_url("ftp://ftp.example.org/pub/").is_ok());
        assert!(parse_probe_url("ftp//bad").is_err());
        assert!(parse_probe_url("foo-1.0.tar.gz").is_err());
        assert!(parse_probe_url("http://").is_err());
        assert!(parse_probe_url("mailto:someone@example.org").is_err());
    }

    #[tokio::test]
    async fn test_malformed_and_unsupported_skip_prober() {
        let prober = Scripted::new(vec![]);
        let probe = check_url(&prober, "ftp//bad", None).await;
        assert_eq!(probe.outcome, ProbeOutcome::Malformed);
        assert!(probe.detail.is_some());

        let probe = check_url(&prober, "gopher://gopher.example.org/1/x", None).await;
        assert_eq!(probe.outcome, ProbeOutcome::Unsupported);
        assert_eq!(probe.detail.as_deref(), Some("gopher URLs are not checked"));
        assert_eq!(prober.calls(), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_is_rechecked() {
        let prober = Scripted::new(vec![
            Probe::unreachable("HTTP 503 Service Unavailable").transient(),
            Probe::ok(),
        ]);
        let probe = check_url(&prober, "https://example.org/", Some(Duration::from_millis(1))).await;
        assert_eq!(probe.outcome, ProbeOutcome::Ok);
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_recheck() {
        let prober = Scripted::new(vec![Probe::timeout("timed out"), Probe::ok()]);
        let probe = check_url(&prober, "https://example.org/", None).await;
        assert_eq!(probe.outcome, ProbeOutcome::Timeout);
        assert_eq!(probe.detail.as_deref(), Some("timed out"));
        assert_eq!(prober.calls(), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_rechecked() {
        let prober = Scripted::new(vec![Probe::unreachable("HTTP 404 Not Found")]);
        let probe =
            check_url(&prober, "http://example.org/gone", Some(Duration::from_millis(1))).await;
        assert_eq!(probe.outcome, ProbeOutcome::Unreachable);
        assert_eq!(prober.calls(), 1);
    }

    #[test]
    fn test_classify_unchecked() {
        assert_eq!(classify_unchecked("http://example.org/x.tar.gz"), Probe::skipped());
        assert_eq!(
            classify_unchecked("ftp//bad").outcome,
            ProbeOutcome::Malformed
        );
    }
}
