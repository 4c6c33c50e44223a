//! HTTP(S) reachability probing

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use spectree_core::{Probe, UrlProber};
use tracing::debug;
use url::Url;

use crate::error::error_chain;
use crate::ftp::FtpProber;

pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn request(&self, method: Method, url: &Url) -> Result<StatusCode, reqwest::Error> {
        let mut request = self.client.request(method.clone(), url.clone());
        if method == Method::GET {
            request = request.header(header::RANGE, "bytes=0-0");
        }
        let response = request.send().await?;
        Ok(response.status())
    }
}

#[async_trait]
impl UrlProber for HttpProber {
    async fn probe(&self, url: &Url) -> Probe {
        let status = match self.request(Method::HEAD, url).await {
            Ok(status)
                if status == StatusCode::METHOD_NOT_ALLOWED
                    || status == StatusCode::NOT_IMPLEMENTED =>
            {
                debug!("{} refused HEAD, retrying with GET", url);
                self.request(Method::GET, url).await
            }
            other => other,
        };
        match status {
            Ok(status) => classify_status(status),
            Err(e) => classify_error(&e),
        }
    }
}

/// Sends each URL to the prober for its scheme.
pub struct NetworkProber {
    http: HttpProber,
    ftp: FtpProber,
}

impl NetworkProber {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            http: HttpProber::new(client),
            ftp: FtpProber::new(timeout),
        }
    }
}

#[async_trait]
impl UrlProber for NetworkProber {
    async fn probe(&self, url: &Url) -> Probe {
        if self.ftp.supports_scheme(url.scheme()) {
            self.ftp.probe(url).await
        } else {
            self.http.probe(url).await
        }
    }

    fn supports_scheme(&self, scheme: &str) -> bool {
        self.http.supports_scheme(scheme) || self.ftp.supports_scheme(scheme)
    }
}

/// Map a final response status to a probe answer.
pub fn classify_status(status: StatusCode) -> Probe {
    let code = status.as_u16();
    if status.is_success() || status.is_redirection() {
        return Probe::ok();
    }
    let detail = describe(status);
    match code {
        401..=403 => Probe::unreachable(format!("{} (authentication required)", detail)),
        423 | 429 => Probe::unreachable(format!("{} (rate limited)", detail)).transient(),
        400..=499 => Probe::unreachable(detail),
        _ => Probe::unreachable(detail).transient(),
    }
}

/// Map a transport failure to a probe answer.
///
/// The detail is a short stable class; the full error chain goes into the
/// note so the report stays comparable between runs.
pub fn classify_error(err: &reqwest::Error) -> Probe {
    let chain = error_chain(err);
    if err.is_timeout() {
        return Probe::timeout("request timed out").with_note(chain);
    }
    let class = failure_class(&chain, err.is_redirect(), err.is_connect());
    Probe::unreachable(class).with_note(chain)
}

/// Short name for a transport failure.
pub fn failure_class(chain: &str, redirect: bool, connect: bool) -> &'static str {
    let lower = chain.to_ascii_lowercase();
    if redirect {
        "redirect"
    } else if lower.contains("dns error") || lower.contains("failed to lookup") {
        "dns"
    } else if ["certificate", "tls", "handshake"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        "tls"
    } else if connect {
        "connect"
    } else {
        "request"
    }
}

fn describe(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectree_core::ProbeOutcome;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK), Probe::ok());
        assert_eq!(classify_status(StatusCode::PARTIAL_CONTENT), Probe::ok());
        assert_eq!(classify_status(StatusCode::NOT_MODIFIED), Probe::ok());

        let p = classify_status(StatusCode::NOT_FOUND);
        assert_eq!(p.outcome, ProbeOutcome::Unreachable);
        assert_eq!(p.detail.as_deref(), Some("HTTP 404 Not Found"));
        assert!(!p.transient);

        let p = classify_status(StatusCode::FORBIDDEN);
        assert_eq!(
            p.detail.as_deref(),
            Some("HTTP 403 Forbidden (authentication required)")
        );

        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS).transient);
        assert!(classify_status(StatusCode::LOCKED).transient);
        assert!(classify_status(StatusCode::BAD_GATEWAY).transient);
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE).outcome,
            ProbeOutcome::Unreachable
        );
    }

    #[test]
    fn test_failure_class() {
        assert_eq!(
            failure_class("error sending request: too many redirects", true, false),
            "redirect"
        );
        assert_eq!(
            failure_class(
                "error sending request: client error (Connect): dns error: failed to lookup address information",
                false,
                true
            ),
            "dns"
        );
        assert_eq!(
            failure_class("client error (Connect): invalid peer certificate: Expired", false, true),
            "tls"
        );
        assert_eq!(
            failure_class("client error (Connect): tcp connect error: Connection refused", false, true),
            "connect"
        );
        assert_eq!(failure_class("error decoding response body", false, false), "request");
    }

    /// Serve one canned status per connection and record request lines.
    async fn serve(statuses: Vec<u16>) -> (Url, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap();
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                log.lock()
                    .unwrap()
                    .push(request.lines().next().unwrap_or_default().to_string());
                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        let url = Url::parse(&format!("http://{}/pkg/foo-1.2.tar.gz", addr)).unwrap();
        (url, seen)
    }

    fn prober() -> HttpProber {
        HttpProber::new(crate::http::build_client(Duration::from_secs(5)).unwrap())
    }

    #[tokio::test]
    async fn test_probe_head_ok() {
        let (url, seen) = serve(vec![200]).await;
        assert_eq!(prober().probe(&url).await, Probe::ok());
        assert_eq!(seen.lock().unwrap()[0], "HEAD /pkg/foo-1.2.tar.gz HTTP/1.1");
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_get() {
        let (url, seen) = serve(vec![405, 404]).await;
        let probe = prober().probe(&url).await;
        assert_eq!(probe.outcome, ProbeOutcome::Unreachable);
        assert_eq!(probe.detail.as_deref(), Some("HTTP 404 Not Found"));
        let seen = seen.lock().unwrap();
        assert!(seen[0].starts_with("HEAD "));
        assert!(seen[1].starts_with("GET "));
    }

    #[tokio::test]
    async fn test_network_prober_dispatch() {
        let prober = NetworkProber::new(
            crate::http::build_client(Duration::from_secs(5)).unwrap(),
            Duration::from_secs(5),
        );
        assert!(prober.supports_scheme("http"));
        assert!(prober.supports_scheme("https"));
        assert!(prober.supports_scheme("ftp"));
        assert!(!prober.supports_scheme("ftps"));
        assert!(!prober.supports_scheme("rsync"));

        let (url, seen) = serve(vec![200]).await;
        assert_eq!(prober.probe(&url).await, Probe::ok());
        assert_eq!(seen.lock().unwrap().len(), 1);

        let addr = crate::ftp::tests::serve(crate::ftp::tests::FakeSite {
            dirs: vec!["/pub/".to_string()],
            ..Default::default()
        });
        let url = Url::parse(&format!("ftp://{}/pub/", addr)).unwrap();
        assert_eq!(prober.probe(&url).await, Probe::ok());
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{}/", addr)).unwrap();
        let probe = prober().probe(&url).await;
        assert_eq!(probe.outcome, ProbeOutcome::Unreachable);
        assert_eq!(probe.detail.as_deref(), Some("connect"));
        assert!(!probe.transient);
        assert!(probe.note.unwrap().contains("error sending request"));
    }
}
