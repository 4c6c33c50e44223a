//! Shared HTTP plumbing

use std::time::Duration;

use reqwest::redirect::Policy;
use tracing::debug;
use url::Url;

use crate::{Error, Result};

pub const USER_AGENT: &str = concat!("spectree/", env!("CARGO_PKG_VERSION"));

const MAX_REDIRECTS: usize = 10;

/// Build the client used for every request in a run.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()?)
}

/// Fetch a text document from an `http(s)://` or `file://` location.
pub async fn fetch_text(
    client: &reqwest::Client,
    location: &str,
    timeout: Option<Duration>,
) -> Result<String> {
    let url = Url::parse(location)?;
    match url.scheme() {
        "http" | "https" => {
            debug!("GET {}", url);
            let mut request = client.get(url.clone());
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(Error::Status {
                    url: url.to_string(),
                    status: response.status(),
                });
            }
            Ok(response.text().await?)
        }
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| Error::Unsupported(location.to_string()))?;
            Ok(tokio::fs::read_to_string(path).await?)
        }
        _ => Err(Error::Unsupported(location.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("spectree/"));
    }

    #[tokio::test]
    async fn test_fetch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maintdb.txt");
        std::fs::write(&path, "foo alice\n").unwrap();
        let location = Url::from_file_path(&path).unwrap().to_string();

        let client = build_client(Duration::from_secs(5)).unwrap();
        let text = fetch_text(&client, &location, None).await.unwrap();
        assert_eq!(text, "foo alice\n");
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let client = build_client(Duration::from_secs(5)).unwrap();
        let err = fetch_text(&client, "gopher://example.org/", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        let err = fetch_text(&client, "not a url", None).await.unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }
}
