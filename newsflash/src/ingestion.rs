use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_USER_AGENT: &str = "Newsflash/0.1.0";

/// Build the HTTP client shared by every source adapter.
/// Timeout and user agent are fixed at construction; per-request
/// retry behavior lives in `fetch_page`.
pub fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(user_agent)
        .build()
        .context("failed to build reqwest client")
}

/// Fetches a page from the given URL and returns its body as text.
/// Transient failures (network errors, 5xx, 429) are retried with
/// exponential backoff; other client errors are treated as permanent.
pub async fn fetch_page(client: &Client, url: &str, max_attempts: u32) -> Result<String> {
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let backoff = Duration::from_secs(2u64.pow(attempt - 2)); // 1s, 2s, 4s...
            tracing::info!("Retrying page fetch for {} (attempt {}/{}) after {:?}...", url, attempt, max_attempts, backoff);
            tokio::time::sleep(backoff).await;
        }

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let body = response.text().await.context("failed to read response body")?;
                    return Ok(body);
                } else if status.is_server_error() { // 5xx
                    last_error = Some(anyhow::anyhow!("server error: {}", status));
                    continue; // Retry
                } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    last_error = Some(anyhow::anyhow!("rate limited: {}", status));
                    continue; // Retry
                } else {
                    // Client error (4xx) - likely permanent, don't retry
                    return Err(anyhow::anyhow!("page fetch failed with status: {}", status));
                }
            }
            Err(e) => {
                // Network error - retry
                last_error = Some(anyhow::Error::new(e).context("network error during fetch"));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_page_returns_body_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("<html><body>hello</body></html>")
            .create_async()
            .await;

        let client = build_client(5, DEFAULT_USER_AGENT).expect("client");
        let body = fetch_page(&client, &format!("{}/page", server.url()), 3)
            .await
            .expect("fetch");
        assert!(body.contains("hello"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_page_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let client = build_client(5, DEFAULT_USER_AGENT).expect("client");
        let err = fetch_page(&client, &format!("{}/flaky", server.url()), 3)
            .await
            .expect_err("persistent 500 should exhaust retries");
        assert!(err.to_string().contains("server error"));
        // All three attempts reached the server
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_page_does_not_retry_client_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = build_client(5, DEFAULT_USER_AGENT).expect("client");
        let err = fetch_page(&client, &format!("{}/missing", server.url()), 3)
            .await
            .expect_err("404 should be permanent");
        assert!(err.to_string().contains("404"));
        mock.assert_async().await;
    }
}
