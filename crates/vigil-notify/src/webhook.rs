use crate::error::{NotifyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Maximum attempts per dispatch (1 initial + 2 retries).
const MAX_ATTEMPTS: u32 = 3;

/// Maximum stored length of an error message.
const MAX_ERROR_LENGTH: usize = 500;

/// Summary of a webhook dispatch attempt sequence.
///
/// One value describes the whole sequence: `status_code` and
/// `response_time_ms` reflect the final attempt, `retry_count` the number
/// of retries beyond the first attempt. `status_code == 0` means no HTTP
/// response was ever received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResult {
    pub status_code: u16,
    pub response_time_ms: u64,
    pub retry_count: u32,
    pub success: bool,
    pub error_message: Option<String>,
}

/// HTTP POST delivery with bounded retries and exponential backoff.
///
/// Connection failures and 5xx responses are retried up to [`MAX_ATTEMPTS`]
/// times with `100 * 2^attempt` ms between attempts; 4xx responses are a
/// terminal client error and are not retried. Each attempt is bounded by
/// the client's per-request timeout, so a hung target cannot stall the
/// dispatch of other rules.
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    /// Creates a client with the given per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotifyError::HttpError)?;
        Ok(Self { client })
    }

    /// POSTs `body` as JSON to `url` and returns one summarizing result.
    ///
    /// Never fails: every outcome, including exhausted retries, is folded
    /// into the returned [`WebhookResult`].
    pub async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: &serde_json::Value,
    ) -> WebhookResult {
        let mut retry_count = 0u32;
        let mut last_status = 0u16;
        let mut last_elapsed_ms = 0u64;
        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_ATTEMPTS {
            let mut request = self
                .client
                .post(url)
                .header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let started = Instant::now();
            match request.json(body).send().await {
                Ok(resp) => {
                    last_elapsed_ms = started.elapsed().as_millis() as u64;
                    let status = resp.status();
                    last_status = status.as_u16();

                    if status.is_success() {
                        return WebhookResult {
                            status_code: last_status,
                            response_time_ms: last_elapsed_ms,
                            retry_count,
                            success: true,
                            error_message: None,
                        };
                    }

                    let snippet = resp.text().await.unwrap_or_default();
                    last_error = Some(truncate(
                        &format!("HTTP {last_status}: {snippet}"),
                        MAX_ERROR_LENGTH,
                    ));

                    if status.is_client_error() {
                        // 4xx is terminal: retrying the same payload cannot help
                        tracing::warn!(url, status = last_status, "Webhook rejected by target");
                        break;
                    }

                    tracing::warn!(
                        url,
                        status = last_status,
                        attempt = attempt + 1,
                        "Webhook returned server error, retrying"
                    );
                }
                Err(e) => {
                    last_elapsed_ms = started.elapsed().as_millis() as u64;
                    last_status = 0;
                    last_error = Some(truncate(&e.to_string(), MAX_ERROR_LENGTH));
                    tracing::warn!(
                        url,
                        attempt = attempt + 1,
                        error = %e,
                        "Webhook send failed, retrying"
                    );
                }
            }

            if attempt + 1 < MAX_ATTEMPTS {
                retry_count += 1;
                tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
            }
        }

        if last_status == 0 {
            tracing::error!(url, retry_count, "Webhook unreachable after retries");
        }

        WebhookResult {
            status_code: last_status,
            response_time_ms: last_elapsed_ms,
            retry_count,
            success: false,
            error_message: last_error,
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    vigil_common::types::truncate_str(s, max_len)
}
