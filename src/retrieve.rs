use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::CuratorError;
use crate::reconcile::RetryPolicy;

/// Four attempts per request, waiting 200 ms, 400 ms and 600 ms in between.
const REQUEST_RETRY: RetryPolicy = RetryPolicy {
    max_rounds: Some(4),
    backoff: Duration::from_millis(200),
};

/// URL-to-file retrieval.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, url: &str, destination: &Path) -> Result<u64, CuratorError>;
}

#[derive(Clone)]
pub struct HttpRetriever {
    client: Client,
    api_key: Option<String>,
}

impl HttpRetriever {
    pub fn new() -> Result<Self, CuratorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gbcur/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CuratorError::FetchHttp(err.to_string()))?,
        );

        let api_key = std::env::var("NCBI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| CuratorError::FetchHttp(err.to_string()))?;

        Ok(Self { client, api_key })
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<u64, CuratorError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "retrieval failed".to_string());
            return Err(CuratorError::FetchStatus { status, message });
        }
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        }
        let mut file =
            File::create(destination).map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| CuratorError::Filesystem(err.to_string()))
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, CuratorError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        let mut attempt = 1u32;
        loop {
            match make_req().send() {
                Ok(resp) if is_retryable_status(resp.status().as_u16()) => {
                    if REQUEST_RETRY.exhausted(attempt) {
                        return Ok(resp);
                    }
                    tracing::debug!(status = resp.status().as_u16(), attempt, "retrying request");
                }
                Ok(resp) => return Ok(resp),
                Err(err) if is_retryable_error(&err) && !REQUEST_RETRY.exhausted(attempt) => {
                    tracing::debug!(error = %err, attempt, "retrying request");
                }
                Err(err) => return Err(CuratorError::FetchHttp(err.to_string())),
            }
            thread::sleep(REQUEST_RETRY.delay_after(attempt));
            attempt += 1;
        }
    }
}

impl Retriever for HttpRetriever {
    fn retrieve(&self, url: &str, destination: &Path) -> Result<u64, CuratorError> {
        let response = self.send_with_retries(|| {
            let request = self.client.get(url);
            match (&self.api_key, is_eutils(url)) {
                (Some(key), true) => request.query(&[("api_key", key.as_str())]),
                _ => request,
            }
        })?;
        self.write_response_to_file(response, destination)
    }
}

fn is_eutils(url: &str) -> bool {
    url.contains("/entrez/eutils/")
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn request_retry_backs_off_linearly() {
        assert!(!REQUEST_RETRY.exhausted(3));
        assert!(REQUEST_RETRY.exhausted(4));
        assert_eq!(REQUEST_RETRY.delay_after(3), Duration::from_millis(600));
    }

    #[test]
    fn api_key_only_for_eutils() {
        assert!(is_eutils(
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi?db=nuccore&id=NC_1"
        ));
        assert!(!is_eutils(
            "https://ftp.ncbi.nlm.nih.gov/genomes/GENOME_REPORTS/viruses.txt"
        ));
    }
}
