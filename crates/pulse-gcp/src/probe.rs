//! Synthetic HTTP probes.

use std::time::Duration;

use pulse_core::source::{HttpProber, SourceFuture};
use pulse_core::{PulseError, Result};

/// Default bound on a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Redirects followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// Issues unauthenticated GETs and reports the final status code.
#[derive(Debug, Clone)]
pub struct ReqwestProber {
    http: reqwest::Client,
}

impl ReqwestProber {
    /// Creates a prober bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| PulseError::request("build probe client", e))?;
        Ok(Self { http })
    }
}

impl HttpProber for ReqwestProber {
    fn probe<'a>(&'a self, url: &'a str) -> SourceFuture<'a, u16> {
        Box::pin(async move {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| PulseError::request(format!("GET {url}"), e))?;
            Ok(response.status().as_u16())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_is_a_request_error() {
        let prober = ReqwestProber::new(DEFAULT_PROBE_TIMEOUT).unwrap();
        let err = prober.probe("not a url").await.unwrap_err();
        assert!(err.to_string().starts_with("GET not a url failed"));
    }
}
