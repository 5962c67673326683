//! Authenticated JSON client for Google Cloud REST APIs.

use std::sync::Arc;
use std::time::Duration;

use pulse_core::{PulseError, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::TokenProvider;

/// Default request timeout for API calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Base URLs of the APIs the adapters call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Kubernetes Engine API.
    pub container: String,
    /// Compute Engine API.
    pub compute: String,
    /// Pub/Sub API.
    pub pubsub: String,
    /// Spanner API.
    pub spanner: String,
    /// Cloud Monitoring API.
    pub monitoring: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            container: "https://container.googleapis.com/v1".to_string(),
            compute: "https://compute.googleapis.com/compute/v1".to_string(),
            pubsub: "https://pubsub.googleapis.com/v1".to_string(),
            spanner: "https://spanner.googleapis.com/v1".to_string(),
            monitoring: "https://monitoring.googleapis.com/v3".to_string(),
        }
    }
}

/// A page of a list response.
pub trait Page: DeserializeOwned {
    /// Item type.
    type Item;

    /// Splits the page into items and the next page token.
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

/// JSON-over-HTTPS client with bearer authentication.
#[derive(Debug, Clone)]
pub struct GcpClient {
    http: reqwest::Client,
    tokens: Arc<TokenProvider>,
    endpoints: Endpoints,
}

impl GcpClient {
    /// Creates a client with the default endpoints and request timeout.
    pub fn new(tokens: Arc<TokenProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PulseError::request("build http client", e))?;
        Ok(Self {
            http,
            tokens,
            endpoints: Endpoints::default(),
        })
    }

    /// Overrides the API base URLs.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// API base URLs.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// The token provider.
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    /// GETs `url` and decodes the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.tokens.token().await?;
        debug!(operation, url, "api request");
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| PulseError::request(operation, e))?;
        decode_response(operation, response).await
    }

    /// GETs every page of a list endpoint, following `nextPageToken`.
    pub async fn list_all<P: Page>(
        &self,
        operation: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<P::Item>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = query.to_vec();
            if let Some(token) = page_token.take() {
                params.push(("pageToken", token));
            }
            let page: P = self.get_json(operation, url, &params).await?;
            let (page_items, next) = page.into_parts();
            items.extend(page_items);
            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }
    }
}

/// Maps a response to a decoded body or an API error.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    operation: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PulseError::request(operation, e))?;
    if !status.is_success() {
        return Err(PulseError::Api {
            operation: operation.to_string(),
            status: status.as_u16(),
            message: truncate(&body),
        });
    }
    serde_json::from_str(&body).map_err(|e| PulseError::decode(operation, e))
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.trim().to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", body[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.monitoring, "https://monitoring.googleapis.com/v3");
        assert!(endpoints.compute.ends_with("/compute/v1"));
    }

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate("  denied \n"), "denied");
        let long = "x".repeat(2000);
        let cut = truncate(&long);
        assert_eq!(cut.len(), MAX_ERROR_BODY + 3);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(400);
        assert!(truncate(&long).ends_with("..."));
    }

    #[test]
    fn client_builds_with_static_token() {
        let client = GcpClient::new(Arc::new(TokenProvider::fixed("t"))).unwrap();
        assert_eq!(client.endpoints(), &Endpoints::default());
    }
}
