//! Bearer tokens for Google Cloud APIs.

use std::process::Stdio;
use std::time::{Duration, Instant};

use pulse_core::{PulseError, Result};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

/// Environment variable holding a pre-issued access token.
pub const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// How long a token fetched from `gcloud` is reused. Access tokens live for an
/// hour; refreshing well before that keeps long cycles safe.
pub const GCLOUD_TOKEN_TTL: Duration = Duration::from_secs(300);

/// Where tokens come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// A fixed token.
    Static(String),
    /// `gcloud auth print-access-token`.
    Gcloud,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    fetched: Instant,
}

/// Supplies and memoizes bearer tokens.
#[derive(Debug)]
pub struct TokenProvider {
    source: TokenSource,
    ttl: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    /// Creates a provider for the given source.
    #[must_use]
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            ttl: GCLOUD_TOKEN_TTL,
            cached: Mutex::new(None),
        }
    }

    /// Uses a fixed token.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self::new(TokenSource::Static(token.into()))
    }

    /// Uses [`TOKEN_ENV`] when set, otherwise the `gcloud` CLI.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Self::fixed(token.trim()),
            _ => Self::new(TokenSource::Gcloud),
        }
    }

    /// Sets how long a fetched token is reused.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The configured source.
    #[must_use]
    pub fn source(&self) -> &TokenSource {
        &self.source
    }

    /// Returns a valid access token.
    pub async fn token(&self) -> Result<String> {
        match &self.source {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Gcloud => {
                let mut cached = self.cached.lock().await;
                if let Some(token) = cached.as_ref().filter(|t| t.fetched.elapsed() < self.ttl) {
                    return Ok(token.value.clone());
                }
                let value = print_access_token().await?;
                *cached = Some(CachedToken {
                    value: value.clone(),
                    fetched: Instant::now(),
                });
                Ok(value)
            }
        }
    }
}

async fn print_access_token() -> Result<String> {
    debug!("fetching access token from gcloud");
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| PulseError::Credentials {
            target: "gcloud".to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PulseError::Credentials {
            target: "gcloud".to_string(),
            reason: stderr.trim().to_string(),
        });
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(PulseError::Credentials {
            target: "gcloud".to_string(),
            reason: "empty access token".to_string(),
        });
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned_as_is() {
        let provider = TokenProvider::fixed("ya29.test");
        assert_eq!(provider.token().await.unwrap(), "ya29.test");
        assert_eq!(provider.source(), &TokenSource::Static("ya29.test".to_string()));
    }

    #[test]
    fn ttl_is_configurable() {
        let provider = TokenProvider::new(TokenSource::Gcloud).with_ttl(Duration::from_secs(1));
        assert_eq!(provider.ttl, Duration::from_secs(1));
        assert_eq!(provider.source(), &TokenSource::Gcloud);
    }
}
