// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use url::Url;

use crate::{
    errors::{AuthorizationError, ConfigurationError, PublishError, TransientPublishError},
    model::PublishRequest,
};

mod retry;

pub use retry::RetryPolicy;

/// Publishes build statuses to the Bitbucket Server build-status REST API.
pub struct StatusPublisher {
    client: Client,
    retry: RetryPolicy,
}

#[derive(Debug, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Number of POSTs made, including the one that succeeded.
    pub attempts: u64,
    pub status: StatusCode,
}

enum AttemptFailure {
    Unauthorized,
    Transient(TransientPublishError),
}

impl StatusPublisher {
    pub fn new(retry: RetryPolicy) -> Result<StatusPublisher, PublishError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(format!("stash-status ({})", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(PublishError::Client)?;
        Ok(StatusPublisher { client, retry })
    }

    /// POSTs the request's build status, retrying transient failures until `max_retries` retries have been used.
    ///
    /// A 2xx response ends with success.  A 401 ends immediately, since the same credential will be rejected again.
    /// Other statuses and transport errors are retried with backoff; when the budget runs out the last failure is
    /// returned.  The request, including its password, is dropped when this returns.
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome, PublishError> {
        let url = endpoint(&request.server_base_url, &request.commit_hash)?;
        debug!(
            "publishing {} for build {} to {url}",
            request.payload.state, request.payload.key
        );

        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            let failure = match self.attempt(&url, &request).await {
                Ok(status) => return Ok(PublishOutcome { attempts, status }),
                Err(AttemptFailure::Unauthorized) => {
                    return Err(AuthorizationError::Rejected.into());
                }
                Err(AttemptFailure::Transient(failure)) => failure,
            };

            if attempts > u64::from(request.max_retries) {
                return Err(PublishError::RetriesExhausted {
                    attempts,
                    last_error: failure,
                });
            }

            if let TransientPublishError::UnexpectedStatus { body, .. } = &failure {
                debug!("response body: {body}");
            }
            let delay = self.retry.delay_for_retry(attempts - 1);
            warn!(
                "{failure}; retrying in {:.1} seconds (retry {attempts} of {})",
                delay.as_secs_f64(),
                request.max_retries
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        request: &PublishRequest,
    ) -> Result<StatusCode, AttemptFailure> {
        debug!("HTTP request POST {url}");
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header("X-Atlassian-Token", "no-check")
            .basic_auth(&request.username, Some(request.password.expose()))
            .json(&request.payload)
            .send()
            .await
            .map_err(|e| AttemptFailure::Transient(e.into()))?;

        debug!("HTTP response: {response:?}");
        let status = response.status();
        // Read the whole body on every path, so it's available for reporting and the connection is released.
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<response body could not be read: {e}>"));

        if status.is_success() {
            Ok(status)
        } else if status == StatusCode::UNAUTHORIZED {
            Err(AttemptFailure::Unauthorized)
        } else {
            Err(AttemptFailure::Transient(
                TransientPublishError::UnexpectedStatus { status, body },
            ))
        }
    }
}

/// Build-status URL for a commit.  `server` is normally a bare host (optionally with a context path) and is reached
/// over https; an explicit `http://` or `https://` prefix is kept as given.
pub fn endpoint(server: &str, commit_hash: &str) -> Result<Url, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidServerUrl {
        server: String::from(server),
        reason,
    };

    let lower = server.to_ascii_lowercase();
    let base = if lower.starts_with("https://") || lower.starts_with("http://") {
        String::from(server)
    } else {
        format!("https://{server}")
    };

    let mut url = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid(String::from("cannot append path segments")))?
        .pop_if_empty()
        .extend(["rest", "build-status", "latest", "commits", commit_hash]);
    Ok(url)
}
