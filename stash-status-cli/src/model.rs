// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

/// Retry budget used when `--max-retry` isn't given.
pub const DEFAULT_MAX_RETRIES: u32 = 100;

/// Build state reported against a commit.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildState {
    /// The build is still running
    #[value(name = "INPROGRESS")]
    InProgress,

    /// The build finished and passed
    #[default]
    #[value(name = "SUCCESSFUL")]
    Successful,

    /// The build finished and failed
    #[value(name = "FAILED")]
    Failed,
}

impl BuildState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BuildState::InProgress => "INPROGRESS",
            BuildState::Successful => "SUCCESSFUL",
            BuildState::Failed => "FAILED",
        }
    }

    /// Interprets a status value found in a CI environment.
    ///
    /// Accepts the Bitbucket state names themselves as well as Azure DevOps `Agent.JobStatus` values.  Anything else is
    /// `None`, which leaves the state to be decided by the next source in line.
    #[must_use]
    pub fn from_ci_status(value: &str) -> Option<BuildState> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inprogress" | "in_progress" | "running" => Some(BuildState::InProgress),
            "successful" | "succeeded" | "succeededwithissues" => Some(BuildState::Successful),
            "failed" | "canceled" | "cancelled" => Some(BuildState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body of the build-status REST call.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BuildStatusPayload {
    pub state: BuildState,
    pub key: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Bitbucket password.  Only ever read from the environment; never printed by `Debug`, and its bytes are cleared when
/// it is dropped.
pub struct Password(String);

impl Password {
    #[must_use]
    pub fn new(value: String) -> Password {
        Password(value)
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        let mut bytes = std::mem::take(&mut self.0).into_bytes();
        bytes.fill(0);
        std::hint::black_box(&bytes);
    }
}

/// Everything needed to publish one build status; resolved once and then consumed by the publisher.
#[derive(Debug)]
pub struct PublishRequest {
    pub server_base_url: String,
    pub commit_hash: String,
    pub username: String,
    pub password: Password,
    pub max_retries: u32,
    pub payload: BuildStatusPayload,
}
