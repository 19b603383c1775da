// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Fields that must be resolved before anything is sent, in the order they're checked.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RequiredField {
    BitbucketServer,
    CommitHash,
    Username,
    BuildKey,
    BuildUrl,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequiredField::BitbucketServer => "Bitbucket base URL",
            RequiredField::CommitHash => "git commit hash",
            RequiredField::Username => "bitbucket username",
            RequiredField::BuildKey => "build configuration ID",
            RequiredField::BuildUrl => "a link to the build details",
        })
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("I need {0} to publish the status")]
    MissingField(RequiredField),

    #[error("Bitbucket server `{server}` is not a usable base URL: {reason}")]
    InvalidServerUrl { server: String, reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("I need BITBUCKET_PASSWORD environment variable to publish the status")]
    MissingPassword,

    #[error("Cannot authorize the request. Provide correct Bitbucket credential")]
    Rejected,
}

/// Failure of a single attempt that may succeed if tried again.
#[derive(Error, Debug)]
pub enum TransientPublishError {
    #[error("response status code {status}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("couldn't publish the status after {attempts} attempt(s); {last_error}")]
    RetriesExhausted {
        attempts: u64,
        last_error: TransientPublishError,
    },

    #[error("unable to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl From<ResolveError> for PublishError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::Configuration(e) => PublishError::Configuration(e),
            ResolveError::Authorization(e) => PublishError::Authorization(e),
        }
    }
}
