// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use log::{debug, info};

use crate::{
    cmd::cli::PublishOptions,
    errors::{AuthorizationError, ConfigurationError, RequiredField, ResolveError},
    model::{BuildStatusPayload, DEFAULT_MAX_RETRIES, Password, PublishRequest},
};

pub mod ci;
pub mod environment;

pub use ci::{CiProvider, CiValues};
pub use environment::{EnvironmentSource, ProcessEnvironment};

pub const USERNAME_VAR: &str = "BITBUCKET_USERNAME";
pub const PASSWORD_VAR: &str = "BITBUCKET_PASSWORD";

/// Merges command-line options, values from a recognized CI environment, and defaults into a `PublishRequest`.
///
/// For every field an explicit option wins over the CI environment, which wins over the default.  Required fields are
/// checked in a fixed order (server, commit hash, username, build key, build URL) and the first one missing is
/// reported; the password is checked after those.
pub fn resolve(
    options: &PublishOptions,
    env: &impl EnvironmentSource,
) -> Result<PublishRequest, ResolveError> {
    let ci = CiValues::collect(env);
    if ci.provider == CiProvider::Unknown {
        debug!("no CI provider recognized; relying on command-line options");
    } else {
        info!("recognized CI provider: {}", ci.provider);
    }

    let server_base_url = require(
        option(options.bitbucket_server.as_deref()),
        RequiredField::BitbucketServer,
    )?;
    let commit_hash = require(
        option(options.commit_hash.as_deref()).or(ci.commit_hash),
        RequiredField::CommitHash,
    )?;
    let username = require(
        option(options.username.as_deref()).or_else(|| env.var(USERNAME_VAR)),
        RequiredField::Username,
    )?;
    let key = require(
        option(options.configuration.as_deref()).or(ci.build_key),
        RequiredField::BuildKey,
    )?;
    let url = require(
        option(options.build_url.as_deref()).or(ci.build_url),
        RequiredField::BuildUrl,
    )?;

    let password = env
        .var(PASSWORD_VAR)
        .map(Password::new)
        .ok_or(AuthorizationError::MissingPassword)?;

    let payload = BuildStatusPayload {
        state: options.status.or(ci.state).unwrap_or_default(),
        key,
        url,
        name: option(options.build_name.as_deref()).or(ci.build_name),
        description: option(options.description.as_deref()).or(ci.description),
    };

    Ok(PublishRequest {
        server_base_url,
        commit_hash,
        username,
        password,
        max_retries: options.max_retry.unwrap_or(DEFAULT_MAX_RETRIES),
        payload,
    })
}

fn option(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(String::from)
}

fn require(value: Option<String>, field: RequiredField) -> Result<String, ConfigurationError> {
    value.ok_or(ConfigurationError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::{
        cmd::cli::PublishOptions,
        errors::{AuthorizationError, ConfigurationError, RequiredField, ResolveError},
        model::BuildState,
    };

    use super::resolve;

    fn complete_options() -> PublishOptions {
        PublishOptions {
            bitbucket_server: Some(String::from("git.example.com")),
            commit_hash: Some(String::from("abc123")),
            configuration: Some(String::from("ci-job")),
            username: Some(String::from("bot")),
            build_url: Some(String::from("http://ci/42")),
            ..PublishOptions::default()
        }
    }

    fn password_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([("BITBUCKET_PASSWORD", "secret")])
    }

    fn assert_missing(result: Result<impl std::fmt::Debug, ResolveError>, field: RequiredField) {
        match result {
            Err(ResolveError::Configuration(ConfigurationError::MissingField(missing))) => {
                assert_eq!(missing, field);
            }
            other => panic!("expected missing {field:?}, got {other:?}"),
        }
    }

    #[test]
    fn complete_options_resolve_with_defaults() {
        let request = resolve(&complete_options(), &password_env()).unwrap();
        assert_eq!(request.server_base_url, "git.example.com");
        assert_eq!(request.commit_hash, "abc123");
        assert_eq!(request.username, "bot");
        assert_eq!(request.password.expose(), "secret");
        assert_eq!(request.max_retries, 100);
        assert_eq!(request.payload.state, BuildState::Successful);
        assert_eq!(request.payload.key, "ci-job");
        assert_eq!(request.payload.url, "http://ci/42");
        assert_eq!(request.payload.name, None);
        assert_eq!(request.payload.description, None);
    }

    #[test]
    fn each_missing_required_field_is_named() {
        let cases: [(fn(&mut PublishOptions), RequiredField); 5] = [
            (|o: &mut PublishOptions| o.bitbucket_server = None, RequiredField::BitbucketServer),
            (|o: &mut PublishOptions| o.commit_hash = None, RequiredField::CommitHash),
            (|o: &mut PublishOptions| o.username = None, RequiredField::Username),
            (|o: &mut PublishOptions| o.configuration = None, RequiredField::BuildKey),
            (|o: &mut PublishOptions| o.build_url = None, RequiredField::BuildUrl),
        ];
        for (remove, field) in cases {
            let mut options = complete_options();
            remove(&mut options);
            assert_missing(resolve(&options, &password_env()), field);
        }
    }

    #[test]
    fn missing_fields_reported_in_fixed_order() {
        assert_missing(
            resolve(&PublishOptions::default(), &password_env()),
            RequiredField::BitbucketServer,
        );

        let options = PublishOptions {
            bitbucket_server: Some(String::from("git.example.com")),
            configuration: Some(String::from("ci-job")),
            ..PublishOptions::default()
        };
        assert_missing(resolve(&options, &password_env()), RequiredField::CommitHash);
    }

    #[test]
    fn empty_option_counts_as_missing() {
        let mut options = complete_options();
        options.commit_hash = Some(String::new());
        assert_missing(resolve(&options, &password_env()), RequiredField::CommitHash);
    }

    #[test]
    fn missing_password_after_required_fields() {
        let env: HashMap<&str, &str> = HashMap::new();
        match resolve(&complete_options(), &env) {
            Err(ResolveError::Authorization(AuthorizationError::MissingPassword)) => {}
            other => panic!("expected missing password, got {other:?}"),
        }

        // a missing required field is reported before the missing password
        let mut options = complete_options();
        options.build_url = None;
        assert_missing(resolve(&options, &env), RequiredField::BuildUrl);
    }

    #[test]
    fn username_falls_back_to_environment() {
        let mut options = complete_options();
        options.username = None;
        let env = HashMap::from([
            ("BITBUCKET_PASSWORD", "secret"),
            ("BITBUCKET_USERNAME", "env-bot"),
        ]);
        assert_eq!(resolve(&options, &env).unwrap().username, "env-bot");

        options.username = Some(String::from("flag-bot"));
        assert_eq!(resolve(&options, &env).unwrap().username, "flag-bot");
    }

    #[test]
    fn explicit_options_override_defaults() {
        let mut options = complete_options();
        options.status = Some(BuildState::Failed);
        options.max_retry = Some(3);
        options.build_name = Some(String::from("ci-job #42"));
        options.description = Some(String::from("2 tests failed"));
        let request = resolve(&options, &password_env()).unwrap();
        assert_eq!(request.payload.state, BuildState::Failed);
        assert_eq!(request.max_retries, 3);
        assert_eq!(request.payload.name.as_deref(), Some("ci-job #42"));
        assert_eq!(
            request.payload.description.as_deref(),
            Some("2 tests failed")
        );
    }

    #[test]
    fn ci_environment_fills_gaps() {
        let options = PublishOptions {
            bitbucket_server: Some(String::from("git.example.com")),
            username: Some(String::from("bot")),
            ..PublishOptions::default()
        };
        let env = HashMap::from([
            ("BITBUCKET_PASSWORD", "secret"),
            ("AGENT_OSARCHITECTURE", "X64"),
            ("BUILD_SOURCEVERSION", "abc123"),
            ("AGENT_JOBSTATUS", "Failed"),
            ("BUILD_DEFINITIONNAME", "nightly"),
            ("BUILD_BUILDNUMBER", "7"),
            ("BUILD_BUILDURI", "vstfs:///Build/Build/7"),
        ]);
        let request = resolve(&options, &env).unwrap();
        assert_eq!(request.commit_hash, "abc123");
        assert_eq!(request.payload.state, BuildState::Failed);
        assert_eq!(request.payload.key, "nightly");
        assert_eq!(request.payload.name.as_deref(), Some("nightly - 7"));
        assert_eq!(request.payload.url, "vstfs:///Build/Build/7");
    }

    #[test]
    fn explicit_options_win_over_ci_environment() {
        let mut options = complete_options();
        options.status = Some(BuildState::InProgress);
        let env = HashMap::from([
            ("BITBUCKET_PASSWORD", "secret"),
            ("JENKINS_URL", "https://jenkins.example.com/"),
            ("GIT_COMMIT", "fff999"),
            ("JOB_NAME", "other-job"),
            ("BUILD_URL", "https://jenkins.example.com/job/other-job/1/"),
        ]);
        let request = resolve(&options, &env).unwrap();
        assert_eq!(request.commit_hash, "abc123");
        assert_eq!(request.payload.key, "ci-job");
        assert_eq!(request.payload.url, "http://ci/42");
        assert_eq!(request.payload.state, BuildState::InProgress);
    }

    #[test]
    fn unknown_ci_provider_ignores_lookalike_variables() {
        let mut options = complete_options();
        options.commit_hash = None;
        let env = HashMap::from([
            ("BITBUCKET_PASSWORD", "secret"),
            ("BUILD_SOURCEVERSION", "abc123"),
        ]);
        assert_missing(resolve(&options, &env), RequiredField::CommitHash);
    }
}
