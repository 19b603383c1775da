// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use clap::{Args, CommandFactory as _, Parser, error::ErrorKind};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use log::set_max_level;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::{process::ExitCode, time::Duration};

use crate::{config::ProcessEnvironment, model::BuildState, publisher::RetryPolicy};

use super::publish_status;

/// Publish commit build status to Bitbucket Server (Atlassian Stash)
///
/// The Bitbucket password is read from the BITBUCKET_PASSWORD environment variable.  When run under Azure DevOps,
/// Jenkins, or TeamCity, the commit hash, build key, build URL, build name, and status can be taken from the CI
/// environment instead of options.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    common: CommonOptions,

    #[command(flatten)]
    publish: PublishOptions,

    #[command(flatten)]
    retry: RetryOptions,
}

#[derive(Args, Debug)]
pub struct CommonOptions {
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct PublishOptions {
    /// [*] Bitbucket server base URL
    #[arg(short = 'b', long)]
    pub bitbucket_server: Option<String>,

    /// [*] Target commit hash
    #[arg(short, long)]
    pub commit_hash: Option<String>,

    /// [*] Build pipeline configuration ID or name
    #[arg(short = 'p', long)]
    pub configuration: Option<String>,

    /// [*] Bitbucket user name; can use the BITBUCKET_USERNAME environment variable
    #[arg(short, long)]
    pub username: Option<String>,

    /// [*] Link to the build details
    #[arg(short = 'l', long)]
    pub build_url: Option<String>,

    /// Build status; defaults to SUCCESSFUL
    #[arg(short, long, value_enum, ignore_case = true)]
    pub status: Option<BuildState>,

    /// Build ID or name
    #[arg(short = 'n', long)]
    pub build_name: Option<String>,

    /// Build details description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Maximum number of retries to post the status in the case of transient failure; defaults to 100
    #[arg(short = 'r', long)]
    pub max_retry: Option<u32>,
}

#[derive(Args, Debug)]
pub struct RetryOptions {
    /// Seconds to wait before the first retry; the wait doubles on each further retry
    #[arg(long, value_name = "SECONDS", default_value_t = 1)]
    pub retry_delay: u64,

    /// Longest wait between retries, in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub retry_max_delay: u64,
}

impl RetryOptions {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.retry_delay),
            Duration::from_secs(self.retry_max_delay),
        )
    }
}

/// Rendered `--help` text, for printing alongside configuration errors.
#[must_use]
pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

/// A flag given a value it can't take is a configuration error, reported with exit code 1.  Every other parse outcome
/// (help, version, unknown flags) keeps clap's own exit behaviour.
fn is_invalid_value(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::InvalidValue | ErrorKind::ValueValidation)
}

pub async fn run_cli() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if is_invalid_value(e.kind()) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        Err(e) => e.exit(),
    };
    let logger = TermLogger::new(
        cli.common.verbose.log_level_filter(),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
    set_max_level(cli.common.verbose.log_level_filter());

    publish_status::cli(logger, &cli.publish, &cli.retry, &ProcessEnvironment).await
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory as _, Parser as _};

    use crate::model::BuildState;

    use super::{Cli, is_invalid_value};

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from([
            "stash-status",
            "-b",
            "git.example.com",
            "-c",
            "abc123",
            "-p",
            "ci-job",
            "-u",
            "bot",
            "-l",
            "http://ci/42",
            "-s",
            "inprogress",
            "-n",
            "ci-job #42",
            "-d",
            "running",
            "-r",
            "5",
        ])
        .unwrap();
        assert_eq!(
            cli.publish.bitbucket_server.as_deref(),
            Some("git.example.com")
        );
        assert_eq!(cli.publish.commit_hash.as_deref(), Some("abc123"));
        assert_eq!(cli.publish.configuration.as_deref(), Some("ci-job"));
        assert_eq!(cli.publish.username.as_deref(), Some("bot"));
        assert_eq!(cli.publish.build_url.as_deref(), Some("http://ci/42"));
        assert_eq!(cli.publish.status, Some(BuildState::InProgress));
        assert_eq!(cli.publish.build_name.as_deref(), Some("ci-job #42"));
        assert_eq!(cli.publish.description.as_deref(), Some("running"));
        assert_eq!(cli.publish.max_retry, Some(5));
    }

    #[test]
    fn long_flags_and_defaults() {
        let cli = Cli::try_parse_from([
            "stash-status",
            "--bitbucket-server=git.example.com",
            "--commit-hash=abc123",
            "--configuration=ci-job",
            "--build-url=http://ci/42",
            "--status=FAILED",
        ])
        .unwrap();
        assert_eq!(cli.publish.status, Some(BuildState::Failed));
        assert_eq!(cli.publish.username, None);
        assert_eq!(cli.publish.max_retry, None);
        assert_eq!(cli.retry.retry_delay, 1);
        assert_eq!(cli.retry.retry_max_delay, 30);
    }

    #[test]
    fn rejects_unknown_status() {
        let err = Cli::try_parse_from(["stash-status", "--status", "BROKEN"])
            .err()
            .expect("unknown status must be rejected");
        assert!(is_invalid_value(err.kind()), "kind was {:?}", err.kind());
    }

    #[test]
    fn rejects_negative_max_retry() {
        let err = Cli::try_parse_from(["stash-status", "--max-retry=-1"])
            .err()
            .expect("negative retry budget must be rejected");
        assert!(is_invalid_value(err.kind()), "kind was {:?}", err.kind());
    }

    #[test]
    fn help_is_not_an_invalid_value() {
        let err = Cli::try_parse_from(["stash-status", "--help"])
            .err()
            .expect("--help stops parsing");
        assert!(!is_invalid_value(err.kind()));
    }
}
