// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{error::Error, fmt::Display, process::ExitCode};

use console::style;
use log::{Log, error, info, set_boxed_logger, warn};

use crate::{
    config::{EnvironmentSource, resolve},
    errors::{PublishError, TransientPublishError},
    publisher::{PublishOutcome, RetryPolicy, StatusPublisher},
};

use super::cli::{PublishOptions, RetryOptions, usage};

// Design note: `cli` performs the interactive output and picks the exit code, while `publish_status` does the work and
// returns data.
#[allow(clippy::print_stdout)]
pub async fn cli(
    logger: Box<dyn Log>,
    options: &PublishOptions,
    retry_options: &RetryOptions,
    env: &impl EnvironmentSource,
) -> ExitCode {
    if set_boxed_logger(logger).is_err() {
        warn!("logger was already installed; keeping the existing one");
    }

    match publish_status(options, retry_options.policy(), env).await {
        Ok(outcome) => {
            info!(
                "build status accepted with HTTP {} after {} attempt(s)",
                outcome.status, outcome.attempts
            );
            println!("Successfully published the status.");
            ExitCode::SUCCESS
        }
        Err(PublishError::Configuration(e)) => error_with_usage(&e),
        Err(PublishError::Authorization(e)) => error_with_usage(&e),
        Err(PublishError::RetriesExhausted {
            attempts,
            last_error,
        }) => {
            println!(
                "{} Couldn't publish the status after {attempts} attempt(s).",
                style("ERROR.").red().bold()
            );
            match last_error {
                TransientPublishError::UnexpectedStatus { status, body } => {
                    println!("Response status code {}", status.as_u16());
                    println!("Response body:");
                    println!("{body}");
                }
                TransientPublishError::Network(e) => {
                    println!("ERROR: {e}");
                    let mut source = e.source();
                    while let Some(cause) = source {
                        println!("  caused by: {cause}");
                        source = cause.source();
                    }
                }
            }
            ExitCode::FAILURE
        }
        Err(e @ PublishError::Client(_)) => {
            error!("{e:?}");
            println!("{} {e}.", style("ERROR.").red().bold());
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stdout)]
fn error_with_usage(message: &impl Display) -> ExitCode {
    println!("{} {message}.", style("ERROR.").red().bold());
    println!();
    println!("{}", usage());
    ExitCode::FAILURE
}

/// Resolves the request from `options` and `env`, then publishes it.  Nothing is sent unless resolution succeeds.
pub async fn publish_status(
    options: &PublishOptions,
    retry: RetryPolicy,
    env: &impl EnvironmentSource,
) -> Result<PublishOutcome, PublishError> {
    let request = resolve(options, env)?;
    let publisher = StatusPublisher::new(retry)?;
    publisher.publish(request).await
}
