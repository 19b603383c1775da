// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;

use crate::model::BuildState;

use super::environment::EnvironmentSource;

/// Continuous integration system that launched us, if it can be recognized.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum CiProvider {
    #[default]
    Unknown,
    AzureDevOps,
    Jenkins,
    TeamCity,
}

impl CiProvider {
    #[must_use]
    pub fn detect(env: &impl EnvironmentSource) -> CiProvider {
        // https://docs.microsoft.com/en-us/azure/devops/pipelines/build/variables
        if env.var("AGENT_OSARCHITECTURE").is_some() {
            CiProvider::AzureDevOps
        } else if env.var("JENKINS_URL").is_some() {
            CiProvider::Jenkins
        } else if env.var("TEAMCITY_VERSION").is_some() {
            CiProvider::TeamCity
        } else {
            CiProvider::Unknown
        }
    }
}

impl fmt::Display for CiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CiProvider::Unknown => "unknown",
            CiProvider::AzureDevOps => "Azure DevOps",
            CiProvider::Jenkins => "Jenkins",
            CiProvider::TeamCity => "TeamCity",
        })
    }
}

/// Values a recognized CI system can supply in place of command-line flags.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CiValues {
    pub provider: CiProvider,
    pub commit_hash: Option<String>,
    pub state: Option<BuildState>,
    pub build_key: Option<String>,
    pub build_name: Option<String>,
    pub build_url: Option<String>,
    pub description: Option<String>,
}

impl CiValues {
    #[must_use]
    pub fn collect(env: &impl EnvironmentSource) -> CiValues {
        match CiProvider::detect(env) {
            CiProvider::Unknown => CiValues::default(),
            CiProvider::AzureDevOps => azure_devops(env),
            CiProvider::Jenkins => jenkins(env),
            CiProvider::TeamCity => teamcity(env),
        }
    }
}

/// Azure agents export `Build.SourceVersion` as `BUILD_SOURCEVERSION`; the dotted name is only tried second.
fn azure_var(env: &impl EnvironmentSource, name: &str) -> Option<String> {
    env.var(&name.replace('.', "_").to_ascii_uppercase())
        .or_else(|| env.var(name))
}

fn build_name(key: Option<&str>, number: Option<String>) -> Option<String> {
    match (key, number) {
        (Some(key), Some(number)) => Some(format!("{key} - {number}")),
        _ => None,
    }
}

fn azure_devops(env: &impl EnvironmentSource) -> CiValues {
    let build_key =
        azure_var(env, "Build.DefinitionName").or_else(|| azure_var(env, "Agent.JobName"));
    CiValues {
        provider: CiProvider::AzureDevOps,
        commit_hash: azure_var(env, "Build.SourceVersion"),
        state: azure_var(env, "Agent.JobStatus").and_then(|s| BuildState::from_ci_status(&s)),
        build_name: build_name(build_key.as_deref(), azure_var(env, "Build.BuildNumber")),
        build_key,
        build_url: azure_var(env, "Build.BuildUri"),
        description: None,
    }
}

fn jenkins(env: &impl EnvironmentSource) -> CiValues {
    let build_key = env.var("JOB_NAME");
    CiValues {
        provider: CiProvider::Jenkins,
        commit_hash: env.var("GIT_COMMIT"),
        state: None,
        build_name: build_name(build_key.as_deref(), env.var("BUILD_NUMBER")),
        build_key,
        build_url: env.var("BUILD_URL"),
        description: None,
    }
}

fn teamcity(env: &impl EnvironmentSource) -> CiValues {
    let build_key = env.var("TEAMCITY_BUILDCONF_NAME");
    CiValues {
        provider: CiProvider::TeamCity,
        commit_hash: env.var("BUILD_VCS_NUMBER"),
        state: None,
        build_name: build_name(build_key.as_deref(), env.var("BUILD_NUMBER")),
        build_key,
        build_url: None,
        description: None,
    }
}
