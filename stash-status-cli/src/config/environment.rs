// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{collections::HashMap, env};

/// Source of environment variables for configuration resolution.
///
/// Empty values are reported as absent, the same as unset variables.
pub trait EnvironmentSource {
    fn raw_var(&self, name: &str) -> Option<String>;

    fn var(&self, name: &str) -> Option<String> {
        self.raw_var(name).filter(|value| !value.is_empty())
    }
}

/// The environment of the running process.
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    fn raw_var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

impl EnvironmentSource for HashMap<&str, &str> {
    fn raw_var(&self, name: &str) -> Option<String> {
        self.get(name).map(|v| String::from(*v))
    }
}
