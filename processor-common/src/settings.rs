// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-invocation configuration.

use {
    crate::{Environment, ProcessorError},
    std::{path::PathBuf, time::Duration},
};

/// Environment key holding the per-recipe cache directory.
pub const RECIPE_CACHE_DIR: &str = "RECIPE_CACHE_DIR";

/// Environment key holding an optional timeout for external tools, in seconds.
pub const PROCESSOR_TOOL_TIMEOUT: &str = "PROCESSOR_TOOL_TIMEOUT";

/// Locations of the external programs processors invoke.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolPaths {
    pub pkgutil: PathBuf,
    pub hdiutil: PathBuf,
    pub ditto: PathBuf,
    pub security: PathBuf,
    pub makecatalogs: PathBuf,
    pub git: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            pkgutil: PathBuf::from("/usr/sbin/pkgutil"),
            hdiutil: PathBuf::from("/usr/bin/hdiutil"),
            ditto: PathBuf::from("/usr/bin/ditto"),
            security: PathBuf::from("/usr/bin/security"),
            makecatalogs: PathBuf::from("/usr/local/munki/makecatalogs"),
            git: PathBuf::from("git"),
        }
    }
}

/// Settings resolved once per processor invocation.
///
/// Instances are immutable after construction and are passed by reference
/// into the code that needs them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Settings {
    /// Directory receiving working trees and produced artifacts.
    pub cache_dir: PathBuf,

    /// External program locations.
    pub tools: ToolPaths,

    /// Upper bound on the run time of any single external program.
    ///
    /// `None` waits indefinitely.
    pub tool_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            tools: ToolPaths::default(),
            tool_timeout: None,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("Library")
        .join("AutoPkg")
        .join("Cache")
}

/// Resolve a setting from the processor environment, then the process environment.
fn lookup(env: &Environment, key: &str) -> Option<String> {
    match env.get_str(key) {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => std::env::var(key).ok().filter(|v| !v.is_empty()),
    }
}

impl Settings {
    /// Derive settings from a processor environment.
    ///
    /// Every key is looked up in `env` first and the process environment second.
    pub fn from_environment(env: &Environment) -> Result<Self, ProcessorError> {
        let mut settings = Self::default();

        if let Some(dir) = lookup(env, RECIPE_CACHE_DIR) {
            settings.cache_dir = PathBuf::from(dir);
        }

        for (key, slot) in [
            ("PKGUTIL_PATH", &mut settings.tools.pkgutil),
            ("HDIUTIL_PATH", &mut settings.tools.hdiutil),
            ("DITTO_PATH", &mut settings.tools.ditto),
            ("SECURITY_PATH", &mut settings.tools.security),
            ("MAKECATALOGS_PATH", &mut settings.tools.makecatalogs),
            ("GIT_PATH", &mut settings.tools.git),
        ] {
            if let Some(path) = lookup(env, key) {
                *slot = PathBuf::from(path);
            }
        }

        if let Some(value) = lookup(env, PROCESSOR_TOOL_TIMEOUT) {
            let seconds = value.trim().parse::<u64>().map_err(|e| {
                ProcessorError::invalid_input(PROCESSOR_TOOL_TIMEOUT, format!("{}: {}", value, e))
            })?;
            settings.tool_timeout = Some(Duration::from_secs(seconds));
        }

        Ok(settings)
    }
}
