// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    log::info,
    processor_common::{
        Environment, IoResultExt, OutputSpec, Processor, ProcessorError, VariableSpec,
    },
    std::path::{Path, PathBuf},
};

const STEP: &str = "disable office quit";

/// Script installed in place of the application-quitting preinstall.
pub const NOOP_PREINSTALL: &str = "#!/bin/bash\n\nexit 0";

/// Obtain `installs[0].CFBundleVersion` from an `additional_pkginfo` dictionary.
pub fn installs_bundle_version(env: &Environment) -> Result<&str, ProcessorError> {
    env.get("additional_pkginfo")
        .ok_or_else(|| ProcessorError::MissingInput("additional_pkginfo".into()))?
        .as_dictionary()
        .and_then(|d| d.get("installs"))
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|v| v.as_dictionary())
        .and_then(|d| d.get("CFBundleVersion"))
        .and_then(|v| v.as_string())
        .ok_or_else(|| {
            ProcessorError::invalid_input(
                "additional_pkginfo",
                "expected installs[0].CFBundleVersion",
            )
        })
}

/// Overwrite the all-quit component's preinstall script with a no-op.
pub fn disable_all_quit(unpacked_pkg: &Path, version: &str) -> Result<PathBuf, ProcessorError> {
    let combo = unpacked_pkg.join(format!("Office2011_all_quit_{}.combo.pkg", version));
    if !combo.is_dir() {
        return Err(ProcessorError::not_found(STEP, "all_quit component package", combo));
    }

    let preinstall = combo.join("Scripts").join("preinstall");
    std::fs::write(&preinstall, NOOP_PREINSTALL).step_context(STEP, &preinstall)?;

    Ok(preinstall)
}

pub struct MSOffice2011DisableAllQuit;

static INPUTS: &[VariableSpec] = &[VariableSpec::required(
    "unpacked_pkg_path",
    "Path to an unpacked Office update package.",
)];

static OUTPUTS: &[OutputSpec] = &[];

impl Processor for MSOffice2011DisableAllQuit {
    fn name(&self) -> &'static str {
        "MSOffice2011DisableAllQuit"
    }

    fn description(&self) -> &'static str {
        "Overwrites the Office2011_all_quit_14.x.x.combo.pkg/Scripts/preinstall script with one \
         that doesn't kill all of your browsers."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let version = installs_bundle_version(env)?;
        let unpacked = Path::new(env.require_str("unpacked_pkg_path")?);

        let preinstall = disable_all_quit(unpacked, version)?;
        info!("replaced {}", preinstall.display());

        Ok(())
    }
}
