// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    log::{debug, info},
    processor_common::{
        tool::ToolCommand, Environment, IoResultExt, OutputSpec, Processor, ProcessorError,
        Settings, VariableSpec,
    },
    std::{
        os::unix::fs::PermissionsExt,
        path::{Path, PathBuf},
    },
};

const STEP: &str = "customize k2client";

/// Run `k2clientconfig` against a flat K2Client package.
///
/// The configuration script reports problems on standard error without
/// always exiting nonzero, so any standard error output is a failure.
pub fn customize(
    settings: &Settings,
    script: &Path,
    options: &str,
    pkg: &Path,
) -> Result<(), ProcessorError> {
    if !script.is_file() {
        return Err(ProcessorError::not_found(STEP, "k2clientconfig", script));
    }

    let mode = std::fs::metadata(script)
        .step_context(STEP, script)?
        .permissions()
        .mode();
    if mode & 0o111 == 0 {
        debug!("{}: marking {} executable", STEP, script.display());
        std::fs::set_permissions(script, std::fs::Permissions::from_mode(0o755))
            .step_context(STEP, script)?;
    }

    if !pkg.exists() {
        return Err(ProcessorError::not_found(STEP, "K2Client pkg", pkg));
    }

    let args = shlex::split(options).ok_or_else(|| {
        ProcessorError::invalid_input("k2clientconfig_options", "unbalanced quotes")
    })?;

    let operation = format!("running {} against {}", script.display(), pkg.display());
    let output = ToolCommand::new(STEP, script)
        .args(&args)
        .arg(pkg)
        .operation(&operation)
        .timeout(settings.tool_timeout)
        .output_unchecked()?;

    if !output.success() || !output.stderr.trim().is_empty() {
        return Err(ProcessorError::ExternalToolFailure {
            step: STEP,
            operation,
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(())
}

pub struct SassafrasK2ClientCustomizer;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required(
        "base_pkg_path",
        "Path to a K2Client.pkg installer to be modified.",
    ),
    VariableSpec::required(
        "k2clientconfig_options",
        "String of command arguments to be passed to k2clientconfig.",
    ),
    VariableSpec::required(
        "k2clientconfig_path",
        "Full path to a k2clientconfig that's written for modifying flat packages.",
    ),
];

static OUTPUTS: &[OutputSpec] = &[];

impl Processor for SassafrasK2ClientCustomizer {
    fn name(&self) -> &'static str {
        "SassafrasK2ClientCustomizer"
    }

    fn description(&self) -> &'static str {
        "Given a flat pkg K2Client installer and the k2clientconfig script, run the \
         k2clientconfig script with customizable options."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let settings = Settings::from_environment(env)?;
        let script = PathBuf::from(env.require_str("k2clientconfig_path")?);
        let pkg = PathBuf::from(env.require_str("base_pkg_path")?);
        let options = env.require_str("k2clientconfig_options")?;

        customize(&settings, &script, options, &pkg)?;
        info!("customized {}", pkg.display());

        Ok(())
    }
}
