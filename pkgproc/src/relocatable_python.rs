// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    log::{debug, info},
    processor_common::{
        tool::ToolCommand, Environment, OutputSpec, Processor, ProcessorError, Settings,
        VariableSpec,
    },
    processor_installers::pkgutil::remove_existing,
    std::{path::Path, time::Duration},
};

const STEP: &str = "generate relocatable python";

pub const REPO_URL: &str = "https://github.com/gregneagle/relocatable-python.git";

const BUILD_SCRIPT: &str = "make_relocatable_python_framework.py";

/// Upper bound on the clone when no tool timeout is configured.
const CLONE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Clone `repo_url` into `target`, replacing anything already there.
pub fn clone_repo(settings: &Settings, repo_url: &str, target: &Path) -> Result<(), ProcessorError> {
    remove_existing(STEP, target)?;

    info!("Cloning Relocatable Python into {}", target.display());
    ToolCommand::new(STEP, &settings.tools.git)
        .args(["clone", repo_url])
        .arg(target)
        .operation(format!("cloning {}", repo_url))
        .timeout(Some(settings.tool_timeout.unwrap_or(CLONE_TIMEOUT)))
        .run()?;

    Ok(())
}

/// Run the checkout's build script, producing a framework at `dest`.
pub fn build_framework(
    settings: &Settings,
    checkout: &Path,
    python_version: &str,
    requirements: &str,
    dest: &Path,
) -> Result<(), ProcessorError> {
    remove_existing(STEP, dest)?;

    let script = checkout.join(BUILD_SCRIPT);
    if !script.is_file() {
        return Err(ProcessorError::not_found(STEP, BUILD_SCRIPT, script));
    }

    info!("Building relocatable python framework...");
    let output = ToolCommand::new(STEP, &script)
        .args(["--python-version", python_version])
        .args(["--pip-requirements", requirements])
        .arg("--destination")
        .arg(dest)
        .operation("building Python.framework")
        .timeout(settings.tool_timeout)
        .run()?;

    if !output.stdout.is_empty() {
        debug!("{}", output.stdout.trim_end());
    }

    if !dest.exists() {
        return Err(ProcessorError::not_found(STEP, "built framework", dest));
    }

    Ok(())
}

pub struct GenerateRelocatablePython;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required(
        "requirements_path",
        "Path to the Requirements.txt file to use.",
    ),
    VariableSpec::required("python_version", "What version of Python to build."),
    VariableSpec::with_default(
        "relocatable_python_repo",
        REPO_URL,
        "Git repository providing the framework build script.",
    ),
];

static OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "python_path",
    "Path to built Python framework.",
)];

impl Processor for GenerateRelocatablePython {
    fn name(&self) -> &'static str {
        "GenerateRelocatablePython"
    }

    fn description(&self) -> &'static str {
        "Builds a relocatable Python.framework from the relocatable-python project."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let settings = Settings::from_environment(env)?;
        let checkout = settings.cache_dir.join("relocatable-python");
        let dest = settings.cache_dir.join("Python.framework");

        clone_repo(&settings, env.require_str("relocatable_python_repo")?, &checkout)?;
        build_framework(
            &settings,
            &checkout,
            env.require_str("python_version")?,
            env.require_str("requirements_path")?,
            &dest,
        )?;
        info!("Framework built at {}", dest.display());

        env.set("python_path", dest.to_string_lossy().into_owned());

        Ok(())
    }
}
