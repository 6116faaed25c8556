// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    log::info,
    processor_common::{Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
    std::path::{Path, PathBuf},
};

const STEP: &str = "find autopkg source";

/// Directory name pattern of an expanded GitHub source archive.
pub const SOURCE_DIR_PATTERN: &str = "autopkg-autopkg-*";

/// Locate the source root inside an expanded archive.
///
/// Falls back to `root` itself when nothing matches. With several matches,
/// the first in sorted order wins.
pub fn find_source_root(root: &Path) -> Result<PathBuf, ProcessorError> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        SOURCE_DIR_PATTERN
    );

    let mut matches = glob::glob(&pattern)
        .map_err(|e| ProcessorError::invalid_input("input_path", e))?;

    match matches.next() {
        Some(Ok(path)) => Ok(path),
        Some(Err(e)) => {
            let path = e.path().to_path_buf();
            Err(ProcessorError::io(STEP, path, e.into_error()))
        }
        None => Ok(root.to_path_buf()),
    }
}

pub struct AutoPkgSourceFinder;

static INPUTS: &[VariableSpec] = &[VariableSpec::required(
    "input_path",
    "Path the zip archive was expanded to.",
)];

static OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "autopkg_path",
    "Root path of expanded autopkg archive.",
)];

impl Processor for AutoPkgSourceFinder {
    fn name(&self) -> &'static str {
        "AutoPkgSourceFinder"
    }

    fn description(&self) -> &'static str {
        "Finds the root autopkg-autopkg-foo folder from the expanded autopkg zip archive."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let root = PathBuf::from(env.require_str("input_path")?);
        let found = find_source_root(&root)?;
        info!("Found {}", found.display());

        env.set("autopkg_path", found.to_string_lossy().into_owned());

        Ok(())
    }
}
