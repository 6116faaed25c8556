// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    log::warn,
    processor_common::{IoResultExt, ProcessorError},
    std::path::{Path, PathBuf},
};

const STEP: &str = "locate installer";

/// Find the first entry of `dir` whose name ends with `.<extension>`.
///
/// Only the top level of `dir` is searched. Entries may be files or
/// directories (bundle-style packages are directories). When several
/// entries match, the first one in directory listing order wins.
pub fn find_installer(dir: &Path, extension: &str) -> Result<PathBuf, ProcessorError> {
    let suffix = format!(".{}", extension);

    let mut matches = vec![];
    for entry in std::fs::read_dir(dir).step_context(STEP, dir)? {
        let entry = entry.step_context(STEP, dir)?;

        if entry.file_name().to_string_lossy().ends_with(&suffix) {
            matches.push(entry.path());
        }
    }

    if matches.len() > 1 {
        warn!(
            "{} entries in {} end with {}; using {}",
            matches.len(),
            dir.display(),
            suffix,
            matches[0].display()
        );
    }

    matches
        .into_iter()
        .next()
        .ok_or_else(|| ProcessorError::not_found(STEP, format!("*{} installer", suffix), dir))
}
