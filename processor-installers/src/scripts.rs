// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Replacement of install scripts inside expanded packages.

use {
    log::info,
    processor_common::{IoResultExt, ProcessorError},
    std::{
        os::unix::fs::PermissionsExt,
        path::{Path, PathBuf},
    },
};

const STEP: &str = "replace preinstall";

/// Name of the component package holding the application payload.
pub const APPLICATION_PKG: &str = "application.pkg";

const READER_PREINSTALL: &[u8] = include_bytes!("../resources/scripts/reader_preinstall");
const READER_DC_PREINSTALL: &[u8] = include_bytes!("../resources/scripts/readerdc_preinstall");

/// Product generations with distinct preinstall scripts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReaderVariant {
    Classic,
    DocumentCloud,
}

impl ReaderVariant {
    /// Choose a variant from the name of the expanded package.
    pub fn for_package(pkg_name: &str) -> Self {
        if pkg_name.starts_with("AcroRdrDC") {
            Self::DocumentCloud
        } else {
            Self::Classic
        }
    }

    /// The preinstall script installed for this variant.
    pub fn preinstall(&self) -> &'static [u8] {
        match self {
            Self::Classic => READER_PREINSTALL,
            Self::DocumentCloud => READER_DC_PREINSTALL,
        }
    }
}

/// Replace the `preinstall` script of the application component package.
///
/// `pkg_name` is the base name of the expanded package and selects which
/// script is installed. The existing script must be present; its absence
/// means the package layout is not the one this procedure knows. Returns
/// the path of the new script.
pub fn replace_preinstall(expanded_root: &Path, pkg_name: &str) -> Result<PathBuf, ProcessorError> {
    let app_pkg = expanded_root.join(APPLICATION_PKG);
    if !app_pkg.is_dir() {
        return Err(ProcessorError::not_found(STEP, APPLICATION_PKG, app_pkg));
    }

    let scripts_dir = app_pkg.join("Scripts");
    let preinstall = scripts_dir.join("preinstall");

    if preinstall.symlink_metadata().is_err() {
        return Err(ProcessorError::not_found(STEP, "preinstall script", preinstall));
    }
    std::fs::remove_file(&preinstall).step_context(STEP, &preinstall)?;

    let variant = ReaderVariant::for_package(pkg_name);
    info!("installing {:?} preinstall script to {}", variant, preinstall.display());

    std::fs::write(&preinstall, variant.preinstall()).step_context(STEP, &preinstall)?;
    std::fs::set_permissions(&preinstall, std::fs::Permissions::from_mode(0o755))
        .step_context(STEP, &preinstall)?;

    Ok(preinstall)
}
