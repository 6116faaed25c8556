// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Processors for the Adobe Flash Player installer.

use {
    crate::{
        dmg::{with_mounted_image, DiskImageMounter, Hdiutil},
        fsutil,
        payload::{PayloadLayout, PayloadPatcher, StagingLocation},
        pkgutil::remove_existing,
    },
    log::info,
    processor_common::{
        tool::ToolCommand, Environment, OutputSpec, Processor, ProcessorError, Settings,
        VariableSpec,
    },
    std::path::{Path, PathBuf},
};

const INSTALLER_APP: &str = "Install Adobe Flash Player.app";
const EMBEDDED_PKG: &str = "Contents/Resources/Adobe Flash Player.pkg";
const INSTALL_MANAGER_DIR: &str = "Applications/Utilities";
const INSTALL_MANAGER_APP: &str = "Adobe Flash Player Install Manager.app";

/// Populate `pkgroot` from a mounted Flash Player disk image.
///
/// `pkgroot` receives the expanded browser plugin and a copy of the
/// installer application (renamed to the install manager, without the
/// embedded package). Returns the plugin version.
pub fn unpack(
    settings: &Settings,
    mounter: &dyn DiskImageMounter,
    dmg_path: &Path,
    pkgroot: &Path,
    staging: StagingLocation,
) -> Result<String, ProcessorError> {
    const STEP: &str = "unpack flash player";

    with_mounted_image(mounter, dmg_path, |mount_point| {
        remove_existing(STEP, pkgroot)?;

        let app = mount_point.join(INSTALLER_APP);
        if !app.is_dir() {
            return Err(ProcessorError::not_found(STEP, INSTALLER_APP, app));
        }
        let pkg = app.join(EMBEDDED_PKG);
        if !pkg.is_dir() {
            return Err(ProcessorError::not_found(STEP, "Adobe Flash Player.pkg", pkg));
        }

        // The payload extracts over the package root, so it goes first.
        let patched = PayloadPatcher::new(settings, PayloadLayout::flash_player(), staging)
            .patch(&pkg, pkgroot)?;

        let dest_dir = pkgroot.join(INSTALL_MANAGER_DIR);
        fsutil::create_dir_0755(STEP, &dest_dir)?;
        let dest_app = dest_dir.join(INSTALL_MANAGER_APP);
        remove_existing(STEP, &dest_app)?;

        info!("copying {} to {}", app.display(), dest_app.display());
        fsutil::copy_tree(STEP, &app, &dest_app)?;
        remove_existing(STEP, &dest_app.join(EMBEDDED_PKG))?;

        Ok(patched.version)
    })
}

pub struct AdobeFlashDmgUnpacker;

static UNPACKER_INPUTS: &[VariableSpec] = &[
    VariableSpec::required(
        "dmg_path",
        "Path to a dmg containing the Flash player installer.",
    ),
    VariableSpec::required("pkgroot", "Path to where the new package root will be created."),
];

static UNPACKER_OUTPUTS: &[OutputSpec] =
    &[OutputSpec::new("version", "Version of the flash plugin.")];

impl Processor for AdobeFlashDmgUnpacker {
    fn name(&self) -> &'static str {
        "AdobeFlashDmgUnpacker"
    }

    fn description(&self) -> &'static str {
        "Mounts a Flash dmg and extracts the Player pkg payload to pkgroot."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        UNPACKER_INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        UNPACKER_OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let settings = Settings::from_environment(env)?;
        let dmg_path = PathBuf::from(env.require_str("dmg_path")?);
        let pkgroot = PathBuf::from(env.require_str("pkgroot")?);

        let version = unpack(
            &settings,
            &Hdiutil::new(&settings),
            &dmg_path,
            &pkgroot,
            StagingLocation::default(),
        )?;
        info!("unpacked Flash Player {}", version);

        env.set("version", version);

        Ok(())
    }
}

/// Decode a CMS-wrapped download with `security cms -D`.
///
/// `security` prints nothing on success, so any standard error output is
/// treated as failure even with a zero exit code.
pub fn decode_download(
    settings: &Settings,
    encoded: &Path,
    decoded: &Path,
) -> Result<(), ProcessorError> {
    const STEP: &str = "decode download";

    let operation = format!("decoding {} into {}", encoded.display(), decoded.display());
    let output = ToolCommand::new(STEP, &settings.tools.security)
        .args(["cms", "-D", "-i"])
        .arg(encoded)
        .arg("-o")
        .arg(decoded)
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

pub struct AdobeFlashDownloadDecoder;

static DECODER_INPUTS: &[VariableSpec] = &[VariableSpec::required(
    "encoded_path",
    "Path to a downloaded, encoded DMG from Adobe's auto-update url.",
)];

static DECODER_OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "pathname",
    "Path to the decoded DMG file.",
)];

impl Processor for AdobeFlashDownloadDecoder {
    fn name(&self) -> &'static str {
        "AdobeFlashDownloadDecoder"
    }

    fn description(&self) -> &'static str {
        "Decodes an Adobe Flash download using `security cms`, unwrapping the \
         signed ASN.1 container Adobe's auto-update server delivers."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        DECODER_INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        DECODER_OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let settings = Settings::from_environment(env)?;
        let encoded = PathBuf::from(env.require_str("encoded_path")?);
        let name = env.get_str_or("NAME", "AdobeFlashPlayer");
        let decoded = settings.cache_dir.join(format!("{}.dmg", name));

        decode_download(&settings, &encoded, &decoded)?;
        info!("decoded {} to {}", encoded.display(), decoded.display());

        env.set("pathname", decoded.to_string_lossy().into_owned());

        Ok(())
    }
}
