// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Repackaging of the Adobe Reader installer.

use {
    crate::{
        distribution,
        dmg::{with_mounted_image, DiskImageMounter, Hdiutil},
        locate, pkgutil, scripts,
    },
    log::info,
    processor_common::{
        Environment, IoResultExt, OutputSpec, Processor, ProcessorError, Settings, VariableSpec,
    },
    std::path::{Path, PathBuf},
};

const STEP: &str = "repackage reader";

/// Repackage the installer on a mounted Reader disk image.
///
/// The package is expanded to `<cache>/<package stem>`, its descriptor and
/// preinstall script are edited, and it is flattened to
/// `<cache>/<package file name>`. The image stays mounted for the whole
/// procedure and is unmounted exactly once afterwards.
pub fn repackage(
    settings: &Settings,
    mounter: &dyn DiskImageMounter,
    dmg_path: &Path,
) -> Result<PathBuf, ProcessorError> {
    std::fs::create_dir_all(&settings.cache_dir).step_context(STEP, &settings.cache_dir)?;

    with_mounted_image(mounter, dmg_path, |mount_point| {
        let pkg = locate::find_installer(mount_point, "pkg")?;

        let (file_name, stem) = match (pkg.file_name(), pkg.file_stem()) {
            (Some(file_name), Some(stem)) => (file_name, stem),
            _ => {
                return Err(ProcessorError::invariant(
                    STEP,
                    format!("{} has no file name", pkg.display()),
                ))
            }
        };

        let expanded = pkgutil::expand(settings, &pkg, &settings.cache_dir.join(stem))?;
        distribution::remove_domains(&expanded)?;
        scripts::replace_preinstall(&expanded, &stem.to_string_lossy())?;

        let modified = settings.cache_dir.join(file_name);
        pkgutil::flatten(settings, &expanded, &modified)?;

        Ok(modified)
    })
}

pub struct AdobeReaderRepackager;

static INPUTS: &[VariableSpec] = &[VariableSpec::required(
    "dmg_path",
    "Path to a dmg containing the Adobe Reader installer.",
)];

static OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "pkg_path",
    "Path to the repackaged installer package.",
)];

impl Processor for AdobeReaderRepackager {
    fn name(&self) -> &'static str {
        "AdobeReaderRepackager"
    }

    fn description(&self) -> &'static str {
        "Repackages the Adobe Reader installer so it can be installed unattended: removes \
         installation domain restrictions and replaces the application preinstall script."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let settings = Settings::from_environment(env)?;
        let dmg_path = PathBuf::from(env.require_str("dmg_path")?);

        let pkg_path = repackage(&settings, &Hdiutil::new(&settings), &dmg_path)?;
        info!("repackaged installer written to {}", pkg_path.display());

        env.set("pkg_path", pkg_path.to_string_lossy().into_owned());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{dmg::tests::CountingMounter, pkgutil::tests::tar_settings},
        indoc::indoc,
        processor_common::{testutil::write_fake_tool, ErrorKind},
    };

    const DISTRIBUTION: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <installer-gui-script minSpecVersion="1">
            <title>Adobe Acrobat Reader DC</title>
            <domains enable_anywhere="false" enable_currentUserHome="false" enable_localSystem="true"/>
            <pkg-ref id="com.adobe.acrobat.DC.reader.app.pkg.MUI">#application.pkg</pkg-ref>
        </installer-gui-script>
    "#};

    struct Fixture {
        _td: tempfile::TempDir,
        settings: Settings,
        mount: PathBuf,
        source: PathBuf,
    }

    /// Lay out a mounted image holding a tar-format package built from `source`.
    fn fixture(pkg_name: &str, populate: impl FnOnce(&Path) -> std::io::Result<()>) -> Result<Fixture, Box<dyn std::error::Error>> {
        let td = processor_common::testutil::temp_dir()?;
        let tools = td.path().join("tools");
        let cache = td.path().join("cache");
        let mount = td.path().join("mount");
        let source = td.path().join("source");
        std::fs::create_dir_all(&tools)?;
        std::fs::create_dir_all(&mount)?;
        std::fs::create_dir_all(&source)?;

        let settings = tar_settings(&tools, &cache)?;

        populate(&source)?;
        pkgutil::flatten(&settings, &source, &mount.join(pkg_name))?;

        Ok(Fixture {
            _td: td,
            settings,
            mount,
            source,
        })
    }

    fn full_package(source: &Path) -> std::io::Result<()> {
        std::fs::write(source.join("Distribution"), DISTRIBUTION)?;
        let scripts = source.join("application.pkg").join("Scripts");
        std::fs::create_dir_all(&scripts)?;
        std::fs::write(scripts.join("preinstall"), b"#!/bin/sh\nvendor\n")
    }

    #[test]
    fn repackages_dc_installer() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("AcroRdrDC_2100120135_MUI.pkg", full_package)?;
        let mounter = CountingMounter::new(&f.mount);

        let pkg = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg"))?;
        assert_eq!(pkg, f.settings.cache_dir.join("AcroRdrDC_2100120135_MUI.pkg"));
        assert!(pkg.is_file());
        assert_eq!(mounter.mounts.get(), 1);
        assert_eq!(mounter.unmounts.get(), 1);

        // Re-expanding the flattened result reproduces the edited tree.
        let check = f.settings.cache_dir.join("check");
        pkgutil::expand(&f.settings, &pkg, &check)?;
        let expanded = f.settings.cache_dir.join("AcroRdrDC_2100120135_MUI");

        let distribution = std::fs::read(check.join("Distribution"))?;
        assert_eq!(distribution, std::fs::read(expanded.join("Distribution"))?);
        assert!(!String::from_utf8(distribution)?.contains("<domains"));

        let preinstall = std::fs::read(check.join("application.pkg/Scripts/preinstall"))?;
        assert_eq!(
            preinstall,
            scripts::ReaderVariant::DocumentCloud.preinstall()
        );

        // Inputs on the image are untouched.
        assert_eq!(
            std::fs::read_to_string(f.source.join("Distribution"))?,
            DISTRIBUTION
        );

        Ok(())
    }

    #[test]
    fn rerun_replaces_previous_output() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("AdbeRdr11010_en_US.pkg", full_package)?;
        let mounter = CountingMounter::new(&f.mount);

        let first = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg"))?;
        let first_data = std::fs::read(&first)?;
        let second = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg"))?;

        assert_eq!(first, second);
        assert_eq!(first_data.len(), std::fs::read(&second)?.len());
        assert_eq!(mounter.mounts.get(), 2);
        assert_eq!(mounter.unmounts.get(), 2);

        Ok(())
    }

    #[test]
    fn no_package_on_image() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("AcroRdrDC.pkg", full_package)?;
        std::fs::remove_file(f.mount.join("AcroRdrDC.pkg"))?;
        let mounter = CountingMounter::new(&f.mount);

        let err = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(mounter.unmounts.get(), 1);

        Ok(())
    }

    #[test]
    fn missing_application_pkg() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("AcroRdrDC_1.pkg", |source| {
            std::fs::write(source.join("Distribution"), DISTRIBUTION)
        })?;
        let mounter = CountingMounter::new(&f.mount);

        let err = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("application.pkg not found"));
        assert_eq!(mounter.mounts.get(), 1);
        assert_eq!(mounter.unmounts.get(), 1);
        assert!(!f.settings.cache_dir.join("AcroRdrDC_1.pkg").exists());

        Ok(())
    }

    #[test]
    fn missing_distribution() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("AcroRdrDC_1.pkg", |source| {
            std::fs::create_dir_all(source.join("application.pkg/Scripts"))
        })?;
        let mounter = CountingMounter::new(&f.mount);

        let err = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("Distribution"));
        assert_eq!(mounter.unmounts.get(), 1);

        Ok(())
    }

    #[test]
    fn flatten_failure() -> Result<(), Box<dyn std::error::Error>> {
        let mut f = fixture("AcroRdrDC_1.pkg", full_package)?;
        let tools = f.settings.cache_dir.with_file_name("tools");
        f.settings.tools.pkgutil = write_fake_tool(
            &tools,
            "pkgutil-flatten-fails",
            &format!(
                "if [ \"$1\" = --flatten ]; then echo 'bad CPIO' >&2; exit 1; fi\nexec '{}' \"$@\"",
                tools.join("pkgutil").display()
            ),
        )?;
        let mounter = CountingMounter::new(&f.mount);

        let err = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
        let message = err.to_string();
        assert!(message.contains("bad CPIO"));
        assert!(message.contains("AcroRdrDC_1.pkg"));
        assert_eq!(mounter.unmounts.get(), 1);

        Ok(())
    }

    #[test]
    fn expand_failure() -> Result<(), Box<dyn std::error::Error>> {
        let mut f = fixture("AcroRdrDC_1.pkg", full_package)?;
        let tools = f.settings.cache_dir.with_file_name("tools");
        f.settings.tools.pkgutil = write_fake_tool(
            &tools,
            "pkgutil-expand-fails",
            &format!(
                "if [ \"$1\" = --expand ]; then echo 'Error opening file' >&2; exit 1; fi\nexec '{}' \"$@\"",
                tools.join("pkgutil").display()
            ),
        )?;
        let mounter = CountingMounter::new(&f.mount);

        let err = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
        assert!(err.to_string().contains("Error opening file"));
        assert_eq!(mounter.mounts.get(), 1);
        assert_eq!(mounter.unmounts.get(), 1);
        assert!(!f.settings.cache_dir.join("AcroRdrDC_1.pkg").exists());

        Ok(())
    }

    #[test]
    fn malformed_distribution() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("AcroRdrDC_1.pkg", |source| {
            full_package(source)?;
            std::fs::write(
                source.join("Distribution"),
                "<installer-gui-script><domains></installer-gui-script>",
            )
        })?;
        let mounter = CountingMounter::new(&f.mount);

        let err = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
        assert_eq!(mounter.mounts.get(), 1);
        assert_eq!(mounter.unmounts.get(), 1);
        assert!(!f.settings.cache_dir.join("AcroRdrDC_1.pkg").exists());

        Ok(())
    }

    #[test]
    fn unexpected_distribution_root() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("AcroRdrDC_1.pkg", |source| {
            full_package(source)?;
            std::fs::write(
                source.join("Distribution"),
                "<?xml version=\"1.0\"?>\n<plist><domains/></plist>\n",
            )
        })?;
        let mounter = CountingMounter::new(&f.mount);

        let err = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
        assert!(err.to_string().contains("plist"));
        assert_eq!(mounter.unmounts.get(), 1);

        Ok(())
    }

    #[test]
    fn mount_failure() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("AcroRdrDC_1.pkg", full_package)?;
        let mut mounter = CountingMounter::new(&f.mount);
        mounter.fail_mount = true;

        let err = repackage(&f.settings, &mounter, Path::new("/tmp/reader.dmg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
        assert_eq!(mounter.unmounts.get(), 0);

        Ok(())
    }

    #[test]
    fn processor_requires_dmg_path() {
        let mut env = Environment::new();
        let err = processor_common::execute(&AdobeReaderRepackager, &mut env).unwrap_err();
        assert!(matches!(err, ProcessorError::MissingInput(name) if name == "dmg_path"));
    }
}
