// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Redirecting payload unpackers that write to hardcoded locations.
//!
//! Some component packages ship a compressed artifact plus an unpacker
//! program that decompresses it in place at install time. The unpacker
//! embeds the absolute directory it operates on. To obtain the expanded
//! artifact at build time without touching that directory on the build
//! machine, the unpacker is copied and byte-patched so it operates on a
//! staging directory instead.
//!
//! The patch is a same-length substitution: the binary cannot be relinked,
//! so the staging directory path must have exactly as many bytes as the
//! hardcoded one. This is verified before anything is extracted or run.

use {
    crate::{bundle::BundleInfo, fsutil, pkgutil::remove_existing},
    log::{debug, info},
    processor_common::{tool::ToolCommand, IoResultExt, ProcessorError, Settings},
    std::{
        ffi::OsStr,
        os::unix::{ffi::OsStrExt, fs::PermissionsExt},
        path::{Path, PathBuf},
    },
    tempfile::TempDir,
};

const STEP: &str = "patch payload";

/// Where things live inside a component package and its payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PayloadLayout {
    /// Compressed payload archive, relative to the package.
    pub archive: String,
    /// Package metadata, relative to the package.
    pub info_plist: String,
    /// Unpacker program, relative to the package.
    pub unpacker: String,
    /// Absolute directory the unpacker has compiled in.
    pub hardcoded_dir: String,
    /// Name of the compressed artifact within the hardcoded directory.
    pub compressed_artifact: String,
    /// Name of the artifact the unpacker produces.
    pub artifact: String,
}

impl PayloadLayout {
    /// Layout of the Flash Player browser plugin package.
    pub fn flash_player() -> Self {
        Self {
            archive: "Contents/Archive.pax.gz".into(),
            info_plist: "Contents/Info.plist".into(),
            unpacker: "Contents/Resources/postflight".into(),
            hardcoded_dir: "/Library/Internet Plug-Ins".into(),
            compressed_artifact: "Flash Player.plugin.lzma".into(),
            artifact: "Flash Player.plugin".into(),
        }
    }

    fn hardcoded_relative(&self) -> &str {
        self.hardcoded_dir.trim_start_matches('/')
    }
}

/// Where and how the staging directory is created.
///
/// The created path is `<parent>/<prefix><random_len random characters>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StagingLocation {
    pub parent: PathBuf,
    pub prefix: String,
    pub random_len: usize,
}

impl Default for StagingLocation {
    fn default() -> Self {
        Self {
            parent: PathBuf::from("/private/tmp"),
            prefix: "flashXX".into(),
            random_len: 6,
        }
    }
}

impl StagingLocation {
    /// Length in bytes of the paths this location produces.
    pub fn path_len(&self) -> usize {
        self.parent.as_os_str().len() + 1 + self.prefix.len() + self.random_len
    }

    fn create(&self) -> Result<TempDir, ProcessorError> {
        tempfile::Builder::new()
            .prefix(&self.prefix)
            .rand_bytes(self.random_len)
            .tempdir_in(&self.parent)
            .step_context(STEP, &self.parent)
    }
}

/// Result of a successful patch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PatchedPayload {
    /// Final location of the expanded artifact.
    pub artifact: PathBuf,
    /// `CFBundleShortVersionString` of the artifact.
    pub version: String,
}

/// Replace every occurrence of `from` in `data` with `to`.
///
/// Returns the new data and the number of replacements.
pub fn replace_bytes(data: &[u8], from: &[u8], to: &[u8]) -> (Vec<u8>, usize) {
    if from.is_empty() {
        return (data.to_vec(), 0);
    }

    let mut out = Vec::with_capacity(data.len());
    let mut count = 0;
    let mut i = 0;

    while i < data.len() {
        if data[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
            count += 1;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }

    (out, count)
}

/// Extracts a component package's payload and runs its redirected unpacker.
pub struct PayloadPatcher<'a> {
    settings: &'a Settings,
    layout: PayloadLayout,
    staging: StagingLocation,
}

impl<'a> PayloadPatcher<'a> {
    pub fn new(settings: &'a Settings, layout: PayloadLayout, staging: StagingLocation) -> Self {
        Self {
            settings,
            layout,
            staging,
        }
    }

    pub fn layout(&self) -> &PayloadLayout {
        &self.layout
    }

    /// Create the staging directory, verifying its path length.
    ///
    /// The directory is removed when the returned value is dropped.
    fn create_staging(&self) -> Result<TempDir, ProcessorError> {
        let staging = self.staging.create()?;
        let actual = staging.path().as_os_str().len();
        let expected = self.layout.hardcoded_dir.len();

        if actual != expected {
            return Err(ProcessorError::invariant(
                STEP,
                format!(
                    "staging directory {} is {} bytes long but must be {} bytes to replace {}",
                    staging.path().display(),
                    actual,
                    expected,
                    self.layout.hardcoded_dir
                ),
            ));
        }

        debug!("{}: staging in {}", STEP, staging.path().display());
        Ok(staging)
    }

    /// Directory inside `target_root` the payload is extracted to.
    fn extraction_path(&self, package: &Path, target_root: &Path) -> Result<PathBuf, ProcessorError> {
        let info = BundleInfo::from_plist_path(&package.join(&self.layout.info_plist))?;
        let install_root = info.string("IFPkgFlagDefaultLocation")?.unwrap_or("/");

        Ok(target_root.join(install_root.trim_start_matches('/')))
    }

    /// Patch the payload of `package`, placing the expanded artifact under `target_root`.
    ///
    /// The staging directory is removed on every exit path.
    pub fn patch(&self, package: &Path, target_root: &Path) -> Result<PatchedPayload, ProcessorError> {
        let archive = package.join(&self.layout.archive);
        if !archive.is_file() {
            return Err(ProcessorError::not_found(STEP, "payload archive", archive));
        }
        let unpacker = package.join(&self.layout.unpacker);
        if !unpacker.is_file() {
            return Err(ProcessorError::not_found(STEP, "payload unpacker", unpacker));
        }
        let extraction = self.extraction_path(package, target_root)?;

        let staging = self.create_staging()?;

        remove_existing(STEP, &extraction)?;
        fsutil::create_dir_0755(STEP, &extraction)?;

        info!("extracting {} to {}", archive.display(), extraction.display());
        ToolCommand::new(STEP, &self.settings.tools.ditto)
            .args(["-x", "-z"])
            .arg(&archive)
            .arg(&extraction)
            .operation(format!(
                "extracting {} into {}",
                archive.display(),
                extraction.display()
            ))
            .timeout(self.settings.tool_timeout)
            .run()?;

        let payload_dir = target_root.join(self.layout.hardcoded_relative());
        let compressed = payload_dir.join(&self.layout.compressed_artifact);
        if !compressed.is_file() {
            return Err(ProcessorError::not_found(
                STEP,
                &self.layout.compressed_artifact,
                compressed,
            ));
        }
        fsutil::move_file(
            STEP,
            &compressed,
            &staging.path().join(&self.layout.compressed_artifact),
        )?;

        let patched_unpacker = self.write_patched_unpacker(&unpacker, staging.path())?;

        info!("running patched unpacker {}", patched_unpacker.display());
        ToolCommand::new(STEP, &patched_unpacker)
            .operation(format!(
                "running patched unpacker {}",
                patched_unpacker.display()
            ))
            .timeout(self.settings.tool_timeout)
            .run()?;

        let staged_artifact = staging.path().join(&self.layout.artifact);
        if !staged_artifact.is_dir() {
            return Err(ProcessorError::not_found(
                STEP,
                format!("decompressed {}", self.layout.artifact),
                staged_artifact,
            ));
        }

        let version = BundleInfo::from_bundle(&staged_artifact)?
            .short_version()?
            .to_string();

        let artifact = payload_dir.join(&self.layout.artifact);
        remove_existing(STEP, &artifact)?;
        fsutil::create_dir_0755(STEP, &payload_dir)?;
        info!("copying {} to {}", staged_artifact.display(), artifact.display());
        fsutil::copy_tree(STEP, &staged_artifact, &artifact)?;

        let staging_path = staging.path().to_path_buf();
        staging.close().step_context(STEP, staging_path)?;

        Ok(PatchedPayload { artifact, version })
    }

    /// Copy the unpacker into `staging` with the hardcoded directory replaced.
    fn write_patched_unpacker(&self, unpacker: &Path, staging: &Path) -> Result<PathBuf, ProcessorError> {
        let staging_bytes = staging.as_os_str().as_bytes();
        let hardcoded = self.layout.hardcoded_dir.as_bytes();

        if staging_bytes.len() != hardcoded.len() {
            return Err(ProcessorError::invariant(
                STEP,
                format!(
                    "replacement {} does not have the length of {}",
                    staging.display(),
                    self.layout.hardcoded_dir
                ),
            ));
        }

        let original = std::fs::read(unpacker).step_context(STEP, unpacker)?;
        let (patched, count) = replace_bytes(&original, hardcoded, staging_bytes);

        if count == 0 {
            return Err(ProcessorError::invariant(
                STEP,
                format!(
                    "{} does not reference {}",
                    unpacker.display(),
                    self.layout.hardcoded_dir
                ),
            ));
        }
        debug!("{}: replaced {} references in {}", STEP, count, unpacker.display());

        let file_name = unpacker.file_name().unwrap_or_else(|| OsStr::new("unpacker"));
        let dest = staging.join(file_name);
        std::fs::write(&dest, patched).step_context(STEP, &dest)?;
        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o700))
            .step_context(STEP, &dest)?;

        Ok(dest)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        super::*,
        crate::bundle::tests::info_plist,
        processor_common::{testutil::write_fake_tool, ErrorKind},
    };

    /// A staging location under /tmp with the length of the Flash Player directory.
    pub(crate) fn test_staging() -> StagingLocation {
        StagingLocation {
            parent: PathBuf::from("/tmp"),
            prefix: "pkgproc-flash".into(),
            random_len: 8,
        }
    }

    /// A `ditto` stand-in that lays down the compressed plugin.
    pub(crate) fn fake_ditto(tools: &Path, marker: &Path) -> std::io::Result<PathBuf> {
        write_fake_tool(
            tools,
            "ditto",
            &format!(
                concat!(
                    "touch '{}'\n",
                    "mkdir -p \"$4/Library/Internet Plug-Ins\" || exit 1\n",
                    "printf 'LZMA' > \"$4/Library/Internet Plug-Ins/Flash Player.plugin.lzma\""
                ),
                marker.display()
            ),
        )
    }

    /// An unpacker that expands the plugin in its hardcoded directory.
    pub(crate) fn unpacker_script(version: &str) -> String {
        format!(
            concat!(
                "#!/bin/sh\n",
                "dir=\"/Library/Internet Plug-Ins\"\n",
                "test -f \"$dir/Flash Player.plugin.lzma\" || {{ echo 'no compressed plugin' >&2; exit 2; }}\n",
                "mkdir -p \"$dir/Flash Player.plugin/Contents/MacOS\"\n",
                "cat > \"$dir/Flash Player.plugin/Contents/Info.plist\" <<'EOF'\n",
                "{}",
                "EOF\n",
            ),
            info_plist("com.macromedia.Flash Player.plugin", version)
        )
    }

    pub(crate) fn write_package(package: &Path, unpacker: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(package.join("Contents/Resources"))?;
        std::fs::write(package.join("Contents/Archive.pax.gz"), b"archive")?;
        std::fs::write(
            package.join("Contents/Info.plist"),
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<plist version=\"1.0\"><dict>",
                "<key>IFPkgFlagDefaultLocation</key><string>/</string>",
                "</dict></plist>\n"
            ),
        )?;
        std::fs::write(package.join("Contents/Resources/postflight"), unpacker)?;
        std::fs::set_permissions(
            package.join("Contents/Resources/postflight"),
            std::fs::Permissions::from_mode(0o755),
        )
    }

    struct Fixture {
        td: TempDir,
        settings: Settings,
        marker: PathBuf,
        package: PathBuf,
        target: PathBuf,
    }

    fn fixture(unpacker: &str) -> std::io::Result<Fixture> {
        let td = processor_common::testutil::temp_dir()?;
        let marker = td.path().join("ditto-ran");

        let mut settings = Settings::default();
        settings.tools.ditto = fake_ditto(td.path(), &marker)?;

        let package = td.path().join("Adobe Flash Player.pkg");
        write_package(&package, unpacker)?;

        let target = td.path().join("pkgroot");

        Ok(Fixture {
            td,
            settings,
            marker,
            package,
            target,
        })
    }

    #[test]
    fn default_staging_matches_flash_player_directory() {
        assert_eq!(StagingLocation::default().path_len(), 26);
        assert_eq!(PayloadLayout::flash_player().hardcoded_dir.len(), 26);
        assert_eq!(test_staging().path_len(), 26);
    }

    #[test]
    fn replace_counts() {
        let (out, count) = replace_bytes(b"a/x/b/x", b"/x", b"/y");
        assert_eq!(out, b"a/y/b/y");
        assert_eq!(count, 2);

        let (out, count) = replace_bytes(b"abc", b"zz", b"yy");
        assert_eq!(out, b"abc");
        assert_eq!(count, 0);
    }

    #[test]
    fn patch_produces_artifact() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(&unpacker_script("32.0.0.465"))?;

        let patcher = PayloadPatcher::new(&f.settings, PayloadLayout::flash_player(), test_staging());
        let patched = patcher.patch(&f.package, &f.target)?;

        assert_eq!(patched.version, "32.0.0.465");
        assert_eq!(
            patched.artifact,
            f.target.join("Library/Internet Plug-Ins/Flash Player.plugin")
        );
        assert!(patched.artifact.join("Contents/Info.plist").is_file());
        assert!(!f
            .target
            .join("Library/Internet Plug-Ins/Flash Player.plugin.lzma")
            .exists());

        // The original unpacker is left alone.
        let original = std::fs::read_to_string(f.package.join("Contents/Resources/postflight"))?;
        assert!(original.contains("/Library/Internet Plug-Ins"));

        Ok(())
    }

    #[test]
    fn stale_extraction_is_replaced() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(&unpacker_script("32.0.0.465"))?;
        std::fs::create_dir_all(&f.target)?;
        std::fs::write(f.target.join("leftover"), b"stale")?;

        PayloadPatcher::new(&f.settings, PayloadLayout::flash_player(), test_staging())
            .patch(&f.package, &f.target)?;

        assert!(!f.target.join("leftover").exists());

        Ok(())
    }

    #[test]
    fn length_mismatch_fails_before_extraction() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(&unpacker_script("32.0.0.465"))?;
        let staging = StagingLocation {
            parent: PathBuf::from("/tmp"),
            prefix: "pkgproc-gate".into(),
            random_len: 8,
        };
        assert_eq!(staging.path_len(), 25);

        let err = PayloadPatcher::new(&f.settings, PayloadLayout::flash_player(), staging)
            .patch(&f.package, &f.target)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert!(!f.marker.exists());
        assert!(!f.target.exists());

        let leftovers = std::fs::read_dir("/tmp")?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("pkgproc-gate"))
            .count();
        assert_eq!(leftovers, 0);

        Ok(())
    }

    #[test]
    fn unpacker_failure_cleans_staging() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("#!/bin/sh\n# /Library/Internet Plug-Ins\necho 'corrupt lzma stream' >&2\nexit 1\n")?;
        let staging = StagingLocation {
            parent: PathBuf::from("/tmp"),
            prefix: "pkgproc-fail".into(),
            random_len: 9,
        };

        let err = PayloadPatcher::new(&f.settings, PayloadLayout::flash_player(), staging)
            .patch(&f.package, &f.target)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
        assert!(err.to_string().contains("corrupt lzma stream"));

        let leftovers = std::fs::read_dir("/tmp")?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("pkgproc-fail"))
            .count();
        assert_eq!(leftovers, 0);

        Ok(())
    }

    #[test]
    fn unpacker_without_artifact() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("#!/bin/sh\n# /Library/Internet Plug-Ins\nexit 0\n")?;

        let err = PayloadPatcher::new(&f.settings, PayloadLayout::flash_player(), test_staging())
            .patch(&f.package, &f.target)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("Flash Player.plugin"));

        Ok(())
    }

    #[test]
    fn unpacker_without_reference() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture("#!/bin/sh\nexit 0\n")?;

        let err = PayloadPatcher::new(&f.settings, PayloadLayout::flash_player(), test_staging())
            .patch(&f.package, &f.target)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvariantViolation);

        Ok(())
    }

    #[test]
    fn missing_archive() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(&unpacker_script("1.0"))?;
        std::fs::remove_file(f.package.join("Contents/Archive.pax.gz"))?;

        let err = PayloadPatcher::new(&f.settings, PayloadLayout::flash_player(), test_staging())
            .patch(&f.package, &f.target)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!f.marker.exists());
        drop(f.td);

        Ok(())
    }
}
