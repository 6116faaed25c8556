// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Expanding and flattening flat installer packages with `pkgutil`.

use {
    log::{debug, info},
    processor_common::{tool::ToolCommand, IoResultExt, ProcessorError, Settings},
    std::path::{Path, PathBuf},
};

/// Remove whatever exists at `path`, file or directory.
pub fn remove_existing(step: &'static str, path: &Path) -> Result<(), ProcessorError> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => {
            debug!("{}: removing stale {}", step, path.display());
            std::fs::remove_dir_all(path).step_context(step, path)
        }
        Ok(_) => {
            debug!("{}: removing stale {}", step, path.display());
            std::fs::remove_file(path).step_context(step, path)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ProcessorError::io(step, path, e)),
    }
}

/// Expand the flat package `pkg` into the directory `target`.
///
/// Any existing `target` is removed first so stale content never mixes
/// with a fresh expansion. Returns the expanded root.
pub fn expand(settings: &Settings, pkg: &Path, target: &Path) -> Result<PathBuf, ProcessorError> {
    const STEP: &str = "expand package";

    remove_existing(STEP, target)?;

    info!("expanding {} to {}", pkg.display(), target.display());
    ToolCommand::new(STEP, &settings.tools.pkgutil)
        .arg("--expand")
        .arg(pkg)
        .arg(target)
        .operation(format!("expanding {} into {}", pkg.display(), target.display()))
        .timeout(settings.tool_timeout)
        .run()?;

    Ok(target.to_path_buf())
}

/// Flatten the expanded tree `expanded` into the package file `destination`.
///
/// Any existing `destination` is removed first.
pub fn flatten(
    settings: &Settings,
    expanded: &Path,
    destination: &Path,
) -> Result<(), ProcessorError> {
    const STEP: &str = "flatten package";

    remove_existing(STEP, destination)?;

    info!("flattening {} to {}", expanded.display(), destination.display());
    ToolCommand::new(STEP, &settings.tools.pkgutil)
        .arg("--flatten")
        .arg(expanded)
        .arg(destination)
        .operation(format!(
            "flattening {} into {}",
            expanded.display(),
            destination.display()
        ))
        .timeout(settings.tool_timeout)
        .run()?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        super::*,
        processor_common::{testutil::write_fake_tool, ErrorKind},
    };

    /// A `pkgutil` stand-in that uses `tar` as the flat package format.
    pub(crate) const TAR_PKGUTIL: &str = r#"
case "$1" in
  --expand)
    test -e "$3" && { echo "$3 already exists" >&2; exit 1; }
    mkdir -p "$3" && tar -xf "$2" -C "$3"
    ;;
  --flatten)
    test -e "$3" && { echo "$3 already exists" >&2; exit 1; }
    tar -cf "$3" -C "$2" .
    ;;
  *)
    echo "unknown option $1" >&2
    exit 2
    ;;
esac
"#;

    pub(crate) fn tar_settings(tools: &Path, cache: &Path) -> std::io::Result<Settings> {
        let mut settings = Settings {
            cache_dir: cache.to_path_buf(),
            ..Default::default()
        };
        settings.tools.pkgutil = write_fake_tool(tools, "pkgutil", TAR_PKGUTIL)?;

        Ok(settings)
    }

    #[test]
    fn expand_replaces_stale_tree() -> Result<(), Box<dyn std::error::Error>> {
        let td = processor_common::testutil::temp_dir()?;
        let settings = tar_settings(td.path(), td.path())?;

        let source = td.path().join("source");
        std::fs::create_dir(&source)?;
        std::fs::write(source.join("Distribution"), b"<installer-gui-script/>")?;
        let pkg = td.path().join("input.pkg");
        flatten(&settings, &source, &pkg)?;

        let target = td.path().join("expanded");
        std::fs::create_dir(&target)?;
        std::fs::write(target.join("stale"), b"old")?;

        let expanded = expand(&settings, &pkg, &target)?;
        assert_eq!(expanded, target);
        assert!(!target.join("stale").exists());
        assert_eq!(
            std::fs::read(target.join("Distribution"))?,
            b"<installer-gui-script/>"
        );

        Ok(())
    }

    #[test]
    fn flatten_replaces_existing_file() -> Result<(), Box<dyn std::error::Error>> {
        let td = processor_common::testutil::temp_dir()?;
        let settings = tar_settings(td.path(), td.path())?;

        let source = td.path().join("source");
        std::fs::create_dir(&source)?;
        std::fs::write(source.join("Distribution"), b"x")?;

        let destination = td.path().join("out.pkg");
        std::fs::write(&destination, b"previous run")?;

        flatten(&settings, &source, &destination)?;
        assert_ne!(std::fs::read(&destination)?, b"previous run");

        Ok(())
    }

    #[test]
    fn flatten_failure_reports_stderr() -> Result<(), Box<dyn std::error::Error>> {
        let td = processor_common::testutil::temp_dir()?;
        let mut settings = Settings::default();
        settings.tools.pkgutil = write_fake_tool(td.path(), "pkgutil", "echo 'bad CPIO' >&2\nexit 1")?;

        let destination = td.path().join("out.pkg");
        let err = flatten(&settings, td.path(), &destination).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
        let message = err.to_string();
        assert!(message.contains("bad CPIO"));
        assert!(message.contains(&destination.display().to_string()));

        Ok(())
    }

    #[test]
    fn expand_failure_is_tool_failure() -> Result<(), Box<dyn std::error::Error>> {
        let td = processor_common::testutil::temp_dir()?;
        let mut settings = Settings::default();
        settings.tools.pkgutil =
            write_fake_tool(td.path(), "pkgutil", "echo 'Error opening file' >&2\nexit 1")?;

        let err = expand(&settings, &td.path().join("missing.pkg"), &td.path().join("x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
        assert!(err.to_string().contains("Error opening file"));

        Ok(())
    }
}
