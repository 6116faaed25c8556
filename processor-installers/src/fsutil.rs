// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Filesystem helpers shared by processors.

use {
    processor_common::{IoResultExt, ProcessorError},
    std::{
        os::unix::fs::{DirBuilderExt, PermissionsExt},
        path::Path,
    },
};

/// Recursively copy `source` to `dest`, recreating symlinks rather than following them.
///
/// `dest` must not exist. File permissions are carried over. Directory
/// modes are applied once everything has been copied, so read-only
/// directories can still be populated.
pub fn copy_tree(step: &'static str, source: &Path, dest: &Path) -> Result<(), ProcessorError> {
    if dest.symlink_metadata().is_ok() {
        return Err(ProcessorError::invariant(
            step,
            format!("refusing to copy over existing {}", dest.display()),
        ));
    }

    let mut dir_modes = vec![];

    for entry in walkdir::WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            ProcessorError::io(step, path, e.into())
        })?;

        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ProcessorError::invariant(step, e))?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            let link = std::fs::read_link(entry.path()).step_context(step, entry.path())?;
            std::os::unix::fs::symlink(&link, &target).step_context(step, &target)?;
        } else if file_type.is_dir() {
            std::fs::create_dir_all(&target).step_context(step, &target)?;
            let mode = entry
                .metadata()
                .map_err(|e| ProcessorError::io(step, entry.path(), e.into()))?
                .permissions()
                .mode();
            dir_modes.push((target, mode));
        } else {
            std::fs::copy(entry.path(), &target).step_context(step, &target)?;
        }
    }

    // Deepest first, so a read-only parent never blocks its children.
    for (target, mode) in dir_modes.into_iter().rev() {
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode))
            .step_context(step, &target)?;
    }

    Ok(())
}

/// Move a file, falling back to copy and delete across filesystems.
pub fn move_file(step: &'static str, source: &Path, dest: &Path) -> Result<(), ProcessorError> {
    if std::fs::rename(source, dest).is_ok() {
        return Ok(());
    }

    std::fs::copy(source, dest).step_context(step, dest)?;
    std::fs::remove_file(source).step_context(step, source)
}

/// Create a directory and its parents with mode 0755.
pub fn create_dir_0755(step: &'static str, path: &Path) -> Result<(), ProcessorError> {
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(path)
        .step_context(step, path)?;

    // The builder's mode is filtered by the umask.
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).step_context(step, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_preserves_symlinks() -> Result<(), Box<dyn std::error::Error>> {
        let td = processor_common::testutil::temp_dir()?;
        let source = td.path().join("Install.app");
        let versions = source.join("Contents/Frameworks/Foo.framework/Versions/A");
        std::fs::create_dir_all(&versions)?;
        std::fs::write(versions.join("Foo"), b"binary")?;
        std::os::unix::fs::symlink(
            "A",
            source.join("Contents/Frameworks/Foo.framework/Versions/Current"),
        )?;

        let dest = td.path().join("Copy.app");
        copy_tree("test", &source, &dest)?;

        let link = dest.join("Contents/Frameworks/Foo.framework/Versions/Current");
        assert!(link.symlink_metadata()?.file_type().is_symlink());
        assert_eq!(std::fs::read_link(&link)?, Path::new("A"));
        assert_eq!(
            std::fs::read(dest.join("Contents/Frameworks/Foo.framework/Versions/A/Foo"))?,
            b"binary"
        );

        Ok(())
    }

    #[test]
    fn copy_into_read_only_directory() -> Result<(), Box<dyn std::error::Error>> {
        let td = processor_common::testutil::temp_dir()?;
        let source = td.path().join("Plugin.bundle");
        let resources = source.join("Contents/Resources");
        std::fs::create_dir_all(&resources)?;
        std::fs::write(resources.join("strings"), b"data")?;
        std::fs::set_permissions(&resources, std::fs::Permissions::from_mode(0o555))?;

        let dest = td.path().join("Copy.bundle");
        let res = copy_tree("test", &source, &dest);

        let copied = dest.join("Contents/Resources");
        let mode = std::fs::metadata(&copied).map(|m| m.permissions().mode() & 0o777);
        let data = std::fs::read(copied.join("strings"));

        // Allow the temporary directory to be cleaned up.
        for dir in [&resources, &copied] {
            let _ = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755));
        }

        res?;
        assert_eq!(mode?, 0o555);
        assert_eq!(data?, b"data");

        Ok(())
    }

    #[test]
    fn copy_refuses_existing_destination() -> Result<(), Box<dyn std::error::Error>> {
        let td = processor_common::testutil::temp_dir()?;
        let dest = td.path().join("dest");
        std::fs::create_dir(&dest)?;

        assert!(copy_tree("test", td.path(), &dest).is_err());

        Ok(())
    }

    #[test]
    fn created_directory_mode() -> Result<(), Box<dyn std::error::Error>> {
        let td = processor_common::testutil::temp_dir()?;
        let path = td.path().join("a/b/c");

        create_dir_0755("test", &path)?;
        assert_eq!(std::fs::metadata(&path)?.permissions().mode() & 0o777, 0o755);

        Ok(())
    }
}
