// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disk image handling.
//!
//! Mounting goes through the [DiskImageMounter] trait so procedures that
//! operate on mounted images can be exercised without `hdiutil`.
//! [with_mounted_image] scopes a mount to a closure and guarantees the
//! image is detached exactly once however the closure exits.

use {
    log::{debug, info, warn},
    processor_common::{tool::ToolCommand, ProcessorError, Settings},
    std::{
        io::Cursor,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// Something able to attach and detach disk images.
pub trait DiskImageMounter {
    /// Attach `image` read-only and return its mount point.
    fn mount(&self, image: &Path) -> Result<PathBuf, ProcessorError>;

    /// Detach an image previously attached by [Self::mount].
    fn unmount(&self, image: &Path, mount_point: &Path) -> Result<(), ProcessorError>;
}

/// A mounted image that is detached when dropped.
pub struct MountedImage<'a> {
    mounter: &'a dyn DiskImageMounter,
    image: PathBuf,
    mount_point: PathBuf,
    mounted: bool,
}

impl<'a> MountedImage<'a> {
    pub fn new(mounter: &'a dyn DiskImageMounter, image: &Path) -> Result<Self, ProcessorError> {
        let mount_point = mounter.mount(image)?;
        debug!("mounted {} at {}", image.display(), mount_point.display());

        Ok(Self {
            mounter,
            image: image.to_path_buf(),
            mount_point,
            mounted: true,
        })
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Detach the image, reporting failure.
    pub fn unmount(mut self) -> Result<(), ProcessorError> {
        self.mounted = false;
        self.mounter.unmount(&self.image, &self.mount_point)
    }
}

impl<'a> Drop for MountedImage<'a> {
    fn drop(&mut self) {
        if self.mounted {
            self.mounted = false;
            if let Err(e) = self.mounter.unmount(&self.image, &self.mount_point) {
                warn!("error unmounting {}: {}", self.image.display(), e);
            }
        }
    }
}

/// Mount `image`, run `body` with its mount point, then unmount it.
///
/// The image is unmounted exactly once on every path out of `body`,
/// including errors and panics. An error from `body` takes precedence over
/// an unmount error.
pub fn with_mounted_image<T>(
    mounter: &dyn DiskImageMounter,
    image: &Path,
    body: impl FnOnce(&Path) -> Result<T, ProcessorError>,
) -> Result<T, ProcessorError> {
    let mounted = MountedImage::new(mounter, image)?;

    match body(mounted.mount_point()) {
        Ok(value) => {
            mounted.unmount()?;
            Ok(value)
        }
        Err(e) => {
            drop(mounted);
            Err(e)
        }
    }
}

/// Extract the first mount point from `hdiutil attach -plist` output.
///
/// Images carrying a license agreement print it ahead of the plist, so
/// everything before the XML declaration is ignored.
pub fn mount_point_from_attach_output(stdout: &str) -> Result<PathBuf, ProcessorError> {
    const STEP: &str = "mount disk image";

    let start = stdout.find("<?xml").unwrap_or(0);

    let value = plist::Value::from_reader(Cursor::new(stdout[start..].as_bytes()))
        .map_err(|e| ProcessorError::parse(STEP, "hdiutil attach output", e))?;

    value
        .as_dictionary()
        .and_then(|d| d.get("system-entities"))
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(|entity| entity.as_dictionary())
        .find_map(|entity| entity.get("mount-point").and_then(|v| v.as_string()))
        .map(PathBuf::from)
        .ok_or_else(|| {
            ProcessorError::parse(STEP, "hdiutil attach output", "no mount-point entity")
        })
}

/// Find the first device node `hdiutil attach` reported.
///
/// The whole-disk entry comes first. The output is scanned as text so a
/// device can be found even when the plist is unusable.
pub fn attached_device(stdout: &str) -> Option<&str> {
    let start = stdout.find("/dev/disk")?;
    let rest = &stdout[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '/'))
        .unwrap_or(rest.len());

    Some(&rest[..end])
}

/// [DiskImageMounter] backed by `hdiutil`.
#[derive(Clone, Debug)]
pub struct Hdiutil {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Hdiutil {
    pub fn new(settings: &Settings) -> Self {
        Self {
            program: settings.tools.hdiutil.clone(),
            timeout: settings.tool_timeout,
        }
    }

    /// Create a disk image from the content of a directory.
    pub fn create(&self, options: &CreateOptions, source: &Path, image: &Path) -> Result<(), ProcessorError> {
        const STEP: &str = "create disk image";

        let mut command = ToolCommand::new(STEP, &self.program)
            .args(["create", "-plist", "-format", &options.format])
            .arg("-imagekey")
            .arg(format!("zlib-level={}", options.zlib_level));

        if let Some(megabytes) = options.megabytes {
            command = command.arg("-megabytes").arg(megabytes.to_string());
        }

        info!("creating {} from {}", image.display(), source.display());
        command
            .arg("-srcfolder")
            .arg(source)
            .arg(image)
            .operation(format!(
                "creating disk image {} from {}",
                image.display(),
                source.display()
            ))
            .timeout(self.timeout)
            .run()?;

        Ok(())
    }
}

impl DiskImageMounter for Hdiutil {
    fn mount(&self, image: &Path) -> Result<PathBuf, ProcessorError> {
        const STEP: &str = "mount disk image";

        if !image.exists() {
            return Err(ProcessorError::not_found(STEP, "disk image", image));
        }

        info!("mounting {}", image.display());
        let output = ToolCommand::new(STEP, &self.program)
            .args(["attach", "-plist", "-nobrowse", "-readonly", "-mountrandom", "/tmp"])
            .arg(image)
            .stdin_bytes(b"Y\n".to_vec())
            .operation(format!("attaching {}", image.display()))
            .timeout(self.timeout)
            .run()?;

        mount_point_from_attach_output(&output.stdout).map_err(|err| {
            // The image is attached but unusable; don't leave it behind.
            if let Some(device) = attached_device(&output.stdout) {
                warn!("detaching {} after unusable attach output", device);
                if let Err(e) = ToolCommand::new(STEP, &self.program)
                    .args(["detach", device])
                    .timeout(self.timeout)
                    .run()
                {
                    warn!("{}", e);
                }
            }

            err
        })
    }

    fn unmount(&self, image: &Path, mount_point: &Path) -> Result<(), ProcessorError> {
        debug!("unmounting {}", image.display());

        ToolCommand::new("unmount disk image", &self.program)
            .arg("detach")
            .arg(mount_point)
            .operation(format!(
                "detaching {} from {}",
                image.display(),
                mount_point.display()
            ))
            .timeout(self.timeout)
            .run()?;

        Ok(())
    }
}

/// Parameters of `hdiutil create`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateOptions {
    pub format: String,
    pub zlib_level: u8,
    pub megabytes: Option<u64>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            format: "UDZO".to_string(),
            zlib_level: 5,
            megabytes: None,
        }
    }
}
