// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers for tests that exercise processors against stand-in tools.

use std::{
    io::Write,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

/// Write an executable shell script standing in for an external program.
///
/// `body` is appended after a `#!/bin/sh` line.
pub fn write_fake_tool(dir: &Path, name: &str, body: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(name);

    let mut fh = std::fs::File::create(&path)?;
    fh.write_all(b"#!/bin/sh\n")?;
    fh.write_all(body.as_bytes())?;
    fh.write_all(b"\n")?;
    drop(fh);

    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;

    Ok(path)
}

/// Create a temporary directory with a recognizable prefix.
pub fn temp_dir() -> std::io::Result<tempfile::TempDir> {
    tempfile::Builder::new().prefix("pkgproc-test").tempdir()
}
