// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading and writing bundle `Info.plist` metadata.

use {
    processor_common::{IoResultExt, ProcessorError},
    std::path::{Path, PathBuf},
};

const STEP: &str = "read bundle metadata";

/// The `Info.plist` of a bundle or flat component package.
#[derive(Clone, Debug)]
pub struct BundleInfo {
    path: PathBuf,
    info: plist::Dictionary,
}

impl BundleInfo {
    /// Load `Contents/Info.plist` of the bundle at `bundle`.
    pub fn from_bundle(bundle: &Path) -> Result<Self, ProcessorError> {
        Self::from_plist_path(&bundle.join("Contents").join("Info.plist"))
    }

    /// Load a specific plist file.
    pub fn from_plist_path(path: &Path) -> Result<Self, ProcessorError> {
        if !path.is_file() {
            return Err(ProcessorError::not_found(STEP, "Info.plist", path));
        }

        let info = plist::Value::from_file(path)
            .map_err(|e| ProcessorError::parse(STEP, path.display(), e))?
            .into_dictionary()
            .ok_or_else(|| ProcessorError::parse(STEP, path.display(), "root is not a dictionary"))?;

        Ok(Self {
            path: path.to_path_buf(),
            info,
        })
    }

    pub fn plist_path(&self) -> &Path {
        &self.path
    }

    pub fn dictionary(&self) -> &plist::Dictionary {
        &self.info
    }

    /// Obtain a string value, if present.
    ///
    /// A present value of another type is an error.
    pub fn string(&self, key: &str) -> Result<Option<&str>, ProcessorError> {
        match self.info.get(key) {
            None => Ok(None),
            Some(value) => value.as_string().map(Some).ok_or_else(|| {
                ProcessorError::parse(
                    STEP,
                    self.path.display(),
                    format!("{} is not a string", key),
                )
            }),
        }
    }

    pub fn require_string(&self, key: &str) -> Result<&str, ProcessorError> {
        self.string(key)?.ok_or_else(|| {
            ProcessorError::parse(STEP, self.path.display(), format!("missing key {}", key))
        })
    }

    pub fn short_version(&self) -> Result<&str, ProcessorError> {
        self.require_string("CFBundleShortVersionString")
    }

    pub fn identifier(&self) -> Result<&str, ProcessorError> {
        self.require_string("CFBundleIdentifier")
    }

    pub fn set_string(&mut self, key: &str, value: impl ToString) {
        self.info
            .insert(key.to_string(), plist::Value::String(value.to_string()));
    }

    /// Write the metadata back to its file as an XML plist.
    pub fn write(&self) -> Result<(), ProcessorError> {
        let mut data = vec![];
        plist::Value::Dictionary(self.info.clone())
            .to_writer_xml(&mut data)
            .map_err(|e| ProcessorError::parse("write bundle metadata", self.path.display(), e))?;

        std::fs::write(&self.path, data).step_context("write bundle metadata", &self.path)
    }
}
