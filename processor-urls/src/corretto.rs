// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    log::info,
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
};

const STEP: &str = "resolve corretto url";

pub const INDEXMAP_URL: &str = "https://raw.githubusercontent.com/corretto/corretto-downloads/main/latest_links/indexmap_with_checksum.json";
pub const DOWNLOAD_BASE_URL: &str = "https://corretto.aws";

/// A Corretto installer located in the index map.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CorrettoRelease {
    pub url: String,
    pub version: String,
    pub supported_architectures: String,
}

/// Locate the macOS pkg for an architecture (`x64` or `aarch64`) and major version.
pub fn find_release(
    indexmap: &serde_json::Value,
    architecture: &str,
    major_version: &str,
) -> Result<CorrettoRelease, ProcessorError> {
    let pointer = format!("/macos/{}/jdk/{}/pkg/resource", architecture, major_version);

    let tail = indexmap
        .pointer(&pointer)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ProcessorError::parse(
                STEP,
                "corretto indexmap",
                format!("no pkg for architecture {} and version {}", architecture, major_version),
            )
        })?;

    // /downloads/resources/17.0.4.9.1/amazon-corretto-17.0.4.9.1-macosx-x64.pkg
    let version = tail.splitn(4, '-').nth(2).ok_or_else(|| {
        ProcessorError::parse(STEP, tail, "resource name has no version component")
    })?;

    Ok(CorrettoRelease {
        url: format!("{}{}", DOWNLOAD_BASE_URL, tail),
        version: version.to_string(),
        supported_architectures: if architecture == "x64" {
            "x86_64"
        } else {
            "arm64"
        }
        .to_string(),
    })
}

pub struct CorrettoURLGetter;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::with_default(
        "corretto_indexmap_url",
        INDEXMAP_URL,
        "URL to indexmap of Corretto installers",
    ),
    VariableSpec::required(
        "major_version",
        "Major version of corretto to use: 8,11,17,18",
    ),
    VariableSpec::required("architecture", "Architecture to use, x64 or aarch64"),
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("version", "Version of latest major version"),
    OutputSpec::new("url", "Download URL for specified version and architecture"),
    OutputSpec::new(
        "supported_architectures",
        "Converted to Munki supported architecture type",
    ),
];

impl Processor for CorrettoURLGetter {
    fn name(&self) -> &'static str {
        "CorrettoURLGetter"
    }

    fn description(&self) -> &'static str {
        "Provides the download URL and version of the latest Amazon Corretto pkg for a \
         major version and architecture."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let indexmap: serde_json::Value =
            http::fetch_json(STEP, env.get_str_or("corretto_indexmap_url", INDEXMAP_URL), &[])?;
        info!("Got latest indexmap");

        let release = find_release(
            &indexmap,
            env.require_str("architecture")?,
            env.require_str("major_version")?,
        )?;
        info!("Found URL {}", release.url);

        env.set("url", release.url);
        env.set("version", release.version);
        env.set("supported_architectures", release.supported_architectures);

        Ok(())
    }
}
