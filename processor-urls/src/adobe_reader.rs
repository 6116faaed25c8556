// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Adobe Reader download locations.
//!
//! Full installers are listed by the get.adobe.com web service. Updates are
//! described by the Adobe Reader Manager (ARM) manifests, which are located
//! through small text templates with `{NAME}` placeholders.

use {
    crate::UrlVars,
    log::{debug, info},
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
    serde::Deserialize,
};

pub const STANDALONE_BASE_URL: &str = "http://get.adobe.com/reader/webservices/json/standalone/?platform_type=Macintosh&platform_dist=OSX&platform_arch=x86-32&platform_misc={OS_VERSION}&language={LANGUAGE}&eventname=readerotherversions";

pub const LANGUAGE_DEFAULT: &str = "English";
pub const MAJOR_VERSION_DEFAULT: &str = "11";
pub const OS_VERSION_DEFAULT: &str = "10.8.0";

/// Fill in the OS version and language of a standalone listing URL.
///
/// Besides `{OS_VERSION}` and `{LANGUAGE}`, positional `%s` placeholders
/// (OS version first) are accepted in custom base URLs.
pub fn standalone_request_url(base_url: &str, os_version: &str, language: &str) -> String {
    UrlVars::new()
        .with("OS_VERSION", os_version)
        .with("LANGUAGE", language)
        .substitute(base_url)
        .replacen("%s", os_version, 1)
        .replacen("%s", language, 1)
}

/// An entry of the standalone installer listing.
#[derive(Clone, Debug, Deserialize)]
pub struct StandaloneRelease {
    pub download_url: String,
}

/// Pick the first installer whose URL lives under the major version's directory.
pub fn select_installer_url(releases: &[StandaloneRelease], major_version: &str) -> Option<String> {
    let needle = format!("adobe/reader/mac/{}", major_version);

    releases
        .iter()
        .find(|r| r.download_url.contains(&needle))
        .map(|r| r.download_url.clone())
}

pub struct AdobeReaderURLProvider;

static READER_INPUTS: &[VariableSpec] = &[
    VariableSpec::optional(
        "language",
        "Which language to download. Examples: 'English', 'German', 'Japanese', 'Swedish'. \
         Default is English.",
    ),
    VariableSpec::optional(
        "os_version",
        "OS X version to use in URL search. Defaults to 10.8.0. Reader DC requires '10.9.0'",
    ),
    VariableSpec::optional(
        "major_version",
        "Major version. Examples: '10', '11', 'AcrobatDC'. Defaults to 11",
    ),
    VariableSpec::optional("base_url", "Default is the get.adobe.com standalone web service."),
];

static READER_OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "url",
    "URL to the latest Adobe Reader release.",
)];

impl Processor for AdobeReaderURLProvider {
    fn name(&self) -> &'static str {
        "AdobeReaderURLProvider"
    }

    fn description(&self) -> &'static str {
        "Provides URL to the latest Adobe Reader release."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        READER_INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        READER_OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        const STEP: &str = "resolve reader url";

        let language = env.get_str_or("language", LANGUAGE_DEFAULT);
        let major_version = env.get_str_or("major_version", MAJOR_VERSION_DEFAULT);
        let request_url = standalone_request_url(
            env.get_str_or("base_url", STANDALONE_BASE_URL),
            env.get_str_or("os_version", OS_VERSION_DEFAULT),
            language,
        );

        let releases: Vec<StandaloneRelease> = http::fetch_json(
            STEP,
            &request_url,
            &[("x-requested-with", "XMLHttpRequest")],
        )?;

        let url = select_installer_url(&releases, major_version).ok_or_else(|| {
            ProcessorError::parse(
                STEP,
                &request_url,
                format!(
                    "can't find Adobe Reader download URL for {}, version {}",
                    language, major_version
                ),
            )
        })?;

        info!("Found URL {}", url);
        env.set("url", url);

        Ok(())
    }
}

pub const ARM_BASE_URL: &str = "https://armmf.adobe.com/arm-manifests/mac";
pub const UPDATER_DOWNLOAD_BASE_URL: &str = "http://ardownload.adobe.com";
pub const CURRENT_VERSION_TEMPLATE: &str = "/{MAJREV}/current_version_url_template.txt";
pub const MANIFEST_TEMPLATE: &str = "/{MAJREV}/manifest_url_template.txt";
pub const READER_PROD: &str = "com_adobe_Reader";
pub const READER_PROD_ARCH: &str = "univ";
pub const UPDATES_OS_VERSION_DEFAULT: &str = "10.8";

/// Placeholders for ARM templates for a Reader major version and OS.
///
/// `os_version` must be of the form `major.minor`.
pub fn updates_url_vars(major_version: &str, os_version: &str) -> Result<UrlVars, ProcessorError> {
    let (os_major, os_minor) = match os_version.split('.').collect::<Vec<_>>()[..] {
        [major, minor] => (major, minor),
        _ => {
            return Err(ProcessorError::invalid_input(
                "os_version",
                format!("expected major.minor, got {}", os_version),
            ))
        }
    };

    Ok(UrlVars::new()
        .with("MAJREV", major_version)
        .with("OS_VER_MAJ", os_major)
        .with("OS_VER_MIN", os_minor)
        .with("PROD", READER_PROD)
        .with("PROD_ARCH", READER_PROD_ARCH))
}

/// The part of an ARM manifest needed to locate the update.
#[derive(Clone, Debug, Deserialize)]
pub struct UpdateManifest {
    #[serde(rename = "PatchURL")]
    pub patch_url: String,
}

pub struct AdobeReaderUpdatesURLProvider;

static UPDATES_INPUTS: &[VariableSpec] = &[
    VariableSpec::optional(
        "major_version",
        "Major version. Examples: '10', '11'. Defaults to 11",
    ),
    VariableSpec::with_default(
        "os_version",
        UPDATES_OS_VERSION_DEFAULT,
        "Version of OS X to check. Default: 10.8",
    ),
];

static UPDATES_OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("url", "URL to the latest Adobe Reader release."),
    OutputSpec::new("version", "Version for this update."),
];

impl Processor for AdobeReaderUpdatesURLProvider {
    fn name(&self) -> &'static str {
        "AdobeReaderUpdatesURLProvider"
    }

    fn description(&self) -> &'static str {
        "Provides URL to the latest Adobe Reader release."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        UPDATES_INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        UPDATES_OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        const STEP: &str = "resolve reader update";

        let major_version = env.get_str_or("major_version", MAJOR_VERSION_DEFAULT);
        let vars = updates_url_vars(
            major_version,
            env.get_str_or("os_version", UPDATES_OS_VERSION_DEFAULT),
        )?;

        let version_template = http::fetch_text(
            &format!("{}{}", ARM_BASE_URL, vars.substitute(CURRENT_VERSION_TEMPLATE)),
            &[],
        )?;
        let version_url = format!("{}{}", ARM_BASE_URL, vars.substitute(version_template.trim()));
        debug!("current version published at {}", version_url);
        let version = http::fetch_text(&version_url, &[])?.trim().to_string();

        let manifest_template = http::fetch_text(
            &format!("{}{}", ARM_BASE_URL, vars.substitute(MANIFEST_TEMPLATE)),
            &[],
        )?;
        let manifest_url = format!("{}{}", ARM_BASE_URL, vars.substitute(manifest_template.trim()));
        let manifest: UpdateManifest = http::fetch_plist(STEP, &manifest_url, &[])?;

        let url = format!("{}{}", UPDATER_DOWNLOAD_BASE_URL, manifest.patch_url);
        info!("Found URL {}", url);

        env.set("url", url);
        env.set("version", version);

        Ok(())
    }
}
