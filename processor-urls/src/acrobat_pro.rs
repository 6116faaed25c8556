// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Adobe Acrobat Pro update metadata from ARM manifests.

use {
    crate::{scrape, UrlVars},
    log::info,
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
    regex::NoExpand,
};

const STEP: &str = "resolve acrobat pro update";

pub const META_BASE_URL: &str = "https://armmf.adobe.com/arm-manifests/mac";
pub const MANIFEST_URL_TEMPLATE: &str =
    "https://armmf.adobe.com/arm-manifests/mac/{MAJREV}/manifest_url_template.txt";
pub const DL_BASE_URL: &str = "http://armdl.adobe.com";
pub const PROD: &str = "com_adobe_Acrobat_Pro";
pub const PROD_ARCH: &str = "univ";
pub const MUNKI_UPDATE_NAME_DEFAULT: &str = "AdobeAcrobatPro{MAJREV}_Update";
pub const VERSION_DEFAULT: &str = "latest";
pub const TARGET_OS_DEFAULT: &str = "10.9";
pub const SUPPORTED_MAJOR_VERSIONS: &[&str] = &["9", "10", "11"];

/// Marker in `PreviousURLTemplate` for updates that apply to any prior version.
const NO_TEMPLATE: &str = "noTemplate";

/// Split a `10.x` target OS into its major and minor components.
///
/// Only `10.6` and later are supported.
pub fn parse_target_os(os_version: &str) -> Result<(String, String), ProcessorError> {
    let mut parts = os_version.split('.');
    let (major, minor) = match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => (major, minor),
        _ => {
            return Err(ProcessorError::invalid_input(
                "target_os",
                format!("OS X version {} not recognised", os_version),
            ))
        }
    };

    if major != "10" {
        return Err(ProcessorError::invalid_input(
            "target_os",
            format!("major OS version {} is not supported", major),
        ));
    }

    let minor_number = minor.parse::<u32>().map_err(|_| {
        ProcessorError::invalid_input(
            "target_os",
            format!("OS X version {} not recognised", os_version),
        )
    })?;
    if minor_number < 6 {
        return Err(ProcessorError::invalid_input(
            "target_os",
            format!("minor OS version {} is not supported", minor),
        ));
    }

    Ok((major.to_string(), minor.to_string()))
}

/// Placeholders for the ARM templates of an Acrobat major version.
pub fn url_vars(major_version: &str, target_os: &str) -> Result<UrlVars, ProcessorError> {
    if !SUPPORTED_MAJOR_VERSIONS.contains(&major_version) {
        return Err(ProcessorError::invalid_input(
            "major_version",
            format!(
                "{} not one of those supported: {}",
                major_version,
                SUPPORTED_MAJOR_VERSIONS.join(", ")
            ),
        ));
    }

    let (os_major, os_minor) = parse_target_os(target_os)?;

    Ok(UrlVars::new()
        .with("PROD", PROD)
        .with("PROD_ARCH", PROD_ARCH)
        .with("MAJREV", major_version)
        .with("OS_VER_MAJ", os_major)
        .with("OS_VER_MIN", os_minor))
}

/// Manifest URL for `version`, given the published manifest URL template.
///
/// For anything but `latest`, every dotted triple in the template is
/// replaced by the requested version.
pub fn manifest_url(
    vars: &UrlVars,
    template_response: &str,
    version: &str,
) -> Result<String, ProcessorError> {
    let template = template_response.trim();

    let path = if version == VERSION_DEFAULT {
        template.to_string()
    } else {
        scrape::compile(STEP, r"\d+\.\d+\.\d+")?
            .replace_all(template, NoExpand(version))
            .into_owned()
    };

    Ok(vars.substitute(&format!("{}{}", META_BASE_URL, path)))
}

/// The fields of an ARM manifest used here.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Manifest {
    pub patch_url: String,
    pub build_number: String,
    pub previous_url_template: Option<String>,
}

/// Parse an ARM manifest property list. `PatchURL` must be present.
pub fn parse_manifest(url: &str, data: &[u8]) -> Result<Manifest, ProcessorError> {
    let value =
        plist::Value::from_reader(std::io::Cursor::new(data)).map_err(|e| ProcessorError::parse(STEP, url, e))?;
    let dict = value
        .as_dictionary()
        .ok_or_else(|| ProcessorError::parse(STEP, url, "manifest is not a dictionary"))?;

    let string = |key: &str| dict.get(key).and_then(|v| v.as_string()).map(String::from);

    Ok(Manifest {
        patch_url: string("PatchURL").ok_or_else(|| {
            ProcessorError::parse(STEP, url, "manifest plist key 'PatchURL' not found")
        })?,
        build_number: string("BuildNumber").ok_or_else(|| {
            ProcessorError::parse(STEP, url, "manifest plist key 'BuildNumber' not found")
        })?,
        previous_url_template: string("PreviousURLTemplate"),
    })
}

impl Manifest {
    /// URL of the manifest of the update this one requires, if any.
    pub fn previous_manifest_url(&self, vars: &UrlVars) -> Option<String> {
        match self.previous_url_template.as_deref() {
            None | Some(NO_TEMPLATE) => None,
            Some(template) => Some(vars.substitute(&format!("{}{}", META_BASE_URL, template))),
        }
    }
}

/// Whether `version` is a base release (`x.0.0`, `x.00.0`, ...) that needs no prior update.
pub fn is_base_version(version: &str) -> Result<bool, ProcessorError> {
    Ok(scrape::compile(STEP, r"\.0+\.0+$")?.is_match(version))
}

/// Build the Munki pkginfo fragment for an update.
pub fn additional_pkginfo(
    update_name: &str,
    version: &str,
    previous_version: Option<&str>,
    target_os: &str,
) -> Result<plist::Dictionary, ProcessorError> {
    let mut pkginfo = plist::Dictionary::new();

    if let Some(previous) = previous_version {
        if !is_base_version(previous)? {
            info!("Update requires previous version: {}", previous);
            pkginfo.insert(
                "requires".into(),
                plist::Value::Array(vec![format!("{}-{}", update_name, previous).into()]),
            );
        }
    }

    pkginfo.insert(
        "minimum_os_version".into(),
        format!("{}.0", target_os).into(),
    );
    pkginfo.insert("version".into(), version.into());

    Ok(pkginfo)
}

pub struct AdobeAcrobatProUpdateInfoProvider;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::optional("target_os", "OS X version. Defaults to 10.9"),
    VariableSpec::required("major_version", "Major version. Currently supports: 9, 10, 11"),
    VariableSpec::optional("version", "Update version number. Defaults to latest."),
    VariableSpec::optional(
        "munki_update_name",
        "Name for the update in Munki. Defaults to AdobeAcrobatPro{MAJREV}_Update",
    ),
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("url", "URL to the latest Adobe Acrobat Pro update."),
    OutputSpec::new("version", "Version for this update."),
    OutputSpec::new(
        "additional_pkginfo",
        "A pkginfo possibly containing additional 'requires' items.",
    ),
];

impl Processor for AdobeAcrobatProUpdateInfoProvider {
    fn name(&self) -> &'static str {
        "AdobeAcrobatProUpdateInfoProvider"
    }

    fn description(&self) -> &'static str {
        "Provides URL to the latest Adobe Acrobat Pro release."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let target_os = env.get_str_or("target_os", TARGET_OS_DEFAULT).to_string();
        let requested = env.get_str_or("version", VERSION_DEFAULT).to_string();
        let vars = url_vars(env.require_str("major_version")?, &target_os)?;
        let update_name =
            vars.substitute(env.get_str_or("munki_update_name", MUNKI_UPDATE_NAME_DEFAULT));

        let template = http::fetch_text(&vars.substitute(MANIFEST_URL_TEMPLATE), &[])?;
        let url = manifest_url(&vars, &template, &requested)?;
        let manifest = parse_manifest(&url, &http::fetch_bytes(&url, &[])?)?;

        let previous_version = match manifest.previous_manifest_url(&vars) {
            Some(previous_url) => {
                let previous =
                    parse_manifest(&previous_url, &http::fetch_bytes(&previous_url, &[])?)?;
                Some(previous.build_number)
            }
            None => None,
        };

        let pkginfo = additional_pkginfo(
            &update_name,
            &manifest.build_number,
            previous_version.as_deref(),
            &target_os,
        )?;
        let download_url = format!("{}{}", DL_BASE_URL, manifest.patch_url);
        info!("Found URL {}", download_url);

        env.set("additional_pkginfo", plist::Value::Dictionary(pkginfo));
        env.set("url", download_url);
        env.set("version", manifest.build_number);

        Ok(())
    }
}
