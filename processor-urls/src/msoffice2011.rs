// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Microsoft AutoUpdate feed for Office 2011.

use {
    crate::msoffice::{trigger_condition_is, Trigger},
    log::info,
    processor_common::{
        http, version::compare_loose, Environment, OutputSpec, Processor, ProcessorError,
        VariableSpec,
    },
    serde::Deserialize,
    std::{collections::BTreeMap, time::SystemTime},
    url::Url,
};

const STEP: &str = "resolve office 2011 update";

pub const CULTURE_CODE: &str = "0409";
pub const MUNKI_UPDATE_NAME: &str = "Office2011_update";
pub const DOWNLOAD_URL_SCHEME: &str = "http";
pub const BASE_URL: &str = "http://www.microsoft.com/mac/autoupdate/{CULTURE_CODE}MSOf14.xml";
pub const USER_AGENT: &str =
    "Microsoft%20AutoUpdate/3.0.2 CFNetwork/720.2.4 Darwin/14.1.0 (x86_64)";

/// Component plugin trigger file that identifies an installed Office 2011.
const MCP_FILE: &str = "Office/MicrosoftComponentPlugin.framework";
const MCP_INSTALL_PATH: &str =
    "/Applications/Microsoft Office 2011/Office/MicrosoftComponentPlugin.framework";
/// Base release; updates requiring it require nothing.
const BASE_VERSION: &str = "14.0.0";

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateItem {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Payload")]
    pub payload: String,
    #[serde(rename = "Short Description", default)]
    pub short_description: String,
    #[serde(rename = "Max OS")]
    pub max_os: Option<plist::Value>,
    #[serde(rename = "Min OS")]
    pub min_os: Option<plist::Value>,
    #[serde(rename = "Date")]
    pub date: Option<plist::Date>,
    #[serde(rename = "Trigger Condition")]
    pub trigger_condition: Option<Vec<String>>,
    #[serde(rename = "Triggers", default)]
    pub triggers: BTreeMap<String, Trigger>,
}

impl UpdateItem {
    /// Version from a title of the form `Office 2011 14.7.7 Update`.
    pub fn version(&self) -> String {
        self.title.replace("Office 2011 ", "").replace(" Update", "")
    }

    fn check_triggers(&self) -> Result<(), ProcessorError> {
        if !trigger_condition_is(self.trigger_condition.as_deref(), &["and", "MCP"]) {
            return Err(ProcessorError::parse(
                STEP,
                &self.title,
                format!("unexpected Trigger Condition {:?}", self.trigger_condition),
            ));
        }

        if !self.triggers.contains_key("MCP") {
            return Err(ProcessorError::parse(
                STEP,
                &self.title,
                "missing expected MCP Trigger",
            ));
        }

        Ok(())
    }

    /// The `installs` item for updates triggered by the component plugin.
    pub fn installs_item(&self) -> Result<Option<plist::Dictionary>, ProcessorError> {
        self.check_triggers()?;

        if !self
            .triggers
            .values()
            .any(|t| t.file.as_deref() == Some(MCP_FILE))
        {
            return Ok(None);
        }

        let version = self.version();
        let mut item = plist::Dictionary::new();
        item.insert("CFBundleShortVersionString".into(), version.clone().into());
        item.insert("CFBundleVersion".into(), version.into());
        item.insert("path".into(), MCP_INSTALL_PATH.into());
        item.insert("type".into(), "bundle".into());
        item.insert(
            "version_comparison_key".into(),
            "CFBundleShortVersionString".into(),
        );

        Ok(Some(item))
    }

    /// The lowest component plugin version this update applies to, unless it is the base release.
    pub fn required_version(&self) -> Result<Option<String>, ProcessorError> {
        self.check_triggers()?;

        let lowest = self
            .triggers
            .get("MCP")
            .and_then(|t| t.versions.iter().min_by(|a, b| compare_loose(a, b)));

        Ok(match lowest {
            Some(v) if v != BASE_VERSION => Some(v.clone()),
            _ => None,
        })
    }
}

/// Convert a packed OS version to dotted form: `0x1058` (or 4184) becomes `10.5.8`.
///
/// The first two hex digits are read as a decimal major version and the
/// following two as single-digit hex minor and patch versions.
pub fn os_version_string(value: &plist::Value) -> Result<String, ProcessorError> {
    let unexpected = || ProcessorError::parse(STEP, "OS version", format!("unexpected value {:?}", value));

    let digits = match value {
        plist::Value::Integer(i) => format!("{:x}", i.as_unsigned().ok_or_else(unexpected)?),
        plist::Value::String(s) => s.strip_prefix("0x").ok_or_else(unexpected)?.to_string(),
        _ => return Err(unexpected()),
    };

    let (major, minor, patch) = match digits.len() {
        0 => return Err(unexpected()),
        1 => (digits.as_str(), None, None),
        _ => (
            &digits[..2],
            digits.get(2..3),
            digits.get(3..4),
        ),
    };

    let major = major.parse::<u32>().map_err(|_| unexpected())?;
    let hex = |digit: Option<&str>| -> Result<u32, ProcessorError> {
        digit
            .map(|d| u32::from_str_radix(d, 16).map_err(|_| unexpected()))
            .unwrap_or(Ok(0))
    };

    Ok(format!("{}.{}.{}", major, hex(minor)?, hex(patch)?))
}

/// Pick the item for `version`: the newest by `Date` for `latest`, else
/// the only item whose title contains ` <version> `.
pub fn select_item(items: Vec<UpdateItem>, version: &str) -> Result<UpdateItem, ProcessorError> {
    if version == "latest" {
        return items
            .into_iter()
            .max_by_key(|item| item.date.map(SystemTime::from))
            .ok_or_else(|| ProcessorError::parse(STEP, "update metadata", "no updates listed"));
    }

    let padded = format!(" {} ", version);
    let titles = items
        .iter()
        .map(|item| format!("'{}'", item.title))
        .collect::<Vec<_>>()
        .join(", ");

    let mut matched = items
        .into_iter()
        .filter(|item| item.title.contains(&padded))
        .collect::<Vec<_>>();

    if matched.len() != 1 {
        return Err(ProcessorError::parse(
            STEP,
            "update metadata",
            format!(
                "could not find version {} in update metadata. Updates that are available: {}",
                version, titles
            ),
        ));
    }

    Ok(matched.remove(0))
}

/// Rewrite a download URL to use `scheme`. Unparseable URLs are returned unchanged.
pub fn with_scheme(location: &str, scheme: &str) -> String {
    if scheme == DOWNLOAD_URL_SCHEME {
        return location.to_string();
    }

    match Url::parse(location) {
        Ok(mut url) => {
            if url.set_scheme(scheme).is_ok() {
                url.to_string()
            } else {
                location.to_string()
            }
        }
        Err(_) => location.to_string(),
    }
}

/// Build the Munki pkginfo fragment for an update.
pub fn additional_pkginfo(
    item: &UpdateItem,
    munki_update_name: &str,
) -> Result<plist::Dictionary, ProcessorError> {
    let mut pkginfo = plist::Dictionary::new();
    pkginfo.insert(
        "description".into(),
        format!("<html>{}</html>", item.short_description).into(),
    );
    pkginfo.insert("display_name".into(), item.title.clone().into());

    for (key, value, name) in [
        ("maximum_os_version", &item.max_os, "Max OS"),
        ("minimum_os_version", &item.min_os, "Min OS"),
    ] {
        let value = value
            .as_ref()
            .ok_or_else(|| ProcessorError::parse(STEP, &item.title, format!("no '{}' key", name)))?;
        let version = os_version_string(value)?;
        if version != "0.0.0" {
            pkginfo.insert(key.into(), version.into());
        }
    }

    if let Some(installs) = item.installs_item()? {
        pkginfo.insert(
            "installs".into(),
            plist::Value::Array(vec![plist::Value::Dictionary(installs)]),
        );
    }

    if let Some(required) = item.required_version()? {
        info!("Update requires previous update version {}", required);
        pkginfo.insert(
            "requires".into(),
            plist::Value::Array(vec![format!("{}-{}", munki_update_name, required).into()]),
        );
    }

    pkginfo.insert("name".into(), munki_update_name.into());

    Ok(pkginfo)
}

pub struct MSOffice2011UpdateInfoProvider;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::optional(
        "culture_code",
        "See http://msdn.microsoft.com/en-us/library/ee825488(v=cs.20).aspx for a table of \
         CultureCodes Defaults to 0409, which corresponds to en-US (English - United States)",
    ),
    VariableSpec::optional(
        "base_url",
        "Default is http://www.microsoft.com/mac/autoupdate/0409MSOf14.xml. If this is given, \
         culture_code is ignored.",
    ),
    VariableSpec::optional(
        "download_url_scheme",
        "A value of https will use an undocumented download. Defaults to 'http'",
    ),
    VariableSpec::optional("version", "Update version number. Defaults to latest."),
    VariableSpec::optional(
        "munki_update_name",
        "Name for the update in Munki repo. Defaults to 'Office2011_update'",
    ),
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("url", "URL to the latest Office 2011 update."),
    OutputSpec::new("pkg_name", "Name of the package within the disk image."),
    OutputSpec::new(
        "additional_pkginfo",
        "Some pkginfo fields extracted from the Microsoft metadata.",
    ),
    OutputSpec::new(
        "version",
        "The version of the update as extracted from the Microsoft metadata.",
    ),
];

impl Processor for MSOffice2011UpdateInfoProvider {
    fn name(&self) -> &'static str {
        "MSOffice2011UpdateInfoProvider"
    }

    fn description(&self) -> &'static str {
        "Provides a download URL for an Office 2011 update."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let base_url = match env.get_str("base_url").filter(|u| !u.is_empty()) {
            Some(url) => url.to_string(),
            None => crate::UrlVars::new()
                .with("CULTURE_CODE", env.get_str_or("culture_code", CULTURE_CODE))
                .substitute(BASE_URL),
        };
        let munki_update_name = env
            .get_str_or("munki_update_name", MUNKI_UPDATE_NAME)
            .to_string();

        let items: Vec<UpdateItem> =
            http::fetch_plist(STEP, &base_url, &[("User-Agent", USER_AGENT)])?;
        let item = select_item(items, env.get_str_or("version", "latest"))?;

        let url = with_scheme(
            &item.location,
            env.get_str_or("download_url_scheme", DOWNLOAD_URL_SCHEME),
        );
        info!("Found URL {}", url);
        info!("Got update: '{}'", item.title);

        let pkginfo = additional_pkginfo(&item, &munki_update_name)?;
        info!("Additional pkginfo: {:?}", pkginfo);

        env.set("url", url);
        env.set("pkg_name", item.payload.clone());
        env.set("version", item.version());
        env.set("additional_pkginfo", plist::Value::Dictionary(pkginfo));

        Ok(())
    }
}
