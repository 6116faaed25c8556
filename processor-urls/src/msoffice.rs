// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Microsoft AutoUpdate feeds for Office 2016 and later.
//!
//! Each application has a property list feed per update channel, listing
//! update items. Full updaters and delta updaters are distinguished by the
//! presence of a `FullUpdaterLocation` key on deltas.

use {
    log::info,
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
    regex::Regex,
    serde::Deserialize,
    std::collections::BTreeMap,
};

const STEP: &str = "resolve office update";

pub const CULTURE_CODE: &str = "0409";
pub const BASE_URL: &str = "https://officecdn.microsoft.com/pr/{CHANNEL}/MacAutoupdate/{APP_ID}.xml";
pub const USER_AGENT: &str =
    "Microsoft%20AutoUpdate/3.6.16080300 CFNetwork/760.6.3 Darwin/15.6.0 (x86_64)";
pub const DEFAULT_MINIMUM_OS: &str = "10.10.5";
pub const DEFAULT_CHANNEL: &str = "Production";
pub const LOCALE_ID_INFO_URL: &str = "https://msdn.microsoft.com/en-us/goglobal/bb964664.aspx";

/// An application known to Microsoft AutoUpdate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Product {
    pub name: &'static str,
    /// Application ID, as found in `com.microsoft.autoupdate2.plist`.
    pub id: &'static str,
    /// Install location, used for the `installs` item.
    pub path: &'static str,
    pub minimum_os: Option<&'static str>,
}

const fn product(
    name: &'static str,
    id: &'static str,
    path: &'static str,
    minimum_os: Option<&'static str>,
) -> Product {
    Product {
        name,
        id,
        path,
        minimum_os,
    }
}

const MAU_PATH: &str = "/Library/Application Support/Microsoft/MAU2.0/Microsoft AutoUpdate.app";

pub static PRODUCTS: &[Product] = &[
    product("Excel2016", "XCEL15", "/Applications/Microsoft Excel.app", None),
    product("Excel2019", "XCEL2019", "/Applications/Microsoft Excel.app", Some("10.12")),
    product("OneNote2016", "ONMC15", "/Applications/Microsoft OneNote.app", None),
    product("OneNote2019", "ONMC2019", "/Applications/Microsoft OneNote.app", Some("10.12")),
    product("Outlook2016", "OPIM15", "/Applications/Microsoft Outlook.app", None),
    product("Outlook2019", "OPIM2019", "/Applications/Microsoft Outlook.app", Some("10.12")),
    product("PowerPoint2016", "PPT315", "/Applications/Microsoft PowerPoint.app", None),
    product("PowerPoint2019", "PPT32019", "/Applications/Microsoft PowerPoint.app", Some("10.12")),
    product("Word2016", "MSWD15", "/Applications/Microsoft Word.app", None),
    product("Word2019", "MSWD2019", "/Applications/Microsoft Word.app", Some("10.12")),
    product("SkypeForBusiness", "MSFB16", "/Applications/Skype for Business.app", None),
    product("AutoUpdate03", "MSau03", MAU_PATH, None),
    product("AutoUpdate04", "MSau04", MAU_PATH, None),
    product("DefenderATP", "WDAV00", "/Applications/Microsoft Defender ATP.app", Some("10.12")),
];

/// Products whose feeds carry no trigger condition to check.
const UNTRIGGERED_PRODUCTS: &[&str] = &["SkypeForBusiness"];

pub static CHANNELS: &[(&str, &str)] = &[
    ("Production", "C1297A47-86C4-4C1F-97FA-950631F94777"),
    ("InsiderSlow", "1ac37578-5a24-40fb-892e-b89d85b6dfaa"),
    ("InsiderFast", "4B2D7701-0A4F-49C8-B4CB-0C2D4043F51F"),
];

pub fn find_product(name: &str) -> Result<&'static Product, ProcessorError> {
    PRODUCTS.iter().find(|p| p.name == name).ok_or_else(|| {
        ProcessorError::invalid_input(
            "product",
            format!(
                "{} is not one of: {}",
                name,
                PRODUCTS.iter().map(|p| p.name).collect::<Vec<_>>().join(", ")
            ),
        )
    })
}

/// Resolve a channel name or a custom channel UUID to the UUID in feed URLs.
pub fn channel_id(channel: &str) -> Result<String, ProcessorError> {
    if let Some((_, id)) = CHANNELS.iter().find(|(name, _)| *name == channel) {
        return Ok(id.to_string());
    }

    let uuid = Regex::new(r"^[0-9a-fA-F]{8}-([0-9a-fA-F]{4}-){3}[0-9a-fA-F]{12}$")
        .map_err(|e| ProcessorError::invariant(STEP, e))?;

    if uuid.is_match(channel) {
        Ok(channel.to_string())
    } else {
        Err(ProcessorError::invalid_input(
            "channel",
            format!(
                "must be one of: {} or a custom uuid",
                CHANNELS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ))
    }
}

pub fn feed_url(channel_id: &str, product: &Product) -> String {
    crate::UrlVars::new()
        .with("CHANNEL", channel_id)
        .with("APP_ID", format!("{}{}", CULTURE_CODE, product.id))
        .substitute(BASE_URL)
}

/// The kind of update requested through the `version` input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateKind {
    /// The first full updater.
    Latest,
    /// The first full updater, as a standalone installer.
    LatestStandalone,
    /// The first delta updater.
    LatestDelta,
}

impl UpdateKind {
    pub const SUPPORTED: &'static [&'static str] = &["latest", "latest-delta", "latest-standalone"];

    pub fn parse(value: &str) -> Result<Self, ProcessorError> {
        match value {
            "latest" => Ok(Self::Latest),
            "latest-standalone" => Ok(Self::LatestStandalone),
            "latest-delta" => Ok(Self::LatestDelta),
            _ => Err(ProcessorError::invalid_input(
                "version",
                format!("supported values are '{}'", Self::SUPPORTED.join("', '")),
            )),
        }
    }
}

/// A trigger of an update item.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Trigger {
    #[serde(rename = "File")]
    pub file: Option<String>,
    #[serde(rename = "Versions", default)]
    pub versions: Vec<String>,
    #[serde(rename = "VersionsRelative", default)]
    pub versions_relative: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Localization {
    #[serde(rename = "Short Description", default)]
    pub short_description: String,
}

/// An entry of an application's update feed.
#[derive(Clone, Debug, Deserialize)]
pub struct UpdateItem {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "FullUpdaterLocation")]
    pub full_updater_location: Option<String>,
    #[serde(rename = "Update Version")]
    pub update_version: Option<String>,
    #[serde(rename = "Minimum OS")]
    pub minimum_os: Option<String>,
    #[serde(rename = "Localized", default)]
    pub localized: BTreeMap<String, Localization>,
    #[serde(rename = "Trigger Condition")]
    pub trigger_condition: Option<Vec<String>>,
    #[serde(rename = "Triggers", default)]
    pub triggers: BTreeMap<String, Trigger>,
}

impl UpdateItem {
    pub fn is_delta(&self) -> bool {
        self.full_updater_location
            .as_deref()
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    pub fn version(&self) -> Result<&str, ProcessorError> {
        self.update_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ProcessorError::parse(
                    STEP,
                    &self.title,
                    "update item has no 'Update Version'",
                )
            })
    }
}

/// Whether an item's `Trigger Condition` is exactly `expected`.
pub fn trigger_condition_is(condition: Option<&[String]>, expected: &[&str]) -> bool {
    condition
        .map(|c| c.iter().map(String::as_str).eq(expected.iter().copied()))
        .unwrap_or(false)
}

/// Pick the update item for `kind`: the first full or delta updater in feed order.
///
/// For standalone requests the updater package URL is rewritten to the
/// matching installer package.
pub fn select_item(items: Vec<UpdateItem>, kind: UpdateKind) -> Result<UpdateItem, ProcessorError> {
    let want_delta = kind == UpdateKind::LatestDelta;

    let mut item = items
        .into_iter()
        .find(|item| item.is_delta() == want_delta)
        .ok_or_else(|| {
            ProcessorError::parse(STEP, "update metadata", "could not find an applicable update")
        })?;

    if kind == UpdateKind::LatestStandalone {
        const UPDATER_SUFFIX: &str = "_Updater.pkg";

        let stem = item.location.strip_suffix(UPDATER_SUFFIX).ok_or_else(|| {
            ProcessorError::parse(
                STEP,
                &item.location,
                "updater URL in unexpected format; cannot determine standalone URL",
            )
        })?;
        item.location = format!("{}_Installer.pkg", stem);
    }

    Ok(item)
}

/// Everything derived from a selected update item.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateInfo {
    pub url: String,
    pub version: String,
    pub description: String,
    pub minimum_os_version: String,
    /// Empty unless the update is a delta.
    pub minimum_version_for_delta: String,
    pub pkginfo: plist::Dictionary,
}

/// Derive the processor outputs from a selected update item.
///
/// `required_update_name` names the item a delta update requires; it is
/// only consulted for deltas.
pub fn update_info(
    item: &UpdateItem,
    product: &Product,
    kind: UpdateKind,
    locale_id: &str,
    required_update_name: Option<&str>,
) -> Result<UpdateInfo, ProcessorError> {
    let description = item
        .localized
        .get(locale_id)
        .map(|l| l.short_description.clone())
        .ok_or_else(|| {
            ProcessorError::invalid_input(
                "locale_id",
                format!(
                    "locale ID {} not found in manifest metadata. Available IDs: {}. See {} for \
                     more details.",
                    locale_id,
                    item.localized.keys().cloned().collect::<Vec<_>>().join(", "),
                    LOCALE_ID_INFO_URL
                ),
            )
        })?;

    let minimum_os_version = item
        .minimum_os
        .as_deref()
        .filter(|v| !v.is_empty())
        .or(product.minimum_os)
        .unwrap_or(DEFAULT_MINIMUM_OS)
        .to_string();

    if !UNTRIGGERED_PRODUCTS.contains(&product.name)
        && !trigger_condition_is(item.trigger_condition.as_deref(), &["and", "Registered File"])
    {
        return Err(ProcessorError::parse(
            STEP,
            &item.title,
            format!("unexpected Trigger Condition {:?}", item.trigger_condition),
        ));
    }

    let version = item.version()?.to_string();

    let mut install = plist::Dictionary::new();
    install.insert("CFBundleVersion".into(), version.clone().into());
    install.insert("path".into(), product.path.into());
    install.insert("type".into(), "application".into());

    let mut pkginfo = plist::Dictionary::new();
    pkginfo.insert("description".into(), format!("<html>{}</html>", description).into());
    pkginfo.insert("minimum_os_version".into(), minimum_os_version.clone().into());

    let mut minimum_version_for_delta = String::new();

    if kind == UpdateKind::LatestDelta {
        let relative = item
            .triggers
            .get("Registered File")
            .map(|t| t.versions_relative.as_slice())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ProcessorError::parse(
                    STEP,
                    &item.title,
                    "can't find expected VersionsRelative keys for determining minimum update \
                     required for delta update",
                )
            })?;

        minimum_version_for_delta = relative
            .iter()
            .find_map(|expression| match expression.split_whitespace().collect::<Vec<_>>()[..] {
                [">=", version] => Some(version.to_string()),
                _ => None,
            })
            .ok_or_else(|| {
                ProcessorError::parse(
                    STEP,
                    &item.title,
                    "not able to determine minimum required version for delta update",
                )
            })?;

        let required_update_name = required_update_name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ProcessorError::MissingInput("NAME".into()))?;

        info!("Adding minimum required version: {}", minimum_version_for_delta);
        install.insert(
            "minimum_update_version".into(),
            minimum_version_for_delta.clone().into(),
        );
        pkginfo.insert(
            "requires".into(),
            plist::Value::Array(vec![format!(
                "{}-{}",
                required_update_name, minimum_version_for_delta
            )
            .into()]),
        );
    }

    pkginfo.insert(
        "installs".into(),
        plist::Value::Array(vec![plist::Value::Dictionary(install)]),
    );

    Ok(UpdateInfo {
        url: item.location.clone(),
        version,
        description,
        minimum_os_version,
        minimum_version_for_delta,
        pkginfo,
    })
}

pub struct MSOfficeMacURLandUpdateInfoProvider;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::with_default(
        "locale_id",
        "1033",
        "Locale ID that determines the language that is retrieved from the metadata, currently \
         only used by the update description. The default is en-US.",
    ),
    VariableSpec::required("product", "Name of product to fetch, e.g. Excel2016."),
    VariableSpec::with_default(
        "version",
        "latest",
        "Update type to fetch. Supported values are: 'latest', 'latest-delta', \
         'latest-standalone'. Defaults to latest.",
    ),
    VariableSpec::with_default(
        "munki_required_update_name",
        "",
        "If the update is a delta, a 'requires' key will be set according to the minimum \
         version defined in the MS metadata. If this key is set, this name will be used for the \
         required item. If unset, NAME will be used.",
    ),
    VariableSpec::with_default(
        "channel",
        DEFAULT_CHANNEL,
        "Update feed channel that will be checked for updates. Defaults to Production, \
         acceptable values are either a custom UUID or one of: Production, InsiderSlow, \
         InsiderFast",
    ),
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new(
        "additional_pkginfo",
        "Some pkginfo fields extracted from the Microsoft metadata.",
    ),
    OutputSpec::new(
        "description",
        "Description of the update from the manifest, in the language given by the locale_id \
         input variable.",
    ),
    OutputSpec::new(
        "version",
        "The version of the update as extracted from the Microsoft metadata.",
    ),
    OutputSpec::new(
        "minimum_os_version",
        "The minimum os version required by the update as extracted from the Microsoft metadata.",
    ),
    OutputSpec::new(
        "minimum_version_for_delta",
        "If this update is a delta, this value will be set to the minimum required application \
         version to which this delta can be applied. Otherwise it will be an empty string.",
    ),
    OutputSpec::new("url", "URL to the latest installer."),
];

impl Processor for MSOfficeMacURLandUpdateInfoProvider {
    fn name(&self) -> &'static str {
        "MSOfficeMacURLandUpdateInfoProvider"
    }

    fn description(&self) -> &'static str {
        "Provides a download URL for the most recent version of MS Office 2016."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let kind = UpdateKind::parse(env.get_str_or("version", "latest"))?;
        let product = find_product(env.require_str("product")?)?;
        let channel = channel_id(env.get_str_or("channel", DEFAULT_CHANNEL))?;

        let url = feed_url(&channel, product);
        info!("Requesting xml: {}", url);
        let items: Vec<UpdateItem> = http::fetch_plist(STEP, &url, &[("User-Agent", USER_AGENT)])?;

        let item = select_item(items, kind)?;
        info!("Found URL {}", item.location);
        info!("Got update: '{}'", item.title);

        let required_update_name = env
            .get_str("munki_required_update_name")
            .filter(|n| !n.is_empty())
            .or_else(|| env.get_str("NAME"));

        let info = update_info(
            &item,
            product,
            kind,
            env.get_str_or("locale_id", "1033"),
            required_update_name,
        )?;
        info!("Additional pkginfo: {:?}", info.pkginfo);

        env.set("url", info.url);
        env.set("version", info.version);
        env.set("description", info.description);
        env.set("minimum_os_version", info.minimum_os_version);
        env.set("minimum_version_for_delta", info.minimum_version_for_delta);
        env.set("additional_pkginfo", plist::Value::Dictionary(info.pkginfo));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc, processor_common::ErrorKind};

    const FEED: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <plist version="1.0">
        <array>
            <dict>
                <key>Title</key>
                <string>Microsoft Excel Update 16.54.0</string>
                <key>Location</key>
                <string>https://officecdn.microsoft.com/pr/C1297A47/MacAutoupdate/Microsoft_Excel_16.54.21101001_Delta.pkg</string>
                <key>FullUpdaterLocation</key>
                <string>https://officecdn.microsoft.com/pr/C1297A47/MacAutoupdate/Microsoft_Excel_16.54.21101001_Updater.pkg</string>
                <key>Update Version</key>
                <string>16.54.21101001</string>
                <key>Minimum OS</key>
                <string>10.14</string>
                <key>Localized</key>
                <dict>
                    <key>1033</key>
                    <dict><key>Short Description</key><string>Delta update for Excel</string></dict>
                </dict>
                <key>Trigger Condition</key>
                <array><string>and</string><string>Registered File</string></array>
                <key>Triggers</key>
                <dict>
                    <key>Registered File</key>
                    <dict>
                        <key>File</key>
                        <string>Microsoft Excel.app</string>
                        <key>VersionsRelative</key>
                        <array><string>&lt; 16.54.21101001</string><string>&gt;= 16.53.21091200</string></array>
                    </dict>
                </dict>
            </dict>
            <dict>
                <key>Title</key>
                <string>Microsoft Excel Update 16.54.0</string>
                <key>Location</key>
                <string>https://officecdn.microsoft.com/pr/C1297A47/MacAutoupdate/Microsoft_Excel_16.54.21101001_Updater.pkg</string>
                <key>Update Version</key>
                <string>16.54.21101001</string>
                <key>Localized</key>
                <dict>
                    <key>1033</key>
                    <dict><key>Short Description</key><string>Update for Excel</string></dict>
                    <key>1031</key>
                    <dict><key>Short Description</key><string>Update f&#252;r Excel</string></dict>
                </dict>
                <key>Trigger Condition</key>
                <array><string>and</string><string>Registered File</string></array>
            </dict>
        </array>
        </plist>
    "#};

    fn feed() -> Vec<UpdateItem> {
        plist::from_bytes(FEED.as_bytes()).expect("fixture feed parses")
    }

    fn excel() -> &'static Product {
        find_product("Excel2019").expect("Excel2019 is a known product")
    }

    #[test]
    fn channels() -> Result<(), ProcessorError> {
        assert_eq!(channel_id("Production")?, "C1297A47-86C4-4C1F-97FA-950631F94777");
        assert_eq!(
            channel_id("1ac37578-5a24-40fb-892e-b89d85b6dfaa")?,
            "1ac37578-5a24-40fb-892e-b89d85b6dfaa"
        );
        assert_eq!(channel_id("Beta").unwrap_err().kind(), ErrorKind::Input);

        Ok(())
    }

    #[test]
    fn feed_location() {
        assert_eq!(
            feed_url("C1297A47-86C4-4C1F-97FA-950631F94777", excel()),
            "https://officecdn.microsoft.com/pr/C1297A47-86C4-4C1F-97FA-950631F94777/MacAutoupdate/0409XCEL2019.xml"
        );
    }

    #[test]
    fn latest_full_update() -> Result<(), ProcessorError> {
        let item = select_item(feed(), UpdateKind::Latest)?;
        let info = update_info(&item, excel(), UpdateKind::Latest, "1033", None)?;

        assert!(info.url.ends_with("_Updater.pkg"));
        assert_eq!(info.version, "16.54.21101001");
        assert_eq!(info.description, "Update for Excel");
        assert_eq!(info.minimum_os_version, "10.12");
        assert_eq!(info.minimum_version_for_delta, "");
        assert!(!info.pkginfo.contains_key("requires"));

        let installs = info
            .pkginfo
            .get("installs")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|v| v.as_dictionary())
            .expect("installs item");
        assert_eq!(
            installs.get("path").and_then(|v| v.as_string()),
            Some("/Applications/Microsoft Excel.app")
        );
        assert_eq!(
            installs.get("CFBundleVersion").and_then(|v| v.as_string()),
            Some("16.54.21101001")
        );

        Ok(())
    }

    #[test]
    fn localized_description() -> Result<(), ProcessorError> {
        let item = select_item(feed(), UpdateKind::Latest)?;
        let info = update_info(&item, excel(), UpdateKind::Latest, "1031", None)?;
        assert_eq!(info.description, "Update f\u{fc}r Excel");

        let err = update_info(&item, excel(), UpdateKind::Latest, "1041", None).unwrap_err();
        assert!(err.to_string().contains("1031, 1033"));

        Ok(())
    }

    #[test]
    fn standalone_installer() -> Result<(), ProcessorError> {
        let item = select_item(feed(), UpdateKind::LatestStandalone)?;
        assert!(item
            .location
            .ends_with("Microsoft_Excel_16.54.21101001_Installer.pkg"));

        let mut items = feed();
        items[1].location = "https://example.com/Excel.pkg".into();
        let err = select_item(items, UpdateKind::LatestStandalone).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);

        Ok(())
    }

    #[test]
    fn delta_requires_previous() -> Result<(), ProcessorError> {
        let item = select_item(feed(), UpdateKind::LatestDelta)?;
        let info = update_info(
            &item,
            excel(),
            UpdateKind::LatestDelta,
            "1033",
            Some("MSExcel2019"),
        )?;

        assert!(info.url.ends_with("_Delta.pkg"));
        assert_eq!(info.minimum_os_version, "10.14");
        assert_eq!(info.minimum_version_for_delta, "16.53.21091200");
        assert_eq!(
            info.pkginfo.get("requires"),
            Some(&plist::Value::Array(vec!["MSExcel2019-16.53.21091200".into()]))
        );

        let err = update_info(&item, excel(), UpdateKind::LatestDelta, "1033", None).unwrap_err();
        assert!(matches!(err, ProcessorError::MissingInput(_)));

        Ok(())
    }

    #[test]
    fn unexpected_trigger_condition() -> Result<(), ProcessorError> {
        let mut item = select_item(feed(), UpdateKind::Latest)?;
        item.trigger_condition = Some(vec!["or".into(), "Registered File".into()]);

        let err = update_info(&item, excel(), UpdateKind::Latest, "1033", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);

        // Skype for Business feeds carry no trigger condition.
        item.trigger_condition = None;
        let skype = find_product("SkypeForBusiness")?;
        let info = update_info(&item, skype, UpdateKind::Latest, "1033", None)?;
        assert_eq!(info.minimum_os_version, DEFAULT_MINIMUM_OS);

        Ok(())
    }

    #[test]
    fn unsupported_kind() {
        let err = UpdateKind::parse("16.54").unwrap_err();
        assert!(err.to_string().contains("latest-standalone"));
    }
}
