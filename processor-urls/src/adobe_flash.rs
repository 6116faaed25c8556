// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    log::info,
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
    std::io::Cursor,
    xml::reader::{ParserConfig, XmlEvent},
};

const STEP: &str = "resolve flash player url";

pub const UPDATE_XML_URL: &str =
    "http://fpdownload2.macromedia.com/get/flashplayer/update/current/xml/version_en_mac_pl.xml";

pub const DOWNLOAD_TEMPLATE_URL: &str =
    "https://fpdownload.macromedia.com/get/flashplayer/pdc/{VERSION}/install_flash_player_osx.dmg";

/// Extract the `version` attribute of `<XML><update .../></XML>`.
///
/// The version is returned as published, with comma separators.
pub fn parse_update_version(data: &[u8]) -> Result<String, ProcessorError> {
    let reader = ParserConfig::new().create_reader(Cursor::new(data));
    let mut depth = 0usize;

    for event in reader {
        match event.map_err(|e| ProcessorError::parse(STEP, UPDATE_XML_URL, e))? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                if depth == 0 && name.local_name != "XML" {
                    break;
                }

                if depth == 1 && name.local_name == "update" {
                    return attributes
                        .into_iter()
                        .find(|a| a.name.local_name == "version")
                        .map(|a| a.value)
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| {
                            ProcessorError::parse(
                                STEP,
                                UPDATE_XML_URL,
                                "update element has no version",
                            )
                        });
                }

                depth += 1;
            }
            XmlEvent::EndElement { .. } => {
                depth -= 1;
            }
            _ => {}
        }
    }

    Err(ProcessorError::parse(
        STEP,
        UPDATE_XML_URL,
        "update XML in unexpected format",
    ))
}

/// Download URL for a Flash Player version in either `32,0,0,465` or `32.0.0.465` form.
pub fn download_url(version: &str) -> String {
    crate::UrlVars::new()
        .with("VERSION", version.replace(',', "."))
        .substitute(DOWNLOAD_TEMPLATE_URL)
}

pub struct AdobeFlashURLProvider;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::optional(
        "url",
        "Override URL. If provided, this processor just returns without doing anything.",
    ),
    VariableSpec::optional(
        "version",
        "Specific version to download. If not defined, defaults to latest version.",
    ),
];

static OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "url",
    "URL to the latest Adobe Flash Player release.",
)];

impl Processor for AdobeFlashURLProvider {
    fn name(&self) -> &'static str {
        "AdobeFlashURLProvider"
    }

    fn description(&self) -> &'static str {
        "Provides URL to the latest Adobe Flash Player release."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        if let Some(url) = env.get_str("url") {
            info!("Using input URL {}", url);
            return Ok(());
        }

        let version = match env.get_str("version").filter(|v| !v.is_empty()) {
            Some(version) => {
                info!("Using provided version {}", version);
                version.to_string()
            }
            None => parse_update_version(&http::fetch_bytes(UPDATE_XML_URL, &[])?)?,
        };

        let url = download_url(&version);
        info!("Found URL {}", url);
        env.set("url", url);

        Ok(())
    }
}
