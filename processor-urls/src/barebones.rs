// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    log::info,
    processor_common::{
        http, version::compare_loose, Environment, OutputSpec, Processor, ProcessorError,
        VariableSpec,
    },
    serde::Deserialize,
};

const STEP: &str = "resolve barebones url";

/// Update feeds by product name.
pub const PRODUCT_FEEDS: &[(&str, &str)] =
    &[("bbedit", "https://versioncheck.barebones.com/BBEdit.xml")];

#[derive(Clone, Debug, Deserialize)]
pub struct FeedEntry {
    #[serde(rename = "SUFeedEntryShortVersionString")]
    pub version: String,
    #[serde(rename = "SUFeedEntryDownloadURL")]
    pub download_url: String,
    #[serde(rename = "SUFeedEntryMinimumSystemVersion")]
    pub minimum_os_version: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Feed {
    #[serde(rename = "SUFeedEntries", default)]
    pub entries: Vec<FeedEntry>,
}

impl Feed {
    /// The entry with the highest version. The last of equal versions wins.
    pub fn latest(&self) -> Option<&FeedEntry> {
        self.entries
            .iter()
            .max_by(|a, b| compare_loose(&a.version, &b.version))
    }
}

pub fn feed_url(product: &str) -> Result<&'static str, ProcessorError> {
    PRODUCT_FEEDS
        .iter()
        .find(|(name, _)| *name == product)
        .map(|(_, url)| *url)
        .ok_or_else(|| {
            ProcessorError::invalid_input(
                "product_name",
                format!(
                    "{} is invalid; it must be one of: {}",
                    product,
                    PRODUCT_FEEDS
                        .iter()
                        .map(|(name, _)| *name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )
        })
}

pub struct BarebonesURLProvider;

static INPUTS: &[VariableSpec] = &[VariableSpec::required(
    "product_name",
    "Product to fetch URL for. Currently only 'bbedit'.",
)];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("version", "Version of the product."),
    OutputSpec::new("url", "Download URL."),
    OutputSpec::new(
        "minimum_os_version",
        "Minimum OS version supported according to product metadata.",
    ),
];

impl Processor for BarebonesURLProvider {
    fn name(&self) -> &'static str {
        "BarebonesURLProvider"
    }

    fn description(&self) -> &'static str {
        "Provides a version and dmg download for the Barebones product given."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let url = feed_url(env.require_str("product_name")?)?;
        let feed: Feed = http::fetch_plist(STEP, url, &[])?;

        let entry = feed.latest().ok_or_else(|| {
            ProcessorError::parse(STEP, url, "expected 'SUFeedEntries' manifest key wasn't found")
        })?;

        info!("Found URL {}", entry.download_url);
        env.set("version", entry.version.clone());
        env.set("minimum_os_version", entry.minimum_os_version.clone());
        env.set("url", entry.download_url.clone());

        Ok(())
    }
}
