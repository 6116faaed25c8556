// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::scrape,
    log::info,
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
    url::Url,
};

const STEP: &str = "resolve munkitools url";

pub const RELEASE_BASE_URL: &str = "https://github.com/munki/munki/releases";
const GITHUB_URL: &str = "https://github.com";
const PKG_LINK_PATTERN: &str =
    r#"href="(?P<url>/munki/munki/releases/download/.*?/munkitools-2[.0-9]*.pkg)""#;

/// Find the munkitools 2 package link on the releases page.
///
/// Site-relative links are made absolute.
pub fn find_pkg_url(html: &str) -> Result<String, ProcessorError> {
    let link = scrape::find_link(STEP, PKG_LINK_PATTERN, html, RELEASE_BASE_URL)?;

    Url::parse(GITHUB_URL)
        .and_then(|base| base.join(&link))
        .map(|url| url.to_string())
        .map_err(|e| ProcessorError::parse(STEP, &link, e))
}

pub struct Munkitools2URLProvider;

static INPUTS: &[VariableSpec] = &[VariableSpec::optional(
    "base_url",
    "Default is https://github.com/munki/munki/releases",
)];

static OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "url",
    "URL to Munkitools flat pkg download.",
)];

impl Processor for Munkitools2URLProvider {
    fn name(&self) -> &'static str {
        "Munkitools2URLProvider"
    }

    fn description(&self) -> &'static str {
        "Provides a download URL for Munki tools."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let base_url = env.get_str_or("base_url", RELEASE_BASE_URL);

        // Anything but the releases page is taken to be the package itself.
        let url = if base_url == RELEASE_BASE_URL {
            find_pkg_url(&http::fetch_text(base_url, &[])?)?
        } else {
            base_url.to_string()
        };

        info!("Found URL {}", url);
        env.set("url", url);

        Ok(())
    }
}
