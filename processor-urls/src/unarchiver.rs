// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::scrape,
    log::info,
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
};

const STEP: &str = "resolve the unarchiver url";

pub const BASE_URL: &str = "http://unarchiver.c3.cx/unarchiver";
const ZIP_LINK_PATTERN: &str =
    r#"(?i)href="(?P<url>http://theunarchiver.googlecode.com/files/TheUnarchiver[^"]+\.zip)""#;

pub fn find_zip_url(page_url: &str, html: &str) -> Result<String, ProcessorError> {
    scrape::find_link(STEP, ZIP_LINK_PATTERN, html, page_url)
}

pub struct TheUnarchiverURLProvider;

static INPUTS: &[VariableSpec] = &[VariableSpec::optional(
    "base_url",
    "Default is 'http://unarchiver.c3.cx/unarchiver'.",
)];

static OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "url",
    "URL to the latest release of The Unarchiver.",
)];

impl Processor for TheUnarchiverURLProvider {
    fn name(&self) -> &'static str {
        "TheUnarchiverURLProvider"
    }

    fn description(&self) -> &'static str {
        "Provides URL to the latest release of The Unarchiver."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let base_url = env.get_str_or("base_url", BASE_URL);

        // Without an Accept header the server answers with the stylesheet.
        let html = http::fetch_text(
            base_url,
            &[("Accept", "text/html,application/xhtml+xml,application/xml")],
        )?;
        let url = find_zip_url(base_url, &html)?;

        info!("Found URL {}", url);
        env.set("url", url);

        Ok(())
    }
}
