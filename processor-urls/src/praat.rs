// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::scrape,
    log::info,
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
    url::Url,
};

const STEP: &str = "resolve praat url";

pub const PRAAT_BASE_URL: &str = "http://www.fon.hum.uva.nl/praat/download_mac.html";
pub const DEFAULT_ARCH: &str = "32";

/// Find the disk image link for `arch` on the download page at `page_url`.
pub fn find_dmg_url(page_url: &str, html: &str, arch: &str) -> Result<String, ProcessorError> {
    let pattern = format!(
        r#"a href="?(?P<url>praat\d+_mac{}\.dmg)"?"#,
        regex::escape(arch)
    );
    let link = scrape::find_link(STEP, &pattern, html, page_url)?;

    Url::parse(page_url)
        .and_then(|base| base.join(&link))
        .map(|url| url.to_string())
        .map_err(|e| ProcessorError::parse(STEP, page_url, e))
}

pub struct PraatURLProvider;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::optional(
        "arch_edition",
        "Build architecture to retrieve. Can be either '32' or '64'. Default is 32",
    ),
    VariableSpec::optional(
        "base_url",
        "Default is 'http://www.fon.hum.uva.nl/praat/download_mac.html'.",
    ),
];

static OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "url",
    "URL to the latest release of Praat.",
)];

impl Processor for PraatURLProvider {
    fn name(&self) -> &'static str {
        "PraatURLProvider"
    }

    fn description(&self) -> &'static str {
        "Provides URL to the latest release of Praat."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let base_url = env.get_str_or("base_url", PRAAT_BASE_URL);
        let html = http::fetch_text(base_url, &[])?;
        let url = find_dmg_url(base_url, &html, env.get_str_or("arch_edition", DEFAULT_ARCH))?;

        info!("Found URL {}", url);
        env.set("url", url);

        Ok(())
    }
}
