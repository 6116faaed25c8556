// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    log::info,
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
};

const STEP: &str = "resolve textmate url";

pub const BASE_URL: &str = "https://api.textmate.org/downloads/";
pub const DEFAULT_BRANCH: &str = "release";
pub const DEFAULT_OS: &str = "10.14";

/// The downloads endpoint for a branch and OS. It redirects to the archive.
pub fn downloads_url(branch: &str, os: &str) -> String {
    format!("{}{}?os={}", BASE_URL, branch, os)
}

/// Check that following the downloads endpoint led somewhere else.
pub fn resolved_download(request_url: &str, final_url: String) -> Result<String, ProcessorError> {
    if final_url == request_url {
        Err(ProcessorError::parse(
            STEP,
            request_url,
            "no redirect to a download was returned",
        ))
    } else {
        Ok(final_url)
    }
}

pub struct TextMateURLProvider;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::optional(
        "branch",
        "The update branch. One of 'release', 'beta', or 'nightly'. In the TM GUI, 'Normal' \
         corresponds to 'release', 'Nightly' = 'beta'. Defaults to release",
    ),
    VariableSpec::optional(
        "os",
        "The macOS version you're requesting TextMate for use on. Defaults to 10.14",
    ),
];

static OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "url",
    "URL to the latest TextMate 2 tbz.",
)];

impl Processor for TextMateURLProvider {
    fn name(&self) -> &'static str {
        "TextMateURLProvider"
    }

    fn description(&self) -> &'static str {
        "Provides a download URL for a TextMate 2 update. TextMate 1 is not supported."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let request_url = downloads_url(
            env.get_str_or("branch", DEFAULT_BRANCH),
            env.get_str_or("os", DEFAULT_OS),
        );

        let url = resolved_download(&request_url, http::resolve_final_url(&request_url, &[])?)?;

        info!("Found URL {}", url);
        env.set("url", url);

        Ok(())
    }
}
