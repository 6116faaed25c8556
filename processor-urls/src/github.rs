// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    log::info,
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
    serde::Deserialize,
};

const STEP: &str = "resolve github release";

pub const API_BASE_URL: &str = "https://api.github.com";

#[derive(Clone, Debug, Deserialize)]
pub struct Asset {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Version derived from a release tag: the tag without a leading `v`.
pub fn version_from_tag(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}

/// The newest release and its first asset.
pub fn latest_asset<'a>(
    repo: &str,
    releases: &'a [Release],
) -> Result<(&'a Release, &'a Asset), ProcessorError> {
    let release = releases.first().ok_or_else(|| {
        ProcessorError::parse(STEP, repo, format!("no releases found for repo '{}'", repo))
    })?;

    let asset = release.assets.first().ok_or_else(|| {
        ProcessorError::parse(
            STEP,
            repo,
            format!("release {} of '{}' has no assets", release.tag_name, repo),
        )
    })?;

    Ok((release, asset))
}

pub struct GitHubReleasesInfoProvider;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required(
        "github_repo",
        "Name of a GitHub user and repo, ie. 'MagerValp/AutoDMG'",
    ),
    VariableSpec::optional(
        "github_auth_token",
        "API token to send with request. Without this, your client is rate-limited to 60 \
         requests per hour.",
    ),
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new(
        "url",
        "URL for the first asset found for the project's latest release.",
    ),
    OutputSpec::new(
        "version",
        "Version info parsed, naively derived from the release's tag.",
    ),
];

impl Processor for GitHubReleasesInfoProvider {
    fn name(&self) -> &'static str {
        "GitHubReleasesInfoProvider"
    }

    fn description(&self) -> &'static str {
        "Get URL and version info from the latest release on a GitHub project's releases page."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let repo = env.require_str("github_repo")?.to_string();
        let authorization = env
            .get_str("github_auth_token")
            .filter(|t| !t.is_empty())
            .map(|t| format!("token {}", t));

        let mut headers = vec![("Accept", "application/vnd.github.v3+json")];
        if let Some(value) = &authorization {
            headers.push(("Authorization", value.as_str()));
        }

        let releases: Vec<Release> = http::fetch_json(
            STEP,
            &format!("{}/repos/{}/releases", API_BASE_URL, repo),
            &headers,
        )?;
        let (release, asset) = latest_asset(&repo, &releases)?;
        info!("latest release of {} is {}", repo, release.tag_name);

        // The asset endpoint redirects to the actual download.
        headers[0] = ("Accept", "application/octet-stream");
        let url = http::resolve_final_url(
            &format!("{}/repos/{}/releases/assets/{}", API_BASE_URL, repo, asset.id),
            &headers,
        )?;
        info!("Found URL {}", url);

        env.set("url", url);
        env.set("version", version_from_tag(&release.tag_name));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, processor_common::ErrorKind};

    #[test]
    fn first_release_first_asset() -> Result<(), Box<dyn std::error::Error>> {
        let releases: Vec<Release> = serde_json::from_str(
            r#"[
                {"tag_name": "v1.5.2", "assets": [
                    {"id": 123, "name": "AutoDMG-1.5.2.dmg"},
                    {"id": 124, "name": "AutoDMG-1.5.2.zip"}
                ]},
                {"tag_name": "v1.5.1", "assets": [{"id": 100, "name": "AutoDMG-1.5.1.dmg"}]}
            ]"#,
        )?;

        let (release, asset) = latest_asset("MagerValp/AutoDMG", &releases)?;
        assert_eq!(release.tag_name, "v1.5.2");
        assert_eq!(asset.id, 123);

        Ok(())
    }

    #[test]
    fn release_without_assets() -> Result<(), Box<dyn std::error::Error>> {
        let releases: Vec<Release> = serde_json::from_str(r#"[{"tag_name": "2.0"}]"#)?;

        let err = latest_asset("owner/repo", &releases).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);

        let err = latest_asset("owner/repo", &[]).unwrap_err();
        assert!(err.to_string().contains("no releases found"));

        Ok(())
    }

    #[test]
    fn tag_versions() {
        assert_eq!(version_from_tag("v1.5.2"), "1.5.2");
        assert_eq!(version_from_tag("2.0"), "2.0");
        assert_eq!(version_from_tag("release-3"), "release-3");
    }
}
