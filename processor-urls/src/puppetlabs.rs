// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::scrape,
    log::info,
    processor_common::{
        http, version::max_by_version, Environment, OutputSpec, Processor, ProcessorError,
        VariableSpec,
    },
};

const STEP: &str = "resolve puppetlabs url";

pub const DL_INDEX: &str = "https://downloads.puppetlabs.com/mac";
pub const DEFAULT_VERSION: &str = "latest";
pub const DEFAULT_OS_VERSION: &str = "10.10";

/// Where to look for a product and what its disk images are called.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexQuery {
    pub index_url: String,
    /// Pattern with a `dmg` group for the file name and a `version` group.
    pub pattern: String,
}

/// Build the index query for a product.
///
/// `agent` packages live in a per-OS collection directory. Other products
/// are found as `<product>-<version>.dmg` in the top-level index, skipping
/// names with anything after the version (release candidates and such).
pub fn index_query(product: &str, version: &str, os_version: &str) -> IndexQuery {
    if product == "agent" {
        IndexQuery {
            index_url: format!("{}/{}/PC1/x86_64", DL_INDEX, os_version),
            pattern: format!(
                r#"href="(?P<dmg>puppet-agent-(?P<version>\d+\.\d+\.\d+)-1\.osx{}\.dmg)""#,
                regex::escape(os_version)
            ),
        }
    } else {
        let version = if version.is_empty() || version == DEFAULT_VERSION {
            r"\d+[.\d]+".to_string()
        } else {
            regex::escape(version)
        };

        IndexQuery {
            index_url: DL_INDEX.to_string(),
            pattern: format!(
                r#"href="(?P<dmg>{}-(?P<version>{})\.dmg)""#,
                regex::escape(&product.to_lowercase()),
                version
            ),
        }
    }
}

/// Pick the highest version matching `query` in an index page. Returns `(url, version)`.
pub fn highest_release(query: &IndexQuery, html: &str) -> Result<(String, String), ProcessorError> {
    let re = scrape::compile(STEP, &query.pattern)?;

    let candidates = re.captures_iter(html).filter_map(|caps| {
        Some((
            caps.name("dmg")?.as_str().to_string(),
            caps.name("version")?.as_str().to_string(),
        ))
    });

    let (dmg, version) = max_by_version(candidates, |(_, version)| version.as_str())
        .ok_or_else(|| {
            ProcessorError::parse(
                STEP,
                &query.index_url,
                "unable to parse any products from download index",
            )
        })?;

    Ok((format!("{}/{}", query.index_url, dmg), version))
}

pub struct PuppetlabsProductsURLProvider;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required(
        "product_name",
        "Product to fetch URL for. One of 'puppet', 'facter', 'hiera', or 'agent'.",
    ),
    VariableSpec::optional(
        "get_version",
        "Specific version to request. Defaults to 'latest', which automatically finds the \
         highest available release version.",
    ),
    VariableSpec::optional(
        "get_os_version",
        "When fetching the puppet-agent, collection-style pkg, designates OS. Defaults to \
         '10.10'.",
    ),
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("version", "Version of the product."),
    OutputSpec::new("url", "Download URL."),
];

impl Processor for PuppetlabsProductsURLProvider {
    fn name(&self) -> &'static str {
        "PuppetlabsProductsURLProvider"
    }

    fn description(&self) -> &'static str {
        "Extracts a URL for a Puppet Labs item."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let query = index_query(
            env.require_str("product_name")?,
            env.get_str_or("get_version", DEFAULT_VERSION),
            env.get_str_or("get_os_version", DEFAULT_OS_VERSION),
        );

        let html = http::fetch_text(&query.index_url, &[])?;
        let (url, version) = highest_release(&query, &html)?;

        info!("Found URL {}", url);
        env.set("version", version);
        env.set("url", url);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
        <a href="facter-2.4.6.dmg">facter-2.4.6.dmg</a>
        <a href="facter-2.10.0.dmg">facter-2.10.0.dmg</a>
        <a href="facter-2.9.1.dmg">facter-2.9.1.dmg</a>
        <a href="facter-3.0.0-rc1.dmg">facter-3.0.0-rc1.dmg</a>
        <a href="hiera-3.0.1.dmg">hiera-3.0.1.dmg</a>
    "#;

    #[test]
    fn latest_product() -> Result<(), ProcessorError> {
        let query = index_query("Facter", "latest", DEFAULT_OS_VERSION);
        assert_eq!(query.index_url, DL_INDEX);

        let (url, version) = highest_release(&query, INDEX)?;
        assert_eq!(version, "2.10.0");
        assert_eq!(url, "https://downloads.puppetlabs.com/mac/facter-2.10.0.dmg");

        Ok(())
    }

    #[test]
    fn specific_version() -> Result<(), ProcessorError> {
        let query = index_query("facter", "2.4.6", DEFAULT_OS_VERSION);
        let (_, version) = highest_release(&query, INDEX)?;
        assert_eq!(version, "2.4.6");

        let query = index_query("facter", "2.4", DEFAULT_OS_VERSION);
        assert!(highest_release(&query, INDEX).is_err());

        Ok(())
    }

    #[test]
    fn agent_collection() -> Result<(), ProcessorError> {
        let index = r#"
            <a href="puppet-agent-1.2.4-1.osx10.10.dmg">
            <a href="puppet-agent-1.2.5-1.osx10.10.dmg">
            <a href="puppet-agent-1.2.5-1.osx10.9.dmg">
        "#;

        let query = index_query("agent", "latest", "10.10");
        assert_eq!(query.index_url, "https://downloads.puppetlabs.com/mac/10.10/PC1/x86_64");

        let (url, version) = highest_release(&query, index)?;
        assert_eq!(version, "1.2.5");
        assert_eq!(
            url,
            "https://downloads.puppetlabs.com/mac/10.10/PC1/x86_64/puppet-agent-1.2.5-1.osx10.10.dmg"
        );

        Ok(())
    }
}
