// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Firefox and Thunderbird download locations.

use {
    crate::UrlVars,
    log::info,
    processor_common::{http, Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
    std::collections::HashMap,
};

const STEP: &str = "resolve mozilla url";

pub const MOZ_BASE_URL: &str =
    "https://download.mozilla.org/?product={product_release}-ssl&os={platform}&lang={locale}";
pub const MOZ_PRODUCT_VERSIONS_URL: &str =
    "https://product-details.mozilla.org/1.0/{product}_versions.json";

pub fn fixup_locale(locale: &str) -> String {
    locale.replace('_', "-")
}

/// Combine a product and release into the `product` parameter of the download service.
///
/// `latest-esr` and `latest-beta` (and their reversed spellings) select
/// the ESR and beta channels of the product.
pub fn fixup_product_release(product: &str, release: &str) -> String {
    match release {
        "latest-esr" | "esr-latest" => format!("{}-esr-latest", product),
        "latest-beta" | "beta-latest" => format!("{}-beta-latest", product),
        _ => format!("{}-{}", product, release),
    }
}

/// Normalize a Mozilla version to a dotted numeric form.
///
/// `78.0.2` stays as is, `79.0b9` becomes `79.0.0.9`, `68.10.0esr` becomes
/// `68.10.0` and `77.0-msi` becomes `77.0`.
pub fn normalize_version(version: &str) -> String {
    version
        .replace(|c: char| c == 'a' || c == 'b', ".0.")
        .replace("esr", "")
        .replace("-msi", "")
}

/// Which key of the product-details document a product and release resolve through.
///
/// `None` means the release is already a concrete version.
pub fn release_key(product: &str, release: &str) -> Result<Option<String>, ProcessorError> {
    let simple_product = if product.contains("firefox") {
        "FIREFOX"
    } else if product.contains("thunderbird") {
        "THUNDERBIRD"
    } else {
        return Err(ProcessorError::invalid_input(
            "product_name",
            format!("product '{}' is not a supported product", product),
        ));
    };

    let product_release = fixup_product_release(product, release);

    Ok(if product_release.contains("esr") {
        Some(format!("{}_ESR", simple_product))
    } else if product_release.contains("beta") {
        Some(format!("LATEST_{}_DEVEL_VERSION", simple_product))
    } else if product_release.contains("nightly") {
        Some(format!("{}_NIGHTLY", simple_product))
    } else if product_release.contains("latest") {
        Some(format!("LATEST_{}_VERSION", simple_product))
    } else {
        None
    })
}

/// Short product name used by the product-details service.
pub fn simple_product(product: &str) -> &'static str {
    if product.contains("thunderbird") {
        "thunderbird"
    } else {
        "firefox"
    }
}

/// Look up the version published under `key`. Returns `(normalized, original)`.
pub fn resolve_version(
    versions: &HashMap<String, serde_json::Value>,
    key: &str,
) -> Result<(String, String), ProcessorError> {
    let original = versions
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ProcessorError::parse(STEP, "product versions", format!("no {} entry", key))
        })?;

    Ok((normalize_version(original), original.to_string()))
}

pub struct MozillaURLProvider;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required(
        "product_name",
        "Product to fetch URL for. One of: 'firefox', 'firefox-esr', 'firefox-beta', \
         'firefox-nightly', 'thunderbird', 'thunderbird-beta'.",
    ),
    VariableSpec::with_default(
        "release",
        "latest",
        "Which release to download. Examples: 'latest', 79.0",
    ),
    VariableSpec::with_default(
        "locale",
        "en-US",
        "Which localization to download, default is 'en-US'.",
    ),
    VariableSpec::with_default(
        "platform",
        "osx",
        "Which platform/OS to download: 'osx' (default), 'linux', 'linux64', 'win', 'win64'.",
    ),
    VariableSpec::with_default("base_url", MOZ_BASE_URL, "(Advanced) URL for downloads."),
    VariableSpec::with_default(
        "versions_base_url",
        MOZ_PRODUCT_VERSIONS_URL,
        "(Advanced) URL for product release version information.",
    ),
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("url", "URL to the latest Mozilla product release."),
    OutputSpec::new(
        "moz_version",
        "Resolved version number for a release normalized to a 3 or 4 digit semantic version. \
         For example: 'latest-beta' -> 79.0b9 -> 79.0.0.9",
    ),
    OutputSpec::new(
        "moz_original_version",
        "Pre-normalized version number from the product versions information.",
    ),
    OutputSpec::new("moz_locale", "Locale the download was requested for."),
];

impl Processor for MozillaURLProvider {
    fn name(&self) -> &'static str {
        "MozillaURLProvider"
    }

    fn description(&self) -> &'static str {
        "Provides URL to the latest Firefox release."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let product = env.require_str("product_name")?.to_string();
        let release = env.get_str_or("release", "latest").to_string();
        let locale = fixup_locale(env.get_str_or("locale", "en-US"));

        let url = UrlVars::new()
            .with("product_release", fixup_product_release(&product, &release))
            .with("platform", env.get_str_or("platform", "osx"))
            .with("locale", locale.as_str())
            .substitute(env.get_str_or("base_url", MOZ_BASE_URL));

        let (version, original) = match release_key(&product, &release)? {
            Some(key) => {
                let versions_url = UrlVars::new()
                    .with("product", simple_product(&product))
                    .substitute(env.get_str_or("versions_base_url", MOZ_PRODUCT_VERSIONS_URL));
                let versions: HashMap<String, serde_json::Value> =
                    http::fetch_json(STEP, &versions_url, &[])?;

                resolve_version(&versions, &key)?
            }
            None => (normalize_version(&release), release.clone()),
        };

        info!("Found URL {}", url);
        env.set("url", url);
        env.set("moz_version", version);
        env.set("moz_original_version", original);
        env.set("moz_locale", locale);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_release() {
        assert_eq!(fixup_product_release("firefox", "latest"), "firefox-latest");
        assert_eq!(fixup_product_release("firefox", "esr-latest"), "firefox-esr-latest");
        assert_eq!(fixup_product_release("firefox", "latest-beta"), "firefox-beta-latest");
        assert_eq!(fixup_product_release("firefox-nightly", "latest"), "firefox-nightly-latest");
        assert_eq!(fixup_product_release("thunderbird", "91.0"), "thunderbird-91.0");
    }

    #[test]
    fn versions() {
        assert_eq!(normalize_version("78.0.2"), "78.0.2");
        assert_eq!(normalize_version("79.0b9"), "79.0.0.9");
        assert_eq!(normalize_version("68.10.0esr"), "68.10.0");
        assert_eq!(normalize_version("77.0-msi"), "77.0");
        assert_eq!(normalize_version("80.0a1"), "80.0.0.1");
    }

    #[test]
    fn release_keys() -> Result<(), ProcessorError> {
        assert_eq!(
            release_key("firefox", "latest")?.as_deref(),
            Some("LATEST_FIREFOX_VERSION")
        );
        assert_eq!(
            release_key("firefox", "latest-esr")?.as_deref(),
            Some("FIREFOX_ESR")
        );
        assert_eq!(
            release_key("firefox-esr", "latest")?.as_deref(),
            Some("FIREFOX_ESR")
        );
        assert_eq!(
            release_key("thunderbird-beta", "latest")?.as_deref(),
            Some("LATEST_THUNDERBIRD_DEVEL_VERSION")
        );
        assert_eq!(
            release_key("firefox-nightly", "latest")?.as_deref(),
            Some("FIREFOX_NIGHTLY")
        );
        assert_eq!(release_key("firefox", "79.0")?, None);
        assert!(release_key("seamonkey", "latest").is_err());

        Ok(())
    }

    #[test]
    fn resolve_from_product_details() -> Result<(), Box<dyn std::error::Error>> {
        let versions: HashMap<String, serde_json::Value> = serde_json::from_str(
            r#"{
                "FIREFOX_ESR": "91.2.0esr",
                "FIREFOX_NIGHTLY": "95.0a1",
                "LATEST_FIREFOX_DEVEL_VERSION": "94.0b7",
                "LATEST_FIREFOX_VERSION": "93.0",
                "FIREFOX_ESR_NEXT": ""
            }"#,
        )?;

        assert_eq!(
            resolve_version(&versions, "LATEST_FIREFOX_DEVEL_VERSION")?,
            ("94.0.0.7".to_string(), "94.0b7".to_string())
        );
        assert_eq!(
            resolve_version(&versions, "FIREFOX_ESR")?,
            ("91.2.0".to_string(), "91.2.0esr".to_string())
        );
        assert!(resolve_version(&versions, "LATEST_THUNDERBIRD_VERSION").is_err());

        Ok(())
    }

    #[test]
    fn download_url_template() {
        let url = UrlVars::new()
            .with("product_release", fixup_product_release("firefox", "latest-esr"))
            .with("platform", "osx")
            .with("locale", fixup_locale("en_GB"))
            .substitute(MOZ_BASE_URL);

        assert_eq!(
            url,
            "https://download.mozilla.org/?product=firefox-esr-latest-ssl&os=osx&lang=en-GB"
        );
    }
}
