// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::bundle::BundleInfo,
    log::info,
    processor_common::{Environment, OutputSpec, Processor, ProcessorError, VariableSpec},
    std::path::Path,
};

pub struct PraatVersionFixer;

static INPUTS: &[VariableSpec] = &[VariableSpec::required("app_path", "Path to Praat.app.")];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("bundleid", "Bundle identifier of Praat.app."),
    OutputSpec::new("version", "Version of Praat.app."),
];

impl Processor for PraatVersionFixer {
    fn name(&self) -> &'static str {
        "PraatVersionFixer"
    }

    fn description(&self) -> &'static str {
        "Fixes Praat version string."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let app_path = Path::new(env.require_str("app_path")?);
        let mut info = BundleInfo::from_bundle(app_path)?;

        let bundleid = info.identifier()?.to_string();
        let version = info.short_version()?.replace("Praat ", "");

        info.set_string("CFBundleShortVersionString", &version);
        info.write()?;
        info!("{} version is {}", bundleid, version);

        env.set("bundleid", bundleid);
        env.set("version", version);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::bundle::tests::write_bundle};

    #[test]
    fn strips_product_name() -> Result<(), Box<dyn std::error::Error>> {
        let td = processor_common::testutil::temp_dir()?;
        let app = td.path().join("Praat.app");
        write_bundle(&app, "org.praat.Praat", "Praat 6.2.14")?;

        let mut env = Environment::new();
        env.set("app_path", app.to_string_lossy().into_owned());
        processor_common::execute(&PraatVersionFixer, &mut env)?;

        assert_eq!(env.get_str("version"), Some("6.2.14"));
        assert_eq!(env.get_str("bundleid"), Some("org.praat.Praat"));
        assert_eq!(BundleInfo::from_bundle(&app)?.short_version()?, "6.2.14");

        // Running again leaves the fixed version alone.
        processor_common::execute(&PraatVersionFixer, &mut env)?;
        assert_eq!(env.get_str("version"), Some("6.2.14"));

        Ok(())
    }
}
