// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{
        dmg::{CreateOptions, Hdiutil},
        pkgutil::remove_existing,
    },
    log::info,
    processor_common::{Environment, OutputSpec, Processor, ProcessorError, Settings, VariableSpec},
    std::path::PathBuf,
};

pub struct DmgCreator;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required("dmg_root", "Directory that will be copied to a disk image."),
    VariableSpec::required("dmg_path", "The dmg to be created."),
    VariableSpec::optional("dmg_format", "The dmg format. Defaults to UDZO."),
    VariableSpec::optional(
        "dmg_compression_level",
        "Compression level between '1' and '9' to use when using UDZO. Defaults to '5', a \
         point beyond which very little space savings is gained.",
    ),
    VariableSpec::optional(
        "dmg_megabytes",
        "Value to set for the '-megabytes' option. The option is not used when unset.",
    ),
];

static OUTPUTS: &[OutputSpec] = &[];

/// Derive `hdiutil create` parameters from processor inputs.
pub fn create_options(env: &Environment) -> Result<CreateOptions, ProcessorError> {
    let mut options = CreateOptions::default();

    if let Some(format) = env.get_str("dmg_format").filter(|s| !s.is_empty()) {
        options.format = format.to_string();
    }

    if let Some(value) = env.get("dmg_compression_level") {
        let level = match value {
            plist::Value::Integer(i) => i.as_signed().and_then(|i| u8::try_from(i).ok()),
            plist::Value::String(s) if s.is_empty() => Some(options.zlib_level),
            plist::Value::String(s) => s.trim().parse::<u8>().ok(),
            _ => None,
        };

        options.zlib_level = level.filter(|l| (1..=9).contains(l)).ok_or_else(|| {
            ProcessorError::invalid_input("dmg_compression_level", "must be between 1 and 9")
        })?;
    }

    if let Some(value) = env.get("dmg_megabytes") {
        options.megabytes = match value {
            plist::Value::Integer(i) => i.as_unsigned(),
            plist::Value::String(s) if s.is_empty() => None,
            plist::Value::String(s) => Some(s.trim().parse::<u64>().map_err(|e| {
                ProcessorError::invalid_input("dmg_megabytes", e)
            })?),
            _ => return Err(ProcessorError::invalid_input("dmg_megabytes", "not a number")),
        };
    }

    Ok(options)
}

impl Processor for DmgCreator {
    fn name(&self) -> &'static str {
        "DmgCreator"
    }

    fn description(&self) -> &'static str {
        "Creates a disk image from a directory."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let settings = Settings::from_environment(env)?;
        let options = create_options(env)?;
        let dmg_root = PathBuf::from(env.require_str("dmg_root")?);
        let dmg_path = PathBuf::from(env.require_str("dmg_path")?);

        remove_existing("create disk image", &dmg_path)?;
        Hdiutil::new(&settings).create(&options, &dmg_root, &dmg_path)?;

        info!(
            "Created dmg from {} at {}",
            dmg_root.display(),
            dmg_path.display()
        );

        Ok(())
    }
}
