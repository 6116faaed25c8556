// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The contract every processor implements.
//!
//! A processor declares the variables it reads and writes, and performs its
//! work in [Processor::main] against a mutable [Environment]. The packaging
//! host (or the `pkgproc` command) drives processors through [execute],
//! which applies declared defaults and rejects missing required inputs
//! before `main` runs.

use {
    crate::{Environment, ProcessorError},
    log::{debug, info},
};

/// Declaration of an input variable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VariableSpec {
    pub name: &'static str,
    pub required: bool,
    /// Value inserted into the environment when the variable is absent.
    pub default: Option<&'static str>,
    pub description: &'static str,
}

impl VariableSpec {
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
            description,
        }
    }

    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: false,
            default: None,
            description,
        }
    }

    pub const fn with_default(
        name: &'static str,
        default: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            required: false,
            default: Some(default),
            description,
        }
    }
}

/// Declaration of an output variable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OutputSpec {
    pub name: &'static str,
    pub description: &'static str,
}

impl OutputSpec {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self { name, description }
    }
}

/// A unit of work operating on an [Environment].
pub trait Processor {
    /// Name the host refers to this processor by.
    fn name(&self) -> &'static str;

    /// One paragraph describing what the processor does.
    fn description(&self) -> &'static str;

    fn input_variables(&self) -> &'static [VariableSpec];

    fn output_variables(&self) -> &'static [OutputSpec];

    /// Perform the processor's work.
    ///
    /// Called with declared defaults applied and required inputs present.
    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError>;
}

/// Apply declared defaults and verify required inputs are present.
pub fn prepare_environment(
    processor: &dyn Processor,
    env: &mut Environment,
) -> Result<(), ProcessorError> {
    for var in processor.input_variables() {
        if env.contains(var.name) {
            continue;
        }

        if let Some(default) = var.default {
            debug!("{}: defaulting {} to {:?}", processor.name(), var.name, default);
            env.set(var.name, default);
        } else if var.required {
            return Err(ProcessorError::MissingInput(var.name.to_string()));
        }
    }

    Ok(())
}

/// Run a processor against an environment.
pub fn execute(processor: &dyn Processor, env: &mut Environment) -> Result<(), ProcessorError> {
    prepare_environment(processor, env)?;

    info!("{}", processor.name());
    processor.main(env)?;

    for output in processor.output_variables() {
        if let Some(value) = env.get(output.name) {
            debug!("{}: {} = {:?}", processor.name(), output.name, value);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    static ECHO_INPUTS: &[VariableSpec] = &[
        VariableSpec::required("message", "What to echo."),
        VariableSpec::with_default("suffix", "!", "Appended to the message."),
    ];

    static ECHO_OUTPUTS: &[OutputSpec] = &[OutputSpec::new("echo", "The echoed message.")];

    impl Processor for Echo {
        fn name(&self) -> &'static str {
            "Echo"
        }

        fn description(&self) -> &'static str {
            "Echoes its input."
        }

        fn input_variables(&self) -> &'static [VariableSpec] {
            ECHO_INPUTS
        }

        fn output_variables(&self) -> &'static [OutputSpec] {
            ECHO_OUTPUTS
        }

        fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
            let echo = format!("{}{}", env.require_str("message")?, env.require_str("suffix")?);
            env.set("echo", echo);
            Ok(())
        }
    }

    #[test]
    fn defaults_applied() -> Result<(), ProcessorError> {
        let mut env = Environment::new();
        env.set("message", "hello");

        execute(&Echo, &mut env)?;
        assert_eq!(env.get_str("echo"), Some("hello!"));

        Ok(())
    }

    #[test]
    fn missing_required() {
        let mut env = Environment::new();

        let err = execute(&Echo, &mut env).unwrap_err();
        assert!(matches!(err, ProcessorError::MissingInput(name) if name == "message"));
        assert!(!env.contains("echo"));
    }
}
