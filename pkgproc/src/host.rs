// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Standing in for the packaging host on the command line.

use {
    processor_common::{Environment, Processor, ProcessorError},
    std::{io::Read, path::Path},
};

/// Split a `KEY=VALUE` argument.
pub fn parse_assignment(s: &str) -> Result<(&str, &str), ProcessorError> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(ProcessorError::invalid_input(
            s,
            "expected an assignment of the form KEY=VALUE",
        )),
    }
}

/// Build the input environment for a run.
///
/// `source` names a plist file, or `-` for standard input. Assignments are
/// applied on top as string values, later ones winning.
pub fn load_environment<'a>(
    source: Option<&str>,
    stdin: impl Read,
    assignments: impl IntoIterator<Item = &'a str>,
) -> Result<Environment, ProcessorError> {
    let mut env = match source {
        None => Environment::new(),
        Some("-") => Environment::from_plist_reader(stdin)?,
        Some(path) => {
            let fh = std::fs::File::open(Path::new(path))
                .map_err(|e| ProcessorError::io("load environment", path, e))?;
            Environment::from_plist_reader(fh)?
        }
    };

    for assignment in assignments {
        let (key, value) = parse_assignment(assignment)?;
        env.set(key, value);
    }

    Ok(env)
}

/// Human readable description of a processor's interface.
pub fn describe(processor: &dyn Processor) -> String {
    let mut s = String::new();
    s.push_str(&format!("{}\n\n", processor.name()));
    s.push_str(&format!("{}\n\n", processor.description()));

    s.push_str("Input variables:\n");
    if processor.input_variables().is_empty() {
        s.push_str("  (none)\n");
    }
    for var in processor.input_variables() {
        let qualifier = match (var.required, var.default) {
            (true, _) => "required".to_string(),
            (false, Some(default)) => format!("default: {}", default),
            (false, None) => "optional".to_string(),
        };
        s.push_str(&format!("  {} ({})\n", var.name, qualifier));
        s.push_str(&format!("      {}\n", var.description));
    }

    s.push_str("\nOutput variables:\n");
    if processor.output_variables().is_empty() {
        s.push_str("  (none)\n");
    }
    for output in processor.output_variables() {
        s.push_str(&format!("  {}\n", output.name));
        s.push_str(&format!("      {}\n", output.description));
    }

    s
}

/// First sentence of a processor description, for listings.
pub fn summary(processor: &dyn Processor) -> &'static str {
    let description = processor.description();

    match description.find(". ") {
        Some(end) => &description[..=end],
        None => description,
    }
}
