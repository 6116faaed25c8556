// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lookup of processors by name.

use {
    crate::{makecatalogs, relocatable_python, source_finder},
    processor_common::{Processor, ProcessorError},
};

/// Utility processors defined by this crate.
pub fn utility_processors() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(source_finder::AutoPkgSourceFinder),
        Box::new(relocatable_python::GenerateRelocatablePython),
        Box::new(makecatalogs::MakeCatalogsProcessor),
    ]
}

/// Every known processor, sorted by name.
pub fn processors() -> Vec<Box<dyn Processor>> {
    let mut all = processor_installers::processors();
    all.extend(processor_urls::processors());
    all.extend(utility_processors());
    all.sort_by_key(|p| p.name());

    all
}

/// Find a processor by its exact name.
pub fn find(name: &str) -> Result<Box<dyn Processor>, ProcessorError> {
    processors()
        .into_iter()
        .find(|p| p.name() == name)
        .ok_or_else(|| ProcessorError::UnknownProcessor(name.to_string()))
}
