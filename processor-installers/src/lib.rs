// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Processors that unpack, patch and repackage macOS installers.
//!
//! The building blocks mirror the stages a vendor installer goes through
//! on its way to being redistributable:
//!
//! 1. A disk image is mounted ([dmg]).
//! 2. The installer package inside is located ([locate]).
//! 3. The package is expanded into an editable tree ([pkgutil]).
//! 4. The installer descriptor is edited ([distribution]) and install
//!    scripts are replaced ([scripts]).
//! 5. Payloads whose unpackers write to hardcoded locations are redirected
//!    into a staging directory ([payload]).
//! 6. The tree is flattened back into a package ([pkgutil]).
//!
//! Processors built on these live in the remaining modules. Every
//! processor is also exposed through [processors] for registration with a
//! host.

pub mod bundle;
pub mod distribution;
pub mod dmg;
pub mod dmg_creator;
pub mod flash;
pub mod fsutil;
pub mod k2client;
pub mod locate;
pub mod office;
pub mod payload;
pub mod pkgutil;
pub mod praat;
pub mod reader;
pub mod scripts;

use processor_common::Processor;

/// All processors defined by this crate.
pub fn processors() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(flash::AdobeFlashDmgUnpacker),
        Box::new(flash::AdobeFlashDownloadDecoder),
        Box::new(reader::AdobeReaderRepackager),
        Box::new(dmg_creator::DmgCreator),
        Box::new(office::MSOffice2011DisableAllQuit),
        Box::new(praat::PraatVersionFixer),
        Box::new(k2client::SassafrasK2ClientCustomizer),
    ]
}
