// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Processors that resolve download URLs from vendor update feeds.
//!
//! Vendors publish the location of their latest release in many ways:
//! JSON web services, property list manifests, small XML documents and
//! plain HTML download pages. Each module here handles one vendor. The
//! document is fetched with [processor_common::http] and handed to a pure
//! function which extracts the URL, version and any extra metadata, so the
//! interpretation of a feed can be exercised without network access.
//!
//! URL templates with `{NAME}` placeholders are filled from a [UrlVars]
//! value built for each lookup.

pub mod acrobat_pro;
pub mod adobe_flash;
pub mod adobe_reader;
pub mod barebones;
pub mod corretto;
pub mod github;
pub mod mozilla;
pub mod msoffice;
pub mod msoffice2011;
pub mod munkitools;
pub mod praat;
pub mod puppetlabs;
pub mod scrape;
pub mod template;
pub use template::UrlVars;
pub mod textmate;
pub mod unarchiver;

use processor_common::Processor;

/// All processors defined by this crate.
pub fn processors() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(acrobat_pro::AdobeAcrobatProUpdateInfoProvider),
        Box::new(adobe_flash::AdobeFlashURLProvider),
        Box::new(adobe_reader::AdobeReaderURLProvider),
        Box::new(adobe_reader::AdobeReaderUpdatesURLProvider),
        Box::new(barebones::BarebonesURLProvider),
        Box::new(corretto::CorrettoURLGetter),
        Box::new(github::GitHubReleasesInfoProvider),
        Box::new(mozilla::MozillaURLProvider),
        Box::new(msoffice::MSOfficeMacURLandUpdateInfoProvider),
        Box::new(msoffice2011::MSOffice2011UpdateInfoProvider),
        Box::new(munkitools::Munkitools2URLProvider),
        Box::new(praat::PraatURLProvider),
        Box::new(puppetlabs::PuppetlabsProductsURLProvider),
        Box::new(textmate::TextMateURLProvider),
        Box::new(unarchiver::TheUnarchiverURLProvider),
    ]
}
