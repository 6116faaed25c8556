// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-side glue for running recipe processors outside a packaging host.
//!
//! [registry] collects every processor in the workspace. [host] turns
//! command line input into an [processor_common::Environment] and
//! describes processors for humans. The remaining modules are utility
//! processors that operate on the packaging repository itself rather
//! than on a vendor's software.

pub mod host;
pub mod makecatalogs;
pub mod registry;
pub mod relocatable_python;
pub mod source_finder;
