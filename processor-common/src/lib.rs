// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared functionality for recipe processors.
//!
//! Recipe processors are small units of work run by a macOS software
//! packaging host. Each reads named values from an [Environment], performs
//! one narrow task (query a vendor feed, repackage an installer, ...) and
//! writes named values back.
//!
//! This crate defines that contract ([Processor]), the error taxonomy shared
//! by all processors ([ProcessorError]), per-invocation [Settings], and the
//! plumbing used to reach the outside world: external programs
//! ([tool::ToolCommand]) and HTTP ([http]).

pub mod environment;
pub use environment::Environment;
pub mod error;
pub use error::{ErrorKind, IoResultExt, ProcessorError};
pub mod http;
pub mod processor;
pub use processor::{execute, OutputSpec, Processor, VariableSpec};
pub mod settings;
pub use settings::{Settings, ToolPaths};
#[cfg(unix)]
pub mod testutil;
pub mod tool;
pub mod version;

/// Result type for processors.
pub type ProcessorResult<T> = std::result::Result<T, ProcessorError>;
