// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Editing of the `Distribution` installer descriptor.
//!
//! A `<domains>` element in the descriptor restricts where the installer
//! GUI lets a package be installed. Management tools install to the boot
//! volume unattended and some restrictions break that, so the element is
//! removed.

use {
    log::{debug, info},
    processor_common::{IoResultExt, ProcessorError},
    std::{
        io::Cursor,
        path::{Path, PathBuf},
    },
    xml::{
        reader::{ParserConfig, XmlEvent},
        EmitterConfig,
    },
};

const STEP: &str = "edit distribution";

/// Root element names a `Distribution` file may carry.
pub const ALLOWED_ROOT_ELEMENTS: &[&str] = &["installer-script", "installer-gui-script"];

/// Name of the element being removed.
const DOMAINS: &str = "domains";

/// Remove the first `domains` child of the root element from serialized XML.
///
/// Returns `None` when the document has no such element, in which case the
/// document should be left untouched.
pub fn strip_domains(data: &[u8], what: &str) -> Result<Option<Vec<u8>>, ProcessorError> {
    let reader = ParserConfig::new()
        .trim_whitespace(false)
        .whitespace_to_characters(false)
        .cdata_to_characters(false)
        .ignore_comments(false)
        .coalesce_characters(false)
        .create_reader(Cursor::new(data));

    let mut emitter = EmitterConfig::new()
        .perform_indent(false)
        .autopad_comments(false)
        .normalize_empty_elements(true)
        .create_writer(Vec::with_capacity(data.len()));

    let mut depth = 0usize;
    // Depth at which skipping began, while inside the removed element.
    let mut skipping: Option<usize> = None;
    let mut removed = false;

    for event in reader {
        let event = event.map_err(|e| ProcessorError::parse(STEP, what, e))?;

        match &event {
            XmlEvent::StartElement { name, .. } => {
                if depth == 0 && !ALLOWED_ROOT_ELEMENTS.contains(&name.local_name.as_str()) {
                    return Err(ProcessorError::parse(
                        STEP,
                        what,
                        format!(
                            "unexpected root element <{}>; expected one of {}",
                            name.local_name,
                            ALLOWED_ROOT_ELEMENTS.join(", ")
                        ),
                    ));
                }

                if depth == 1 && !removed && skipping.is_none() && name.local_name == DOMAINS {
                    debug!("{}: dropping <{}> from {}", STEP, DOMAINS, what);
                    skipping = Some(depth);
                    removed = true;
                }

                depth += 1;
            }
            XmlEvent::EndElement { .. } => {
                depth -= 1;

                if skipping == Some(depth) {
                    skipping = None;
                    continue;
                }
            }
            XmlEvent::EndDocument => break,
            _ => {}
        }

        if skipping.is_some() {
            continue;
        }

        if let Some(event) = event.as_writer_event() {
            emitter
                .write(event)
                .map_err(|e| ProcessorError::parse(STEP, what, e))?;
        }
    }

    if removed {
        Ok(Some(emitter.into_inner()))
    } else {
        Ok(None)
    }
}

/// Path of the descriptor within an expanded package.
pub fn distribution_path(expanded_root: &Path) -> PathBuf {
    expanded_root.join("Distribution")
}

/// Remove the `domains` element from the `Distribution` file of an expanded package.
///
/// The file is rewritten in place only when an element was removed, so
/// running this on an already-edited tree changes nothing. Returns whether
/// the file was rewritten.
pub fn remove_domains(expanded_root: &Path) -> Result<bool, ProcessorError> {
    let path = distribution_path(expanded_root);

    if !path.is_file() {
        return Err(ProcessorError::not_found(STEP, "Distribution file", path));
    }

    let data = std::fs::read(&path).step_context(STEP, &path)?;
    let what = path.display().to_string();

    match strip_domains(&data, &what)? {
        Some(edited) => {
            info!("removing <{}> from {}", DOMAINS, path.display());
            std::fs::write(&path, edited).step_context(STEP, &path)?;
            Ok(true)
        }
        None => {
            debug!("{}: {} has no <{}> element", STEP, path.display(), DOMAINS);
            Ok(false)
        }
    }
}
