// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordering of loosely formatted version strings.
//!
//! Vendor feeds publish versions like `13.0.4`, `2.8.1b3` or `10.10`. These
//! are not semantic versions, so they are compared component-wise with
//! numeric components ordered numerically.

use {
    std::cmp::Ordering,
    version_compare::Cmp,
};

/// Compare two loosely formatted versions.
///
/// Strings that cannot be interpreted as versions fall back to lexical order.
pub fn compare_loose(a: &str, b: &str) -> Ordering {
    match version_compare::compare(a, b) {
        Ok(Cmp::Lt) => Ordering::Less,
        Ok(Cmp::Gt) => Ordering::Greater,
        Ok(Cmp::Eq) => Ordering::Equal,
        _ => a.cmp(b),
    }
}

/// Find the element with the highest version.
///
/// Among equal versions the first one wins.
pub fn max_by_version<T, F>(items: impl IntoIterator<Item = T>, version: F) -> Option<T>
where
    F: Fn(&T) -> &str,
{
    let mut best: Option<T> = None;

    for item in items {
        best = match best {
            Some(current) if compare_loose(version(&item), version(&current)) != Ordering::Greater => {
                Some(current)
            }
            _ => Some(item),
        };
    }

    best
}
