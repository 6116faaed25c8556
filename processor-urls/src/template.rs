// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `{NAME}` placeholder substitution for URL templates.

/// Values for the placeholders of a URL template.
///
/// A value is assembled for each lookup and passed by reference to the
/// code expanding templates. Nothing holds on to it between lookups.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UrlVars {
    vars: Vec<(String, String)>,
}

impl UrlVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a placeholder, replacing an earlier definition of the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();

        if let Some(entry) = self.vars.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.vars.push((name, value));
        }

        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every `{NAME}` occurrence of a defined placeholder.
    ///
    /// Placeholders without a definition are left as is.
    pub fn substitute(&self, template: &str) -> String {
        self.vars
            .iter()
            .fold(template.to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
    }
}
