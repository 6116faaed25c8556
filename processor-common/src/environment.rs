// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The key-value environment passed between processors.

use {
    crate::ProcessorError,
    std::io::{Cursor, Read},
};

/// Named values flowing in to and out of a processor.
///
/// Values are property list values so the environment maps 1:1 onto the
/// plist documents the packaging host exchanges with processors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Environment {
    values: plist::Dictionary,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dictionary(values: plist::Dictionary) -> Self {
        Self { values }
    }

    /// Parse an environment from plist data (XML or binary).
    pub fn from_plist_reader(mut reader: impl Read) -> Result<Self, ProcessorError> {
        let mut data = vec![];
        reader
            .read_to_end(&mut data)
            .map_err(|e| ProcessorError::parse("environment", "input plist", e))?;

        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::new());
        }

        let value = plist::Value::from_reader(Cursor::new(data))
            .map_err(|e| ProcessorError::parse("environment", "input plist", e))?;

        let values = value.into_dictionary().ok_or_else(|| {
            ProcessorError::parse("environment", "input plist", "root is not a dictionary")
        })?;

        Ok(Self { values })
    }

    /// Serialize the environment as an XML plist.
    pub fn to_xml(&self) -> Result<Vec<u8>, ProcessorError> {
        let mut data = vec![];
        plist::Value::Dictionary(self.values.clone())
            .to_writer_xml(&mut data)
            .map_err(|e| ProcessorError::parse("environment", "output plist", e))?;

        Ok(data)
    }

    pub fn dictionary(&self) -> &plist::Dictionary {
        &self.values
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&plist::Value> {
        self.values.get(key)
    }

    /// Obtain a value as a string.
    ///
    /// Integers and booleans are not coerced: they yield `None`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_string())
    }

    /// Obtain a string value, falling back to `default` when unset or empty.
    pub fn get_str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.get_str(key) {
            Some(value) if !value.is_empty() => value,
            _ => default,
        }
    }

    /// Obtain a string value that must be present and non-empty.
    pub fn require_str(&self, key: &str) -> Result<&str, ProcessorError> {
        match self.get_str(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ProcessorError::MissingInput(key.to_string())),
        }
    }

    /// Whether a value is set to something other than false, zero or empty.
    pub fn is_truthy(&self, key: &str) -> bool {
        match self.values.get(key) {
            None => false,
            Some(plist::Value::Boolean(v)) => *v,
            Some(plist::Value::Integer(v)) => v.as_signed().map(|v| v != 0).unwrap_or(true),
            Some(plist::Value::String(s)) => {
                !matches!(s.to_ascii_lowercase().as_str(), "" | "0" | "false" | "no")
            }
            Some(_) => true,
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<plist::Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<plist::Value> {
        self.values.remove(key)
    }
}

impl From<plist::Dictionary> for Environment {
    fn from(values: plist::Dictionary) -> Self {
        Self::from_dictionary(values)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc};

    #[test]
    fn parse_xml_plist() -> Result<(), ProcessorError> {
        let data = indoc! {r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
            <plist version="1.0">
            <dict>
                <key>dmg_path</key>
                <string>/tmp/reader.dmg</string>
                <key>force_rebuild</key>
                <true/>
            </dict>
            </plist>
        "#};

        let env = Environment::from_plist_reader(data.as_bytes())?;
        assert_eq!(env.get_str("dmg_path"), Some("/tmp/reader.dmg"));
        assert!(env.is_truthy("force_rebuild"));
        assert!(!env.is_truthy("missing"));

        Ok(())
    }

    #[test]
    fn empty_input_is_empty_environment() -> Result<(), ProcessorError> {
        let env = Environment::from_plist_reader("\n".as_bytes())?;
        assert!(env.dictionary().is_empty());

        Ok(())
    }

    #[test]
    fn require_rejects_empty() {
        let mut env = Environment::new();
        env.set("url", "");
        assert!(matches!(
            env.require_str("url"),
            Err(ProcessorError::MissingInput(name)) if name == "url"
        ));
        assert_eq!(env.get_str_or("url", "fallback"), "fallback");
    }

    #[test]
    fn truthy_strings() {
        let mut env = Environment::new();
        env.set("a", "False");
        env.set("b", "yes");
        assert!(!env.is_truthy("a"));
        assert!(env.is_truthy("b"));
    }

    #[test]
    fn xml_roundtrip() -> Result<(), ProcessorError> {
        let mut env = Environment::new();
        env.set("version", "11.0.3");
        env.set("makecatalogs_resultcode", 0i64);

        let xml = env.to_xml()?;
        let parsed = Environment::from_plist_reader(xml.as_slice())?;
        assert_eq!(parsed, env);

        Ok(())
    }
}
