// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extraction of download links from HTML pages.

use {processor_common::ProcessorError, regex::Regex};

/// Compile a pattern, reporting a bad pattern as a failure of `step`.
pub fn compile(step: &'static str, pattern: &str) -> Result<Regex, ProcessorError> {
    Regex::new(pattern).map_err(|e| ProcessorError::invariant(step, e))
}

/// Find the first match of `pattern` in `html` and return its `url` group.
///
/// `source` names where the page came from in the error raised when
/// nothing matches.
pub fn find_link(
    step: &'static str,
    pattern: &str,
    html: &str,
    source: &str,
) -> Result<String, ProcessorError> {
    let re = compile(step, pattern)?;

    re.captures(html)
        .and_then(|caps| caps.name("url"))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ProcessorError::parse(step, source, "no download link found"))
}

#[cfg(test)]
mod tests {
    use {super::*, processor_common::ErrorKind};

    #[test]
    fn first_link_wins() -> Result<(), ProcessorError> {
        let html = r#"<a href="a-1.dmg">one</a> <a href="a-2.dmg">two</a>"#;
        assert_eq!(
            find_link("scrape", r#"href="(?P<url>a-\d\.dmg)""#, html, "page")?,
            "a-1.dmg"
        );

        Ok(())
    }

    #[test]
    fn no_link() {
        let err = find_link("scrape", r#"href="(?P<url>b\.dmg)""#, "<html/>", "page").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
        assert!(err.to_string().contains("page"));
    }
}
