// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::ProcessorError,
    log::debug,
    reqwest::blocking::{Client, ClientBuilder, Response},
    serde::de::DeserializeOwned,
    std::io::Read,
    url::Url,
};

/// Obtain an HTTP client, taking proxy environment variables into account.
pub fn get_http_client() -> reqwest::Result<Client> {
    let mut builder = ClientBuilder::new();

    for (key, value) in std::env::vars() {
        let key = key.to_lowercase();
        if key.ends_with("_proxy") {
            let end = key.len() - "_proxy".len();
            let schema = &key[..end];

            if let Ok(url) = Url::parse(&value) {
                if let Some(Ok(proxy)) = match schema {
                    "http" => Some(reqwest::Proxy::http(url.as_str())),
                    "https" => Some(reqwest::Proxy::https(url.as_str())),
                    _ => None,
                } {
                    builder = builder.proxy(proxy);
                }
            }
        }
    }

    builder.build()
}

fn http_error(url: &str, err: impl ToString) -> ProcessorError {
    ProcessorError::Http {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn send(url: &str, headers: &[(&str, &str)]) -> Result<Response, ProcessorError> {
    debug!("fetching {}", url);
    let client = get_http_client().map_err(|e| http_error(url, e))?;

    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    request
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|e| http_error(url, e))
}

/// Fetch the body of a URL.
pub fn fetch_bytes(url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>, ProcessorError> {
    let mut response = send(url, headers)?;

    let mut data = vec![];
    response
        .read_to_end(&mut data)
        .map_err(|e| http_error(url, e))?;

    Ok(data)
}

/// Fetch the body of a URL as text.
///
/// Invalid UTF-8 sequences are replaced.
pub fn fetch_text(url: &str, headers: &[(&str, &str)]) -> Result<String, ProcessorError> {
    let data = fetch_bytes(url, headers)?;

    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Fetch a URL and deserialize its body as JSON.
pub fn fetch_json<T: DeserializeOwned>(
    step: &'static str,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<T, ProcessorError> {
    let data = fetch_bytes(url, headers)?;

    serde_json::from_slice(&data).map_err(|e| ProcessorError::parse(step, url, e))
}

/// Fetch a URL and deserialize its body as a property list.
pub fn fetch_plist<T: DeserializeOwned>(
    step: &'static str,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<T, ProcessorError> {
    let data = fetch_bytes(url, headers)?;

    plist::from_bytes(&data).map_err(|e| ProcessorError::parse(step, url, e))
}

/// Follow redirects for a URL and return where they end.
///
/// The response body is not read.
pub fn resolve_final_url(url: &str, headers: &[(&str, &str)]) -> Result<String, ProcessorError> {
    let response = send(url, headers)?;

    Ok(response.url().to_string())
}
