// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Header masking and body truncation for failure diagnostics.

use std::collections::HashMap;

use reqwest::header::HeaderMap;

use super::types::Diagnostics;

/// Maximum response body characters kept in a diagnostics bundle.
pub const MAX_BODY_CHARS: usize = 500;

/// Whether a header carries a credential.
pub fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "authorization" || name.contains("token") || name.contains("key")
}

/// Mask a single header value if its name is sensitive.
pub fn mask_header_value(name: &str, value: &str) -> String {
    if !is_sensitive_header(name) {
        return value.to_string();
    }

    if value.chars().count() > 15 {
        let prefix: String = value.chars().take(10).collect();
        format!("{}...", prefix)
    } else {
        "***".to_string()
    }
}

/// Mask every sensitive header in a name/value list.
pub fn mask_headers<'a, I>(headers: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    headers
        .into_iter()
        .map(|(name, value)| (name.clone(), mask_header_value(name, value)))
        .collect()
}

/// Flatten response headers into a map. Non-UTF-8 values are skipped.
pub fn header_map_to_strings(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Keep the first [`MAX_BODY_CHARS`] characters and note how many were cut.
///
/// Counts `char`s, unlike `estimator::schema_chars`, so a cut never splits
/// a surrogate pair.
pub fn truncate_body(body: &str) -> String {
    let total = body.chars().count();
    if total <= MAX_BODY_CHARS {
        return body.to_string();
    }

    let kept: String = body.chars().take(MAX_BODY_CHARS).collect();
    format!("{}... ({} more characters)", kept, total - MAX_BODY_CHARS)
}

/// Render headers as `Name: value` lines in name order.
pub fn format_headers(headers: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = headers.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| format!("{}: {}", name, headers[name]))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a request as `METHOD url`, header lines, a blank line and the body.
/// Headers must already be masked.
pub fn format_request(
    method: &str,
    url: &str,
    masked_headers: &HashMap<String, String>,
    body: &str,
) -> String {
    format!("{} {}\n{}\n\n{}", method, url, format_headers(masked_headers), body)
}

/// Request side of a bundle, for display when no response arrived.
pub fn request_text(diagnostics: &Diagnostics) -> String {
    format_request(
        &diagnostics.request_method,
        &diagnostics.request_url,
        &diagnostics.request_headers,
        &diagnostics.request_body,
    )
}

/// Builder for a [`Diagnostics`] bundle.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsBuilder {
    inner: Diagnostics,
}

impl DiagnosticsBuilder {
    /// Start a bundle for a request. Headers are masked here.
    pub fn request(
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            inner: Diagnostics {
                request_url: url.to_string(),
                request_method: method.to_string(),
                request_headers: mask_headers(headers),
                request_body: body.into(),
                ..Default::default()
            },
        }
    }

    pub fn response(mut self, headers: &HeaderMap, body: &str) -> Self {
        self.inner.response_headers = header_map_to_strings(headers);
        self.inner.response_body = truncate_body(body);
        self
    }

    pub fn raw_error(mut self, error: impl ToString) -> Self {
        self.inner.raw_error = Some(error.to_string());
        self
    }

    pub fn build(self) -> Diagnostics {
        self.inner
    }
}
