// src/utils/mod.rs

//! Utility functions and helpers.

pub mod address;
pub mod console;
pub mod date;
pub mod http;

use unicode_segmentation::UnicodeSegmentation;
use url::Url;

/// Longest file-name stem derived from portal text, in graphemes.
const MAX_FILE_STEM: usize = 100;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Keep only the ASCII digits of a string.
pub fn only_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Read a query parameter from an absolute or relative URL.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(url)))
        .ok()?;
    parsed
        .query_pairs()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Make portal text safe to use as part of a file name.
///
/// Replaces characters Windows rejects, trims, and caps the length.
pub fn sanitize_file_name(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim();
    trimmed
        .graphemes(true)
        .take(MAX_FILE_STEM)
        .collect::<String>()
        .trim_end()
        .to_string()
}
