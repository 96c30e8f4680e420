//! Pulling structured data out of the portal's HTML and redirect targets.
//!
//! The portal is a classic server-rendered form app: the booking page
//! carries hidden inputs that must be echoed back verbatim, and terminal
//! responses are redirects whose query strings carry the confirmation id or
//! the failure reason.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PortalError, Result};

// <input … type="hidden" …>, then name/value fished out per tag. Compiled
// once; the booking form is fetched on every submission.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<input\b[^>]*>").unwrap());
static HIDDEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)type\s*=\s*["']hidden["']"#).unwrap());
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)name\s*=\s*["']([^"']*)["']"#).unwrap());
static VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)value\s*=\s*["']([^"']*)["']"#).unwrap());

/// Extract `(name, value)` for every hidden input on the booking form, in
/// document order. Attribute order within the tag is not assumed.
pub fn hidden_fields(html: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for tag in TAG_RE.find_iter(html) {
        let tag = tag.as_str();
        if !HIDDEN_RE.is_match(tag) {
            continue;
        }
        let Some(name) = NAME_RE.captures(tag).map(|c| c[1].to_string()) else {
            continue;
        };
        let value = VALUE_RE
            .captures(tag)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        fields.push((name, value));
    }
    fields
}

/// Decode one query parameter from a redirect target.
pub fn query_param(location: &str, key: &str) -> Option<String> {
    let query = location.split_once('?')?.1;
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// The confirmation id the portal embeds in its confirmation redirect.
pub fn confirmation_id(location: &str) -> Result<String> {
    query_param(location, "id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            PortalError::MalformedResponse(format!(
                "confirmation redirect without id: {location}"
            ))
        })
}
