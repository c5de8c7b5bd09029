//! Response header helpers: Content-Type predicates and Content-Disposition
//! parameters.

use std::collections::BTreeMap;

/// Prefix match on a Content-Type value, trimmed and ASCII case-insensitive.
///
/// Parameters such as `; charset=utf-8` are not parsed, so
/// `media_type_starts_with("text/html; charset=utf-8", "text/html")` holds.
pub fn media_type_starts_with(content_type: &str, prefix: &str) -> bool {
    let content_type = content_type.trim_start();
    content_type.len() >= prefix.len()
        && content_type.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// `text/*` content.
pub fn is_text(content_type: &str) -> bool {
    media_type_starts_with(content_type, "text/")
}

/// `text/html` content.
pub fn is_html(content_type: &str) -> bool {
    media_type_starts_with(content_type, "text/html")
}

/// `application/json` content.
pub fn is_json(content_type: &str) -> bool {
    media_type_starts_with(content_type, "application/json")
}

/// Parses a Content-Disposition header into its `key=value` parameters.
///
/// The whole header is percent-decoded first. Each `;` separated segment is
/// trimmed and split on the first `=`; one layer of surrounding `"` quotes, or
/// leading and trailing `'`, is removed from the value. Segments without `=`
/// (such as the `attachment` disposition type) are skipped.
pub fn content_disposition_params(header: &str) -> BTreeMap<String, String> {
    let decoded = urlencoding::decode(header)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| header.to_string());

    let mut params = BTreeMap::new();
    for segment in decoded.split(';') {
        let Some((key, value)) = segment.trim().split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        params.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    params
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return &value[1..value.len() - 1];
    }
    let value = value.strip_prefix('\'').unwrap_or(value);
    value.strip_suffix('\'').unwrap_or(value)
}
