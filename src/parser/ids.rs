use std::sync::LazyLock;

use regex::Regex;

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="/stables/([0-9a-zA-Z]+)">"#).unwrap());

/// All stable IDs linked from a listing page, in document order.
/// An empty result means the page is past the end of the listing.
pub fn parse_ids(page: &[u8]) -> Vec<String> {
    let text = super::as_text(page);
    ID_RE
        .captures_iter(&text)
        .map(|caps| caps[1].to_string())
        .collect()
}
