use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExtractionError;
use crate::model::Stable;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<h1>(.+?)<").unwrap());
static ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(<article>.+?</article>)").unwrap());
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a href="https://maps\.google\.com/\?q=(.+?)">"#).unwrap()
});
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Tel: ([0-9\-\(\)]+)<").unwrap());
static SITE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Website: (.+?)<").unwrap());
static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n").unwrap());

/// Pull one stable out of its detail page.
///
/// Name, article and address must each match exactly once; any other count
/// fails the whole page. Phone and website are optional and first-match-wins.
/// Nothing is returned on failure, so a caller never sees a half-filled record.
pub fn extract(id: &str, page: &[u8]) -> Result<Stable, ExtractionError> {
    let text = super::as_text(page);

    let name = exactly_one(&NAME_RE, &text)
        .map_err(|found| ExtractionError::NameCount { found })?
        .trim()
        .to_string();
    if name.is_empty() {
        return Err(ExtractionError::EmptyName);
    }

    let article = exactly_one(&ARTICLE_RE, &text)
        .map_err(|found| ExtractionError::ArticleCount { found })?;

    let address = exactly_one(&ADDRESS_RE, article)
        .map_err(|found| ExtractionError::AddressCount { found })?;
    let address = LINE_BREAK_RE.replace_all(address, " ").into_owned();

    Ok(Stable {
        id: id.to_string(),
        name,
        address,
        phone: first(&PHONE_RE, article).unwrap_or_default(),
        website: first(&SITE_RE, article).unwrap_or_default(),
        lat: None,
        lng: None,
    })
}

/// First capture group of the only match, or the number of matches seen.
fn exactly_one<'t>(re: &Regex, text: &'t str) -> Result<&'t str, usize> {
    let mut matches = re.captures_iter(text);
    match (matches.next(), matches.next()) {
        (Some(caps), None) => caps.get(1).map(|m| m.as_str()).ok_or(1),
        (None, _) => Err(0),
        (Some(_), Some(_)) => Err(2 + matches.count()),
    }
}

fn first(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Vec<u8> {
        std::fs::read(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    const ADDRESS: &str = r#"<a href="https://maps.google.com/?q=1 MAIN ST">map</a>"#;

    fn page(h1s: &str, body: &str) -> Vec<u8> {
        format!("<html>{}<article>{}</article></html>", h1s, body).into_bytes()
    }

    #[test]
    fn full_stable_page() {
        let s = extract("ID", &fixture("stable_page")).unwrap();
        assert_eq!(s.id, "ID");
        assert_eq!(s.name, "YELLOW WOOD DRESSAGE INC.");
        assert_eq!(s.address, "1455 CAYOTS CORNER ROAD CHESAPEAKE CITY, MD, 21915");
        assert_eq!(s.phone, "207-749-6458");
        assert_eq!(s.website, "www.yellowwooddressage.com");
        assert!(s.is_resolved());
        assert_eq!(s.lat, None);
    }

    #[test]
    fn pobox_address_collapses_line_break() {
        let s = extract("ID", &fixture("stable_pobox_page")).unwrap();
        assert_eq!(s.name, "FOX QUARTER FARM, LLC");
        assert_eq!(s.address, "3875 BARK HILL ROAD P.O. Box 600 UNION BRIDGE, MD, 21791");
        assert!(s.phone.is_empty());
        assert!(s.website.is_empty());
    }

    #[test]
    fn name_is_trimmed() {
        let s = extract("x", &page("<h1>\n   OAK HILL  \n</h1>", ADDRESS)).unwrap();
        assert_eq!(s.name, "OAK HILL");
    }

    #[test]
    fn missing_name() {
        let err = extract("x", &page("", ADDRESS)).unwrap_err();
        assert_eq!(err, ExtractionError::NameCount { found: 0 });
    }

    #[test]
    fn blank_name() {
        let err = extract("x", &page("<h1>   </h1>", ADDRESS)).unwrap_err();
        assert_eq!(err, ExtractionError::EmptyName);

        let err = extract("x", &page("<h1>\n\t</h1>", ADDRESS)).unwrap_err();
        assert_eq!(err, ExtractionError::EmptyName);
    }

    #[test]
    fn two_names() {
        let err = extract("x", &page("<h1>A</h1><h1>B</h1>", ADDRESS)).unwrap_err();
        assert_eq!(err, ExtractionError::NameCount { found: 2 });
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn article_count_must_be_one() {
        let none = b"<h1>A</h1><p>no article</p>";
        assert_eq!(
            extract("x", none).unwrap_err(),
            ExtractionError::ArticleCount { found: 0 }
        );

        let three = format!(
            "<h1>A</h1><article>{0}</article><article>{0}</article><article>{0}</article>",
            ADDRESS
        );
        assert_eq!(
            extract("x", three.as_bytes()).unwrap_err(),
            ExtractionError::ArticleCount { found: 3 }
        );
    }

    #[test]
    fn address_outside_article_is_not_counted() {
        let body = format!("{}<h1>A</h1><article>Tel: 410-555-0100<br></article>", ADDRESS);
        assert_eq!(
            extract("x", body.as_bytes()).unwrap_err(),
            ExtractionError::AddressCount { found: 0 }
        );
    }

    #[test]
    fn two_addresses() {
        let body = format!("{0}{0}", ADDRESS);
        assert_eq!(
            extract("x", &page("<h1>A</h1>", &body)).unwrap_err(),
            ExtractionError::AddressCount { found: 2 }
        );
    }

    #[test]
    fn first_phone_and_website_win() {
        let body = format!(
            "{}Tel: 410-555-0100<br>Tel: 301-555-0199<br>Website: first.example<br>Website: second.example<br>",
            ADDRESS
        );
        let s = extract("x", &page("<h1>A</h1>", &body)).unwrap();
        assert_eq!(s.phone, "410-555-0100");
        assert_eq!(s.website, "first.example");
    }

    #[test]
    fn crlf_in_address() {
        let body = r#"<a href="https://maps.google.com/?q=1 MAIN ST
BOX 2">map</a>"#
            .replace('\n', "\r\n");
        let s = extract("x", &page("<h1>A</h1>", &body)).unwrap();
        assert_eq!(s.address, "1 MAIN ST BOX 2");
    }
}
