//! `Link` header parsing for Mastodon pagination
//!
//! Mastodon advertises neighbouring pages as
//! `<https://host/api/v1/timelines/home?max_id=80>; rel="next", <...?min_id=100>; rel="prev"`.

use reqwest::Url;

/// One `<url>; rel="..."` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLink {
    /// Target URL
    pub url: Url,
    /// Relation types, lowercased
    pub rels: Vec<String>,
}

impl HeaderLink {
    /// Value of a query parameter on the target URL
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// Parse a `Link` header, skipping malformed entries
pub fn parse(header: &str) -> Vec<HeaderLink> {
    header
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            let start = part.find('<')?;
            let end = part[start..].find('>')? + start;
            let url = Url::parse(&part[start + 1..end]).ok()?;

            let rels = part[end + 1..]
                .split(';')
                .filter_map(|param| {
                    let (name, value) = param.split_once('=')?;
                    (name.trim().eq_ignore_ascii_case("rel"))
                        .then(|| value.trim().trim_matches('"').to_lowercase())
                })
                .flat_map(|value| {
                    value
                        .split_whitespace()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .collect();

            Some(HeaderLink { url, rels })
        })
        .collect()
}

/// First link carrying relation `rel`
pub fn find_rel<'a>(links: &'a [HeaderLink], rel: &str) -> Option<&'a HeaderLink> {
    links.iter().find(|link| link.rels.iter().any(|r| r == rel))
}

/// Pagination cursors from a `Link` header: `(next, prev)`.
///
/// `next` is the `max_id` of the older page; `prev` is the `min_id` (or,
/// on older servers, `since_id`) of the newer page.
pub fn cursors(header: Option<&str>) -> (Option<String>, Option<String>) {
    let links = header.map(parse).unwrap_or_default();

    let next = find_rel(&links, "next").and_then(|link| link.query_param("max_id"));
    let prev = find_rel(&links, "prev").and_then(|link| {
        link.query_param("min_id")
            .or_else(|| link.query_param("since_id"))
    });

    (next, prev)
}
