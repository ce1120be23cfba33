// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Extract the stable source locator for a detail URL.
///
/// Boards identify items by a query parameter (`articleNo`, `seq`,
/// `no`, ...) or by trailing path digits; when neither is present the
/// path plus query is the most stable identity left. The fragment is
/// always stripped. The result feeds the posting fingerprint, so it
/// must be identical across re-crawls of the same item.
pub fn source_locator(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.split('#').next().unwrap_or(url).to_string();
    };

    if let Some(id) = item_id(&parsed) {
        return id;
    }

    match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    }
}

/// Mine an item identifier out of the URL's query pairs or path.
fn item_id(parsed: &Url) -> Option<String> {
    let mut fallback_keyed: Option<String> = None;
    let mut fallback_numeric: Option<String> = None;

    for (key, value) in parsed.query_pairs() {
        if value.is_empty() {
            continue;
        }

        let key_lower = key.to_lowercase();
        let value_string = value.to_string();

        if matches!(
            key_lower.as_str(),
            "articleno"
                | "article_no"
                | "articleid"
                | "article_id"
                | "board_seq"
                | "notice_id"
                | "noticeid"
                | "seq"
                | "no"
                | "id"
                | "idx"
        ) {
            return Some(value_string);
        }

        if fallback_keyed.is_none()
            && (key_lower.contains("id")
                || key_lower.contains("no")
                || key_lower.contains("seq")
                || key_lower.contains("article"))
        {
            fallback_keyed = Some(value_string.clone());
        }

        if fallback_numeric.is_none() && value_string.chars().all(|c| c.is_ascii_digit()) {
            fallback_numeric = Some(value_string);
        }
    }

    if let Some(value) = fallback_keyed {
        return Some(value);
    }
    if let Some(value) = fallback_numeric {
        return Some(value);
    }

    if let Some(last) = parsed.path_segments().and_then(|mut segments| segments.next_back()) {
        if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) {
            return Some(last.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve("https://example.com/board/list.do", "view.do?seq=3").as_deref(),
            Some("https://example.com/board/view.do?seq=3")
        );
    }

    #[test]
    fn test_resolve_absolute_href() {
        assert_eq!(
            resolve("https://example.com/board/", "https://other.com/page").as_deref(),
            Some("https://other.com/page")
        );
    }

    #[test]
    fn test_locator_query_key() {
        let url = "https://example.com/view?articleNo=1234&mode=view";
        assert_eq!(source_locator(url), "1234");
    }

    #[test]
    fn test_locator_fallback_keyed() {
        let url = "https://example.com/view?board_no=888";
        assert_eq!(source_locator(url), "888");
    }

    #[test]
    fn test_locator_path_digits() {
        let url = "https://example.com/notice/9999";
        assert_eq!(source_locator(url), "9999");
    }

    #[test]
    fn test_locator_path_query_fallback() {
        let url = "https://example.com/jobs/view.do?title=abc";
        assert_eq!(source_locator(url), "/jobs/view.do?title=abc");
    }

    #[test]
    fn test_locator_strips_fragment() {
        assert_eq!(
            source_locator("https://example.com/view?seq=7#comments"),
            "7"
        );
        assert_eq!(source_locator("https://example.com/plain#frag"), "/plain");
    }

    #[test]
    fn test_locator_stable_across_calls() {
        let url = "https://example.com/view?seq=42";
        assert_eq!(source_locator(url), source_locator(url));
    }
}
