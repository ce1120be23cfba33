// src/services/attachments.rs

//! Attachment URL resolution.
//!
//! Origin boards commonly refuse direct browser downloads (referer
//! checks, session-bound download endpoints). The resolver builds a
//! stable URL the front end can fetch: routed through the configured
//! proxy endpoint when one exists, otherwise the origin URL with an
//! advisory filename fragment. It is a pure string transform and never
//! dereferences anything.

use url::form_urlencoded;

use crate::models::AttachmentConfig;

/// Build a proxyable download URL for an origin attachment link.
///
/// Returns `None` when the origin URL is missing or empty; callers
/// must treat that as "no attachment available", not as a failure.
pub fn resolve(
    origin_url: &str,
    filename: Option<&str>,
    config: &AttachmentConfig,
) -> Option<String> {
    let origin = origin_url.trim();
    if origin.is_empty() {
        return None;
    }

    let filename = filename
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_filename(origin, config));

    match &config.proxy_base {
        Some(proxy_base) => Some(format!(
            "{}?url={}&filename={}",
            proxy_base,
            encode(origin),
            encode(&filename)
        )),
        // Fragments never reach the server, so this is only a hint for
        // the browser side.
        None => Some(format!("{}#filename={}", origin, encode(&filename))),
    }
}

/// Filename hint when the source displays none: the origin URL's last
/// path segment when it names a file, else the configured default.
fn default_filename(origin: &str, config: &AttachmentConfig) -> String {
    origin
        .split('#')
        .next()
        .and_then(|s| s.split('?').next())
        .and_then(|s| s.rsplit('/').next())
        .filter(|segment| !segment.is_empty() && segment.contains('.'))
        // Dynamic endpoints (download.do, down.jsp, ...) are pages,
        // not filenames.
        .filter(|segment| {
            let lower = segment.to_lowercase();
            !(lower.ends_with(".do")
                || lower.ends_with(".jsp")
                || lower.ends_with(".php")
                || lower.ends_with(".asp")
                || lower.ends_with(".aspx")
                || lower.ends_with(".html")
                || lower.ends_with(".htm"))
        })
        .map(str::to_string)
        .unwrap_or_else(|| config.default_filename.clone())
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
