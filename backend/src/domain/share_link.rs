//! Shareable links to the app and to single profiles.

use tracing::{debug, warn};
use url::form_urlencoded::byte_serialize;
use url::Url;

const QR_SERVICE: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Normalize the address the app is served from into a link another device
/// can open.
///
/// Drops the fragment and query, adds a trailing `/` unless the path ends in a
/// file name, and collapses a doubled `https://https://` prefix. Addresses
/// without a hierarchical path fall back to their origin. Returns `None` when
/// no link can be derived.
pub fn shareable_base_url(href: &str) -> Option<String> {
    let href = href.trim();
    let end = href.find(|c: char| c == '#' || c == '?').unwrap_or(href.len());
    let mut base = href[..end].to_string();
    while let Some(rest) = base.strip_prefix("https://https://") {
        base = format!("https://{}", rest);
    }
    if base.is_empty() {
        return None;
    }

    let parsed = match Url::parse(&base) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Cannot derive a share link from {:?}: {}", href, e);
            return None;
        }
    };

    if parsed.cannot_be_a_base() {
        let origin = parsed.origin();
        if !origin.is_tuple() {
            warn!("No origin to share for {:?}", href);
            return None;
        }
        debug!("Falling back to origin for {:?}", href);
        return Some(format!("{}/", origin.ascii_serialization()));
    }

    let looks_like_file = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .is_some_and(|segment| segment.contains('.'));
    if !base.ends_with('/') && !looks_like_file {
        base.push('/');
    }
    Some(base)
}

/// Deep link to a profile's detail view under `base_url`
pub fn profile_share_url(base_url: &str, profile_id: &str) -> String {
    format!("{}#/dog/{}", base_url, profile_id)
}

/// Link to a QR code image that encodes `data`
pub fn qr_code_url(data: &str) -> String {
    let encoded: String = byte_serialize(data.as_bytes()).collect();
    format!("{}?size=400x400&data={}&ecc=M&margin=2", QR_SERVICE, encoded)
}
