//! Cache key derivation.

use sha2::{Digest, Sha256};
use url::form_urlencoded;

/// File extension of every cache key.
pub const KEY_EXTENSION: &str = ".json";

/// Derive the cache key for a URL.
///
/// The digest covers the percent-encoded URL exactly as given, so any URL
/// (query strings, unicode, path separators) maps to a filesystem-safe name.
/// The host prefix only aids browsing the cache directory; URLs without a
/// parseable host get the bare digest.
pub fn derive_key(url: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(url.as_bytes()).collect();
    let digest = hex::encode(Sha256::digest(encoded.as_bytes()));

    match host_of(url) {
        Some(host) => format!("{host}-{digest}{KEY_EXTENSION}"),
        None => format!("{digest}{KEY_EXTENSION}"),
    }
}

/// Host component of a URL, reduced to `[A-Za-z0-9._-]`.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = sanitize_host(parsed.host_str()?);
    if host.is_empty() { None } else { Some(host) }
}

/// Whether `name` looks like a key produced by [`derive_key`].
pub fn is_cache_key(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(KEY_EXTENSION) else {
        return false;
    };
    let digest = stem.rsplit_once('-').map_or(stem, |(_, digest)| digest);
    digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Host prefix of a cache key, if it has one.
pub(crate) fn key_host(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(KEY_EXTENSION)?;
    stem.rsplit_once('-').map(|(host, _)| host)
}

/// Reduce a bare host name to the prefix [`derive_key`] would give it.
///
/// Unicode domains become punycode and IPv6 literals are accepted with or
/// without brackets. Input the URL parser rejects is only lowercased.
pub(crate) fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let candidate = if host.contains(':') && !host.starts_with('[') { format!("[{host}]") } else { host.to_string() };

    match url::Host::parse(&candidate) {
        Ok(parsed) => sanitize_host(&parsed.to_string()),
        Err(_) => sanitize_host(&host.to_ascii_lowercase()),
    }
}

fn sanitize_host(host: &str) -> String {
    host.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}
