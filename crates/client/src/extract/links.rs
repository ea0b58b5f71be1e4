//! Icon link resolution.

/// Scheme and host prefix of a URL: everything before the first `/` that
/// follows `://`.
///
/// `http://host:8000/path/page.html` → `http://host:8000`. A URL without a
/// path is returned whole; one without `://` yields `None`.
pub fn origin_prefix(url: &str) -> Option<&str> {
    let authority_start = url.find("://")? + 3;
    let end = url[authority_start..]
        .find('/')
        .map_or(url.len(), |offset| authority_start + offset);
    Some(&url[..end])
}

/// Resolve an icon `href` found in a page fetched from `source_url`.
///
/// - `//cdn/icon.png` takes the scheme of the source URL
/// - `/favicon.ico` is prefixed with the source URL's scheme and host
/// - anything else is kept verbatim
pub fn resolve_icon_href(href: &str, source_url: &str) -> String {
    let href = href.trim();

    if href.starts_with("//") {
        if let Some((scheme, _)) = source_url.split_once("://") {
            return format!("{scheme}:{href}");
        }
        return href.to_string();
    }

    if href.starts_with('/')
        && let Some(origin) = origin_prefix(source_url)
    {
        return format!("{origin}{href}");
    }

    href.to_string()
}
