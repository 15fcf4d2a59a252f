//! Image URL normalization for vendor galleries.

use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static SHOPIFY_SIZE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)_(?:pico|icon|thumb|small|compact|medium|large|grande|[0-9]+x[0-9]+|[0-9]+x)(?:_[a-z0-9-]+)*\.(jpe?g|png|gif|webp)$",
    )
    .unwrap()
});

static WEBP_EXT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\.webp$").unwrap());

/// Forces `https://`, including protocol-relative `//host/...` URLs.
pub fn normalize_to_https(url: &str) -> String {
    let u = url.trim();
    if let Some(rest) = u.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if let Some(rest) = u.strip_prefix("http://") {
        return format!("https://{rest}");
    }
    u.to_string()
}

/// Drops the query string and fragment.
pub fn strip_query_params(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_string()
}

/// Removes Shopify CDN size tokens (`_small`, `_600x600`, ...) to get the original image.
pub fn strip_shopify_size_suffix(url: &str) -> String {
    let base = strip_query_params(url);
    SHOPIFY_SIZE_SUFFIX.replace(&base, ".$1").into_owned()
}

/// Swaps a `.webp` extension for `.jpg`.
pub fn convert_webp_to_jpg(url: &str) -> String {
    WEBP_EXT.replace(url, ".jpg").into_owned()
}

/// Resolves `maybe_relative` against `base_url`.
pub fn make_absolute_url(base_url: &str, maybe_relative: &str) -> String {
    let href = maybe_relative.trim();
    if href.is_empty() {
        return String::new();
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }

    let base = format!("{}/", base_url.trim_end_matches('/'));
    match Url::parse(&base).and_then(|b| b.join(href.trim_start_matches('/'))) {
        Ok(joined) => joined.to_string(),
        Err(_) => format!("{}{}", base, href.trim_start_matches('/')),
    }
}

/// Removes duplicate and empty URLs, keeping first-seen order.
pub fn deduplicate_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(Into::into)
        .filter(|u| !u.is_empty() && seen.insert(u.clone()))
        .collect()
}

/// Full image URL cleanup: absolute, https, no query, optional size/webp fixes.
pub fn normalize_image_url(url: &str, base_url: &str, strip_size: bool, convert_webp: bool) -> String {
    let mut url = url.trim().to_string();
    if url.is_empty() {
        return url;
    }

    if !base_url.is_empty()
        && !url.starts_with("http://")
        && !url.starts_with("https://")
        && !url.starts_with("//")
    {
        url = make_absolute_url(base_url, &url);
    }

    url = strip_query_params(&normalize_to_https(&url));

    if strip_size {
        url = strip_shopify_size_suffix(&url);
    }
    if convert_webp {
        url = convert_webp_to_jpg(&url);
    }
    url
}
