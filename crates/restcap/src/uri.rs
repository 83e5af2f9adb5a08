//! URL resolution utilities.

use percent_encoding::percent_decode_str;
use reqwest::Url;

use crate::Result;

/// Parse an absolute URL, dropping any trailing slash from its path so that
/// `http://example.com/api/` and `http://example.com/api` compare equal.
pub fn canonical(url: &str) -> Result<Url> {
    let mut url = Url::parse(url.trim())?;
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    url.set_fragment(None);
    Ok(url)
}

/// Resolve `reference` against `base` (RFC 3986).
pub fn resolve(base: &Url, reference: &str) -> Result<Url> {
    Ok(base.join(reference)?)
}

/// Resolve `reference` as if `base` were a directory, so that a bare
/// `abc` under `http://example.com/foo` becomes `http://example.com/foo/abc`.
pub fn resolve_under(base: &Url, reference: &str) -> Result<Url> {
    resolve(&as_directory(base), reference)
}

/// `{base}/{segment}` with the segment percent-encoded.
pub fn child(base: &Url, segment: &str) -> Url {
    let mut url = as_directory(base);
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(segment);
    }
    url
}

fn as_directory(base: &Url) -> Url {
    let mut dir = base.clone();
    if !dir.path().ends_with('/') {
        let path = format!("{}/", dir.path());
        dir.set_path(&path);
    }
    dir
}

/// The part of `target` below `base`, or the last non-empty path segment
/// of `target` when it does not live under `base`. Query and fragment are
/// ignored; the result is percent-decoded.
pub fn relative_key(target: &Url, base: &Url) -> Option<String> {
    let mut target = target.clone();
    target.set_query(None);
    target.set_fragment(None);

    let prefix = as_directory(base);
    let key = target
        .as_str()
        .strip_prefix(prefix.as_str())
        .map(|rest| rest.trim_matches('/'))
        .filter(|rest| !rest.is_empty())
        .map(decode);

    key.or_else(|| last_segment(&target))
}

/// Last non-empty path segment of a URL, percent-decoded.
pub fn last_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(decode)
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
