//! Filename selection for downloads.
//!
//! A job's stored filename comes from the Content-Disposition header when the
//! server sends one, otherwise from the percent-decoded last path segment of
//! the source URL. Candidates are sanitized for Linux filesystems; a name
//! that decodes to nothing usable is reported as `None` so the executor can
//! fail the job instead of writing to an empty path.

mod content_disposition;
mod percent;

pub use content_disposition::parse_content_disposition_filename;
pub use percent::{percent_decode, percent_encode};

/// Picks the filename to store a download under.
///
/// The Content-Disposition hint wins over the URL path; the URL path segment
/// is percent-decoded first (`report%20final.pdf` → `report final.pdf`).
/// Returns `None` when neither source yields a non-empty, safe name.
pub fn select_filename(url: &str, content_disposition: Option<&str>) -> Option<String> {
    let candidate = content_disposition
        .and_then(parse_content_disposition_filename)
        .filter(|name| !name.is_empty())
        .or_else(|| decoded_url_filename(url));

    candidate.map(|raw| sanitize(&raw)).filter(|name| {
        !name.is_empty() && name != "." && name != ".."
    })
}

/// Percent-decoded last path segment of `url`, or `None` when the path is
/// empty, root, or decodes to an empty string.
pub fn decoded_url_filename(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().rsplit('/').find(|s| !s.is_empty())?;
    let decoded = percent_decode(segment)?;
    if decoded.is_empty() {
        return None;
    }
    Some(decoded)
}

/// Strips path separators, NUL and control characters, and leading/trailing
/// dots and whitespace so the name is safe as a single Linux path component.
fn sanitize(raw: &str) -> String {
    // A name that is nothing but separators ("//") has no usable component.
    if raw.chars().all(|c| c == '/') {
        return String::new();
    }
    let cleaned: String = raw
        .chars()
        .map(|c| if c == '/' { '_' } else { c })
        .filter(|c| *c != '\0' && !c.is_control())
        .collect();
    cleaned.trim_matches(|c: char| c == ' ' || c == '.').to_string()
}
