//! Default output filename derivation.
//!
//! Prefers a `Content-Disposition` filename from the probe, then the last
//! URL path segment, sanitized for Linux filesystems.

/// Fallback when neither the URL path nor Content-Disposition helps.
const DEFAULT_FILENAME: &str = "download.bin";

/// Derive a safe local filename for the download.
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    let candidate = content_disposition
        .and_then(disposition_filename)
        .or_else(|| url_path_filename(url));

    match candidate.map(|c| sanitize(&c)) {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name,
        _ => DEFAULT_FILENAME.to_string(),
    }
}

/// `filename="x"` or `filename=x` from a Content-Disposition value.
fn disposition_filename(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("filename=") {
            let name = rest.trim().trim_matches('"').trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

/// Last non-empty path segment of the URL, if any.
fn url_path_filename(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    Some(segment.to_string())
}

/// Replace path separators and control characters, trim dot/space edges,
/// cap at NAME_MAX.
fn sanitize(name: &str) -> String {
    const NAME_MAX: usize = 255;
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == ' ' || c == '.');
    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}
