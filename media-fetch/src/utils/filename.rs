//! Filename sanitization for download attachment names.
//!
//! Titles come straight from the catalog and may contain anything. The
//! sanitized form is safe on Windows, Linux and macOS while keeping
//! non-ASCII text such as CJK characters intact.

/// Characters that are invalid in Windows filenames
const WINDOWS_INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Windows reserved filenames (case-insensitive)
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Longest sanitized stem, in characters.
pub const MAX_STEM_CHARS: usize = 200;

/// Stem used when nothing usable is left of the title.
pub const FALLBACK_STEM: &str = "video";

/// Sanitize a media title for use as a filename stem.
///
/// 1. Control characters and Windows-invalid characters become `_`
/// 2. Runs of `_` collapse into one
/// 3. Leading/trailing spaces and dots are trimmed
/// 4. The result is capped at [`MAX_STEM_CHARS`] characters
/// 5. Windows reserved names are prefixed with `_`
/// 6. An empty result becomes [`FALLBACK_STEM`]
///
/// ```
/// use media_fetch::utils::filename::sanitize_filename;
///
/// assert_eq!(sanitize_filename("hello?world"), "hello_world");
/// assert_eq!(sanitize_filename(""), "video");
/// assert_eq!(sanitize_filename("CON"), "_CON");
/// ```
pub fn sanitize_filename(input: &str) -> String {
    let mut result = String::with_capacity(input.len());

    for c in input.chars() {
        let c = if c.is_control() || WINDOWS_INVALID_CHARS.contains(&c) {
            '_'
        } else {
            c
        };
        if c == '_' && result.ends_with('_') {
            continue;
        }
        result.push(c);
    }

    let trimmed = result.trim_matches(|c| c == ' ' || c == '.');
    let capped: String = trimmed.chars().take(MAX_STEM_CHARS).collect();
    // capping can expose a trailing space or dot
    let capped = capped.trim_end_matches(|c| c == ' ' || c == '.');

    if capped.is_empty() {
        return FALLBACK_STEM.to_string();
    }

    let upper = capped.to_uppercase();
    for reserved in WINDOWS_RESERVED_NAMES {
        if upper == *reserved || upper.starts_with(&format!("{}.", reserved)) {
            return format!("_{}", capped);
        }
    }

    capped.to_string()
}

/// Attachment name for a merged download of `title`.
pub fn download_name(title: &str) -> String {
    format!("{}.mp4", sanitize_filename(title))
}
