//! Utility functions for filenames and content types.

/// Default extension when neither the content type nor the URL gives one.
const FALLBACK_EXT: &str = ".jpg";

/// Extensions accepted when falling back to the source URL.
const URL_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif"];

/// Picks a file extension for a downloaded image.
///
/// The response's declared content type wins; otherwise the source URL's
/// extension is used when it looks like an image; otherwise `.jpg`.
pub fn extension_for(content_type: Option<&str>, url: &str) -> String {
    if let Some(content_type) = content_type {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        // `image/jpeg` maps to `.jpe` in mime tables; normalize to `.jpg`.
        let ext = match mime.as_str() {
            "image/jpeg" => Some(".jpg"),
            "image/png" => Some(".png"),
            "image/webp" => Some(".webp"),
            "image/gif" => Some(".gif"),
            "image/avif" => Some(".avif"),
            _ => None,
        };
        if let Some(ext) = ext {
            return ext.to_string();
        }
    }

    let path = url.split('?').next().unwrap_or(url);
    if let Some(dot) = path.rfind('.') {
        let ext = path[dot..].to_ascii_lowercase();
        if URL_EXTENSIONS.contains(&ext.as_str()) {
            return ext;
        }
    }

    FALLBACK_EXT.to_string()
}

/// Formats a 1-based sequence index into a zero-padded image filename.
///
/// The padding makes lexicographic filename order equal sequence order.
pub fn image_filename(index: usize, ext: &str) -> String {
    format!("{:03}{}", index, ext)
}

/// Makes a manga or chapter title safe to use as a directory name.
///
/// Replaces path separators and characters reserved on common filesystems,
/// collapses whitespace, and never returns an empty string.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = cleaned.trim_matches('.').trim();

    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}
