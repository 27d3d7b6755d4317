use std::path::Path;

use crate::error::AppError;

/// Longest name derived from an input, in characters
const MAX_DERIVED_NAME: usize = 30;

/// Whether `input` should be fetched over the network rather than read from disk.
pub fn is_url(input: &str) -> bool {
    let lower = input.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Extracts a filename from a URL, removing the file extension and truncating if too long.
///
/// `https://example.com/vod/index.m3u8?token=1` becomes `index`.
pub fn extract_filename_from_url(url_str: &str) -> Result<String, AppError> {
    let url = url_str
        .parse::<reqwest::Url>()
        .map_err(|e| AppError::InvalidInput(format!("{url_str}: {e}")))?;

    let file_name = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("output");

    Ok(shorten(strip_extension(file_name)))
}

/// File stem of a local playlist path, truncated like URL-derived names.
pub fn extract_filename_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if stem.is_empty() {
        "output".to_string()
    } else {
        shorten(&stem)
    }
}

/// Replaces the `%u` placeholder with `derived`.
pub fn expand_name(template: &str, derived: &str) -> String {
    template.replace("%u", derived)
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

fn shorten(name: &str) -> String {
    name.chars().take(MAX_DERIVED_NAME).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detects_urls() {
        assert!(is_url("https://example.com/a.m3u8"));
        assert!(is_url("HTTP://example.com/a.m3u8"));
        assert!(!is_url("./a.m3u8"));
        assert!(!is_url("C:\\lists\\a.m3u8"));
    }

    #[test]
    fn names_from_urls() {
        assert_eq!(
            extract_filename_from_url("https://example.com/vod/index.m3u8?token=1").unwrap(),
            "index"
        );
        assert_eq!(extract_filename_from_url("https://example.com/").unwrap(), "output");
        let long = format!("https://example.com/{}.m3u8", "x".repeat(50));
        assert_eq!(extract_filename_from_url(&long).unwrap().len(), 30);
        assert!(matches!(
            extract_filename_from_url("not a url"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn names_from_paths() {
        assert_eq!(extract_filename_from_path(&PathBuf::from("lists/show.m3u8")), "show");
        assert_eq!(extract_filename_from_path(&PathBuf::from("")), "output");
        let multibyte = format!("{}.m3u8", "é".repeat(40));
        assert_eq!(
            extract_filename_from_path(&PathBuf::from(multibyte)).chars().count(),
            30
        );
    }

    #[test]
    fn expands_placeholder() {
        assert_eq!(expand_name("episode_%u", "index"), "episode_index");
        assert_eq!(expand_name("fixed", "index"), "fixed");
    }
}
