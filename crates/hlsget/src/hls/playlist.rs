// HLS Playlist: parses M3U8 text into ordered segment URLs plus optional AES-128 metadata,
// and loads playlist text from the network or from a local file.

use crate::hls::HlsDownloaderError;
use crate::hls::transport::HttpTransport;
use reqwest::StatusCode;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

pub const PLAYLIST_HEADER: &str = "#EXTM3U";
const KEY_DIRECTIVE: &str = "#EXT-X-KEY:";

/// Encryption metadata taken from the first active `#EXT-X-KEY` directive.
///
/// Malformed directives keep empty strings; the failure surfaces when the
/// key cannot be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInfo {
    pub method: String,
    /// Already resolved against the base URL
    pub key_uri: String,
    /// Explicit IV; the zero IV applies when absent
    pub iv: Option<[u8; 16]>,
}

/// A parsed media playlist. Segment order is playback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub segments: Vec<String>,
    pub encryption: Option<EncryptionInfo>,
}

impl Playlist {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }
}

/// Parse playlist text. `base_url` may be empty, in which case relative
/// references are kept as-is.
pub fn parse_playlist(text: &str, base_url: &str) -> Result<Playlist, HlsDownloaderError> {
    let mut lines = text
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    match lines.next() {
        Some(first) if first.starts_with(PLAYLIST_HEADER) => {}
        _ => return Err(HlsDownloaderError::NotAPlaylist),
    }

    let mut segments = Vec::new();
    let mut encryption: Option<EncryptionInfo> = None;

    for line in lines {
        if let Some(attributes) = line.strip_prefix(KEY_DIRECTIVE) {
            if encryption.is_none() {
                encryption = parse_key_directive(attributes, base_url);
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        segments.push(resolve_reference(line, base_url));
    }

    if segments.is_empty() {
        return Err(HlsDownloaderError::EmptyPlaylist);
    }

    debug!(
        segments = segments.len(),
        encrypted = encryption.is_some(),
        "Parsed playlist"
    );
    Ok(Playlist {
        segments,
        encryption,
    })
}

/// Resolve a playlist reference against `base_url`.
///
/// References carrying a scheme are used verbatim. Otherwise the base is
/// prefixed, collapsing a doubled `/` at the seam.
pub fn resolve_reference(reference: &str, base_url: &str) -> String {
    if reference.contains("://") || base_url.is_empty() {
        return reference.to_string();
    }
    match (base_url.ends_with('/'), reference.strip_prefix('/')) {
        (true, Some(rest)) => format!("{base_url}{rest}"),
        _ => format!("{base_url}{reference}"),
    }
}

/// Directory of a playlist URL, used as the base when none is configured.
pub fn derive_base_url(playlist_url: &str) -> Option<String> {
    let url = Url::parse(playlist_url).ok()?;
    url.join(".").ok().map(|base| base.to_string())
}

fn parse_key_directive(attributes: &str, base_url: &str) -> Option<EncryptionInfo> {
    let mut method = String::new();
    let mut uri = String::new();
    let mut iv = None;

    for (name, value) in split_attributes(attributes) {
        match name {
            "METHOD" => method = value.to_string(),
            "URI" => uri = value.trim_matches('"').to_string(),
            "IV" => iv = parse_iv(value),
            _ => {}
        }
    }

    if method.eq_ignore_ascii_case("NONE") {
        return None;
    }

    let key_uri = if uri.is_empty() {
        uri
    } else {
        resolve_reference(&uri, base_url)
    };
    Some(EncryptionInfo {
        method,
        key_uri,
        iv,
    })
}

/// Split `A=1,B="x,y",C=2` on commas outside quotes.
fn split_attributes(attributes: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (pos, ch) in attributes.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                pairs.extend(split_pair(&attributes[start..pos]));
                start = pos + 1;
            }
            _ => {}
        }
    }
    pairs.extend(split_pair(&attributes[start..]));
    pairs
}

fn split_pair(item: &str) -> Option<(&str, &str)> {
    let (name, value) = item.split_once('=')?;
    Some((name.trim(), value.trim()))
}

fn parse_iv(value: &str) -> Option<[u8; 16]> {
    let hex_str = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    let mut iv = [0u8; 16];
    hex::decode_to_slice(hex_str, &mut iv).ok()?;
    Some(iv)
}

/// Loads raw playlist text for the two entry flows.
pub struct PlaylistLoader {
    transport: Arc<dyn HttpTransport>,
}

impl PlaylistLoader {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    pub async fn load_remote(&self, url: &str) -> Result<String, HlsDownloaderError> {
        let response = self.transport.fetch(url).await.map_err(|e| {
            HlsDownloaderError::PlaylistError(format!("Failed to fetch playlist {url}: {e}"))
        })?;
        if response.status != StatusCode::OK {
            return Err(HlsDownloaderError::PlaylistError(format!(
                "Failed to fetch playlist {url}: HTTP {}",
                response.status
            )));
        }
        let content = String::from_utf8(response.body.to_vec()).map_err(|e| {
            HlsDownloaderError::PlaylistError(format!("Playlist {url} is not valid UTF-8: {e}"))
        })?;
        info!(url, bytes = content.len(), "Playlist downloaded");
        Ok(content)
    }

    pub async fn load_local(&self, path: &Path) -> Result<String, HlsDownloaderError> {
        tokio::fs::read_to_string(path).await.map_err(|e| {
            HlsDownloaderError::PlaylistError(format!(
                "Failed to read playlist file {}: {e}",
                path.display()
            ))
        })
    }
}
