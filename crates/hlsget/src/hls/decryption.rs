// HLS Decryption Service: resolves the AES-128 key once per run and decrypts segment files
// in bounded chunks.

use crate::hls::HlsDownloaderError;
use crate::hls::playlist::EncryptionInfo;
use crate::hls::transport::HttpTransport;
use aes::Aes128;
use cbc::cipher::block_padding::{Padding, Pkcs7};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use reqwest::StatusCode;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info};

type Aes128CbcDec = cbc::Decryptor<Aes128>;

const BLOCK_SIZE: usize = 16;
const SUPPORTED_METHOD: &str = "AES-128";

/// Key material for a run. The IV is the zero IV unless the playlist names one.
#[derive(Clone, PartialEq, Eq)]
pub struct SegmentKey {
    pub key: [u8; 16],
    pub iv: [u8; 16],
}

impl SegmentKey {
    pub fn new(key: [u8; 16], iv: Option<[u8; 16]>) -> Self {
        Self {
            key,
            iv: iv.unwrap_or([0u8; 16]),
        }
    }
}

impl fmt::Debug for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentKey")
            .field("key", &"<redacted>")
            .field("iv", &hex::encode(self.iv))
            .finish()
    }
}

// --- KeyResolver ---
// Single fetch of the key URI; any failure is fatal for the run.
pub struct KeyResolver {
    transport: Arc<dyn HttpTransport>,
}

impl KeyResolver {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    pub async fn resolve(&self, info: &EncryptionInfo) -> Result<SegmentKey, HlsDownloaderError> {
        let uri = info.key_uri.as_str();
        if !info.method.is_empty() && !info.method.eq_ignore_ascii_case(SUPPORTED_METHOD) {
            return Err(HlsDownloaderError::key_fetch(
                uri,
                format!("Unsupported encryption method: {}", info.method),
            ));
        }
        if uri.is_empty() {
            return Err(HlsDownloaderError::key_fetch(uri, "Key URI is missing"));
        }

        let response = self
            .transport
            .fetch(uri)
            .await
            .map_err(|e| HlsDownloaderError::key_fetch(uri, e.to_string()))?;
        if response.status != StatusCode::OK {
            return Err(HlsDownloaderError::key_fetch(
                uri,
                format!("HTTP {}", response.status),
            ));
        }

        let key: [u8; 16] = response.body.as_ref().try_into().map_err(|_| {
            HlsDownloaderError::key_fetch(
                uri,
                format!(
                    "Key has incorrect length: {} bytes (expected 16)",
                    response.body.len()
                ),
            )
        })?;

        info!(uri, explicit_iv = info.iv.is_some(), "Decryption key resolved");
        Ok(SegmentKey::new(key, info.iv))
    }
}

// --- ChunkedDecryptor ---

/// Incremental AES-128-CBC decryption.
///
/// The last complete block is held back until [`finalize`](Self::finalize)
/// so its PKCS#7 padding can be checked.
pub struct ChunkedDecryptor {
    cipher: Aes128CbcDec,
    carry: Vec<u8>,
}

impl ChunkedDecryptor {
    pub fn new(key: &SegmentKey) -> Result<Self, HlsDownloaderError> {
        let cipher = Aes128CbcDec::new_from_slices(&key.key, &key.iv).map_err(|e| {
            HlsDownloaderError::DecryptionError(format!(
                "Failed to initialize AES decryptor: {e}"
            ))
        })?;
        Ok(Self {
            cipher,
            carry: Vec::with_capacity(BLOCK_SIZE * 2),
        })
    }

    /// Feed ciphertext, returning whatever plaintext is safe to emit.
    pub fn update(&mut self, ciphertext: &[u8]) -> Vec<u8> {
        self.carry.extend_from_slice(ciphertext);
        // Always keep at least one byte, so a full trailing block stays behind.
        let ready = self.carry.len().saturating_sub(1) / BLOCK_SIZE * BLOCK_SIZE;
        if ready == 0 {
            return Vec::new();
        }

        let mut plain: Vec<u8> = self.carry.drain(..ready).collect();
        for block in plain.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher
                .decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        plain
    }

    /// Decrypt the final block and strip its padding.
    pub fn finalize(mut self) -> Result<Vec<u8>, HlsDownloaderError> {
        if self.carry.len() != BLOCK_SIZE {
            return Err(HlsDownloaderError::DecryptionError(
                "Ciphertext length is not a positive multiple of the AES block size".to_string(),
            ));
        }

        let mut block = GenericArray::clone_from_slice(&self.carry);
        self.cipher.decrypt_block_mut(&mut block);
        let plain = Pkcs7::unpad(&block).map_err(|_| {
            HlsDownloaderError::DecryptionError("Invalid PKCS#7 padding".to_string())
        })?;
        Ok(plain.to_vec())
    }
}

/// Decrypt `src` into `dst`, reading `chunk_size` bytes at a time.
///
/// Plaintext is staged next to `dst` and renamed into place only after the
/// padding checks out, so `dst` never holds partial output. Returns the
/// number of plaintext bytes written.
pub async fn decrypt_file(
    src: &Path,
    dst: &Path,
    key: &SegmentKey,
    chunk_size: usize,
) -> Result<u64, HlsDownloaderError> {
    let staging = staging_path(dst);
    match decrypt_into(src, &staging, key, chunk_size).await {
        Ok(written) => {
            tokio::fs::rename(&staging, dst).await?;
            debug!(path = %dst.display(), written, "Segment decrypted");
            Ok(written)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&staging).await;
            Err(e)
        }
    }
}

async fn decrypt_into(
    src: &Path,
    dst: &Path,
    key: &SegmentKey,
    chunk_size: usize,
) -> Result<u64, HlsDownloaderError> {
    let mut input = File::open(src).await?;
    let mut output = BufWriter::new(File::create(dst).await?);
    let mut decryptor = ChunkedDecryptor::new(key)?;
    let mut buf = vec![0u8; chunk_size.max(BLOCK_SIZE)];
    let mut written = 0u64;

    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let plain = decryptor.update(&buf[..n]);
        output.write_all(&plain).await?;
        written += plain.len() as u64;
    }

    let tail = decryptor.finalize()?;
    output.write_all(&tail).await?;
    written += tail.len() as u64;
    output.flush().await?;
    Ok(written)
}

fn staging_path(dst: &Path) -> PathBuf {
    let mut name = dst.as_os_str().to_owned();
    name.push(".dec");
    PathBuf::from(name)
}
