// Shared fixtures for unit tests: an in-memory transport and an AES-128-CBC encryptor.

use async_trait::async_trait;
use bytes::Bytes;
use cbc::cipher::{
    BlockEncryptMut, KeyIvInit,
    block_padding::{NoPadding, Pkcs7},
};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::hls::HlsDownloaderError;
use crate::hls::transport::{HttpTransport, TransportResponse};

struct Route {
    status: StatusCode,
    body: Bytes,
    /// Requests answered with 500 before the route starts succeeding
    failures_left: u32,
}

/// Transport serving a fixed URL table. Unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(self, url: &str, body: impl Into<Bytes>) -> Self {
        self.insert(url, StatusCode::OK, body.into(), 0);
        self
    }

    pub(crate) fn route_status(self, url: &str, status: StatusCode) -> Self {
        self.insert(url, status, Bytes::new(), 0);
        self
    }

    /// Serve `body` after `failures` server errors.
    pub(crate) fn route_flaky(self, url: &str, failures: u32, body: impl Into<Bytes>) -> Self {
        self.insert(url, StatusCode::OK, body.into(), failures);
        self
    }

    fn insert(&self, url: &str, status: StatusCode, body: Bytes, failures_left: u32) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route {
                status,
                body,
                failures_left,
            },
        );
    }

    pub(crate) fn requests_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| *u == url)
            .count()
    }

    pub(crate) fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn fetch(&self, url: &str) -> Result<TransportResponse, HlsDownloaderError> {
        self.requests.lock().unwrap().push(url.to_string());
        let mut routes = self.routes.lock().unwrap();
        let response = match routes.get_mut(url) {
            None => TransportResponse {
                status: StatusCode::NOT_FOUND,
                body: Bytes::new(),
            },
            Some(route) if route.failures_left > 0 => {
                route.failures_left -= 1;
                TransportResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: Bytes::new(),
                }
            }
            Some(route) => TransportResponse {
                status: route.status,
                body: route.body.clone(),
            },
        };
        Ok(response)
    }
}

pub(crate) fn encrypt(plain: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Vec<u8> {
    let mut buf = vec![0u8; plain.len() + 16];
    buf[..plain.len()].copy_from_slice(plain);
    let ciphertext = cbc::Encryptor::<aes::Aes128>::new_from_slices(key, iv)
        .unwrap()
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plain.len())
        .unwrap();
    ciphertext.to_vec()
}

/// Raw CBC encryption of block-aligned input, for building invalid padding.
pub(crate) fn encrypt_unpadded(plain: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Vec<u8> {
    let mut buf = plain.to_vec();
    let len = buf.len();
    cbc::Encryptor::<aes::Aes128>::new_from_slices(key, iv)
        .unwrap()
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .unwrap()
        .to_vec()
}
