//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use teloxide::types::{ChatId, MessageId};

use mediarelay::download::{DownloadExecutor, ScratchDir, ThumbnailProcessor};
use mediarelay::telegram::{CallbackUrlCache, ControllerSettings, JobController, RelayUploader};

#[path = "../mocks/mod.rs"]
pub mod mocks;

pub use mocks::{callback_data, ExtractorCall, FakeExtractor, FakeRelay, RelayCall};

pub const CHAT: ChatId = ChatId(4242);
pub const USER_MESSAGE: MessageId = MessageId(7);

/// Controller wired to fakes over a temporary scratch root
pub struct TestEnvironment {
    pub relay: Arc<FakeRelay>,
    pub extractor: Arc<FakeExtractor>,
    pub controller: JobController,
    pub scratch: TempDir,
}

impl TestEnvironment {
    pub fn new(extractor: FakeExtractor) -> Self {
        Self::build(extractor, FakeRelay::new(), u64::MAX)
    }

    pub fn with_relay(extractor: FakeExtractor, relay: FakeRelay) -> Self {
        Self::build(extractor, relay, u64::MAX)
    }

    pub fn with_upload_cap(extractor: FakeExtractor, cap: u64) -> Self {
        Self::build(extractor, FakeRelay::new(), cap)
    }

    fn build(extractor: FakeExtractor, relay: FakeRelay, cap: u64) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let relay = Arc::new(relay);
        let extractor = Arc::new(extractor);

        let executor = DownloadExecutor::new(
            extractor.clone(),
            ThumbnailProcessor::default(),
            ScratchDir::new(scratch.path()),
        );
        let uploader = RelayUploader::new(relay.clone(), cap, Duration::from_millis(5));
        let settings = ControllerSettings {
            progress_interval: Duration::ZERO,
            error_linger: Duration::ZERO,
        };
        let controller = JobController::new(relay.clone(), executor, uploader, CallbackUrlCache::default(), settings);

        Self {
            relay,
            extractor,
            controller,
            scratch,
        }
    }

    /// Number of entries left under the scratch root
    pub fn scratch_entries(&self) -> usize {
        count_entries(self.scratch.path())
    }
}

pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// `width`x`height` solid PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Serves `body` as `image/png` to every connection on a local port and
/// returns the URL.
pub async fn serve_image(body: Vec<u8>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}/thumb.png", addr)
}
