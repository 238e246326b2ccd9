use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fast_image_resize as fir;
use futures::FutureExt;
use futures::future::BoxFuture;
use image::RgbaImage;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::DecodedImage;
use crate::error::LoadError;
use crate::events::{ImageLoaded, LoadImage};

/// Source of raw poster bytes.
pub trait ImageFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Vec<u8>, LoadError>>;
}

/// Fetches http(s) URLs with reqwest and reads `file://` URLs or bare paths
/// from disk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build image http client")?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Vec<u8>, LoadError>> {
        let url = url.to_string();
        if url.starts_with("http://") || url.starts_with("https://") {
            let client = self.client.clone();
            return async move {
                let fetch_err = |reason: String| LoadError::Fetch {
                    url: url.clone(),
                    reason,
                };
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| fetch_err(e.to_string()))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(fetch_err(format!("http status {status}")));
                }
                let bytes = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
                Ok(bytes.to_vec())
            }
            .boxed();
        }

        let path = if let Some(rest) = url.strip_prefix("file://") {
            PathBuf::from(rest)
        } else if !url.contains("://") {
            PathBuf::from(&url)
        } else {
            return async move { Err(LoadError::UnsupportedScheme(url)) }.boxed();
        };
        async move {
            tokio::fs::read(&path).await.map_err(|e| LoadError::Fetch {
                url,
                reason: e.to_string(),
            })
        }
        .boxed()
    }
}

/// Decodes `bytes` to RGBA8, downscaling so the longest edge is at most
/// `max_edge`.
pub fn decode_poster(url: &str, bytes: &[u8], max_edge: u32) -> Result<DecodedImage, LoadError> {
    let decode_err = |reason: String| LoadError::Decode {
        url: url.to_string(),
        reason,
    };
    let img = image::load_from_memory(bytes)
        .map_err(|e| decode_err(e.to_string()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(decode_err("image has no pixels".into()));
    }

    let longest = width.max(height);
    let img = if longest > max_edge {
        let scale = max_edge as f64 / longest as f64;
        let target_w = ((width as f64 * scale).round() as u32).max(1);
        let target_h = ((height as f64 * scale).round() as u32).max(1);
        resize_rgba(&img, target_w, target_h).map_err(|e| decode_err(format!("{e:#}")))?
    } else {
        img
    };

    let (width, height) = img.dimensions();
    Ok(DecodedImage {
        url: url.to_string(),
        width,
        height,
        pixels: img.into_raw(),
    })
}

fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for poster resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("poster resize failed")?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .context("failed to construct resized RGBA image")
}

async fn load_one<F: ImageFetcher>(fetcher: Arc<F>, url: String, max_edge: u32) -> Result<DecodedImage, LoadError> {
    let bytes = fetcher.fetch(&url).await?;
    let decode_url = url.clone();
    tokio::task::spawn_blocking(move || decode_poster(&decode_url, &bytes, max_edge))
        .await
        .map_err(|_| LoadError::Aborted(url))?
}

/// Fetches and decodes posters requested by the image cache.
///
/// At most `max_in_flight` loads run at once. A URL already in flight is not
/// fetched again; its single reply serves every requester. A load that
/// panics is reported as [`LoadError::Aborted`]. Exits when the token is
/// cancelled or the request channel closes with nothing in flight.
pub async fn run<F: ImageFetcher>(
    mut requests: Receiver<LoadImage>,
    results: Sender<ImageLoaded>,
    fetcher: Arc<F>,
    cancel: CancellationToken,
    max_in_flight: usize,
    max_edge: u32,
) -> Result<()> {
    let mut in_flight: HashSet<String> = HashSet::new();
    let mut tasks: JoinSet<(String, Result<DecodedImage, LoadError>)> = JoinSet::new();
    let mut requests_open = true;

    loop {
        if !requests_open && tasks.is_empty() {
            debug!("image request channel closed; loader idle");
            break;
        }
        select! {
            _ = cancel.cancelled() => break,

            request = requests.recv(), if requests_open && in_flight.len() < max_in_flight.max(1) => {
                let Some(LoadImage { url }) = request else {
                    requests_open = false;
                    continue;
                };
                if !in_flight.insert(url.clone()) {
                    debug!(url = %url, "image_load_deduplicated");
                    continue;
                }
                debug!(url = %url, in_flight = in_flight.len(), "image_load_started");
                let fetcher = fetcher.clone();
                tasks.spawn(async move {
                    let result = AssertUnwindSafe(load_one(fetcher, url.clone(), max_edge))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            warn!(url = %url, "image load panicked");
                            Err(LoadError::Aborted(url.clone()))
                        });
                    (url, result)
                });
            }

            Some(join_res) = tasks.join_next() => {
                let (url, result) = match join_res {
                    Ok(done) => done,
                    Err(err) => {
                        // Only reachable when the runtime aborts the task on shutdown.
                        warn!(error = %err, "image load task failed");
                        continue;
                    }
                };
                in_flight.remove(&url);
                match &result {
                    Ok(image) => debug!(url = %url, width = image.width, height = image.height, "image_loaded"),
                    Err(err) => debug!(error = %err, "image_load_failed"),
                }
                let event = ImageLoaded { url, result: result.map(Arc::new) };
                if results.send(event).await.is_err() {
                    debug!("image cache dropped; stopping loader");
                    break;
                }
            }
        }
    }
    Ok(())
}
