//! Render-thread side of poster streaming.
//!
//! The cache never blocks: lookups enqueue a request for the loader task and
//! report `Pending` until [`ImageCache::poll`] drains the matching reply.
//! Entries are never evicted.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, warn};

use crate::events::{ImageLoaded, LoadImage};

/// Decoded RGBA8 poster ready for upload.
pub struct DecodedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("url", &self.url)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl DecodedImage {
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

pub type ImageHandle = Arc<DecodedImage>;

#[derive(Debug, Clone)]
pub enum CacheLookup {
    Ready(ImageHandle),
    Pending,
    Unavailable,
}

#[derive(Debug)]
pub struct ImageCache {
    ready: HashMap<String, ImageHandle>,
    pending: HashSet<String>,
    unavailable: HashSet<String>,
    requests: Sender<LoadImage>,
    results: Receiver<ImageLoaded>,
    loader_gone: bool,
}

impl ImageCache {
    pub fn new(requests: Sender<LoadImage>, results: Receiver<ImageLoaded>) -> Self {
        Self {
            ready: HashMap::new(),
            pending: HashSet::new(),
            unavailable: HashSet::new(),
            requests,
            results,
            loader_gone: false,
        }
    }

    /// Looks up `url`, requesting it from the loader on first sight.
    pub fn get(&mut self, url: &str) -> CacheLookup {
        if let Some(handle) = self.ready.get(url) {
            return CacheLookup::Ready(handle.clone());
        }
        if self.pending.contains(url) {
            return CacheLookup::Pending;
        }
        if self.unavailable.contains(url) {
            return CacheLookup::Unavailable;
        }
        if self.loader_gone {
            self.unavailable.insert(url.to_string());
            return CacheLookup::Unavailable;
        }

        match self.requests.try_send(LoadImage {
            url: url.to_string(),
        }) {
            Ok(()) => {
                debug!(url, "image_cache_request");
                self.pending.insert(url.to_string());
                CacheLookup::Pending
            }
            // Not marked pending: the next frame asks again.
            Err(TrySendError::Full(_)) => CacheLookup::Pending,
            Err(TrySendError::Closed(_)) => {
                warn!(url, "image loader channel closed");
                self.loader_gone = true;
                self.unavailable.insert(url.to_string());
                CacheLookup::Unavailable
            }
        }
    }

    /// Returns a cached image without triggering a request.
    pub fn peek(&self, url: &str) -> Option<ImageHandle> {
        self.ready.get(url).cloned()
    }

    /// Drains finished loads. Returns how many images became ready.
    pub fn poll(&mut self) -> usize {
        let mut newly_ready = 0;
        loop {
            match self.results.try_recv() {
                Ok(ImageLoaded { url, result }) => {
                    self.pending.remove(&url);
                    if self.ready.contains_key(&url) {
                        continue;
                    }
                    match result {
                        Ok(handle) => {
                            debug!(
                                url = %url,
                                width = handle.width,
                                height = handle.height,
                                "image_cache_ready"
                            );
                            self.unavailable.remove(&url);
                            self.ready.insert(url, handle);
                            newly_ready += 1;
                        }
                        Err(err) => {
                            debug!(error = %err, "image_cache_unavailable");
                            self.unavailable.insert(url);
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.loader_gone {
                        warn!(pending = self.pending.len(), "image loader stopped");
                    }
                    self.loader_gone = true;
                    self.unavailable.extend(self.pending.drain());
                    break;
                }
            }
        }
        newly_ready
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.pending.contains(url)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }
}
