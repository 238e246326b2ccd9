use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use image::{ImageFormat, Rgba, RgbaImage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use nanimo::cache::{CacheLookup, ImageCache};
use nanimo::error::LoadError;
use nanimo::events::{ImageLoaded, LoadImage};
use nanimo::tasks::loader::{ImageFetcher, run};

/// Serves one small PNG for every URL after a short delay, counting how
/// often each fetch starts. URLs containing "missing" fail and URLs
/// containing "crash" panic.
struct SlowFetcher {
    calls: Arc<AtomicUsize>,
    png: Arc<Vec<u8>>,
}

impl SlowFetcher {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let img = RgbaImage::from_pixel(8, 12, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: calls.clone(),
                png: Arc::new(out.into_inner()),
            },
            calls,
        )
    }
}

impl ImageFetcher for SlowFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Vec<u8>, LoadError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = url.to_string();
        let png = self.png.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if url.contains("crash") {
                panic!("fetcher crashed on {url}");
            }
            if url.contains("missing") {
                return Err(LoadError::Fetch {
                    url,
                    reason: "404".into(),
                });
            }
            Ok(png.as_ref().clone())
        }
        .boxed()
    }
}

async fn recv(rx: &mut mpsc::Receiver<ImageLoaded>) -> ImageLoaded {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("loader reply timed out")
        .expect("loader closed")
}

#[tokio::test]
async fn duplicate_requests_fetch_once() {
    let (req_tx, req_rx) = mpsc::channel(16);
    let (res_tx, mut res_rx) = mpsc::channel(16);
    let (fetcher, calls) = SlowFetcher::new();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run(req_rx, res_tx, Arc::new(fetcher), cancel.clone(), 4, 512));

    for _ in 0..3 {
        req_tx
            .send(LoadImage {
                url: "https://img.example/a.png".into(),
            })
            .await
            .unwrap();
    }

    let loaded = recv(&mut res_rx).await;
    assert_eq!(loaded.url, "https://img.example/a.png");
    let image = loaded.result.unwrap();
    assert_eq!((image.width, image.height), (8, 12));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    drop(req_tx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(res_rx.recv().await.is_none());
}

#[tokio::test]
async fn cache_round_trip_through_loader() {
    let (req_tx, req_rx) = mpsc::channel(16);
    let (res_tx, res_rx) = mpsc::channel(16);
    let (fetcher, calls) = SlowFetcher::new();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run(req_rx, res_tx, Arc::new(fetcher), cancel.clone(), 2, 512));

    let mut cache = ImageCache::new(req_tx, res_rx);
    let good = "https://img.example/good.png";
    let bad = "https://img.example/missing.png";
    assert!(matches!(cache.get(good), CacheLookup::Pending));
    assert!(matches!(cache.get(bad), CacheLookup::Pending));
    // Repeated lookups while pending do not re-request.
    assert!(matches!(cache.get(good), CacheLookup::Pending));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while cache.pending_len() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "loads never finished");
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.poll();
    }

    assert!(matches!(cache.get(good), CacheLookup::Ready(_)));
    assert!(matches!(cache.get(bad), CacheLookup::Unavailable));
    assert_eq!(cache.ready_len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn closed_request_channel_drains_in_flight_then_exits() {
    let (req_tx, req_rx) = mpsc::channel(16);
    let (res_tx, mut res_rx) = mpsc::channel(16);
    let (fetcher, _) = SlowFetcher::new();
    let handle = tokio::spawn(run(
        req_rx,
        res_tx,
        Arc::new(fetcher),
        CancellationToken::new(),
        4,
        512,
    ));

    for name in ["one", "two"] {
        req_tx
            .send(LoadImage {
                url: format!("https://img.example/{name}.png"),
            })
            .await
            .unwrap();
    }
    drop(req_tx);

    let mut urls = vec![recv(&mut res_rx).await.url, recv(&mut res_rx).await.url];
    urls.sort();
    assert_eq!(urls, ["https://img.example/one.png", "https://img.example/two.png"]);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loader did not exit after its request channel closed")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn panicking_load_is_reported_as_aborted() {
    let (req_tx, req_rx) = mpsc::channel(16);
    let (res_tx, res_rx) = mpsc::channel(16);
    let (fetcher, _) = SlowFetcher::new();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run(req_rx, res_tx, Arc::new(fetcher), cancel.clone(), 2, 512));

    let mut cache = ImageCache::new(req_tx, res_rx);
    let url = "https://img.example/crash.png";
    assert!(matches!(cache.get(url), CacheLookup::Pending));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while cache.is_pending(url) {
        assert!(tokio::time::Instant::now() < deadline, "panicked load stayed pending");
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.poll();
    }
    assert!(matches!(cache.get(url), CacheLookup::Unavailable));

    // The loader survives and keeps serving.
    let good = "https://img.example/after.png";
    assert!(matches!(cache.get(good), CacheLookup::Pending));
    while cache.is_pending(good) {
        assert!(tokio::time::Instant::now() < deadline, "loader stopped after a panic");
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.poll();
    }
    assert!(matches!(cache.get(good), CacheLookup::Ready(_)));

    cancel.cancel();
    handle.await.unwrap().unwrap();
}
