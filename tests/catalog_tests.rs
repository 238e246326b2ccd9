use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use nanimo::catalog::{CatalogStore, TrendingSource, fetch_all};
use nanimo::config::CatalogConfig;
use nanimo::error::CatalogError;
use nanimo::events::CatalogCommand;
use nanimo::media::{MediaKind, MediaRecord};
use nanimo::tasks;

/// Returns `per_page` records per page with ids `page * 100 + n`. Earlier
/// pages answer later so out-of-order completion is exercised.
struct FakeSource {
    fail_page: Option<u32>,
    calls: Arc<AtomicUsize>,
}

impl FakeSource {
    fn new(fail_page: Option<u32>) -> Self {
        Self {
            fail_page,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl TrendingSource for FakeSource {
    fn fetch_page(
        &self,
        kind: MediaKind,
        page: u32,
        per_page: u32,
    ) -> BoxFuture<'static, Result<Vec<MediaRecord>, CatalogError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_page == Some(page);
        async move {
            tokio::time::sleep(Duration::from_millis(40 / page as u64)).await;
            if fail {
                return Err(CatalogError::Status(500));
            }
            let offset = if kind == MediaKind::Manga { 10_000 } else { 0 };
            Ok((0..per_page as u64)
                .map(|n| MediaRecord {
                    id: offset + page as u64 * 100 + n,
                    ..MediaRecord::default()
                })
                .collect())
        }
        .boxed()
    }
}

#[tokio::test]
async fn pages_are_concatenated_in_order() {
    let source = FakeSource::new(None);
    let records = fetch_all(&source, MediaKind::Anime, 3, 2).await.unwrap();
    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![100, 101, 200, 201, 300, 301]);
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failed_page_sets_error_and_keeps_records() {
    let store = CatalogStore::new(MediaKind::Anime);
    store.fetch_trending(&FakeSource::new(None), 2, 3).await;
    let first = store.snapshot();
    assert_eq!(first.records.len(), 6);
    assert_eq!(first.generation, 1);
    assert!(first.error.is_none());

    store.fetch_trending(&FakeSource::new(Some(2)), 2, 3).await;
    let snap = store.snapshot();
    assert!(!snap.is_loading);
    assert_eq!(snap.error.as_deref(), Some("AniList API error: 500"));
    assert_eq!(snap.records.len(), 6);
    assert_eq!(snap.generation, 1);
}

#[tokio::test]
async fn task_refetches_on_media_kind_change() {
    let store = Arc::new(CatalogStore::new(MediaKind::Anime));
    let mut rx = store.subscribe();
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let cfg = CatalogConfig {
        pages: 1,
        per_page: 2,
        ..CatalogConfig::default()
    };
    let source = Arc::new(FakeSource::new(None));
    let handle = tokio::spawn(tasks::catalog::run(
        cmd_rx,
        store.clone(),
        source.clone(),
        cfg,
        cancel.clone(),
    ));

    cmd_tx.send(CatalogCommand::FetchTrending).await.unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.generation == 1 && !s.is_loading),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(store.snapshot().records[0].id, 100);

    // Same kind again: no refetch.
    cmd_tx
        .send(CatalogCommand::SetMediaKind(MediaKind::Anime))
        .await
        .unwrap();
    cmd_tx
        .send(CatalogCommand::SetMediaKind(MediaKind::Manga))
        .await
        .unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.generation == 2 && !s.is_loading),
    )
    .await
    .unwrap()
    .unwrap();
    let snap = store.snapshot();
    assert_eq!(snap.media_kind, MediaKind::Manga);
    assert_eq!(snap.records[0].id, 10_100);
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn offline_catalog_never_fetches() {
    let store = Arc::new(CatalogStore::new(MediaKind::Anime));
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let cfg = CatalogConfig {
        offline: true,
        ..CatalogConfig::default()
    };
    let source = Arc::new(FakeSource::new(None));
    let handle = tokio::spawn(tasks::catalog::run(
        cmd_rx,
        store.clone(),
        source.clone(),
        cfg,
        CancellationToken::new(),
    ));
    cmd_tx.send(CatalogCommand::FetchTrending).await.unwrap();
    drop(cmd_tx);
    handle.await.unwrap().unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(store.snapshot().records.is_empty());
}

#[tokio::test]
async fn closed_commands_let_outstanding_fetch_land() {
    let store = Arc::new(CatalogStore::new(MediaKind::Anime));
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let cfg = CatalogConfig {
        pages: 2,
        per_page: 1,
        ..CatalogConfig::default()
    };
    let handle = tokio::spawn(tasks::catalog::run(
        cmd_rx,
        store.clone(),
        Arc::new(FakeSource::new(None)),
        cfg,
        CancellationToken::new(),
    ));
    cmd_tx.send(CatalogCommand::FetchTrending).await.unwrap();
    drop(cmd_tx);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("catalog task did not exit after its command channel closed")
        .unwrap()
        .unwrap();
    let snap = store.snapshot();
    assert_eq!(snap.records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![100, 200]);
    assert!(!snap.is_loading);
}
