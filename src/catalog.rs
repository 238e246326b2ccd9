//! Trending-media catalog: the AniList client and the snapshot store the
//! render thread reads from.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::CatalogError;
use crate::media::{MediaKind, MediaRecord, null_as_default};

pub const TRENDING_QUERY: &str = r#"
query TrendingMedia($page: Int, $perPage: Int, $type: MediaType) {
  Page(page: $page, perPage: $perPage) {
    pageInfo {
      total
      currentPage
      lastPage
      hasNextPage
    }
    media(type: $type, sort: TRENDING_DESC, isAdult: false) {
      id
      title {
        romaji
        english
        native
      }
      coverImage {
        extraLarge
        large
        medium
        color
      }
      averageScore
      genres
      description(asHtml: false)
      episodes
      chapters
      status
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<TrendingData>,
    #[serde(default, deserialize_with = "null_as_default")]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TrendingData {
    #[serde(rename = "Page")]
    page: Option<TrendingPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrendingPage {
    page_info: Option<PageInfo>,
    /// Null entries are skipped.
    #[serde(default, deserialize_with = "null_as_default")]
    media: Vec<Option<MediaRecord>>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub total: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub current_page: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub last_page: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub has_next_page: bool,
}

/// Parses one GraphQL response body into the page's media records.
pub fn parse_trending_page(body: &str) -> Result<Vec<MediaRecord>, CatalogError> {
    let response: GraphqlResponse = serde_json::from_str(body)?;
    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(CatalogError::Graphql(messages.join("; ")));
    }
    let page = response
        .data
        .and_then(|data| data.page)
        .ok_or(CatalogError::MissingPage)?;
    if let Some(info) = page.page_info {
        debug!(
            page = info.current_page,
            last_page = info.last_page,
            has_next = info.has_next_page,
            "catalog_page_parsed"
        );
    }
    Ok(page.media.into_iter().flatten().collect())
}

/// A paged source of trending titles.
pub trait TrendingSource: Send + Sync + 'static {
    /// Fetches one 1-indexed page.
    fn fetch_page(
        &self,
        kind: MediaKind,
        page: u32,
        per_page: u32,
    ) -> BoxFuture<'static, Result<Vec<MediaRecord>, CatalogError>>;
}

#[derive(Debug, Clone)]
pub struct AniListSource {
    client: reqwest::Client,
    endpoint: String,
}

impl AniListSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build catalog http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl TrendingSource for AniListSource {
    fn fetch_page(
        &self,
        kind: MediaKind,
        page: u32,
        per_page: u32,
    ) -> BoxFuture<'static, Result<Vec<MediaRecord>, CatalogError>> {
        let request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({
                "query": TRENDING_QUERY,
                "variables": {
                    "page": page,
                    "perPage": per_page,
                    "type": kind.as_graphql(),
                },
            }));
        async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CatalogError::Status(status.as_u16()));
            }
            let body = response.text().await?;
            parse_trending_page(&body)
        }
        .boxed()
    }
}

/// Fetches pages `1..=pages` concurrently and concatenates them in page
/// order. Any failing page fails the whole fetch.
pub async fn fetch_all<S>(
    source: &S,
    kind: MediaKind,
    pages: u32,
    per_page: u32,
) -> Result<Vec<MediaRecord>, CatalogError>
where
    S: TrendingSource + ?Sized,
{
    let requests = (1..=pages).map(|page| source.fetch_page(kind, page, per_page));
    let pages = try_join_all(requests).await?;
    Ok(pages.into_iter().flatten().collect())
}

/// What the render thread sees of the catalog.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub records: Arc<[Arc<MediaRecord>]>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub media_kind: MediaKind,
    /// Bumped whenever `records` is replaced.
    pub generation: u64,
}

impl CatalogSnapshot {
    fn empty(media_kind: MediaKind) -> Self {
        Self {
            records: Arc::from(Vec::new()),
            is_loading: false,
            error: None,
            media_kind,
            generation: 0,
        }
    }
}

/// Single-writer store publishing [`CatalogSnapshot`]s over a watch channel.
#[derive(Debug)]
pub struct CatalogStore {
    tx: watch::Sender<CatalogSnapshot>,
    outstanding: AtomicUsize,
}

impl CatalogStore {
    pub fn new(media_kind: MediaKind) -> Self {
        let (tx, _rx) = watch::channel(CatalogSnapshot::empty(media_kind));
        Self {
            tx,
            outstanding: AtomicUsize::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CatalogSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.tx.borrow().clone()
    }

    pub fn media_kind(&self) -> MediaKind {
        self.tx.borrow().media_kind
    }

    /// Stores a new media kind. Returns whether it changed; the caller
    /// refetches.
    pub fn set_media_kind(&self, kind: MediaKind) -> bool {
        self.tx.send_if_modified(|snap| {
            if snap.media_kind == kind {
                return false;
            }
            info!(from = %snap.media_kind, to = %kind, "catalog_media_kind_changed");
            snap.media_kind = kind;
            true
        })
    }

    /// Marks a fetch as started and returns the kind to fetch.
    pub fn begin_fetch(&self) -> MediaKind {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let mut kind = MediaKind::default();
        self.tx.send_modify(|snap| {
            snap.is_loading = true;
            snap.error = None;
            kind = snap.media_kind;
        });
        kind
    }

    /// Publishes the outcome of a fetch for `kind`. Completions apply in the
    /// order they finish; results for a kind the user has since switched
    /// away from are dropped.
    pub fn finish_fetch(&self, kind: MediaKind, result: Result<Vec<MediaRecord>, CatalogError>) {
        let remaining = self.outstanding.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        self.tx.send_modify(|snap| {
            snap.is_loading = remaining > 0;
            if snap.media_kind != kind {
                debug!(fetched = %kind, current = %snap.media_kind, "catalog_stale_result_dropped");
                return;
            }
            match result {
                Ok(records) => {
                    info!(count = records.len(), kind = %kind, "catalog_updated");
                    snap.records = records.into_iter().map(Arc::new).collect();
                    snap.error = None;
                    snap.generation += 1;
                }
                Err(err) => {
                    warn!(error = %err, kind = %kind, "catalog fetch failed");
                    snap.error = Some(err.to_string());
                }
            }
        });
    }

    /// Fetches the trending list for the current media kind and publishes it.
    pub async fn fetch_trending<S>(&self, source: &S, pages: u32, per_page: u32)
    where
        S: TrendingSource + ?Sized,
    {
        let kind = self.begin_fetch();
        info!(kind = %kind, pages, per_page, "catalog_fetch_started");
        let result = fetch_all(source, kind, pages, per_page).await;
        self.finish_fetch(kind, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page_media() {
        let body = r#"{"data":{"Page":{
            "pageInfo":{"total":5000,"currentPage":1,"lastPage":100,"hasNextPage":true},
            "media":[{"id":1,"title":{"romaji":"A"}},{"id":2,"title":{"english":"B"}}]
        }}}"#;
        let media = parse_trending_page(body).unwrap();
        assert_eq!(media.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn graphql_errors_are_reported() {
        let body = r#"{"data":null,"errors":[{"message":"Too Many Requests"}]}"#;
        let err = parse_trending_page(body).unwrap_err();
        assert!(matches!(err, CatalogError::Graphql(ref m) if m == "Too Many Requests"));
    }

    #[test]
    fn null_media_fields_do_not_fail_the_page() {
        let body = r#"{"data":{"Page":{
            "pageInfo":{"total":null,"currentPage":1,"lastPage":null,"hasNextPage":null},
            "media":[
                {"id":1,"title":null,"coverImage":null,"genres":null},
                null,
                {"id":2,"title":{"english":"B"},"coverImage":{"large":null},"genres":["Drama"]}
            ]
        }},"errors":null}"#;
        let media = parse_trending_page(body).unwrap();
        assert_eq!(media.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(media[0].genres.is_empty());
        assert_eq!(media[1].title.display(), Some("B"));
        assert_eq!(media[1].poster_url(), None);
    }

    #[test]
    fn missing_page_is_an_error() {
        let err = parse_trending_page(r#"{"data":{"Page":null}}"#).unwrap_err();
        assert!(matches!(err, CatalogError::MissingPage));
    }

    #[test]
    fn status_error_matches_message_format() {
        assert_eq!(CatalogError::Status(429).to_string(), "AniList API error: 429");
    }

    #[test]
    fn stale_kind_results_are_dropped() {
        let store = CatalogStore::new(MediaKind::Anime);
        let kind = store.begin_fetch();
        assert!(store.snapshot().is_loading);
        assert!(store.set_media_kind(MediaKind::Manga));
        store.finish_fetch(kind, Ok(vec![MediaRecord::default()]));
        let snap = store.snapshot();
        assert!(snap.records.is_empty());
        assert_eq!(snap.generation, 0);
        assert!(!snap.is_loading);
    }
}
