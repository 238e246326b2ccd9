use crate::cache::ImageHandle;
use crate::error::LoadError;
use crate::media::MediaKind;

/// Request for the loader task to fetch and decode one poster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadImage {
    pub url: String,
}

/// Loader reply, sent once per URL load.
#[derive(Debug, Clone)]
pub struct ImageLoaded {
    pub url: String,
    pub result: Result<ImageHandle, LoadError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogCommand {
    FetchTrending,
    SetMediaKind(MediaKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    /// Warp crossed its completion threshold; leave the landing scene.
    Navigate,
}
