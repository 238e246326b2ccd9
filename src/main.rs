use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use nanimo::cache::ImageCache;
use nanimo::catalog::{AniListSource, CatalogStore};
use nanimo::config::Configuration;
use nanimo::events::{CatalogCommand, ImageLoaded, LoadImage, ViewerCommand};
use nanimo::lensing::{LensCamera, render_still, shader_flags};
use nanimo::media::MediaKind;
use nanimo::observer::Observer;
use nanimo::tasks;
use nanimo::tasks::loader::HttpFetcher;
use nanimo::tasks::viewer::ViewerLinks;

#[derive(Debug, Parser)]
#[command(
    name = "nanimo",
    version,
    about = "Black-hole landing and trending poster field"
)]
struct Args {
    /// Path to YAML config; built-in defaults when omitted
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Trending list to show (overrides media-kind)
    #[arg(long, value_enum)]
    media_kind: Option<MediaKind>,
    /// Do not contact the catalog API
    #[arg(long)]
    offline: bool,
    /// Seed for the field layout and star placement
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Render one lensing frame on the CPU to this PNG and exit
    #[arg(long, value_name = "PNG")]
    still: Option<PathBuf>,
    /// Size of the --still render
    #[arg(long, value_name = "WxH", default_value = "640x360", value_parser = parse_size)]
    still_size: (u32, u32),
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s:?}"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if w == 0 || h == 0 {
        return Err("width and height must be non-zero".into());
    }
    Ok((w, h))
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides; wgpu and naga are noisy at info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wgpu=warn,naga=warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(kind) = args.media_kind {
        cfg.media_kind = kind;
    }
    if args.offline {
        cfg.catalog.offline = true;
    }
    if let Some(seed) = args.seed {
        cfg.field.seed = seed;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::debug!("configuration:\n{:#?}", cfg);

    if let Some(path) = &args.still {
        return write_still(&cfg, path, args.still_size);
    }

    let (load_tx, load_rx) = mpsc::channel::<LoadImage>(cfg.loader.queue_capacity); // Cache -> Loader
    let (loaded_tx, loaded_rx) = mpsc::channel::<ImageLoaded>(cfg.loader.queue_capacity); // Loader -> Cache
    let (catalog_tx, catalog_rx) = mpsc::channel::<CatalogCommand>(16); // Scenes -> Catalog
    let (control_tx, control_rx) = mpsc::channel::<ViewerCommand>(4); // Warp -> Viewer

    let store = Arc::new(CatalogStore::new(cfg.media_kind));
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    // Poster loader
    tasks.spawn({
        let cancel = cancel.clone();
        let loader = cfg.loader.clone();
        async move {
            let fetcher = Arc::new(HttpFetcher::new(loader.request_timeout)?);
            tasks::loader::run(
                load_rx,
                loaded_tx,
                fetcher,
                cancel,
                loader.max_concurrent,
                loader.max_texture_edge,
            )
            .await
            .context("loader task failed")
        }
    });

    // Trending catalog
    tasks.spawn({
        let cancel = cancel.clone();
        let store = store.clone();
        let catalog = cfg.catalog.clone();
        async move {
            let source = Arc::new(AniListSource::new(
                catalog.endpoint.clone(),
                catalog.request_timeout,
            )?);
            tasks::catalog::run(catalog_rx, store, source, catalog, cancel)
                .await
                .context("catalog task failed")
        }
    });

    let links = ViewerLinks {
        cache: ImageCache::new(load_tx, loaded_rx),
        catalog: store.subscribe(),
        catalog_commands: catalog_tx,
        control_tx,
        control_rx,
    };

    // The window owns the main thread until it closes or cancellation fires.
    if let Err(e) = tasks::viewer::run_windowed(cfg.clone(), cancel.clone(), links)
        .context("viewer failed")
    {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}

fn write_still(cfg: &Configuration, path: &Path, (width, height): (u32, u32)) -> Result<()> {
    let mut observer =
        Observer::new(cfg.observer.fov_degrees).with_incline_degrees(cfg.observer.incline_degrees);
    observer.set_distance(cfg.observer.distance);
    observer.update(0.0);
    let camera = LensCamera::from_observer(&observer);

    let started = Instant::now();
    let image = render_still(&camera, width, height, cfg.shader.steps, shader_flags(&cfg.shader));
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        width,
        height,
        elapsed = %humantime::format_duration(Duration::from_millis(started.elapsed().as_millis() as u64)),
        "still_rendered"
    );
    Ok(())
}
