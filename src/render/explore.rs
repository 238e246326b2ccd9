//! Poster field: stars that swell into posters under a pointer-driven lens.

use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use tokio::sync::mpsc::Sender;
use tokio::sync::watch;
use tracing::{debug, info};

use super::draw_list::{DrawCmd, DrawList, Rect, Rgba, srgba};
use super::{InputEvent, Key, RenderResult, Scene};
use crate::cache::{CacheLookup, ImageCache};
use crate::catalog::CatalogSnapshot;
use crate::config::{Configuration, FieldConfig, FieldLayoutKind, LensConfig};
use crate::events::CatalogCommand;
use crate::field::Entity;
use crate::field::layout::{generate_field, project_perspective};
use crate::field::proximity::{FocalPoint, LensSample, ProximityField, draw_order};
use crate::media::MediaRecord;
use crate::resize::Viewport;

const WHEEL_ZOOM_RATE: f32 = 0.0015;

/// Where an entity lands on screen this frame.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    /// Screen position before the lens push.
    pub screen: Vec2,
    /// Perspective scale (1 for the flat grid).
    pub depth_scale: f32,
    pub depth: f32,
    pub sample: LensSample,
}

pub struct ExploreScene {
    field_cfg: FieldConfig,
    lens_cfg: LensConfig,
    min_zoom: f32,
    max_zoom: f32,
    proximity: ProximityField,
    focal: FocalPoint,
    entities: Vec<Entity>,
    placements: Vec<Placement>,
    order: Vec<usize>,
    cache: ImageCache,
    catalog: watch::Receiver<CatalogSnapshot>,
    commands: Option<Sender<CatalogCommand>>,
    records: Arc<[Arc<MediaRecord>]>,
    generation: Option<u64>,
    loading: bool,
    fetch_requested: bool,
    viewport: Option<Viewport>,
    needs_layout: bool,
    pan: Vec2,
    zoom: f32,
    drag: Option<Vec2>,
    time: f32,
}

impl ExploreScene {
    pub fn new(
        cfg: &Configuration,
        cache: ImageCache,
        catalog: watch::Receiver<CatalogSnapshot>,
        commands: Option<Sender<CatalogCommand>>,
    ) -> Self {
        let lens = &cfg.lens;
        Self {
            field_cfg: cfg.field.clone(),
            lens_cfg: lens.clone(),
            min_zoom: cfg.viewer.min_zoom,
            max_zoom: cfg.viewer.max_zoom,
            proximity: ProximityField::new(lens.radius, lens.power, lens.lens_curve(), lens.push_px),
            focal: FocalPoint::new(lens.smoothing),
            entities: Vec::new(),
            placements: Vec::new(),
            order: Vec::new(),
            cache,
            catalog,
            commands,
            records: Arc::from(Vec::new()),
            generation: None,
            loading: false,
            fetch_requested: false,
            viewport: None,
            needs_layout: true,
            pan: Vec2::ZERO,
            zoom: 1.0,
            drag: None,
            time: 0.0,
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn focal(&self) -> &FocalPoint {
        &self.focal
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    fn center(&self) -> Vec2 {
        self.viewport
            .map(|vp| Vec2::from(vp.logical_center()))
            .unwrap_or(Vec2::ZERO)
    }

    /// Maps a laid-out position to the screen through pan and zoom.
    fn to_screen(&self, field: Vec2) -> Vec2 {
        let c = self.center();
        (field - c) * self.zoom + c + self.pan
    }

    fn to_field(&self, screen: Vec2) -> Vec2 {
        let c = self.center();
        (screen - c - self.pan) / self.zoom + c
    }

    fn send(&self, cmd: CatalogCommand) {
        if let Some(tx) = &self.commands
            && tx.try_send(cmd).is_err()
        {
            debug!(?cmd, "catalog command queue unavailable");
        }
    }

    fn sync_catalog(&mut self) {
        let snapshot = self.catalog.borrow_and_update().clone();
        if snapshot.is_loading != self.loading {
            info!(loading = snapshot.is_loading, "explore_loading_changed");
            self.loading = snapshot.is_loading;
        }
        if self.generation != Some(snapshot.generation) {
            self.generation = Some(snapshot.generation);
            self.records = snapshot.records.clone();
            self.needs_layout = true;
        }
        if !self.fetch_requested && snapshot.records.is_empty() && !snapshot.is_loading {
            self.fetch_requested = true;
            self.send(CatalogCommand::FetchTrending);
        }
    }

    fn relayout(&mut self) {
        let Some(viewport) = self.viewport else {
            return;
        };
        self.needs_layout = false;
        self.entities = generate_field(
            &self.records,
            viewport.logical_width,
            viewport.logical_height,
            &self.field_cfg,
        );
        for entity in &mut self.entities {
            entity.image = entity.poster_url().and_then(|url| self.cache.peek(url));
        }
    }

    fn attach_ready_images(&mut self) {
        for entity in &mut self.entities {
            if entity.image.is_none()
                && let Some(url) = entity.poster_url()
            {
                entity.image = self.cache.peek(url);
            }
        }
    }

    fn place(&self, entity: &Entity) -> (Vec2, f32) {
        match self.field_cfg.layout {
            FieldLayoutKind::Grid => (entity.position.truncate(), 1.0),
            FieldLayoutKind::Spiral => {
                project_perspective(entity.position, self.center(), self.field_cfg.spiral.focal_length)
            }
        }
    }

    fn recompute_placements(&mut self) {
        let focal = self.focal.position();
        let placements: Vec<Placement> = self
            .entities
            .iter()
            .map(|entity| {
                let (field, depth_scale) = self.place(entity);
                let screen = self.to_screen(field);
                Placement {
                    screen,
                    depth_scale,
                    depth: entity.position.z,
                    sample: self.proximity.sample(screen, focal),
                }
            })
            .collect();
        let samples: Vec<LensSample> = placements.iter().map(|p| p.sample).collect();
        let depths: Vec<f32> = placements.iter().map(|p| p.depth).collect();
        self.order = draw_order(&samples, &depths);
        self.placements = placements;
    }

    /// Requests posters for entities far enough inside the lens.
    fn request_images(&mut self) {
        let threshold = self.lens_cfg.load_threshold;
        for (entity, placement) in self.entities.iter_mut().zip(&self.placements) {
            if entity.image.is_some() || placement.sample.influence <= threshold {
                continue;
            }
            let Some(record) = entity.record.as_deref() else {
                continue;
            };
            let Some(url) = record.poster_url() else {
                continue;
            };
            let was_pending = self.cache.is_pending(url);
            match self.cache.get(url) {
                CacheLookup::Ready(handle) => entity.image = Some(handle),
                CacheLookup::Pending if !was_pending => debug!(
                    id = record.id,
                    title = record.title.display().unwrap_or("untitled"),
                    url,
                    "poster_requested"
                ),
                CacheLookup::Pending | CacheLookup::Unavailable => {}
            }
        }
    }

    fn draw_star(&self, list: &mut DrawList, entity: &Entity, placement: &Placement) {
        let twinkle = entity.twinkle(self.time);
        let brightness = entity.brightness * (0.5 + 0.5 * twinkle);
        let size = entity.star_size * placement.depth_scale;
        let at = placement.screen.to_array();
        list.circle(at, size, srgba(255, 255, 255, brightness));
        if brightness > 0.6 {
            list.circle(at, size * 2.0, srgba(200, 220, 255, (brightness - 0.6) * 0.4));
        }
    }

    fn draw_poster(&self, list: &mut DrawList, entity: &Entity, placement: &Placement) {
        let t = placement.sample.influence;
        let size = placement.sample.scale / self.proximity.power * placement.depth_scale;
        let [pw, ph] = self.field_cfg.poster_size;
        let center = placement.screen + placement.sample.offset;
        let rect = Rect::centered(center.to_array(), pw * size, ph * size);
        let corner = (10.0 * t).max(4.0);

        let spread = 7.5 * t;
        let shadow = Rect {
            x: rect.x - spread * 0.5,
            y: rect.y - spread * 0.5 + 5.0 * t,
            width: rect.width + spread,
            height: rect.height + spread,
        };
        list.push(DrawCmd::RoundRect {
            rect: shadow,
            corner: corner + spread * 0.5,
            fill: [0.0, 0.0, 0.0, 0.25 * t],
            stroke: None,
        });

        match &entity.image {
            Some(image) if t > self.lens_cfg.image_threshold => {
                let opacity = (t * 1.5).min(1.0);
                list.push(DrawCmd::Image {
                    rect,
                    corner,
                    image: image.clone(),
                    opacity,
                });
                if t > self.lens_cfg.outline_threshold {
                    let alpha = (t - self.lens_cfg.outline_threshold) * 1.2 * opacity;
                    list.push(DrawCmd::RoundRect {
                        rect,
                        corner,
                        fill: [0.0; 4],
                        stroke: Some((2.0, srgba(255, 255, 255, alpha))),
                    });
                }
            }
            _ => {
                list.push(DrawCmd::RoundRect {
                    rect,
                    corner,
                    fill: entity.fallback_color(0.2 + 0.7 * t),
                    stroke: Some((1.0, srgba(80, 100, 140, t * 0.5))),
                });
            }
        }
    }

    fn draw_loading(&self, list: &mut DrawList) {
        let Some(viewport) = self.viewport else {
            return;
        };
        let rect = Rect {
            x: viewport.logical_width - 32.0 - 96.0,
            y: viewport.logical_height - 32.0 - 32.0,
            width: 96.0,
            height: 32.0,
        };
        list.push(DrawCmd::RoundRect {
            rect,
            corner: 8.0,
            fill: [0.0, 0.0, 0.0, 0.5],
            stroke: None,
        });
        let [cx, cy] = rect.center();
        for i in 0..3 {
            let phase = self.time * 4.0 - i as f32 * 0.6;
            let alpha = 0.2 + 0.3 * (0.5 + 0.5 * phase.sin());
            list.circle([cx + (i as f32 - 1.0) * 14.0, cy], 3.0, srgba(255, 255, 255, alpha));
        }
    }
}

impl Scene for ExploreScene {
    fn name(&self) -> &'static str {
        "explore"
    }

    fn handle_resize(&mut self, viewport: Viewport) {
        if self.viewport == Some(viewport) {
            return;
        }
        self.viewport = Some(viewport);
        self.needs_layout = true;
    }

    fn handle_input(&mut self, event: InputEvent, _now: Instant) -> RenderResult {
        match event {
            InputEvent::PointerMoved { x, y } => {
                let pos = Vec2::new(x, y);
                if let Some(last) = self.drag {
                    self.pan += pos - last;
                    self.drag = Some(pos);
                }
                self.focal.set_target(pos);
            }
            InputEvent::PointerDown { x, y } => self.drag = Some(Vec2::new(x, y)),
            InputEvent::PointerUp { .. } => self.drag = None,
            InputEvent::PointerLeft => {
                self.drag = None;
                self.focal.reset();
            }
            InputEvent::Wheel { delta } => {
                let anchor = self.focal.target();
                let anchor = if anchor.x < 0.0 && anchor.y < 0.0 {
                    self.center()
                } else {
                    anchor
                };
                let field = self.to_field(anchor);
                self.zoom = (self.zoom * (-delta * WHEEL_ZOOM_RATE).exp()).clamp(self.min_zoom, self.max_zoom);
                let c = self.center();
                self.pan = anchor - c - (field - c) * self.zoom;
            }
            InputEvent::Key(Key::ToggleMedia) => {
                let kind = self.catalog.borrow().media_kind.toggled();
                self.send(CatalogCommand::SetMediaKind(kind));
            }
            InputEvent::Key(Key::Activate) => return RenderResult::Idle,
        }
        RenderResult::NeedsRedraw
    }

    fn update(&mut self, dt: f32, _now: Instant) -> RenderResult {
        self.time += dt;
        self.sync_catalog();
        if self.needs_layout {
            self.relayout();
        }
        let landed = self.cache.poll();
        if landed > 0 {
            debug!(landed, ready = self.cache.ready_len(), pending = self.cache.pending_len(), "posters_landed");
            self.attach_ready_images();
        }
        self.focal.update(dt);
        self.recompute_placements();
        self.request_images();
        RenderResult::NeedsRedraw
    }

    fn draw(&self, list: &mut DrawList) {
        for &index in &self.order {
            let (Some(entity), Some(placement)) = (self.entities.get(index), self.placements.get(index)) else {
                continue;
            };
            if placement.sample.influence > 0.0 {
                self.draw_poster(list, entity, placement);
            } else {
                self.draw_star(list, entity, placement);
            }
        }
        if self.loading {
            self.draw_loading(list);
        }
    }

    fn clear_color(&self) -> Rgba {
        srgba(0x08, 0x08, 0x0a, 1.0)
    }

    fn title(&self) -> Option<String> {
        let kind = self.catalog.borrow().media_kind;
        Some(format!("NANIMO · discover {kind}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DecodedImage;
    use crate::catalog::CatalogStore;
    use crate::events::ImageLoaded;
    use crate::media::{CoverImage, MediaKind};
    use tokio::sync::mpsc;

    fn viewport() -> Viewport {
        Viewport {
            logical_width: 1920.0,
            logical_height: 1080.0,
            pixel_ratio: 1.0,
            backing_width: 1920,
            backing_height: 1080,
        }
    }

    struct Harness {
        scene: ExploreScene,
        store: CatalogStore,
        requests: mpsc::Receiver<crate::events::LoadImage>,
        results: mpsc::Sender<ImageLoaded>,
        commands: mpsc::Receiver<CatalogCommand>,
    }

    fn harness() -> Harness {
        let (req_tx, requests) = mpsc::channel(64);
        let (results, res_rx) = mpsc::channel(64);
        let (cmd_tx, commands) = mpsc::channel(4);
        let store = CatalogStore::new(MediaKind::Anime);
        let mut scene = ExploreScene::new(
            &Configuration::default(),
            ImageCache::new(req_tx, res_rx),
            store.subscribe(),
            Some(cmd_tx),
        );
        scene.handle_resize(viewport());
        Harness {
            scene,
            store,
            requests,
            results,
            commands,
        }
    }

    fn record(id: u64) -> MediaRecord {
        MediaRecord {
            id,
            cover_image: CoverImage {
                extra_large: Some(format!("https://img/{id}.jpg")),
                ..CoverImage::default()
            },
            ..MediaRecord::default()
        }
    }

    #[test]
    fn empty_catalog_lays_out_floor_and_fetches() {
        let mut h = harness();
        h.scene.update(0.016, Instant::now());
        assert_eq!(h.scene.entities().len(), 200);
        assert_eq!(h.commands.try_recv().unwrap(), CatalogCommand::FetchTrending);
        h.scene.update(0.016, Instant::now());
        assert!(h.commands.try_recv().is_err());
    }

    #[test]
    fn new_dataset_triggers_relayout() {
        let mut h = harness();
        h.scene.update(0.016, Instant::now());
        h.store.begin_fetch();
        h.store
            .finish_fetch(MediaKind::Anime, Ok((0..250).map(record).collect()));
        h.scene.update(0.016, Instant::now());
        assert_eq!(h.scene.entities().len(), 250);
        assert!(h.scene.entities().iter().all(|e| e.record.is_some()));
    }

    #[test]
    fn hovering_requests_and_attaches_posters() {
        let mut h = harness();
        h.store.begin_fetch();
        h.store.finish_fetch(MediaKind::Anime, Ok(vec![record(1)]));
        h.scene.update(0.016, Instant::now());

        let target = h.scene.entities()[0].position.truncate();
        h.scene
            .handle_input(InputEvent::PointerMoved { x: target.x, y: target.y }, Instant::now());
        // Converge the smoothed focal point onto the pointer.
        for _ in 0..120 {
            h.scene.update(1.0 / 60.0, Instant::now());
        }
        let request = h.requests.try_recv().unwrap();
        assert_eq!(request.url, "https://img/1.jpg");

        h.results
            .try_send(ImageLoaded {
                url: request.url.clone(),
                result: Ok(Arc::new(DecodedImage {
                    url: request.url,
                    width: 1,
                    height: 1,
                    pixels: vec![255; 4],
                })),
            })
            .unwrap();
        h.scene.update(1.0 / 60.0, Instant::now());
        assert!(h.scene.entities()[0].image.is_some());

        let mut list = DrawList::new([0.0; 4]);
        h.scene.draw(&mut list);
        assert!(list
            .commands()
            .iter()
            .any(|cmd| matches!(cmd, DrawCmd::Image { .. })));
    }

    #[test]
    fn wheel_zoom_keeps_anchor_fixed() {
        let mut h = harness();
        h.scene.update(0.016, Instant::now());
        let anchor = Vec2::new(400.0, 300.0);
        h.scene
            .handle_input(InputEvent::PointerMoved { x: anchor.x, y: anchor.y }, Instant::now());
        let before = h.scene.to_field(anchor);
        h.scene.handle_input(InputEvent::Wheel { delta: -200.0 }, Instant::now());
        assert!(h.scene.zoom() > 1.0);
        let after = h.scene.to_field(anchor);
        assert!((before - after).length() < 1e-3);
        for _ in 0..100 {
            h.scene.handle_input(InputEvent::Wheel { delta: -500.0 }, Instant::now());
        }
        assert_eq!(h.scene.zoom(), 3.0);
    }

    #[test]
    fn drag_pans_and_leave_resets_focal() {
        let mut h = harness();
        let now = Instant::now();
        h.scene.handle_input(InputEvent::PointerDown { x: 10.0, y: 10.0 }, now);
        h.scene.handle_input(InputEvent::PointerMoved { x: 30.0, y: 5.0 }, now);
        assert_eq!(h.scene.pan(), Vec2::new(20.0, -5.0));
        h.scene.handle_input(InputEvent::PointerLeft, now);
        assert_eq!(h.scene.focal().target(), crate::field::proximity::FOCAL_SENTINEL);
    }
}
