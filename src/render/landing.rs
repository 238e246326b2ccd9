//! Black-hole landing screen: orbiting observer, drag-to-look, and the warp
//! into the poster field.

use std::f32::consts::FRAC_PI_2;
use std::time::{Duration, Instant};

use glam::Vec2;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info};

use super::draw_list::{DrawCmd, DrawList, Rect, srgba};
use super::{Backdrop, InputEvent, Key, OverlayUniforms, RenderResult, Scene};
use crate::config::{Configuration, ObserverConfig, ShaderConfig};
use crate::events::CatalogCommand;
use crate::lensing::{LensCamera, LensUniforms, shader_flags};
use crate::media::MediaKind;
use crate::observer::Observer;
use crate::resize::Viewport;
use crate::starfield::StarField;
use crate::warp::{WarpFrame, WarpOrigin, WarpPhase, WarpTransition};

/// Pointer travel below which a press/release counts as a click.
const CLICK_SLOP_PX: f32 = 4.0;
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;
const UI_FADE_DELAY: Duration = Duration::from_millis(500);
const UI_FADE: Duration = Duration::from_millis(1000);
const WHEEL_ZOOM_RATE: f32 = 0.002;

#[derive(Debug, Clone, Copy)]
struct Drag {
    last: Vec2,
    travelled: f32,
}

pub struct LandingScene {
    observer: Observer,
    observer_cfg: ObserverConfig,
    shader: ShaderConfig,
    flags: u32,
    warp: WarpTransition,
    frame: WarpFrame,
    starfield: StarField,
    viewport: Option<Viewport>,
    pitch: f32,
    yaw: f32,
    drag: Option<Drag>,
    time: f32,
    opened_at: Option<Instant>,
    last_now: Option<Instant>,
    media_kind: MediaKind,
    catalog: Option<Sender<CatalogCommand>>,
}

impl LandingScene {
    /// `on_navigate` runs once per warp, when it crosses its completion
    /// threshold.
    pub fn new(
        cfg: &Configuration,
        catalog: Option<Sender<CatalogCommand>>,
        on_navigate: impl FnMut() + Send + 'static,
    ) -> Self {
        let mut observer =
            Observer::new(cfg.observer.fov_degrees).with_incline_degrees(cfg.observer.incline_degrees);
        observer.set_distance(cfg.observer.distance);
        observer.set_direction(0.0, 0.0);

        let mut warp = WarpTransition::new(cfg.warp.clone());
        warp.set_on_complete(on_navigate);
        let frame = warp.update(Instant::now());

        Self {
            observer,
            observer_cfg: cfg.observer.clone(),
            shader: cfg.shader.clone(),
            flags: shader_flags(&cfg.shader),
            warp,
            frame,
            starfield: StarField::new(cfg.starfield.clone(), cfg.field.seed),
            viewport: None,
            pitch: 0.0,
            yaw: 0.0,
            drag: None,
            time: 0.0,
            opened_at: None,
            last_now: None,
            media_kind: cfg.media_kind,
            catalog,
        }
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn warp_frame(&self) -> WarpFrame {
        self.frame
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media_kind
    }

    pub fn look(&self) -> (f32, f32) {
        (self.pitch, self.yaw)
    }

    /// Begins the warp from the current pose. Ignored while one is running.
    pub fn start_warp(&mut self, now: Instant) -> bool {
        let origin = WarpOrigin {
            pitch: self.pitch,
            yaw: self.yaw,
            distance: self.observer.distance(),
        };
        if !self.warp.start_from(now, origin) {
            return false;
        }
        self.drag = None;
        self.observer.moving = true;
        true
    }

    fn toggle_media_kind(&mut self) {
        self.media_kind = self.media_kind.toggled();
        info!(kind = %self.media_kind, "landing_media_kind_toggled");
        if let Some(tx) = &self.catalog
            && tx.try_send(CatalogCommand::SetMediaKind(self.media_kind)).is_err()
        {
            debug!("catalog command queue unavailable");
        }
    }

    fn rotate(&mut self, delta: Vec2) {
        let sensitivity = self.observer_cfg.drag_sensitivity;
        self.yaw += delta.x * sensitivity;
        self.pitch = (self.pitch + delta.y * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.observer.set_direction(self.pitch, self.yaw);
    }

    /// Opacity of the call-to-action pill.
    fn ui_opacity(&self) -> f32 {
        let (Some(opened), Some(now)) = (self.opened_at, self.last_now) else {
            return 0.0;
        };
        if self.frame.phase != WarpPhase::Idle {
            return 0.0;
        }
        let shown = now.saturating_duration_since(opened).saturating_sub(UI_FADE_DELAY);
        (shown.as_secs_f32() / UI_FADE.as_secs_f32()).min(1.0)
    }
}

impl Scene for LandingScene {
    fn name(&self) -> &'static str {
        "landing"
    }

    fn handle_resize(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.starfield
            .resize(viewport.logical_width, viewport.logical_height);
    }

    fn handle_input(&mut self, event: InputEvent, now: Instant) -> RenderResult {
        let warping = matches!(self.warp.phase(), WarpPhase::Prewarp | WarpPhase::Warp);
        match event {
            InputEvent::PointerDown { x, y } => {
                if !warping {
                    self.drag = Some(Drag {
                        last: Vec2::new(x, y),
                        travelled: 0.0,
                    });
                }
            }
            InputEvent::PointerMoved { x, y } => {
                let Some(mut drag) = self.drag else {
                    return RenderResult::Idle;
                };
                let pos = Vec2::new(x, y);
                let delta = pos - drag.last;
                drag.travelled += delta.length();
                drag.last = pos;
                self.drag = Some(drag);
                self.rotate(delta);
            }
            InputEvent::PointerUp { .. } => {
                if let Some(drag) = self.drag.take()
                    && drag.travelled < CLICK_SLOP_PX
                {
                    self.start_warp(now);
                }
            }
            InputEvent::PointerLeft => self.drag = None,
            InputEvent::Wheel { delta } => {
                if !warping {
                    let distance = (self.observer.distance() * (delta * WHEEL_ZOOM_RATE).exp())
                        .clamp(self.observer_cfg.min_distance, self.observer_cfg.max_distance);
                    self.observer.set_distance(distance);
                }
            }
            InputEvent::Key(Key::Activate) => {
                self.start_warp(now);
            }
            InputEvent::Key(Key::ToggleMedia) => {
                if !warping {
                    self.toggle_media_kind();
                }
            }
        }
        RenderResult::NeedsRedraw
    }

    fn update(&mut self, dt: f32, now: Instant) -> RenderResult {
        if self.opened_at.is_none() {
            self.opened_at = Some(now);
        }
        self.last_now = Some(now);
        self.time += dt;

        let frame = self.warp.update(now);
        if frame.phase != WarpPhase::Idle {
            self.pitch = frame.pitch;
            self.yaw = frame.yaw;
            self.observer.set_direction(frame.pitch, frame.yaw);
            if let Some(distance) = frame.distance {
                self.observer.set_distance(distance);
            }
        }
        self.observer.moving = frame.is_active();
        self.observer.update(dt);
        if frame.phase == WarpPhase::Warp {
            self.starfield.advance(dt, frame.progress);
        }
        self.frame = frame;
        RenderResult::NeedsRedraw
    }

    fn draw(&self, list: &mut DrawList) {
        let Some(viewport) = self.viewport else {
            return;
        };
        let center = Vec2::from(viewport.logical_center());
        if self.frame.phase != WarpPhase::Idle {
            self.starfield
                .draw(list, self.frame.phase, self.frame.progress, center, self.time);
        }

        let opacity = self.ui_opacity();
        if opacity > 0.0 {
            let pill = Rect::centered(
                [center.x, viewport.logical_height - 88.0],
                180.0,
                44.0,
            );
            list.push(DrawCmd::RoundRect {
                rect: pill,
                corner: 22.0,
                fill: srgba(255, 255, 255, 0.05 * opacity),
                stroke: Some((1.0, srgba(255, 255, 255, 0.2 * opacity))),
            });
        }
    }

    fn backdrop(&self) -> Backdrop {
        let Some(viewport) = self.viewport else {
            return Backdrop::default();
        };
        let resolution = viewport.backing_size();
        let camera = LensCamera::from_observer(&self.observer);
        let lens = LensUniforms::new(&camera, self.time, resolution, self.shader.steps, self.flags);
        let overlay = (self.frame.overlay > 0.0).then_some(OverlayUniforms {
            resolution,
            progress: self.frame.overlay,
            time: self.time,
        });
        Backdrop {
            lens: Some(lens),
            overlay,
        }
    }

    fn title(&self) -> Option<String> {
        Some(format!("NANIMO · {}", self.media_kind.call_to_action()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn viewport() -> Viewport {
        Viewport {
            logical_width: 800.0,
            logical_height: 600.0,
            pixel_ratio: 2.0,
            backing_width: 1600,
            backing_height: 1200,
        }
    }

    fn scene() -> (LandingScene, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut scene = LandingScene::new(&Configuration::default(), None, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scene.handle_resize(viewport());
        (scene, calls)
    }

    #[test]
    fn drag_rotates_and_clamps_pitch() {
        let (mut scene, _) = scene();
        let now = Instant::now();
        scene.handle_input(InputEvent::PointerDown { x: 100.0, y: 100.0 }, now);
        scene.handle_input(InputEvent::PointerMoved { x: 200.0, y: 5000.0 }, now);
        let (pitch, yaw) = scene.look();
        assert!((yaw - 0.5).abs() < 1e-5);
        assert_eq!(pitch, PITCH_LIMIT);
        scene.handle_input(InputEvent::PointerUp { x: 200.0, y: 5000.0 }, now);
        assert_eq!(scene.warp_frame().phase, WarpPhase::Idle);
        scene.update(0.016, now);
        assert_eq!(scene.warp_frame().phase, WarpPhase::Idle);
    }

    #[test]
    fn click_starts_warp_and_navigates_once() {
        let (mut scene, calls) = scene();
        let t0 = Instant::now();
        scene.update(0.0, t0);
        scene.handle_input(InputEvent::PointerDown { x: 10.0, y: 10.0 }, t0);
        scene.handle_input(InputEvent::PointerUp { x: 11.0, y: 10.0 }, t0);
        let mut t = t0;
        for _ in 0..200 {
            t += Duration::from_millis(16);
            scene.update(0.016, t);
            assert!(scene.observer().angular_velocity() <= scene.observer().max_angular_velocity());
        }
        assert_eq!(scene.warp_frame().phase, WarpPhase::Done);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!((scene.observer().distance() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn wheel_zoom_is_bounded() {
        let (mut scene, _) = scene();
        let now = Instant::now();
        for _ in 0..50 {
            scene.handle_input(InputEvent::Wheel { delta: 500.0 }, now);
        }
        assert_eq!(scene.observer().distance(), 30.0);
        for _ in 0..50 {
            scene.handle_input(InputEvent::Wheel { delta: -500.0 }, now);
        }
        assert_eq!(scene.observer().distance(), 2.5);
    }

    #[test]
    fn backdrop_uses_backing_resolution() {
        let (mut scene, _) = scene();
        scene.update(0.0, Instant::now());
        let backdrop = scene.backdrop();
        let lens = backdrop.lens.unwrap();
        assert_eq!(lens.resolution, [1600.0, 1200.0]);
        assert_eq!(lens.steps, 600);
        assert!(backdrop.overlay.is_none());
    }

    #[test]
    fn media_toggle_sends_catalog_command() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let mut scene = LandingScene::new(&Configuration::default(), Some(tx), || {});
        scene.handle_input(InputEvent::Key(Key::ToggleMedia), Instant::now());
        assert_eq!(scene.media_kind(), MediaKind::Manga);
        assert_eq!(
            rx.try_recv().unwrap(),
            CatalogCommand::SetMediaKind(MediaKind::Manga)
        );
        assert!(scene.title().unwrap().ends_with("fall into manga"));
    }
}
