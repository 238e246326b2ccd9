//! Per-frame driver: wall-clock delta, scene update and display list.

use std::time::{Duration, Instant};

use tracing::info;

use super::draw_list::DrawList;
use super::{Backdrop, InputEvent, RenderResult, Scene};
use crate::resize::Viewport;

/// Measures the time between frames. The first frame reports zero and long
/// stalls (window drags, debugger pauses) are clamped to `max_dt`.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Option<Instant>,
    max_dt: Duration,
}

impl FrameClock {
    pub fn new(max_dt: Duration) -> Self {
        Self { last: None, max_dt }
    }

    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt = match self.last {
            Some(prev) => now.saturating_duration_since(prev).min(self.max_dt),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        dt.as_secs_f32()
    }

    /// Forgets the previous frame so the next tick reports zero.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[derive(Debug)]
pub struct FrameOutput {
    pub draw_list: DrawList,
    pub backdrop: Backdrop,
    pub result: RenderResult,
    pub dt: f32,
}

pub struct RenderLoop {
    clock: FrameClock,
    scene: Box<dyn Scene>,
    viewport: Option<Viewport>,
    frames: u64,
}

impl RenderLoop {
    pub fn new(scene: Box<dyn Scene>, max_dt: Duration) -> Self {
        Self {
            clock: FrameClock::new(max_dt),
            scene,
            viewport: None,
            frames: 0,
        }
    }

    pub fn scene(&self) -> &dyn Scene {
        self.scene.as_ref()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Swaps in `scene`, sized to the current viewport. Returns the old one.
    pub fn replace_scene(&mut self, mut scene: Box<dyn Scene>) -> Box<dyn Scene> {
        if let Some(viewport) = self.viewport {
            scene.handle_resize(viewport);
        }
        info!(from = self.scene.name(), to = scene.name(), "scene_switched");
        self.clock.reset();
        std::mem::replace(&mut self.scene, scene)
    }

    pub fn handle_resize(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.scene.handle_resize(viewport);
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) -> RenderResult {
        self.scene.handle_input(event, now)
    }

    pub fn step(&mut self, now: Instant) -> FrameOutput {
        let dt = self.clock.tick(now);
        let result = self.scene.update(dt, now);
        let mut draw_list = DrawList::new(self.scene.clear_color());
        self.scene.draw(&mut draw_list);
        self.frames += 1;
        FrameOutput {
            draw_list,
            backdrop: self.scene.backdrop(),
            result,
            dt,
        }
    }
}
