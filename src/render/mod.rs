pub mod draw_list;
pub mod explore;
pub mod frame;
pub mod landing;

use std::time::Instant;

use bytemuck::{Pod, Zeroable};

use crate::lensing::LensUniforms;
use crate::resize::Viewport;
use draw_list::{DrawList, Rgba};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderResult {
    Idle,
    NeedsRedraw,
}

impl RenderResult {
    pub fn or(self, other: RenderResult) -> RenderResult {
        if self == RenderResult::NeedsRedraw || other == RenderResult::NeedsRedraw {
            RenderResult::NeedsRedraw
        } else {
            RenderResult::Idle
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Enter or Space: the call-to-action.
    Activate,
    /// Flip between anime and manga.
    ToggleMedia,
}

/// Window input in logical pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMoved { x: f32, y: f32 },
    PointerDown { x: f32, y: f32 },
    PointerUp { x: f32, y: f32 },
    PointerLeft,
    /// Positive `delta` scrolls down (zoom out), in logical pixels.
    Wheel { delta: f32 },
    Key(Key),
}

/// Uniform block of `warp.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct OverlayUniforms {
    pub resolution: [f32; 2],
    pub progress: f32,
    pub time: f32,
}

/// Full-screen GPU passes drawn beneath the display list.
#[derive(Debug, Clone, Copy, Default)]
pub struct Backdrop {
    pub lens: Option<LensUniforms>,
    pub overlay: Option<OverlayUniforms>,
}

/// A screen of the application. Scenes hold no GPU state; they describe
/// each frame through a [`DrawList`] and a [`Backdrop`].
pub trait Scene {
    fn name(&self) -> &'static str;
    fn handle_resize(&mut self, viewport: Viewport);
    fn handle_input(&mut self, event: InputEvent, now: Instant) -> RenderResult;
    fn update(&mut self, dt: f32, now: Instant) -> RenderResult;
    fn draw(&self, list: &mut DrawList);
    fn clear_color(&self) -> Rgba {
        [0.0, 0.0, 0.0, 1.0]
    }
    fn backdrop(&self) -> Backdrop {
        Backdrop::default()
    }
    /// Window title while this scene is active.
    fn title(&self) -> Option<String> {
        None
    }
}
