//! Retained 2D display list produced by the scenes each frame.
//!
//! Coordinates are logical pixels with the origin at the top-left corner.
//! Colours are linear RGBA with straight alpha, ready for an sRGB surface.

use palette::{LinSrgb, Srgb};

use crate::cache::ImageHandle;

pub type Rgba = [f32; 4];

/// Converts 8-bit sRGB plus an alpha into a linear colour.
pub fn srgba(r: u8, g: u8, b: u8, alpha: f32) -> Rgba {
    let lin: LinSrgb<f32> = Srgb::new(r, g, b).into_format::<f32>().into_linear();
    [lin.red, lin.green, lin.blue, alpha.clamp(0.0, 1.0)]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn centered(center: [f32; 2], width: f32, height: f32) -> Self {
        Self {
            x: center[0] - width * 0.5,
            y: center[1] - height * 0.5,
            width,
            height,
        }
    }

    pub fn center(&self) -> [f32; 2] {
        [self.x + self.width * 0.5, self.y + self.height * 0.5]
    }
}

#[derive(Debug, Clone)]
pub enum DrawCmd {
    Circle {
        center: [f32; 2],
        radius: f32,
        color: Rgba,
    },
    RoundRect {
        rect: Rect,
        corner: f32,
        fill: Rgba,
        /// Optional outline as (width, colour).
        stroke: Option<(f32, Rgba)>,
    },
    Line {
        from: [f32; 2],
        to: [f32; 2],
        width: f32,
        color: Rgba,
    },
    Image {
        rect: Rect,
        corner: f32,
        image: ImageHandle,
        opacity: f32,
    },
}

#[derive(Debug, Clone)]
pub struct DrawList {
    clear: Rgba,
    commands: Vec<DrawCmd>,
}

impl DrawList {
    pub fn new(clear: Rgba) -> Self {
        Self {
            clear,
            commands: Vec::new(),
        }
    }

    pub fn clear_color(&self) -> Rgba {
        self.clear
    }

    pub fn push(&mut self, cmd: DrawCmd) {
        self.commands.push(cmd);
    }

    pub fn circle(&mut self, center: [f32; 2], radius: f32, color: Rgba) {
        if radius > 0.0 && color[3] > 0.0 {
            self.commands.push(DrawCmd::Circle {
                center,
                radius,
                color,
            });
        }
    }

    pub fn line(&mut self, from: [f32; 2], to: [f32; 2], width: f32, color: Rgba) {
        if color[3] > 0.0 {
            self.commands.push(DrawCmd::Line {
                from,
                to,
                width,
                color,
            });
        }
    }

    pub fn commands(&self) -> &[DrawCmd] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgba_maps_extremes_and_keeps_alpha() {
        let white = srgba(255, 255, 255, 0.4);
        assert!((white[0] - 1.0).abs() < 1e-6);
        assert!((white[3] - 0.4).abs() < 1e-6);
        let black = srgba(0, 0, 0, 2.0);
        assert_eq!(black, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn invisible_primitives_are_skipped() {
        let mut list = DrawList::new([0.0; 4]);
        list.circle([1.0, 1.0], 0.0, [1.0; 4]);
        list.line([0.0, 0.0], [1.0, 1.0], 1.0, [1.0, 1.0, 1.0, 0.0]);
        assert!(list.is_empty());
        list.circle([1.0, 1.0], 2.0, [1.0; 4]);
        assert_eq!(list.len(), 1);
    }
}
