use winit::dpi::PhysicalSize;

/// Window geometry shared by the scenes and the GPU passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub logical_width: f32,
    pub logical_height: f32,
    /// Window scale factor capped at the configured maximum.
    pub pixel_ratio: f32,
    pub backing_width: u32,
    pub backing_height: u32,
}

impl Viewport {
    pub fn logical_center(&self) -> [f32; 2] {
        [self.logical_width * 0.5, self.logical_height * 0.5]
    }

    pub fn backing_size(&self) -> [f32; 2] {
        [self.backing_width as f32, self.backing_height as f32]
    }
}

/// Tracks window size changes and decides when the field must be re-laid out.
#[derive(Debug)]
pub struct ResizeController {
    max_pixel_ratio: f64,
    current: Option<Viewport>,
    needs_layout: bool,
}

impl ResizeController {
    pub fn new(max_pixel_ratio: f64) -> Self {
        Self {
            max_pixel_ratio: max_pixel_ratio.max(1.0),
            current: None,
            needs_layout: false,
        }
    }

    /// Returns the new viewport, or `None` when the window has no area or
    /// nothing changed.
    pub fn on_resize(&mut self, physical: PhysicalSize<u32>, scale_factor: f64) -> Option<Viewport> {
        if physical.width == 0 || physical.height == 0 {
            return None;
        }
        let scale_factor = if scale_factor.is_finite() && scale_factor > 0.0 {
            scale_factor
        } else {
            1.0
        };
        let logical = physical.to_logical::<f64>(scale_factor);
        let ratio = scale_factor.min(self.max_pixel_ratio);
        let viewport = Viewport {
            logical_width: logical.width as f32,
            logical_height: logical.height as f32,
            pixel_ratio: ratio as f32,
            backing_width: ((logical.width * ratio).round() as u32).max(1),
            backing_height: ((logical.height * ratio).round() as u32).max(1),
        };
        if self.current == Some(viewport) {
            return None;
        }
        self.current = Some(viewport);
        self.needs_layout = true;
        Some(viewport)
    }

    pub fn current(&self) -> Option<Viewport> {
        self.current
    }

    pub fn needs_layout(&self) -> bool {
        self.needs_layout
    }

    /// Clears the pending layout flag, returning the viewport to lay out for.
    pub fn take_layout(&mut self) -> Option<Viewport> {
        if !self.needs_layout {
            return None;
        }
        self.needs_layout = false;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backing_store_caps_pixel_ratio() {
        let mut resize = ResizeController::new(2.0);
        let vp = resize.on_resize(PhysicalSize::new(3000, 1500), 3.0).unwrap();
        assert_eq!((vp.logical_width, vp.logical_height), (1000.0, 500.0));
        assert_eq!(vp.pixel_ratio, 2.0);
        assert_eq!((vp.backing_width, vp.backing_height), (2000, 1000));
    }

    #[test]
    fn zero_size_is_ignored() {
        let mut resize = ResizeController::new(2.0);
        assert!(resize.on_resize(PhysicalSize::new(0, 720), 1.0).is_none());
        assert!(resize.current().is_none());
        assert!(!resize.needs_layout());
    }

    #[test]
    fn unchanged_size_does_not_relayout() {
        let mut resize = ResizeController::new(2.0);
        assert!(resize.on_resize(PhysicalSize::new(800, 600), 1.0).is_some());
        assert!(resize.take_layout().is_some());
        assert!(resize.on_resize(PhysicalSize::new(800, 600), 1.0).is_none());
        assert!(resize.take_layout().is_none());
    }
}
