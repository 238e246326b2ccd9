pub mod layout;
pub mod proximity;

use std::sync::Arc;

use glam::Vec3;
use palette::{FromColor, Hsl, Srgb};

use crate::cache::ImageHandle;
use crate::media::MediaRecord;
use crate::render::draw_list::{Rgba, srgba};

/// Degrees between consecutive entity hues.
pub const GOLDEN_ANGLE_DEGREES: f32 = 137.507_76;

/// Hue for the entity at `index`, stable across layout passes.
pub fn golden_hue(index: usize) -> f32 {
    (index as f64 * GOLDEN_ANGLE_DEGREES as f64).rem_euclid(360.0) as f32
}

/// A star or poster card in the field.
///
/// Entities are rebuilt wholesale by [`layout::generate_field`]; only `image`
/// changes between layout passes.
#[derive(Debug, Clone)]
pub struct Entity {
    pub index: usize,
    /// Virtual position. `z` is depth for the spiral layout and 0 otherwise.
    pub position: Vec3,
    /// Radius of the star dot when outside the lens.
    pub star_size: f32,
    pub brightness: f32,
    pub twinkle_speed: f32,
    pub hue_degrees: f32,
    pub record: Option<Arc<MediaRecord>>,
    pub image: Option<ImageHandle>,
}

impl Entity {
    pub fn poster_url(&self) -> Option<&str> {
        self.record.as_deref().and_then(MediaRecord::poster_url)
    }

    /// Twinkle factor in 0..1 for the given scene time.
    pub fn twinkle(&self, time: f32) -> f32 {
        0.5 + 0.5 * (time * self.twinkle_speed + self.position.x * 0.01).sin()
    }

    /// Card colour used while no poster image is available.
    ///
    /// Tinted by the cover's accent colour when the record carries one,
    /// otherwise by the entity's golden-angle hue.
    pub fn fallback_color(&self, alpha: f32) -> Rgba {
        let [r, g, b] = match self.record.as_deref().and_then(MediaRecord::accent_rgb) {
            Some(accent) => accent.map(|c| c / 3),
            None => {
                let hsl: Hsl = Hsl::new(self.hue_degrees, 0.3, 0.16);
                let tint: Srgb<u8> = Srgb::<f32>::from_color(hsl).into_format::<u8>();
                [tint.red, tint.green, tint.blue]
            }
        };
        // Blend towards the neutral slate card so hues stay subtle.
        let mix = |c: u8, slate: u8| ((c as u16 + slate as u16) / 2) as u8;
        srgba(mix(r, 30), mix(g, 35), mix(b, 50), alpha)
    }
}
