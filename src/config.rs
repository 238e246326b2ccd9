use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::field::proximity::LensCurve;
use crate::media::MediaKind;

pub const ANILIST_ENDPOINT: &str = "https://graphql.anilist.co";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldLayoutKind {
    /// Jittered grid covering the whole viewport.
    #[default]
    Grid,
    /// Perspective funnel around the viewport centre.
    Spiral,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SpiralConfig {
    pub min_radius: f32,
    pub max_radius: f32,
    pub max_depth: f32,
    pub turns: f32,
    /// Perspective focal length used when projecting spiral entities.
    pub focal_length: f32,
}

impl Default for SpiralConfig {
    fn default() -> Self {
        Self {
            min_radius: 40.0,
            max_radius: 900.0,
            max_depth: 800.0,
            turns: 6.0,
            focal_length: 500.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FieldConfig {
    pub layout: FieldLayoutKind,
    /// Minimum number of entities, regardless of how many records exist.
    pub floor_count: usize,
    /// Jitter as a fraction of the grid cell, per axis.
    pub jitter_fraction: f32,
    /// Seed for positions and star attributes; identical seeds give identical fields.
    pub seed: u64,
    /// Poster card size at full magnification, in logical pixels.
    pub poster_size: [f32; 2],
    pub spiral: SpiralConfig,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            layout: FieldLayoutKind::Grid,
            floor_count: Self::default_floor_count(),
            jitter_fraction: 0.5,
            seed: 0x6e61_6e69_6d6f,
            poster_size: [100.0, 140.0],
            spiral: SpiralConfig::default(),
        }
    }
}

impl FieldConfig {
    pub const fn default_floor_count() -> usize {
        200
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LensCurveKind {
    Cosine,
    Cubic,
    #[default]
    Power,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LensConfig {
    pub radius: f32,
    /// Peak magnification reached at the focal point.
    pub power: f32,
    pub curve: LensCurveKind,
    /// Exponent of the power curve.
    pub exponent: f32,
    /// Radial push budget in logical pixels (cosine and cubic curves).
    pub push_px: f32,
    /// Per-frame focal smoothing factor, tuned for 60 Hz.
    pub smoothing: f32,
    /// Influence above which a poster image is requested.
    pub load_threshold: f32,
    /// Influence above which a loaded poster is drawn instead of the fallback card.
    pub image_threshold: f32,
    /// Influence above which a loaded poster gets a white outline.
    pub outline_threshold: f32,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            radius: 160.0,
            power: 3.0,
            curve: LensCurveKind::Power,
            exponent: 0.6,
            push_px: 40.0,
            smoothing: 0.18,
            load_threshold: 0.2,
            image_threshold: 0.15,
            outline_threshold: 0.6,
        }
    }
}

impl LensConfig {
    pub fn lens_curve(&self) -> LensCurve {
        match self.curve {
            LensCurveKind::Cosine => LensCurve::Cosine,
            LensCurveKind::Cubic => LensCurve::Cubic,
            LensCurveKind::Power => LensCurve::Power {
                exponent: self.exponent,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct WarpConfig {
    #[serde(with = "humantime_serde")]
    pub prewarp: Duration,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Progress at which the completion callback fires.
    pub complete_threshold: f32,
    pub start_distance: f32,
    pub end_distance: f32,
    /// Share of the warp spent turning the view back to centre.
    pub recenter_fraction: f32,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            prewarp: Duration::from_millis(100),
            duration: Duration::from_millis(2000),
            complete_threshold: 0.8,
            start_distance: 10.0,
            end_distance: 2.0,
            recenter_fraction: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ObserverConfig {
    pub fov_degrees: f32,
    pub distance: f32,
    pub incline_degrees: f32,
    /// Wheel-zoom bounds on the landing scene.
    pub min_distance: f32,
    pub max_distance: f32,
    /// Radians of yaw/pitch per logical pixel of drag.
    pub drag_sensitivity: f32,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            distance: 10.0,
            incline_degrees: -5.0,
            min_distance: 2.5,
            max_distance: 30.0,
            drag_sensitivity: 0.005,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct TexturePaths {
    pub background: Option<PathBuf>,
    pub stars: Option<PathBuf>,
    pub disk: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ShaderConfig {
    /// Integration steps per ray.
    pub steps: u32,
    pub accretion_disk: bool,
    pub disk_texture: bool,
    pub doppler_shift: bool,
    pub lorentz_transform: bool,
    pub beaming: bool,
    /// Image files replacing the procedural textures.
    pub textures: TexturePaths,
    /// Seed for the procedural textures.
    pub texture_seed: u64,
    pub bloom: BloomConfig,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            steps: Self::default_steps(),
            accretion_disk: true,
            disk_texture: true,
            doppler_shift: true,
            lorentz_transform: true,
            beaming: true,
            textures: TexturePaths::default(),
            texture_seed: 7,
            bloom: BloomConfig::default(),
        }
    }
}

impl ShaderConfig {
    pub const fn default_steps() -> u32 {
        600
    }
}

/// Glow added around the bright parts of the lensing backdrop.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct BloomConfig {
    pub enabled: bool,
    /// Multiplier applied to the blurred highlights before they are added.
    pub strength: f32,
    /// Blur spread; larger values widen the halo.
    pub radius: f32,
    /// Linear luminance above which a pixel contributes to the glow.
    pub threshold: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: 0.4,
            radius: 1.5,
            threshold: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct StarfieldConfig {
    pub max_count: usize,
    /// Logical pixels of viewport area per star.
    pub area_per_star: f32,
    /// Depth units per second at warp start; the rate quadruples by the end.
    pub speed: f32,
    pub far_depth: f32,
    pub focal_length: f32,
    /// Fraction of the distance to the focal point covered during prewarp.
    pub prewarp_pull: f32,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            max_count: 300,
            area_per_star: 5000.0,
            speed: 1800.0,
            far_depth: 1000.0,
            focal_length: 500.0,
            prewarp_pull: 0.15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub endpoint: String,
    pub pages: u32,
    pub per_page: u32,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Skip the network entirely and render placeholder entities.
    pub offline: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: ANILIST_ENDPOINT.to_string(),
            pages: 10,
            per_page: 50,
            request_timeout: Duration::from_secs(15),
            offline: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Maximum number of concurrent fetch + decode jobs.
    pub max_concurrent: usize,
    /// Capacity of the request queue between the image cache and the loader.
    pub queue_capacity: usize,
    /// Longest edge of an uploaded poster texture; larger images are downscaled.
    pub max_texture_edge: u32,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 6,
            queue_capacity: 64,
            max_texture_edge: 512,
            request_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub title: String,
    /// Upper bound applied to the window scale factor for backing stores.
    pub max_pixel_ratio: f64,
    /// Longest frame delta fed into the simulation.
    #[serde(with = "humantime_serde")]
    pub max_frame_dt: Duration,
    /// Pause between the warp completion signal and the scene switch.
    #[serde(with = "humantime_serde")]
    pub navigate_delay: Duration,
    /// Zoom bounds for the explore field.
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "NANIMO".to_string(),
            max_pixel_ratio: 2.0,
            max_frame_dt: Duration::from_millis(100),
            navigate_delay: Duration::from_millis(500),
            min_zoom: 0.5,
            max_zoom: 3.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Trending list fetched when the explore field opens.
    pub media_kind: MediaKind,
    pub field: FieldConfig,
    pub lens: LensConfig,
    pub warp: WarpConfig,
    pub observer: ObserverConfig,
    pub shader: ShaderConfig,
    pub starfield: StarfieldConfig,
    pub catalog: CatalogConfig,
    pub loader: LoaderConfig,
    pub viewer: ViewerConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.field.floor_count > 0,
            "field.floor-count must be greater than zero"
        );
        ensure!(
            (0.0..=0.7).contains(&self.field.jitter_fraction),
            "field.jitter-fraction must be within 0.0..=0.7"
        );
        ensure!(
            self.field.poster_size.iter().all(|v| *v > 0.0),
            "field.poster-size must be positive"
        );
        let spiral = &self.field.spiral;
        ensure!(
            spiral.min_radius >= 0.0 && spiral.max_radius >= spiral.min_radius,
            "field.spiral radii must satisfy 0 <= min-radius <= max-radius"
        );
        ensure!(
            spiral.focal_length > 0.0,
            "field.spiral.focal-length must be greater than zero"
        );

        ensure!(self.lens.radius > 0.0, "lens.radius must be greater than zero");
        ensure!(self.lens.power >= 1.0, "lens.power must be at least 1.0");
        ensure!(
            self.lens.exponent > 0.0,
            "lens.exponent must be greater than zero"
        );
        ensure!(
            self.lens.smoothing > 0.0 && self.lens.smoothing <= 1.0,
            "lens.smoothing must be within (0, 1]"
        );
        for (name, value) in [
            ("load-threshold", self.lens.load_threshold),
            ("image-threshold", self.lens.image_threshold),
            ("outline-threshold", self.lens.outline_threshold),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "lens.{name} must be within 0.0..=1.0"
            );
        }

        ensure!(
            !self.warp.duration.is_zero(),
            "warp.duration must be greater than zero"
        );
        ensure!(
            self.warp.complete_threshold > 0.0 && self.warp.complete_threshold <= 1.0,
            "warp.complete-threshold must be within (0, 1]"
        );
        ensure!(
            self.warp.start_distance > 1.0 && self.warp.end_distance > 1.0,
            "warp distances must stay outside the horizon (greater than 1.0)"
        );
        ensure!(
            self.warp.recenter_fraction > 0.0 && self.warp.recenter_fraction < 1.0,
            "warp.recenter-fraction must be within (0, 1)"
        );

        ensure!(
            self.observer.fov_degrees > 0.0 && self.observer.fov_degrees < 180.0,
            "observer.fov-degrees must be within (0, 180)"
        );
        ensure!(
            self.observer.min_distance > 1.0
                && self.observer.max_distance >= self.observer.min_distance,
            "observer distance bounds must satisfy 1 < min-distance <= max-distance"
        );

        ensure!(self.shader.steps > 0, "shader.steps must be greater than zero");
        let bloom = &self.shader.bloom;
        ensure!(
            bloom.strength >= 0.0 && bloom.radius >= 0.0,
            "shader.bloom strength and radius must not be negative"
        );
        ensure!(
            (0.0..=1.0).contains(&bloom.threshold),
            "shader.bloom.threshold must be within 0.0..=1.0"
        );

        ensure!(
            self.starfield.far_depth > 0.0 && self.starfield.focal_length > 0.0,
            "starfield.far-depth and starfield.focal-length must be greater than zero"
        );
        ensure!(
            self.starfield.area_per_star > 0.0,
            "starfield.area-per-star must be greater than zero"
        );

        ensure!(self.catalog.pages > 0, "catalog.pages must be greater than zero");
        ensure!(
            (1..=50).contains(&self.catalog.per_page),
            "catalog.per-page must be within 1..=50"
        );

        ensure!(
            self.loader.max_concurrent > 0,
            "loader.max-concurrent must be greater than zero"
        );
        ensure!(
            self.loader.queue_capacity > 0,
            "loader.queue-capacity must be greater than zero"
        );
        ensure!(
            self.loader.max_texture_edge >= 16,
            "loader.max-texture-edge must be at least 16"
        );

        ensure!(
            self.viewer.max_pixel_ratio >= 1.0,
            "viewer.max-pixel-ratio must be at least 1.0"
        );
        ensure!(
            self.viewer.min_zoom > 0.0 && self.viewer.max_zoom >= self.viewer.min_zoom,
            "viewer zoom bounds must satisfy 0 < min-zoom <= max-zoom"
        );
        Ok(self)
    }
}
