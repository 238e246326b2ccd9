//! Sky, star-noise and accretion disk textures sampled by `lensing.wgsl`.

use std::f32::consts::TAU;
use std::path::Path;

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::config::ShaderConfig;

pub const SKY_SIZE: (u32, u32) = (1024, 512);
pub const DISK_SIZE: (u32, u32) = (512, 64);

/// Probability that a star-noise texel holds a star.
const STAR_DENSITY: f64 = 0.004;

pub struct LensTextures {
    pub background: RgbaImage,
    pub stars: RgbaImage,
    pub disk: RgbaImage,
}

impl LensTextures {
    /// Procedural textures from `texture_seed`, replaced by configured files where they load.
    pub fn load(cfg: &ShaderConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(cfg.texture_seed);
        let background = procedural_background(&mut rng, SKY_SIZE.0, SKY_SIZE.1);
        let stars = procedural_stars(&mut rng, SKY_SIZE.0, SKY_SIZE.1);
        let disk = procedural_disk(&mut rng, DISK_SIZE.0, DISK_SIZE.1);
        Self {
            background: override_from(cfg.textures.background.as_deref(), "background", background),
            stars: override_from(cfg.textures.stars.as_deref(), "stars", stars),
            disk: override_from(cfg.textures.disk.as_deref(), "disk", disk),
        }
    }
}

fn override_from(path: Option<&Path>, name: &str, fallback: RgbaImage) -> RgbaImage {
    let Some(path) = path else {
        return fallback;
    };
    match image::open(path) {
        Ok(img) => {
            let img = img.to_rgba8();
            info!(texture = name, path = %path.display(), width = img.width(), height = img.height(), "lens_texture_loaded");
            img
        }
        Err(err) => {
            warn!(texture = name, path = %path.display(), error = %err, "lens_texture_fallback");
            fallback
        }
    }
}

/// Equirectangular sky with a soft galactic band across the equator.
pub fn procedural_background(rng: &mut StdRng, width: u32, height: u32) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let u = (x as f32 + 0.5) / width as f32;
        let v = (y as f32 + 0.5) / height as f32;
        let band = (-((v - 0.5) * 9.0).powi(2)).exp();
        let lanes = 0.6 + 0.4 * (u * TAU * 3.0).sin().abs();
        let dust: f32 = rng.random_range(0.55..1.0);
        let glow = band * lanes * dust;
        let base: f32 = rng.random_range(0.0..0.04);
        *px = Rgba([
            to_u8(base + glow * 0.35),
            to_u8(base + glow * 0.30),
            to_u8(base * 1.4 + glow * 0.45),
            255,
        ]);
    }
    img
}

/// Sparse star noise: r = temperature fraction, g = brightness (0 = no star),
/// b = radial velocity + 0.5.
pub fn procedural_stars(rng: &mut StdRng, width: u32, height: u32) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 128, 255]));
    for px in img.pixels_mut() {
        if !rng.random_bool(STAR_DENSITY) {
            continue;
        }
        // Cool stars outnumber hot ones.
        let temperature: f32 = rng.random::<f32>().powi(2);
        let brightness: f32 = rng.random_range(0.4..1.0);
        let radial: f32 = rng.random_range(-0.1..0.1);
        *px = Rgba([to_u8(temperature), to_u8(brightness), to_u8(radial + 0.5), 255]);
    }
    img
}

/// Disk texture: u runs around the disk, v from the outer edge (row 0) to the
/// inner edge. Streaks are periodic in u so the seam is invisible.
pub fn procedural_disk(rng: &mut StdRng, width: u32, height: u32) -> RgbaImage {
    let rows: Vec<(f32, f32, f32)> = (0..height)
        .map(|_| {
            let frequency = rng.random_range(2u32..12) as f32;
            let phase = rng.random_range(0.0..TAU);
            let gain = rng.random_range(0.6..1.0);
            (frequency, phase, gain)
        })
        .collect();

    let mut img = RgbaImage::new(width, height);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let u = x as f32 / width as f32;
        let v = (y as f32 + 0.5) / height as f32;
        let (frequency, phase, gain) = rows[y as usize];
        let streak = 0.75 + 0.25 * (u * TAU * frequency + phase).sin();
        let falloff = v.powf(1.5);
        let heat = falloff * streak * gain;
        *px = Rgba([
            to_u8(heat * 1.6),
            to_u8(heat * 1.1),
            to_u8(heat * 0.6),
            255,
        ]);
    }
    img
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Uploads an RGBA8 image as a sampled texture.
pub fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    image: &RgbaImage,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    upload_rgba(device, queue, label, image.width(), image.height(), image.as_raw(), format)
}

pub fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    pixels: &[u8],
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.width),
            rows_per_image: Some(size.height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn same_seed_gives_same_textures() {
        let a = procedural_stars(&mut StdRng::seed_from_u64(7), 128, 64);
        let b = procedural_stars(&mut StdRng::seed_from_u64(7), 128, 64);
        assert_eq!(a.as_raw(), b.as_raw());
        let c = procedural_stars(&mut StdRng::seed_from_u64(8), 128, 64);
        assert_ne!(a.as_raw(), c.as_raw());
    }

    #[test]
    fn star_noise_encodes_velocity_around_half() {
        let img = procedural_stars(&mut StdRng::seed_from_u64(1), 256, 128);
        let stars: Vec<_> = img.pixels().filter(|p| p.0[1] > 0).collect();
        assert!(!stars.is_empty());
        for p in stars {
            assert!(p.0[1] >= 100, "brightness starts at 0.4");
            assert!((102..=153).contains(&p.0[2]), "radial velocity within +-0.1");
        }
    }

    #[test]
    fn disk_brightens_toward_inner_edge() {
        let img = procedural_disk(&mut StdRng::seed_from_u64(3), 64, 32);
        let row_sum = |y: u32| (0..64).map(|x| img.get_pixel(x, y).0[0] as u32).sum::<u32>();
        assert!(row_sum(31) > row_sum(0));
    }

    #[test]
    fn missing_override_falls_back() {
        let mut cfg = ShaderConfig::default();
        cfg.textures.disk = Some(PathBuf::from("/nonexistent/disk.png"));
        let textures = LensTextures::load(&cfg);
        assert_eq!(textures.disk.dimensions(), DISK_SIZE);
        assert_eq!(textures.background.dimensions(), SKY_SIZE);
    }
}
