//! Light bending around a unit-radius black hole.
//!
//! `gpu/shaders/lensing.wgsl` is the real-time integrator. This module holds
//! its uniform layout and a CPU reference of the same maths, used by tests and
//! by `--still` renders.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec2, Vec3, Vec4};
use rayon::prelude::*;

use crate::config::ShaderConfig;
use crate::observer::Observer;

pub const STEP: f32 = 0.05;
pub const DISK_INNER: f32 = 2.0;
pub const DISK_WIDTH: f32 = 2.5;
pub const MIN_TEMPERATURE: f32 = 1000.0;
pub const TEMPERATURE_RANGE: f32 = 39000.0;
pub const BACKGROUND_WEIGHT: f32 = 0.25;

pub const FLAG_ACCRETION_DISK: u32 = 1 << 0;
pub const FLAG_DISK_TEXTURE: u32 = 1 << 1;
pub const FLAG_DOPPLER_SHIFT: u32 = 1 << 2;
pub const FLAG_LORENTZ_TRANSFORM: u32 = 1 << 3;
pub const FLAG_BEAMING: u32 = 1 << 4;

pub fn shader_flags(cfg: &ShaderConfig) -> u32 {
    let mut flags = 0;
    for (enabled, bit) in [
        (cfg.accretion_disk, FLAG_ACCRETION_DISK),
        (cfg.disk_texture, FLAG_DISK_TEXTURE),
        (cfg.doppler_shift, FLAG_DOPPLER_SHIFT),
        (cfg.lorentz_transform, FLAG_LORENTZ_TRANSFORM),
        (cfg.beaming, FLAG_BEAMING),
    ] {
        if enabled {
            flags |= bit;
        }
    }
    flags
}

/// Uniform block bound at `@group(0) @binding(0)` of `lensing.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LensUniforms {
    /// xyz position, w field of view in degrees.
    pub cam_pos: [f32; 4],
    /// xyz look direction, w scene time in seconds.
    pub cam_dir: [f32; 4],
    pub cam_up: [f32; 4],
    /// xyz observer velocity as a fraction of c.
    pub cam_vel: [f32; 4],
    pub resolution: [f32; 2],
    pub steps: u32,
    pub flags: u32,
}

impl LensUniforms {
    pub fn new(camera: &LensCamera, time: f32, resolution: [f32; 2], steps: u32, flags: u32) -> Self {
        Self {
            cam_pos: camera.position.extend(camera.fov_degrees).to_array(),
            cam_dir: camera.direction.extend(time).to_array(),
            cam_up: camera.up.extend(0.0).to_array(),
            cam_vel: camera.velocity.extend(0.0).to_array(),
            resolution,
            steps,
            flags,
        }
    }
}

/// Camera snapshot used to generate primary rays.
#[derive(Debug, Clone, Copy)]
pub struct LensCamera {
    pub position: Vec3,
    pub direction: Vec3,
    pub up: Vec3,
    pub velocity: Vec3,
    pub fov_degrees: f32,
}

impl LensCamera {
    pub fn from_observer(observer: &Observer) -> Self {
        Self {
            position: observer.position(),
            direction: observer.direction(),
            up: observer.up(),
            velocity: observer.velocity(),
            fov_degrees: observer.fov_degrees,
        }
    }

    /// Primary ray for a pixel centre, `pixel` measured from the top-left.
    pub fn ray_direction(&self, pixel: Vec2, resolution: Vec2, lorentz: bool) -> Vec3 {
        let half_fov = (self.fov_degrees * 0.5).to_radians().tan();
        let mut uv = pixel / resolution * 2.0 - Vec2::ONE;
        uv.y = -uv.y;
        uv.x *= resolution.x / resolution.y;

        let forward = self.direction.normalize();
        let right = forward.cross(self.up.normalize()).normalize();
        let up = right.cross(forward);
        let dir = (forward + right * uv.x * half_fov + up * uv.y * half_fov).normalize();
        if lorentz {
            lorentz_transform_velocity(dir, self.velocity)
        } else {
            dir
        }
    }
}

/// Relativistic velocity addition of `u` seen from a frame moving at `v`.
pub fn lorentz_transform_velocity(u: Vec3, v: Vec3) -> Vec3 {
    let speed_sq = v.length_squared();
    if speed_sq <= 0.0 || speed_sq >= 1.0 {
        return u;
    }
    let gamma = 1.0 / (1.0 - speed_sq).sqrt();
    let denominator = 1.0 - v.dot(u);
    (u / gamma - v + (gamma / (gamma + 1.0)) * u.dot(v) * v) / denominator
}

/// Approximate blackbody colour in display space for a temperature in kelvin.
pub fn temperature_to_rgb(kelvin: f32) -> Vec3 {
    let t = kelvin.clamp(1000.0, 40000.0) / 100.0;
    let (r, g) = if t <= 66.0 {
        (255.0, (99.470_8 * t.ln() - 161.119_57).clamp(0.0, 255.0))
    } else {
        let shifted = (t - 60.0).max(0.0);
        (
            (329.698_73 * shifted.powf(-0.133_204_76)).clamp(0.0, 255.0),
            (288.122_17 * shifted.powf(-0.075_514_85)).min(255.0),
        )
    };
    let b = if t >= 66.0 {
        255.0
    } else if t <= 19.0 {
        0.0
    } else {
        (138.517_73 * (t - 10.0).ln() - 305.044_8).clamp(0.0, 255.0)
    };
    Vec3::new(r, g, b) / 255.0
}

/// Equatorial-plane crossing inside the accretion disk band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskHit {
    pub point: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayOutcome {
    /// Crossed the horizon inward.
    Captured,
    /// Finished outside the horizon heading along the given direction.
    Escaped(Vec3),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RayTrace {
    pub outcome: RayOutcome,
    pub disk_hits: Vec<DiskHit>,
}

/// Integrates a photon from `origin` along `direction` for `steps` steps.
pub fn trace_ray(origin: Vec3, direction: Vec3, steps: u32) -> RayTrace {
    let mut point = origin;
    let mut velocity = direction;
    let h2 = point.cross(velocity).length_squared();
    let mut old_point = point;
    let mut disk_hits = Vec::new();

    for _ in 0..steps {
        old_point = point;
        point += velocity * STEP;
        let accel = -1.5 * h2 * point / point.length_squared().powf(2.5);
        velocity += accel * STEP;

        let distance = point.length();
        if distance < 1.0 && old_point.length() > 1.0 {
            return RayTrace {
                outcome: RayOutcome::Captured,
                disk_hits,
            };
        }

        if old_point.y * point.y < 0.0 {
            let lambda = -old_point.y / velocity.y;
            let hit = old_point + lambda * velocity;
            let radius = hit.length();
            if (DISK_INNER..=DISK_INNER + DISK_WIDTH).contains(&radius) {
                disk_hits.push(DiskHit { point: hit, radius });
            }
        }
    }

    let outcome = if point.length() > 1.0 {
        RayOutcome::Escaped((point - old_point).normalize_or_zero())
    } else {
        RayOutcome::Captured
    };
    RayTrace { outcome, disk_hits }
}

/// Keplerian-flavoured orbital velocity of disk material at `hit`.
pub fn disk_velocity(hit: Vec3, radius: f32) -> Vec3 {
    Vec3::new(-hit.x, 0.0, hit.z) / (2.0 * (radius - 1.0)).sqrt() / (radius * radius)
}

pub fn disk_temperature(radius: f32) -> f32 {
    10000.0 * (radius / DISK_INNER).powf(-0.75)
}

/// Shades one primary ray with the blackbody disk and a procedural sky.
///
/// The disk texture path of the shader is approximated by the blackbody disk.
pub fn shade_ray(camera: &LensCamera, ray_dir: Vec3, steps: u32, flags: u32) -> Vec4 {
    let vel = camera.velocity;
    let ray_gamma = 1.0 / (1.0 - vel.length_squared()).max(1e-6).sqrt();
    let ray_doppler = ray_gamma * (1.0 + ray_dir.dot(-vel));
    let mut intensity = 1.0;
    if flags & FLAG_BEAMING != 0 {
        intensity /= ray_doppler.powi(3);
    }

    let trace = trace_ray(camera.position, ray_dir, steps);
    let mut color = Vec4::new(0.0, 0.0, 0.0, 1.0);

    if flags & FLAG_ACCRETION_DISK != 0 {
        for hit in &trace.disk_hits {
            let dv = disk_velocity(hit.point, hit.radius);
            let disk_gamma = 1.0 / (1.0 - dv.length_squared()).max(1e-6).sqrt();
            let distance = hit.point.length();
            let disk_doppler = disk_gamma * (1.0 + (ray_dir / distance).dot(dv));
            let mut temperature = disk_temperature(hit.radius);
            if flags & FLAG_DOPPLER_SHIFT != 0 {
                temperature /= ray_doppler * disk_doppler;
            }
            let rgb = temperature_to_rgb(temperature);
            let mut alpha = (rgb.length_squared() / 3.0).clamp(0.0, 1.0);
            if flags & FLAG_BEAMING != 0 {
                alpha /= disk_doppler.powi(3);
            }
            color += rgb.extend(1.0) * alpha;
        }
    }

    if let RayOutcome::Escaped(direction) = trace.outcome {
        let rotated = Mat3::from_rotation_z(PI / 4.0) * direction;
        let uv = to_spherical(rotated);
        if let Some((temperature_fraction, brightness, radial)) = procedural_star(uv) {
            let mut temperature = MIN_TEMPERATURE + TEMPERATURE_RANGE * temperature_fraction;
            let star_doppler = ((1.0 + radial) / (1.0 - radial)).sqrt();
            if flags & FLAG_DOPPLER_SHIFT != 0 {
                temperature /= ray_doppler * star_doppler;
            }
            color += temperature_to_rgb(temperature).extend(1.0) * brightness;
        }
        color += procedural_sky(uv).extend(1.0) * BACKGROUND_WEIGHT;
    }

    color * intensity
}

/// Equirectangular coordinates of a unit direction.
pub fn to_spherical(dir: Vec3) -> Vec2 {
    let uv = Vec2::new(dir.z.atan2(dir.x), dir.y.clamp(-1.0, 1.0).asin());
    uv * Vec2::new(1.0 / (2.0 * PI), 1.0 / PI) + Vec2::splat(0.5)
}

fn hash2(p: Vec2) -> f32 {
    ((p.dot(Vec2::new(12.9898, 78.233))).sin() * 43_758.547).fract().abs()
}

/// Sparse star cells on a 512x256 lattice: (temperature, brightness, radial velocity).
fn procedural_star(uv: Vec2) -> Option<(f32, f32, f32)> {
    let cell = (uv * Vec2::new(512.0, 256.0)).floor();
    let seed = hash2(cell);
    if seed < 0.985 {
        return None;
    }
    let temperature = hash2(cell + Vec2::new(3.1, 7.7));
    let brightness = 0.4 + 0.6 * hash2(cell + Vec2::new(9.2, 1.3));
    let radial = (hash2(cell + Vec2::new(5.5, 2.4)) - 0.5) * 0.2;
    Some((temperature, brightness, radial))
}

fn procedural_sky(uv: Vec2) -> Vec3 {
    let band = (-((uv.y - 0.5) * 9.0).powi(2)).exp();
    Vec3::new(0.35, 0.3, 0.45) * band * (0.6 + 0.4 * (uv.x * 2.0 * PI * 3.0).sin().abs())
}

/// CPU render of the lensing view into an 8-bit RGBA image.
pub fn render_still(camera: &LensCamera, width: u32, height: u32, steps: u32, flags: u32) -> image::RgbaImage {
    let resolution = Vec2::new(width as f32, height as f32);
    let lorentz = flags & FLAG_LORENTZ_TRANSFORM != 0;
    let mut out = image::RgbaImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }
    let row_bytes = width as usize * 4;

    out.par_chunks_exact_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let pixel = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let dir = camera.ray_direction(pixel, resolution, lorentz);
                let c = shade_ray(camera, dir, steps, flags);
                for (dst, v) in px.iter_mut().zip([c.x, c.y, c.z, 1.0]) {
                    *dst = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
        });
    out
}
