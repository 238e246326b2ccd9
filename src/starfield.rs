//! Star streak particles layered over the lensing view during the warp.

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::StarfieldConfig;
use crate::render::draw_list::{DrawList, srgba};
use crate::warp::WarpPhase;

/// Depth gap between a star and the tail of its streak.
const STREAK_DEPTH: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    /// Screen position at depth `focal_length`.
    pub position: Vec2,
    pub z: f32,
    pub base_size: f32,
    pub twinkle_speed: f32,
    pub twinkle_offset: f32,
}

#[derive(Debug)]
pub struct StarField {
    cfg: StarfieldConfig,
    stars: Vec<Star>,
    size: Vec2,
    rng: StdRng,
}

/// Number of stars for a viewport of the given logical size.
pub fn star_count(cfg: &StarfieldConfig, width: f32, height: f32) -> usize {
    if width <= 0.0 || height <= 0.0 {
        return 0;
    }
    ((width * height / cfg.area_per_star).floor() as usize).min(cfg.max_count)
}

impl StarField {
    pub fn new(cfg: StarfieldConfig, seed: u64) -> Self {
        Self {
            cfg,
            stars: Vec::new(),
            size: Vec2::ZERO,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// Regenerates the stars for a new logical viewport.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.size = Vec2::new(width, height);
        let count = star_count(&self.cfg, width, height);
        let far = self.cfg.far_depth;
        let rng = &mut self.rng;
        self.stars = (0..count)
            .map(|_| Star {
                position: Vec2::new(rng.random::<f32>() * width, rng.random::<f32>() * height),
                z: rng.random::<f32>() * far + 1.0,
                base_size: rng.random::<f32>() * 2.0 + 0.5,
                twinkle_speed: rng.random::<f32>() * 2.0 + 1.0,
                twinkle_offset: rng.random::<f32>() * std::f32::consts::TAU,
            })
            .collect();
    }

    /// Moves stars towards the viewer. Stars passing the camera are recycled
    /// to the far plane at a fresh random position.
    pub fn advance(&mut self, dt: f32, progress: f32) {
        let travel = self.cfg.speed * (1.0 + progress.clamp(0.0, 1.0) * 3.0) * dt.max(0.0);
        let (width, height) = (self.size.x, self.size.y);
        for star in &mut self.stars {
            star.z -= travel;
            if star.z <= 0.0 {
                star.z = self.cfg.far_depth;
                star.position = Vec2::new(
                    self.rng.random::<f32>() * width,
                    self.rng.random::<f32>() * height,
                );
            }
        }
    }

    pub fn draw(&self, list: &mut DrawList, phase: WarpPhase, progress: f32, center: Vec2, time: f32) {
        match phase {
            WarpPhase::Idle | WarpPhase::Done => {
                for star in &self.stars {
                    let wave = (time * star.twinkle_speed + star.twinkle_offset).sin();
                    let alpha = (0.8 + 0.35 * wave).clamp(0.0, 1.0);
                    list.circle(star.position.to_array(), star.base_size, srgba(255, 255, 255, alpha));
                }
            }
            WarpPhase::Prewarp => {
                let pull = self.cfg.prewarp_pull;
                for star in &self.stars {
                    let pos = star.position + (center - star.position) * pull;
                    list.circle(pos.to_array(), star.base_size, srgba(255, 255, 255, 0.8));
                }
            }
            WarpPhase::Warp => {
                let focal = self.cfg.focal_length;
                let far = self.cfg.far_depth;
                for star in &self.stars {
                    let z = star.z.max(1.0);
                    let scale = focal / z;
                    let head = center + (star.position - center) * scale;
                    let tail_scale = focal / (z + STREAK_DEPTH);
                    let tail = center + (star.position - center) * tail_scale;
                    let alpha = ((far - z) / (far * 0.5)).min(1.0) * (1.0 - progress * 0.5);
                    let width = (star.base_size * scale * 0.5).max(0.5);
                    list.line(tail.to_array(), head.to_array(), width, srgba(255, 255, 255, alpha));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_scales_with_area_and_caps() {
        let cfg = StarfieldConfig::default();
        assert_eq!(star_count(&cfg, 500.0, 500.0), 50);
        assert_eq!(star_count(&cfg, 3840.0, 2160.0), 300);
        assert_eq!(star_count(&cfg, 0.0, 2160.0), 0);
    }

    #[test]
    fn stars_recycle_to_far_plane() {
        let cfg = StarfieldConfig::default();
        let far = cfg.far_depth;
        let mut field = StarField::new(cfg, 3);
        field.resize(800.0, 600.0);
        assert!(!field.stars().is_empty());
        for _ in 0..120 {
            field.advance(1.0 / 60.0, 0.5);
            for star in field.stars() {
                assert!(star.z > 0.0 && star.z <= far + 1.0);
                assert!(star.position.x >= 0.0 && star.position.x <= 800.0);
            }
        }
    }

    #[test]
    fn warp_draws_one_streak_per_star() {
        let mut field = StarField::new(StarfieldConfig::default(), 1);
        field.resize(400.0, 300.0);
        let mut list = DrawList::new([0.0; 4]);
        field.draw(&mut list, WarpPhase::Warp, 0.2, Vec2::new(200.0, 150.0), 0.0);
        let visible = field
            .stars()
            .iter()
            .filter(|s| s.z < field.cfg.far_depth)
            .count();
        assert_eq!(list.len(), visible);
    }
}
