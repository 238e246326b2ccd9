use std::sync::Arc;

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{Entity, golden_hue};
use crate::config::{FieldConfig, FieldLayoutKind, SpiralConfig};
use crate::media::MediaRecord;

/// Number of entities laid out for `records` records.
pub fn entity_count(records: usize, floor: usize) -> usize {
    records.max(floor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub cols: usize,
    pub rows: usize,
}

/// Column/row split that keeps cells close to square for the given aspect.
pub fn grid_shape(count: usize, width: f32, height: f32) -> Option<GridShape> {
    if count == 0 || width <= 0.0 || height <= 0.0 {
        return None;
    }
    let cols = ((count as f64 * (width as f64 / height as f64)).sqrt().ceil() as usize).max(1);
    let rows = count.div_ceil(cols);
    Some(GridShape { cols, rows })
}

/// Lays out `max(records.len(), floor_count)` entities over a `width` x `height`
/// logical canvas. Returns nothing while the canvas has no area.
pub fn generate_field(
    records: &[Arc<MediaRecord>],
    width: f32,
    height: f32,
    cfg: &FieldConfig,
) -> Vec<Entity> {
    if width <= 0.0 || height <= 0.0 {
        debug!(width, height, "field_layout_skipped_zero_area");
        return Vec::new();
    }
    let count = entity_count(records.len(), cfg.floor_count);
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let positions = match cfg.layout {
        FieldLayoutKind::Grid => grid_positions(count, width, height, cfg.jitter_fraction, &mut rng),
        FieldLayoutKind::Spiral => spiral_positions(count, width, height, &cfg.spiral),
    };

    let entities: Vec<Entity> = positions
        .into_iter()
        .enumerate()
        .map(|(index, position)| Entity {
            index,
            position,
            star_size: rng.random_range(1.2..2.5),
            brightness: rng.random_range(0.3..1.0),
            twinkle_speed: rng.random_range(0.5..2.0),
            hue_degrees: golden_hue(index),
            record: (!records.is_empty()).then(|| records[index % records.len()].clone()),
            image: None,
        })
        .collect();

    debug!(
        count = entities.len(),
        records = records.len(),
        layout = ?cfg.layout,
        width,
        height,
        "field_layout_generated"
    );
    entities
}

fn grid_positions(
    count: usize,
    width: f32,
    height: f32,
    jitter_fraction: f32,
    rng: &mut StdRng,
) -> Vec<Vec3> {
    let Some(GridShape { cols, rows }) = grid_shape(count, width, height) else {
        return Vec::new();
    };
    let cell_w = width / cols as f32;
    let cell_h = height / rows as f32;
    (0..count)
        .map(|i| {
            let col = i % cols;
            let row = i / cols;
            let base_x = col as f32 * cell_w + cell_w * 0.5;
            let base_y = row as f32 * cell_h + cell_h * 0.5;
            let jitter_x = (rng.random::<f32>() - 0.5) * cell_w * jitter_fraction;
            let jitter_y = (rng.random::<f32>() - 0.5) * cell_h * jitter_fraction;
            Vec3::new(base_x + jitter_x, base_y + jitter_y, 0.0)
        })
        .collect()
}

fn spiral_positions(count: usize, width: f32, height: f32, spiral: &SpiralConfig) -> Vec<Vec3> {
    let center = Vec2::new(width * 0.5, height * 0.5);
    (0..count)
        .map(|i| {
            let t = i as f32 / count as f32;
            let radius = spiral.min_radius + (spiral.max_radius - spiral.min_radius) * t;
            let angle = t * spiral.turns * std::f32::consts::TAU;
            Vec3::new(
                center.x + angle.cos() * radius,
                center.y + angle.sin() * radius,
                t * spiral.max_depth,
            )
        })
        .collect()
}

/// Projects a field point onto the screen around `center`.
///
/// Returns the screen position and the perspective scale; points at depth 0
/// keep their position and scale 1.
pub fn project_perspective(point: Vec3, center: Vec2, focal_length: f32) -> (Vec2, f32) {
    let scale = focal_length / (focal_length + point.z.max(0.0));
    let screen = center + (point.truncate() - center) * scale;
    (screen, scale)
}
