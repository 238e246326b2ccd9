use std::sync::Arc;

use nanimo::config::{FieldConfig, FieldLayoutKind};
use nanimo::field::layout::{GridShape, generate_field, grid_shape};
use nanimo::media::{CoverImage, MediaRecord};

fn record(id: u64) -> Arc<MediaRecord> {
    Arc::new(MediaRecord {
        id,
        cover_image: CoverImage {
            large: Some(format!("https://img.example/{id}.jpg")),
            ..CoverImage::default()
        },
        ..MediaRecord::default()
    })
}

#[test]
fn empty_catalog_fills_floor_on_full_hd() {
    let cfg = FieldConfig::default();
    let field = generate_field(&[], 1920.0, 1080.0, &cfg);
    assert_eq!(field.len(), 200);
    assert_eq!(
        grid_shape(field.len(), 1920.0, 1080.0),
        Some(GridShape { cols: 19, rows: 11 })
    );
    assert!(field.iter().all(|e| e.record.is_none()));
}

#[test]
fn grid_positions_stay_in_their_cells() {
    let cfg = FieldConfig::default();
    let (width, height) = (1920.0, 1080.0);
    let field = generate_field(&[], width, height, &cfg);
    let cell_w = width / 19.0;
    let cell_h = height / 11.0;
    for entity in &field {
        let col = (entity.index % 19) as f32;
        let row = (entity.index / 19) as f32;
        let cx = col * cell_w + cell_w * 0.5;
        let cy = row * cell_h + cell_h * 0.5;
        assert!((entity.position.x - cx).abs() <= cell_w * cfg.jitter_fraction * 0.5 + 1e-3);
        assert!((entity.position.y - cy).abs() <= cell_h * cfg.jitter_fraction * 0.5 + 1e-3);
        assert_eq!(entity.position.z, 0.0);
    }
}

#[test]
fn same_seed_gives_same_field() {
    let cfg = FieldConfig::default();
    let records: Vec<_> = (1..=5).map(record).collect();
    let a = generate_field(&records, 1280.0, 720.0, &cfg);
    let b = generate_field(&records, 1280.0, 720.0, &cfg);
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.position, y.position);
        assert_eq!(x.star_size, y.star_size);
        assert_eq!(x.hue_degrees, y.hue_degrees);
    }

    let other = FieldConfig {
        seed: cfg.seed + 1,
        ..FieldConfig::default()
    };
    let c = generate_field(&records, 1280.0, 720.0, &other);
    assert!(a.iter().zip(&c).any(|(x, y)| x.position != y.position));
}

#[test]
fn records_cycle_over_entities() {
    let cfg = FieldConfig {
        floor_count: 7,
        ..FieldConfig::default()
    };
    let records: Vec<_> = (1..=3).map(record).collect();
    let field = generate_field(&records, 800.0, 600.0, &cfg);
    assert_eq!(field.len(), 7);
    let ids: Vec<u64> = field
        .iter()
        .map(|e| e.record.as_ref().unwrap().id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 1, 2, 3, 1]);
    assert_eq!(field[4].poster_url(), Some("https://img.example/2.jpg"));
}

#[test]
fn more_records_than_floor_keeps_every_record() {
    let cfg = FieldConfig {
        floor_count: 4,
        layout: FieldLayoutKind::Spiral,
        ..FieldConfig::default()
    };
    let records: Vec<_> = (1..=10).map(record).collect();
    let field = generate_field(&records, 800.0, 600.0, &cfg);
    assert_eq!(field.len(), 10);
}

#[test]
fn zero_area_viewport_yields_nothing() {
    let cfg = FieldConfig::default();
    assert!(generate_field(&[], 0.0, 1080.0, &cfg).is_empty());
    assert!(generate_field(&[], 1920.0, 0.0, &cfg).is_empty());
}
