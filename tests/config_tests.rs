use std::io::Write;
use std::time::Duration;

use nanimo::config::{Configuration, FieldLayoutKind, LensCurveKind};
use nanimo::field::proximity::LensCurve;
use nanimo::media::MediaKind;

#[test]
fn empty_document_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.media_kind, MediaKind::Anime);
    assert_eq!(cfg.field.floor_count, 200);
    assert_eq!(cfg.field.layout, FieldLayoutKind::Grid);
    assert_eq!(cfg.shader.steps, 600);
    assert_eq!(cfg.warp.duration, Duration::from_millis(2000));
    assert_eq!(cfg.catalog.pages, 10);
    assert_eq!(cfg.catalog.per_page, 50);
}

#[test]
fn parse_kebab_case_sections() {
    let yaml = r#"
media-kind: manga
field:
  layout: spiral
  floor-count: 64
  spiral:
    turns: 3.5
lens:
  radius: 150.0
  power: 2.5
  curve: cosine
warp:
  duration: 1200ms
  prewarp: 50ms
loader:
  request-timeout: 5s
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.media_kind, MediaKind::Manga);
    assert_eq!(cfg.field.layout, FieldLayoutKind::Spiral);
    assert_eq!(cfg.field.floor_count, 64);
    assert!((cfg.field.spiral.turns - 3.5).abs() < f32::EPSILON);
    assert_eq!(cfg.lens.curve, LensCurveKind::Cosine);
    assert_eq!(cfg.lens.lens_curve(), LensCurve::Cosine);
    assert_eq!(cfg.warp.duration, Duration::from_millis(1200));
    assert_eq!(cfg.warp.prewarp, Duration::from_millis(50));
    assert_eq!(cfg.loader.request_timeout, Duration::from_secs(5));
    assert!(cfg.validated().is_ok());
}

#[test]
fn power_curve_carries_exponent() {
    let yaml = r#"
lens:
  curve: power
  exponent: 2.0
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.lens.lens_curve(), LensCurve::Power { exponent: 2.0 });
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
lens:
  radius: 100.0
  wobble: true
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn from_yaml_file_reads_tempfile() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "catalog:\n  offline: true\n  pages: 2").unwrap();
    let cfg = Configuration::from_yaml_file(file.path()).unwrap();
    assert!(cfg.catalog.offline);
    assert_eq!(cfg.catalog.pages, 2);
}

#[test]
fn validation_rejects_bad_values() {
    let cases = [
        "field:\n  floor-count: 0",
        "field:\n  jitter-fraction: 0.9",
        "lens:\n  power: 0.5",
        "lens:\n  smoothing: 0.0",
        "warp:\n  duration: 0s",
        "warp:\n  end-distance: 1.0",
        "observer:\n  fov-degrees: 180.0",
        "shader:\n  steps: 0",
        "shader:\n  bloom:\n    threshold: 1.5",
        "shader:\n  bloom:\n    strength: -0.1",
        "catalog:\n  per-page: 51",
        "viewer:\n  max-pixel-ratio: 0.5",
    ];
    for yaml in cases {
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "expected rejection for {yaml:?}");
    }
}

#[test]
fn bloom_defaults_and_overrides() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    let bloom = &cfg.shader.bloom;
    assert!(bloom.enabled);
    assert_eq!((bloom.strength, bloom.radius, bloom.threshold), (0.4, 1.5, 0.1));

    let yaml = r#"
shader:
  bloom:
    enabled: false
    strength: 0.8
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(!cfg.shader.bloom.enabled);
    assert_eq!(cfg.shader.bloom.strength, 0.8);
    assert_eq!(cfg.shader.bloom.radius, 1.5);
    assert!(cfg.validated().is_ok());
}
