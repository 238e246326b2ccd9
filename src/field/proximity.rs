use std::cmp::Ordering;
use std::f32::consts::PI;

use glam::Vec2;

/// Falloff used to turn distance from the focal point into influence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LensCurve {
    /// `(1 + cos(pi * d/R)) / 2`
    Cosine,
    /// Ease-out cubic of the linear ramp `1 - d/R`.
    Cubic,
    /// `1 - (d/R)^exponent`
    Power { exponent: f32 },
}

impl LensCurve {
    /// Influence for a normalized distance `x = d/R`. Zero from `x >= 1` on.
    pub fn influence(self, x: f32) -> f32 {
        if x.is_nan() || x >= 1.0 {
            return 0.0;
        }
        let x = x.max(0.0);
        let t = match self {
            LensCurve::Cosine => (1.0 + (x * PI).cos()) * 0.5,
            LensCurve::Cubic => {
                let linear = 1.0 - x;
                1.0 - (1.0 - linear).powi(3)
            }
            LensCurve::Power { exponent } => 1.0 - x.powf(exponent),
        };
        t.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensSample {
    pub distance: f32,
    pub influence: f32,
    /// Magnification, `1` outside the lens and `power` at its centre.
    pub scale: f32,
    /// Radial push away from the focal point, in logical pixels.
    pub offset: Vec2,
}

impl LensSample {
    pub const NONE: LensSample = LensSample {
        distance: f32::INFINITY,
        influence: 0.0,
        scale: 1.0,
        offset: Vec2::ZERO,
    };
}

#[derive(Debug, Clone, Copy)]
pub struct ProximityField {
    pub radius: f32,
    pub power: f32,
    pub curve: LensCurve,
    pub push_px: f32,
}

impl ProximityField {
    pub fn new(radius: f32, power: f32, curve: LensCurve, push_px: f32) -> Self {
        Self {
            radius,
            power,
            curve,
            push_px,
        }
    }

    pub fn sample(&self, position: Vec2, focal: Vec2) -> LensSample {
        let delta = position - focal;
        let distance = delta.length();
        if self.radius <= 0.0 || distance >= self.radius {
            return LensSample {
                distance,
                ..LensSample::NONE
            };
        }
        let influence = self.curve.influence(distance / self.radius);
        let scale = 1.0 + (self.power - 1.0) * influence;
        let magnitude = match self.curve {
            LensCurve::Cosine => influence * (scale - 1.0) * self.push_px,
            LensCurve::Cubic => (influence * self.push_px).min(self.push_px),
            LensCurve::Power { .. } => 0.0,
        };
        // At the exact centre there is no radial direction to push along.
        let offset = if distance > f32::EPSILON {
            delta / distance * magnitude
        } else {
            Vec2::ZERO
        };
        LensSample {
            distance,
            influence,
            scale,
            offset,
        }
    }
}

/// Off-screen focal position used while the pointer is outside the window.
pub const FOCAL_SENTINEL: Vec2 = Vec2::new(-1000.0, -1000.0);

/// Exponentially smoothed pointer position.
#[derive(Debug, Clone, Copy)]
pub struct FocalPoint {
    target: Vec2,
    current: Vec2,
    alpha: f32,
}

impl FocalPoint {
    /// `alpha` is the per-frame blend factor at 60 Hz.
    pub fn new(alpha: f32) -> Self {
        Self {
            target: FOCAL_SENTINEL,
            current: FOCAL_SENTINEL,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    pub fn reset(&mut self) {
        self.target = FOCAL_SENTINEL;
    }

    /// Jumps straight to `position` without smoothing.
    pub fn snap(&mut self, position: Vec2) {
        self.target = position;
        self.current = position;
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn position(&self) -> Vec2 {
        self.current
    }

    /// Advances the smoothing by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let frames = (dt.max(0.0) * 60.0).min(600.0);
        let alpha = 1.0 - (1.0 - self.alpha).powf(frames);
        self.current += (self.target - self.current) * alpha;
    }
}

/// Back-to-front draw order: ascending influence, then deeper entities first,
/// ties kept in original index order.
pub fn draw_order(samples: &[LensSample], depths: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.sort_by(|&a, &b| {
        samples[a]
            .influence
            .partial_cmp(&samples[b].influence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                let da = depths.get(a).copied().unwrap_or(0.0);
                let db = depths.get(b).copied().unwrap_or(0.0);
                db.partial_cmp(&da).unwrap_or(Ordering::Equal)
            })
            .then_with(|| samples[b].distance.total_cmp(&samples[a].distance))
            .then(a.cmp(&b))
    });
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVES: [LensCurve; 3] = [
        LensCurve::Cosine,
        LensCurve::Cubic,
        LensCurve::Power { exponent: 0.6 },
    ];

    #[test]
    fn influence_is_one_at_center_and_zero_at_edge() {
        for curve in CURVES {
            assert_eq!(curve.influence(0.0), 1.0, "{curve:?}");
            assert_eq!(curve.influence(1.0), 0.0, "{curve:?}");
            assert_eq!(curve.influence(3.5), 0.0, "{curve:?}");
        }
    }

    #[test]
    fn influence_never_increases_with_distance() {
        for curve in CURVES {
            let mut last = f32::INFINITY;
            for step in 0..=200 {
                let t = curve.influence(step as f32 / 100.0);
                assert!(t <= last + 1e-6, "{curve:?} rose at step {step}");
                last = t;
            }
        }
    }

    #[test]
    fn cubic_offset_stays_within_budget() {
        let field = ProximityField::new(100.0, 2.0, LensCurve::Cubic, 30.0);
        for d in 1..100 {
            let sample = field.sample(Vec2::new(d as f32, 0.0), Vec2::ZERO);
            assert!(sample.offset.length() <= 30.0 + 1e-4);
            assert!(sample.offset.x >= 0.0, "push must point away from the focus");
        }
    }

    #[test]
    fn cosine_offset_scales_with_magnification() {
        let field = ProximityField::new(100.0, 2.0, LensCurve::Cosine, 10.0);
        let sample = field.sample(Vec2::new(0.0, 50.0), Vec2::ZERO);
        let expected = sample.influence * (sample.scale - 1.0) * 10.0;
        assert!((sample.offset.y - expected).abs() < 1e-5);
        assert_eq!(sample.offset.x, 0.0);
    }

    #[test]
    fn outside_radius_is_neutral() {
        let field = ProximityField::new(50.0, 3.0, LensCurve::Cosine, 10.0);
        let sample = field.sample(Vec2::new(50.0, 0.0), Vec2::ZERO);
        assert_eq!(sample.influence, 0.0);
        assert_eq!(sample.scale, 1.0);
        assert_eq!(sample.offset, Vec2::ZERO);
    }

    #[test]
    fn focal_point_smoothing_is_frame_rate_independent() {
        let mut at_60 = FocalPoint::new(0.18);
        at_60.snap(Vec2::ZERO);
        at_60.set_target(Vec2::new(100.0, 0.0));
        for _ in 0..6 {
            at_60.update(1.0 / 60.0);
        }
        let mut at_30 = FocalPoint::new(0.18);
        at_30.snap(Vec2::ZERO);
        at_30.set_target(Vec2::new(100.0, 0.0));
        for _ in 0..3 {
            at_30.update(1.0 / 30.0);
        }
        assert!((at_60.position().x - at_30.position().x).abs() < 1e-3);
    }

    #[test]
    fn focal_point_single_frame_matches_alpha() {
        let mut focal = FocalPoint::new(0.18);
        focal.snap(Vec2::ZERO);
        focal.set_target(Vec2::new(100.0, 0.0));
        focal.update(1.0 / 60.0);
        assert!((focal.position().x - 18.0).abs() < 1e-3);
        focal.reset();
        assert_eq!(focal.target(), FOCAL_SENTINEL);
    }

    #[test]
    fn draw_order_is_stable_for_ties() {
        let near = LensSample {
            distance: 0.0,
            influence: 1.0,
            scale: 2.0,
            offset: Vec2::ZERO,
        };
        let samples = [LensSample::NONE, near, LensSample::NONE, LensSample::NONE];
        let order = draw_order(&samples, &[0.0; 4]);
        assert_eq!(order, vec![0, 2, 3, 1]);
    }

    #[test]
    fn draw_order_puts_deeper_entities_first_on_equal_influence() {
        let samples = [LensSample::NONE; 3];
        let order = draw_order(&samples, &[10.0, 300.0, 50.0]);
        assert_eq!(order, vec![1, 2, 0]);
    }
}
