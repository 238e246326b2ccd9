//! Orbiting camera that feeds the lensing pass.
//!
//! The observer circles the black hole on an inclined orbit. Its angular
//! velocity ramps towards a radius-dependent ceiling while `moving` is set
//! and back down to rest otherwise.

use glam::{EulerRot, Mat3, Quat, Vec3};

/// Smallest radius accepted by [`Observer::set_distance`].
pub const MIN_RADIUS: f32 = 1.0 + 1e-3;

/// Angular velocity ceiling for an orbit of radius `r`.
pub fn max_angular_velocity(r: f32) -> f32 {
    let r = r.max(MIN_RADIUS);
    1.0 / ((2.0 * (r - 1.0)).sqrt() * r)
}

#[derive(Debug, Clone)]
pub struct Observer {
    pub fov_degrees: f32,
    position: Vec3,
    direction: Vec3,
    up: Vec3,
    velocity: Vec3,
    r: f32,
    theta: f32,
    angular_velocity: f32,
    max_angular_velocity: f32,
    incline: f32,
    pitch: f32,
    yaw: f32,
    pub moving: bool,
}

impl Observer {
    pub fn new(fov_degrees: f32) -> Self {
        let mut observer = Self {
            fov_degrees,
            position: Vec3::Z,
            direction: Vec3::NEG_Z,
            up: Vec3::Y,
            velocity: Vec3::ZERO,
            r: 1.0,
            theta: 0.0,
            angular_velocity: 0.0,
            max_angular_velocity: 0.0,
            incline: (-5.0f32).to_radians(),
            pitch: 0.0,
            yaw: 0.0,
            moving: false,
        };
        observer.set_distance(10.0);
        observer
    }

    pub fn with_incline_degrees(mut self, degrees: f32) -> Self {
        self.incline = degrees.to_radians();
        self
    }

    pub fn distance(&self) -> f32 {
        self.r
    }

    /// Moves the observer onto an orbit of radius `r` along its current
    /// bearing and recomputes the angular velocity ceiling.
    pub fn set_distance(&mut self, r: f32) {
        let r = if r.is_finite() { r.max(MIN_RADIUS) } else { MIN_RADIUS };
        self.r = r;
        self.max_angular_velocity = max_angular_velocity(r);
        self.angular_velocity = self.angular_velocity.min(self.max_angular_velocity);
        self.position = self.position.try_normalize().unwrap_or(Vec3::Z) * r;
    }

    /// Points the camera. Yaw rotates about Y first, then pitch about the
    /// yawed X axis; there is no roll.
    pub fn set_direction(&mut self, pitch: f32, yaw: f32) {
        self.pitch = pitch;
        self.yaw = yaw;
        let rotation = Quat::from_euler(EulerRot::YXZ, yaw, pitch, 0.0);
        self.direction = (rotation * Vec3::NEG_Z).normalize();
    }

    /// Advances the orbit by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.theta += self.angular_velocity * dt;
        let (sin, cos) = self.theta.sin_cos();

        let incline = Mat3::from_rotation_x(self.incline);
        self.position = incline * Vec3::new(self.r * sin, 0.0, self.r * cos);
        self.velocity = incline
            * Vec3::new(cos * self.angular_velocity, 0.0, -sin * self.angular_velocity);

        let ramp = dt / self.r;
        if self.moving {
            self.angular_velocity =
                (self.angular_velocity + ramp).min(self.max_angular_velocity);
        } else {
            self.angular_velocity = (self.angular_velocity - ramp).max(0.0);
            if self.angular_velocity == 0.0 {
                self.velocity = Vec3::ZERO;
            }
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn max_angular_velocity(&self) -> f32 {
        self.max_angular_velocity
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }
}
