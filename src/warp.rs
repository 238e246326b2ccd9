//! Warp sequencer bridging the landing scene and the poster field.
//!
//! Everything is derived from `Instant` differences, so the effect lasts the
//! same wall-clock time at any refresh rate.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::WarpConfig;

pub fn ease_out_cubic(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(3)
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarpPhase {
    Idle,
    /// Leading slice of the warp where stars gather towards the focal point.
    Prewarp,
    Warp,
    Done,
}

/// Camera pose captured when the warp begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpOrigin {
    pub pitch: f32,
    pub yaw: f32,
    pub distance: f32,
}

/// Per-frame output of [`WarpTransition::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpFrame {
    pub phase: WarpPhase,
    /// Normalized elapsed time, clamped to 1.
    pub progress: f32,
    pub pitch: f32,
    pub yaw: f32,
    /// Orbital radius the observer should use, once the zoom has begun.
    pub distance: Option<f32>,
    /// Visual progress of the streak overlay shader.
    pub overlay: f32,
    /// Set on the single frame where the completion callback fired.
    pub completed: bool,
}

impl WarpFrame {
    fn idle() -> Self {
        Self {
            phase: WarpPhase::Idle,
            progress: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            distance: None,
            overlay: 0.0,
            completed: false,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, WarpPhase::Prewarp | WarpPhase::Warp)
    }
}

type CompletionCallback = Box<dyn FnMut() + Send>;

pub struct WarpTransition {
    cfg: WarpConfig,
    phase: WarpPhase,
    started_at: Option<Instant>,
    origin: WarpOrigin,
    fired: bool,
    on_complete: Option<CompletionCallback>,
}

impl fmt::Debug for WarpTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarpTransition")
            .field("phase", &self.phase)
            .field("started_at", &self.started_at)
            .field("fired", &self.fired)
            .finish_non_exhaustive()
    }
}

impl WarpTransition {
    pub fn new(cfg: WarpConfig) -> Self {
        let origin = WarpOrigin {
            pitch: 0.0,
            yaw: 0.0,
            distance: cfg.start_distance,
        };
        Self {
            cfg,
            phase: WarpPhase::Idle,
            started_at: None,
            origin,
            fired: false,
            on_complete: None,
        }
    }

    /// Registers the one-shot callback invoked when progress crosses the
    /// completion threshold.
    pub fn set_on_complete(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    pub fn phase(&self) -> WarpPhase {
        self.phase
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn duration(&self) -> Duration {
        self.cfg.duration
    }

    /// Starts a warp from a centred camera at the configured start distance.
    pub fn start(&mut self, now: Instant) -> bool {
        let origin = WarpOrigin {
            pitch: 0.0,
            yaw: 0.0,
            distance: self.cfg.start_distance,
        };
        self.start_from(now, origin)
    }

    /// Starts a warp from `origin`. Ignored while a warp is already running.
    pub fn start_from(&mut self, now: Instant, origin: WarpOrigin) -> bool {
        if matches!(self.phase, WarpPhase::Prewarp | WarpPhase::Warp) {
            debug!(phase = ?self.phase, "warp_start_ignored_active");
            return false;
        }
        self.phase = WarpPhase::Prewarp;
        self.started_at = Some(now);
        self.origin = origin;
        self.fired = false;
        info!(
            duration = %humantime::format_duration(self.cfg.duration),
            from_distance = origin.distance,
            to_distance = self.cfg.end_distance,
            "warp_started"
        );
        true
    }

    /// Returns to `Idle` without firing the callback.
    pub fn reset(&mut self) {
        self.phase = WarpPhase::Idle;
        self.started_at = None;
        self.fired = false;
    }

    pub fn progress(&self, now: Instant) -> f32 {
        let Some(started_at) = self.started_at else {
            return 0.0;
        };
        let elapsed = now.saturating_duration_since(started_at);
        let total = self.cfg.duration.as_secs_f32();
        if total <= 0.0 {
            return 1.0;
        }
        (elapsed.as_secs_f32() / total).min(1.0)
    }

    pub fn update(&mut self, now: Instant) -> WarpFrame {
        let Some(started_at) = self.started_at else {
            return WarpFrame::idle();
        };
        if self.phase == WarpPhase::Idle {
            return WarpFrame::idle();
        }

        let progress = self.progress(now);
        let elapsed = now.saturating_duration_since(started_at);

        let next_phase = if progress >= 1.0 {
            WarpPhase::Done
        } else if elapsed < self.cfg.prewarp {
            WarpPhase::Prewarp
        } else {
            WarpPhase::Warp
        };
        if next_phase != self.phase {
            debug!(from = ?self.phase, to = ?next_phase, progress, "warp_phase_changed");
            self.phase = next_phase;
        }

        let recenter = self.cfg.recenter_fraction;
        let look = if progress < recenter {
            1.0 - ease_out_cubic(progress / recenter)
        } else {
            0.0
        };
        let distance = (progress >= recenter).then(|| {
            let eased = ease_in_out_cubic((progress - recenter) / (1.0 - recenter));
            self.origin.distance - (self.origin.distance - self.cfg.end_distance) * eased
        });
        let overlay = ((progress - 0.2) / 0.6).clamp(0.0, 1.0);

        let mut completed = false;
        if progress >= self.cfg.complete_threshold && !self.fired {
            self.fired = true;
            completed = true;
            info!(progress, "warp_completion_signalled");
            if let Some(callback) = self.on_complete.as_mut() {
                callback();
            }
        }

        WarpFrame {
            phase: self.phase,
            progress,
            pitch: self.origin.pitch * look,
            yaw: self.origin.yaw * look,
            distance,
            overlay,
            completed,
        }
    }
}
