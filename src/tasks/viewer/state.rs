use std::time::{Duration, Instant};

use crate::events::ViewerCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Landing,
    /// Warp signalled completion; waiting out the navigation delay.
    Navigating,
    Explore,
}

#[derive(Debug, Clone, Copy)]
pub struct ViewerStateChange {
    pub from: ViewerState,
    pub to: ViewerState,
}

pub struct ViewerSM {
    state: ViewerState,
    entered_at: Instant,
    navigate_delay: Duration,
}

impl ViewerSM {
    pub fn new(navigate_delay: Duration, now: Instant) -> Self {
        Self {
            state: ViewerState::Landing,
            entered_at: now,
            navigate_delay,
        }
    }

    pub fn current(&self) -> ViewerState {
        self.state
    }

    pub fn on_tick(&mut self, now: Instant) -> Option<ViewerStateChange> {
        if self.state == ViewerState::Navigating
            && now.saturating_duration_since(self.entered_at) >= self.navigate_delay
        {
            return self.goto(ViewerState::Explore, now);
        }
        None
    }

    pub fn on_command(&mut self, cmd: &ViewerCommand, now: Instant) -> Option<ViewerStateChange> {
        match *cmd {
            ViewerCommand::Navigate => match self.state {
                ViewerState::Landing => self.goto(ViewerState::Navigating, now),
                ViewerState::Navigating | ViewerState::Explore => None,
            },
        }
    }

    fn goto(&mut self, to: ViewerState, now: Instant) -> Option<ViewerStateChange> {
        if self.state == to {
            return None;
        }
        let ch = ViewerStateChange {
            from: self.state,
            to,
        };
        self.state = to;
        self.entered_at = now;
        Some(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_waits_for_delay() {
        let t0 = Instant::now();
        let mut sm = ViewerSM::new(Duration::from_millis(500), t0);
        assert!(sm.on_tick(t0 + Duration::from_secs(10)).is_none());
        let ch = sm.on_command(&ViewerCommand::Navigate, t0).unwrap();
        assert_eq!((ch.from, ch.to), (ViewerState::Landing, ViewerState::Navigating));
        assert!(sm.on_tick(t0 + Duration::from_millis(499)).is_none());
        let ch = sm.on_tick(t0 + Duration::from_millis(500)).unwrap();
        assert_eq!((ch.from, ch.to), (ViewerState::Navigating, ViewerState::Explore));
        assert_eq!(sm.current(), ViewerState::Explore);
    }

    #[test]
    fn repeated_navigate_is_ignored() {
        let t0 = Instant::now();
        let mut sm = ViewerSM::new(Duration::from_millis(500), t0);
        sm.on_command(&ViewerCommand::Navigate, t0).unwrap();
        assert!(sm.on_command(&ViewerCommand::Navigate, t0 + Duration::from_millis(400)).is_none());
        // The delay is measured from the first signal.
        assert!(sm.on_tick(t0 + Duration::from_millis(500)).is_some());
        assert!(sm.on_command(&ViewerCommand::Navigate, t0 + Duration::from_secs(1)).is_none());
    }
}
