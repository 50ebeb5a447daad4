//! Slide navigation state machine.
//!
//! Every input source (wheel, touch swipe, keyboard, marker click, arrow
//! button) ends up in [`Navigator`], which owns the current index and the
//! gesture bookkeeping. Time is passed in explicitly so lock windows are
//! plain values that can be checked without a running clock.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// Cooldown after any slide change, long enough for the entrance/exit
/// animation to finish.
pub const TRANSITION_COOLDOWN: Duration = Duration::from_millis(500);
/// Hard lock on wheel-driven changes after one has been committed.
pub const WHEEL_COOLDOWN: Duration = Duration::from_millis(600);
/// A pause longer than this between wheel events starts a new gesture.
pub const WHEEL_GESTURE_GAP: Duration = Duration::from_millis(200);
/// Accumulated absolute wheel delta (points) needed to commit one step.
/// Kept below one mouse-wheel notch, which egui reports as a 40 pt line.
pub const WHEEL_THRESHOLD: f32 = 30.0;
/// Minimum vertical travel (in points) for a touch swipe.
pub const SWIPE_THRESHOLD: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A committed index change, kept around for the transition animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideChange {
    pub from: usize,
    pub to: usize,
    pub direction: Direction,
    pub started: Instant,
}

/// Timed lock: either idle, or locked until a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lock {
    #[default]
    Idle,
    Locked {
        until: Instant,
    },
}

impl Lock {
    pub fn until(now: Instant, window: Duration) -> Self {
        Self::Locked { until: now + window }
    }

    pub fn is_active(&self, now: Instant) -> bool {
        match self {
            Self::Idle => false,
            Self::Locked { until } => now < *until,
        }
    }
}

/// Per-gesture bookkeeping: touch origin, wheel accumulator and wheel lock.
#[derive(Debug, Clone, Default)]
pub struct GestureState {
    touch_start_y: Option<f32>,
    wheel_accum: f32,
    last_wheel: Option<Instant>,
    wheel_lock: Lock,
}

#[derive(Debug, Clone)]
pub struct Navigator {
    len: usize,
    current: usize,
    transition: Lock,
    last_change: Option<SlideChange>,
    gesture: GestureState,
}

impl Navigator {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            current: 0,
            transition: Lock::Idle,
            last_change: None,
            gesture: GestureState::default(),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_transitioning(&self, now: Instant) -> bool {
        self.transition.is_active(now)
    }

    /// The change currently animating and its linear progress in `0..=1`.
    pub fn transition_progress(&self, now: Instant) -> Option<(SlideChange, f32)> {
        if !self.transition.is_active(now) {
            return None;
        }
        let change = self.last_change?;
        let elapsed = now.saturating_duration_since(change.started).as_secs_f32();
        let t = (elapsed / TRANSITION_COOLDOWN.as_secs_f32()).clamp(0.0, 1.0);
        Some((change, t))
    }

    pub fn next(&mut self, now: Instant) -> Option<SlideChange> {
        if self.current + 1 >= self.len {
            return None;
        }
        self.go_to(self.current + 1, now)
    }

    pub fn previous(&mut self, now: Instant) -> Option<SlideChange> {
        if self.current == 0 {
            return None;
        }
        self.go_to(self.current - 1, now)
    }

    /// Jump straight to `index` (progress-marker click). Out-of-range or
    /// same-index selections are no-ops.
    pub fn select(&mut self, index: usize, now: Instant) -> Option<SlideChange> {
        if index >= self.len {
            return None;
        }
        self.go_to(index, now)
    }

    fn go_to(&mut self, to: usize, now: Instant) -> Option<SlideChange> {
        if to == self.current || self.transition.is_active(now) {
            return None;
        }
        let from = self.current;
        let direction = if to > from {
            Direction::Forward
        } else {
            Direction::Backward
        };
        let change = SlideChange {
            from,
            to,
            direction,
            started: now,
        };
        self.current = to;
        self.transition = Lock::until(now, TRANSITION_COOLDOWN);
        self.last_change = Some(change);
        debug!(from, to, "slide change");
        Some(change)
    }

    /// Feed one wheel event. Positive `delta_y` points towards the next slide.
    ///
    /// Deltas are accumulated per gesture and at most one step is committed
    /// per [`WHEEL_COOLDOWN`], however long the gesture keeps scrolling.
    pub fn wheel(&mut self, delta_y: f32, now: Instant) -> Option<SlideChange> {
        if delta_y == 0.0 || self.len == 0 {
            return None;
        }

        let transitioning = self.transition.is_active(now);
        let gesture = &mut self.gesture;
        if transitioning || gesture.wheel_lock.is_active(now) {
            gesture.wheel_accum = 0.0;
            gesture.last_wheel = Some(now);
            trace!(delta_y, "wheel ignored while locked");
            return None;
        }

        if gesture
            .last_wheel
            .is_some_and(|last| now.saturating_duration_since(last) > WHEEL_GESTURE_GAP)
        {
            gesture.wheel_accum = 0.0;
        }
        gesture.last_wheel = Some(now);
        gesture.wheel_accum += delta_y.abs();

        if gesture.wheel_accum < WHEEL_THRESHOLD {
            return None;
        }

        gesture.wheel_accum = 0.0;
        gesture.wheel_lock = Lock::until(now, WHEEL_COOLDOWN);
        debug!(delta_y, "wheel gesture committed");

        if delta_y > 0.0 {
            self.next(now)
        } else {
            self.previous(now)
        }
    }

    pub fn touch_start(&mut self, y: f32) {
        self.gesture.touch_start_y = Some(y);
    }

    /// Finish a touch gesture. Swiping up (finger moving towards the top)
    /// advances; swiping down goes back. Short travel is treated as noise.
    pub fn touch_end(&mut self, y: f32, now: Instant) -> Option<SlideChange> {
        let start = self.gesture.touch_start_y.take()?;
        let delta = start - y;
        if delta > SWIPE_THRESHOLD {
            self.next(now)
        } else if delta < -SWIPE_THRESHOLD {
            self.previous(now)
        } else {
            None
        }
    }

    /// Drop a touch that was cancelled by the platform.
    pub fn touch_cancel(&mut self) {
        self.gesture.touch_start_y = None;
    }
}
