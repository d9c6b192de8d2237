use std::time::Duration;

use glam::Vec2;

/// Largest integration step; longer frames are split.
const MAX_STEP: f32 = 0.001;

/// Longest frame simulated in one call. A stall past this (a suspended
/// window, a debugger pause) advances the spring by this much only.
const MAX_FRAME: Duration = Duration::from_millis(100);

/// Damped spring that trails the pointer.
///
/// Defaults to tension 170, friction 26 and unit mass, which settles in
/// roughly half a second without visible overshoot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSpring {
    position: Vec2,
    velocity: Vec2,
    target: Vec2,
    tension: f32,
    friction: f32,
    mass: f32,
}

impl Default for PointerSpring {
    fn default() -> Self {
        Self::new(170.0, 26.0, 1.0)
    }
}

impl PointerSpring {
    /// A spring at rest at the origin.
    #[must_use]
    pub fn new(tension: f32, friction: f32, mass: f32) -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            target: Vec2::ZERO,
            tension,
            friction,
            mass: mass.max(f32::EPSILON),
        }
    }

    /// Move the point the spring pulls towards.
    pub fn set_target(&mut self, target: impl Into<Vec2>) {
        self.target = target.into();
    }

    /// Jump to `position` and stop.
    pub fn snap_to(&mut self, position: impl Into<Vec2>) {
        self.position = position.into();
        self.target = self.position;
        self.velocity = Vec2::ZERO;
    }

    /// Advance the simulation by `dt`, at most 100 ms per call.
    pub fn step(&mut self, dt: Duration) {
        let mut remaining = dt.min(MAX_FRAME).as_secs_f32();
        while remaining > 0.0 {
            let h = remaining.min(MAX_STEP);
            let force = (self.target - self.position) * self.tension
                - self.velocity * self.friction;
            self.velocity += force / self.mass * h;
            self.position += self.velocity * h;
            remaining -= h;
        }
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> [f32; 2] {
        self.position.to_array()
    }

    /// Current velocity in units per millisecond.
    #[must_use]
    pub fn speed_per_ms(&self) -> [f32; 2] {
        (self.velocity / 1000.0).to_array()
    }

    /// Whether the spring has come to rest on its target.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.position.distance(self.target) < 0.01
            && self.velocity.length() < 0.01
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settles_on_target() {
        let mut spring = PointerSpring::default();
        spring.set_target([100.0, -50.0]);
        assert!(!spring.is_settled());
        for _ in 0..300 {
            spring.step(Duration::from_millis(16));
        }
        let [x, y] = spring.position();
        assert!((x - 100.0).abs() < 0.01);
        assert!((y + 50.0).abs() < 0.01);
        assert!(spring.is_settled());
    }

    #[test]
    fn moves_towards_target_with_positive_speed() {
        let mut spring = PointerSpring::default();
        spring.set_target([10.0, 0.0]);
        spring.step(Duration::from_millis(16));
        assert!(spring.position()[0] > 0.0);
        assert!(spring.speed_per_ms()[0] > 0.0);
        assert_eq!(spring.speed_per_ms()[1], 0.0);
    }

    #[test]
    fn long_stall_advances_one_capped_frame() {
        let mut stalled = PointerSpring::default();
        stalled.set_target([400.0, 300.0]);
        let mut capped = stalled;

        stalled.step(Duration::from_secs(600));
        capped.step(MAX_FRAME);
        assert_eq!(stalled, capped);
        assert!(stalled.position()[0].is_finite());
        assert!(!stalled.is_settled());
    }

    #[test]
    fn snap_stops_motion() {
        let mut spring = PointerSpring::default();
        spring.set_target([10.0, 10.0]);
        spring.step(Duration::from_millis(50));
        spring.snap_to([3.0, 4.0]);
        assert_eq!(spring.position(), [3.0, 4.0]);
        assert_eq!(spring.speed_per_ms(), [0.0, 0.0]);
        assert!(spring.is_settled());
    }
}
