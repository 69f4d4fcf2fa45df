use glam::Vec2;
use rand::Rng;

/// Roaming box around the anchor, in pixels.
pub(crate) const ROAM_MIN: Vec2 = Vec2::new(-20.0, -10.0);
pub(crate) const ROAM_MAX: Vec2 = Vec2::new(20.0, 10.0);

/// Largest random offset a single walk picks.
const WALK_SPREAD: Vec2 = Vec2::new(30.0, 15.0);

/// Closer than this counts as arrived.
pub(crate) const ARRIVAL_RADIUS: f32 = 5.0;

/// Pixels per behaviour tick at speed multiplier 1.0.
pub(crate) const BASE_SPEED: f32 = 2.0;

pub(crate) const MIN_SPEED_MULTIPLIER: f32 = 0.25;
pub(crate) const MAX_SPEED_MULTIPLIER: f32 = 4.0;

pub(crate) fn clamp_to_roam(p: Vec2) -> Vec2 {
    p.clamp(ROAM_MIN, ROAM_MAX)
}

pub(crate) fn clamp_speed_multiplier(m: f32) -> f32 {
    if m.is_finite() {
        m.clamp(MIN_SPEED_MULTIPLIER, MAX_SPEED_MULTIPLIER)
    } else {
        1.0
    }
}

/// Outcome of one planner step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Step {
    pub(crate) delta: Vec2,
    pub(crate) arrived: bool,
}

impl Step {
    const ARRIVED: Step = Step {
        delta: Vec2::ZERO,
        arrived: true,
    };
}

/// Owns the pet's offset from its anchor and the current walk target.
#[derive(Clone, Debug)]
pub(crate) struct Planner {
    position: Vec2,
    target: Option<Vec2>,
    speed_multiplier: f32,
}

impl Planner {
    pub(crate) fn new(position: Vec2, speed_multiplier: f32) -> Self {
        let position = if position.is_finite() {
            clamp_to_roam(position)
        } else {
            Vec2::ZERO
        };
        Self {
            position,
            target: None,
            speed_multiplier: clamp_speed_multiplier(speed_multiplier),
        }
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    #[cfg(test)]
    pub(crate) fn target(&self) -> Option<Vec2> {
        self.target
    }

    pub(crate) fn speed_multiplier(&self) -> f32 {
        self.speed_multiplier
    }

    pub(crate) fn set_speed_multiplier(&mut self, m: f32) {
        self.speed_multiplier = clamp_speed_multiplier(m);
    }

    pub(crate) fn speed(&self) -> f32 {
        BASE_SPEED * self.speed_multiplier
    }

    /// Pick a random nearby target inside the roaming box.
    pub(crate) fn plan_walk<R: Rng>(&mut self, rng: &mut R) -> Vec2 {
        let dx = rng.gen_range(-WALK_SPREAD.x..=WALK_SPREAD.x);
        let dy = rng.gen_range(-WALK_SPREAD.y..=WALK_SPREAD.y);
        let target = clamp_to_roam(self.position + Vec2::new(dx, dy));
        self.target = Some(target);
        target
    }

    pub(crate) fn set_target(&mut self, target: Vec2) {
        self.target = Some(clamp_to_roam(target));
    }

    pub(crate) fn clear_target(&mut self) {
        self.target = None;
    }

    /// Move toward the target by one tick. Arrival leaves the pet where it is.
    pub(crate) fn step(&mut self) -> Step {
        let Some(target) = self.target else {
            return Step::ARRIVED;
        };
        let to_target = target - self.position;
        let dist = to_target.length();
        if dist < ARRIVAL_RADIUS {
            self.target = None;
            return Step::ARRIVED;
        }
        let delta = to_target / dist * self.speed().min(dist);
        self.position = clamp_to_roam(self.position + delta);
        Step {
            delta,
            arrived: false,
        }
    }
}
