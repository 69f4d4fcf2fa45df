use crate::behavior::{BehaviorState, ParticleFlags};
use crate::events::{Observer, PetEvent};
use crate::particles::{ParticleClock, ParticleSprite};
use glam::Vec2;
use std::f32::consts::PI;

/// Phase advance in radians per second.
const PHASE_RATE: f32 = 2.0;
/// Every pose frequency is a multiple of 0.5, so wrapping here is seamless.
const PHASE_WRAP: f32 = 4.0 * PI;

pub(crate) const PUPIL_MAX: Vec2 = Vec2::new(4.0, 3.0);
/// Closed eyes look down.
pub(crate) const SLEEP_PUPIL: Vec2 = Vec2::new(0.0, 2.0);
/// Pointers farther than this are ignored.
const PUPIL_DEADZONE: f32 = 400.0;
/// Distance at which the pupil reaches its bound.
const PUPIL_REACH: f32 = 150.0;
const PUPIL_SMOOTHING: f32 = 0.3;

/// Body deformation applied around the pet's feet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Transform {
    pub(crate) scale_x: f32,
    pub(crate) scale_y: f32,
    pub(crate) translate_y: f32,
}

impl Transform {
    #[cfg(test)]
    pub(crate) const IDENTITY: Transform = Transform {
        scale_x: 1.0,
        scale_y: 1.0,
        translate_y: 0.0,
    };
}

/// Procedural pose for a state at phase `t`. Negative `translate_y` lifts the body.
pub(crate) fn pose(state: BehaviorState, t: f32) -> Transform {
    match state {
        BehaviorState::Idle => Transform {
            scale_x: 1.0 - t.sin() * 0.01,
            scale_y: 1.0 + t.sin() * 0.02,
            translate_y: 0.0,
        },
        BehaviorState::Walking => {
            let gait = (t * 4.0).sin();
            Transform {
                scale_x: 1.0 + gait * 0.03,
                scale_y: 1.0 - gait * 0.03,
                translate_y: -(t * 2.0).sin().abs() * 2.0,
            }
        }
        BehaviorState::Eating => {
            let chomp = (t * 3.0).sin().abs();
            Transform {
                scale_x: 1.0 + chomp * 0.05,
                scale_y: 1.0 - chomp * 0.08,
                translate_y: 0.0,
            }
        }
        BehaviorState::Playing | BehaviorState::Celebrating => {
            let hop = (t * 1.5).sin().abs();
            Transform {
                scale_x: 1.0 - hop * 0.05,
                scale_y: 1.0 + hop * 0.08,
                translate_y: -hop * 8.0,
            }
        }
        BehaviorState::Sleeping => {
            let breath = (t * 0.5).sin();
            Transform {
                scale_x: 1.0 + breath * 0.02,
                scale_y: 0.95 + breath * 0.05,
                translate_y: 1.0,
            }
        }
        BehaviorState::BeingPetted => {
            let squish = (t * 2.0).sin().abs();
            Transform {
                scale_x: 1.0 + squish * 0.08,
                scale_y: 1.0 - squish * 0.08,
                translate_y: 0.0,
            }
        }
        BehaviorState::Sad => Transform {
            scale_x: 1.03,
            scale_y: 0.92 + (t * 0.5).sin() * 0.01,
            translate_y: 2.0,
        },
        BehaviorState::FollowingMouse => Transform {
            scale_x: 1.0,
            scale_y: 1.0 + (t * 6.0).sin() * 0.02,
            translate_y: -(t * 3.0).sin().abs() * 1.5,
        },
    }
}

/// Where the pupils want to be for a pointer seen from `eye`.
pub(crate) fn pupil_target(state: BehaviorState, eye: Vec2, pointer: Option<Vec2>) -> Vec2 {
    if state == BehaviorState::Sleeping {
        return SLEEP_PUPIL;
    }
    let Some(pointer) = pointer else {
        return Vec2::ZERO;
    };
    let to = pointer - eye;
    let dist = to.length();
    if !dist.is_finite() || dist <= f32::EPSILON || dist > PUPIL_DEADZONE {
        return Vec2::ZERO;
    }
    let reach = (dist / PUPIL_REACH).min(1.0);
    (to / dist * reach * PUPIL_MAX).clamp(-PUPIL_MAX, PUPIL_MAX)
}

/// High-frequency presentation state. Learns about the pet only through events.
#[derive(Debug)]
pub(crate) struct AnimationDriver {
    phase: f32,
    pupil: Vec2,
    state: BehaviorState,
    particles: ParticleClock,
    sprites: Vec<ParticleSprite>,
    transform: Transform,
}

impl AnimationDriver {
    pub(crate) fn new(state: BehaviorState, flags: ParticleFlags) -> Self {
        let mut particles = ParticleClock::default();
        particles.sync(&flags);
        Self {
            phase: 0.0,
            pupil: if state == BehaviorState::Sleeping {
                SLEEP_PUPIL
            } else {
                Vec2::ZERO
            },
            state,
            particles,
            sprites: Vec::new(),
            transform: pose(state, 0.0),
        }
    }

    pub(crate) fn tick(&mut self, dt_secs: f32, eye: Vec2, pointer: Option<Vec2>) {
        self.phase = (self.phase + dt_secs.max(0.0) * PHASE_RATE) % PHASE_WRAP;
        self.transform = pose(self.state, self.phase);

        let target = pupil_target(self.state, eye, pointer);
        self.pupil = if self.state == BehaviorState::Sleeping {
            target
        } else {
            (self.pupil + (target - self.pupil) * PUPIL_SMOOTHING).clamp(-PUPIL_MAX, PUPIL_MAX)
        };

        self.particles.advance();
        self.particles.layout(&mut self.sprites);
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> f32 {
        self.phase
    }

    pub(crate) fn pupil(&self) -> Vec2 {
        self.pupil
    }

    pub(crate) fn transform(&self) -> Transform {
        self.transform
    }

    pub(crate) fn sprites(&self) -> &[ParticleSprite] {
        &self.sprites
    }
}

impl Observer for AnimationDriver {
    fn notify(&mut self, event: &PetEvent) {
        match event {
            PetEvent::StateChanged { to, .. } => self.state = *to,
            PetEvent::ParticlesChanged(flags) => self.particles.sync(flags),
            _ => {}
        }
    }
}
