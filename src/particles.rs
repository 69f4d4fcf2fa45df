use crate::behavior::ParticleFlags;
use glam::Vec2;
use std::f32::consts::TAU;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ParticleKind {
    Heart,
    Crumb,
    Snooze,
    Sparkle,
    Raindrop,
}

impl ParticleKind {
    pub(crate) const ALL: [ParticleKind; 5] = [
        ParticleKind::Heart,
        ParticleKind::Crumb,
        ParticleKind::Snooze,
        ParticleKind::Sparkle,
        ParticleKind::Raindrop,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn is_on(self, flags: &ParticleFlags) -> bool {
        match self {
            ParticleKind::Heart => flags.hearts,
            ParticleKind::Crumb => flags.food,
            ParticleKind::Snooze => flags.sleep,
            ParticleKind::Sparkle => flags.sparkles,
            ParticleKind::Raindrop => flags.rain,
        }
    }
}

/// One particle to draw this frame, relative to the pet's center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ParticleSprite {
    pub(crate) kind: ParticleKind,
    pub(crate) offset: Vec2,
    pub(crate) alpha: f32,
}

/// Frame counters for each particle kind, `None` while the kind is off.
#[derive(Clone, Debug, Default)]
pub(crate) struct ParticleClock {
    frames: [Option<u32>; 5],
}

impl ParticleClock {
    /// Start counters for kinds that just turned on, drop the ones that turned off.
    pub(crate) fn sync(&mut self, flags: &ParticleFlags) {
        for kind in ParticleKind::ALL {
            let slot = &mut self.frames[kind.index()];
            match (kind.is_on(flags), *slot) {
                (true, None) => *slot = Some(0),
                (false, Some(_)) => *slot = None,
                _ => {}
            }
        }
    }

    pub(crate) fn advance(&mut self) {
        for f in self.frames.iter_mut().flatten() {
            *f = f.wrapping_add(1);
        }
    }

    pub(crate) fn frame(&self, kind: ParticleKind) -> Option<u32> {
        self.frames[kind.index()]
    }

    pub(crate) fn layout(&self, out: &mut Vec<ParticleSprite>) {
        out.clear();
        for kind in ParticleKind::ALL {
            if let Some(frame) = self.frame(kind) {
                layout_kind(kind, frame, out);
            }
        }
    }
}

/// Emitter pattern: `count` particles spawned `stagger` frames apart, each living `life` frames.
struct Pattern {
    count: u32,
    stagger: u32,
    life: u32,
}

impl Pattern {
    /// Age in [0, 1) of particle `i`, or `None` before it first spawns.
    fn age(&self, i: u32, frame: u32) -> Option<f32> {
        let start = i * self.stagger;
        if frame < start {
            return None;
        }
        Some(((frame - start) % self.life) as f32 / self.life as f32)
    }
}

fn layout_kind(kind: ParticleKind, frame: u32, out: &mut Vec<ParticleSprite>) {
    let mut push = |offset: Vec2, alpha: f32| {
        out.push(ParticleSprite {
            kind,
            offset,
            alpha: alpha.clamp(0.0, 1.0),
        })
    };

    match kind {
        ParticleKind::Heart => {
            let p = Pattern {
                count: 3,
                stagger: 40,
                life: 120,
            };
            for i in 0..p.count {
                if let Some(t) = p.age(i, frame) {
                    let sway = (t * TAU * 2.0 + i as f32).sin() * 3.0;
                    let x = (i as f32 - 1.0) * 10.0 + sway;
                    push(Vec2::new(x, -24.0 - t * 20.0), 1.0 - t);
                }
            }
        }
        ParticleKind::Crumb => {
            let p = Pattern {
                count: 4,
                stagger: 16,
                life: 64,
            };
            for i in 0..p.count {
                if let Some(t) = p.age(i, frame) {
                    let x = (i as f32 - 1.5) * 4.0 + (t * TAU).sin();
                    push(Vec2::new(x, 6.0 + t * 10.0), 1.0 - t * t);
                }
            }
        }
        ParticleKind::Snooze => {
            let p = Pattern {
                count: 3,
                stagger: 60,
                life: 180,
            };
            for i in 0..p.count {
                if let Some(t) = p.age(i, frame) {
                    let wobble = (t * TAU).sin() * 2.0;
                    push(Vec2::new(12.0 + t * 14.0 + wobble, -20.0 - t * 18.0), 1.0 - t);
                }
            }
        }
        ParticleKind::Sparkle => {
            let n = 5;
            let f = frame as f32;
            for i in 0..n {
                let phase = i as f32 * TAU / n as f32;
                let angle = f * 0.04 + phase;
                let radius = 26.0 + (f * 0.05 + i as f32).sin() * 3.0;
                let twinkle = 0.5 + 0.5 * (f * 0.1 + i as f32 * 1.3).sin().abs();
                push(Vec2::new(angle.cos() * radius, angle.sin() * radius * 0.6), twinkle);
            }
        }
        ParticleKind::Raindrop => {
            let p = Pattern {
                count: 3,
                stagger: 30,
                life: 90,
            };
            for i in 0..p.count {
                if let Some(t) = p.age(i, frame) {
                    push(Vec2::new((i as f32 - 1.0) * 8.0, -30.0 + t * 20.0), 1.0 - t);
                }
            }
        }
    }
}
