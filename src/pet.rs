use crate::behavior::{BehaviorMachine, BehaviorState, Direction, ParticleFlags, World};
use crate::color::PetColor;
use crate::events::{Outbox, PetEvent};
use crate::movement::Planner;
use crate::needs::{Mood, Needs, Rules, Stats};
use crate::snapshot::{reconcile, CatchUp, Snapshot, SNAPSHOT_VERSION};
use chrono::{DateTime, Utc};
use glam::Vec2;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// The pointer only draws the pet's attention inside this radius.
pub(crate) const FOLLOW_RADIUS: f32 = 120.0;

/// External requests. The only way anything outside the simulation mutates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Feed,
    Play,
    Pet,
    Sleep,
    SetColor(String),
}

/// Session options that the save file also remembers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Preferences {
    pub(crate) speed_multiplier: f32,
    pub(crate) walk_enabled: bool,
    pub(crate) particles_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            walk_enabled: true,
            particles_enabled: true,
        }
    }
}

/// All simulation state for one companion.
pub(crate) struct Pet {
    needs: Needs,
    stats: Stats,
    machine: BehaviorMachine,
    planner: Planner,
    rng: SmallRng,
    rules: Rules,
    color: PetColor,
    walk_enabled: bool,
    window_position: Option<Vec2>,
    /// Pointer offset from the anchor, in pet units.
    pointer: Option<Vec2>,
    outbox: Outbox,
}

impl Pet {
    pub(crate) fn new(seed: u64, rules: Rules, prefs: Preferences) -> Self {
        Self {
            needs: Needs::default(),
            stats: Stats::default(),
            machine: BehaviorMachine::new(prefs.particles_enabled),
            planner: Planner::new(Vec2::ZERO, prefs.speed_multiplier),
            rng: SmallRng::seed_from_u64(seed),
            rules,
            color: PetColor::default(),
            walk_enabled: prefs.walk_enabled,
            window_position: None,
            pointer: None,
            outbox: Outbox::default(),
        }
    }

    /// Rebuild from a save and apply the offline catch-up once.
    pub(crate) fn restore(
        snap: &Snapshot,
        now: DateTime<Utc>,
        seed: u64,
        rules: Rules,
    ) -> (Self, Option<CatchUp>) {
        let mut needs = snap.needs();
        let mut stats = snap.stats();
        let catch_up = reconcile(&mut needs, &mut stats, snap.last_save_time, now);
        if let Some(c) = &catch_up {
            log::info!(
                "away for {:.1} min: hunger {:+.1}, energy {:+.1}, happiness {:+.1}",
                c.minutes,
                c.hunger,
                c.energy,
                c.happiness
            );
        }

        let pet = Self {
            needs,
            stats,
            machine: BehaviorMachine::new(snap.particles_enabled),
            planner: Planner::new(snap.position, snap.speed_multiplier),
            rng: SmallRng::seed_from_u64(seed),
            rules,
            color: snap.color,
            walk_enabled: snap.walk_enabled,
            window_position: snap.window_position,
            pointer: None,
            outbox: Outbox::default(),
        };
        (pet, catch_up)
    }

    pub(crate) fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            happiness: self.needs.happiness(),
            energy: self.needs.energy(),
            hunger: self.needs.hunger(),
            times_fed: self.stats.times_fed,
            times_played: self.stats.times_played,
            times_petted: self.stats.times_petted,
            age_minutes: self.stats.age_minutes,
            last_save_time: now,
            color: self.color,
            speed_multiplier: self.planner.speed_multiplier(),
            walk_enabled: self.walk_enabled,
            particles_enabled: self.machine.particles_enabled(),
            window_position: self.window_position,
            position: self.planner.position(),
        }
    }

    /// Returns whether the command was accepted.
    pub(crate) fn command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Feed => self.publishing(|pet| {
                let (machine, mut world, out) = pet.split();
                machine.feed(&mut world, out)
            }),
            Command::Play => self.publishing(|pet| {
                let (machine, mut world, out) = pet.split();
                machine.play(&mut world, out)
            }),
            Command::Pet => self.publishing(|pet| {
                let (machine, mut world, out) = pet.split();
                machine.pet(&mut world, out)
            }),
            Command::Sleep => self.machine.sleep(&mut self.outbox),
            Command::SetColor(hex) => match hex.parse::<PetColor>() {
                Ok(color) => {
                    if color != self.color {
                        self.color = color;
                        self.outbox.push(PetEvent::ColorChanged(color));
                    }
                    true
                }
                Err(e) => {
                    log::debug!("ignoring color command: {e}");
                    false
                }
            },
        }
    }

    /// One 100 ms behaviour tick.
    pub(crate) fn behavior_tick(&mut self, dt_secs: f32) {
        self.publishing(|pet| {
            let (machine, mut world, out) = pet.split();
            machine.tick(&mut world, dt_secs, out);
        });
    }

    /// One passive-decay tick covering `elapsed_secs` of wall time.
    pub(crate) fn decay_tick(&mut self, elapsed_secs: f32) {
        self.publishing(|pet| {
            pet.needs.apply_passive_decay(elapsed_secs, &pet.rules);
            if pet.machine.state() != BehaviorState::Sleeping {
                pet.needs.drain_awake(elapsed_secs, &pet.rules);
            }
            pet.stats.age_minutes += f64::from(elapsed_secs.max(0.0)) / 60.0;
        });
    }

    /// Latest pointer offset from the anchor, `None` when off-surface.
    pub(crate) fn observe_pointer(&mut self, offset: Option<Vec2>) {
        self.pointer = offset.filter(|p| p.is_finite());
    }

    pub(crate) fn set_window_position(&mut self, anchor: Vec2) {
        if anchor.is_finite() {
            self.window_position = Some(anchor);
        }
    }

    pub(crate) fn set_speed_multiplier(&mut self, m: f32) {
        self.planner.set_speed_multiplier(m);
    }

    pub(crate) fn set_walk_enabled(&mut self, enabled: bool) {
        self.walk_enabled = enabled;
        if !enabled {
            self.machine.halt(&mut self.planner, &mut self.outbox);
        }
    }

    pub(crate) fn set_particles_enabled(&mut self, enabled: bool) {
        self.machine
            .set_particles_enabled(enabled, &mut self.outbox);
    }

    pub(crate) fn needs(&self) -> Needs {
        self.needs
    }

    pub(crate) fn stats(&self) -> Stats {
        self.stats
    }

    pub(crate) fn mood(&self) -> Mood {
        self.needs.mood()
    }

    pub(crate) fn state(&self) -> BehaviorState {
        self.machine.state()
    }

    pub(crate) fn direction(&self) -> Direction {
        self.machine.direction()
    }

    pub(crate) fn particles(&self) -> ParticleFlags {
        self.machine.particles()
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.planner.position()
    }

    pub(crate) fn color(&self) -> PetColor {
        self.color
    }

    #[cfg(test)]
    pub(crate) fn walk_enabled(&self) -> bool {
        self.walk_enabled
    }

    #[cfg(test)]
    pub(crate) fn particles_enabled(&self) -> bool {
        self.machine.particles_enabled()
    }

    #[cfg(test)]
    pub(crate) fn speed_multiplier(&self) -> f32 {
        self.planner.speed_multiplier()
    }

    #[cfg(test)]
    pub(crate) fn window_position(&self) -> Option<Vec2> {
        self.window_position
    }

    pub(crate) fn take_events(&mut self) -> Vec<PetEvent> {
        self.outbox.take()
    }

    fn split(&mut self) -> (&mut BehaviorMachine, World<'_, SmallRng>, &mut Outbox) {
        let pointer = self
            .pointer
            .filter(|p| p.length() <= FOLLOW_RADIUS);
        let world = World {
            needs: &mut self.needs,
            stats: &mut self.stats,
            planner: &mut self.planner,
            rng: &mut self.rng,
            rules: &self.rules,
            walk_enabled: self.walk_enabled,
            pointer,
        };
        (&mut self.machine, world, &mut self.outbox)
    }

    /// Run `f`, then publish whatever it did to needs, mood and stats.
    fn publishing<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let needs = self.needs;
        let stats = self.stats;
        let result = f(self);

        if self.needs != needs {
            let (from, to) = (needs.mood(), self.needs.mood());
            if from != to {
                self.outbox.push(PetEvent::MoodChanged { from, to });
            }
            self.outbox.push(PetEvent::NeedsChanged(self.needs));
        }
        if self.stats != stats {
            self.outbox.push(PetEvent::StatsChanged(self.stats));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::EAT_TICKS;
    use crate::needs::{NEED_MAX, NEED_MIN};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use rand::Rng;

    fn pet_with(happiness: f32, energy: f32, hunger: f32) -> Pet {
        let mut pet = Pet::new(1, Rules::default(), Preferences::default());
        pet.needs = Needs::new(happiness, energy, hunger);
        pet
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn feeding_a_neutral_pet() {
        let mut pet = pet_with(50.0, 80.0, 50.0);
        pet.set_walk_enabled(false);
        assert!(pet.command(Command::Feed));
        assert_eq!(pet.needs().hunger(), 75.0);
        assert_eq!(pet.needs().happiness(), 55.0);
        assert_eq!(pet.state(), BehaviorState::Eating);

        let events = pet.take_events();
        assert_eq!(
            events,
            vec![
                PetEvent::StateChanged {
                    from: BehaviorState::Idle,
                    to: BehaviorState::Eating
                },
                PetEvent::ParticlesChanged(ParticleFlags {
                    food: true,
                    ..ParticleFlags::NONE
                }),
                PetEvent::MoodChanged {
                    from: Mood::Neutral,
                    to: Mood::Content
                },
                PetEvent::NeedsChanged(pet.needs()),
                PetEvent::StatsChanged(pet.stats()),
            ]
        );

        for _ in 0..EAT_TICKS {
            pet.behavior_tick(0.1);
        }
        assert_eq!(pet.state(), BehaviorState::Idle);
    }

    #[test]
    fn tired_pet_refuses_to_play() {
        let mut pet = pet_with(50.0, 5.0, 50.0);
        assert!(!pet.command(Command::Play));
        assert_eq!(pet.needs(), Needs::new(50.0, 5.0, 50.0));
        assert_eq!(pet.stats().times_played, 0);
        assert!(pet.take_events().is_empty());
    }

    #[test]
    fn bad_color_keeps_the_old_one() {
        let mut pet = Pet::new(1, Rules::default(), Preferences::default());
        assert!(!pet.command(Command::SetColor("chartreuse".into())));
        assert_eq!(pet.color(), PetColor::default());
        assert!(pet.take_events().is_empty());

        assert!(pet.command(Command::SetColor("#FF8800".into())));
        assert_eq!(pet.color(), PetColor::rgb(0xFF, 0x88, 0x00));
        assert_eq!(
            pet.take_events(),
            vec![PetEvent::ColorChanged(PetColor::rgb(0xFF, 0x88, 0x00))]
        );
    }

    #[test]
    fn needs_stay_bounded_under_any_sequence() {
        let mut pet = Pet::new(9, Rules::default(), Preferences::default());
        let mut dice = SmallRng::seed_from_u64(3);
        for _ in 0..20_000 {
            match dice.gen_range(0..8) {
                0 => {
                    pet.command(Command::Feed);
                }
                1 => {
                    pet.command(Command::Play);
                }
                2 => {
                    pet.command(Command::Pet);
                }
                3 => {
                    pet.command(Command::Sleep);
                }
                4 => pet.decay_tick(dice.gen_range(0.0..600.0)),
                5 => pet.observe_pointer(Some(Vec2::new(
                    dice.gen_range(-200.0..200.0),
                    dice.gen_range(-200.0..200.0),
                ))),
                _ => pet.behavior_tick(0.1),
            }
            let n = pet.needs();
            for v in [n.happiness(), n.energy(), n.hunger()] {
                assert!((NEED_MIN..=NEED_MAX).contains(&v));
            }
            assert_eq!(pet.mood(), Mood::from_happiness(n.happiness()));
            let p = pet.position();
            assert!(p.x.abs() <= 20.0 && p.y.abs() <= 10.0);
        }
    }

    #[test]
    fn same_seed_same_pet() {
        fn run(seed: u64) -> (Needs, Vec2, BehaviorState) {
            let mut pet = Pet::new(seed, Rules::default(), Preferences::default());
            for i in 0..4_000 {
                if i % 500 == 0 {
                    pet.command(Command::Play);
                }
                if i % 300 == 0 {
                    pet.decay_tick(30.0);
                }
                pet.behavior_tick(0.1);
            }
            (pet.needs(), pet.position(), pet.state())
        }
        assert_eq!(run(77), run(77));
    }

    #[test]
    fn decay_tick_ages_and_drains_awake_pet() {
        let mut pet = pet_with(80.0, 80.0, 80.0);
        pet.decay_tick(30.0);
        assert!((pet.stats().age_minutes - 0.5).abs() < 1e-9);
        assert!((pet.needs().energy() - 79.5).abs() < 1e-4);
        assert!((pet.needs().hunger() - 79.0).abs() < 1e-4);

        pet.command(Command::Sleep);
        pet.decay_tick(30.0);
        assert!((pet.needs().energy() - 79.5).abs() < 1e-4);
    }

    #[test]
    fn pointer_outside_radius_is_ignored() {
        let mut pet = pet_with(80.0, 80.0, 80.0);
        pet.observe_pointer(Some(Vec2::new(FOLLOW_RADIUS + 1.0, 0.0)));
        for _ in 0..5_000 {
            pet.behavior_tick(0.1);
            assert_ne!(pet.state(), BehaviorState::FollowingMouse);
        }
    }

    #[test]
    fn snapshot_round_trip_with_catch_up() {
        let mut pet = pet_with(70.0, 60.0, 80.0);
        pet.command(Command::SetColor("#B19CD9".into()));
        pet.set_speed_multiplier(2.0);
        pet.set_window_position(Vec2::new(300.0, 200.0));
        let snap = pet.snapshot(t0());

        let later = t0() + ChronoDuration::minutes(20);
        let (restored, catch_up) = Pet::restore(&snap, later, 5, Rules::default());
        let catch_up = catch_up.unwrap();
        assert!((catch_up.minutes - 20.0).abs() < 1e-9);
        assert!((restored.needs().hunger() - 70.0).abs() < 1e-3);
        assert!((restored.needs().energy() - 66.0).abs() < 1e-3);
        assert!((restored.needs().happiness() - 66.0).abs() < 1e-3);
        assert_eq!(restored.color(), PetColor::rgb(0xB1, 0x9C, 0xD9));
        assert_eq!(restored.speed_multiplier(), 2.0);
        assert_eq!(restored.window_position(), Some(Vec2::new(300.0, 200.0)));
        assert_eq!(restored.state(), BehaviorState::Idle);
    }

    #[test]
    fn quick_restart_skips_catch_up() {
        let pet = pet_with(70.0, 60.0, 80.0);
        let snap = pet.snapshot(t0());
        let (restored, catch_up) =
            Pet::restore(&snap, t0() + ChronoDuration::seconds(30), 5, Rules::default());
        assert!(catch_up.is_none());
        assert_eq!(restored.needs(), pet.needs());
    }
}
