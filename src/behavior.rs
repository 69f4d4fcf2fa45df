use crate::events::{Outbox, PetEvent};
use crate::movement::Planner;
use crate::needs::{Mood, Needs, Rules, Stats, NEED_MAX};
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

// Durations in behaviour ticks (100 ms each).
pub(crate) const EAT_TICKS: u32 = 30;
pub(crate) const PLAY_TICKS: u32 = 50;
pub(crate) const PET_TICKS: u32 = 20;
pub(crate) const SLEEP_TICKS: u32 = 100;
pub(crate) const SAD_TICKS: u32 = 30;
pub(crate) const CELEBRATE_TICKS: u32 = 30;
pub(crate) const FOLLOW_TICKS: u32 = 40;

/// Idle ticks before the pet considers wandering off.
const WALK_IDLE_GATE: u32 = 20;
const WALK_CHANCE: f64 = 0.03;
const AUTO_SLEEP_CHANCE: f64 = 0.05;
const AUTO_SLEEP_BELOW_ENERGY: f32 = 15.0;
const SAD_BELOW_HAPPINESS: f32 = 20.0;
const CELEBRATE_CHANCE: f64 = 0.01;
const FOLLOW_CHANCE: f64 = 0.02;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) enum BehaviorState {
    #[default]
    Idle,
    Walking,
    Sleeping,
    Eating,
    Playing,
    BeingPetted,
    Celebrating,
    Sad,
    FollowingMouse,
}

impl BehaviorState {
    /// States that run per-tick behaviour of their own.
    pub(crate) fn is_steady(self) -> bool {
        matches!(
            self,
            BehaviorState::Idle
                | BehaviorState::Walking
                | BehaviorState::Sleeping
                | BehaviorState::FollowingMouse
        )
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            BehaviorState::Idle => "idle",
            BehaviorState::Walking => "walking",
            BehaviorState::Sleeping => "sleeping",
            BehaviorState::Eating => "eating",
            BehaviorState::Playing => "playing",
            BehaviorState::BeingPetted => "being petted",
            BehaviorState::Celebrating => "celebrating",
            BehaviorState::Sad => "sad",
            BehaviorState::FollowingMouse => "following",
        }
    }

    fn particles(self) -> ParticleFlags {
        let mut f = ParticleFlags::NONE;
        match self {
            BehaviorState::BeingPetted => f.hearts = true,
            BehaviorState::Eating => f.food = true,
            BehaviorState::Sleeping => f.sleep = true,
            BehaviorState::Playing | BehaviorState::Celebrating => f.sparkles = true,
            BehaviorState::Sad => f.rain = true,
            BehaviorState::Idle | BehaviorState::Walking | BehaviorState::FollowingMouse => {}
        }
        f
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Direction {
    Left,
    #[default]
    Right,
}

/// Which particle effects are showing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ParticleFlags {
    pub(crate) hearts: bool,
    pub(crate) food: bool,
    pub(crate) sleep: bool,
    pub(crate) sparkles: bool,
    pub(crate) rain: bool,
}

impl ParticleFlags {
    pub(crate) const NONE: ParticleFlags = ParticleFlags {
        hearts: false,
        food: false,
        sleep: false,
        sparkles: false,
        rain: false,
    };

    #[cfg(test)]
    pub(crate) fn any(&self) -> bool {
        *self != Self::NONE
    }
}

/// Everything a behaviour tick or command may touch besides the machine itself.
pub(crate) struct World<'a, R: Rng> {
    pub(crate) needs: &'a mut Needs,
    pub(crate) stats: &'a mut Stats,
    pub(crate) planner: &'a mut Planner,
    pub(crate) rng: &'a mut R,
    pub(crate) rules: &'a Rules,
    pub(crate) walk_enabled: bool,
    /// Pointer offset from the anchor while it is close enough to follow.
    pub(crate) pointer: Option<Vec2>,
}

#[derive(Clone, Debug)]
pub(crate) struct BehaviorMachine {
    state: BehaviorState,
    /// Behaviour ticks left before returning to idle; zero means no countdown.
    remaining: u32,
    idle_counter: u32,
    direction: Direction,
    particles: ParticleFlags,
    particles_enabled: bool,
}

impl BehaviorMachine {
    pub(crate) fn new(particles_enabled: bool) -> Self {
        Self {
            state: BehaviorState::Idle,
            remaining: 0,
            idle_counter: 0,
            direction: Direction::default(),
            particles: ParticleFlags::NONE,
            particles_enabled,
        }
    }

    pub(crate) fn state(&self) -> BehaviorState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> u32 {
        self.remaining
    }

    #[cfg(test)]
    pub(crate) fn idle_counter(&self) -> u32 {
        self.idle_counter
    }

    pub(crate) fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn particles(&self) -> ParticleFlags {
        self.particles
    }

    pub(crate) fn particles_enabled(&self) -> bool {
        self.particles_enabled
    }

    pub(crate) fn set_particles_enabled(&mut self, enabled: bool, out: &mut Outbox) {
        self.particles_enabled = enabled;
        let flags = if enabled {
            self.state.particles()
        } else {
            ParticleFlags::NONE
        };
        self.set_particles(flags, out);
    }

    fn set_particles(&mut self, flags: ParticleFlags, out: &mut Outbox) {
        if flags != self.particles {
            self.particles = flags;
            out.push(PetEvent::ParticlesChanged(flags));
        }
    }

    fn enter(&mut self, to: BehaviorState, duration: u32, out: &mut Outbox) {
        let from = self.state;
        self.state = to;
        self.remaining = duration;
        if to == BehaviorState::Idle {
            self.idle_counter = 0;
        }
        if from != to {
            out.push(PetEvent::StateChanged { from, to });
        }
        let flags = if self.particles_enabled {
            to.particles()
        } else {
            ParticleFlags::NONE
        };
        self.set_particles(flags, out);
    }

    fn face(&mut self, delta: Vec2) {
        if delta.x > 0.0 {
            self.direction = Direction::Right;
        } else if delta.x < 0.0 {
            self.direction = Direction::Left;
        }
    }

    pub(crate) fn feed<R: Rng>(&mut self, world: &mut World<'_, R>, out: &mut Outbox) -> bool {
        world.needs.apply_feed(world.stats);
        self.enter(BehaviorState::Eating, EAT_TICKS, out);
        true
    }

    pub(crate) fn play<R: Rng>(&mut self, world: &mut World<'_, R>, out: &mut Outbox) -> bool {
        if !world.needs.apply_play(world.stats) {
            return false;
        }
        self.enter(BehaviorState::Playing, PLAY_TICKS, out);
        true
    }

    pub(crate) fn pet<R: Rng>(&mut self, world: &mut World<'_, R>, out: &mut Outbox) -> bool {
        world.needs.apply_pet(world.stats);
        self.enter(BehaviorState::BeingPetted, PET_TICKS, out);
        true
    }

    /// Toggle: wakes a sleeping pet, otherwise puts it to bed.
    pub(crate) fn sleep(&mut self, out: &mut Outbox) -> bool {
        if self.state == BehaviorState::Sleeping {
            self.enter(BehaviorState::Idle, 0, out);
        } else {
            self.enter(BehaviorState::Sleeping, SLEEP_TICKS, out);
        }
        true
    }

    /// Abandon a walk or a follow where the pet stands.
    pub(crate) fn halt(&mut self, planner: &mut Planner, out: &mut Outbox) {
        if matches!(
            self.state,
            BehaviorState::Walking | BehaviorState::FollowingMouse
        ) {
            planner.clear_target();
            self.enter(BehaviorState::Idle, 0, out);
        }
    }

    /// One behaviour tick: count down, then run the steady state's own behaviour.
    pub(crate) fn tick<R: Rng>(
        &mut self,
        world: &mut World<'_, R>,
        dt_secs: f32,
        out: &mut Outbox,
    ) {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.enter(BehaviorState::Idle, 0, out);
            }
        }

        if !self.state.is_steady() {
            return;
        }

        match self.state {
            BehaviorState::Idle => self.idle_step(world, out),
            BehaviorState::Walking => {
                let step = world.planner.step();
                if step.arrived {
                    self.enter(BehaviorState::Idle, 0, out);
                } else {
                    self.face(step.delta);
                }
            }
            BehaviorState::FollowingMouse => {
                if let Some(pointer) = world.pointer {
                    world.planner.set_target(pointer);
                    let step = world.planner.step();
                    self.face(step.delta);
                }
            }
            BehaviorState::Sleeping => {
                world.needs.restore_from_sleep(dt_secs, world.rules);
                if world.needs.energy() >= NEED_MAX {
                    self.enter(BehaviorState::Idle, 0, out);
                }
            }
            _ => {}
        }
    }

    fn idle_step<R: Rng>(&mut self, world: &mut World<'_, R>, out: &mut Outbox) {
        self.idle_counter = self.idle_counter.saturating_add(1);
        let needs = *world.needs;

        if needs.energy() < AUTO_SLEEP_BELOW_ENERGY && world.rng.gen_bool(AUTO_SLEEP_CHANCE) {
            self.enter(BehaviorState::Sleeping, SLEEP_TICKS, out);
            return;
        }

        if needs.happiness() < SAD_BELOW_HAPPINESS {
            self.enter(BehaviorState::Sad, SAD_TICKS, out);
            return;
        }

        if world.walk_enabled
            && self.idle_counter > WALK_IDLE_GATE
            && world.rng.gen_bool(WALK_CHANCE)
        {
            let target = world.planner.plan_walk(world.rng);
            self.face(target - world.planner.position());
            self.enter(BehaviorState::Walking, 0, out);
            return;
        }

        let mood = needs.mood();
        if mood == Mood::Ecstatic && world.rng.gen_bool(CELEBRATE_CHANCE) {
            self.enter(BehaviorState::Celebrating, CELEBRATE_TICKS, out);
            return;
        }

        if world.walk_enabled
            && mood >= Mood::Content
            && world.pointer.is_some()
            && world.rng.gen_bool(FOLLOW_CHANCE)
        {
            self.enter(BehaviorState::FollowingMouse, FOLLOW_TICKS, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::ARRIVAL_RADIUS;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    struct Rig {
        machine: BehaviorMachine,
        needs: Needs,
        stats: Stats,
        planner: Planner,
        rng: SmallRng,
        rules: Rules,
        walk_enabled: bool,
        pointer: Option<Vec2>,
        out: Outbox,
    }

    impl Rig {
        fn new(needs: Needs) -> Self {
            Self {
                machine: BehaviorMachine::new(true),
                needs,
                stats: Stats::default(),
                planner: Planner::new(Vec2::ZERO, 1.0),
                rng: SmallRng::seed_from_u64(42),
                rules: Rules::default(),
                walk_enabled: true,
                pointer: None,
                out: Outbox::default(),
            }
        }

        fn with<T>(&mut self, f: impl FnOnce(&mut BehaviorMachine, &mut World<'_, SmallRng>, &mut Outbox) -> T) -> T {
            let mut world = World {
                needs: &mut self.needs,
                stats: &mut self.stats,
                planner: &mut self.planner,
                rng: &mut self.rng,
                rules: &self.rules,
                walk_enabled: self.walk_enabled,
                pointer: self.pointer,
            };
            f(&mut self.machine, &mut world, &mut self.out)
        }

        fn tick(&mut self) {
            self.with(|m, w, o| m.tick(w, 0.1, o));
        }

        fn state(&self) -> BehaviorState {
            self.machine.state()
        }
    }

    #[test]
    fn feed_eats_for_thirty_ticks() {
        let mut rig = Rig::new(Needs::new(50.0, 80.0, 50.0));
        rig.walk_enabled = false;
        assert!(rig.with(|m, w, o| m.feed(w, o)));
        assert_eq!(rig.state(), BehaviorState::Eating);
        assert_eq!(rig.needs.hunger(), 75.0);
        assert_eq!(rig.needs.happiness(), 55.0);
        assert_eq!(rig.stats.times_fed, 1);
        assert!(rig.machine.particles().food);

        for _ in 0..29 {
            rig.tick();
            assert_eq!(rig.state(), BehaviorState::Eating);
        }
        rig.tick();
        assert_eq!(rig.state(), BehaviorState::Idle);
        assert!(!rig.machine.particles().any());
    }

    #[test]
    fn play_refused_when_exhausted() {
        let mut rig = Rig::new(Needs::new(50.0, 5.0, 50.0));
        assert!(!rig.with(|m, w, o| m.play(w, o)));
        assert_eq!(rig.state(), BehaviorState::Idle);
        assert_eq!(rig.stats.times_played, 0);
        assert!(rig.out.take().is_empty());
    }

    #[test]
    fn commands_preempt_transient_states() {
        let mut rig = Rig::new(Needs::new(50.0, 80.0, 50.0));
        rig.with(|m, w, o| m.play(w, o));
        rig.tick();
        rig.with(|m, w, o| m.pet(w, o));
        assert_eq!(rig.state(), BehaviorState::BeingPetted);
        assert_eq!(rig.machine.remaining(), PET_TICKS);
        assert!(rig.machine.particles().hearts);
        assert!(!rig.machine.particles().sparkles);
    }

    #[test]
    fn sleep_toggles_and_wakes() {
        let mut rig = Rig::new(Needs::new(50.0, 50.0, 50.0));
        rig.with(|m, _, o| m.sleep(o));
        assert_eq!(rig.state(), BehaviorState::Sleeping);
        assert!(rig.machine.particles().sleep);
        rig.tick();
        assert!(rig.needs.energy() > 50.0);
        rig.with(|m, _, o| m.sleep(o));
        assert_eq!(rig.state(), BehaviorState::Idle);
        assert!(!rig.machine.particles().sleep);
    }

    #[test]
    fn sleep_ends_when_energy_full() {
        let mut rig = Rig::new(Needs::new(50.0, 99.0, 90.0));
        rig.with(|m, _, o| m.sleep(o));
        for _ in 0..10 {
            rig.tick();
        }
        assert_eq!(rig.state(), BehaviorState::Idle);
        assert_eq!(rig.needs.energy(), NEED_MAX);
    }

    #[test]
    fn sleep_ends_after_countdown() {
        let mut rig = Rig::new(Needs::new(50.0, 10.0, 90.0));
        rig.walk_enabled = false;
        rig.with(|m, _, o| m.sleep(o));
        for _ in 0..SLEEP_TICKS {
            rig.tick();
        }
        assert_ne!(rig.state(), BehaviorState::Sleeping);
        assert!(rig.needs.energy() < NEED_MAX);
    }

    #[test]
    fn unhappy_pet_sulks() {
        let mut rig = Rig::new(Needs::new(15.0, 80.0, 80.0));
        rig.tick();
        assert_eq!(rig.state(), BehaviorState::Sad);
        assert!(rig.machine.particles().rain);
        for _ in 0..SAD_TICKS - 1 {
            rig.tick();
        }
        assert_eq!(rig.state(), BehaviorState::Sad);
        rig.tick();
        // Back to idle, then straight into another sulk in the same tick.
        assert_eq!(rig.state(), BehaviorState::Sad);
        let transitions = rig
            .out
            .take()
            .into_iter()
            .filter(|e| matches!(e, PetEvent::StateChanged { .. }))
            .count();
        assert_eq!(transitions, 3);
    }

    #[test]
    fn sleep_command_leaves_sad() {
        let mut rig = Rig::new(Needs::new(15.0, 80.0, 80.0));
        rig.tick();
        assert_eq!(rig.state(), BehaviorState::Sad);
        rig.with(|m, _, o| m.sleep(o));
        assert_eq!(rig.state(), BehaviorState::Sleeping);
    }

    #[test]
    fn no_walk_before_idle_gate() {
        let mut rig = Rig::new(Needs::new(60.0, 80.0, 80.0));
        for _ in 0..WALK_IDLE_GATE {
            rig.tick();
            assert_eq!(rig.state(), BehaviorState::Idle);
        }
    }

    #[test]
    fn idle_pet_eventually_walks_and_returns() {
        let mut rig = Rig::new(Needs::new(60.0, 80.0, 80.0));
        let mut walked = false;
        for _ in 0..5_000 {
            rig.tick();
            if rig.state() == BehaviorState::Walking {
                walked = true;
                assert!(rig.planner.target().is_some() || rig.planner.position() != Vec2::ZERO);
            }
            if walked && rig.state() == BehaviorState::Idle {
                assert_eq!(rig.machine.idle_counter(), 0);
                return;
            }
        }
        panic!("pet never finished a walk");
    }

    #[test]
    fn walking_disabled_keeps_pet_home() {
        let mut rig = Rig::new(Needs::new(60.0, 80.0, 80.0));
        rig.walk_enabled = false;
        for _ in 0..5_000 {
            rig.tick();
            assert_ne!(rig.state(), BehaviorState::Walking);
        }
        assert_eq!(rig.planner.position(), Vec2::ZERO);
    }

    #[test]
    fn exhausted_pet_falls_asleep() {
        let mut rig = Rig::new(Needs::new(60.0, 5.0, 80.0));
        rig.walk_enabled = false;
        for _ in 0..1_000 {
            rig.tick();
            if rig.state() == BehaviorState::Sleeping {
                return;
            }
        }
        panic!("exhausted pet never slept");
    }

    #[test]
    fn ecstatic_pet_celebrates() {
        let mut rig = Rig::new(Needs::new(100.0, 80.0, 100.0));
        rig.walk_enabled = false;
        for _ in 0..5_000 {
            rig.tick();
            if rig.state() == BehaviorState::Celebrating {
                assert!(rig.machine.particles().sparkles);
                return;
            }
        }
        panic!("ecstatic pet never celebrated");
    }

    #[test]
    fn follows_nearby_pointer() {
        let mut rig = Rig::new(Needs::new(60.0, 80.0, 80.0));
        rig.pointer = Some(Vec2::new(-40.0, 0.0));
        for _ in 0..5_000 {
            rig.tick();
            if rig.state() == BehaviorState::FollowingMouse {
                break;
            }
        }
        assert_eq!(rig.state(), BehaviorState::FollowingMouse);

        // The pointer sits outside the roaming box, so the pet heads for the nearest edge.
        let goal = Vec2::new(-20.0, 0.0);
        let before = rig.planner.position();
        rig.tick();
        let after = rig.planner.position();
        if before.distance(goal) >= ARRIVAL_RADIUS {
            assert!(after.distance(goal) < before.distance(goal));
        }
        if before.x > goal.x + 1.0 {
            assert_eq!(rig.machine.direction(), Direction::Left);
        }
    }

    #[test]
    fn halt_stops_a_walk() {
        let mut rig = Rig::new(Needs::new(60.0, 80.0, 80.0));
        for _ in 0..5_000 {
            rig.tick();
            if rig.state() == BehaviorState::Walking {
                break;
            }
        }
        assert_eq!(rig.state(), BehaviorState::Walking);
        rig.machine.halt(&mut rig.planner, &mut rig.out);
        assert_eq!(rig.state(), BehaviorState::Idle);
        assert!(rig.planner.target().is_none());

        // Nothing to halt while idle.
        rig.out.take();
        rig.machine.halt(&mut rig.planner, &mut rig.out);
        assert!(rig.out.take().is_empty());
    }

    #[test]
    fn same_seed_same_story() {
        fn run() -> Vec<BehaviorState> {
            let mut rig = Rig::new(Needs::new(95.0, 12.0, 80.0));
            let mut seen = Vec::new();
            for i in 0..3_000 {
                if i % 700 == 0 {
                    rig.with(|m, w, o| m.feed(w, o));
                }
                rig.tick();
                seen.push(rig.state());
            }
            seen
        }
        assert_eq!(run(), run());
    }

    #[test]
    fn particles_disabled_never_set_flags() {
        let mut rig = Rig::new(Needs::new(50.0, 80.0, 50.0));
        rig.machine = BehaviorMachine::new(false);
        rig.with(|m, w, o| m.feed(w, o));
        assert!(!rig.machine.particles().any());
        rig.with(|m, _, o| m.set_particles_enabled(true, o));
        assert!(rig.machine.particles().food);
    }
}
