use crate::animation::{AnimationDriver, Transform};
use crate::behavior::{BehaviorState, Direction, ParticleFlags};
use crate::color::PetColor;
use crate::events::{LogObserver, Observer};
use crate::needs::{Mood, Needs, Rules, Stats};
use crate::particles::ParticleSprite;
use crate::pet::{Command, Pet, Preferences};
use crate::snapshot::{CatchUp, SNAPSHOT_VERSION};
use crate::storage::Store;
use chrono::{DateTime, Utc};
use glam::Vec2;
use std::time::Duration;

pub(crate) const BEHAVIOR_TICK: Duration = Duration::from_millis(100);
pub(crate) const DECAY_TICK: Duration = Duration::from_secs(30);
pub(crate) const ANIMATION_TICK: Duration = Duration::from_micros(8_333);
/// Longest frame the clocks will catch up on; anything beyond is dropped.
pub(crate) const MAX_FRAME: Duration = Duration::from_millis(250);

/// Fixed-step accumulator for one clock.
#[derive(Clone, Debug)]
pub(crate) struct Cadence {
    step: Duration,
    accum: Duration,
}

impl Cadence {
    pub(crate) fn new(step: Duration) -> Self {
        Self {
            step,
            accum: Duration::ZERO,
        }
    }

    /// Add frame time and return how many whole steps are due.
    pub(crate) fn push(&mut self, dt: Duration) -> u32 {
        self.accum = self.accum.saturating_add(dt);
        let mut due = 0;
        while self.accum >= self.step && !self.step.is_zero() {
            self.accum = self.accum.saturating_sub(self.step);
            due += 1;
        }
        due
    }

    pub(crate) fn step(&self) -> Duration {
        self.step
    }
}

/// What the host reports each frame, in screen pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Surface {
    pub(crate) anchor: Vec2,
    pub(crate) pointer: Option<Vec2>,
}

/// Read-only view of everything the host draws.
#[derive(Debug)]
pub(crate) struct Frame<'a> {
    pub(crate) state: BehaviorState,
    pub(crate) mood: Mood,
    pub(crate) needs: Needs,
    pub(crate) stats: Stats,
    pub(crate) position: Vec2,
    pub(crate) direction: Direction,
    pub(crate) flags: ParticleFlags,
    pub(crate) color: PetColor,
    pub(crate) pupil: Vec2,
    pub(crate) transform: Transform,
    pub(crate) particles: &'a [ParticleSprite],
}

#[derive(Clone, Debug)]
pub(crate) struct RuntimeOptions {
    pub(crate) seed: u64,
    pub(crate) rules: Rules,
    pub(crate) speed_multiplier: Option<f32>,
    pub(crate) walk_enabled: Option<bool>,
    pub(crate) particles_enabled: Option<bool>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            seed: 0xC0FFEE,
            rules: Rules::default(),
            speed_multiplier: None,
            walk_enabled: None,
            particles_enabled: None,
        }
    }
}

/// Single owner of the simulation. The host loop calls in; nothing calls out.
pub(crate) struct Runtime<S: Store> {
    store: S,
    pet: Pet,
    driver: AnimationDriver,
    observers: Vec<Box<dyn Observer>>,
    behavior: Cadence,
    decay: Cadence,
    animation: Cadence,
    catch_up: Option<CatchUp>,
    eye: Vec2,
    stopped: bool,
}

impl<S: Store> Runtime<S> {
    /// Load (or start fresh), reconcile, then flush the result straight back.
    pub(crate) fn open(store: S, options: RuntimeOptions, now: DateTime<Utc>) -> Self {
        let fresh = || Pet::new(options.seed, options.rules, Preferences::default());
        let (mut pet, catch_up) = match store.load() {
            Ok(Some(snap)) => {
                if snap.version > SNAPSHOT_VERSION {
                    log::warn!(
                        "save file is version {}, newer than {}; loading what we understand",
                        snap.version,
                        SNAPSHOT_VERSION
                    );
                }
                Pet::restore(&snap, now, options.seed, options.rules)
            }
            Ok(None) => {
                log::info!("no saved pet, hatching a new one");
                (fresh(), None)
            }
            Err(e) => {
                log::warn!("could not load saved pet, starting fresh: {e}");
                (fresh(), None)
            }
        };

        if let Some(m) = options.speed_multiplier {
            pet.set_speed_multiplier(m);
        }
        if let Some(w) = options.walk_enabled {
            pet.set_walk_enabled(w);
        }
        if let Some(p) = options.particles_enabled {
            pet.set_particles_enabled(p);
        }
        // The driver starts from the settled state, so these are already reflected.
        pet.take_events();

        let driver = AnimationDriver::new(pet.state(), pet.particles());
        let mut rt = Self {
            store,
            pet,
            driver,
            observers: vec![Box::new(LogObserver)],
            behavior: Cadence::new(BEHAVIOR_TICK),
            decay: Cadence::new(DECAY_TICK),
            animation: Cadence::new(ANIMATION_TICK),
            catch_up,
            eye: Vec2::ZERO,
            stopped: false,
        };
        rt.save(now);
        rt
    }

    pub(crate) fn subscribe(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Apply a command; accepted commands are saved straight away.
    pub(crate) fn command(&mut self, cmd: Command) -> bool {
        if self.stopped {
            return false;
        }
        log::debug!("command {cmd:?}");
        let accepted = self.pet.command(cmd);
        self.dispatch();
        if accepted {
            self.save(Utc::now());
        }
        accepted
    }

    /// Run every clock forward by one host frame.
    pub(crate) fn advance(&mut self, dt: Duration, surface: &Surface) -> Frame<'_> {
        if !self.stopped {
            let dt = dt.min(MAX_FRAME);
            self.pet.set_window_position(surface.anchor);
            self.pet
                .observe_pointer(surface.pointer.map(|p| p - surface.anchor));

            for _ in 0..self.behavior.push(dt) {
                self.pet.behavior_tick(self.behavior.step().as_secs_f32());
                self.dispatch();
            }

            let decays = self.decay.push(dt);
            for _ in 0..decays {
                self.pet.decay_tick(self.decay.step().as_secs_f32());
                self.dispatch();
            }
            if decays > 0 {
                self.save(Utc::now());
            }

            self.eye = surface.anchor + self.pet.position();
            let step = self.animation.step().as_secs_f32();
            for _ in 0..self.animation.push(dt) {
                self.driver.tick(step, self.eye, surface.pointer);
            }
        }
        self.frame()
    }

    pub(crate) fn frame(&self) -> Frame<'_> {
        Frame {
            state: self.pet.state(),
            mood: self.pet.mood(),
            needs: self.pet.needs(),
            stats: self.pet.stats(),
            position: self.pet.position(),
            direction: self.pet.direction(),
            flags: self.pet.particles(),
            color: self.pet.color(),
            pupil: self.driver.pupil(),
            transform: self.driver.transform(),
            particles: self.driver.sprites(),
        }
    }

    /// What the offline catch-up did at open, if anything.
    pub(crate) fn catch_up(&self) -> Option<CatchUp> {
        self.catch_up
    }

    #[cfg(test)]
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Stop the clocks and flush once. Later calls do nothing.
    pub(crate) fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.save(Utc::now());
        log::info!("pet put away");
    }

    fn dispatch(&mut self) {
        for event in self.pet.take_events() {
            self.driver.notify(&event);
            for o in &mut self.observers {
                o.notify(&event);
            }
        }
    }

    fn save(&mut self, now: DateTime<Utc>) {
        if let Err(e) = self.store.save(&self.pet.snapshot(now)) {
            log::warn!("could not save pet: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PetEvent;
    use crate::snapshot::Snapshot;
    use crate::storage::MemoryStore;
    use chrono::Duration as ChronoDuration;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<PetEvent>>>);

    impl Observer for Recorder {
        fn notify(&mut self, event: &PetEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    fn quiet() -> RuntimeOptions {
        RuntimeOptions {
            walk_enabled: Some(false),
            ..RuntimeOptions::default()
        }
    }

    fn frame_time() -> Duration {
        Duration::from_millis(50)
    }

    #[test]
    fn cadence_counts_whole_steps() {
        let mut c = Cadence::new(Duration::from_millis(100));
        assert_eq!(c.push(Duration::from_millis(250)), 2);
        assert_eq!(c.push(Duration::from_millis(40)), 0);
        assert_eq!(c.push(Duration::from_millis(10)), 1);
    }

    #[test]
    fn fresh_store_opens_with_defaults_and_flushes() {
        let rt = Runtime::open(MemoryStore::default(), quiet(), Utc::now());
        assert_eq!(rt.store().saves, 1);
        assert!(rt.catch_up().is_none());
        let f = rt.frame();
        assert_eq!(f.state, BehaviorState::Idle);
        assert_eq!(f.needs, Needs::default());
        assert!(!rt.store().saved.as_ref().unwrap().walk_enabled);
    }

    #[test]
    fn unreadable_store_falls_back_to_defaults() {
        let store = MemoryStore {
            fail_load: true,
            ..MemoryStore::default()
        };
        let rt = Runtime::open(store, quiet(), Utc::now());
        assert_eq!(rt.frame().needs, Needs::default());
    }

    #[test]
    fn old_save_is_reconciled_once() {
        let now = Utc::now();
        let mut snap: Snapshot =
            serde_json::from_str(r#"{ "last_save_time": "2026-03-01T12:00:00Z" }"#).unwrap();
        snap.last_save_time = now - ChronoDuration::minutes(20);
        snap.happiness = 70.0;
        snap.energy = 60.0;
        snap.hunger = 80.0;
        let store = MemoryStore {
            saved: Some(snap),
            ..MemoryStore::default()
        };

        let rt = Runtime::open(store, quiet(), now);
        let catch_up = rt.catch_up().unwrap();
        assert!((catch_up.minutes - 20.0).abs() < 1e-6);
        let saved = rt.store().saved.clone().unwrap();
        assert_eq!(saved.last_save_time, now);
        assert!((saved.hunger - 70.0).abs() < 1e-3);

        // Re-opening right away finds nothing to catch up on.
        let store = MemoryStore {
            saved: Some(saved),
            ..MemoryStore::default()
        };
        assert!(Runtime::open(store, quiet(), now).catch_up().is_none());
    }

    #[test]
    fn accepted_commands_save_and_refused_ones_do_not() {
        let mut rt = Runtime::open(MemoryStore::default(), quiet(), Utc::now());
        assert!(rt.command(Command::Feed));
        assert_eq!(rt.store().saves, 2);
        assert_eq!(rt.store().saved.as_ref().unwrap().times_fed, 1);

        assert!(!rt.command(Command::SetColor("#nope".into())));
        assert_eq!(rt.store().saves, 2);
    }

    #[test]
    fn observers_hear_events_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut rt = Runtime::open(MemoryStore::default(), quiet(), Utc::now());
        rt.subscribe(Box::new(Recorder(log.clone())));
        rt.command(Command::Pet);

        let events = log.borrow();
        assert!(matches!(
            events[0],
            PetEvent::StateChanged {
                from: BehaviorState::Idle,
                to: BehaviorState::BeingPetted
            }
        ));
        assert!(matches!(events[1], PetEvent::ParticlesChanged(f) if f.hearts));
        assert!(events.iter().any(|e| matches!(e, PetEvent::StatsChanged(s) if s.times_petted == 1)));
    }

    #[test]
    fn driver_follows_state_through_events() {
        let mut rt = Runtime::open(MemoryStore::default(), quiet(), Utc::now());
        rt.command(Command::Sleep);
        let surface = Surface {
            anchor: Vec2::new(100.0, 100.0),
            pointer: Some(Vec2::new(0.0, 0.0)),
        };
        let f = rt.advance(frame_time(), &surface);
        assert_eq!(f.state, BehaviorState::Sleeping);
        assert_eq!(f.pupil, crate::animation::SLEEP_PUPIL);
        assert!(f.flags.sleep);
        assert!(!f.particles.is_empty());
    }

    #[test]
    fn decay_runs_every_thirty_seconds_and_saves() {
        let mut rt = Runtime::open(MemoryStore::default(), quiet(), Utc::now());
        let surface = Surface::default();
        for _ in 0..599 {
            rt.advance(frame_time(), &surface);
        }
        let before = rt.store().saves;
        assert!((rt.frame().stats.age_minutes).abs() < 1e-9);
        rt.advance(frame_time(), &surface);
        assert_eq!(rt.store().saves, before + 1);
        assert!((rt.frame().stats.age_minutes - 0.5).abs() < 1e-9);
    }

    #[test]
    fn long_stall_is_clamped() {
        let mut rt = Runtime::open(MemoryStore::default(), quiet(), Utc::now());
        rt.advance(Duration::from_secs(3600), &Surface::default());
        // A 250 ms frame at most: no decay tick fired.
        assert_eq!(rt.frame().stats.age_minutes, 0.0);
        assert_eq!(rt.store().saves, 1);
    }

    #[test]
    fn shutdown_flushes_once() {
        let mut rt = Runtime::open(MemoryStore::default(), quiet(), Utc::now());
        rt.shutdown();
        rt.shutdown();
        assert_eq!(rt.store().saves, 2);
        assert!(rt.is_stopped());
        assert!(!rt.command(Command::Feed));
        rt.advance(Duration::from_secs(60), &Surface::default());
        assert_eq!(rt.store().saves, 2);
    }

    #[test]
    fn cli_overrides_win_over_the_save() {
        let mut snap: Snapshot =
            serde_json::from_str(r#"{ "last_save_time": "2026-03-01T12:00:00Z" }"#).unwrap();
        snap.speed_multiplier = 1.5;
        let store = MemoryStore {
            saved: Some(snap),
            ..MemoryStore::default()
        };
        let options = RuntimeOptions {
            speed_multiplier: Some(3.0),
            particles_enabled: Some(false),
            ..quiet()
        };
        let rt = Runtime::open(store, options, Utc::now());
        let saved = rt.store().saved.as_ref().unwrap();
        assert_eq!(saved.speed_multiplier, 3.0);
        assert!(!saved.particles_enabled);
    }
}
