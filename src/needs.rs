use serde::{Deserialize, Serialize};

pub(crate) const NEED_MIN: f32 = 0.0;
pub(crate) const NEED_MAX: f32 = 100.0;

const HUNGRY_BELOW: f32 = 30.0;
const TIRED_BELOW: f32 = 30.0;

const FEED_HUNGER: f32 = 25.0;
const FEED_HAPPINESS: f32 = 5.0;
const PLAY_HAPPINESS: f32 = 15.0;
const PLAY_ENERGY_COST: f32 = 10.0;
pub(crate) const PLAY_MIN_ENERGY: f32 = 10.0;
const PET_HAPPINESS: f32 = 3.0;

// Offline catch-up, per elapsed minute.
const CATCH_UP_HUNGER: f64 = 0.5;
const CATCH_UP_ENERGY: f64 = 0.3;
const CATCH_UP_HAPPINESS: f64 = 0.2;

/// Reference decay cadence the default rates are tuned against.
const DECAY_REFERENCE_SECS: f32 = 30.0;

fn clamp_need(v: f32) -> f32 {
    v.clamp(NEED_MIN, NEED_MAX)
}

/// Six-tier classification of happiness, lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub(crate) enum Mood {
    Miserable,
    Sad,
    Neutral,
    Content,
    Happy,
    Ecstatic,
}

impl Mood {
    pub(crate) fn from_happiness(happiness: f32) -> Self {
        match happiness {
            h if h > 90.0 => Mood::Ecstatic,
            h if h > 70.0 => Mood::Happy,
            h if h > 50.0 => Mood::Content,
            h if h > 30.0 => Mood::Neutral,
            h if h > 10.0 => Mood::Sad,
            _ => Mood::Miserable,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Mood::Miserable => "miserable",
            Mood::Sad => "sad",
            Mood::Neutral => "neutral",
            Mood::Content => "content",
            Mood::Happy => "happy",
            Mood::Ecstatic => "ecstatic",
        }
    }
}

/// Per-second rates for the live needs model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Rules {
    pub(crate) hunger_decay: f32,
    pub(crate) happiness_decay: f32,
    /// Extra happiness loss while hunger is low.
    pub(crate) hungry_penalty: f32,
    /// Extra happiness loss while energy is low.
    pub(crate) tired_penalty: f32,
    pub(crate) awake_energy_drain: f32,
    pub(crate) sleep_energy_gain: f32,
    pub(crate) sleep_happiness_gain: f32,
    /// When false, a pet that is both hungry and tired only pays the hunger penalty.
    pub(crate) stack_penalties: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            hunger_decay: 1.0 / DECAY_REFERENCE_SECS,
            happiness_decay: 0.5 / DECAY_REFERENCE_SECS,
            hungry_penalty: 2.0 / DECAY_REFERENCE_SECS,
            tired_penalty: 1.0 / DECAY_REFERENCE_SECS,
            awake_energy_drain: 0.5 / DECAY_REFERENCE_SECS,
            sleep_energy_gain: 5.0,
            sleep_happiness_gain: 0.5,
            stack_penalties: true,
        }
    }
}

/// Monotonic counters kept alongside the needs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Stats {
    pub(crate) times_fed: u32,
    pub(crate) times_played: u32,
    pub(crate) times_petted: u32,
    pub(crate) age_minutes: f64,
}

/// The three bounded needs. Every write goes through `clamp_need`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Needs {
    happiness: f32,
    energy: f32,
    hunger: f32,
}

impl Default for Needs {
    fn default() -> Self {
        Self {
            happiness: 80.0,
            energy: 100.0,
            hunger: 80.0,
        }
    }
}

impl Needs {
    pub(crate) fn new(happiness: f32, energy: f32, hunger: f32) -> Self {
        Self {
            happiness: clamp_need(sanitize(happiness)),
            energy: clamp_need(sanitize(energy)),
            hunger: clamp_need(sanitize(hunger)),
        }
    }

    pub(crate) fn happiness(&self) -> f32 {
        self.happiness
    }

    pub(crate) fn energy(&self) -> f32 {
        self.energy
    }

    /// Fullness: 100 means satiated.
    pub(crate) fn hunger(&self) -> f32 {
        self.hunger
    }

    pub(crate) fn mood(&self) -> Mood {
        Mood::from_happiness(self.happiness)
    }

    fn add_happiness(&mut self, delta: f32) {
        self.happiness = clamp_need(self.happiness + delta);
    }

    fn add_energy(&mut self, delta: f32) {
        self.energy = clamp_need(self.energy + delta);
    }

    fn add_hunger(&mut self, delta: f32) {
        self.hunger = clamp_need(self.hunger + delta);
    }

    pub(crate) fn apply_passive_decay(&mut self, elapsed_secs: f32, rules: &Rules) {
        let dt = elapsed_secs.max(0.0);
        self.add_hunger(-rules.hunger_decay * dt);

        let hungry = self.hunger < HUNGRY_BELOW;
        if hungry {
            self.add_happiness(-rules.hungry_penalty * dt);
        }
        if self.energy < TIRED_BELOW && (rules.stack_penalties || !hungry) {
            self.add_happiness(-rules.tired_penalty * dt);
        }
        self.add_happiness(-rules.happiness_decay * dt);
    }

    pub(crate) fn drain_awake(&mut self, elapsed_secs: f32, rules: &Rules) {
        self.add_energy(-rules.awake_energy_drain * elapsed_secs.max(0.0));
    }

    pub(crate) fn restore_from_sleep(&mut self, elapsed_secs: f32, rules: &Rules) {
        let dt = elapsed_secs.max(0.0);
        self.add_energy(rules.sleep_energy_gain * dt);
        self.add_happiness(rules.sleep_happiness_gain * dt);
    }

    pub(crate) fn apply_feed(&mut self, stats: &mut Stats) {
        self.add_hunger(FEED_HUNGER);
        self.add_happiness(FEED_HAPPINESS);
        stats.times_fed = stats.times_fed.saturating_add(1);
    }

    /// Returns false (and changes nothing) when the pet is too tired to play.
    pub(crate) fn apply_play(&mut self, stats: &mut Stats) -> bool {
        if self.energy < PLAY_MIN_ENERGY {
            return false;
        }
        self.add_happiness(PLAY_HAPPINESS);
        self.add_energy(-PLAY_ENERGY_COST);
        stats.times_played = stats.times_played.saturating_add(1);
        true
    }

    pub(crate) fn apply_pet(&mut self, stats: &mut Stats) {
        self.add_happiness(PET_HAPPINESS);
        stats.times_petted = stats.times_petted.saturating_add(1);
    }

    /// One-shot correction for time spent closed. Models the pet resting while away.
    pub(crate) fn apply_catch_up(&mut self, minutes: f64) {
        let m = minutes.max(0.0);
        self.add_hunger(-(m * CATCH_UP_HUNGER) as f32);
        self.add_energy((m * CATCH_UP_ENERGY) as f32);
        self.add_happiness(-(m * CATCH_UP_HAPPINESS) as f32);
    }
}

fn sanitize(v: f32) -> f32 {
    if v.is_nan() {
        NEED_MIN
    } else {
        v
    }
}
