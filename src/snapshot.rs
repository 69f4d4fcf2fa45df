use crate::color::PetColor;
use crate::needs::{Needs, Stats};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use glam::Vec2;
use serde::{Deserialize, Serialize};

pub(crate) const SNAPSHOT_VERSION: u32 = 1;

/// Absences shorter than this are not reconciled.
const CATCH_UP_THRESHOLD_SECS: i64 = 60;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

fn default_need() -> f32 {
    80.0
}

fn default_energy() -> f32 {
    100.0
}

fn default_speed() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Everything written to the save file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    #[serde(default = "default_version")]
    pub(crate) version: u32,
    #[serde(default = "default_need")]
    pub(crate) happiness: f32,
    #[serde(default = "default_energy")]
    pub(crate) energy: f32,
    #[serde(default = "default_need")]
    pub(crate) hunger: f32,
    #[serde(default)]
    pub(crate) times_fed: u32,
    #[serde(default)]
    pub(crate) times_played: u32,
    #[serde(default)]
    pub(crate) times_petted: u32,
    #[serde(default)]
    pub(crate) age_minutes: f64,
    pub(crate) last_save_time: DateTime<Utc>,
    #[serde(default)]
    pub(crate) color: PetColor,
    #[serde(default = "default_speed")]
    pub(crate) speed_multiplier: f32,
    #[serde(default = "default_true")]
    pub(crate) walk_enabled: bool,
    #[serde(default = "default_true")]
    pub(crate) particles_enabled: bool,
    #[serde(default)]
    pub(crate) window_position: Option<Vec2>,
    #[serde(default)]
    pub(crate) position: Vec2,
}

impl Snapshot {
    pub(crate) fn needs(&self) -> Needs {
        Needs::new(self.happiness, self.energy, self.hunger)
    }

    pub(crate) fn stats(&self) -> Stats {
        Stats {
            times_fed: self.times_fed,
            times_played: self.times_played,
            times_petted: self.times_petted,
            age_minutes: sanitize_age(self.age_minutes),
        }
    }
}

fn sanitize_age(age: f64) -> f64 {
    if age.is_finite() {
        age.max(0.0)
    } else {
        0.0
    }
}

/// What reconciliation did, for the recap box and the log.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CatchUp {
    pub(crate) minutes: f64,
    pub(crate) hunger: f32,
    pub(crate) energy: f32,
    pub(crate) happiness: f32,
}

impl CatchUp {
    pub(crate) fn away_text(&self) -> String {
        let total = self.minutes.floor() as u64;
        let (h, m) = (total / 60, total % 60);
        if h > 0 {
            format!("{h}h {m}m")
        } else {
            format!("{m}m")
        }
    }
}

/// Fractional minutes since `last_save`, or `None` when too short or negative.
pub(crate) fn elapsed_minutes(last_save: DateTime<Utc>, now: DateTime<Utc>) -> Option<f64> {
    let elapsed = now - last_save;
    if elapsed <= ChronoDuration::seconds(CATCH_UP_THRESHOLD_SECS) {
        return None;
    }
    Some(elapsed.num_milliseconds() as f64 / 60_000.0)
}

/// Apply the offline catch-up once, returning the deltas that actually landed.
pub(crate) fn reconcile(
    needs: &mut Needs,
    stats: &mut Stats,
    last_save: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<CatchUp> {
    let minutes = elapsed_minutes(last_save, now)?;
    let before = *needs;
    needs.apply_catch_up(minutes);
    stats.age_minutes += minutes;
    Some(CatchUp {
        minutes,
        hunger: needs.hunger() - before.hunger(),
        energy: needs.energy() - before.energy(),
        happiness: needs.happiness() - before.happiness(),
    })
}
