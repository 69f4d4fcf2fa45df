use crate::behavior::{BehaviorState, ParticleFlags};
use crate::color::PetColor;
use crate::needs::{Mood, Needs, Stats};

/// Change notifications published by the pet.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PetEvent {
    StateChanged {
        from: BehaviorState,
        to: BehaviorState,
    },
    MoodChanged {
        from: Mood,
        to: Mood,
    },
    NeedsChanged(Needs),
    StatsChanged(Stats),
    ParticlesChanged(ParticleFlags),
    ColorChanged(PetColor),
}

pub(crate) trait Observer {
    fn notify(&mut self, event: &PetEvent);
}

/// Events buffered until the runtime fans them out.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    events: Vec<PetEvent>,
}

impl Outbox {
    pub(crate) fn push(&mut self, event: PetEvent) {
        self.events.push(event);
    }

    pub(crate) fn take(&mut self) -> Vec<PetEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Writes transitions to the log file.
pub(crate) struct LogObserver;

impl Observer for LogObserver {
    fn notify(&mut self, event: &PetEvent) {
        match event {
            PetEvent::StateChanged { from, to } => {
                log::debug!("behavior {} -> {}", from.label(), to.label());
            }
            PetEvent::MoodChanged { from, to } => {
                log::info!("mood {} -> {}", from.label(), to.label());
            }
            PetEvent::ColorChanged(c) => log::info!("color set to {c}"),
            _ => {}
        }
    }
}
