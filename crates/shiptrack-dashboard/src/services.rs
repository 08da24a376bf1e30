//! Injected sound and visual-effect services.
//!
//! A dashboard owns one [`SoundEngine`] and one [`EffectsEngine`]. They are
//! constructed by the caller, initialised on mount and disposed on unmount;
//! nothing here is a global. Cues are fire-and-forget and cannot fail.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shiptrack_core::catalog::{Category, Warehouse};
use shiptrack_core::clock::{Clock, SystemClock};
use shiptrack_core::rng::{RandomSource, SimRng};
use shiptrack_milestones::{Milestone, MilestoneKey};

/// Minimum spacing between two audible cues.
pub const SOUND_THROTTLE: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An audio cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sound {
    OrderShipped(Category),
    HighValueOrder,
    Milestone(MilestoneKey),
    GoalCompleted,
}

pub trait SoundEngine: Send {
    fn init(&mut self);
    fn dispose(&mut self);
    fn set_muted(&mut self, muted: bool);
    fn is_muted(&self) -> bool;
    /// Play `sound` at dashboard time `at`. Engines may drop cues.
    fn play(&mut self, sound: Sound, at: Duration);
}

pub trait EffectsEngine: Send {
    fn init(&mut self);
    fn dispose(&mut self);
    fn celebrate(&mut self, milestone: &Milestone);
    /// Flash a warehouse marker when an order ships from it.
    fn pulse(&mut self, warehouse: &Warehouse, at: Duration);
    fn clear_all(&mut self);
}

// ---------------------------------------------------------------------------
// Logged implementations
// ---------------------------------------------------------------------------

/// Writes each cue to the trace log. Honours mute and drops cues closer
/// together than [`SOUND_THROTTLE`].
#[derive(Debug, Default)]
pub struct LoggedSound {
    ready: bool,
    muted: bool,
    last_played: Option<Duration>,
    played: u64,
}

impl LoggedSound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cues that passed mute and throttling.
    pub fn played(&self) -> u64 {
        self.played
    }
}

impl SoundEngine for LoggedSound {
    fn init(&mut self) {
        self.ready = true;
    }

    fn dispose(&mut self) {
        self.ready = false;
        self.last_played = None;
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn play(&mut self, sound: Sound, at: Duration) {
        if !self.ready || self.muted {
            return;
        }
        if let Some(last) = self.last_played {
            if at.saturating_sub(last) < SOUND_THROTTLE {
                return;
            }
        }
        self.last_played = Some(at);
        self.played += 1;
        tracing::trace!(?sound, at_ms = at.as_millis() as u64, "sound cue");
    }
}

/// Writes celebrations and pulses to the trace log.
#[derive(Debug, Default)]
pub struct LoggedEffects {
    ready: bool,
    celebrations: u64,
}

impl LoggedEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn celebrations(&self) -> u64 {
        self.celebrations
    }
}

impl EffectsEngine for LoggedEffects {
    fn init(&mut self) {
        self.ready = true;
    }

    fn dispose(&mut self) {
        self.ready = false;
    }

    fn celebrate(&mut self, milestone: &Milestone) {
        if !self.ready {
            return;
        }
        self.celebrations += 1;
        tracing::info!(
            milestone = %milestone.key(),
            title = %milestone.def.title,
            emoji = %milestone.def.emoji,
            "celebration"
        );
    }

    fn pulse(&mut self, warehouse: &Warehouse, at: Duration) {
        if self.ready {
            tracing::trace!(warehouse = %warehouse.name, at_ms = at.as_millis() as u64, "pulse");
        }
    }

    fn clear_all(&mut self) {}
}

// ---------------------------------------------------------------------------
// Silent
// ---------------------------------------------------------------------------

/// Ignores every cue.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent {
    muted: bool,
}

impl SoundEngine for Silent {
    fn init(&mut self) {}
    fn dispose(&mut self) {}
    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
    fn is_muted(&self) -> bool {
        self.muted
    }
    fn play(&mut self, _sound: Sound, _at: Duration) {}
}

impl EffectsEngine for Silent {
    fn init(&mut self) {}
    fn dispose(&mut self) {}
    fn celebrate(&mut self, _milestone: &Milestone) {}
    fn pulse(&mut self, _warehouse: &Warehouse, _at: Duration) {}
    fn clear_all(&mut self) {}
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// One call made on a [`Recorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    SoundInit,
    SoundDispose,
    SetMuted(bool),
    Play(Sound),
    EffectsInit,
    EffectsDispose,
    Celebrate(MilestoneKey),
    Pulse(String),
    ClearAll,
}

/// Records every call. Clones share the same log, so a test can keep one
/// clone while the dashboard owns the others.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<ServiceCall>>>,
    muted: bool,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<ServiceCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: ServiceCall) {
        self.log().push(call);
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.log().clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&ServiceCall) -> bool) -> usize {
        self.log().iter().filter(|c| pred(c)).count()
    }

    pub fn clear(&self) {
        self.log().clear();
    }
}

impl SoundEngine for Recorder {
    fn init(&mut self) {
        self.record(ServiceCall::SoundInit);
    }

    fn dispose(&mut self) {
        self.record(ServiceCall::SoundDispose);
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.record(ServiceCall::SetMuted(muted));
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn play(&mut self, sound: Sound, _at: Duration) {
        if !self.muted {
            self.record(ServiceCall::Play(sound));
        }
    }
}

impl EffectsEngine for Recorder {
    fn init(&mut self) {
        self.record(ServiceCall::EffectsInit);
    }

    fn dispose(&mut self) {
        self.record(ServiceCall::EffectsDispose);
    }

    fn celebrate(&mut self, milestone: &Milestone) {
        self.record(ServiceCall::Celebrate(milestone.key()));
    }

    fn pulse(&mut self, warehouse: &Warehouse, _at: Duration) {
        self.record(ServiceCall::Pulse(warehouse.name.clone()));
    }

    fn clear_all(&mut self) {
        self.record(ServiceCall::ClearAll);
    }
}

// ---------------------------------------------------------------------------
// Service bundle
// ---------------------------------------------------------------------------

/// Everything a dashboard needs from the outside world.
pub struct Services {
    pub clock: Arc<dyn Clock>,
    pub rng: Box<dyn RandomSource>,
    pub sound: Box<dyn SoundEngine>,
    pub effects: Box<dyn EffectsEngine>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

impl Services {
    /// Wall clock, seeded or entropy RNG, and the logging engines.
    pub fn logged(seed: Option<u64>) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            rng: Box::new(seed.map_or_else(SimRng::from_entropy, SimRng::new)),
            sound: Box::new(LoggedSound::new()),
            effects: Box::new(LoggedEffects::new()),
        }
    }

    /// No audio or effects.
    pub fn silent(clock: Arc<dyn Clock>, rng: Box<dyn RandomSource>) -> Self {
        Self {
            clock,
            rng,
            sound: Box::new(Silent::default()),
            effects: Box::new(Silent::default()),
        }
    }

    /// Both engines backed by clones of `recorder`.
    pub fn recorded(clock: Arc<dyn Clock>, rng: Box<dyn RandomSource>, recorder: &Recorder) -> Self {
        Self {
            clock,
            rng,
            sound: Box::new(recorder.clone()),
            effects: Box::new(recorder.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiptrack_core::test_utils::warehouse;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn logged_sound_is_silent_before_init() {
        let mut sound = LoggedSound::new();
        sound.play(Sound::HighValueOrder, ms(0));
        assert_eq!(sound.played(), 0);
    }

    #[test]
    fn logged_sound_throttles() {
        let mut sound = LoggedSound::new();
        sound.init();
        sound.play(Sound::HighValueOrder, ms(0));
        sound.play(Sound::HighValueOrder, ms(50));
        sound.play(Sound::HighValueOrder, ms(100));
        assert_eq!(sound.played(), 2);
    }

    #[test]
    fn logged_sound_honours_mute() {
        let mut sound = LoggedSound::new();
        sound.init();
        sound.set_muted(true);
        sound.play(Sound::GoalCompleted, ms(0));
        assert!(sound.is_muted());
        assert_eq!(sound.played(), 0);
    }

    #[test]
    fn recorder_clones_share_log() {
        let recorder = Recorder::new();
        let mut effects: Box<dyn EffectsEngine> = Box::new(recorder.clone());
        effects.init();
        effects.pulse(&warehouse("Reno, NV"), ms(10));
        assert_eq!(
            recorder.calls(),
            vec![ServiceCall::EffectsInit, ServiceCall::Pulse("Reno, NV".into())]
        );
    }

    #[test]
    fn muted_recorder_drops_plays() {
        let recorder = Recorder::new();
        let mut sound = recorder.clone();
        sound.set_muted(true);
        sound.play(Sound::HighValueOrder, ms(0));
        assert_eq!(recorder.count(|c| matches!(c, ServiceCall::Play(_))), 0);
    }
}
