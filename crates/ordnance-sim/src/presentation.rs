//! Fire-and-forget audio and visual notifications.
//!
//! The simulation describes what happened and where; playing sounds and
//! spawning effects belongs to whoever listens. Sinks must never block the
//! simulation thread.

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::IVec3;
use serde::{Deserialize, Serialize};

use crate::projectile::ObjectRef;

/// Sound to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCue {
    /// Sound id from the weapon stats
    Weapon(u32),
    /// Whistle of a howitzer shell in flight
    HowitzerFlight,
    /// One of three machine-gun ricochets
    Ricochet(u8),
}

/// In-flight trail style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailKind {
    /// Flamethrower jet
    Flame,
    /// Beam weapon glow
    Laser,
    /// Rocket or shell smoke
    Smoke,
}

/// Which explosion graphic to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplosionGraphic {
    /// Struck its target
    Hit,
    /// Struck the ground
    Miss,
    /// Struck water
    Water,
}

/// A notification emitted by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PresentationEvent {
    /// Sound attached to a moving object or projectile
    TrackedAudio {
        /// Sound
        cue: AudioCue,
        /// Emitter
        follow: ObjectRef,
    },
    /// Sound at a fixed place
    PositionalAudio {
        /// Sound
        cue: AudioCue,
        /// Location
        position: IVec3,
    },
    /// Trail behind a projectile
    Trail {
        /// Style
        kind: TrailKind,
        /// Location
        position: IVec3,
        /// Flight progress, 0..=100 and beyond on overshoot
        progress: u32,
    },
    /// Explosion burst
    Explosion {
        /// Location
        position: IVec3,
        /// Scatter radius
        scatter: u32,
        /// Graphic to use
        graphic: ExplosionGraphic,
        /// Sprites face the camera
        face_player: bool,
    },
    /// Drifting smoke after an air burst
    Smoke {
        /// Location
        position: IVec3,
        /// Scatter radius
        scatter: u32,
    },
    /// Ground fire
    Fire {
        /// Location
        position: IVec3,
        /// Fire radius
        radius: u32,
        /// Duration in milliseconds
        duration: u32,
    },
    /// Orbital laser beam
    SatelliteBeam {
        /// Location
        position: IVec3,
    },
    /// Camera shake
    ScreenShake,
}

/// Receiver of presentation events.
pub trait PresentationSink {
    /// Accepts an event. Must not block.
    fn notify(&mut self, event: PresentationEvent);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn notify(&mut self, _event: PresentationEvent) {}
}

/// Sink that keeps every event, for tests and replays.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Vec<PresentationEvent>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[PresentationEvent] {
        &self.events
    }

    /// Takes the recorded events.
    pub fn drain(&mut self) -> Vec<PresentationEvent> {
        std::mem::take(&mut self.events)
    }
}

impl PresentationSink for RecordingSink {
    fn notify(&mut self, event: PresentationEvent) {
        self.events.push(event);
    }
}

/// Sink forwarding to a bounded channel; events are dropped when it is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<PresentationEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver the presentation layer drains.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<PresentationEvent>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl PresentationSink for ChannelSink {
    fn notify(&mut self, event: PresentationEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }
}
