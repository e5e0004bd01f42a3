//! Shutter Feedback
//!
//! Audible click and haptic pulse on every capture. Feedback is best-effort:
//! missing devices never fail a capture.

pub mod player;
pub mod synth;

use std::time::Duration;
use tracing::debug;

use crate::config::FeedbackSettings;

pub use player::{ChannelPlayer, ClickPlayer, FeedbackRequest, HapticDriver, Silent};
#[cfg(feature = "audio")]
pub use player::RodioPlayer;

/// Click + pulse fired by the capture session
pub struct ShutterFeedback {
    click: Vec<f32>,
    pulse: Duration,
    sound_enabled: bool,
    haptics_enabled: bool,
    player: Box<dyn ClickPlayer>,
    haptics: Box<dyn HapticDriver>,
}

impl ShutterFeedback {
    pub fn new(
        settings: &FeedbackSettings,
        player: Box<dyn ClickPlayer>,
        haptics: Box<dyn HapticDriver>,
    ) -> Self {
        Self {
            click: synth::shutter_click(settings.volume),
            pulse: Duration::from_millis(settings.haptic_pulse_ms),
            sound_enabled: settings.sound_enabled,
            haptics_enabled: settings.haptics_enabled,
            player,
            haptics,
        }
    }

    /// Feedback that does nothing
    pub fn silent() -> Self {
        let settings = FeedbackSettings {
            sound_enabled: false,
            haptics_enabled: false,
            ..FeedbackSettings::default()
        };
        Self::new(&settings, Box::new(Silent), Box::new(Silent))
    }

    /// Default output device for sound; no vibration motor on desktop
    #[cfg(feature = "audio")]
    pub fn system(settings: &FeedbackSettings) -> Self {
        Self::new(settings, Box::new(RodioPlayer::spawn()), Box::new(Silent))
    }

    pub fn trigger(&self) {
        if self.sound_enabled {
            self.player.play(&self.click, synth::SAMPLE_RATE);
        }
        if self.haptics_enabled {
            self.haptics.pulse(self.pulse);
        }
        debug!("Shutter feedback fired");
    }
}
