//! Click playback and haptic output devices

use crossbeam_channel::Sender;
use std::time::Duration;
#[cfg(feature = "audio")]
use tracing::{debug, warn};

/// Something that can play a mono sample buffer
pub trait ClickPlayer: Send + Sync {
    fn play(&self, samples: &[f32], sample_rate: u32);
}

/// Something that can pulse a vibration motor
pub trait HapticDriver: Send + Sync {
    fn pulse(&self, duration: Duration);
}

/// Discards every request (no audio device / no motor)
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl ClickPlayer for Silent {
    fn play(&self, _samples: &[f32], _sample_rate: u32) {}
}

impl HapticDriver for Silent {
    fn pulse(&self, _duration: Duration) {}
}

/// Plays clicks on the default output device.
///
/// The output stream is not `Send`, so it lives on a dedicated thread fed by a channel.
/// If no device is available, requests are drained and dropped.
#[cfg(feature = "audio")]
pub struct RodioPlayer {
    requests: Sender<(Vec<f32>, u32)>,
}

#[cfg(feature = "audio")]
impl RodioPlayer {
    pub fn spawn() -> Self {
        let (requests, rx) = crossbeam_channel::unbounded::<(Vec<f32>, u32)>();

        std::thread::spawn(move || {
            let output = match rodio::OutputStream::try_default() {
                Ok(output) => Some(output),
                Err(e) => {
                    warn!("No audio output, shutter sound disabled: {}", e);
                    None
                }
            };

            while let Ok((samples, sample_rate)) = rx.recv() {
                let Some((_stream, handle)) = output.as_ref() else {
                    continue;
                };
                match rodio::Sink::try_new(handle) {
                    Ok(sink) => {
                        sink.append(rodio::buffer::SamplesBuffer::new(1, sample_rate, samples));
                        sink.detach();
                    }
                    Err(e) => warn!("Failed to play shutter sound: {}", e),
                }
            }
            debug!("Audio thread exiting");
        });

        Self { requests }
    }
}

#[cfg(feature = "audio")]
impl ClickPlayer for RodioPlayer {
    fn play(&self, samples: &[f32], sample_rate: u32) {
        let _ = self.requests.send((samples.to_vec(), sample_rate));
    }
}

/// Forwards requests to a channel; lets the UI layer (or a test) own the actual device
#[derive(Debug, Clone)]
pub struct ChannelPlayer {
    sender: Sender<FeedbackRequest>,
}

/// A request forwarded by `ChannelPlayer`
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackRequest {
    Sound { samples: usize, sample_rate: u32 },
    Pulse(Duration),
}

impl ChannelPlayer {
    pub fn new(sender: Sender<FeedbackRequest>) -> Self {
        Self { sender }
    }
}

impl ClickPlayer for ChannelPlayer {
    fn play(&self, samples: &[f32], sample_rate: u32) {
        let _ = self.sender.send(FeedbackRequest::Sound {
            samples: samples.len(),
            sample_rate,
        });
    }
}

impl HapticDriver for ChannelPlayer {
    fn pulse(&self, duration: Duration) {
        let _ = self.sender.send(FeedbackRequest::Pulse(duration));
    }
}
