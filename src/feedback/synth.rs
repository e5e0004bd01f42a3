//! Shutter click synthesis
//!
//! Two short noise bursts with exponential decay (curtain open, curtain close),
//! generated from a fixed seed so every click sounds the same.

/// Output sample rate in Hz
pub const SAMPLE_RATE: u32 = 44_100;

/// Total click length
const CLICK_MS: u32 = 90;
/// Offset of the second burst
const SECOND_BURST_MS: u32 = 45;
/// Decay time constant of each burst in seconds
const DECAY_SECS: f32 = 0.006;
/// The second burst is a little quieter
const SECOND_BURST_GAIN: f32 = 0.6;

/// Small xorshift generator; the click only needs repeatable white noise
struct NoiseSource(u32);

impl NoiseSource {
    fn next(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

/// Mono f32 samples of one shutter click at `volume` (0.0 - 1.0)
pub fn shutter_click(volume: f32) -> Vec<f32> {
    let volume = volume.clamp(0.0, 1.0);
    let total = (SAMPLE_RATE * CLICK_MS / 1000) as usize;
    let second = (SAMPLE_RATE * SECOND_BURST_MS / 1000) as usize;
    let mut noise = NoiseSource(0x9E37_79B9);

    (0..total)
        .map(|i| {
            let n = noise.next();
            let t1 = i as f32 / SAMPLE_RATE as f32;
            let mut env = (-t1 / DECAY_SECS).exp();
            if i >= second {
                let t2 = (i - second) as f32 / SAMPLE_RATE as f32;
                env += SECOND_BURST_GAIN * (-t2 / DECAY_SECS).exp();
            }
            (n * env * volume).clamp(-1.0, 1.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s * s).sum()
    }

    #[test]
    fn test_click_length() {
        let click = shutter_click(1.0);
        assert_eq!(click.len(), (SAMPLE_RATE * CLICK_MS / 1000) as usize);
    }

    #[test]
    fn test_click_is_deterministic() {
        assert_eq!(shutter_click(0.5), shutter_click(0.5));
    }

    #[test]
    fn test_volume_bounds_peak() {
        let click = shutter_click(0.3);
        let peak = click.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.3 + 1e-6);
        assert!(peak > 0.05);
        assert!(shutter_click(0.0).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_two_bursts_decay() {
        let click = shutter_click(1.0);
        let second = (SAMPLE_RATE * SECOND_BURST_MS / 1000) as usize;
        let window = 200;

        let head = energy(&click[..window]);
        let before_second = energy(&click[second - window..second]);
        let second_head = energy(&click[second..second + window]);
        let tail = energy(&click[click.len() - window..]);

        assert!(head > before_second * 10.0);
        assert!(second_head > before_second * 10.0);
        assert!(second_head > tail * 10.0);
    }
}
