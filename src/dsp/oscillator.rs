//! phase-continuous sine generator for the repeater and autotune paths
//!
//! The phase argument is a running sample counter, so a frequency change
//! between blocks never tears the waveform inside a block.  Losing the
//! driving frequency emits silence and restarts the counter; the next tone
//! begins at phase zero by design.
pub struct ToneOscillator {
    sample_rate: f32,
    phase_counter: u64,
}

impl ToneOscillator {
    pub fn new() -> ToneOscillator {
        ToneOscillator {
            sample_rate: 48_000.0,
            phase_counter: 0,
        }
    }

    pub fn negotiate(&mut self, sample_rate: usize) -> () {
        self.sample_rate = sample_rate as f32;
        self.phase_counter = 0;
    }

    pub fn phase_counter(&self) -> u64 {
        self.phase_counter
    }

    /// fill one block at the given frequency and amplitude
    pub fn fill(&mut self, out: &mut [f32], frequency: f32, amplitude: f32) -> () {
        if frequency <= 0.0 {
            for s in out.iter_mut() {
                *s = 0.0;
            }
            self.phase_counter = 0;
            return;
        }
        let multiplier = 2.0 * std::f32::consts::PI * frequency / self.sample_rate;
        for s in out.iter_mut() {
            *s = amplitude * f32::sin(self.phase_counter as f32 * multiplier);
            self.phase_counter += 1;
        }
    }
}

#[cfg(test)]
mod test_oscillator {
    use super::*;

    #[test]
    fn no_frequency_means_silence_and_reset() {
        let mut osc = ToneOscillator::new();
        osc.negotiate(48_000);
        let mut block = [1.0_f32; 128];
        osc.fill(&mut block, 220.0, 1.0);
        osc.fill(&mut block, -1.0, 1.0);
        assert!(block.iter().all(|s| *s == 0.0));
        assert_eq!(osc.phase_counter(), 0);
    }

    #[test]
    fn phase_is_continuous_across_blocks() {
        let mut osc = ToneOscillator::new();
        osc.negotiate(48_000);
        let mut first = [0.0_f32; 128];
        let mut second = [0.0_f32; 128];
        osc.fill(&mut first, 220.0, 1.0);
        osc.fill(&mut second, 220.0, 1.0);
        assert_eq!(osc.phase_counter(), 256);
        // the second block picks up exactly where the first left off
        let multiplier = 2.0 * std::f32::consts::PI * 220.0 / 48_000.0;
        assert_eq!(second[0], f32::sin(128.0 * multiplier));
    }

    #[test]
    fn restarts_at_phase_zero_after_silence() {
        let mut osc = ToneOscillator::new();
        osc.negotiate(48_000);
        let mut block = [0.0_f32; 128];
        osc.fill(&mut block, 220.0, 1.0);
        osc.fill(&mut block, 0.0, 1.0);
        osc.fill(&mut block, 220.0, 0.5);
        // phase 0 puts the first sample at exactly zero
        assert_eq!(block[0], 0.0);
        assert_eq!(osc.phase_counter(), 128);
        assert!(block[1].abs() > 0.0);
        assert!(block.iter().all(|s| s.abs() <= 0.5));
    }

    #[test]
    fn amplitude_scales_the_tone() {
        let mut osc = ToneOscillator::new();
        osc.negotiate(48_000);
        let mut block = [0.0_f32; 256];
        osc.fill(&mut block, 440.0, 2.0);
        let peak = block.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(peak > 1.9 && peak <= 2.0);
    }
}
