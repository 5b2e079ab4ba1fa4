//! fundamental period estimation via short-time autocorrelation
//!
//! The estimator correlates a sub-window of the captured signal against
//! itself at every lag up to the window size.  A single dominant peak is not
//! taken as evidence of pitch; the estimate only moves when the two largest
//! in-range peaks have comparable strength, which is what a genuinely
//! periodic waveform produces.  An inconclusive pass leaves the previous
//! estimate in place.
//!
//! This is the expensive part of the whole crate, O(window^2), so it runs on
//! the control thread at the control tick cadence, never inside the audio
//! callback.
use log::debug;
use simple_error::bail;

use crate::common::box_error::BoxError;
use crate::dsp::capture_buffer::CaptureBuffer;
use crate::dsp::ring_buffer::BoundedBuffer;
use crate::utils::seconds_to_samples;

/// the second peak must be within this band of the first to accept a period
pub const PEAK_RATIO_MIN: f32 = 0.8;
pub const PEAK_RATIO_MAX: f32 = 1.2;

pub struct PeriodEstimator {
    capture: CaptureBuffer,
    correlation: BoundedBuffer<f32>,
    min_freq: f32,
    max_freq: f32,
    window_seconds: f32,
    sample_rate: usize,
    period: f32,
    second_period: f32,
    capture_energy: f32,
}

impl PeriodEstimator {
    pub fn new(min_freq: f32, max_freq: f32, min_level: f32, window_seconds: f32) -> PeriodEstimator {
        PeriodEstimator {
            capture: CaptureBuffer::new(min_level),
            correlation: BoundedBuffer::with_capacity(0),
            min_freq,
            max_freq,
            window_seconds,
            sample_rate: 0,
            period: -1.0,
            second_period: -1.0,
            capture_energy: 0.0,
        }
    }

    /// validate the configuration and size both windows
    pub fn negotiate(&mut self, ring_seconds: f32, sample_rate: usize) -> Result<(), BoxError> {
        if sample_rate == 0 {
            bail!("period estimator needs a sample rate");
        }
        if !(self.min_freq > 0.0 && self.min_freq < self.max_freq) {
            bail!(
                "invalid frequency range [{}, {}]",
                self.min_freq,
                self.max_freq
            );
        }
        let window = seconds_to_samples(self.window_seconds, sample_rate);
        if window == 0 {
            bail!("correlation window resolves to zero samples");
        }
        let capacity = self.capture.negotiate(ring_seconds, sample_rate);
        if capacity == 0 {
            bail!("capture ring resolves to zero samples");
        }
        self.correlation = BoundedBuffer::with_capacity(window);
        self.sample_rate = sample_rate;
        debug!(
            "period estimator: {} sample window over a {} sample ring",
            window, capacity
        );
        Ok(())
    }

    pub fn set_min_freq(&mut self, freq: f32) -> () {
        self.min_freq = freq;
    }
    pub fn set_max_freq(&mut self, freq: f32) -> () {
        self.max_freq = freq;
    }
    pub fn set_min_level(&mut self, level: f32) -> () {
        self.capture.set_min_level(level);
    }

    /// feed one block of raw input through the capture gate
    pub fn add_block(&mut self, block: &[f32]) -> () {
        self.capture.add_block(block);
    }

    pub fn get_period(&self) -> f32 {
        self.period
    }
    pub fn get_second_period(&self) -> f32 {
        self.second_period
    }
    /// detected fundamental, -1 while no stable period is held
    pub fn get_freq(&self) -> f32 {
        if self.period > 0.0 {
            1.0 / self.period
        } else {
            -1.0
        }
    }
    /// energy of the captured signal at the last calculate(), scales synthesis
    pub fn get_capture_energy(&self) -> f32 {
        self.capture_energy
    }
    pub fn captured_samples(&self) -> usize {
        self.capture.len()
    }

    /// run one autocorrelation pass over the captured signal
    ///
    /// Called once per control tick.  With too few samples buffered the
    /// estimate resets to "no period"; that is the normal warm-up outcome,
    /// not an error.  An inconclusive double-peak check keeps the previous
    /// estimate instead.
    pub fn calculate(&mut self) -> () {
        let total = self.capture.len() as i64;
        let window = self.correlation.capacity() as i64;

        // analyse the middle of the capture, or its tail when it is short
        let mut i = total / 2;
        let mut n = i + window;
        if n > total {
            i = total - window;
            n = total;
        }
        if i < 0 {
            // still warming up
            self.reset_estimate();
            return;
        }
        let (i, n) = (i as usize, n as usize);

        // energy is recomputed per pass; it only scales synthesis amplitude
        self.capture_energy = self.capture.energy();
        self.correlation.clear();

        let mut first_peak: Option<(f32, usize)> = None;
        let mut second_peak: Option<(f32, usize)> = None;

        // lag 0 is skipped, the trivial self correlation peak is useless
        for lag in 1..=(n - i) {
            let mut sum = 0.0_f32;
            for j in i..(n - lag) {
                sum += self.capture[j] * self.capture[j + lag];
            }
            let _ = self.correlation.try_push(sum);

            let freq = self.sample_rate as f32 / lag as f32;
            if freq < self.min_freq || freq > self.max_freq {
                continue;
            }
            match first_peak {
                Some((best, _)) if sum <= best => match second_peak {
                    Some((second, _)) if sum <= second => (),
                    _ => second_peak = Some((sum, lag)),
                },
                _ => {
                    second_peak = first_peak;
                    first_peak = Some((sum, lag));
                }
            }
        }

        if let (Some((first, first_lag)), Some((second, second_lag))) = (first_peak, second_peak) {
            let ratio = second / first;
            if (PEAK_RATIO_MIN..=PEAK_RATIO_MAX).contains(&ratio) {
                self.period = first_lag as f32 / self.sample_rate as f32;
                self.second_period = second_lag as f32 / self.sample_rate as f32;
                debug!(
                    "period {}s (lag {}), second {}s (lag {})",
                    self.period, first_lag, self.second_period, second_lag
                );
            }
        }
    }

    /// drop the estimate but keep the captured samples
    fn reset_estimate(&mut self) -> () {
        self.period = -1.0;
        self.second_period = -1.0;
        self.correlation.clear();
        self.capture_energy = 0.0;
    }

    /// full reset, used when period mode is switched off
    pub fn reset(&mut self) -> () {
        self.reset_estimate();
        self.capture.clear();
    }
}
