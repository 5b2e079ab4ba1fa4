//! energy-gated capture of raw samples for period analysis
//!
//! Blocks only enter the rolling window while the signal is loud enough.
//! Roughly 100ms of continuous sub-threshold input empties the window so a
//! stale note cannot leak into the next period estimate.
use crate::dsp::ring_buffer::SlidingWindow;
use crate::utils::{block_energy, seconds_to_samples};

/// seconds of continuous low energy before the window is flushed
pub const SILENCE_TIMEOUT_SECONDS: f32 = 0.1;

pub struct CaptureBuffer {
    ring: SlidingWindow<f32>,
    min_level: f32,
    sample_rate: usize,
    fail_counter: usize,
}

impl CaptureBuffer {
    pub fn new(min_level: f32) -> CaptureBuffer {
        CaptureBuffer {
            ring: SlidingWindow::with_capacity(0),
            min_level,
            sample_rate: 0,
            fail_counter: 0,
        }
    }

    /// size the rolling window; returns its capacity in samples
    pub fn negotiate(&mut self, ring_seconds: f32, sample_rate: usize) -> usize {
        let capacity = seconds_to_samples(ring_seconds, sample_rate);
        self.ring = SlidingWindow::with_capacity(capacity);
        self.sample_rate = sample_rate;
        self.fail_counter = 0;
        capacity
    }

    pub fn set_min_level(&mut self, level: f32) -> () {
        self.min_level = level;
    }

    pub fn add_block(&mut self, block: &[f32]) -> () {
        if block.is_empty() || self.sample_rate == 0 {
            return;
        }
        if block_energy(block) >= self.min_level {
            for s in block {
                self.ring.push(*s);
            }
            self.fail_counter = 0;
        } else {
            self.fail_counter += block.len();
            if self.fail_counter as f32 / self.sample_rate as f32 > SILENCE_TIMEOUT_SECONDS {
                self.ring.clear();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// total energy of everything currently captured
    pub fn energy(&self) -> f32 {
        self.ring.iter().fold(0.0, |acc, s| acc + s * s)
    }

    pub fn clear(&mut self) -> () {
        self.ring.clear();
        self.fail_counter = 0;
    }
}

impl std::ops::Index<usize> for CaptureBuffer {
    type Output = f32;
    fn index(&self, index: usize) -> &f32 {
        &self.ring[index]
    }
}

#[cfg(test)]
mod test_capture_buffer {
    use super::*;

    fn loud_block() -> Vec<f32> {
        vec![1.0; 128] // energy 128
    }

    fn quiet_block() -> Vec<f32> {
        vec![0.001; 128] // energy well under any sane threshold
    }

    #[test]
    fn gate_admits_loud_blocks() {
        let mut cap = CaptureBuffer::new(0.5);
        cap.negotiate(0.5, 48_000);
        cap.add_block(&loud_block());
        assert_eq!(cap.len(), 128);
        assert!((cap.energy() - 128.0).abs() < 1e-3);
        assert_eq!(cap[0], 1.0);
    }

    #[test]
    fn gate_rejects_quiet_blocks() {
        let mut cap = CaptureBuffer::new(0.5);
        cap.negotiate(0.5, 48_000);
        cap.add_block(&quiet_block());
        assert!(cap.is_empty());
    }

    #[test]
    fn silence_timeout_flushes() {
        let mut cap = CaptureBuffer::new(0.5);
        cap.negotiate(0.5, 48_000);
        cap.add_block(&loud_block());
        assert_eq!(cap.len(), 128);
        // 0.1s at 48kHz is 4800 samples; 38 quiet blocks of 128 push past it
        for _ in 0..38 {
            cap.add_block(&quiet_block());
        }
        assert!(cap.is_empty());
    }

    #[test]
    fn loud_block_resets_the_fail_counter() {
        let mut cap = CaptureBuffer::new(0.5);
        cap.negotiate(0.5, 48_000);
        // alternate quiet and loud; the counter never accumulates 0.1s
        for _ in 0..100 {
            cap.add_block(&quiet_block());
            cap.add_block(&loud_block());
        }
        assert!(!cap.is_empty());
    }

    #[test]
    fn rolls_over_at_capacity() {
        let mut cap = CaptureBuffer::new(0.5);
        let capacity = cap.negotiate(0.01, 48_000); // 480 samples
        for _ in 0..10 {
            cap.add_block(&loud_block());
        }
        assert_eq!(cap.len(), capacity);
    }
}
