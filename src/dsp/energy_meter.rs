//! sliding-window energy and power measurement over block energies
//!
//! Every block contributes its sum of squares to the energy window and its
//! average power to the power window.  Both keep a running sum that is
//! updated on push and on evict, so reading the accumulated value is free.
use crate::dsp::ring_buffer::BoundedBuffer;
use crate::utils::{block_energy, seconds_to_blocks};

pub struct EnergyPowerMeter {
    window_seconds: f32,
    sample_rate: usize,
    energies: BoundedBuffer<f32>,
    powers: BoundedBuffer<f32>,
    accumulated_energy: f32,
    accumulated_power: f32,
}

impl EnergyPowerMeter {
    pub fn new(window_seconds: f32) -> EnergyPowerMeter {
        EnergyPowerMeter {
            window_seconds,
            sample_rate: 0,
            energies: BoundedBuffer::with_capacity(0),
            powers: BoundedBuffer::with_capacity(0),
            accumulated_energy: 0.0,
            accumulated_power: 0.0,
        }
    }

    /// size the windows once the audio provider has negotiated; returns the
    /// number of blocks the window can hold
    pub fn negotiate(&mut self, sample_rate: usize, block_size: usize) -> usize {
        let blocks = seconds_to_blocks(self.window_seconds, sample_rate, block_size);
        // one slot of headroom so add_block can push before it trims
        self.energies = BoundedBuffer::with_capacity(blocks + 1);
        self.powers = BoundedBuffer::with_capacity(blocks + 1);
        self.sample_rate = sample_rate;
        self.accumulated_energy = 0.0;
        self.accumulated_power = 0.0;
        blocks
    }

    pub fn get_energy(&self) -> f32 {
        self.accumulated_energy
    }
    pub fn get_power(&self) -> f32 {
        self.accumulated_power
    }
    pub fn window_len(&self) -> usize {
        self.energies.len()
    }

    pub fn add_block(&mut self, block: &[f32]) -> () {
        if block.is_empty() || self.sample_rate == 0 {
            return;
        }
        let nframes = block.len();
        let energy = block_energy(block);
        let power = energy / nframes as f32;

        if self.energies.try_push(energy).is_ok() {
            self.accumulated_energy += energy;
        }
        if self.powers.try_push(power).is_ok() {
            self.accumulated_power += power;
        }

        // keep the windows no longer than the configured duration
        let limit = self.window_seconds * self.sample_rate as f32 / nframes as f32;
        while self.energies.len() as f32 + 1.0 > limit {
            match self.energies.pop_front() {
                Some(e) => self.accumulated_energy -= e,
                None => break,
            }
            if let Some(p) = self.powers.pop_front() {
                self.accumulated_power -= p;
            }
        }
    }
}
