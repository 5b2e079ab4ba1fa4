//! f32 stored as bits in an AtomicU32
//!
//! The control thread publishes measurement results (detected frequency,
//! capture energy) that the audio thread reads every block.  The audio
//! thread must never wait on a lock, so the values travel as bit-cast
//! atomics instead.
use std::sync::atomic::{AtomicU32, Ordering};

pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> AtomicF32 {
        AtomicF32 {
            bits: AtomicU32::new(value.to_bits()),
        }
    }
    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
    pub fn store(&self, value: f32) -> () {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}
