//! measurement results shared between the control thread and the audio thread
//!
//! The period estimator and tuner run on the control thread; the repeater
//! and autotune paths consume their output every block.  Scalars cross over
//! as relaxed atomics so the audio thread never waits.
use crate::common::atomic_float::AtomicF32;

pub struct SynthLink {
    /// raw detected fundamental in Hz, -1 while no stable period is held
    pub frequency: AtomicF32,
    /// nearest note frequency in Hz, -1 while nothing is sounding
    pub tuned_frequency: AtomicF32,
    /// energy of the captured signal, scales the synthesized amplitude
    pub capture_energy: AtomicF32,
}

impl SynthLink {
    pub fn new() -> SynthLink {
        SynthLink {
            frequency: AtomicF32::new(-1.0),
            tuned_frequency: AtomicF32::new(-1.0),
            capture_energy: AtomicF32::new(0.0),
        }
    }

    /// back to the nothing-detected state
    pub fn reset(&self) -> () {
        self.frequency.store(-1.0);
        self.tuned_frequency.store(-1.0);
        self.capture_energy.store(0.0);
    }
}

impl Default for SynthLink {
    fn default() -> SynthLink {
        SynthLink::new()
    }
}

#[cfg(test)]
mod test_synth_link {
    use super::*;

    #[test]
    fn starts_with_sentinels() {
        let link = SynthLink::new();
        assert_eq!(link.frequency.load(), -1.0);
        assert_eq!(link.tuned_frequency.load(), -1.0);
        assert_eq!(link.capture_energy.load(), 0.0);
    }

    #[test]
    fn reset_restores_sentinels() {
        let link = SynthLink::new();
        link.frequency.store(220.0);
        link.tuned_frequency.store(220.0);
        link.capture_energy.store(12.0);
        link.reset();
        assert_eq!(link.frequency.load(), -1.0);
        assert_eq!(link.capture_energy.load(), 0.0);
    }
}
