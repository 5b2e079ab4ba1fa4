//! Modules related to DSP algorithms: ring buffers, energy windows, the
//! autocorrelation period estimator, the note quantizer and the tone
//! oscillator.

pub mod capture_buffer;
pub mod energy_meter;
pub mod oscillator;
pub mod period_estimator;
pub mod ring_buffer;
pub mod tuner;
