//! These modules are shared between the audio engine and the control loop.
pub mod atomic_float;
pub mod box_error;
pub mod config;
pub mod micro_timer;
