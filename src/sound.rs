//! components used to run the pitchbox engine against an audio backend

/// one block of mono audio in, one block out
///
/// Implemented by the engine and called from the real-time thread, so
/// implementations must not block or allocate.  A false return tells the
/// backend to stop processing.
pub trait BlockProcessor: Send {
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> bool;
    fn on_block_size_changed(&mut self, block_size: usize);
}

pub mod client;
pub mod dsp_engine;
pub mod jack_thread;
pub mod param_message;
pub mod synth_link;
