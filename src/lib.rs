//! pitchbox - a pitch measurement and resynthesis engine
//!
//! provides library elements to run a jack-connected audio client that can
//! pass audio through, measure its energy, estimate its fundamental period,
//! show the nearest note, and resynthesize the detected or corrected pitch
extern crate json;
#[macro_use]
extern crate num_derive;

pub mod common;
pub mod dsp;
pub mod sound;
pub mod utils;
