pub mod audio;
pub mod config;
pub mod midi;
pub mod midi_controller;
pub mod params;
pub mod synth;
pub mod synth_controller;
pub mod synthesizers;
pub mod util;

pub use params::{ParamId, ParamStore, PatchSettings};
pub use synth::Synth;
pub use synthesizers::blit::BlitSynth;
pub use util::OutputFault;
