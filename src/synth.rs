use crate::params::PatchSettings;
use crate::util::OutputFault;

/// An engine the host can drive from the audio thread.
///
/// None of these may allocate, lock or block.
pub trait Synth: Send {
    fn allocate_resources(&mut self, sample_rate: f32, max_block_size: usize);
    fn reset(&mut self);

    /// Swap in a complete new set of parameters. Called between renders only.
    fn apply_settings(&mut self, settings: &PatchSettings);

    fn midi_message(&mut self, status: u8, data1: u8, data2: u8);

    /// Fill `left` (and `right`, when there is one) with the next samples.
    fn render(&mut self, left: &mut [f32], right: Option<&mut [f32]>) -> Option<OutputFault>;
}
