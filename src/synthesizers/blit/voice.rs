use std::f32::consts::FRAC_PI_4;

use super::envelope::Envelope;
use super::filter::Filter;
use super::oscillator::Oscillator;

/// `note` value for a voice that is only sounding because the sustain pedal is down.
pub const SUSTAIN: i32 = -1;

const MIN_CUTOFF: f32 = 30.0;
const MAX_CUTOFF: f32 = 20000.0;

#[derive(Clone, Debug)]
pub struct Voice {
    /// MIDI note, 0 when free, `SUSTAIN` when held by the pedal.
    pub note: i32,
    pub saw: f32,
    pub period: f32,
    pub target_period: f32,
    pub glide_rate: f32,
    pub pan_left: f32,
    pub pan_right: f32,

    pub osc1: Oscillator,
    pub osc2: Oscillator,
    pub filter: Filter,
    pub env: Envelope,
    pub filter_env: Envelope,

    pub cutoff: f32,
    pub filter_q: f32,
    pub filter_env_depth: f32,
    pub filter_mod: f32,
    pub pitch_bend: f32,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        let mut voice = Self {
            note: 0,
            saw: 0.0,
            period: 0.0,
            target_period: 0.0,
            glide_rate: 1.0,
            pan_left: 0.0,
            pan_right: 0.0,
            osc1: Oscillator::default(),
            osc2: Oscillator::default(),
            filter: Filter::new(sample_rate),
            env: Envelope::default(),
            filter_env: Envelope::default(),
            cutoff: 1000.0,
            filter_q: 1.0,
            filter_env_depth: 0.0,
            filter_mod: 0.0,
            pitch_bend: 1.0,
        };
        voice.reset();
        voice
    }

    pub fn reset(&mut self) {
        self.note = 0;
        self.pan_left = 0.707;
        self.pan_right = 0.707;
        self.silence();
    }

    /// Clear every bit of sound state but keep the note, which may be a queued mono note.
    pub fn silence(&mut self) {
        self.saw = 0.0;
        self.osc1.reset();
        self.osc2.reset();
        self.env.reset();
        self.filter_env.reset();
        self.filter.reset();
    }

    pub fn render(&mut self, input: f32) -> f32 {
        let sample1 = self.osc1.next_sample();
        let sample2 = self.osc2.next_sample();

        // Leaky integrator: turns the impulse trains into a saw and blocks DC.
        // The minus inverts the second oscillator.
        self.saw = self.saw * 0.997 + (sample1 - sample2);

        let output = self.filter.render(self.saw + input);
        output * self.env.next_value()
    }

    pub fn release(&mut self) {
        self.env.release();
        self.filter_env.release();
    }

    /// Equal-power panning, two octaves either side of middle C is hard left/right.
    pub fn update_panning(&mut self) {
        let panning = ((self.note as f32 - 60.0) / 24.0).clamp(-1.0, 1.0);
        self.pan_left = (FRAC_PI_4 * (1.0 - panning)).sin();
        self.pan_right = (FRAC_PI_4 * (1.0 + panning)).sin();
    }

    pub fn update_period(&mut self, pitch_bend: f32, detune: f32) {
        self.osc1.period = self.period * pitch_bend;
        self.osc2.period = self.osc1.period * detune;
    }

    /// Glide and filter modulation, once per LFO step.
    pub fn update_lfo(&mut self) {
        self.period += self.glide_rate * (self.target_period - self.period);

        self.filter_env.next_value();
        let cutoff = self.modulated_cutoff();
        self.filter.update_coefficients(cutoff, self.filter_q);
    }

    /// Cutoff in Hz from the key-tracked base, LFO, filter envelope and pitch bend.
    pub fn modulated_cutoff(&self) -> f32 {
        (self.cutoff * (self.filter_mod + self.filter_env_depth * self.filter_env.level).exp()
            / self.pitch_bend)
            .clamp(MIN_CUTOFF, MAX_CUTOFF)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn voice_at(note: i32) -> Voice {
        let mut voice = Voice::new(44100.0);
        voice.note = note;
        voice.update_panning();
        voice
    }

    #[test]
    fn middle_c_is_centered() {
        let voice = voice_at(60);
        assert!((voice.pan_left - 0.7071).abs() < 1e-3);
        assert!((voice.pan_right - 0.7071).abs() < 1e-3);
    }

    #[test]
    fn two_octaves_up_is_hard_right() {
        let voice = voice_at(84);
        assert!((voice.pan_right - 1.0).abs() < 1e-6);
        assert!(voice.pan_left.abs() < 1e-6);

        let voice = voice_at(108);
        assert!((voice.pan_right - 1.0).abs() < 1e-6);
    }

    #[test]
    fn two_octaves_down_is_hard_left() {
        let voice = voice_at(36);
        assert!((voice.pan_left - 1.0).abs() < 1e-6);
        assert!(voice.pan_right.abs() < 1e-6);
    }

    #[test]
    fn panning_keeps_equal_power() {
        for note in 0..128 {
            let voice = voice_at(note);
            let power = voice.pan_left * voice.pan_left + voice.pan_right * voice.pan_right;
            assert!((power - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn glide_moves_a_fraction_each_step() {
        let mut voice = voice_at(60);
        voice.period = 200.0;
        voice.target_period = 100.0;
        voice.glide_rate = 0.25;
        voice.update_lfo();
        assert!((voice.period - 175.0).abs() < 1e-4);
        for _ in 0..200 {
            voice.update_lfo();
        }
        assert!((voice.period - 100.0).abs() < 1e-3);
    }

    #[test]
    fn cutoff_is_clamped() {
        let mut voice = voice_at(60);
        voice.cutoff = 1e6;
        assert_eq!(voice.modulated_cutoff(), MAX_CUTOFF);
        voice.cutoff = 1.0;
        assert_eq!(voice.modulated_cutoff(), MIN_CUTOFF);
        voice.cutoff = 1000.0;
        voice.pitch_bend = 2.0;
        assert!((voice.modulated_cutoff() - 500.0).abs() < 1e-3);
    }

    #[test]
    fn silent_without_an_envelope() {
        let mut voice = voice_at(60);
        voice.period = 100.0;
        voice.update_period(1.0, 1.0);
        for _ in 0..100 {
            assert_eq!(voice.render(0.0), 0.0);
        }
    }

    #[test]
    fn silence_keeps_the_note() {
        let mut voice = voice_at(64);
        voice.saw = 3.0;
        voice.silence();
        assert_eq!(voice.note, 64);
        assert_eq!(voice.saw, 0.0);
        voice.reset();
        assert_eq!(voice.note, 0);
    }
}
