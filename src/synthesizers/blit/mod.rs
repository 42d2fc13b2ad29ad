//! Subtractive synth built on band-limited impulse train oscillators.
//!
//! Each voice subtracts two detuned impulse trains and integrates them into a
//! saw (or a pulse, when the second train is phase locked half a period
//! behind), runs that through a ladder filter with its own envelope, and
//! applies an amplitude envelope. Voices live in a fixed array; in mono mode
//! the spare slots double as a stack of held notes for legato playing.

pub mod envelope;
pub mod filter;
pub mod noise;
pub mod oscillator;
pub mod params;
pub mod voice;

use std::f32::consts::PI;

use crate::params::{GlideMode, PatchSettings};
use crate::synth::Synth;
use crate::util::{protect_your_ears, LinearSmoother, OutputFault};

use envelope::Envelope;
use noise::NoiseGenerator;
pub use params::{Parameters, ANALOG, LFO_MAX, MAX_VOICES};
pub use voice::{Voice, SUSTAIN};

const TWO_PI: f32 = 2.0 * PI;
const SEMITONE: f32 = 1.059463094359;

/// Shortest oscillator period in samples the BLIT can render reliably.
const MIN_PERIOD: f32 = 6.0;

const OUTPUT_RAMP_SECONDS: f32 = 0.05;

const MIDI_MOD_WHEEL: u8 = 0x01;
const MIDI_FILTER_UP: u8 = 0x02;
const MIDI_FILTER_DOWN: u8 = 0x03;
const MIDI_SUSTAIN_PEDAL: u8 = 0x40;
const MIDI_RESONANCE: u8 = 0x47;
const MIDI_CHANNEL_MODE: u8 = 0x78;

pub struct BlitSynth {
    sample_rate: f32,
    settings: PatchSettings,
    params: Parameters,
    voices: [Voice; MAX_VOICES],
    noise_gen: NoiseGenerator,

    lfo_step: i32,
    lfo: f32,

    sustain_pedal_pressed: bool,
    pitch_bend: f32,
    mod_wheel: f32,
    filter_ctl: f32,
    filter_zip: f32,
    resonance_ctl: f32,
    pressure: f32,
    last_note: i32,

    output_level: LinearSmoother,
}

impl BlitSynth {
    pub fn new(sample_rate: f32) -> Self {
        let settings = PatchSettings::default();
        let params = Parameters::derive(&settings, sample_rate);
        let mut synth = Self {
            sample_rate,
            output_level: LinearSmoother::new(params.output_level),
            settings,
            params,
            voices: std::array::from_fn(|_| Voice::new(sample_rate)),
            noise_gen: NoiseGenerator::default(),
            lfo_step: 0,
            lfo: 0.0,
            sustain_pedal_pressed: false,
            pitch_bend: 1.0,
            mod_wheel: 0.0,
            filter_ctl: 0.0,
            filter_zip: 0.0,
            resonance_ctl: 1.0,
            pressure: 0.0,
            last_note: 0,
        };
        synth.reset();
        synth
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn sustain_pedal_pressed(&self) -> bool {
        self.sustain_pedal_pressed
    }

    pub fn pitch_bend(&self) -> f32 {
        self.pitch_bend
    }

    pub fn mod_wheel(&self) -> f32 {
        self.mod_wheel
    }

    /// Replace the whole parameter snapshot.
    pub fn set_parameters(&mut self, params: Parameters) {
        let mode_changed = params.num_voices != self.params.num_voices;
        self.params = params;
        self.output_level.set_target(self.params.output_level);

        // The note fields mean different things in mono and poly mode.
        if mode_changed {
            self.all_notes_off();
        }
    }

    fn all_notes_off(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.release();
            voice.note = 0;
        }
        self.sustain_pedal_pressed = false;
        self.last_note = 0;
    }

    fn update_lfo(&mut self) {
        self.lfo_step -= 1;
        if self.lfo_step > 0 {
            return;
        }
        self.lfo_step = LFO_MAX;

        self.lfo += self.params.lfo_inc;
        if self.lfo > PI {
            self.lfo -= TWO_PI;
        }

        let sine = self.lfo.sin();
        let vibrato_mod = 1.0 + sine * (self.mod_wheel + self.params.vibrato);
        let pwm = 1.0 + sine * (self.mod_wheel + self.params.pwm_depth);
        let filter_mod = self.params.filter_key_tracking
            + self.filter_zip
            + (self.params.filter_lfo_depth + self.pressure) * sine;
        self.filter_zip += 0.005 * (self.filter_ctl - self.filter_zip);

        let (pitch_bend, detune) = (self.pitch_bend, self.params.detune);
        for voice in self.voices.iter_mut() {
            if voice.env.is_active() {
                voice.osc1.modulation = vibrato_mod;
                voice.osc2.modulation = pwm;
                voice.filter_mod = filter_mod;
                voice.update_lfo();
                voice.update_period(pitch_bend, detune);
            }
        }
    }

    fn note_on(&mut self, note: i32, mut velocity: i32) {
        if self.params.ignore_velocity {
            velocity = 80;
        }

        let mut v = 0;
        if self.params.num_voices == 1 {
            if self.voices[0].note > 0 {
                self.shift_queued_notes();
                // A held note that decayed to silence has nothing left to slide from.
                if self.voices[0].env.is_active() {
                    self.restart_mono_voice(note, velocity);
                    return;
                }
            }
        } else {
            v = self.find_free_voice();
        }
        self.start_voice(v, note, velocity);
    }

    fn note_off(&mut self, note: i32) {
        if self.params.num_voices == 1 && self.voices[0].note == note {
            let queued_note = self.next_queued_note();
            if queued_note > 0 {
                self.restart_mono_voice(queued_note, -1);
            }
        }

        let pedal = self.sustain_pedal_pressed;
        for voice in self.voices.iter_mut() {
            if voice.note == note {
                if pedal {
                    voice.note = SUSTAIN;
                } else {
                    voice.release();
                    voice.note = 0;
                }
            }
        }
    }

    fn start_voice(&mut self, v: usize, note: i32, velocity: i32) {
        let period = self.calc_period(v, note);

        let glide = match self.params.glide_mode {
            GlideMode::Off => false,
            GlideMode::Legato => self.is_playing_legato_style(),
            GlideMode::Always => true,
        };
        let note_distance = if self.last_note > 0 && glide {
            note - self.last_note
        } else {
            0
        };
        self.last_note = note;

        let params = &self.params;
        let voice = &mut self.voices[v];
        voice.target_period = period;
        voice.period = (period * SEMITONE.powf(note_distance as f32 - params.glide_bend))
            .max(MIN_PERIOD);
        voice.note = note;
        voice.update_panning();

        let vel = 0.004 * ((velocity + 64) * (velocity + 64)) as f32 - 8.0;
        voice.osc1.amplitude = params.volume_trim * vel;
        voice.osc2.amplitude = voice.osc1.amplitude * params.osc_mix;

        if params.vibrato == 0.0 && params.pwm_depth > 0.0 {
            voice.osc2.square_wave(&voice.osc1, voice.period);
        }

        voice.cutoff = self.sample_rate / (period * PI);
        voice.cutoff *= (params.velocity_sensitivity * (velocity - 64) as f32).exp();

        load_envelope(
            &mut voice.env,
            params.env_attack,
            params.env_decay,
            params.env_sustain,
            params.env_release,
        );
        voice.env.attack();

        load_envelope(
            &mut voice.filter_env,
            params.filter_attack,
            params.filter_decay,
            params.filter_sustain,
            params.filter_release,
        );
        voice.filter_env.attack();
    }

    /// Move the mono voice to a new note without restarting its envelopes.
    fn restart_mono_voice(&mut self, note: i32, velocity: i32) {
        let period = self.calc_period(0, note);

        let params = &self.params;
        let voice = &mut self.voices[0];
        voice.target_period = period;
        if params.glide_mode == GlideMode::Off {
            voice.period = period;
        }

        voice.env.nudge();
        voice.note = note;
        voice.update_panning();

        voice.cutoff = self.sample_rate / (period * PI);
        if velocity > 0 {
            voice.cutoff *= (params.velocity_sensitivity * (velocity - 64) as f32).exp();
        }
    }

    fn control_change(&mut self, data1: u8, data2: u8) {
        let value = f32::from(data2);
        match data1 {
            MIDI_MOD_WHEEL => self.mod_wheel = 0.000005 * value * value,
            MIDI_FILTER_UP => self.filter_ctl = 0.02 * value,
            MIDI_FILTER_DOWN => self.filter_ctl = -0.03 * value,
            MIDI_SUSTAIN_PEDAL => {
                self.sustain_pedal_pressed = data2 >= 64;
                if !self.sustain_pedal_pressed {
                    self.note_off(SUSTAIN);
                }
            }
            MIDI_RESONANCE => self.resonance_ctl = 154.0 / (154.0 - value),
            _ if data1 >= MIDI_CHANNEL_MODE => {
                // All notes off, all sound off, reset controllers and friends.
                for voice in self.voices.iter_mut() {
                    voice.reset();
                }
                self.sustain_pedal_pressed = false;
            }
            _ => {}
        }
    }

    /// Period in samples for `note` on voice `v`, kept long enough for the BLIT.
    pub fn calc_period(&self, v: usize, note: i32) -> f32 {
        let mut period =
            self.params.tune * (-0.05776226505 * (note as f32 + ANALOG * v as f32)).exp();
        while period > 0.0 && (period < MIN_PERIOD || period * self.params.detune < MIN_PERIOD) {
            period += period;
        }
        period
    }

    /// The quietest voice that is not still in its attack, or voice 0.
    fn find_free_voice(&self) -> usize {
        let mut v = 0;
        let mut l = 100.0; // Louder than any envelope.

        for (i, voice) in self.voices.iter().enumerate() {
            if voice.env.level < l && !voice.env.is_in_attack_stage() {
                l = voice.env.level;
                v = i;
            }
        }
        v
    }

    fn is_playing_legato_style(&self) -> bool {
        self.voices.iter().any(|voice| voice.note > 0)
    }

    /// Push the held notes one slot up the mono queue.
    fn shift_queued_notes(&mut self) {
        for i in (1..MAX_VOICES).rev() {
            self.voices[i].note = self.voices[i - 1].note;
            self.voices[i].release();
        }
    }

    /// Pop the most recently queued note, or 0 when nothing is held.
    fn next_queued_note(&mut self) -> i32 {
        let mut held = 0;
        for v in (1..MAX_VOICES).rev() {
            if self.voices[v].note > 0 {
                held = v;
            }
        }

        if held > 0 {
            let note = self.voices[held].note;
            self.voices[held].note = 0;
            return note;
        }
        0
    }
}

fn load_envelope(env: &mut Envelope, attack: f32, decay: f32, sustain: f32, release: f32) {
    env.attack_multiplier = attack;
    env.decay_multiplier = decay;
    env.sustain_level = sustain;
    env.release_multiplier = release;
}

impl Synth for BlitSynth {
    fn allocate_resources(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        for voice in self.voices.iter_mut() {
            voice.filter.set_sample_rate(sample_rate);
        }
        self.params = Parameters::derive(&self.settings, sample_rate);
    }

    fn reset(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.reset();
        }
        self.noise_gen.reset();
        self.sustain_pedal_pressed = false;
        self.pitch_bend = 1.0;
        self.mod_wheel = 0.0;
        self.filter_ctl = 0.0;
        self.filter_zip = 0.0;
        self.resonance_ctl = 1.0;
        self.pressure = 0.0;
        self.last_note = 0;
        self.lfo = 0.0;
        self.lfo_step = 0;

        self.output_level.reset(self.sample_rate, OUTPUT_RAMP_SECONDS);
        self.output_level.set_current_and_target(self.params.output_level);
    }

    fn apply_settings(&mut self, settings: &PatchSettings) {
        self.settings.clone_from(settings);
        self.set_parameters(Parameters::derive(settings, self.sample_rate));
    }

    fn midi_message(&mut self, status: u8, data1: u8, data2: u8) {
        let data1 = data1 & 0x7F;
        let data2 = data2 & 0x7F;

        match status & 0xF0 {
            // Note off
            0x80 => self.note_off(i32::from(data1)),

            // Note on, velocity 0 is a note off
            0x90 => {
                if data2 > 0 {
                    self.note_on(i32::from(data1), i32::from(data2));
                } else {
                    self.note_off(i32::from(data1));
                }
            }

            0xB0 => self.control_change(data1, data2),

            // Channel pressure
            0xD0 => {
                let value = f32::from(data1);
                self.pressure = 0.0001 * value * value;
            }

            0xE0 => {
                let bend = f32::from(data1) + 128.0 * f32::from(data2) - 8192.0;
                self.pitch_bend = (-0.000014102 * bend).exp();
            }

            _ => {}
        }
    }

    fn render(&mut self, left: &mut [f32], mut right: Option<&mut [f32]>) -> Option<OutputFault> {
        let sample_count = match &right {
            Some(right) => left.len().min(right.len()),
            None => left.len(),
        };

        let params = &self.params;
        let (pitch_bend, resonance_ctl) = (self.pitch_bend, self.resonance_ctl);
        for voice in self.voices.iter_mut() {
            if voice.env.is_active() {
                voice.update_period(pitch_bend, params.detune);
                voice.glide_rate = params.glide_rate;
                voice.filter_q = params.filter_q * resonance_ctl;
                voice.pitch_bend = pitch_bend;
                voice.filter_env_depth = params.filter_env_depth;
            }
        }

        for sample in 0..sample_count {
            self.update_lfo();
            let noise = self.noise_gen.next_value() * self.params.noise_mix;

            let mut output_left = 0.0;
            let mut output_right = 0.0;
            for voice in self.voices.iter_mut() {
                if voice.env.is_active() {
                    let output = voice.render(noise);
                    output_left += output * voice.pan_left;
                    output_right += output * voice.pan_right;
                }
            }

            let output_level = self.output_level.next_value();
            output_left *= output_level;
            output_right *= output_level;

            match right.as_deref_mut() {
                Some(right) => {
                    left[sample] = output_left;
                    right[sample] = output_right;
                }
                None => left[sample] = (output_left + output_right) * 0.5,
            }
        }

        // Voices that faded out start from a clean slate next time.
        for voice in self.voices.iter_mut() {
            if !voice.env.is_active() {
                voice.silence();
            }
        }

        let mut fault = protect_your_ears(&mut left[..sample_count]);
        if let Some(right) = right {
            fault = fault.max(protect_your_ears(&mut right[..sample_count]));
        }
        fault
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PolyMode;
    use super::envelope::Stage;
    use proptest::prelude::*;

    const SR: f32 = 44100.0;

    fn synth_with(settings: &PatchSettings) -> BlitSynth {
        let mut synth = BlitSynth::new(SR);
        synth.apply_settings(settings);
        synth
    }

    fn render(synth: &mut BlitSynth, samples: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; samples];
        let mut right = vec![0.0; samples];
        synth.render(&mut left, Some(&mut right));
        (left, right)
    }

    fn voice_playing(synth: &BlitSynth, note: i32) -> Option<usize> {
        synth.voices().iter().position(|v| v.note == note)
    }

    proptest! {
        #[test]
        fn period_never_drops_below_six_samples(
            note in 0i32..128,
            osc_tune in -24.0f32..=24.0,
            osc_fine in -50.0f32..=50.0,
            octave in -2i32..=2,
            tuning in -100.0f32..=100.0,
            v in 0usize..MAX_VOICES,
        ) {
            let mut settings = PatchSettings::default();
            settings.osc_tune = osc_tune;
            settings.osc_fine = osc_fine;
            settings.octave = octave as f32;
            settings.tuning = tuning;
            let synth = synth_with(&settings);

            let period = synth.calc_period(v, note);
            prop_assert!(period >= MIN_PERIOD);
            prop_assert!(period * synth.parameters().detune >= MIN_PERIOD);
        }
    }

    #[test]
    fn period_follows_equal_temperament() {
        let synth = BlitSynth::new(SR);
        let a4 = synth.calc_period(0, 69);
        let a5 = synth.calc_period(0, 81);
        assert!((SR / a4 - 440.0).abs() < 0.5);
        assert!((a4 / a5 - 2.0).abs() < 1e-3);
        assert!(synth.calc_period(3, 69) < a4);
    }

    #[test]
    fn pitch_bend_centre_is_unity() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0xE0, 0x00, 0x40);
        assert_eq!(synth.pitch_bend(), 1.0);

        synth.midi_message(0xE3, 0x7F, 0x7F);
        let up = synth.pitch_bend();
        assert!(up < 1.0);
        assert!((1.0 / up - 2f32.powf(2.0 / 12.0)).abs() < 1e-2);
    }

    #[test]
    fn mod_wheel_is_quadratic() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0xB0, 0x01, 100);
        assert!((synth.mod_wheel() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn zero_velocity_note_on_is_a_note_off() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0x90, 60, 100);
        let v = voice_playing(&synth, 60).unwrap();
        synth.midi_message(0x90, 60, 0);
        assert_eq!(synth.voices()[v].note, 0);
        assert_eq!(synth.voices()[v].env.stage(), Stage::Release);
    }

    #[test]
    fn free_voice_skips_attacking_voices() {
        let mut synth = BlitSynth::new(SR);
        for (i, note) in (60u8..67).enumerate() {
            synth.midi_message(0x90, note, 100);
            assert_eq!(voice_playing(&synth, i32::from(note)), Some(i));
        }
        render(&mut synth, 2000);

        synth.midi_message(0x90, 67, 100);
        assert_eq!(voice_playing(&synth, 67), Some(7));
        assert!(synth.voices()[7].env.is_in_attack_stage());

        // Everything is busy, the newest voice is the quietest but still rising.
        assert_ne!(synth.find_free_voice(), 7);
    }

    #[test]
    fn ninth_note_steals_exactly_one_voice() {
        let mut synth = BlitSynth::new(SR);
        for note in 60..67 {
            synth.midi_message(0x90, note, 100);
        }
        render(&mut synth, 2000);
        synth.midi_message(0x90, 67, 100);
        synth.midi_message(0x90, 68, 100);

        let notes: Vec<i32> = synth.voices().iter().map(|v| v.note).collect();
        assert_eq!(notes.iter().filter(|&&n| n > 0).count(), MAX_VOICES);
        assert_eq!(notes.iter().filter(|&&n| (60..67).contains(&n)).count(), 6);
        assert_eq!(voice_playing(&synth, 67), Some(7));
        assert!(voice_playing(&synth, 68).is_some());
    }

    #[test]
    fn released_voices_are_reused_first() {
        let mut synth = BlitSynth::new(SR);
        for note in 60..68 {
            synth.midi_message(0x90, note, 100);
        }
        render(&mut synth, 2000);
        synth.midi_message(0x80, 63, 0);
        render(&mut synth, 2000);

        synth.midi_message(0x90, 72, 100);
        assert_eq!(voice_playing(&synth, 72), Some(3));
    }

    #[test]
    fn mono_legato_glides_without_retriggering() {
        let mut settings = PatchSettings::default();
        settings.poly_mode = PolyMode::Mono;
        settings.glide_mode = GlideMode::Legato;
        let mut synth = synth_with(&settings);

        synth.midi_message(0x90, 60, 100);
        render(&mut synth, 2000);
        let period_60 = synth.calc_period(0, 60);
        let level = synth.voices()[0].env.level;
        assert!((synth.voices()[0].period - period_60).abs() < 1e-3);

        synth.midi_message(0x90, 64, 100);
        let period_64 = synth.calc_period(0, 64);
        let mono = &synth.voices()[0];
        assert_eq!(mono.note, 64);
        assert_eq!(mono.target_period, period_64);
        assert!(mono.env.level >= level);
        assert!(!mono.env.is_in_attack_stage());
        assert_eq!(synth.voices()[1].note, 60);

        render(&mut synth, 64);
        let mono = &synth.voices()[0];
        assert!(mono.period < period_60 && mono.period > period_64);

        render(&mut synth, 8000);
        assert!((synth.voices()[0].period - period_64).abs() < 0.01 * period_64);

        synth.midi_message(0x80, 64, 0);
        let mono = &synth.voices()[0];
        assert_eq!(mono.note, 60);
        assert_eq!(mono.target_period, period_60);
        assert!(mono.env.is_active());
        assert_eq!(synth.voices()[1].note, 0);

        render(&mut synth, 8000);
        assert!((synth.voices()[0].period - period_60).abs() < 0.01 * period_60);
    }

    #[test]
    fn mono_without_glide_jumps() {
        let mut settings = PatchSettings::default();
        settings.poly_mode = PolyMode::Mono;
        let mut synth = synth_with(&settings);

        synth.midi_message(0x90, 60, 100);
        render(&mut synth, 500);
        synth.midi_message(0x90, 67, 100);
        assert_eq!(synth.voices()[0].period, synth.calc_period(0, 67));

        synth.midi_message(0x80, 67, 0);
        assert_eq!(synth.voices()[0].period, synth.calc_period(0, 60));

        synth.midi_message(0x80, 60, 0);
        assert_eq!(synth.voices()[0].note, 0);
        assert_eq!(synth.voices()[0].env.stage(), Stage::Release);
    }

    #[test]
    fn mono_queue_drops_released_notes() {
        let mut settings = PatchSettings::default();
        settings.poly_mode = PolyMode::Mono;
        let mut synth = synth_with(&settings);

        synth.midi_message(0x90, 60, 100);
        synth.midi_message(0x90, 62, 100);
        synth.midi_message(0x90, 64, 100);
        // 62 is queued, not sounding
        synth.midi_message(0x80, 62, 0);

        synth.midi_message(0x80, 64, 0);
        assert_eq!(synth.voices()[0].note, 60);
    }

    #[test]
    fn sustain_pedal_holds_notes_until_lifted() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0xB0, 0x40, 127);
        assert!(synth.sustain_pedal_pressed());

        synth.midi_message(0x90, 60, 100);
        synth.midi_message(0x90, 64, 100);
        render(&mut synth, 1000);
        synth.midi_message(0x80, 60, 0);
        synth.midi_message(0x80, 64, 0);

        let held: Vec<&Voice> = synth.voices().iter().filter(|v| v.note == SUSTAIN).collect();
        assert_eq!(held.len(), 2);
        assert!(held.iter().all(|v| v.env.stage() != Stage::Release));

        render(&mut synth, 10_000);
        assert!(synth.voices().iter().filter(|v| v.env.is_active()).count() == 2);

        synth.midi_message(0xB0, 0x40, 0);
        assert!(!synth.sustain_pedal_pressed());
        assert!(synth.voices().iter().all(|v| v.note == 0));
        assert_eq!(
            synth
                .voices()
                .iter()
                .filter(|v| v.env.stage() == Stage::Release)
                .count(),
            2
        );
    }

    #[test]
    fn channel_mode_messages_silence_everything() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0xB0, 0x40, 127);
        synth.midi_message(0x90, 60, 100);
        synth.midi_message(0x90, 67, 100);
        render(&mut synth, 100);

        synth.midi_message(0xB0, 123, 0);
        assert!(!synth.sustain_pedal_pressed());
        assert!(synth.voices().iter().all(|v| v.note == 0 && !v.env.is_active()));

        let (left, right) = render(&mut synth, 256);
        assert!(left.iter().chain(right.iter()).all(|&x| x == 0.0));
    }

    #[test]
    fn switching_mode_releases_held_notes() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0x90, 60, 100);
        synth.midi_message(0x90, 64, 100);

        let mut settings = PatchSettings::default();
        settings.poly_mode = PolyMode::Mono;
        synth.apply_settings(&settings);

        assert!(synth.voices().iter().all(|v| v.note == 0));
        assert_eq!(synth.parameters().num_voices, 1);

        // Same mode again leaves playing notes alone.
        synth.midi_message(0x90, 62, 100);
        synth.apply_settings(&settings);
        assert_eq!(synth.voices()[0].note, 62);
    }

    #[test]
    fn pwm_mode_locks_the_second_oscillator() {
        let mut settings = PatchSettings::default();
        settings.vibrato = -50.0;
        settings.osc_mix = 100.0;
        settings.osc_tune = 0.0;
        let mut synth = synth_with(&settings);

        synth.midi_message(0x90, 60, 100);
        let (left, right) = render(&mut synth, 4096);
        assert!(left.iter().chain(right.iter()).all(|x| x.is_finite()));
        assert!(left.iter().any(|x| x.abs() > 1e-3));
    }

    #[test]
    fn note_renders_and_releases_to_silence() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0x90, 60, 100);

        let mut left = vec![0.0; 4096];
        let mut right = vec![0.0; 4096];
        assert_eq!(synth.render(&mut left, Some(&mut right)), None);
        assert!(left.iter().any(|x| x.abs() > 1e-3));
        assert!(left.iter().chain(right.iter()).all(|x| x.is_finite() && x.abs() <= 1.0));

        synth.midi_message(0x80, 60, 0);
        for _ in 0..30 {
            synth.render(&mut left, Some(&mut right));
        }
        assert!(synth.voices().iter().all(|v| !v.env.is_active()));
        synth.render(&mut left, Some(&mut right));
        assert!(left.iter().chain(right.iter()).all(|&x| x == 0.0));
    }

    #[test]
    fn mono_output_is_the_average() {
        let mut stereo = BlitSynth::new(SR);
        let mut mono = BlitSynth::new(SR);
        stereo.midi_message(0x90, 72, 100);
        mono.midi_message(0x90, 72, 100);

        let (left, right) = render(&mut stereo, 512);
        let mut single = vec![0.0; 512];
        mono.render(&mut single, None);

        for i in 0..512 {
            assert!((single[i] - 0.5 * (left[i] + right[i])).abs() < 1e-6);
        }
    }

    #[test]
    fn faded_voices_restart_identically() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0x90, 60, 100);
        let (first, _) = render(&mut synth, 32);

        synth.midi_message(0xB0, 120, 0);
        synth.reset();
        synth.midi_message(0x90, 60, 100);
        let (second, _) = render(&mut synth, 32);
        assert_eq!(first, second);
    }

    #[test]
    fn lfo_drives_vibrato_and_pulse_width() {
        let mut settings = PatchSettings::default();
        settings.vibrato = 100.0;
        let mut synth = synth_with(&settings);
        synth.midi_message(0xB0, 0x01, 64);
        synth.midi_message(0x90, 60, 100);
        render(&mut synth, 4096);

        let sine = synth.lfo.sin();
        let voice = &synth.voices()[0];
        let vibrato = 1.0 + sine * (synth.mod_wheel + synth.params.vibrato);
        let pwm = 1.0 + sine * (synth.mod_wheel + synth.params.pwm_depth);
        assert!((voice.osc1.modulation - vibrato).abs() < 1e-6);
        assert!((voice.osc2.modulation - pwm).abs() < 1e-6);
        assert!((voice.osc1.modulation - 1.0).abs() > 1e-4);
    }

    #[test]
    fn negative_vibrato_only_moves_the_pulse_width() {
        let mut settings = PatchSettings::default();
        settings.vibrato = -100.0;
        let mut synth = synth_with(&settings);
        synth.midi_message(0x90, 60, 100);
        render(&mut synth, 4096);

        let voice = &synth.voices()[0];
        assert_eq!(voice.osc1.modulation, 1.0);
        assert!((voice.osc2.modulation - 1.0).abs() > 1e-4);
    }

    #[test]
    fn pitch_bend_rescales_sounding_voices() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0x90, 60, 100);
        render(&mut synth, 256);
        let unbent = synth.voices()[0].osc1.period;
        assert!((unbent - synth.voices()[0].period).abs() < 1e-4);

        synth.midi_message(0xE0, 0x7F, 0x7F);
        render(&mut synth, 256);
        let voice = &synth.voices()[0];
        let bend = synth.pitch_bend();
        assert!((voice.osc1.period - unbent * bend).abs() < 1e-3);
        assert!((voice.osc2.period - voice.osc1.period * synth.params.detune).abs() < 1e-3);
        assert_eq!(voice.pitch_bend, bend);
    }

    #[test]
    fn filter_controllers_are_smoothed() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0xB0, 0x02, 100);
        assert!((synth.filter_ctl - 2.0).abs() < 1e-6);

        // Ten LFO steps.
        render(&mut synth, 10 * LFO_MAX as usize);
        let mut zip = 0.0f32;
        for _ in 0..10 {
            zip += 0.005 * (2.0 - zip);
        }
        assert!((synth.filter_zip - zip).abs() < 1e-6);
        assert!(synth.filter_zip > 0.0 && synth.filter_zip < 2.0);

        synth.midi_message(0xB0, 0x03, 100);
        assert!((synth.filter_ctl + 3.0).abs() < 1e-6);
        render(&mut synth, 2000 * LFO_MAX as usize);
        assert!((synth.filter_zip + 3.0).abs() < 1e-3);
    }

    #[test]
    fn resonance_controller_scales_filter_q() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0xB0, 0x47, 64);
        assert!((synth.resonance_ctl - 154.0 / 90.0).abs() < 1e-6);

        synth.midi_message(0x90, 60, 100);
        render(&mut synth, 64);
        let expected = synth.params.filter_q * synth.resonance_ctl;
        assert!((synth.voices()[0].filter_q - expected).abs() < 1e-6);
    }

    #[test]
    fn channel_pressure_deepens_the_filter_lfo() {
        let mut synth = BlitSynth::new(SR);
        synth.midi_message(0xD0, 100, 0);
        assert!((synth.pressure - 1.0).abs() < 1e-6);

        synth.midi_message(0x90, 60, 100);
        render(&mut synth, 4096);
        let expected = synth.params.filter_key_tracking
            + synth.filter_zip
            + (synth.params.filter_lfo_depth + synth.pressure) * synth.lfo.sin();
        assert!((synth.voices()[0].filter_mod - expected).abs() < 1e-5);
    }

    #[test]
    fn always_glide_starts_from_the_last_note() {
        let mut settings = PatchSettings::default();
        settings.glide_mode = GlideMode::Always;
        let mut synth = synth_with(&settings);

        synth.midi_message(0x90, 60, 100);
        let first = &synth.voices()[0];
        assert_eq!(first.period, first.target_period);

        synth.midi_message(0x80, 60, 0);
        synth.midi_message(0x90, 64, 100);
        let v = voice_playing(&synth, 64).unwrap();
        let voice = &synth.voices()[v];
        let expected = voice.target_period * SEMITONE.powf(4.0);
        assert!((voice.period - expected).abs() < 1e-3);
        assert!(voice.period > voice.target_period);
    }

    #[test]
    fn glide_bend_offsets_the_start_pitch() {
        let mut settings = PatchSettings::default();
        settings.glide_bend = 12.0;
        let mut synth = synth_with(&settings);

        synth.midi_message(0x90, 48, 100);
        let voice = &synth.voices()[0];
        assert!((voice.period - 0.5 * voice.target_period).abs() < 1e-2);
    }

    #[test]
    fn legato_after_a_silent_mono_note_retriggers() {
        let mut settings = PatchSettings::default();
        settings.poly_mode = PolyMode::Mono;
        settings.env_decay = 0.0;
        settings.env_sustain = 0.0;
        let mut synth = synth_with(&settings);

        synth.midi_message(0x90, 60, 100);
        render(&mut synth, 44100);
        assert!(!synth.voices()[0].env.is_active());
        assert_eq!(synth.voices()[0].note, 60);

        synth.midi_message(0x90, 64, 100);
        let mono = &synth.voices()[0];
        assert_eq!(mono.note, 64);
        assert!(mono.env.is_in_attack_stage());
        assert_eq!(synth.voices()[1].note, 60);

        let (left, _) = render(&mut synth, 4096);
        assert!(left.iter().any(|x| x.abs() > 1e-3));
    }
}
