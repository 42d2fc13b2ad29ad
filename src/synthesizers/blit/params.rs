use std::f32::consts::PI;

use super::envelope::{envelope_multiplier, SILENCE};
use crate::params::{GlideMode, PatchSettings, PolyMode};

pub const MAX_VOICES: usize = 8;

/// The LFO, glide and filter envelope run once every this many samples.
pub const LFO_MAX: i32 = 32;

/// Per-voice detune in semitones, for a slightly unstable analog feel.
pub const ANALOG: f32 = 0.002;

const SEMITONE: f32 = 1.059463094359;

/// Engine-ready values derived from a `PatchSettings`.
///
/// Replaced as a whole whenever the settings change.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameters {
    pub num_voices: usize,

    pub osc_mix: f32,
    pub detune: f32,
    /// Period in samples of MIDI note 0, before octave doubling.
    pub tune: f32,
    pub volume_trim: f32,
    pub noise_mix: f32,
    /// Linear gain.
    pub output_level: f32,

    pub velocity_sensitivity: f32,
    pub ignore_velocity: bool,

    pub lfo_inc: f32,
    pub vibrato: f32,
    pub pwm_depth: f32,

    pub glide_mode: GlideMode,
    pub glide_rate: f32,
    pub glide_bend: f32,

    pub env_attack: f32,
    pub env_decay: f32,
    pub env_sustain: f32,
    pub env_release: f32,

    pub filter_key_tracking: f32,
    pub filter_q: f32,
    pub filter_env_depth: f32,
    pub filter_lfo_depth: f32,
    pub filter_attack: f32,
    pub filter_decay: f32,
    pub filter_sustain: f32,
    pub filter_release: f32,
}

/// Seconds for an envelope stage set to `percent` to fall by 80 dB.
pub fn envelope_time(percent: f32) -> f32 {
    -SILENCE.ln() * (0.075 * percent - 5.5).exp()
}

fn stage_multiplier(rate: f32, percent: f32) -> f32 {
    envelope_multiplier(rate, envelope_time(percent))
}

fn release_multiplier(rate: f32, percent: f32) -> f32 {
    if percent < 1.0 {
        // Extra fast release.
        0.75
    } else {
        stage_multiplier(rate, percent)
    }
}

impl Parameters {
    pub fn derive(settings: &PatchSettings, sample_rate: f32) -> Self {
        // Everything updated at LFO rate runs at this rate.
        let update_rate = sample_rate / LFO_MAX as f32;

        let noise = settings.noise / 100.0;
        let noise_mix = 0.06 * noise * noise;
        let osc_mix = settings.osc_mix / 100.0;

        let detune = SEMITONE.powf(-settings.osc_tune - 0.01 * settings.osc_fine);
        let tune_in_semi = -36.3763 - 12.0 * settings.octave - settings.tuning / 100.0;
        let tune = sample_rate * (0.05776226505 * tune_in_semi).exp();

        let (ignore_velocity, velocity_sensitivity) = if settings.filter_velocity < -90.0 {
            (true, 0.0)
        } else {
            (false, 0.0005 * settings.filter_velocity)
        };

        let lfo_rate = (7.0 * settings.lfo_rate - 4.0).exp();
        let lfo_inc = lfo_rate / update_rate * 2.0 * PI;

        // Negative vibrato only drives the pulse width.
        let vibrato = settings.vibrato / 200.0;
        let pwm_depth = 0.2 * vibrato * vibrato;
        let vibrato_depth = if vibrato < 0.0 { 0.0 } else { pwm_depth };

        let glide_rate = if settings.glide_rate < 2.0 {
            1.0
        } else {
            1.0 - (-(6.0 - 0.07 * settings.glide_rate).exp() / update_rate).exp()
        };

        let filter_reso = settings.filter_reso / 100.0;
        let filter_lfo = settings.filter_lfo / 100.0;
        let filter_sustain = settings.filter_sustain / 100.0;

        Self {
            num_voices: match settings.poly_mode {
                PolyMode::Mono => 1,
                PolyMode::Poly => MAX_VOICES,
            },

            osc_mix,
            detune,
            tune,
            volume_trim: 0.0008 * (3.2 - osc_mix - 25.0 * noise_mix) * (1.5 - 0.5 * filter_reso),
            noise_mix,
            output_level: 10.0f32.powf(settings.output_level / 20.0),

            velocity_sensitivity,
            ignore_velocity,

            lfo_inc,
            vibrato: vibrato_depth,
            pwm_depth,

            glide_mode: settings.glide_mode,
            glide_rate,
            glide_bend: settings.glide_bend,

            env_attack: stage_multiplier(sample_rate, settings.env_attack),
            env_decay: stage_multiplier(sample_rate, settings.env_decay),
            env_sustain: settings.env_sustain / 100.0,
            env_release: release_multiplier(sample_rate, settings.env_release),

            filter_key_tracking: 0.08 * settings.filter_freq - 1.5,
            filter_q: (3.0 * filter_reso).exp(),
            filter_env_depth: 0.06 * settings.filter_env,
            filter_lfo_depth: 2.5 * filter_lfo * filter_lfo,
            filter_attack: stage_multiplier(update_rate, settings.filter_attack),
            filter_decay: stage_multiplier(update_rate, settings.filter_decay),
            filter_sustain: filter_sustain * filter_sustain,
            filter_release: release_multiplier(update_rate, settings.filter_release),
        }
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::derive(&PatchSettings::default(), 44100.0)
    }
}
