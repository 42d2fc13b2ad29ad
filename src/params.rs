//! Host-facing parameters, in the units a knob shows.
//!
//! `PatchSettings` is the full set of values. `ParamStore` shares it between
//! the control thread and the audio thread without locks: every value is an
//! atomic `f32` and a dirty flag tells the audio thread to re-read them all.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::Deserialize;

pub const PARAM_COUNT: usize = 26;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamId {
    PolyMode,
    OscTune,
    OscFine,
    OscMix,
    GlideMode,
    GlideRate,
    GlideBend,
    FilterFreq,
    FilterReso,
    FilterEnv,
    FilterLfo,
    FilterVelocity,
    FilterAttack,
    FilterDecay,
    FilterSustain,
    FilterRelease,
    EnvAttack,
    EnvDecay,
    EnvSustain,
    EnvRelease,
    LfoRate,
    Vibrato,
    Noise,
    Octave,
    Tuning,
    OutputLevel,
}

impl ParamId {
    pub const ALL: [ParamId; PARAM_COUNT] = [
        ParamId::PolyMode,
        ParamId::OscTune,
        ParamId::OscFine,
        ParamId::OscMix,
        ParamId::GlideMode,
        ParamId::GlideRate,
        ParamId::GlideBend,
        ParamId::FilterFreq,
        ParamId::FilterReso,
        ParamId::FilterEnv,
        ParamId::FilterLfo,
        ParamId::FilterVelocity,
        ParamId::FilterAttack,
        ParamId::FilterDecay,
        ParamId::FilterSustain,
        ParamId::FilterRelease,
        ParamId::EnvAttack,
        ParamId::EnvDecay,
        ParamId::EnvSustain,
        ParamId::EnvRelease,
        ParamId::LfoRate,
        ParamId::Vibrato,
        ParamId::Noise,
        ParamId::Octave,
        ParamId::Tuning,
        ParamId::OutputLevel,
    ];

    /// Inclusive (min, max) in display units.
    pub fn range(self) -> (f32, f32) {
        match self {
            ParamId::PolyMode => (0.0, 1.0),
            ParamId::GlideMode => (0.0, 2.0),
            ParamId::OscTune => (-24.0, 24.0),
            ParamId::OscFine => (-50.0, 50.0),
            ParamId::GlideBend => (-36.0, 36.0),
            ParamId::FilterEnv | ParamId::FilterVelocity | ParamId::Vibrato | ParamId::Tuning => {
                (-100.0, 100.0)
            }
            ParamId::LfoRate => (0.0, 1.0),
            ParamId::Octave => (-2.0, 2.0),
            ParamId::OutputLevel => (-24.0, 6.0),
            _ => (0.0, 100.0),
        }
    }

    /// Only takes whole-number values.
    pub fn is_stepped(self) -> bool {
        matches!(self, ParamId::PolyMode | ParamId::GlideMode | ParamId::Octave)
    }

    /// Map a 7-bit controller value onto the parameter's range.
    pub fn from_controller_value(self, value: u8) -> f32 {
        let (lo, hi) = self.range();
        let x = lo + (hi - lo) * f32::from(value.min(127)) / 127.0;
        if self.is_stepped() {
            x.round()
        } else {
            x
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolyMode {
    Mono,
    Poly,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlideMode {
    Off,
    /// Glide only when a note was still held.
    Legato,
    Always,
}

impl GlideMode {
    fn from_index(index: f32) -> Self {
        match index.round() as i32 {
            i if i <= 0 => GlideMode::Off,
            1 => GlideMode::Legato,
            _ => GlideMode::Always,
        }
    }

    fn index(self) -> f32 {
        match self {
            GlideMode::Off => 0.0,
            GlideMode::Legato => 1.0,
            GlideMode::Always => 2.0,
        }
    }
}

/// Every parameter in display units: percentages, semitones, cents and dB.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PatchSettings {
    pub poly_mode: PolyMode,
    pub osc_tune: f32,
    pub osc_fine: f32,
    pub osc_mix: f32,
    pub glide_mode: GlideMode,
    pub glide_rate: f32,
    pub glide_bend: f32,
    pub filter_freq: f32,
    pub filter_reso: f32,
    pub filter_env: f32,
    pub filter_lfo: f32,
    /// Below -90 turns velocity off altogether.
    pub filter_velocity: f32,
    pub filter_attack: f32,
    pub filter_decay: f32,
    pub filter_sustain: f32,
    pub filter_release: f32,
    pub env_attack: f32,
    pub env_decay: f32,
    pub env_sustain: f32,
    pub env_release: f32,
    pub lfo_rate: f32,
    /// Negative values select pulse width modulation instead of vibrato.
    pub vibrato: f32,
    pub noise: f32,
    pub octave: f32,
    pub tuning: f32,
    pub output_level: f32,
}

impl Default for PatchSettings {
    fn default() -> Self {
        Self {
            poly_mode: PolyMode::Poly,
            osc_tune: -12.0,
            osc_fine: 0.0,
            osc_mix: 0.0,
            glide_mode: GlideMode::Off,
            glide_rate: 35.0,
            glide_bend: 0.0,
            filter_freq: 100.0,
            filter_reso: 15.0,
            filter_env: 50.0,
            filter_lfo: 0.0,
            filter_velocity: 0.0,
            filter_attack: 0.0,
            filter_decay: 30.0,
            filter_sustain: 0.0,
            filter_release: 25.0,
            env_attack: 0.0,
            env_decay: 50.0,
            env_sustain: 100.0,
            env_release: 30.0,
            lfo_rate: 0.81,
            vibrato: 0.0,
            noise: 0.0,
            octave: 0.0,
            tuning: 0.0,
            output_level: 0.0,
        }
    }
}

impl PatchSettings {
    pub fn get(&self, id: ParamId) -> f32 {
        match id {
            ParamId::PolyMode => match self.poly_mode {
                PolyMode::Mono => 0.0,
                PolyMode::Poly => 1.0,
            },
            ParamId::OscTune => self.osc_tune,
            ParamId::OscFine => self.osc_fine,
            ParamId::OscMix => self.osc_mix,
            ParamId::GlideMode => self.glide_mode.index(),
            ParamId::GlideRate => self.glide_rate,
            ParamId::GlideBend => self.glide_bend,
            ParamId::FilterFreq => self.filter_freq,
            ParamId::FilterReso => self.filter_reso,
            ParamId::FilterEnv => self.filter_env,
            ParamId::FilterLfo => self.filter_lfo,
            ParamId::FilterVelocity => self.filter_velocity,
            ParamId::FilterAttack => self.filter_attack,
            ParamId::FilterDecay => self.filter_decay,
            ParamId::FilterSustain => self.filter_sustain,
            ParamId::FilterRelease => self.filter_release,
            ParamId::EnvAttack => self.env_attack,
            ParamId::EnvDecay => self.env_decay,
            ParamId::EnvSustain => self.env_sustain,
            ParamId::EnvRelease => self.env_release,
            ParamId::LfoRate => self.lfo_rate,
            ParamId::Vibrato => self.vibrato,
            ParamId::Noise => self.noise,
            ParamId::Octave => self.octave,
            ParamId::Tuning => self.tuning,
            ParamId::OutputLevel => self.output_level,
        }
    }

    /// Set a value, clamped to the parameter's range.
    pub fn set(&mut self, id: ParamId, value: f32) {
        let (lo, hi) = id.range();
        // NaN would otherwise survive the clamp.
        let value = if value.is_nan() { lo } else { value.clamp(lo, hi) };

        match id {
            ParamId::PolyMode => {
                self.poly_mode = if value < 0.5 {
                    PolyMode::Mono
                } else {
                    PolyMode::Poly
                }
            }
            ParamId::OscTune => self.osc_tune = value,
            ParamId::OscFine => self.osc_fine = value,
            ParamId::OscMix => self.osc_mix = value,
            ParamId::GlideMode => self.glide_mode = GlideMode::from_index(value),
            ParamId::GlideRate => self.glide_rate = value,
            ParamId::GlideBend => self.glide_bend = value,
            ParamId::FilterFreq => self.filter_freq = value,
            ParamId::FilterReso => self.filter_reso = value,
            ParamId::FilterEnv => self.filter_env = value,
            ParamId::FilterLfo => self.filter_lfo = value,
            ParamId::FilterVelocity => self.filter_velocity = value,
            ParamId::FilterAttack => self.filter_attack = value,
            ParamId::FilterDecay => self.filter_decay = value,
            ParamId::FilterSustain => self.filter_sustain = value,
            ParamId::FilterRelease => self.filter_release = value,
            ParamId::EnvAttack => self.env_attack = value,
            ParamId::EnvDecay => self.env_decay = value,
            ParamId::EnvSustain => self.env_sustain = value,
            ParamId::EnvRelease => self.env_release = value,
            ParamId::LfoRate => self.lfo_rate = value,
            ParamId::Vibrato => self.vibrato = value,
            ParamId::Noise => self.noise = value,
            ParamId::Octave => self.octave = value.round(),
            ParamId::Tuning => self.tuning = value,
            ParamId::OutputLevel => self.output_level = value,
        }
    }
}

/// Lock-free parameter handoff between a control thread and the audio thread.
pub struct ParamStore {
    values: [AtomicU32; PARAM_COUNT],
    dirty: AtomicBool,
}

impl ParamStore {
    /// Starts dirty, so the first audio block picks the settings up.
    pub fn new(settings: &PatchSettings) -> Self {
        Self {
            values: ParamId::ALL.map(|id| AtomicU32::new(settings.get(id).to_bits())),
            dirty: AtomicBool::new(true),
        }
    }

    pub fn set(&self, id: ParamId, value: f32) {
        self.values[id as usize].store(value.to_bits(), Ordering::Relaxed);
        self.dirty.store(true, Ordering::Release);
    }

    pub fn get(&self, id: ParamId) -> f32 {
        f32::from_bits(self.values[id as usize].load(Ordering::Relaxed))
    }

    /// A full snapshot if anything changed since the last call.
    pub fn take_changes(&self) -> Option<PatchSettings> {
        if self
            .dirty
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let mut settings = PatchSettings::default();
        for &id in ParamId::ALL.iter() {
            settings.set(id, self.get(id));
        }
        Some(settings)
    }
}
