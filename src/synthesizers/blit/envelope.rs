/// -80 dB. Anything quieter counts as silence and frees the voice.
pub const SILENCE: f32 = 0.0001;

/// The attack aims at this overshoot so the curve reaches 1.0 quickly.
const ATTACK_TARGET: f32 = 2.0;

/// Multiplier that decays a one-pole envelope by 80 dB in `seconds`.
pub fn envelope_multiplier(rate: f32, seconds: f32) -> f32 {
    (SILENCE.ln() / (rate * seconds)).exp()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// ADSR envelope built from a single one-pole recurrence.
///
/// Every stage is `level = multiplier * (level - target) + target`; only the
/// target and multiplier change between stages.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub level: f32,

    pub attack_multiplier: f32,
    pub decay_multiplier: f32,
    pub sustain_level: f32,
    pub release_multiplier: f32,

    target: f32,
    multiplier: f32,
    stage: Stage,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            level: 0.0,
            attack_multiplier: 0.0,
            decay_multiplier: 0.0,
            sustain_level: 0.0,
            release_multiplier: 0.0,
            target: 0.0,
            multiplier: 0.0,
            stage: Stage::Idle,
        }
    }
}

impl Envelope {
    pub fn reset(&mut self) {
        self.level = 0.0;
        self.target = 0.0;
        self.multiplier = 0.0;
        self.stage = Stage::Idle;
    }

    pub fn next_value(&mut self) -> f32 {
        self.level = self.multiplier * (self.level - self.target) + self.target;

        match self.stage {
            Stage::Attack if self.level + self.target > 3.0 => {
                self.multiplier = self.decay_multiplier;
                self.target = self.sustain_level;
                self.stage = Stage::Decay;
            }
            Stage::Decay if (self.level - self.target).abs() <= SILENCE => {
                self.stage = Stage::Sustain;
            }
            Stage::Release if !self.is_active() => {
                self.stage = Stage::Idle;
            }
            _ => {}
        }

        self.level
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.level > SILENCE
    }

    #[inline]
    pub fn is_in_attack_stage(&self) -> bool {
        self.stage == Stage::Attack
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn attack(&mut self) {
        // Starting from exactly zero the recurrence would never leave it.
        self.nudge();
        self.target = ATTACK_TARGET;
        self.multiplier = self.attack_multiplier;
        self.stage = Stage::Attack;
    }

    pub fn release(&mut self) {
        self.target = 0.0;
        self.multiplier = self.release_multiplier;
        self.stage = Stage::Release;
    }

    /// Lift the level just above silence without restarting the attack.
    pub fn nudge(&mut self) {
        self.level += SILENCE + SILENCE;
    }
}
