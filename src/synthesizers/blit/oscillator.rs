use std::f32::consts::{FRAC_PI_4, PI};

/// Band-limited impulse train oscillator.
///
/// Each cycle renders one windowed sinc pulse. The phase runs from 0 up to
/// `phase_max` (half a period, in samples times pi) for the first half of the
/// sinc and is then reflected to run back down to 0 for the second half. The
/// sine values come from the recurrence `sin(x + inc) = 2cos(inc)sin(x) -
/// sin(x - inc)`, so only the first sample of every cycle calls `sin`/`cos`.
///
/// `period` and `amplitude` are picked up at the start of the next cycle.
#[derive(Clone, Debug)]
pub struct Oscillator {
    pub period: f32,
    pub amplitude: f32,
    /// Multiplies the half-period, for vibrato and pulse width modulation.
    pub modulation: f32,

    phase: f32,
    phase_max: f32,
    inc: f32,
    sin0: f32,
    sin1: f32,
    dsin: f32,
    dc: f32,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self {
            period: 0.0,
            amplitude: 1.0,
            modulation: 1.0,
            phase: 0.0,
            phase_max: 0.0,
            inc: 0.0,
            sin0: 0.0,
            sin1: 0.0,
            dsin: 0.0,
            dc: 0.0,
        }
    }
}

impl Oscillator {
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.phase_max = 0.0;
        self.inc = 0.0;
        self.sin0 = 0.0;
        self.sin1 = 0.0;
        self.dsin = 0.0;
        self.dc = 0.0;
    }

    pub fn next_sample(&mut self) -> f32 {
        let output;
        self.phase += self.inc;

        if self.phase <= FRAC_PI_4 {
            // Start a new pulse. phase_max is the midpoint between this peak and the next.
            let half_period = (self.period / 2.0) * self.modulation;
            self.phase_max = (0.5 + half_period).floor() - 0.5;
            self.dc = 0.5 * self.amplitude / self.phase_max;
            self.phase_max *= PI;

            self.inc = self.phase_max / half_period;
            self.phase = -self.phase;

            self.sin0 = self.amplitude * self.phase.sin();
            self.sin1 = self.amplitude * (self.phase - self.inc).sin();
            self.dsin = 2.0 * self.inc.cos();

            output = if self.phase * self.phase > 1e-9 {
                self.sin0 / self.phase
            } else {
                self.amplitude
            };
        } else {
            // Past the midpoint, so render the sinc backwards.
            if self.phase > self.phase_max {
                self.phase = self.phase_max + self.phase_max - self.phase;
                self.inc = -self.inc;
            }

            let sinp = self.dsin * self.sin0 - self.sin1;
            self.sin1 = self.sin0;
            self.sin0 = sinp;
            output = sinp / self.phase;
        }

        output - self.dc
    }

    /// Phase-lock this oscillator half a period behind `other`.
    ///
    /// Subtracting the two impulse trains in the voice then integrates to a
    /// pulse wave instead of a sawtooth.
    pub fn square_wave(&mut self, other: &Oscillator, new_period: f32) {
        self.reset();

        if other.inc > 0.0 {
            self.phase = other.phase_max + other.phase_max - other.phase;
            self.inc = -other.inc;
        } else if other.inc < 0.0 {
            self.phase = other.phase;
            self.inc = other.inc;
        } else {
            self.phase = -PI;
            self.inc = PI;
        }

        self.phase += PI * new_period / 2.0;
        self.phase_max = self.phase;
    }
}
