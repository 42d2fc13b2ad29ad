use std::error::Error;
use std::fmt;

pub fn log_if_error<T, E: Error>(msg: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(o) => Some(o),
        Err(e) => {
            tracing::warn!("{}: {}", msg, e);
            None
        }
    }
}

/// What the output safety filter had to do to a block. Ordered by severity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputFault {
    /// Samples outside [-1, 1] were clamped.
    Clamped,
    /// A sample outside [-2, 2]; the block was silenced.
    Runaway,
    /// NaN or infinity; the block was silenced.
    NotFinite,
}

impl fmt::Display for OutputFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            OutputFault::Clamped => "sample out of range, clamping",
            OutputFault::Runaway => "sample out of range -2.0 to 2.0, silencing",
            OutputFault::NotFinite => "nan or inf detected in audio buffer, silencing",
        };
        f.write_str(msg)
    }
}

/// Make a block safe to send to speakers. Never fails, at most one fault per block.
pub fn protect_your_ears(buffer: &mut [f32]) -> Option<OutputFault> {
    let silence = buffer.iter().find_map(|&x| {
        if !x.is_finite() {
            Some(OutputFault::NotFinite)
        } else if !(-2.0..=2.0).contains(&x) {
            // Screaming feedback.
            Some(OutputFault::Runaway)
        } else {
            None
        }
    });

    if let Some(fault) = silence {
        buffer.iter_mut().for_each(|x| *x = 0.0);
        return Some(fault);
    }

    let mut clamped = false;
    for x in buffer.iter_mut() {
        if x.abs() > 1.0 {
            *x = x.clamp(-1.0, 1.0);
            clamped = true;
        }
    }
    if clamped {
        Some(OutputFault::Clamped)
    } else {
        None
    }
}

/// Ramps linearly to a new target over a fixed time.
#[derive(Copy, Clone, Debug)]
pub struct LinearSmoother {
    current: f32,
    target: f32,
    step: f32,
    steps_left: u32,
    ramp_samples: u32,
}

impl LinearSmoother {
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            steps_left: 0,
            ramp_samples: 0,
        }
    }

    pub fn reset(&mut self, sample_rate: f32, ramp_seconds: f32) {
        self.ramp_samples = (sample_rate * ramp_seconds).round().max(0.0) as u32;
        self.set_current_and_target(self.target);
    }

    pub fn set_current_and_target(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.steps_left = 0;
    }

    pub fn set_target(&mut self, value: f32) {
        if value == self.target {
            return;
        }
        if self.ramp_samples == 0 {
            self.set_current_and_target(value);
            return;
        }

        self.target = value;
        self.steps_left = self.ramp_samples;
        self.step = (self.target - self.current) / self.ramp_samples as f32;
    }

    pub fn next_value(&mut self) -> f32 {
        if self.steps_left == 0 {
            return self.target;
        }

        self.steps_left -= 1;
        if self.steps_left == 0 {
            self.current = self.target;
        } else {
            self.current += self.step;
        }
        self.current
    }
}
