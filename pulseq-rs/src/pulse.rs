//! Concrete pulses: an amplitude and a detuning waveform played together.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    expression::format_float,
    waveform::{ConstantWaveform, Waveform, WaveformError},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    pub amplitude: Waveform,
    pub detuning: Waveform,
    /// Phase (rad)
    pub phase: f64,
    /// Phase shift applied to the targets after the pulse (rad)
    pub post_phase_shift: f64,
}

impl Pulse {
    pub fn new(amplitude: Waveform, detuning: Waveform, phase: f64) -> Self {
        Self {
            amplitude,
            detuning,
            phase,
            post_phase_shift: 0.0,
        }
    }

    /// A pulse with a shaped amplitude and a constant detuning over the same duration.
    pub fn constant_detuning(
        amplitude: Waveform,
        detuning: f64,
        phase: f64,
    ) -> Result<Self, WaveformError> {
        let detuning = ConstantWaveform::new(amplitude.duration(), detuning)?;
        Ok(Self::new(amplitude, detuning, phase))
    }

    /// A pulse with a constant amplitude and a shaped detuning over the same duration.
    pub fn constant_amplitude(
        amplitude: f64,
        detuning: Waveform,
        phase: f64,
    ) -> Result<Self, WaveformError> {
        let amplitude = ConstantWaveform::new(detuning.duration(), amplitude)?;
        Ok(Self::new(amplitude, detuning, phase))
    }

    #[must_use]
    pub fn with_post_phase_shift(mut self, post_phase_shift: f64) -> Self {
        self.post_phase_shift = post_phase_shift;
        self
    }

    /// The longer of the two waveform durations.
    pub fn duration(&self) -> u64 {
        self.amplitude.duration().max(self.detuning.duration())
    }
}

impl fmt::Display for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "pulse({}, {}, {}",
            self.amplitude,
            self.detuning,
            format_float(self.phase)
        )?;
        if self.post_phase_shift != 0.0 {
            write!(f, ", post_phase_shift={}", format_float(self.post_phase_shift))?;
        }
        write!(f, ")")
    }
}
