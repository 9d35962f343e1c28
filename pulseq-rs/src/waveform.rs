//! Concrete waveforms.
//!
//! Only the construction parameters and the duration of each waveform are modelled here; sampling
//! a waveform into values is left to the device layer.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::expression::format_float;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WaveformError {
    #[error("a waveform must last at least 1 ns")]
    ZeroDuration,
}

/// A waveform with all of its parameters known. Durations are in ns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "UncheckedWaveform")]
pub enum Waveform {
    Constant(ConstantWaveform),
    Ramp(RampWaveform),
    Blackman(BlackmanWaveform),
    Custom(CustomWaveform),
}

/// The serialized form of a [`Waveform`], before its duration is checked.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum UncheckedWaveform {
    Constant(ConstantWaveform),
    Ramp(RampWaveform),
    Blackman(BlackmanWaveform),
    Custom(CustomWaveform),
}

impl TryFrom<UncheckedWaveform> for Waveform {
    type Error = WaveformError;

    fn try_from(unchecked: UncheckedWaveform) -> Result<Self, Self::Error> {
        match unchecked {
            UncheckedWaveform::Constant(ConstantWaveform { duration, value }) => {
                ConstantWaveform::new(duration, value)
            }
            UncheckedWaveform::Ramp(RampWaveform {
                duration,
                start,
                stop,
            }) => RampWaveform::new(duration, start, stop),
            UncheckedWaveform::Blackman(BlackmanWaveform { duration, area }) => {
                BlackmanWaveform::new(duration, area)
            }
            UncheckedWaveform::Custom(CustomWaveform { samples }) => CustomWaveform::new(samples),
        }
    }
}

impl Waveform {
    pub fn duration(&self) -> u64 {
        match self {
            Self::Constant(ConstantWaveform { duration, .. })
            | Self::Ramp(RampWaveform { duration, .. })
            | Self::Blackman(BlackmanWaveform { duration, .. }) => *duration,
            Self::Custom(CustomWaveform { samples }) => samples.len() as u64,
        }
    }
}

fn check_duration(duration: u64) -> Result<(), WaveformError> {
    if duration == 0 {
        Err(WaveformError::ZeroDuration)
    } else {
        Ok(())
    }
}

/// A flat waveform holding `value` for `duration`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstantWaveform {
    pub duration: u64,
    pub value: f64,
}

impl ConstantWaveform {
    pub fn new(duration: u64, value: f64) -> Result<Waveform, WaveformError> {
        check_duration(duration)?;
        Ok(Waveform::Constant(Self { duration, value }))
    }
}

/// A linear ramp from `start` to `stop`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RampWaveform {
    pub duration: u64,
    pub start: f64,
    pub stop: f64,
}

impl RampWaveform {
    pub fn new(duration: u64, start: f64, stop: f64) -> Result<Waveform, WaveformError> {
        check_duration(duration)?;
        Ok(Waveform::Ramp(Self {
            duration,
            start,
            stop,
        }))
    }
}

/// A Blackman window whose integral over the duration is `area`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlackmanWaveform {
    pub duration: u64,
    pub area: f64,
}

impl BlackmanWaveform {
    pub fn new(duration: u64, area: f64) -> Result<Waveform, WaveformError> {
        check_duration(duration)?;
        Ok(Waveform::Blackman(Self { duration, area }))
    }
}

/// A waveform given sample by sample, one sample per ns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomWaveform {
    pub samples: Vec<f64>,
}

impl CustomWaveform {
    pub fn new(samples: Vec<f64>) -> Result<Waveform, WaveformError> {
        check_duration(samples.len() as u64)?;
        Ok(Waveform::Custom(Self { samples }))
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Constant(ConstantWaveform { duration, value }) => {
                write!(f, "constant_waveform({duration}, {})", format_float(*value))
            }
            Self::Ramp(RampWaveform {
                duration,
                start,
                stop,
            }) => write!(
                f,
                "ramp_waveform({duration}, {}, {})",
                format_float(*start),
                format_float(*stop)
            ),
            Self::Blackman(BlackmanWaveform { duration, area }) => {
                write!(f, "blackman_waveform({duration}, {})", format_float(*area))
            }
            Self::Custom(CustomWaveform { samples }) => write!(
                f,
                "custom_waveform([{}])",
                samples.iter().map(|sample| format_float(*sample)).join(", ")
            ),
        }
    }
}
