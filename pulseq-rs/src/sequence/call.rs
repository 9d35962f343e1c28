//! Records of sequence-building calls.

use std::{borrow::Borrow, collections::HashMap, fmt, hash::Hash};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    expression::EvaluationError,
    object::{Argument, ArgumentKind},
    variable::{Variable, VariableValue},
};

/// Where a pulse starts relative to what is already scheduled.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Protocol {
    /// After the channel and every channel sharing one of its target qubits is free.
    #[default]
    MinDelay,
    /// As soon as the channel itself is free.
    NoDelay,
    /// After every channel is free.
    WaitForAll,
}

/// The basis a sequence is measured in.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Basis {
    #[serde(rename = "ground-rydberg")]
    #[strum(serialize = "ground-rydberg")]
    GroundRydberg,
    #[serde(rename = "digital")]
    #[strum(serialize = "digital")]
    Digital,
    #[serde(rename = "XY")]
    #[strum(serialize = "XY")]
    Xy,
}

/// A sequence-building call, with its arguments as they were given.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Call {
    Add {
        pulse: Argument,
        channel: String,
        #[serde(default)]
        protocol: Protocol,
    },
    Delay {
        duration: Argument,
        channel: String,
    },
    Target {
        qubits: Vec<String>,
        channel: String,
    },
    TargetIndex {
        indices: Argument,
        channel: String,
    },
    Align {
        channels: Vec<String>,
    },
    Measure {
        basis: Basis,
    },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Delay { .. } => "delay",
            Self::Target { .. } => "target",
            Self::TargetIndex { .. } => "target_index",
            Self::Align { .. } => "align",
            Self::Measure { .. } => "measure",
        }
    }

    /// The arguments that may hold variables.
    pub fn arguments(&self) -> Vec<&Argument> {
        match self {
            Self::Add { pulse, .. } => vec![pulse],
            Self::Delay { duration, .. } => vec![duration],
            Self::TargetIndex { indices, .. } => vec![indices],
            Self::Target { .. } | Self::Align { .. } | Self::Measure { .. } => vec![],
        }
    }

    /// Every channel the call names.
    pub fn channels(&self) -> Vec<&str> {
        match self {
            Self::Add { channel, .. }
            | Self::Delay { channel, .. }
            | Self::Target { channel, .. }
            | Self::TargetIndex { channel, .. } => vec![channel.as_str()],
            Self::Align { channels } => channels.iter().map(String::as_str).collect(),
            Self::Measure { .. } => vec![],
        }
    }

    pub fn variables(&self) -> Vec<&Variable> {
        self.arguments()
            .into_iter()
            .flat_map(Argument::variables)
            .collect()
    }

    /// The least concrete classification among the arguments.
    pub fn kind(&self) -> ArgumentKind {
        self.arguments()
            .into_iter()
            .map(Argument::kind)
            .max()
            .unwrap_or(ArgumentKind::Concrete)
    }

    /// The same call with every argument replaced by its concrete value.
    pub fn substitute<K>(&self, values: &HashMap<K, VariableValue>) -> Result<Call, EvaluationError>
    where
        K: Borrow<str> + Hash + Eq,
    {
        Ok(match self {
            Self::Add {
                pulse,
                channel,
                protocol,
            } => Self::Add {
                pulse: pulse.substitute(values)?,
                channel: channel.clone(),
                protocol: *protocol,
            },
            Self::Delay { duration, channel } => Self::Delay {
                duration: duration.substitute(values)?,
                channel: channel.clone(),
            },
            Self::TargetIndex { indices, channel } => Self::TargetIndex {
                indices: indices.substitute(values)?,
                channel: channel.clone(),
            },
            Self::Target { .. } | Self::Align { .. } | Self::Measure { .. } => self.clone(),
        })
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = self.name();
        match self {
            Self::Add {
                pulse,
                channel,
                protocol,
            } => write!(f, "{name}({pulse}, channel={channel}, protocol={protocol})"),
            Self::Delay { duration, channel } => {
                write!(f, "{name}({duration}, channel={channel})")
            }
            Self::Target { qubits, channel } => {
                write!(f, "{name}([{}], channel={channel})", qubits.iter().join(", "))
            }
            Self::TargetIndex { indices, channel } => {
                write!(f, "{name}({indices}, channel={channel})")
            }
            Self::Align { channels } => write!(f, "{name}({})", channels.iter().join(", ")),
            Self::Measure { basis } => write!(f, "{name}(basis={basis})"),
        }
    }
}

/// The ordered, append-only record of the calls made on a parametrized sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionLog {
    calls: Vec<Call>,
}

impl InstructionLog {
    pub(crate) fn new(calls: Vec<Call>) -> Self {
        Self { calls }
    }

    pub(crate) fn push(&mut self, call: Call) {
        self.calls.push(call);
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Call> {
        self.calls.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Call> {
        self.calls.get(index)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl<'a> IntoIterator for &'a InstructionLog {
    type Item = &'a Call;
    type IntoIter = std::slice::Iter<'a, Call>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for InstructionLog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, call) in self.calls.iter().enumerate() {
            writeln!(f, "{index}: {call}")?;
        }
        Ok(())
    }
}
