//! Static configuration of a sequence: the register, the device and the declared channels.
//!
//! The configuration is fixed once a channel is declared, and is copied unchanged into every
//! sequence built from a parametrized one.

use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::call::Basis;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("a register must hold at least one qubit")]
    EmptyRegister,
    #[error("qubit {0} appears more than once in the register")]
    DuplicateQubit(String),
}

/// The qubits a sequence addresses, by id, in register order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Register {
    qubits: Vec<String>,
}

impl Register {
    pub fn new<I, S>(ids: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut qubits: Vec<String> = Vec::new();
        for id in ids {
            let id = id.into();
            if qubits.contains(&id) {
                return Err(ConfigError::DuplicateQubit(id));
            }
            qubits.push(id);
        }
        if qubits.is_empty() {
            return Err(ConfigError::EmptyRegister);
        }
        Ok(Self { qubits })
    }

    pub fn qubits(&self) -> impl Iterator<Item = &str> {
        self.qubits.iter().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.qubits.iter().any(|qubit| qubit == id)
    }

    /// The id of the qubit at `index` in register order.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.qubits.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.qubits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qubits.is_empty()
    }
}

impl TryFrom<Vec<String>> for Register {
    type Error = ConfigError;

    fn try_from(ids: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(ids)
    }
}

impl From<Register> for Vec<String> {
    fn from(register: Register) -> Self {
        register.qubits
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.qubits.iter().join(", "))
    }
}

/// The identity of the device a sequence is written for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Addressing {
    /// Acts on every qubit of the register at once.
    Global,
    /// Acts on the qubits it is currently targeting.
    Local,
}

/// The kind of hardware channel a name is bound to.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChannelKind {
    RydbergGlobal,
    RydbergLocal,
    RamanGlobal,
    RamanLocal,
    MwGlobal,
}

impl ChannelKind {
    pub fn addressing(self) -> Addressing {
        match self {
            Self::RydbergGlobal | Self::RamanGlobal | Self::MwGlobal => Addressing::Global,
            Self::RydbergLocal | Self::RamanLocal => Addressing::Local,
        }
    }

    /// The measurement basis this channel drives.
    pub fn basis(self) -> Basis {
        match self {
            Self::RydbergGlobal | Self::RydbergLocal => Basis::GroundRydberg,
            Self::RamanGlobal | Self::RamanLocal => Basis::Digital,
            Self::MwGlobal => Basis::Xy,
        }
    }
}

/// A channel as declared on a sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDeclaration {
    pub kind: ChannelKind,
    /// Qubits a local channel targets before any retargeting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initial_target: Vec<String>,
}

impl ChannelDeclaration {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            initial_target: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_initial_target<I, S>(mut self, qubits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_target = qubits.into_iter().map(Into::into).collect();
        self
    }
}

impl From<ChannelKind> for ChannelDeclaration {
    fn from(kind: ChannelKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for ChannelDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.initial_target.is_empty() {
            write!(f, " (initial target: {})", self.initial_target.iter().join(", "))?;
        }
        Ok(())
    }
}

/// Everything about a sequence that does not depend on variables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceConfig {
    pub register: Register,
    pub device: Device,
    #[serde(default)]
    pub channels: IndexMap<String, ChannelDeclaration>,
}

impl SequenceConfig {
    pub fn new(register: Register, device: Device) -> Self {
        Self {
            register,
            device,
            channels: IndexMap::new(),
        }
    }
}
