//! The live state of a concrete sequence: one timeline per declared channel.
//!
//! Every operation checks its preconditions before touching any timeline, so a failed call leaves
//! the schedule as it was.

use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;

use crate::{expression::EvaluationError, pulse::Pulse};

use super::{
    call::{Basis, Protocol},
    config::{Addressing, ChannelDeclaration, ChannelKind, Register},
    SequenceError,
};

/// What occupies a [`Slot`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Pulse(Pulse),
    Delay,
    /// A retarget; takes no time.
    Target(Vec<String>),
}

/// An interval `[start, end)` on a channel timeline, in ns.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Slot {
    pub start: u64,
    pub end: u64,
    pub kind: SlotKind,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}: ", self.start, self.end)?;
        match &self.kind {
            SlotKind::Pulse(pulse) => write!(f, "{pulse}"),
            SlotKind::Delay => write!(f, "delay"),
            SlotKind::Target(qubits) => write!(f, "target {}", qubits.iter().join(", ")),
        }
    }
}

/// The timeline of a single channel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelSchedule {
    kind: ChannelKind,
    slots: Vec<Slot>,
    targets: Vec<String>,
}

impl ChannelSchedule {
    fn new(declaration: &ChannelDeclaration, register: &Register) -> Self {
        let targets = match declaration.kind.addressing() {
            Addressing::Global => register.qubits().map(str::to_string).collect(),
            Addressing::Local => declaration.initial_target.clone(),
        };
        Self {
            kind: declaration.kind,
            slots: Vec::new(),
            targets,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// The qubits the channel currently acts on.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// When the last slot ends.
    pub fn end(&self) -> u64 {
        self.slots.last().map_or(0, |slot| slot.end)
    }

    fn shares_target_with(&self, other: &ChannelSchedule) -> bool {
        self.targets.iter().any(|qubit| other.targets.contains(qubit))
    }

    fn pad_to(&mut self, time: u64) {
        let end = self.end();
        if time > end {
            self.slots.push(Slot {
                start: end,
                end: time,
                kind: SlotKind::Delay,
            });
        }
    }
}

/// The concrete schedule of every declared channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Schedule {
    channels: IndexMap<String, ChannelSchedule>,
    measurement: Option<Basis>,
}

impl Schedule {
    pub(crate) fn new<'a>(
        channels: impl IntoIterator<Item = (&'a String, &'a ChannelDeclaration)>,
        register: &Register,
    ) -> Self {
        Self {
            channels: channels
                .into_iter()
                .map(|(name, declaration)| {
                    (name.clone(), ChannelSchedule::new(declaration, register))
                })
                .collect(),
            measurement: None,
        }
    }

    pub(crate) fn declare_channel(
        &mut self,
        name: &str,
        declaration: &ChannelDeclaration,
        register: &Register,
    ) {
        self.channels.insert(
            name.to_string(),
            ChannelSchedule::new(declaration, register),
        );
    }

    pub fn channels(&self) -> &IndexMap<String, ChannelSchedule> {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Result<&ChannelSchedule, SequenceError> {
        self.channels
            .get(name)
            .ok_or_else(|| SequenceError::UnknownChannel(name.to_string()))
    }

    fn channel_mut(&mut self, name: &str) -> Result<&mut ChannelSchedule, SequenceError> {
        self.channels
            .get_mut(name)
            .ok_or_else(|| SequenceError::UnknownChannel(name.to_string()))
    }

    /// The end of the latest channel.
    pub fn duration(&self) -> u64 {
        self.channels
            .values()
            .map(ChannelSchedule::end)
            .max()
            .unwrap_or(0)
    }

    pub fn measurement(&self) -> Option<Basis> {
        self.measurement
    }

    pub(crate) fn add(
        &mut self,
        pulse: Pulse,
        channel: &str,
        protocol: Protocol,
    ) -> Result<(), SequenceError> {
        let schedule = self.channel(channel)?;
        if schedule.targets.is_empty() {
            return Err(SequenceError::UntargetedChannel(channel.to_string()));
        }

        let start = match protocol {
            Protocol::NoDelay => schedule.end(),
            Protocol::MinDelay => self
                .channels
                .values()
                .filter(|other| other.shares_target_with(schedule))
                .map(ChannelSchedule::end)
                .fold(schedule.end(), u64::max),
            Protocol::WaitForAll => self.duration(),
        };
        let end = start
            .checked_add(pulse.duration())
            .ok_or(EvaluationError::Overflow)?;

        let schedule = self.channel_mut(channel)?;
        schedule.pad_to(start);
        schedule.slots.push(Slot {
            start,
            end,
            kind: SlotKind::Pulse(pulse),
        });
        Ok(())
    }

    /// Idle the channel for `duration`. A zero duration does nothing.
    pub(crate) fn delay(&mut self, duration: u64, channel: &str) -> Result<(), SequenceError> {
        let schedule = self.channel_mut(channel)?;
        if duration > 0 {
            let start = schedule.end();
            let end = start
                .checked_add(duration)
                .ok_or(EvaluationError::Overflow)?;
            schedule.slots.push(Slot {
                start,
                end,
                kind: SlotKind::Delay,
            });
        }
        Ok(())
    }

    /// Point a local channel at `qubits`, which must already be checked against the register.
    pub(crate) fn target(&mut self, qubits: Vec<String>, channel: &str) -> Result<(), SequenceError> {
        let schedule = self.channel_mut(channel)?;
        if schedule.kind.addressing() == Addressing::Global {
            return Err(SequenceError::GlobalChannelTarget(channel.to_string()));
        }
        let time = schedule.end();
        schedule.slots.push(Slot {
            start: time,
            end: time,
            kind: SlotKind::Target(qubits.clone()),
        });
        schedule.targets = qubits;
        Ok(())
    }

    /// Pad every listed channel with a delay up to the end of the latest of them.
    pub(crate) fn align(&mut self, channels: &[String]) -> Result<(), SequenceError> {
        let mut end = 0;
        for channel in channels {
            end = end.max(self.channel(channel)?.end());
        }
        for channel in channels {
            self.channel_mut(channel)?.pad_to(end);
        }
        Ok(())
    }

    pub(crate) fn measure(&mut self, basis: Basis) {
        self.measurement = Some(basis);
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (name, channel) in &self.channels {
            writeln!(f, "{name} ({}):", channel.kind)?;
            if !channel.targets.is_empty() {
                writeln!(f, "  targets: {}", channel.targets.iter().join(", "))?;
            }
            for slot in &channel.slots {
                writeln!(f, "  {slot}")?;
            }
        }
        if let Some(basis) = self.measurement {
            writeln!(f, "measured in the {basis} basis")?;
        }
        Ok(())
    }
}
