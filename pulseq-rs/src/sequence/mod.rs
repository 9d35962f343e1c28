// Copyright 2021 Rigetti Computing
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{collections::HashMap, fmt};

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{debug, info};

use crate::{
    expression::EvaluationError,
    object::{Argument, ArgumentKind, ArgumentType, NotConcreteError},
    validation::identifier::{validate_identifier, IdentifierValidationError},
    variable::{DataType, Variable, VariableValue},
};

mod build;
pub mod call;
pub mod config;
pub mod schedule;
mod serialize;

pub use build::BuildError;
pub use call::{Basis, Call, InstructionLog, Protocol};
pub use config::{
    Addressing, ChannelDeclaration, ChannelKind, ConfigError, Device, Register, SequenceConfig,
};
pub use schedule::{ChannelSchedule, Schedule, Slot, SlotKind};
pub use serialize::SerializationError;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SequenceError {
    #[error("variable {0} is already declared")]
    DuplicateName(String),
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierValidationError),
    #[error("variable {0} must have a size of at least 1")]
    InvalidSize(String),
    #[error(transparent)]
    NotConcrete(#[from] NotConcreteError),
    #[error("channel {0} is already declared")]
    DuplicateChannel(String),
    #[error("channel {0} is not declared")]
    UnknownChannel(String),
    #[error("channel {0} is global and can't be targeted")]
    GlobalChannelTarget(String),
    #[error("qubit {0} is not in the register")]
    UnknownQubit(String),
    #[error("channel {0} can't be given an empty target")]
    EmptyTarget(String),
    #[error("qubit {0} is targeted more than once")]
    DuplicateTarget(String),
    #[error("qubit index {index} is out of range for a register of {size} qubit(s)")]
    QubitIndexOutOfRange { index: u64, size: usize },
    #[error("channel {0} has no target")]
    UntargetedChannel(String),
    #[error("align needs at least 2 channels, found {0}")]
    AlignTooFewChannels(usize),
    #[error("the sequence has already been measured")]
    AlreadyMeasured,
    #[error("no declared channel drives the {0} basis")]
    UnsupportedBasis(Basis),
    #[error("variable {0} is not declared on this sequence")]
    UndeclaredVariable(String),
    #[error("{call} expects {expected}, found {found}")]
    UnexpectedArgument {
        call: &'static str,
        expected: ArgumentType,
        found: ArgumentType,
    },
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Whether building calls run immediately or are recorded.
#[derive(Clone, Debug, PartialEq)]
enum Mode {
    /// Calls are executed against the schedule as they are made; they are also kept so that they
    /// can head the log should the sequence become parametrized.
    Concrete {
        schedule: Schedule,
        history: Vec<Call>,
    },
    /// Calls are recorded, to be replayed by [`Sequence::build`].
    Parametrized(InstructionLog),
}

/// A pulse sequence on a register of qubits.
///
/// A sequence starts out *concrete*: every building call ([`add`](Self::add),
/// [`delay`](Self::delay), [`target`](Self::target), ...) is executed straight away and the
/// resulting [`Schedule`] can be inspected. The first time a building call is given an argument
/// that depends on a declared [`Variable`], the sequence becomes *parametrized*, for good: from
/// then on building calls are only checked and recorded in an [`InstructionLog`], and a concrete
/// sequence is obtained with [`build`](Self::build).
///
/// ```rust
/// use std::collections::HashMap;
/// use pulseq_rs::object::ParametrizedObject;
/// use pulseq_rs::sequence::{ChannelKind, Device, Protocol, Register, Sequence};
/// use pulseq_rs::variable::{DataType, VariableValue};
///
/// let register = Register::new(["q0", "q1"]).unwrap();
/// let mut sequence = Sequence::new(register, Device::new("device"));
/// sequence.declare_channel("rydberg", ChannelKind::RydbergGlobal).unwrap();
///
/// let t = sequence.declare_variable("t", 1, DataType::Int).unwrap();
/// let amplitude = ParametrizedObject::blackman_waveform(&t, 3.14).unwrap();
/// let pulse = ParametrizedObject::constant_detuning_pulse(amplitude, 0.0, 0.0, 0.0).unwrap();
/// sequence.add(pulse, "rydberg", Protocol::MinDelay).unwrap();
/// assert!(sequence.is_parametrized());
/// assert!(sequence.duration().is_err());
///
/// let built = sequence.build(&HashMap::from([("t", VariableValue::from(250))])).unwrap();
/// assert_eq!(built.duration(), Ok(250));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    config: SequenceConfig,
    variables: IndexMap<String, Variable>,
    mode: Mode,
    measurement: Option<Basis>,
}

impl Sequence {
    pub fn new(register: Register, device: Device) -> Self {
        Self::with_config(SequenceConfig::new(register, device))
    }

    /// Create a sequence from a configuration that may already declare channels.
    pub fn from_config(config: SequenceConfig) -> Result<Self, SequenceError> {
        for (name, declaration) in &config.channels {
            check_channel_declaration(&config.register, name, declaration)?;
        }
        Ok(Self::with_config(config))
    }

    /// A fresh concrete sequence; the configuration must already be valid.
    fn with_config(config: SequenceConfig) -> Self {
        let schedule = Schedule::new(&config.channels, &config.register);
        Self {
            config,
            variables: IndexMap::new(),
            mode: Mode::Concrete {
                schedule,
                history: Vec::new(),
            },
            measurement: None,
        }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    pub fn register(&self) -> &Register {
        &self.config.register
    }

    pub fn device(&self) -> &Device {
        &self.config.device
    }

    /// Declare a variable, to be given a value when the sequence is built.
    ///
    /// The name must be a valid identifier that is not yet declared, and `size` at least 1.
    pub fn declare_variable(
        &mut self,
        name: &str,
        size: u64,
        dtype: DataType,
    ) -> Result<Variable, SequenceError> {
        validate_identifier(name)?;
        if self.variables.contains_key(name) {
            return Err(SequenceError::DuplicateName(name.to_string()));
        }
        if size == 0 {
            return Err(SequenceError::InvalidSize(name.to_string()));
        }

        let variable = Variable::new(name, dtype, size);
        debug!(variable = %variable.declaration(), "declared variable");
        self.variables.insert(name.to_string(), variable.clone());
        Ok(variable)
    }

    /// The declared variables, in declaration order.
    pub fn variables(&self) -> &IndexMap<String, Variable> {
        &self.variables
    }

    pub fn declare_channel(
        &mut self,
        name: &str,
        declaration: impl Into<ChannelDeclaration>,
    ) -> Result<(), SequenceError> {
        self.check_not_measured()?;
        let declaration = declaration.into();
        if self.config.channels.contains_key(name) {
            return Err(SequenceError::DuplicateChannel(name.to_string()));
        }
        check_channel_declaration(&self.config.register, name, &declaration)?;

        if let Mode::Concrete { schedule, .. } = &mut self.mode {
            schedule.declare_channel(name, &declaration, &self.config.register);
        }
        debug!(channel = name, %declaration, "declared channel");
        self.config.channels.insert(name.to_string(), declaration);
        Ok(())
    }

    /// Add a pulse to a channel, starting as soon as `protocol` allows.
    pub fn add(
        &mut self,
        pulse: impl Into<Argument>,
        channel: &str,
        protocol: Protocol,
    ) -> Result<(), SequenceError> {
        self.record(Call::Add {
            pulse: pulse.into(),
            channel: channel.to_string(),
            protocol,
        })
    }

    /// Idle a channel for `duration` ns.
    pub fn delay(
        &mut self,
        duration: impl Into<Argument>,
        channel: &str,
    ) -> Result<(), SequenceError> {
        self.record(Call::Delay {
            duration: duration.into(),
            channel: channel.to_string(),
        })
    }

    /// Point a local channel at the given qubits, by id.
    pub fn target<I, S>(&mut self, qubits: I, channel: &str) -> Result<(), SequenceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record(Call::Target {
            qubits: qubits.into_iter().map(Into::into).collect(),
            channel: channel.to_string(),
        })
    }

    /// Point a local channel at the given qubits, by index in the register.
    pub fn target_index(
        &mut self,
        indices: impl Into<Argument>,
        channel: &str,
    ) -> Result<(), SequenceError> {
        self.record(Call::TargetIndex {
            indices: indices.into(),
            channel: channel.to_string(),
        })
    }

    /// Delay the given channels so that they all end together.
    pub fn align<I, S>(&mut self, channels: I) -> Result<(), SequenceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record(Call::Align {
            channels: channels.into_iter().map(Into::into).collect(),
        })
    }

    /// End the sequence with a measurement. No building call is accepted afterwards.
    pub fn measure(&mut self, basis: Basis) -> Result<(), SequenceError> {
        self.record(Call::Measure { basis })
    }

    pub fn is_parametrized(&self) -> bool {
        matches!(self.mode, Mode::Parametrized(_))
    }

    /// The recorded calls, once the sequence is parametrized.
    pub fn instruction_log(&self) -> Option<&InstructionLog> {
        match &self.mode {
            Mode::Parametrized(log) => Some(log),
            Mode::Concrete { .. } => None,
        }
    }

    /// Every call made so far, in order.
    pub(crate) fn calls(&self) -> &[Call] {
        match &self.mode {
            Mode::Parametrized(log) => log.calls(),
            Mode::Concrete { history, .. } => history,
        }
    }

    pub fn measurement(&self) -> Option<Basis> {
        self.measurement
    }

    pub fn schedule(&self) -> Result<&Schedule, NotConcreteError> {
        match &self.mode {
            Mode::Concrete { schedule, .. } => Ok(schedule),
            Mode::Parametrized(_) => Err(NotConcreteError(
                "the schedule of a parametrized sequence".to_string(),
            )),
        }
    }

    pub fn duration(&self) -> Result<u64, NotConcreteError> {
        self.schedule()
            .map(Schedule::duration)
            .map_err(|_| NotConcreteError("the duration of a parametrized sequence".to_string()))
    }

    /// The qubits a channel currently acts on.
    pub fn current_target(&self, channel: &str) -> Result<&[String], SequenceError> {
        let schedule = self.schedule().map_err(|_| {
            NotConcreteError(format!("the target of channel {channel} in a parametrized sequence"))
        })?;
        Ok(schedule.channel(channel)?.targets())
    }

    fn check_not_measured(&self) -> Result<(), SequenceError> {
        match self.measurement {
            Some(_) => Err(SequenceError::AlreadyMeasured),
            None => Ok(()),
        }
    }

    /// Run a building call, or record it if the sequence is (or is about to become) parametrized.
    pub(crate) fn record(&mut self, call: Call) -> Result<(), SequenceError> {
        self.check_not_measured()?;
        self.check(&call)?;

        let kind = call.kind();
        if let Mode::Concrete { history, .. } = &mut self.mode {
            if kind != ArgumentKind::Concrete {
                let history = std::mem::take(history);
                info!(
                    %call,
                    argument = ?kind,
                    previous_calls = history.len(),
                    "sequence is now parametrized"
                );
                self.mode = Mode::Parametrized(InstructionLog::new(history));
            }
        }

        let measurement = match &call {
            Call::Measure { basis } => Some(*basis),
            _ => None,
        };
        match &mut self.mode {
            Mode::Parametrized(log) => {
                debug!(index = log.len(), %call, "recorded call");
                log.push(call);
            }
            Mode::Concrete { schedule, history } => {
                execute(schedule, &self.config.register, &call)?;
                debug!(index = history.len(), %call, "executed call");
                history.push(call);
            }
        }
        if measurement.is_some() {
            self.measurement = measurement;
        }
        Ok(())
    }

    /// Check everything about a call that does not depend on variable values.
    fn check(&self, call: &Call) -> Result<(), SequenceError> {
        for channel in call.channels() {
            if !self.config.channels.contains_key(channel) {
                return Err(SequenceError::UnknownChannel(channel.to_string()));
            }
        }

        for argument in call.arguments() {
            argument.check()?;
        }
        for variable in call.variables() {
            if self.variables.get(variable.name()) != Some(variable) {
                return Err(SequenceError::UndeclaredVariable(variable.name().to_string()));
            }
        }

        match call {
            Call::Add { pulse, .. } => expect_argument(call, ArgumentType::Pulse, pulse),
            Call::Delay { duration, .. } => expect_argument(call, ArgumentType::Scalar, duration),
            Call::Target { qubits, channel } => {
                self.check_local(channel)?;
                if let Some(qubit) = qubits
                    .iter()
                    .find(|qubit| !self.config.register.contains(qubit))
                {
                    return Err(SequenceError::UnknownQubit(qubit.clone()));
                }
                check_target(channel, qubits)
            }
            Call::TargetIndex {
                indices: Argument::Array(elements),
                channel,
            } if elements.is_empty() => {
                self.check_local(channel)?;
                Err(SequenceError::EmptyTarget(channel.clone()))
            }
            Call::TargetIndex { indices, channel } => {
                self.check_local(channel)?;
                expect_argument(call, ArgumentType::Array, indices)
            }
            Call::Align { channels } if channels.len() < 2 => {
                Err(SequenceError::AlignTooFewChannels(channels.len()))
            }
            Call::Align { .. } => Ok(()),
            Call::Measure { basis } => {
                let supported = self
                    .config
                    .channels
                    .values()
                    .any(|declaration| declaration.kind.basis() == *basis);
                if supported {
                    Ok(())
                } else {
                    Err(SequenceError::UnsupportedBasis(*basis))
                }
            }
        }
    }

    fn check_local(&self, channel: &str) -> Result<(), SequenceError> {
        match self.config.channels.get(channel) {
            Some(declaration) if declaration.kind.addressing() == Addressing::Local => Ok(()),
            Some(_) => Err(SequenceError::GlobalChannelTarget(channel.to_string())),
            None => Err(SequenceError::UnknownChannel(channel.to_string())),
        }
    }
}

fn check_channel_declaration(
    register: &Register,
    name: &str,
    declaration: &ChannelDeclaration,
) -> Result<(), SequenceError> {
    if declaration.kind.addressing() == Addressing::Global && !declaration.initial_target.is_empty()
    {
        return Err(SequenceError::GlobalChannelTarget(name.to_string()));
    }
    if let Some(qubit) = declaration
        .initial_target
        .iter()
        .find(|qubit| !register.contains(qubit))
    {
        return Err(SequenceError::UnknownQubit(qubit.clone()));
    }
    match declaration.initial_target.iter().duplicates().next() {
        Some(qubit) => Err(SequenceError::DuplicateTarget(qubit.clone())),
        None => Ok(()),
    }
}

/// A new target must name at least one qubit, and each qubit once.
fn check_target(channel: &str, qubits: &[String]) -> Result<(), SequenceError> {
    if qubits.is_empty() {
        return Err(SequenceError::EmptyTarget(channel.to_string()));
    }
    match qubits.iter().duplicates().next() {
        Some(qubit) => Err(SequenceError::DuplicateTarget(qubit.clone())),
        None => Ok(()),
    }
}

fn expect_argument(
    call: &Call,
    expected: ArgumentType,
    argument: &Argument,
) -> Result<(), SequenceError> {
    let found = argument.argument_type();
    if expected.accepts(found) {
        Ok(())
    } else {
        Err(SequenceError::UnexpectedArgument {
            call: call.name(),
            expected,
            found,
        })
    }
}

/// Apply a call whose arguments are all concrete to the schedule.
fn execute(schedule: &mut Schedule, register: &Register, call: &Call) -> Result<(), SequenceError> {
    let no_values: HashMap<&str, VariableValue> = HashMap::new();

    match call {
        Call::Add {
            pulse,
            channel,
            protocol,
        } => {
            let pulse = pulse.evaluate(&no_values)?.into_pulse()?;
            schedule.add(pulse, channel, *protocol)
        }
        Call::Delay { duration, channel } => {
            let duration = duration.evaluate(&no_values)?.into_value()?.to_unsigned()?;
            schedule.delay(duration, channel)
        }
        Call::Target { qubits, channel } => schedule.target(qubits.clone(), channel),
        Call::TargetIndex { indices, channel } => {
            let qubits = indices
                .evaluate(&no_values)?
                .into_array()?
                .iter()
                .map(|index| {
                    let index = index.to_unsigned()?;
                    usize::try_from(index)
                        .ok()
                        .and_then(|index| register.get(index))
                        .map(str::to_string)
                        .ok_or(SequenceError::QubitIndexOutOfRange {
                            index,
                            size: register.len(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            check_target(channel, &qubits)?;
            schedule.target(qubits, channel)
        }
        Call::Align { channels } => schedule.align(channels),
        Call::Measure { basis } => {
            schedule.measure(*basis);
            Ok(())
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "device: {}", self.config.device)?;
        writeln!(f, "register: {}", self.config.register)?;
        writeln!(f, "channels:")?;
        for (name, declaration) in &self.config.channels {
            writeln!(f, "  {name}: {declaration}")?;
        }
        if !self.variables.is_empty() {
            writeln!(f, "variables:")?;
            for variable in self.variables.values() {
                writeln!(f, "  {}", variable.declaration())?;
            }
        }
        let (heading, body) = match &self.mode {
            Mode::Parametrized(log) => ("instructions", log.to_string()),
            Mode::Concrete { schedule, .. } => ("schedule", schedule.to_string()),
        };
        writeln!(f, "{heading}:")?;
        for line in body.lines() {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use crate::{
        expression::{Expression, Value},
        object::ParametrizedObject,
        pulse::Pulse,
        waveform::{BlackmanWaveform, ConstantWaveform},
    };

    fn pulse(duration: u64) -> Pulse {
        Pulse::constant_detuning(ConstantWaveform::new(duration, 1.0).unwrap(), 0.0, 0.0).unwrap()
    }

    #[fixture]
    fn sequence() -> Sequence {
        let register = Register::new(["q0", "q1", "q2"]).unwrap();
        let mut sequence = Sequence::new(register, Device::new("chadoq2"));
        sequence
            .declare_channel("rydberg", ChannelKind::RydbergGlobal)
            .unwrap();
        sequence
            .declare_channel(
                "raman",
                ChannelDeclaration::new(ChannelKind::RamanLocal).with_initial_target(["q0"]),
            )
            .unwrap();
        sequence
    }

    fn parametrized_pulse(t: &Variable) -> ParametrizedObject {
        let amplitude = ParametrizedObject::blackman_waveform(t, 3.14).unwrap();
        ParametrizedObject::constant_detuning_pulse(amplitude, 0.0, 0.0, 0.0).unwrap()
    }

    #[rstest]
    fn declare_variable(mut sequence: Sequence) {
        let ts = sequence.declare_variable("ts", 2, DataType::Int).unwrap();
        assert_eq!(ts.name(), "ts");
        assert_eq!(ts.size(), 2);
        assert_eq!(ts.dtype(), DataType::Int);
        assert_eq!(sequence.variables().get("ts"), Some(&ts));
    }

    #[rstest]
    #[case::duplicate("x", 1, SequenceError::DuplicateName("x".to_string()))]
    #[case::empty("", 1, SequenceError::InvalidIdentifier(IdentifierValidationError::Invalid(String::new())))]
    #[case::not_an_identifier("1x", 1, SequenceError::InvalidIdentifier(IdentifierValidationError::Invalid("1x".to_string())))]
    #[case::zero_size("y", 0, SequenceError::InvalidSize("y".to_string()))]
    fn declare_variable_fails(
        mut sequence: Sequence,
        #[case] name: &str,
        #[case] size: u64,
        #[case] expected: SequenceError,
    ) {
        sequence.declare_variable("x", 1, DataType::Float).unwrap();
        assert_eq!(
            sequence.declare_variable(name, size, DataType::Int),
            Err(expected)
        );
        assert_eq!(sequence.variables().len(), 1);
    }

    #[rstest]
    fn declaring_variables_does_not_parametrize(mut sequence: Sequence) {
        sequence.declare_variable("x", 1, DataType::Float).unwrap();
        assert!(!sequence.is_parametrized());
        assert!(sequence.instruction_log().is_none());
    }

    #[rstest]
    fn concrete_calls_execute_immediately(mut sequence: Sequence) {
        sequence.add(pulse(100), "rydberg", Protocol::MinDelay).unwrap();
        sequence.delay(20, "raman").unwrap();
        sequence.target(["q1"], "raman").unwrap();
        // A constant expression is concrete.
        sequence.delay(Expression::from(10) * 3, "rydberg").unwrap();

        assert!(!sequence.is_parametrized());
        assert!(sequence.instruction_log().is_none());
        assert_eq!(sequence.duration(), Ok(130));
        assert_eq!(sequence.current_target("raman"), Ok(&["q1".to_string()][..]));
    }

    #[rstest]
    fn concrete_object_is_evaluated_immediately(mut sequence: Sequence) {
        let waveform = ParametrizedObject::constant_waveform(80, 1.0).unwrap();
        let object = ParametrizedObject::constant_detuning_pulse(waveform, 0.0, 0.0, 0.0).unwrap();
        sequence.add(object, "rydberg", Protocol::MinDelay).unwrap();
        assert!(!sequence.is_parametrized());
        assert_eq!(sequence.duration(), Ok(80));
    }

    #[rstest]
    fn mode_switch(mut sequence: Sequence) {
        let t = sequence.declare_variable("t", 1, DataType::Int).unwrap();
        sequence.add(pulse(100), "rydberg", Protocol::MinDelay).unwrap();
        assert!(!sequence.is_parametrized());

        sequence
            .add(parametrized_pulse(&t), "rydberg", Protocol::MinDelay)
            .unwrap();
        assert!(sequence.is_parametrized());

        // Concrete calls are now recorded too.
        sequence.delay(40, "raman").unwrap();
        assert!(sequence.is_parametrized());

        let log = sequence.instruction_log().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.get(0).map(Call::kind), Some(ArgumentKind::Concrete));
        assert_eq!(
            log.get(1).map(Call::kind),
            Some(ArgumentKind::ParametrizedObject)
        );
    }

    #[rstest]
    fn concrete_queries_fail_when_parametrized(mut sequence: Sequence) {
        let t = sequence.declare_variable("t", 1, DataType::Int).unwrap();
        sequence.delay(&t, "rydberg").unwrap();
        assert!(sequence.schedule().is_err());
        assert!(sequence.duration().is_err());
        assert!(matches!(
            sequence.current_target("raman"),
            Err(SequenceError::NotConcrete(_))
        ));
    }

    #[rstest]
    fn undeclared_variable(mut sequence: Sequence) {
        let mut other = Sequence::new(Register::new(["q0"]).unwrap(), Device::new("other"));
        let foreign = other.declare_variable("t", 1, DataType::Float).unwrap();

        assert_eq!(
            sequence.delay(&foreign, "rydberg"),
            Err(SequenceError::UndeclaredVariable("t".to_string()))
        );
        // A variable of the same name but a different declaration is not the same variable.
        sequence.declare_variable("t", 1, DataType::Int).unwrap();
        assert_eq!(
            sequence.delay(&foreign, "rydberg"),
            Err(SequenceError::UndeclaredVariable("t".to_string()))
        );
        assert!(!sequence.is_parametrized());
    }

    #[rstest]
    #[case::unknown_channel(
        Call::Delay { duration: Argument::from(10), channel: "nope".to_string() },
        SequenceError::UnknownChannel("nope".to_string())
    )]
    #[case::target_global(
        Call::Target { qubits: vec!["q0".to_string()], channel: "rydberg".to_string() },
        SequenceError::GlobalChannelTarget("rydberg".to_string())
    )]
    #[case::unknown_qubit(
        Call::Target { qubits: vec!["q9".to_string()], channel: "raman".to_string() },
        SequenceError::UnknownQubit("q9".to_string())
    )]
    #[case::index_out_of_range(
        Call::TargetIndex { indices: Argument::from(vec![5]), channel: "raman".to_string() },
        SequenceError::QubitIndexOutOfRange { index: 5, size: 3 }
    )]
    #[case::align_one(
        Call::Align { channels: vec!["rydberg".to_string()] },
        SequenceError::AlignTooFewChannels(1)
    )]
    #[case::add_a_number(
        Call::Add { pulse: Argument::from(1.0), channel: "rydberg".to_string(), protocol: Protocol::MinDelay },
        SequenceError::UnexpectedArgument { call: "add", expected: ArgumentType::Pulse, found: ArgumentType::Scalar }
    )]
    #[case::delay_a_pulse(
        Call::Delay { duration: Argument::from(pulse(10)), channel: "rydberg".to_string() },
        SequenceError::UnexpectedArgument { call: "delay", expected: ArgumentType::Scalar, found: ArgumentType::Pulse }
    )]
    #[case::negative_delay(
        Call::Delay { duration: Argument::from(-10), channel: "rydberg".to_string() },
        SequenceError::Evaluation(EvaluationError::Negative(-10))
    )]
    #[case::empty_target(
        Call::Target { qubits: vec![], channel: "raman".to_string() },
        SequenceError::EmptyTarget("raman".to_string())
    )]
    #[case::repeated_qubit(
        Call::Target { qubits: vec!["q1".to_string(), "q1".to_string()], channel: "raman".to_string() },
        SequenceError::DuplicateTarget("q1".to_string())
    )]
    #[case::no_indices(
        Call::TargetIndex { indices: Argument::Array(vec![]), channel: "raman".to_string() },
        SequenceError::EmptyTarget("raman".to_string())
    )]
    #[case::repeated_index(
        Call::TargetIndex { indices: Argument::from(vec![0, 2, 0]), channel: "raman".to_string() },
        SequenceError::DuplicateTarget("q0".to_string())
    )]
    #[case::unsupported_basis(
        Call::Measure { basis: Basis::Xy },
        SequenceError::UnsupportedBasis(Basis::Xy)
    )]
    fn invalid_calls(mut sequence: Sequence, #[case] call: Call, #[case] expected: SequenceError) {
        let before = sequence.clone();
        assert_eq!(sequence.record(call), Err(expected));
        assert_eq!(sequence, before);
    }

    #[rstest]
    fn static_checks_run_while_parametrized(mut sequence: Sequence) {
        let t = sequence.declare_variable("t", 1, DataType::Int).unwrap();
        sequence.delay(&t, "rydberg").unwrap();
        assert_eq!(
            sequence.delay(&t, "nope"),
            Err(SequenceError::UnknownChannel("nope".to_string()))
        );
        assert_eq!(
            sequence.target(["q0"], "rydberg"),
            Err(SequenceError::GlobalChannelTarget("rydberg".to_string()))
        );
        assert_eq!(sequence.instruction_log().map(InstructionLog::len), Some(1));
    }

    #[rstest]
    fn target_index(mut sequence: Sequence) {
        sequence.target_index(vec![1, 2], "raman").unwrap();
        assert_eq!(
            sequence.current_target("raman"),
            Ok(&["q1".to_string(), "q2".to_string()][..])
        );
        sequence.target_index(0, "raman").unwrap();
        assert_eq!(sequence.current_target("raman"), Ok(&["q0".to_string()][..]));
    }

    #[rstest]
    fn untargeted_local_channel(mut sequence: Sequence) {
        sequence
            .declare_channel("local", ChannelKind::RydbergLocal)
            .unwrap();
        assert_eq!(
            sequence.add(pulse(10), "local", Protocol::MinDelay),
            Err(SequenceError::UntargetedChannel("local".to_string()))
        );
    }

    #[rstest]
    fn declare_channel_fails(mut sequence: Sequence) {
        assert_eq!(
            sequence.declare_channel("rydberg", ChannelKind::RydbergGlobal),
            Err(SequenceError::DuplicateChannel("rydberg".to_string()))
        );
        assert_eq!(
            sequence.declare_channel(
                "global",
                ChannelDeclaration::new(ChannelKind::MwGlobal).with_initial_target(["q0"])
            ),
            Err(SequenceError::GlobalChannelTarget("global".to_string()))
        );
        assert_eq!(
            sequence.declare_channel(
                "local",
                ChannelDeclaration::new(ChannelKind::RydbergLocal).with_initial_target(["q7"])
            ),
            Err(SequenceError::UnknownQubit("q7".to_string()))
        );
        assert_eq!(
            sequence.declare_channel(
                "local",
                ChannelDeclaration::new(ChannelKind::RydbergLocal).with_initial_target(["q1", "q1"])
            ),
            Err(SequenceError::DuplicateTarget("q1".to_string()))
        );
    }

    #[rstest]
    fn measure_ends_the_sequence(mut sequence: Sequence) {
        sequence.add(pulse(10), "rydberg", Protocol::MinDelay).unwrap();
        sequence.measure(Basis::GroundRydberg).unwrap();
        assert_eq!(sequence.measurement(), Some(Basis::GroundRydberg));
        assert_eq!(
            sequence.delay(10, "rydberg"),
            Err(SequenceError::AlreadyMeasured)
        );
        assert_eq!(
            sequence.measure(Basis::GroundRydberg),
            Err(SequenceError::AlreadyMeasured)
        );
        assert_eq!(
            sequence.declare_channel("mw", ChannelKind::MwGlobal),
            Err(SequenceError::AlreadyMeasured)
        );
    }

    #[rstest]
    fn measure_while_parametrized(mut sequence: Sequence) {
        let t = sequence.declare_variable("t", 1, DataType::Int).unwrap();
        sequence.delay(&t, "rydberg").unwrap();
        sequence.measure(Basis::Digital).unwrap();
        assert_eq!(
            sequence.delay(&t, "rydberg"),
            Err(SequenceError::AlreadyMeasured)
        );
        assert_eq!(sequence.instruction_log().map(InstructionLog::len), Some(2));
    }

    #[rstest]
    fn display_parametrized(mut sequence: Sequence) {
        let t = sequence.declare_variable("t", 1, DataType::Int).unwrap();
        let ts = sequence.declare_variable("ts", 2, DataType::Int).unwrap();
        sequence
            .add(parametrized_pulse(&t), "rydberg", Protocol::MinDelay)
            .unwrap();
        sequence.delay(ts.index(1).unwrap() - 4, "raman").unwrap();

        let expected = "\
device: chadoq2
register: q0, q1, q2
channels:
  rydberg: rydberg_global
  raman: raman_local (initial target: q0)
variables:
  t: int[1]
  ts: int[2]
instructions:
  0: add(constant_detuning_pulse(blackman_waveform(t, 3.14), 0.0, 0.0, 0.0), channel=rydberg, protocol=min-delay)
  1: delay(ts[1] - 4, channel=raman)
";
        assert_eq!(sequence.to_string(), expected);
    }

    #[rstest]
    fn display_concrete(mut sequence: Sequence) {
        let amplitude = BlackmanWaveform::new(60, 3.14).unwrap();
        let pulse = Pulse::constant_detuning(amplitude, 0.0, 0.0).unwrap();
        sequence.add(pulse, "raman", Protocol::MinDelay).unwrap();

        let expected = "\
device: chadoq2
register: q0, q1, q2
channels:
  rydberg: rydberg_global
  raman: raman_local (initial target: q0)
schedule:
  rydberg (rydberg_global):
    targets: q0, q1, q2
  raman (raman_local):
    targets: q0
    0 -> 60: pulse(blackman_waveform(60, 3.14), constant_waveform(60, 0.0), 0.0)
";
        assert_eq!(sequence.to_string(), expected);
    }

    #[test]
    fn from_config_checks_channels() {
        let mut config = SequenceConfig::new(Register::new(["q0"]).unwrap(), Device::new("d"));
        config.channels.insert(
            "rydberg".to_string(),
            ChannelDeclaration::new(ChannelKind::RydbergGlobal).with_initial_target(["q0"]),
        );
        assert_eq!(
            Sequence::from_config(config),
            Err(SequenceError::GlobalChannelTarget("rydberg".to_string()))
        );
    }

    #[test]
    fn sequence_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Sequence>();
    }

    #[test]
    fn constant_values_pass_through() {
        let mut sequence = Sequence::new(Register::new(["q0"]).unwrap(), Device::new("d"));
        sequence
            .declare_channel("rydberg", ChannelKind::RydbergGlobal)
            .unwrap();
        sequence.delay(Value::Float(12.0), "rydberg").unwrap();
        assert_eq!(sequence.duration(), Ok(12));
    }
}
