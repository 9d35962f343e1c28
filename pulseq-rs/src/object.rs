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

//! Arguments of building calls and the deferred waveform and pulse constructors that may appear
//! among them.

use std::{borrow::Borrow, collections::HashMap, fmt, hash::Hash};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    expression::{EvaluationError, Expression, Value},
    pulse::Pulse,
    variable::{Variable, VariableValue},
    waveform::{BlackmanWaveform, ConstantWaveform, CustomWaveform, RampWaveform, Waveform},
};

/// Raised when asking an unbuilt object or sequence for something that depends on variable
/// values.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0} is not known until the sequence is built")]
pub struct NotConcreteError(pub String);

/// How an [`Argument`] is classified when it is passed to a building call.
///
/// The variants are ordered from the most to the least concrete; an array takes the classification
/// of its least concrete element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArgumentKind {
    Concrete,
    Variable,
    Expression,
    ParametrizedObject,
}

/// The shape of value an argument produces once evaluated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArgumentType {
    Scalar,
    Array,
    Waveform,
    Pulse,
}

impl ArgumentType {
    /// Whether an argument of type `found` may be passed where `self` is expected.
    ///
    /// A single value is accepted where an array is expected.
    pub fn accepts(self, found: ArgumentType) -> bool {
        self == found || (self == Self::Array && found == Self::Scalar)
    }

    pub(crate) fn expect(self, found: ArgumentType) -> Result<(), EvaluationError> {
        if self.accepts(found) {
            Ok(())
        } else {
            Err(EvaluationError::UnexpectedArgument {
                expected: self,
                found,
            })
        }
    }
}

/// Any argument to a building call or to a [`ParametrizedObject`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Argument {
    Constant(Value),
    Expression(Expression),
    Array(Vec<Argument>),
    Object(Box<ParametrizedObject>),
    Waveform(Waveform),
    Pulse(Pulse),
}

impl Argument {
    pub fn kind(&self) -> ArgumentKind {
        match self {
            Self::Constant(_) | Self::Waveform(_) | Self::Pulse(_) => ArgumentKind::Concrete,
            Self::Expression(expression) if expression.is_constant() => ArgumentKind::Concrete,
            Self::Expression(Expression::Variable(_)) => ArgumentKind::Variable,
            Self::Expression(_) => ArgumentKind::Expression,
            Self::Array(elements) => elements
                .iter()
                .map(Self::kind)
                .max()
                .unwrap_or(ArgumentKind::Concrete),
            Self::Object(object) if object.is_concrete() => ArgumentKind::Concrete,
            Self::Object(_) => ArgumentKind::ParametrizedObject,
        }
    }

    pub fn is_concrete(&self) -> bool {
        self.kind() == ArgumentKind::Concrete
    }

    /// The type of value this argument evaluates to, known without evaluating it.
    pub fn argument_type(&self) -> ArgumentType {
        match self {
            Self::Expression(Expression::Variable(variable)) if variable.size() > 1 => {
                ArgumentType::Array
            }
            Self::Constant(_) | Self::Expression(_) => ArgumentType::Scalar,
            Self::Array(_) => ArgumentType::Array,
            Self::Object(object) => object.constructor().output(),
            Self::Waveform(_) => ArgumentType::Waveform,
            Self::Pulse(_) => ArgumentType::Pulse,
        }
    }

    /// Every variable referenced by this argument, with repeats.
    pub fn variables(&self) -> Vec<&Variable> {
        match self {
            Self::Constant(_) | Self::Waveform(_) | Self::Pulse(_) => vec![],
            Self::Expression(expression) => expression.variables(),
            Self::Array(elements) => elements.iter().flat_map(Self::variables).collect(),
            Self::Object(object) => object.variables(),
        }
    }

    /// Check the argument lists of every object nested in this argument.
    pub fn check(&self) -> Result<(), EvaluationError> {
        match self {
            Self::Array(elements) => elements.iter().try_for_each(|element| {
                ArgumentType::Scalar.expect(element.argument_type())?;
                element.check()
            }),
            Self::Object(object) => object.check(),
            Self::Constant(_) | Self::Expression(_) | Self::Waveform(_) | Self::Pulse(_) => Ok(()),
        }
    }

    pub fn evaluate<K>(&self, values: &HashMap<K, VariableValue>) -> Result<Evaluated, EvaluationError>
    where
        K: Borrow<str> + Hash + Eq,
    {
        match self {
            Self::Constant(value) => Ok(Evaluated::Value(*value)),
            Self::Expression(Expression::Variable(variable)) if variable.size() > 1 => {
                variable.resolve(values).map(Evaluated::Array)
            }
            Self::Expression(expression) => expression.evaluate(values).map(Evaluated::Value),
            Self::Array(elements) => elements
                .iter()
                .map(|element| element.evaluate(values)?.into_value())
                .collect::<Result<_, _>>()
                .map(Evaluated::Array),
            Self::Object(object) => object.evaluate(values),
            Self::Waveform(waveform) => Ok(Evaluated::Waveform(waveform.clone())),
            Self::Pulse(pulse) => Ok(Evaluated::Pulse(pulse.clone())),
        }
    }

    /// Replace this argument with its concrete counterpart.
    pub fn substitute<K>(&self, values: &HashMap<K, VariableValue>) -> Result<Argument, EvaluationError>
    where
        K: Borrow<str> + Hash + Eq,
    {
        self.evaluate(values).map(Argument::from)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "{value}"),
            Self::Expression(expression) => write!(f, "{expression}"),
            Self::Array(elements) => write!(f, "[{}]", elements.iter().join(", ")),
            Self::Object(object) => write!(f, "{object}"),
            Self::Waveform(waveform) => write!(f, "{waveform}"),
            Self::Pulse(pulse) => write!(f, "{pulse}"),
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Self::Constant(value)
    }
}

impl From<f64> for Argument {
    fn from(value: f64) -> Self {
        Self::Constant(Value::Float(value))
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Self::Constant(Value::Int(value))
    }
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Self::Constant(Value::Int(value.into()))
    }
}

impl From<Expression> for Argument {
    fn from(expression: Expression) -> Self {
        match expression {
            Expression::Number(value) => Self::Constant(value),
            expression => Self::Expression(expression),
        }
    }
}

impl From<Variable> for Argument {
    fn from(variable: Variable) -> Self {
        Self::Expression(Expression::Variable(variable))
    }
}

impl From<&Variable> for Argument {
    fn from(variable: &Variable) -> Self {
        Self::Expression(Expression::Variable(variable.clone()))
    }
}

impl<T: Into<Argument>> From<Vec<T>> for Argument {
    fn from(elements: Vec<T>) -> Self {
        Self::Array(elements.into_iter().map(Into::into).collect())
    }
}

impl From<ParametrizedObject> for Argument {
    fn from(object: ParametrizedObject) -> Self {
        Self::Object(Box::new(object))
    }
}

impl From<Waveform> for Argument {
    fn from(waveform: Waveform) -> Self {
        Self::Waveform(waveform)
    }
}

impl From<Pulse> for Argument {
    fn from(pulse: Pulse) -> Self {
        Self::Pulse(pulse)
    }
}

impl From<Evaluated> for Argument {
    fn from(evaluated: Evaluated) -> Self {
        match evaluated {
            Evaluated::Value(value) => Self::Constant(value),
            Evaluated::Array(values) => Self::Array(values.into_iter().map(Self::Constant).collect()),
            Evaluated::Waveform(waveform) => Self::Waveform(waveform),
            Evaluated::Pulse(pulse) => Self::Pulse(pulse),
        }
    }
}

/// The result of evaluating an [`Argument`].
#[derive(Clone, Debug, PartialEq)]
pub enum Evaluated {
    Value(Value),
    Array(Vec<Value>),
    Waveform(Waveform),
    Pulse(Pulse),
}

impl Evaluated {
    pub fn argument_type(&self) -> ArgumentType {
        match self {
            Self::Value(_) => ArgumentType::Scalar,
            Self::Array(_) => ArgumentType::Array,
            Self::Waveform(_) => ArgumentType::Waveform,
            Self::Pulse(_) => ArgumentType::Pulse,
        }
    }

    fn unexpected(&self, expected: ArgumentType) -> EvaluationError {
        EvaluationError::UnexpectedArgument {
            expected,
            found: self.argument_type(),
        }
    }

    pub fn into_value(self) -> Result<Value, EvaluationError> {
        match self {
            Self::Value(value) => Ok(value),
            other => Err(other.unexpected(ArgumentType::Scalar)),
        }
    }

    /// The evaluated elements; a single value is treated as a one-element array.
    pub fn into_array(self) -> Result<Vec<Value>, EvaluationError> {
        match self {
            Self::Value(value) => Ok(vec![value]),
            Self::Array(values) => Ok(values),
            other => Err(other.unexpected(ArgumentType::Array)),
        }
    }

    pub fn into_waveform(self) -> Result<Waveform, EvaluationError> {
        match self {
            Self::Waveform(waveform) => Ok(waveform),
            other => Err(other.unexpected(ArgumentType::Waveform)),
        }
    }

    pub fn into_pulse(self) -> Result<Pulse, EvaluationError> {
        match self {
            Self::Pulse(pulse) => Ok(pulse),
            other => Err(other.unexpected(ArgumentType::Pulse)),
        }
    }
}

/// The waveform and pulse constructors a [`ParametrizedObject`] may defer.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Constructor {
    ConstantWaveform,
    RampWaveform,
    BlackmanWaveform,
    CustomWaveform,
    Pulse,
    ConstantDetuningPulse,
    ConstantAmplitudePulse,
}

impl Constructor {
    /// The expected argument types, in order.
    pub fn parameters(self) -> &'static [ArgumentType] {
        use ArgumentType::*;

        match self {
            Self::ConstantWaveform => &[Scalar, Scalar],
            Self::RampWaveform => &[Scalar, Scalar, Scalar],
            Self::BlackmanWaveform => &[Scalar, Scalar],
            Self::CustomWaveform => &[Array],
            Self::Pulse => &[Waveform, Waveform, Scalar, Scalar],
            Self::ConstantDetuningPulse => &[Waveform, Scalar, Scalar, Scalar],
            Self::ConstantAmplitudePulse => &[Scalar, Waveform, Scalar, Scalar],
        }
    }

    /// The type of object this constructor produces.
    pub fn output(self) -> ArgumentType {
        match self {
            Self::ConstantWaveform
            | Self::RampWaveform
            | Self::BlackmanWaveform
            | Self::CustomWaveform => ArgumentType::Waveform,
            Self::Pulse | Self::ConstantDetuningPulse | Self::ConstantAmplitudePulse => {
                ArgumentType::Pulse
            }
        }
    }
}

/// A waveform or pulse whose construction is deferred until variable values are known.
///
/// The constructor and its arguments are recorded as given and only evaluated by
/// [`ParametrizedObject::evaluate`], which a [`Sequence`](crate::Sequence) does while building.
/// Anything that depends on the evaluated arguments, such as the duration, is unavailable
/// beforehand.
///
/// ```rust
/// # use pulseq_rs::sequence::{Device, Register, Sequence};
/// # use pulseq_rs::object::ParametrizedObject;
/// # use pulseq_rs::variable::DataType;
/// # let mut sequence = Sequence::new(Register::new(["q0"]).unwrap(), Device::new("device"));
/// let t = sequence.declare_variable("t", 1, DataType::Int).unwrap();
/// let waveform = ParametrizedObject::blackman_waveform(&t, 3.14).unwrap();
/// assert_eq!(waveform.to_string(), "blackman_waveform(t, 3.14)");
/// assert!(waveform.duration().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParametrizedObject {
    constructor: Constructor,
    arguments: Vec<Argument>,
}

impl ParametrizedObject {
    /// Record a constructor call, checking the arguments against its parameters.
    pub fn new(constructor: Constructor, arguments: Vec<Argument>) -> Result<Self, EvaluationError> {
        let object = Self {
            constructor,
            arguments,
        };
        object.check()?;
        Ok(object)
    }

    pub fn constant_waveform(
        duration: impl Into<Argument>,
        value: impl Into<Argument>,
    ) -> Result<Self, EvaluationError> {
        Self::new(
            Constructor::ConstantWaveform,
            vec![duration.into(), value.into()],
        )
    }

    pub fn ramp_waveform(
        duration: impl Into<Argument>,
        start: impl Into<Argument>,
        stop: impl Into<Argument>,
    ) -> Result<Self, EvaluationError> {
        Self::new(
            Constructor::RampWaveform,
            vec![duration.into(), start.into(), stop.into()],
        )
    }

    pub fn blackman_waveform(
        duration: impl Into<Argument>,
        area: impl Into<Argument>,
    ) -> Result<Self, EvaluationError> {
        Self::new(
            Constructor::BlackmanWaveform,
            vec![duration.into(), area.into()],
        )
    }

    pub fn custom_waveform(samples: impl Into<Argument>) -> Result<Self, EvaluationError> {
        Self::new(Constructor::CustomWaveform, vec![samples.into()])
    }

    pub fn pulse(
        amplitude: impl Into<Argument>,
        detuning: impl Into<Argument>,
        phase: impl Into<Argument>,
        post_phase_shift: impl Into<Argument>,
    ) -> Result<Self, EvaluationError> {
        Self::new(
            Constructor::Pulse,
            vec![
                amplitude.into(),
                detuning.into(),
                phase.into(),
                post_phase_shift.into(),
            ],
        )
    }

    pub fn constant_detuning_pulse(
        amplitude: impl Into<Argument>,
        detuning: impl Into<Argument>,
        phase: impl Into<Argument>,
        post_phase_shift: impl Into<Argument>,
    ) -> Result<Self, EvaluationError> {
        Self::new(
            Constructor::ConstantDetuningPulse,
            vec![
                amplitude.into(),
                detuning.into(),
                phase.into(),
                post_phase_shift.into(),
            ],
        )
    }

    pub fn constant_amplitude_pulse(
        amplitude: impl Into<Argument>,
        detuning: impl Into<Argument>,
        phase: impl Into<Argument>,
        post_phase_shift: impl Into<Argument>,
    ) -> Result<Self, EvaluationError> {
        Self::new(
            Constructor::ConstantAmplitudePulse,
            vec![
                amplitude.into(),
                detuning.into(),
                phase.into(),
                post_phase_shift.into(),
            ],
        )
    }

    pub fn constructor(&self) -> Constructor {
        self.constructor
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Check the number and types of the arguments, recursively.
    pub fn check(&self) -> Result<(), EvaluationError> {
        let parameters = self.constructor.parameters();
        if parameters.len() != self.arguments.len() {
            return Err(EvaluationError::ArgumentCount {
                constructor: self.constructor,
                expected: parameters.len(),
                found: self.arguments.len(),
            });
        }
        parameters
            .iter()
            .zip(&self.arguments)
            .try_for_each(|(parameter, argument)| {
                parameter.expect(argument.argument_type())?;
                argument.check()
            })
    }

    pub fn variables(&self) -> Vec<&Variable> {
        self.arguments
            .iter()
            .flat_map(Argument::variables)
            .collect()
    }

    /// Whether no argument references a variable.
    pub fn is_concrete(&self) -> bool {
        self.variables().is_empty()
    }

    /// Always fails: the duration depends on the arguments, which are only evaluated when the
    /// sequence is built. Evaluate the object, or query the built sequence, instead.
    pub fn duration(&self) -> Result<u64, NotConcreteError> {
        Err(NotConcreteError(format!("the duration of {self}")))
    }

    /// Evaluate every argument and construct the concrete waveform or pulse.
    pub fn evaluate<K>(&self, values: &HashMap<K, VariableValue>) -> Result<Evaluated, EvaluationError>
    where
        K: Borrow<str> + Hash + Eq,
    {
        self.check()?;
        let evaluated = self
            .arguments
            .iter()
            .map(|argument| argument.evaluate(values))
            .collect::<Result<Vec<_>, _>>()?;

        match self.constructor {
            Constructor::ConstantWaveform => {
                let [duration, value] = self.unpack(evaluated)?;
                let waveform = ConstantWaveform::new(
                    duration.into_value()?.to_unsigned()?,
                    value.into_value()?.as_f64(),
                )?;
                Ok(Evaluated::Waveform(waveform))
            }
            Constructor::RampWaveform => {
                let [duration, start, stop] = self.unpack(evaluated)?;
                let waveform = RampWaveform::new(
                    duration.into_value()?.to_unsigned()?,
                    start.into_value()?.as_f64(),
                    stop.into_value()?.as_f64(),
                )?;
                Ok(Evaluated::Waveform(waveform))
            }
            Constructor::BlackmanWaveform => {
                let [duration, area] = self.unpack(evaluated)?;
                let waveform = BlackmanWaveform::new(
                    duration.into_value()?.to_unsigned()?,
                    area.into_value()?.as_f64(),
                )?;
                Ok(Evaluated::Waveform(waveform))
            }
            Constructor::CustomWaveform => {
                let [samples] = self.unpack(evaluated)?;
                let samples = samples.into_array()?.iter().map(Value::as_f64).collect();
                Ok(Evaluated::Waveform(CustomWaveform::new(samples)?))
            }
            Constructor::Pulse => {
                let [amplitude, detuning, phase, post_phase_shift] = self.unpack(evaluated)?;
                let pulse = Pulse::new(
                    amplitude.into_waveform()?,
                    detuning.into_waveform()?,
                    phase.into_value()?.as_f64(),
                )
                .with_post_phase_shift(post_phase_shift.into_value()?.as_f64());
                Ok(Evaluated::Pulse(pulse))
            }
            Constructor::ConstantDetuningPulse => {
                let [amplitude, detuning, phase, post_phase_shift] = self.unpack(evaluated)?;
                let pulse = Pulse::constant_detuning(
                    amplitude.into_waveform()?,
                    detuning.into_value()?.as_f64(),
                    phase.into_value()?.as_f64(),
                )?
                .with_post_phase_shift(post_phase_shift.into_value()?.as_f64());
                Ok(Evaluated::Pulse(pulse))
            }
            Constructor::ConstantAmplitudePulse => {
                let [amplitude, detuning, phase, post_phase_shift] = self.unpack(evaluated)?;
                let pulse = Pulse::constant_amplitude(
                    amplitude.into_value()?.as_f64(),
                    detuning.into_waveform()?,
                    phase.into_value()?.as_f64(),
                )?
                .with_post_phase_shift(post_phase_shift.into_value()?.as_f64());
                Ok(Evaluated::Pulse(pulse))
            }
        }
    }

    fn unpack<const N: usize>(
        &self,
        evaluated: Vec<Evaluated>,
    ) -> Result<[Evaluated; N], EvaluationError> {
        evaluated
            .try_into()
            .map_err(|found: Vec<Evaluated>| EvaluationError::ArgumentCount {
                constructor: self.constructor,
                expected: N,
                found: found.len(),
            })
    }
}

impl fmt::Display for ParametrizedObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.constructor,
            self.arguments.iter().join(", ")
        )
    }
}
