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

use std::{
    fmt,
    hash::{Hash, Hasher},
    num::NonZeroI32,
};

use lexical::{format, to_string_with_options, WriteFloatOptions};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{floating_point_eq, variable::DataType};

use super::{EvaluationError, ExpressionFunction, InfixOperator, PrefixOperator};

/// A concrete scalar: the result of evaluating an [`Expression`](super::Expression).
///
/// Serialized untagged, so `3` is an [`Value::Int`] and `3.0` a [`Value::Float`]. Floats that
/// JSON has no number for are written as the strings `"NaN"`, `"inf"` and `"-inf"`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(#[serde(with = "non_finite")] f64),
}

mod non_finite {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Float {
        Number(f64),
        Text(String),
    }

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        match *value {
            value if value.is_finite() => serializer.serialize_f64(value),
            value if value.is_nan() => serializer.serialize_str("NaN"),
            value if value > 0.0 => serializer.serialize_str("inf"),
            _ => serializer.serialize_str("-inf"),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Float::deserialize(deserializer)? {
            Float::Number(value) => Ok(value),
            Float::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                _ => Err(D::Error::custom(format!("expected a number, found {text:?}"))),
            },
        }
    }
}

// Implemented by hand since we can't derive with f64s hidden inside.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(left), Self::Int(right)) => left == right,
            (Self::Float(left), Self::Float(right)) => floating_point_eq::eq(*left, *right),
            (Self::Int(_) | Self::Float(_), _) => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Int(value) => {
                "Int".hash(state);
                value.hash(state);
            }
            Self::Float(value) => {
                "Float".hash(state);
                floating_point_eq::hash(*value, state);
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
        }
    }

    /// Widen to a float. Integers beyond 2^53 lose precision.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    /// Return the value as an integer if it is one, or a float with no fractional part that fits
    /// in an `i64`.
    pub fn to_integer(&self) -> Result<i64, EvaluationError> {
        match *self {
            Self::Int(value) => Ok(value),
            Self::Float(value) if is_integral(value) => Ok(value as i64),
            Self::Float(_) => Err(EvaluationError::NotAnInteger(*self)),
        }
    }

    /// Like [`Value::to_integer`], but also rejecting negative values.
    pub fn to_unsigned(&self) -> Result<u64, EvaluationError> {
        let integer = self.to_integer()?;
        u64::try_from(integer).map_err(|_| EvaluationError::Negative(integer))
    }

    /// Apply an infix operator.
    ///
    /// `int ∘ int` stays an integer for `+`, `-`, `*` and for `^` with a non-negative exponent;
    /// `/` is always true division. Any float operand makes the result a float.
    pub(crate) fn apply_infix(
        self,
        operator: InfixOperator,
        right: Value,
    ) -> Result<Value, EvaluationError> {
        use InfixOperator::*;

        if let (Self::Int(left), Self::Int(right)) = (self, right) {
            let integer = match operator {
                Plus => Some(left.checked_add(right)),
                Minus => Some(left.checked_sub(right)),
                Star => Some(left.checked_mul(right)),
                Caret if right >= 0 => Some(integer_pow(left, right)),
                Caret => None,
                Slash => None,
            };
            match integer {
                Some(Some(value)) => return Ok(Self::Int(value)),
                Some(None) => return Err(EvaluationError::Overflow),
                None => {}
            }
        }

        let (left, right) = (self.as_f64(), right.as_f64());
        Ok(Self::Float(match operator {
            Caret => left.powf(right),
            Plus => left + right,
            Minus => left - right,
            Slash => left / right,
            Star => left * right,
        }))
    }

    pub(crate) fn apply_prefix(self, operator: PrefixOperator) -> Result<Value, EvaluationError> {
        match (operator, self) {
            (PrefixOperator::Minus, Self::Int(value)) => value
                .checked_neg()
                .map(Self::Int)
                .ok_or(EvaluationError::Overflow),
            (PrefixOperator::Minus, Self::Float(value)) => Ok(Self::Float(-value)),
        }
    }

    pub(crate) fn apply_function(self, function: ExpressionFunction) -> Value {
        use ExpressionFunction::*;

        let argument = self.as_f64();
        Self::Float(match function {
            Cosine => argument.cos(),
            Exponent => argument.exp(),
            Sine => argument.sin(),
            SquareRoot => argument.sqrt(),
        })
    }
}

/// `base ^ exponent` for a non-negative `exponent`, or `None` on overflow.
fn integer_pow(base: i64, exponent: i64) -> Option<i64> {
    match (base, u32::try_from(exponent)) {
        (_, Ok(exponent)) => base.checked_pow(exponent),
        // The exponent is positive here.
        (0 | 1, Err(_)) => Some(base),
        (-1, Err(_)) => Some(if exponent % 2 == 0 { 1 } else { -1 }),
        (_, Err(_)) => None,
    }
}

/// Whether a float holds an integer that round-trips through `i64`.
pub(crate) fn is_integral(value: f64) -> bool {
    // `i64::MAX as f64` rounds up to 2^63, which is itself out of range.
    value.is_finite()
        && value.fract() == 0.0
        && value >= i64::MIN as f64
        && value < i64::MAX as f64
}

static FORMAT_FLOAT_OPTIONS: Lazy<WriteFloatOptions> = Lazy::new(|| {
    WriteFloatOptions::builder()
        .negative_exponent_break(NonZeroI32::new(-5))
        .positive_exponent_break(NonZeroI32::new(15))
        // Keep the trailing `.0` so floats and integers stay distinguishable.
        .trim_floats(false)
        .build()
        .expect("options are valid")
});

/// Format a float so that it always reads as a float: `3.0`, `0.25`, `1.0e20`.
pub(crate) fn format_float(value: f64) -> String {
    const FORMAT: u128 = format::STANDARD;
    to_string_with_options::<_, FORMAT>(value, &FORMAT_FLOAT_OPTIONS)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{}", format_float(*value)),
        }
    }
}
