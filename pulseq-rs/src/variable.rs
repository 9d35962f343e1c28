//! Variables: named, typed, sized placeholders for values supplied at build time.

use std::{borrow::Borrow, collections::HashMap, fmt, hash::Hash};

use serde::{Deserialize, Serialize};

#[cfg(test)]
use proptest_derive::Arbitrary;

use crate::expression::{is_integral, EvaluationError, Expression, IndexExpression, Value};

/// The element type of a [`Variable`].
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(test, derive(Arbitrary))]
pub enum DataType {
    #[default]
    Float,
    Int,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("variable {name} holds a single value and can't be indexed")]
    NotAnArray { name: String },
    #[error("index {index} is out of range for variable {name} of size {size}")]
    OutOfRange { name: String, index: u64, size: u64 },
}

/// A placeholder for `size` values of type `dtype`, declared on a
/// [`Sequence`](crate::Sequence) with
/// [`declare_variable`](crate::Sequence::declare_variable).
///
/// Variables are immutable. Arithmetic on them (`+`, `-`, `*`, `/`, unary `-`) builds
/// [`Expression`]s.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    dtype: DataType,
    size: u64,
}

impl Variable {
    pub(crate) fn new(name: impl Into<String>, dtype: DataType, size: u64) -> Self {
        Self {
            name: name.into(),
            dtype,
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// An expression bound to one slot of this variable. Only variables of size 2 or more can be
    /// indexed.
    pub fn index(&self, index: u64) -> Result<Expression, IndexError> {
        if self.size == 1 {
            Err(IndexError::NotAnArray {
                name: self.name.clone(),
            })
        } else if index < self.size {
            Ok(Expression::Index(IndexExpression {
                variable: self.clone(),
                index,
            }))
        } else {
            Err(IndexError::OutOfRange {
                name: self.name.clone(),
                index,
                size: self.size,
            })
        }
    }

    /// One expression per slot, in order. A variable of size 1 unpacks to itself.
    ///
    /// ```rust
    /// # use pulseq_rs::sequence::{Device, Register, Sequence};
    /// # use pulseq_rs::variable::DataType;
    /// # let mut sequence = Sequence::new(Register::new(["q0"]).unwrap(), Device::new("device"));
    /// let ts = sequence.declare_variable("ts", 2, DataType::Int).unwrap();
    /// let [t1, t2]: [_; 2] = ts.unpack().try_into().unwrap();
    /// assert_eq!(t1.to_string(), "ts[0]");
    /// assert_eq!(t2.to_string(), "ts[1]");
    /// ```
    pub fn unpack(&self) -> Vec<Expression> {
        if self.size == 1 {
            return vec![Expression::Variable(self.clone())];
        }
        (0..self.size)
            .map(|index| {
                Expression::Index(IndexExpression {
                    variable: self.clone(),
                    index,
                })
            })
            .collect()
    }

    /// Check a value against this declaration, returning one [`Value`] per slot.
    ///
    /// The value must have the declared shape: a scalar (or one-element array) for size 1, an
    /// array of exactly `size` elements otherwise. Integers are accepted for `float` variables.
    /// `int` variables accept integers and floats with no fractional part, and nothing else.
    pub fn coerce(&self, value: &VariableValue) -> Result<Vec<Value>, EvaluationError> {
        let elements = value.as_slice();
        if elements.len() as u64 != self.size {
            return Err(EvaluationError::ShapeMismatch {
                name: self.name.clone(),
                expected: self.size,
                found: elements.len(),
            });
        }

        elements
            .iter()
            .map(|element| match (self.dtype, *element) {
                (DataType::Float, Value::Int(integer)) => Ok(Value::Float(integer as f64)),
                (DataType::Float, float @ Value::Float(_)) => Ok(float),
                (DataType::Int, integer @ Value::Int(_)) => Ok(integer),
                (DataType::Int, Value::Float(float)) if is_integral(float) => {
                    Ok(Value::Int(float as i64))
                }
                (DataType::Int, found) => Err(EvaluationError::TypeMismatch {
                    name: self.name.clone(),
                    expected: self.dtype,
                    found,
                }),
            })
            .collect()
    }

    /// Look this variable up in `values` and [`coerce`](Self::coerce) it.
    pub(crate) fn resolve<K>(
        &self,
        values: &HashMap<K, VariableValue>,
    ) -> Result<Vec<Value>, EvaluationError>
    where
        K: Borrow<str> + Hash + Eq,
    {
        let value = values
            .get(self.name.as_str())
            .ok_or_else(|| EvaluationError::UnboundVariable(self.name.clone()))?;
        self.coerce(value)
    }

    /// The declaration, e.g. `ts: int[2]`.
    pub fn declaration(&self) -> String {
        format!("{}: {}[{}]", self.name, self.dtype, self.size)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The value supplied for a variable at build time.
///
/// Serialized untagged, so JSON `3`, `2.5` and `[10, 20]` are all accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Scalar(Value),
    Array(Vec<Value>),
}

impl VariableValue {
    pub fn as_slice(&self) -> &[Value] {
        match self {
            Self::Scalar(value) => std::slice::from_ref(value),
            Self::Array(values) => values,
        }
    }
}

impl From<Value> for VariableValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        Self::Scalar(Value::Float(value))
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        Self::Scalar(Value::Int(value))
    }
}

impl From<i32> for VariableValue {
    fn from(value: i32) -> Self {
        Self::Scalar(Value::Int(value.into()))
    }
}

impl<T: Into<Value>> From<Vec<T>> for VariableValue {
    fn from(values: Vec<T>) -> Self {
        Self::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for VariableValue {
    fn from(values: [T; N]) -> Self {
        Self::Array(values.into_iter().map(Into::into).collect())
    }
}
