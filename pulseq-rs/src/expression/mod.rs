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
    borrow::Borrow,
    collections::HashMap,
    fmt,
    hash::Hash,
    ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign},
};

use internment::ArcIntern;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use proptest_derive::Arbitrary;

use crate::{
    object::{ArgumentType, Constructor},
    variable::{DataType, IndexError, Variable, VariableValue},
    waveform::WaveformError,
};

mod value;

pub use value::Value;
pub(crate) use value::{format_float, is_integral};

/// The different possible types of errors that could occur during expression evaluation.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("no value was given for variable {0}")]
    UnboundVariable(String),
    #[error("variable {name} is declared as {expected} but was given {found}")]
    TypeMismatch {
        name: String,
        expected: DataType,
        found: Value,
    },
    #[error("variable {name} has size {expected} but was given {found} value(s)")]
    ShapeMismatch {
        name: String,
        expected: u64,
        found: usize,
    },
    #[error("variable {name} of size {size} can't be used where a single value is expected")]
    NotScalar { name: String, size: u64 },
    #[error(transparent)]
    IndexOutOfRange(#[from] IndexError),
    #[error("expected an integer, found {0}")]
    NotAnInteger(Value),
    #[error("expected a non-negative integer, found {0}")]
    Negative(i64),
    #[error("integer overflow")]
    Overflow,
    #[error("expected {expected}, found {found}")]
    UnexpectedArgument {
        expected: ArgumentType,
        found: ArgumentType,
    },
    #[error("{constructor} takes {expected} argument(s), found {found}")]
    ArgumentCount {
        constructor: Constructor,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Waveform(#[from] WaveformError),
}

/// An expression over [`Variable`]s and constants, evaluated once values are known.
///
/// Expressions take advantage of *structural sharing*: child nodes are held in
/// [`ArcIntern<Expression>`]s, so that creating the same sub-expression twice yields the same
/// pointer, and cloning, comparing and hashing expressions never recurses.
///
/// Expressions are immutable; every operator builds a new node. Embedded NaNs compare equal to
/// other NaNs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    FunctionCall(FunctionCallExpression),
    Index(IndexExpression),
    Infix(InfixExpression),
    Number(Value),
    Prefix(PrefixExpression),
    Variable(Variable),
}

/// A function call, e.g. `sin(e)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCallExpression {
    pub function: ExpressionFunction,
    pub expression: ArcIntern<Expression>,
}

impl FunctionCallExpression {
    pub fn new(function: ExpressionFunction, expression: ArcIntern<Expression>) -> Self {
        Self {
            function,
            expression,
        }
    }
}

/// A single slot of a variable, e.g. `ts[1]`.
///
/// Build these with [`Variable::index`] or [`Variable::unpack`], which check the bounds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexExpression {
    pub variable: Variable,
    pub index: u64,
}

/// An infix expression, e.g. `e1 + e2`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InfixExpression {
    pub left: ArcIntern<Expression>,
    pub operator: InfixOperator,
    pub right: ArcIntern<Expression>,
}

impl InfixExpression {
    pub fn new(
        left: ArcIntern<Expression>,
        operator: InfixOperator,
        right: ArcIntern<Expression>,
    ) -> Self {
        Self {
            left,
            operator,
            right,
        }
    }
}

/// A prefix expression, e.g. `-e`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefixExpression {
    pub operator: PrefixOperator,
    pub expression: ArcIntern<Expression>,
}

impl PrefixExpression {
    pub fn new(operator: PrefixOperator, expression: ArcIntern<Expression>) -> Self {
        Self {
            operator,
            expression,
        }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Self::Number(value)
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Self::Number(Value::Float(value))
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Self::Number(Value::Int(value))
    }
}

impl From<i32> for Expression {
    fn from(value: i32) -> Self {
        Self::Number(Value::Int(value.into()))
    }
}

impl From<Variable> for Expression {
    fn from(variable: Variable) -> Self {
        Self::Variable(variable)
    }
}

impl From<&Variable> for Expression {
    fn from(variable: &Variable) -> Self {
        Self::Variable(variable.clone())
    }
}

impl From<IndexExpression> for Expression {
    fn from(index: IndexExpression) -> Self {
        Self::Index(index)
    }
}

fn infix(left: Expression, operator: InfixOperator, right: Expression) -> Expression {
    Expression::Infix(InfixExpression::new(
        ArcIntern::new(left),
        operator,
        ArcIntern::new(right),
    ))
}

macro_rules! impl_scalar_lhs {
    ($name:ident, $function:ident, $($scalar:ty),+) => {
        $(
            impl $name<Expression> for $scalar {
                type Output = Expression;
                fn $function(self, other: Expression) -> Expression {
                    Expression::from(self).$function(other)
                }
            }

            impl $name<&Variable> for $scalar {
                type Output = Expression;
                fn $function(self, other: &Variable) -> Expression {
                    Expression::from(self).$function(other)
                }
            }

            impl $name<Variable> for $scalar {
                type Output = Expression;
                fn $function(self, other: Variable) -> Expression {
                    Expression::from(self).$function(other)
                }
            }
        )+
    };
}

macro_rules! impl_expr_op {
    ($name:ident, $name_assign:ident, $function:ident, $function_assign:ident, $operator:ident) => {
        impl<T: Into<Expression>> $name<T> for Expression {
            type Output = Self;
            fn $function(self, other: T) -> Self {
                infix(self, InfixOperator::$operator, other.into())
            }
        }

        impl<T: Into<Expression>> $name<T> for Variable {
            type Output = Expression;
            fn $function(self, other: T) -> Expression {
                Expression::from(self).$function(other)
            }
        }

        impl<T: Into<Expression>> $name<T> for &Variable {
            type Output = Expression;
            fn $function(self, other: T) -> Expression {
                Expression::from(self).$function(other)
            }
        }

        impl<T: Into<Expression>> $name_assign<T> for Expression {
            fn $function_assign(&mut self, other: T) {
                // Move out of self to avoid cloning the left-hand side
                let temp = ::std::mem::replace(self, Self::Number(Value::Int(0)));
                *self = temp.$function(other);
            }
        }

        impl_scalar_lhs!($name, $function, f64, i64, i32);
    };
}

impl_expr_op!(Add, AddAssign, add, add_assign, Plus);
impl_expr_op!(Sub, SubAssign, sub, sub_assign, Minus);
impl_expr_op!(Mul, MulAssign, mul, mul_assign, Star);
impl_expr_op!(Div, DivAssign, div, div_assign, Slash);

impl Neg for Expression {
    type Output = Self;

    fn neg(self) -> Self {
        Expression::Prefix(PrefixExpression::new(
            PrefixOperator::Minus,
            ArcIntern::new(self),
        ))
    }
}

impl Neg for Variable {
    type Output = Expression;

    fn neg(self) -> Expression {
        -Expression::from(self)
    }
}

impl Neg for &Variable {
    type Output = Expression;

    fn neg(self) -> Expression {
        -Expression::from(self)
    }
}

impl Expression {
    /// Raise this expression to a power.
    #[must_use]
    pub fn pow(self, exponent: impl Into<Expression>) -> Self {
        infix(self, InfixOperator::Caret, exponent.into())
    }

    #[must_use]
    pub fn call(self, function: ExpressionFunction) -> Self {
        Expression::FunctionCall(FunctionCallExpression::new(function, ArcIntern::new(self)))
    }

    #[must_use]
    pub fn sin(self) -> Self {
        self.call(ExpressionFunction::Sine)
    }

    #[must_use]
    pub fn cos(self) -> Self {
        self.call(ExpressionFunction::Cosine)
    }

    #[must_use]
    pub fn exp(self) -> Self {
        self.call(ExpressionFunction::Exponent)
    }

    #[must_use]
    pub fn sqrt(self) -> Self {
        self.call(ExpressionFunction::SquareRoot)
    }

    /// Evaluate the expression to a single value, substituting each variable from `values`.
    ///
    /// Values are checked against the variable's declaration: see [`Variable::coerce`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use pulseq_rs::expression::Value;
    /// use pulseq_rs::sequence::{Device, Register, Sequence};
    /// use pulseq_rs::variable::{DataType, VariableValue};
    ///
    /// let register = Register::new(["q0"]).unwrap();
    /// let mut sequence = Sequence::new(register, Device::new("device"));
    /// let t = sequence.declare_variable("t", 1, DataType::Float).unwrap();
    /// let expression = &t * 2 + 1;
    ///
    /// let values = HashMap::from([("t", VariableValue::from(1.5))]);
    /// assert_eq!(expression.evaluate(&values), Ok(Value::Float(4.0)));
    /// ```
    pub fn evaluate<K>(&self, values: &HashMap<K, VariableValue>) -> Result<Value, EvaluationError>
    where
        K: Borrow<str> + Hash + Eq,
    {
        use Expression::*;

        match self {
            FunctionCall(FunctionCallExpression {
                function,
                expression,
            }) => Ok(expression.evaluate(values)?.apply_function(*function)),
            Index(IndexExpression { variable, index }) => {
                let resolved = variable.resolve(values)?;
                let slot = usize::try_from(*index)
                    .ok()
                    .and_then(|index| resolved.get(index));
                slot.copied().ok_or_else(|| {
                    EvaluationError::IndexOutOfRange(IndexError::OutOfRange {
                        name: variable.name().to_owned(),
                        index: *index,
                        size: variable.size(),
                    })
                })
            }
            Infix(InfixExpression {
                left,
                operator,
                right,
            }) => {
                let left = left.evaluate(values)?;
                let right = right.evaluate(values)?;
                left.apply_infix(*operator, right)
            }
            Number(value) => Ok(*value),
            Prefix(PrefixExpression {
                operator,
                expression,
            }) => expression.evaluate(values)?.apply_prefix(*operator),
            Variable(variable) => match variable.resolve(values)?.as_slice() {
                [value] => Ok(*value),
                _ => Err(EvaluationError::NotScalar {
                    name: variable.name().to_owned(),
                    size: variable.size(),
                }),
            },
        }
    }

    /// Every variable referenced by this expression, in depth-first order, with repeats.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut variables = Vec::new();
        self.collect_variables(&mut variables);
        variables
    }

    fn collect_variables<'a>(&'a self, variables: &mut Vec<&'a Variable>) {
        match self {
            Expression::FunctionCall(FunctionCallExpression { expression, .. })
            | Expression::Prefix(PrefixExpression { expression, .. }) => {
                expression.collect_variables(variables)
            }
            Expression::Index(IndexExpression { variable, .. })
            | Expression::Variable(variable) => variables.push(variable),
            Expression::Infix(InfixExpression { left, right, .. }) => {
                left.collect_variables(variables);
                right.collect_variables(variables);
            }
            Expression::Number(_) => {}
        }
    }

    /// Whether the expression can be evaluated without any variable values.
    pub fn is_constant(&self) -> bool {
        self.variables().is_empty()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Expression::*;
        match self {
            FunctionCall(FunctionCallExpression {
                function,
                expression,
            }) => write!(f, "{function}({expression})"),
            Index(IndexExpression { variable, index }) => write!(f, "{variable}[{index}]"),
            Infix(InfixExpression {
                left,
                operator,
                right,
            }) => {
                format_inner_expression(f, left)?;
                write!(f, " {operator} ")?;
                format_inner_expression(f, right)
            }
            Number(value) => write!(f, "{value}"),
            Prefix(PrefixExpression {
                operator,
                expression,
            }) => {
                write!(f, "{operator}")?;
                format_inner_expression(f, expression)
            }
            Variable(variable) => write!(f, "{variable}"),
        }
    }
}

/// Wrap infix sub-expressions in parentheses, so that precedence survives formatting.
fn format_inner_expression(f: &mut fmt::Formatter, expression: &Expression) -> fmt::Result {
    match expression {
        Expression::Infix(_) => write!(f, "({expression})"),
        _ => write!(f, "{expression}"),
    }
}

/// A function that may be applied to an expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(test, derive(Arbitrary))]
pub enum ExpressionFunction {
    Cosine,
    Exponent,
    Sine,
    SquareRoot,
}

impl fmt::Display for ExpressionFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ExpressionFunction::*;
        write!(
            f,
            "{}",
            match self {
                Cosine => "cos",
                Exponent => "exp",
                Sine => "sin",
                SquareRoot => "sqrt",
            }
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(test, derive(Arbitrary))]
pub enum PrefixOperator {
    Minus,
}

impl fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrefixOperator::Minus => write!(f, "-"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(test, derive(Arbitrary))]
pub enum InfixOperator {
    Caret,
    Plus,
    Minus,
    Slash,
    Star,
}

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use InfixOperator::*;
        write!(
            f,
            "{}",
            match self {
                Caret => "^",
                Plus => "+",
                Minus => "-",
                Slash => "/",
                Star => "*",
            }
        )
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{hash_map::DefaultHasher, HashSet};
    use std::hash::Hasher;

    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    use super::proptest_helpers::arb_expr;

    fn hash_to_u64<T: Hash>(t: &T) -> u64 {
        let mut s = DefaultHasher::new();
        t.hash(&mut s);
        s.finish()
    }

    fn x() -> Variable {
        Variable::new("x", DataType::Float, 1)
    }

    fn ts() -> Variable {
        Variable::new("ts", DataType::Int, 2)
    }

    fn values() -> HashMap<&'static str, VariableValue> {
        HashMap::from([
            ("x", VariableValue::from(3.0)),
            ("ts", VariableValue::from(vec![10, 20])),
        ])
    }

    #[rstest]
    #[case::constant(Expression::from(2), Value::Int(2))]
    #[case::variable(Expression::from(x()), Value::Float(3.0))]
    #[case::index(ts().index(1).unwrap(), Value::Int(20))]
    #[case::int_arithmetic(ts().index(0).unwrap() * 2 + 1, Value::Int(21))]
    #[case::mixed_arithmetic(x() * ts().index(0).unwrap(), Value::Float(30.0))]
    #[case::true_division(ts().index(1).unwrap() / ts().index(0).unwrap(), Value::Float(2.0))]
    #[case::negation(-x(), Value::Float(-3.0))]
    #[case::power(Expression::from(x()).pow(2), Value::Float(9.0))]
    #[case::scalar_on_the_left(1.0 - x(), Value::Float(-2.0))]
    fn evaluate(#[case] expression: Expression, #[case] expected: Value) {
        assert_eq!(expression.evaluate(&values()), Ok(expected));
    }

    #[test]
    fn evaluate_function() {
        let expression = (Expression::from(x()) * 0.0).cos() + Expression::from(4).sqrt();
        let evaluated = expression.evaluate(&values()).unwrap();
        assert_abs_diff_eq!(evaluated.as_f64(), 3.0);
    }

    #[test]
    fn evaluate_unbound() {
        let expression = x() + 1;
        let empty: HashMap<String, VariableValue> = HashMap::new();
        assert_eq!(
            expression.evaluate(&empty),
            Err(EvaluationError::UnboundVariable("x".to_string()))
        );
    }

    #[test]
    fn evaluate_whole_array_is_not_scalar() {
        let expression = Expression::from(ts()) + 1;
        assert_eq!(
            expression.evaluate(&values()),
            Err(EvaluationError::NotScalar {
                name: "ts".to_string(),
                size: 2
            })
        );
    }

    #[test]
    fn evaluate_strict_integer() {
        let n = Variable::new("n", DataType::Int, 1);
        let values = HashMap::from([("n", VariableValue::from(2.5))]);
        assert_eq!(
            Expression::from(&n).evaluate(&values),
            Err(EvaluationError::TypeMismatch {
                name: "n".to_string(),
                expected: DataType::Int,
                found: Value::Float(2.5),
            })
        );
    }

    #[test]
    fn operators_do_not_mutate_variables() {
        let variable = x();
        let _ = &variable + 1;
        let _ = -&variable;
        assert_eq!(variable, x());
    }

    #[test]
    fn in_place_operators() {
        let mut expression = Expression::from(x());
        expression += 1;
        expression *= 2;
        assert_eq!(expression, (x() + 1) * 2);
        assert_eq!(expression.evaluate(&values()), Ok(Value::Float(8.0)));
    }

    #[test]
    fn structural_sharing() {
        let left = x() + 1;
        let right = x() + 1;
        let product = left.clone() * right;
        match product {
            Expression::Infix(InfixExpression { left, right, .. }) => {
                assert!(std::ptr::eq::<Expression>(&*left, &*right))
            }
            other => panic!("expected an infix expression, got {other:?}"),
        }
    }

    #[rstest]
    #[case(x() + 1, "x + 1")]
    #[case((x() + 1) * 2, "(x + 1) * 2")]
    #[case(-(x() - 1.5), "-(x - 1.5)")]
    #[case(ts().index(0).unwrap() / ts().index(1).unwrap(), "ts[0] / ts[1]")]
    #[case((x() * 2).sin(), "sin(x * 2)")]
    #[case(Expression::from(x()).pow(3), "x ^ 3")]
    fn display(#[case] expression: Expression, #[case] expected: &str) {
        assert_eq!(expression.to_string(), expected);
    }

    #[test]
    fn variables_are_collected() {
        let expression = (x() + ts().index(1).unwrap()) * x();
        let names: Vec<_> = expression.variables().iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["x", "ts", "x"]);
        assert!(!expression.is_constant());
        assert!((Expression::from(1) + 2.0).is_constant());
    }

    #[test]
    fn nan_is_equal() {
        let left = Expression::from(f64::NAN);
        let right = left.clone();
        assert_eq!(left, right);
    }

    proptest! {
        #[test]
        fn eq_iff_hash_eq(
            a in arb_expr(vec![x(), ts()]),
            b in arb_expr(vec![x(), ts()]),
        ) {
            prop_assert_eq!(a == b, hash_to_u64(&a) == hash_to_u64(&b));
        }

        #[test]
        fn hash_set_membership(a: f64, b: f64) {
            let first = Expression::from(a) + b;
            let matching = first.clone();
            let differing = Expression::from(b) - a;
            let mut set = HashSet::new();
            set.insert(first);
            prop_assert!(set.contains(&matching));
            prop_assert!(!set.contains(&differing));
        }

        #[test]
        fn evaluation_is_deterministic(e in arb_expr(vec![x(), ts()])) {
            prop_assert_eq!(e.evaluate(&values()), e.evaluate(&values()));
        }

        #[test]
        fn json_round_trip(e in arb_expr(vec![x(), ts()])) {
            let json = serde_json::to_string(&e).unwrap();
            let parsed: Expression = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed, e);
        }
    }
}
