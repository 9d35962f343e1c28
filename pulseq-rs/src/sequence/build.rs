//! Building a concrete sequence out of a parametrized one.

use std::{borrow::Borrow, collections::HashMap, hash::Hash};

use tracing::{info, warn};

use crate::{expression::EvaluationError, variable::VariableValue};

use super::{Sequence, SequenceError};

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("no value was given for variable {0}")]
    MissingVariable(String),
    #[error("a value was given for {0}, which is not a declared variable")]
    UnexpectedVariable(String),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("replaying call {index} failed: {source}")]
    Replay {
        index: usize,
        #[source]
        source: SequenceError,
    },
}

impl Sequence {
    /// Build a concrete sequence, giving each declared variable the value in `values`.
    ///
    /// `values` must hold exactly one value per declared variable, of the declared type and size
    /// (see [`Variable::coerce`](crate::variable::Variable::coerce)). Every recorded call is then
    /// evaluated and replayed, in order, on a new concrete sequence with the same configuration.
    ///
    /// This sequence is left untouched, so it can be built any number of times, including
    /// concurrently. Nothing is returned unless every call replays successfully.
    pub fn build<K>(&self, values: &HashMap<K, VariableValue>) -> Result<Sequence, BuildError>
    where
        K: Borrow<str> + Hash + Eq,
    {
        if let Some(missing) = self
            .variables
            .keys()
            .find(|name| !values.contains_key(name.as_str()))
        {
            return Err(BuildError::MissingVariable(missing.clone()));
        }
        if let Some(unexpected) = values
            .keys()
            .map(Borrow::<str>::borrow)
            .filter(|name| !self.variables.contains_key(*name))
            .min()
        {
            return Err(BuildError::UnexpectedVariable(unexpected.to_string()));
        }
        for variable in self.variables.values() {
            variable.resolve(values)?;
        }

        if !self.is_parametrized() {
            warn!("building a sequence that is not parametrized; its calls are replayed as made");
        }

        let calls = self.calls();
        let mut built = Sequence::with_config(self.config.clone());
        for (index, call) in calls.iter().enumerate() {
            call.substitute(values)
                .map_err(SequenceError::from)
                .and_then(|call| built.record(call))
                .map_err(|source| BuildError::Replay { index, source })?;
        }

        info!(
            calls = calls.len(),
            variables = self.variables.len(),
            "built sequence"
        );
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::{fixture, rstest};

    use crate::{
        expression::Value,
        object::{Argument, ParametrizedObject},
        pulse::Pulse,
        sequence::{
            Basis, ChannelDeclaration, ChannelKind, Device, Protocol, Register, SlotKind,
        },
        variable::{DataType, Variable},
        waveform::{BlackmanWaveform, ConstantWaveform, RampWaveform},
    };

    struct Setup {
        sequence: Sequence,
        x: Variable,
        ts: Variable,
    }

    /// `x` drives the area of a Blackman pulse, `ts` the durations around it.
    #[fixture]
    fn setup() -> Setup {
        let register = Register::new(["q0", "q1"]).unwrap();
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
        let x = sequence.declare_variable("x", 1, DataType::Float).unwrap();
        let ts = sequence.declare_variable("ts", 2, DataType::Int).unwrap();
        Setup { sequence, x, ts }
    }

    fn values(
        x: impl Into<VariableValue>,
        ts: impl Into<VariableValue>,
    ) -> HashMap<String, VariableValue> {
        HashMap::from([("x".to_string(), x.into()), ("ts".to_string(), ts.into())])
    }

    fn blackman_pulse(duration: impl Into<Argument>, area: &Variable) -> ParametrizedObject {
        let amplitude = ParametrizedObject::blackman_waveform(duration, area).unwrap();
        ParametrizedObject::constant_detuning_pulse(amplitude, 0.0, 0.0, 0.0).unwrap()
    }

    #[rstest]
    fn build_replays_with_values(setup: Setup) {
        let Setup { mut sequence, x, ts } = setup;
        let [t1, t2]: [_; 2] = ts.unpack().try_into().unwrap();
        sequence
            .add(blackman_pulse(100, &x), "rydberg", Protocol::MinDelay)
            .unwrap();
        sequence.delay(t1, "raman").unwrap();
        sequence.delay(t2 * 2, "rydberg").unwrap();

        let built = sequence.build(&values(3.0, [10, 20])).unwrap();
        assert!(!built.is_parametrized());
        assert!(built.variables().is_empty());
        assert_eq!(built.config(), sequence.config());

        let schedule = built.schedule().unwrap();
        let expected = Pulse::constant_detuning(BlackmanWaveform::new(100, 3.0).unwrap(), 0.0, 0.0)
            .unwrap();
        let rydberg = schedule.channel("rydberg").unwrap().slots();
        assert_eq!(rydberg[0].kind, SlotKind::Pulse(expected));
        assert_eq!(rydberg[1].end - rydberg[1].start, 40);
        assert_eq!(schedule.channel("raman").unwrap().end(), 10);
        assert_eq!(built.duration(), Ok(140));

        // The parametrized sequence is untouched.
        assert!(sequence.is_parametrized());
        assert_eq!(sequence.instruction_log().map(|log| log.len()), Some(3));
    }

    #[rstest]
    fn missing_variable(setup: Setup) {
        let Setup { mut sequence, x, .. } = setup;
        sequence
            .add(blackman_pulse(100, &x), "rydberg", Protocol::MinDelay)
            .unwrap();
        let values = HashMap::from([("x", VariableValue::from(3.0))]);
        assert_eq!(
            sequence.build(&values),
            Err(BuildError::MissingVariable("ts".to_string()))
        );
    }

    #[rstest]
    fn missing_is_reported_before_unexpected(setup: Setup) {
        let values = HashMap::from([
            ("x", VariableValue::from(3.0)),
            ("zeta", VariableValue::from(1.0)),
        ]);
        assert_eq!(
            setup.sequence.build(&values),
            Err(BuildError::MissingVariable("ts".to_string()))
        );
    }

    #[rstest]
    fn unexpected_variables_are_reported_in_name_order(setup: Setup) {
        let mut values = values(3.0, [10, 20]);
        values.insert("zeta".to_string(), VariableValue::from(1));
        values.insert("alpha".to_string(), VariableValue::from(2));
        assert_eq!(
            setup.sequence.build(&values),
            Err(BuildError::UnexpectedVariable("alpha".to_string()))
        );
    }

    #[rstest]
    #[case::fractional_int(
        values(3.0, [10.5, 20.0]),
        EvaluationError::TypeMismatch { name: "ts".to_string(), expected: DataType::Int, found: Value::Float(10.5) }
    )]
    #[case::wrong_size(
        values(3.0, vec![10]),
        EvaluationError::ShapeMismatch { name: "ts".to_string(), expected: 2, found: 1 }
    )]
    #[case::array_for_scalar(
        values([3.0, 4.0], [10, 20]),
        EvaluationError::ShapeMismatch { name: "x".to_string(), expected: 1, found: 2 }
    )]
    fn invalid_values(
        setup: Setup,
        #[case] values: HashMap<String, VariableValue>,
        #[case] expected: EvaluationError,
    ) {
        assert_eq!(setup.sequence.build(&values), Err(BuildError::Evaluation(expected)));
    }

    #[rstest]
    fn strict_int_variable() {
        let mut sequence = Sequence::new(Register::new(["q0"]).unwrap(), Device::new("d"));
        sequence
            .declare_channel("rydberg", ChannelKind::RydbergGlobal)
            .unwrap();
        let n = sequence.declare_variable("n", 1, DataType::Int).unwrap();
        sequence.delay(&n, "rydberg").unwrap();

        let values = HashMap::from([("n", VariableValue::from(2.5))]);
        assert_eq!(
            sequence.build(&values),
            Err(BuildError::Evaluation(EvaluationError::TypeMismatch {
                name: "n".to_string(),
                expected: DataType::Int,
                found: Value::Float(2.5),
            }))
        );

        let values = HashMap::from([("n", VariableValue::from(2.0))]);
        assert_eq!(sequence.build(&values).unwrap().duration(), Ok(2));
    }

    #[rstest]
    fn replay_failure_reports_the_call(setup: Setup) {
        let Setup { mut sequence, x, ts } = setup;
        sequence.delay(10, "rydberg").unwrap();
        sequence
            .add(blackman_pulse(ts.index(0).unwrap() - 50, &x), "rydberg", Protocol::MinDelay)
            .unwrap();

        assert_eq!(
            sequence.build(&values(1.0, [20, 0])),
            Err(BuildError::Replay {
                index: 1,
                source: SequenceError::Evaluation(EvaluationError::Negative(-30)),
            })
        );
        assert!(sequence.build(&values(1.0, [70, 0])).is_ok());
    }

    #[rstest]
    fn parametrized_targets_are_checked_at_build(setup: Setup) {
        let Setup { mut sequence, ts, .. } = setup;
        sequence.target_index(ts.index(0).unwrap(), "raman").unwrap();

        let built = sequence.build(&values(0.0, [1, 0])).unwrap();
        assert_eq!(built.current_target("raman"), Ok(&["q1".to_string()][..]));

        assert_eq!(
            sequence.build(&values(0.0, [2, 0])),
            Err(BuildError::Replay {
                index: 0,
                source: SequenceError::QubitIndexOutOfRange { index: 2, size: 2 },
            })
        );
    }

    #[rstest]
    fn whole_array_variable_as_indices(setup: Setup) {
        let Setup { mut sequence, ts, .. } = setup;
        sequence.target_index(&ts, "raman").unwrap();
        let built = sequence.build(&values(0.0, [1, 0])).unwrap();
        assert_eq!(
            built.current_target("raman"),
            Ok(&["q1".to_string(), "q0".to_string()][..])
        );

        assert_eq!(
            sequence.build(&values(0.0, [1, 1])),
            Err(BuildError::Replay {
                index: 0,
                source: SequenceError::DuplicateTarget("q1".to_string()),
            })
        );
    }

    #[rstest]
    fn history_is_replayed(setup: Setup) {
        let Setup { mut sequence, x, .. } = setup;
        let ramp = RampWaveform::new(50, 0.0, 1.0).unwrap();
        sequence
            .add(Pulse::constant_detuning(ramp, 0.0, 0.0).unwrap(), "raman", Protocol::MinDelay)
            .unwrap();
        sequence.target(["q1"], "raman").unwrap();
        sequence
            .add(blackman_pulse(100, &x), "rydberg", Protocol::MinDelay)
            .unwrap();
        sequence.measure(Basis::GroundRydberg).unwrap();

        let log = sequence.instruction_log().unwrap();
        assert_eq!(log.len(), 4);

        let built = sequence.build(&values(1.0, [1, 1])).unwrap();
        // rydberg waits for raman, whose new target it shares.
        assert_eq!(built.duration(), Ok(150));
        assert_eq!(built.current_target("raman"), Ok(&["q1".to_string()][..]));
        assert_eq!(built.measurement(), Some(Basis::GroundRydberg));
    }

    #[rstest]
    fn build_is_deterministic(setup: Setup) {
        let Setup { mut sequence, x, ts } = setup;
        sequence
            .add(blackman_pulse(ts.index(1).unwrap(), &x), "rydberg", Protocol::MinDelay)
            .unwrap();
        sequence.align(["rydberg", "raman"]).unwrap();

        let first = values(2.0, [5, 80]);
        assert_eq!(sequence.build(&first), sequence.build(&first));
        assert_ne!(sequence.build(&first), sequence.build(&values(2.0, [5, 81])));
    }

    #[test]
    fn building_a_concrete_sequence() {
        let mut sequence = Sequence::new(Register::new(["q0"]).unwrap(), Device::new("d"));
        sequence
            .declare_channel("rydberg", ChannelKind::RydbergGlobal)
            .unwrap();
        let waveform = ConstantWaveform::new(30, 1.0).unwrap();
        sequence
            .add(Pulse::constant_detuning(waveform, 0.0, 0.0).unwrap(), "rydberg", Protocol::MinDelay)
            .unwrap();

        let no_values: HashMap<&str, VariableValue> = HashMap::new();
        let built = sequence.build(&no_values).unwrap();
        assert_eq!(built, sequence);
    }
}
