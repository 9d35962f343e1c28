//! JSON representation of a sequence: its configuration, declared variables and calls.
//!
//! A sequence is read back by replaying its calls through the usual building methods, so the
//! result is checked like any other sequence and ends up in the same mode.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::variable::Variable;

use super::{call::Call, config::SequenceConfig, Sequence, SequenceError};

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(#[source] SequenceError),
    #[error("failed to declare variable {name}: {source}")]
    Variable {
        name: String,
        #[source]
        source: SequenceError,
    },
    #[error("failed to replay call {index}: {source}")]
    Replay {
        index: usize,
        #[source]
        source: SequenceError,
    },
}

#[derive(Serialize)]
struct SerializedSequenceRef<'a> {
    config: &'a SequenceConfig,
    variables: Vec<&'a Variable>,
    calls: &'a [Call],
}

#[derive(Deserialize)]
struct SerializedSequence {
    config: SequenceConfig,
    #[serde(default)]
    variables: Vec<Variable>,
    #[serde(default)]
    calls: Vec<Call>,
}

impl Sequence {
    /// Write the sequence as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SerializationError> {
        let serialized = SerializedSequenceRef {
            config: &self.config,
            variables: self.variables.values().collect(),
            calls: self.calls(),
        };
        Ok(serde_json::to_string_pretty(&serialized)?)
    }

    /// Read a sequence written by [`Sequence::to_json`].
    pub fn from_json(json: &str) -> Result<Self, SerializationError> {
        let SerializedSequence {
            config,
            variables,
            calls,
        } = serde_json::from_str(json)?;

        let mut sequence = Sequence::from_config(config).map_err(SerializationError::Config)?;
        for variable in variables {
            sequence
                .declare_variable(variable.name(), variable.size(), variable.dtype())
                .map_err(|source| SerializationError::Variable {
                    name: variable.name().to_string(),
                    source,
                })?;
        }
        for (index, call) in calls.into_iter().enumerate() {
            sequence
                .record(call)
                .map_err(|source| SerializationError::Replay { index, source })?;
        }

        debug!(
            parametrized = sequence.is_parametrized(),
            calls = sequence.calls().len(),
            "read sequence from JSON"
        );
        Ok(sequence)
    }
}
