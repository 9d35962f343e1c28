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

//! Parametrized pulse sequences.
//!
//! Within this crate you'll find:
//!
//! * [Variables] declared on a sequence, and [expressions] built from them
//! * Deferred [waveform and pulse constructors] whose arguments may depend on variables
//! * A [sequence] that executes building calls immediately until one of them depends on a
//!   variable, and records them from then on
//! * A [builder] that substitutes values for the variables and replays the recorded calls
//! * A [JSON representation] of sequences
//!
//! This crate is still early in its development and does not claim a stable API. Prior to `v1.0`,
//! minor-version changes are considered breaking changes.
//!
//! [builder]: crate::Sequence::build
//! [expressions]: crate::expression::Expression
//! [JSON representation]: crate::Sequence::to_json
//! [sequence]: crate::Sequence
//! [Variables]: crate::variable::Variable
//! [waveform and pulse constructors]: crate::object::ParametrizedObject

pub mod expression;
mod floating_point_eq;
pub mod object;
pub mod pulse;
pub mod sequence;
pub mod validation;
pub mod variable;
pub mod waveform;

pub use sequence::Sequence;
