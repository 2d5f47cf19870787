// Copyright 2024 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use thiserror::Error;

/// Error taxonomy for the simplifier.
///
/// `Malformed` and `ParanoidMismatch` describe conditions callers should
/// treat as programmer error ("fails fast with an assertion-style abort").
/// Both are returned through the ordinary `Result`-returning
/// `Simplifier::simplify*` entry points rather than panicking, so tests can
/// assert on the diagnostic directly; a caller that wants an
/// abort-on-malformed-input behavior can `.expect()` at the call site
/// instead.
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("malformed expression: {0}")]
    Malformed(String),

    #[error("executor failed to reduce constant expression: {0}")]
    Executor(#[source] anyhow::Error),

    #[error(
        "paranoid verification failed: assignment {assignment}, before = {before}, after = {after}"
    )]
    ParanoidMismatch {
        assignment: String,
        before: String,
        after: String,
    },

    #[error("paranoid mode is not supported on this entry point")]
    ParanoidUnsupported,
}

pub type Result<T> = std::result::Result<T, ExprError>;
