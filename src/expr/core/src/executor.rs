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

//! The constant-reduction engine consumed as a black box. Folds
//! literal-only sub-trees; invoked synchronously from `CAST` folding and is
//! never otherwise called.

use relexpr_common::ScalarImpl;

use crate::builder::ExprBuilder;
use crate::error::Result;
use crate::expr::ExprImpl;

pub trait Executor {
    /// Reduce each of `exprs` (assumed literal-only once traversed bottom-up
    /// by the caller) to a literal. Implementations must be side-effect
    /// free.
    fn reduce(&self, builder: &dyn ExprBuilder, exprs: &[ExprImpl]) -> Result<Vec<ExprImpl>>;
}

/// An executor that can evaluate the small set of scalar operators the
/// simplifier itself needs to constant-fold (arithmetic identities'
/// residue, comparison folding, cast folding). Used by tests and as the
/// reference implementation for a real system's richer executor.
#[derive(Clone, Copy, Debug, Default)]
pub struct InterpretingExecutor;

impl Executor for InterpretingExecutor {
    fn reduce(&self, _builder: &dyn ExprBuilder, exprs: &[ExprImpl]) -> Result<Vec<ExprImpl>> {
        exprs
            .iter()
            .map(|e| crate::eval::fold_constant(e).map(|v| ExprImpl::Literal(crate::expr::Literal::new(v, e.return_type()))))
            .collect()
    }
}

impl InterpretingExecutor {
    pub fn cast_literal(
        &self,
        value: &relexpr_common::Datum,
        target: &relexpr_common::DataType,
    ) -> Result<relexpr_common::Datum> {
        crate::eval::cast_datum(value, target)
    }
}

#[allow(unused)]
fn _assert_scalar_clone(_: ScalarImpl) {}
