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

//! The expression factory consumed (not owned) by the simplifier. A real
//! engine's parser-position-preserving builder sits behind this trait;
//! `DefaultExprBuilder` is the parser-position-agnostic stand-in used by
//! tests.

use relexpr_common::{DataType, Datum, ScalarImpl, TypeKind};

use crate::expr::{Expr, ExprExtra, ExprImpl, ExprType, FunctionCall, Literal};
use crate::sarg::Sarg;

pub trait ExprBuilder {
    fn make_literal(&self, value: Datum, ty: DataType) -> ExprImpl {
        ExprImpl::Literal(Literal::new(value, ty))
    }

    fn make_null_literal(&self, ty: DataType) -> ExprImpl {
        self.make_literal(None, ty.with_nullable(true))
    }

    fn make_bool_literal(&self, b: bool) -> ExprImpl {
        self.make_literal(Some(ScalarImpl::Bool(b)), DataType::not_null(TypeKind::Boolean))
    }

    fn make_call(&self, op: ExprType, operands: Vec<ExprImpl>, ty: DataType) -> ExprImpl {
        ExprImpl::FunctionCall(FunctionCall::new(op, operands, ty))
    }

    fn make_cast(&self, operand: ExprImpl, ty: DataType) -> ExprImpl {
        ExprImpl::FunctionCall(FunctionCall::new(ExprType::Cast, vec![operand], ty))
    }

    /// A cast that does not raise at runtime on failure (`SAFE_CAST`).
    fn make_abstract_cast(&self, operand: ExprImpl, ty: DataType, safe: bool) -> ExprImpl {
        let op = if safe { ExprType::SafeCast } else { ExprType::Cast };
        ExprImpl::FunctionCall(FunctionCall::new(op, vec![operand], ty))
    }

    fn make_search_argument_literal(&self, reference: ExprImpl, sarg: Sarg) -> ExprImpl {
        let ty = DataType::nullable(TypeKind::Boolean);
        ExprImpl::FunctionCall(
            FunctionCall::new(ExprType::Search, vec![reference], ty).with_extra(ExprExtra::Sarg(sarg)),
        )
    }

    fn make_window(
        &self,
        call: FunctionCall,
        partition_by: Vec<ExprImpl>,
        order_by: Vec<ExprImpl>,
        frame: crate::expr::WindowFrame,
    ) -> ExprImpl {
        let ty = call.return_type();
        ExprImpl::Over(crate::expr::Over {
            call: Box::new(call),
            window: crate::expr::Window {
                partition_by,
                order_by,
                frame,
            },
            return_type: ty,
        })
    }
}

/// The parser-position-agnostic default builder used throughout tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultExprBuilder;

impl ExprBuilder for DefaultExprBuilder {}
