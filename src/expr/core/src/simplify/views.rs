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

//! Shape classifiers, spec.md §4.7: `Comparison`/`IsPredicate` views and
//! `isSafeExpression`.

use crate::expr::{Expr, ExprImpl, ExprType};

/// A recognized `ref op literal` (or `literal op ref`, kind reversed to
/// match) shape.
#[derive(Clone, Debug)]
pub struct Comparison<'a> {
    pub reference: &'a ExprImpl,
    pub kind: ExprType,
    pub literal: &'a ExprImpl,
}

impl<'a> Comparison<'a> {
    pub fn of(e: &'a ExprImpl) -> Option<Comparison<'a>> {
        let call = e.as_function_call()?;
        if !call.op.is_comparison() {
            return None;
        }
        if call.operands.len() != 2 {
            return None;
        }
        let (lhs, rhs) = (&call.operands[0], &call.operands[1]);
        if is_reference_shape(lhs) && rhs.is_literal() {
            Some(Comparison {
                reference: lhs,
                kind: call.op.clone(),
                literal: rhs,
            })
        } else if lhs.is_literal() && is_reference_shape(rhs) {
            Some(Comparison {
                reference: rhs,
                kind: reverse(&call.op),
                literal: lhs,
            })
        } else {
            None
        }
    }
}

fn reverse(op: &ExprType) -> ExprType {
    use ExprType::*;
    match op {
        LessThan => GreaterThan,
        LessThanOrEqual => GreaterThanOrEqual,
        GreaterThan => LessThan,
        GreaterThanOrEqual => LessThanOrEqual,
        other => other.clone(),
    }
}

fn is_reference_shape(e: &ExprImpl) -> bool {
    match e {
        ExprImpl::InputRef(_) | ExprImpl::FieldAccess(_) => true,
        ExprImpl::FunctionCall(c) if c.op == ExprType::Cast => is_reference_shape(&c.operands[0]),
        ExprImpl::FunctionCall(c) => c.deterministic,
        _ => false,
    }
}

/// A recognized `e IS NULL` / `e IS NOT NULL` shape.
#[derive(Clone, Debug)]
pub struct IsPredicate<'a> {
    pub operand: &'a ExprImpl,
    pub is_not_null: bool,
}

impl<'a> IsPredicate<'a> {
    pub fn of(e: &'a ExprImpl) -> Option<IsPredicate<'a>> {
        let call = e.as_function_call()?;
        let is_not_null = match call.op {
            ExprType::IsNull => false,
            ExprType::IsNotNull => true,
            _ => return None,
        };
        if call.operands.len() != 1 {
            return None;
        }
        let operand = &call.operands[0];
        let is_ref_like = matches!(operand, ExprImpl::InputRef(_) | ExprImpl::FieldAccess(_))
            || operand.as_function_call().map(|c| c.deterministic).unwrap_or(false);
        if is_ref_like {
            Some(IsPredicate { operand, is_not_null })
        } else {
            None
        }
    }
}

/// spec.md §4.7 `isSafeExpression`: the tree contains only literals, input
/// refs, field accesses, lossless casts, and operators flagged safe.
/// `DIVIDE`/`MOD` is safe only when the divisor is a non-null literal.
/// Window aggregates, subqueries, correlated variables and dynamic
/// parameters are unsafe.
pub fn is_safe_expression(e: &ExprImpl) -> bool {
    match e {
        ExprImpl::Literal(_) | ExprImpl::InputRef(_) => true,
        ExprImpl::FieldAccess(f) => is_safe_expression(&f.parent),
        ExprImpl::Over(_) | ExprImpl::Unsupported(_) => false,
        ExprImpl::FunctionCall(c) => {
            let op_is_safe = matches!(
                c.op,
                ExprType::Plus
                    | ExprType::Minus
                    | ExprType::Times
                    | ExprType::CheckedPlus
                    | ExprType::CheckedMinus
                    | ExprType::CheckedTimes
                    | ExprType::PlusPrefix
                    | ExprType::MinusPrefix
                    | ExprType::Equals
                    | ExprType::NotEquals
                    | ExprType::LessThan
                    | ExprType::LessThanOrEqual
                    | ExprType::GreaterThan
                    | ExprType::GreaterThanOrEqual
                    | ExprType::IsDistinctFrom
                    | ExprType::IsNotDistinctFrom
                    | ExprType::And
                    | ExprType::Or
                    | ExprType::Not
                    | ExprType::Case
                    | ExprType::Like
                    | ExprType::Coalesce
                    | ExprType::Trim
                    | ExprType::Ltrim
                    | ExprType::Rtrim
                    | ExprType::Between
                    | ExprType::In
                    | ExprType::NotIn
                    | ExprType::Search
                    | ExprType::Floor
                    | ExprType::Ceil
                    | ExprType::IsNull
                    | ExprType::IsNotNull
                    | ExprType::IsTrue
                    | ExprType::IsNotTrue
                    | ExprType::IsFalse
                    | ExprType::IsNotFalse
            );
            let divisor_safe = match c.op {
                ExprType::Divide | ExprType::CheckedDivide | ExprType::Mod => {
                    c.operands.get(1).map(|d| d.is_literal() && !d.is_null_literal()).unwrap_or(false)
                }
                _ => true,
            };
            let op_is_safe = op_is_safe
                || matches!(c.op, ExprType::Divide | ExprType::CheckedDivide | ExprType::Mod);
            let cast_is_lossless = match c.op {
                ExprType::Cast => {
                    // Conservatively require a coercion-free (same-kind)
                    // cast to call it safe without a `TypeCoercionRule` in
                    // scope; callers needing a sharper check go through
                    // `Comparison`/`FieldAccess` paths instead.
                    c.operands[0].return_type().equal_sans_nullability(&c.return_type)
                }
                ExprType::SafeCast => true,
                _ => true,
            };
            op_is_safe
                && divisor_safe
                && cast_is_lossless
                && c.deterministic
                && c.operands.iter().all(is_safe_expression)
        }
    }
}

#[cfg(test)]
mod tests {
    use relexpr_common::{DataType, ScalarImpl, TypeKind};

    use super::*;
    use crate::expr::InputRef;

    #[test]
    fn comparison_recognizes_reversed_form() {
        let x = ExprImpl::InputRef(InputRef::new(0, DataType::not_null(TypeKind::Int32)));
        let lit = ExprImpl::literal(ScalarImpl::Int32(1), DataType::not_null(TypeKind::Int32));
        let e = ExprImpl::call(
            ExprType::LessThan,
            vec![lit.clone(), x.clone()],
            DataType::not_null(TypeKind::Boolean),
        );
        let cmp = Comparison::of(&e).unwrap();
        assert_eq!(cmp.kind, ExprType::GreaterThan);
        assert_eq!(*cmp.reference, x);
    }

    #[test]
    fn division_by_runtime_value_is_unsafe() {
        let x = ExprImpl::InputRef(InputRef::new(0, DataType::not_null(TypeKind::Int32)));
        let y = ExprImpl::InputRef(InputRef::new(1, DataType::not_null(TypeKind::Int32)));
        let e = ExprImpl::call(ExprType::Divide, vec![x, y], DataType::nullable(TypeKind::Int32));
        assert!(!is_safe_expression(&e));
    }

    #[test]
    fn division_by_literal_is_safe() {
        let x = ExprImpl::InputRef(InputRef::new(0, DataType::not_null(TypeKind::Int32)));
        let lit = ExprImpl::literal(ScalarImpl::Int32(2), DataType::not_null(TypeKind::Int32));
        let e = ExprImpl::call(ExprType::Divide, vec![x, lit], DataType::not_null(TypeKind::Int32));
        assert!(is_safe_expression(&e));
    }
}
