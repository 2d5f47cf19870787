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

//! The strong-null analyzer: classifies each expression by a nullability
//! `Policy` (never null, null iff a strict operand is null, custom per-kind
//! rule, or no guarantee at all) and uses that classification to answer two
//! questions the boolean engine needs — "is this definitely null?" and "does
//! nulling out these input refs force this expression to stop being true?".

use std::collections::HashSet;

use crate::expr::{Expr, ExprImpl, ExprType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
    /// Result is never null.
    NotNull,
    /// Null iff any strict (designated) operand is null.
    Any,
    /// Unknown; assume nullable, assume nothing about when.
    AsIs,
    /// Handled case by case (`LITERAL`, `CAST`, `ITEM`/`FieldAccess`).
    Custom,
}

pub struct Strong;

impl Strong {
    pub fn policy(e: &ExprImpl) -> Policy {
        match e {
            ExprImpl::Literal(_) => Policy::Custom,
            ExprImpl::InputRef(_) => {
                if e.return_type().nullable {
                    Policy::AsIs
                } else {
                    Policy::NotNull
                }
            }
            ExprImpl::FieldAccess(_) => Policy::Custom,
            ExprImpl::Over(_) | ExprImpl::Unsupported(_) => Policy::AsIs,
            ExprImpl::FunctionCall(c) => {
                if !e.return_type().nullable {
                    return Policy::NotNull;
                }
                match &c.op {
                    ExprType::Cast | ExprType::SafeCast => Policy::Custom,
                    ExprType::And | ExprType::Or => Policy::Custom,
                    ExprType::IsNull
                    | ExprType::IsNotNull
                    | ExprType::IsTrue
                    | ExprType::IsNotTrue
                    | ExprType::IsFalse
                    | ExprType::IsNotFalse => Policy::NotNull,
                    ExprType::Coalesce
                    | ExprType::Case
                    | ExprType::Search
                    | ExprType::In
                    | ExprType::NotIn
                    // BETWEEN desugars to `v >= lo AND v <= hi`, and AND
                    // short-circuits on a FALSE branch regardless of the
                    // other operand's nullity — not "any operand null".
                    | ExprType::Between => Policy::Custom,
                    ExprType::Not
                    | ExprType::Equals
                    | ExprType::NotEquals
                    | ExprType::LessThan
                    | ExprType::LessThanOrEqual
                    | ExprType::GreaterThan
                    | ExprType::GreaterThanOrEqual
                    | ExprType::Plus
                    | ExprType::Minus
                    | ExprType::Times
                    | ExprType::Divide
                    | ExprType::CheckedPlus
                    | ExprType::CheckedMinus
                    | ExprType::CheckedTimes
                    | ExprType::CheckedDivide
                    | ExprType::Mod
                    | ExprType::PlusPrefix
                    | ExprType::MinusPrefix
                    | ExprType::Ceil
                    | ExprType::Floor
                    | ExprType::Trim
                    | ExprType::Ltrim
                    | ExprType::Rtrim
                    | ExprType::Like => Policy::Any,
                    ExprType::IsDistinctFrom | ExprType::IsNotDistinctFrom => Policy::NotNull,
                    ExprType::M2v | ExprType::V2m | ExprType::Other(_) => Policy::AsIs,
                }
            }
        }
    }

    /// Conservative: true only for a literal `NULL` and strict compositions
    /// of it.
    pub fn is_null(e: &ExprImpl) -> bool {
        match Strong::policy(e) {
            Policy::NotNull => false,
            Policy::Custom => match e {
                ExprImpl::Literal(l) => l.value.is_none(),
                ExprImpl::FieldAccess(f) => Strong::is_null(&f.parent),
                ExprImpl::FunctionCall(c) if c.op == ExprType::Cast || c.op == ExprType::SafeCast => {
                    Strong::is_null(&c.operands[0])
                }
                ExprImpl::FunctionCall(c) if c.op == ExprType::And => {
                    // AND is null only if no operand is false and at least
                    // one is null — conservatively require *all* operands
                    // null (sufficient, not necessary) to avoid overclaiming.
                    !c.operands.is_empty() && c.operands.iter().all(Strong::is_null)
                }
                ExprImpl::FunctionCall(c) if c.op == ExprType::Or => {
                    !c.operands.is_empty() && c.operands.iter().all(Strong::is_null)
                }
                ExprImpl::FunctionCall(c) if c.op == ExprType::Coalesce => {
                    !c.operands.is_empty() && c.operands.iter().all(Strong::is_null)
                }
                // Null only when the probe is unconditionally null (both
                // derived comparisons are then null with no way to resolve
                // false), or when both bounds are unconditionally null (same
                // reasoning, independent of the probe's value).
                ExprImpl::FunctionCall(c) if c.op == ExprType::Between => {
                    Strong::is_null(&c.operands[0])
                        || (Strong::is_null(&c.operands[1]) && Strong::is_null(&c.operands[2]))
                }
                _ => false,
            },
            Policy::Any => {
                let c = e.as_function_call().expect("Any policy only for calls");
                c.operands.iter().any(Strong::is_null)
            }
            Policy::AsIs => false,
        }
    }

    /// True if forcing every input ref whose index is in `mask` to `NULL`
    /// guarantees `e` evaluates to something other than `TRUE`. Used by the
    /// conjunction engine's strict-operand contradiction rule.
    pub fn is_not_true(e: &ExprImpl, mask: &HashSet<usize>) -> bool {
        match e {
            ExprImpl::InputRef(r) => mask.contains(&r.index),
            ExprImpl::Literal(l) => l.value.is_none() || matches!(l.value, Some(relexpr_common::ScalarImpl::Bool(false))),
            ExprImpl::FunctionCall(c) => match Strong::policy(e) {
                Policy::Any => c.operands.iter().any(|op| nullifies(op, mask)),
                _ => match c.op {
                    ExprType::And => c.operands.iter().any(|op| Strong::is_not_true(op, mask)),
                    ExprType::Between => {
                        nullifies(&c.operands[0], mask)
                            || (nullifies(&c.operands[1], mask) && nullifies(&c.operands[2], mask))
                    }
                    ExprType::Not => false,
                    _ => false,
                },
            },
            _ => false,
        }
    }

    /// Input-ref indices whose nullification forces `e` to be non-true
    /// (used by the conjunction engine).
    pub fn nulling_refs_forcing_not_true(e: &ExprImpl) -> HashSet<usize> {
        let mut out = HashSet::new();
        collect_strict_refs(e, &mut out);
        out
    }
}

fn nullifies(e: &ExprImpl, mask: &HashSet<usize>) -> bool {
    match e {
        ExprImpl::InputRef(r) => mask.contains(&r.index),
        ExprImpl::FunctionCall(c) => {
            matches!(Strong::policy(e), Policy::Any) && c.operands.iter().any(|op| nullifies(op, mask))
        }
        _ => false,
    }
}

fn collect_strict_refs(e: &ExprImpl, out: &mut HashSet<usize>) {
    match e {
        ExprImpl::InputRef(r) => {
            out.insert(r.index);
        }
        // Only the probe is unconditionally strict: nulling it alone forces
        // BETWEEN to stop being true regardless of the bounds, but nulling
        // just one bound does not (the other comparison can still be FALSE).
        ExprImpl::FunctionCall(c) if c.op == ExprType::Between => {
            collect_strict_refs(&c.operands[0], out);
        }
        ExprImpl::FunctionCall(c) if matches!(Strong::policy(e), Policy::Any) => {
            for op in &c.operands {
                collect_strict_refs(op, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use relexpr_common::{DataType, TypeKind};

    use super::*;
    use crate::expr::InputRef;

    fn nullable_ref(i: usize) -> ExprImpl {
        ExprImpl::InputRef(InputRef::new(i, DataType::nullable(TypeKind::Int32)))
    }

    #[test]
    fn literal_null_is_null() {
        assert!(Strong::is_null(&ExprImpl::null_literal(DataType::nullable(
            TypeKind::Int32
        ))));
    }

    #[test]
    fn strict_comparison_propagates_null() {
        let e = ExprImpl::call(
            ExprType::Equals,
            vec![nullable_ref(0), ExprImpl::null_literal(DataType::nullable(TypeKind::Int32))],
            DataType::nullable(TypeKind::Boolean),
        );
        assert!(Strong::is_null(&e));
    }

    #[test]
    fn between_is_custom_policy_not_any() {
        let e = ExprImpl::call(
            ExprType::Between,
            vec![
                nullable_ref(0),
                ExprImpl::null_literal(DataType::nullable(TypeKind::Int32)),
                ExprImpl::literal(relexpr_common::ScalarImpl::Int32(5), DataType::not_null(TypeKind::Int32)),
            ],
            DataType::nullable(TypeKind::Boolean),
        );
        assert_eq!(Strong::policy(&e), Policy::Custom);
        // The lower bound is NULL but the upper bound is a concrete literal,
        // so whether the probe is <= 5 can still resolve the whole BETWEEN
        // to FALSE — it is not unconditionally null.
        assert!(!Strong::is_null(&e));
    }

    #[test]
    fn between_is_null_when_probe_unconditionally_null() {
        let e = ExprImpl::call(
            ExprType::Between,
            vec![
                ExprImpl::null_literal(DataType::nullable(TypeKind::Int32)),
                ExprImpl::literal(relexpr_common::ScalarImpl::Int32(0), DataType::not_null(TypeKind::Int32)),
                ExprImpl::literal(relexpr_common::ScalarImpl::Int32(5), DataType::not_null(TypeKind::Int32)),
            ],
            DataType::nullable(TypeKind::Boolean),
        );
        assert!(Strong::is_null(&e));
    }

    #[test]
    fn between_is_null_when_both_bounds_unconditionally_null() {
        let e = ExprImpl::call(
            ExprType::Between,
            vec![
                nullable_ref(0),
                ExprImpl::null_literal(DataType::nullable(TypeKind::Int32)),
                ExprImpl::null_literal(DataType::nullable(TypeKind::Int32)),
            ],
            DataType::nullable(TypeKind::Boolean),
        );
        assert!(Strong::is_null(&e));
    }

    #[test]
    fn is_predicate_never_null() {
        let e = nullable_ref(0).is_null();
        assert_eq!(Strong::policy(&e), Policy::NotNull);
        assert!(!Strong::is_null(&e));
    }

    #[test]
    fn is_not_true_via_mask() {
        let mut mask = HashSet::new();
        mask.insert(0);
        let e = ExprImpl::call(
            ExprType::Equals,
            vec![nullable_ref(0), ExprImpl::literal(relexpr_common::ScalarImpl::Int32(1), DataType::not_null(TypeKind::Int32))],
            DataType::nullable(TypeKind::Boolean),
        );
        assert!(Strong::is_not_true(&e, &mask));
    }
}
