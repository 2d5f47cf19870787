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

//! Direct exercises of the paranoid verifier (spec.md §4.6), run with
//! `Simplifier::with_paranoid(true)` so every rewrite below is independently
//! checked by bounded enumeration, not just asserted against by hand.

use std::sync::Arc;

use relexpr::builder::DefaultExprBuilder;
use relexpr::coercion::DefaultTypeCoercion;
use relexpr::executor::InterpretingExecutor;
use relexpr::expr::InputRef;
use relexpr::type_factory::DefaultTypeFactory;
use relexpr::{Expr, ExprImpl, ExprType, Simplifier};
use relexpr_common::{DataType, ScalarImpl, TypeKind};

fn ctx() -> Simplifier {
    Simplifier::new(
        Arc::new(DefaultExprBuilder),
        Arc::new(DefaultTypeFactory),
        Arc::new(DefaultTypeCoercion),
        Arc::new(InterpretingExecutor),
    )
    .with_paranoid(true)
}

fn x(nullable: bool) -> ExprImpl {
    ExprImpl::InputRef(InputRef::new(0, DataType::new(TypeKind::Int16, nullable)))
}

fn y(nullable: bool) -> ExprImpl {
    ExprImpl::InputRef(InputRef::new(1, DataType::new(TypeKind::Int16, nullable)))
}

fn i(v: i16) -> ExprImpl {
    ExprImpl::literal(ScalarImpl::Int16(v), DataType::not_null(TypeKind::Int16))
}

fn cmp(kind: ExprType, lhs: ExprImpl, rhs: ExprImpl) -> ExprImpl {
    ExprImpl::call(kind, vec![lhs, rhs], DataType::nullable(TypeKind::Boolean))
}

/// Every conjunction/disjunction rewrite in this module passes bounded
/// enumeration over a nullable Int16-ish domain plus NULL.
#[test]
fn and_or_rewrites_survive_enumeration() {
    let c = ctx();

    let e1 = ExprImpl::and(x(true).is_not_null(), x(true).is_null());
    assert!(c.simplify(&e1).unwrap().is_always_false());

    let e2 = ExprImpl::or(x(true).is_null(), x(true).is_not_null());
    assert!(c.simplify(&e2).unwrap().is_always_true());

    let e3 = ExprImpl::and(cmp(ExprType::Equals, x(true), i(1)), x(true).is_null());
    assert!(c.simplify(&e3).unwrap().is_always_false());
}

/// A DISTINCT FROM rewrite over two nullable columns, checked pairwise.
#[test]
fn is_not_distinct_from_is_reflexive_under_verification() {
    let c = ctx();
    let e = cmp(ExprType::IsNotDistinctFrom, x(true), x(true));
    let r = c.simplify(&e).unwrap();
    assert!(r.is_always_true());
}

/// NOT(NOT(p)) collapses back to `p` and the verifier agrees on every
/// enumerated assignment of a nullable boolean comparison.
#[test]
fn double_negation_survives_enumeration() {
    let c = ctx();
    let p = cmp(ExprType::GreaterThan, x(true), y(true));
    let e = p.clone().not().not();
    assert_eq!(c.simplify(&e).unwrap(), c.simplify(&p).unwrap());
}

/// Range-merging of `x > 0 AND x < 10` is checked against the brute-force
/// evaluator over the verifier's small integer domain.
#[test]
fn range_merge_survives_enumeration() {
    let c = ctx();
    let e = ExprImpl::and(
        cmp(ExprType::GreaterThan, x(true), i(0)),
        cmp(ExprType::LessThan, x(true), i(2)),
    );
    // Should not error (ParanoidMismatch) — the rewrite must agree with the
    // original on every value the verifier enumerates.
    c.simplify(&e).unwrap();
}

/// `x BETWEEN NULL AND 5` must not collapse to a constant NULL: when `x`
/// resolves above 5 the upper-bound comparison is FALSE regardless of the
/// NULL lower bound, so the true result is FALSE on some assignments and
/// NULL on others. A simplifier that treats BETWEEN as "null iff any operand
/// is null" would fold this to a constant and the paranoid verifier below
/// must catch it.
#[test]
fn between_with_null_bound_is_not_unconditionally_null() {
    let c = ctx();
    let e = ExprImpl::call(
        ExprType::Between,
        vec![x(true), ExprImpl::null_literal(DataType::nullable(TypeKind::Int16)), i(5)],
        DataType::nullable(TypeKind::Boolean),
    );
    let simplified = c.simplify(&e).unwrap();
    assert!(!simplified.is_null_literal(), "must not collapse to a constant NULL: {simplified:?}");
}

/// `simplify_preserving_type` cannot be paranoid-verified (the CAST it may
/// insert sits outside the 3VL rewrite being checked) and is rejected
/// outright rather than silently skipping verification.
#[test]
fn simplify_preserving_type_rejects_paranoid_mode() {
    let c = ctx();
    let e = cmp(ExprType::Equals, x(true), i(1));
    let err = c.simplify_preserving_type(&e).unwrap_err();
    assert!(matches!(err, relexpr::ExprError::ParanoidUnsupported));
}
