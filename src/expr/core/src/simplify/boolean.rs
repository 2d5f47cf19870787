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

//! The boolean engine: conjunction/disjunction term normalization and `CASE`
//! simplification, handling an arbitrary number of terms rather than just a
//! hand-matched two-operand pattern: flatten, split `NOT` terms, fold
//! ranges, detect strict-operand contradictions, re-emit.

use std::collections::HashSet;

use relexpr_common::DataType;

use crate::expr::{Expr, ExprImpl, ExprType, FunctionCall};
use crate::sarg::UnknownAs;
use crate::simplify::range::{self, FoldOutcome};
use crate::simplify::strong::Strong;
use crate::simplify::views;
use crate::simplify::Simplifier;

/// Flattens nested `AND`/`OR` operands of the same kind into a single list.
fn flatten(kind: &ExprType, operands: &[ExprImpl], out: &mut Vec<ExprImpl>) {
    for op in operands {
        if let Some(c) = op.as_function_call() {
            if &c.op == kind {
                flatten(kind, &c.operands, out);
                continue;
            }
        }
        out.push(op.clone());
    }
}

/// Conjunction simplification.
pub fn simplify_and(ctx: &Simplifier, operands: &[ExprImpl], m: UnknownAs) -> crate::error::Result<ExprImpl> {
    let mut raw = Vec::new();
    flatten(&ExprType::And, operands, &mut raw);

    let mut terms = Vec::with_capacity(raw.len());
    for t in &raw {
        terms.push(ctx.simplify_internal(t, UnknownAs::Unknown)?);
    }

    // Rule 1: any always-false term settles the whole conjunction.
    if terms.iter().any(|t| t.is_always_false()) {
        return Ok(ctx.builder().make_bool_literal(false));
    }

    // UnknownAs=FALSE extra rule: a bare NULL conjunct is FALSE in this mode.
    if m == UnknownAs::False && terms.iter().any(|t| t.is_null_literal()) {
        return Ok(ctx.builder().make_bool_literal(false));
    }

    // Drop always-true terms and exact structural duplicates.
    let mut deduped: Vec<ExprImpl> = Vec::new();
    for t in terms {
        if t.is_always_true() {
            continue;
        }
        if !deduped.contains(&t) {
            deduped.push(t);
        }
    }

    // Rule 2: nothing left means the conjunction never had a chance to be
    // false.
    if deduped.is_empty() {
        return Ok(ctx.builder().make_bool_literal(true));
    }

    // Split `NOT x` operands out into a separate negated-term list.
    let mut pos_terms = Vec::new();
    let mut not_terms = Vec::new();
    for t in deduped {
        match t.as_function_call() {
            Some(c) if c.op == ExprType::Not => not_terms.push(c.operands[0].clone()),
            _ => pos_terms.push(t),
        }
    }

    // Rule 3: `d` negated and `d` itself both present is a contradiction —
    // `FALSE` outright if `d` can't be null, else `NULL AND IS NULL(d)`
    // (the conjunction can only ever be NULL or FALSE once this happens).
    let mut extra_pos = Vec::new();
    not_terms.retain(|d| {
        if pos_terms.contains(d) {
            if !d.return_type().nullable {
                return true; // handled by the unconditional-FALSE check below
            }
            extra_pos.push(ExprImpl::and(
                ctx.builder().make_null_literal(DataType::boolean()),
                d.clone().is_null(),
            ));
            false
        } else {
            true
        }
    });
    if not_terms.iter().any(|d| pos_terms.contains(d) && !d.return_type().nullable) {
        return Ok(ctx.builder().make_bool_literal(false));
    }
    pos_terms.extend(extra_pos);

    // Rules 4-6 (equality propagation / range composition / negated-term
    // detection) all reduce to the same question: does the per-reference
    // range intersection collapse to empty? The range engine already proves
    // that for `ref op literal` shapes — two distinct equalities, a tightened
    // bound, or a comparison alongside its logical complement all show up as
    // an empty `RangeSet` there.
    let mut combined: Vec<ExprImpl> = pos_terms.clone();
    combined.extend(not_terms.iter().cloned().map(|d| d.not()));
    match range::fold_conjunction(ctx, &combined)? {
        FoldOutcome::Contradiction => return Ok(ctx.builder().make_bool_literal(false)),
        FoldOutcome::Replace(replacements) => {
            let mut next = Vec::new();
            for (i, t) in combined.into_iter().enumerate() {
                match replacements.get(&i) {
                    Some(None) => {}
                    Some(Some(e)) => next.push(e.clone()),
                    None => next.push(t),
                }
            }
            pos_terms = next;
            not_terms = Vec::new();
        }
    }

    // Rule 7: strict-operand contradiction. A deterministic term is
    // non-true whenever any ref in its "nulling set" is null; if the
    // conjunction also asserts `IS NULL(x)` for such a ref, the whole thing
    // is FALSE. Redundant `IS NOT NULL(x)` terms for refs already forced
    // non-null by another strict term are dropped.
    let mut nulling_refs: HashSet<usize> = HashSet::new();
    for t in &pos_terms {
        if t.is_deterministic() {
            nulling_refs.extend(Strong::nulling_refs_forcing_not_true(t));
        }
    }
    for t in &pos_terms {
        if let Some(is_null) = views::IsPredicate::of(t) {
            if !is_null.is_not_null {
                if let ExprImpl::InputRef(r) = is_null.operand {
                    if nulling_refs.contains(&r.index) {
                        return Ok(ctx.builder().make_bool_literal(false));
                    }
                }
            }
        }
    }
    pos_terms.retain(|t| {
        if let Some(is_not_null) = views::IsPredicate::of(t) {
            if is_not_null.is_not_null {
                if let ExprImpl::InputRef(r) = is_not_null.operand {
                    return !nulling_refs.contains(&r.index);
                }
            }
        }
        true
    });

    // Re-emit.
    let mut final_terms = pos_terms;
    final_terms.extend(not_terms.into_iter().map(|d| d.not()));
    if final_terms.is_empty() {
        return Ok(ctx.builder().make_bool_literal(true));
    }
    if final_terms.len() == 1 && m == UnknownAs::False {
        // A single remaining term reduces to simplify(term, FALSE).
        return ctx.simplify_internal(&final_terms[0], UnknownAs::False);
    }
    Ok(ExprImpl::conjunction(final_terms))
}

/// Disjunction simplification.
pub fn simplify_or(ctx: &Simplifier, operands: &[ExprImpl], m: UnknownAs) -> crate::error::Result<ExprImpl> {
    let mut raw = Vec::new();
    flatten(&ExprType::Or, operands, &mut raw);

    // Move `IS NULL` terms to the head: they may refute later terms once
    // folded into the predicate context below.
    raw.sort_by_key(|t| !matches!(t.op(), Some(&ExprType::IsNull)));

    let mut working_ctx = ctx.clone();
    let mut terms: Vec<ExprImpl> = Vec::new();
    for raw_term in raw {
        let s = working_ctx.simplify_internal(&raw_term, UnknownAs::Unknown)?;
        if s.is_always_true() {
            return Ok(ctx.builder().make_bool_literal(true));
        }
        if s.is_always_false() {
            continue;
        }
        // Feed this term's negation forward so later terms can be refuted
        // by it: add its inverse isNotTrue(term) to the predicate list
        // before simplifying subsequent terms.
        if s.is_deterministic() {
            working_ctx = working_ctx.with_predicates(
                working_ctx
                    .predicates()
                    .with_predicate(is_not_true_of(&working_ctx, &s)),
            );
        }
        terms.push(s);
    }

    if terms.is_empty() {
        return Ok(ctx.builder().make_bool_literal(false));
    }

    // `x <> A OR x <> B` (distinct constants, same x): collapses to
    // `x IS NOT NULL OR NULL`.
    apply_distinct_not_equals_rule(ctx, &mut terms);

    // `x OR NOT x`: TRUE if non-nullable, else one occurrence becomes
    // `x IS NOT NULL`, the matching NOT becomes a typed NULL.
    apply_complement_rule(ctx, &mut terms);

    // `IS_NOT_TRUE(x) OR x` -> TRUE when `x` is safe.
    if let Some(result) = apply_is_not_true_or_x_rule(ctx, &terms) {
        return Ok(result);
    }

    // Range/Sarg merge, disjunctive direction.
    match range::fold_disjunction(ctx, &terms)? {
        FoldOutcome::Contradiction => {
            // A disjunction never contradicts via range composition alone;
            // this arm exists only for symmetry with `fold_conjunction`'s
            // signature.
        }
        FoldOutcome::Replace(replacements) => {
            let mut next = Vec::new();
            for (i, t) in terms.into_iter().enumerate() {
                match replacements.get(&i) {
                    Some(None) => {}
                    Some(Some(e)) => next.push(e.clone()),
                    None => next.push(t),
                }
            }
            terms = next;
        }
    }

    if terms.is_empty() {
        return Ok(ctx.builder().make_bool_literal(false));
    }
    if terms.iter().any(ExprImpl::is_always_true) {
        return Ok(ctx.builder().make_bool_literal(true));
    }
    Ok(ExprImpl::disjunction(terms))
}

/// `isNotTrue(term)`, used to seed the predicate context while walking an
/// OR. Folds to a literal where `term` already settled.
fn is_not_true_of(ctx: &Simplifier, term: &ExprImpl) -> ExprImpl {
    if let Some(b) = term.as_bool_literal() {
        return ctx.builder().make_bool_literal(!b);
    }
    ExprImpl::call(ExprType::IsNotTrue, vec![term.clone()], DataType::not_null(relexpr_common::TypeKind::Boolean))
}

fn apply_distinct_not_equals_rule(ctx: &Simplifier, terms: &mut Vec<ExprImpl>) {
    let mut first_ref: Option<ExprImpl> = None;
    let mut replaced_at: Option<usize> = None;
    let mut to_drop = Vec::new();
    for (i, t) in terms.iter().enumerate() {
        let Some(cmp) = views::Comparison::of(t) else { continue };
        if cmp.kind != ExprType::NotEquals {
            continue;
        }
        match &first_ref {
            None => {
                first_ref = Some(cmp.reference.clone());
                replaced_at = Some(i);
            }
            Some(r) if *r == *cmp.reference => {
                to_drop.push(i);
            }
            _ => {}
        }
    }
    if let (Some(r), Some(idx)) = (first_ref, replaced_at) {
        if to_drop.len() >= 1 {
            terms[idx] = ExprImpl::or(r.is_not_null(), ctx.builder().make_null_literal(DataType::boolean()));
            for &i in to_drop.iter().rev() {
                terms.remove(i);
            }
        }
    }
}

fn apply_complement_rule(ctx: &Simplifier, terms: &mut Vec<ExprImpl>) {
    let mut i = 0;
    while i < terms.len() {
        let not_inner = terms[i].as_function_call().filter(|c| c.op == ExprType::Not).map(|c| c.operands[0].clone());
        if let Some(inner) = not_inner {
            if let Some(j) = terms.iter().position(|t| *t == inner) {
                if j != i {
                    if !inner.return_type().nullable {
                        terms.clear();
                        terms.push(ctx.builder().make_bool_literal(true));
                        return;
                    }
                    terms[j] = inner.clone().is_not_null();
                    terms[i] = ctx.builder().make_null_literal(DataType::boolean());
                }
            }
        }
        i += 1;
    }
}

fn apply_is_not_true_or_x_rule(ctx: &Simplifier, terms: &[ExprImpl]) -> Option<ExprImpl> {
    for (i, t) in terms.iter().enumerate() {
        if let Some(c) = t.as_function_call() {
            if c.op == ExprType::IsNotTrue && views::is_safe_expression(&c.operands[0]) {
                let x = &c.operands[0];
                if terms.iter().enumerate().any(|(j, other)| j != i && other == x) {
                    return Some(ctx.builder().make_bool_literal(true));
                }
            }
        }
    }
    None
}

/// `CASE` simplification.
pub fn simplify_case(ctx: &Simplifier, c: &FunctionCall, m: UnknownAs) -> crate::error::Result<ExprImpl> {
    let operands = &c.operands;
    let mut raw_branches: Vec<(Option<ExprImpl>, ExprImpl)> = Vec::new();
    let mut i = 0;
    while i + 1 < operands.len() {
        raw_branches.push((Some(operands[i].clone()), operands[i + 1].clone()));
        i += 2;
    }
    if i < operands.len() {
        raw_branches.push((None, operands[i].clone()));
    } else {
        raw_branches.push((None, ctx.builder().make_null_literal(c.return_type.clone())));
    }

    // Step 1-3: simplify each branch, dropping always-false conditions and
    // merging into the previous pending branch when values agree.
    let mut pending: Vec<(ExprImpl, ExprImpl)> = Vec::new();
    for (cond_opt, val) in raw_branches {
        let cond = match cond_opt {
            Some(raw_cond) => {
                let cond = ctx.simplify_internal(&raw_cond, UnknownAs::False)?;
                if cond.is_always_false() {
                    continue;
                }
                cond
            }
            None => ctx.builder().make_bool_literal(true),
        };
        let val = ctx.simplify_internal(&val, m)?;

        if let Some((pcond, pval)) = pending.last_mut() {
            if *pval == val && views::is_safe_expression(&cond) {
                *pcond = ExprImpl::or(pcond.clone(), cond);
                continue;
            }
        }
        let reached_true = cond.is_always_true();
        pending.push((cond, val));
        if reached_true {
            break;
        }
    }

    // Step 5: re-simplify merged conditions on flush.
    let mut branches = Vec::with_capacity(pending.len());
    for (cond, val) in pending {
        let cond = ctx.simplify_internal(&cond, UnknownAs::False)?;
        let stop = cond.is_always_true();
        branches.push((cond, val));
        if stop {
            break;
        }
    }

    // A single remaining branch is just its value (CAST if nullability
    // would otherwise widen).
    if branches.len() == 1 {
        let (_, val) = branches.into_iter().next().unwrap();
        if val.return_type().nullable && !c.return_type.nullable {
            return Ok(ctx.builder().make_cast(val, c.return_type.clone()));
        }
        return Ok(val);
    }

    // Boolean CASE flattens to an OR of guarded values when every value is
    // safe to duplicate.
    if c.return_type.is_boolean() && branches.iter().all(|(_, v)| views::is_safe_expression(v)) {
        let mut terms = Vec::with_capacity(branches.len());
        let mut seen_conds: Vec<ExprImpl> = Vec::new();
        for (cond, val) in &branches {
            let mut term = ExprImpl::and(cond.clone(), val.clone());
            for prior in seen_conds.iter().rev() {
                term = ExprImpl::and(term, prior.clone().not());
            }
            terms.push(term);
            seen_conds.push(cond.clone());
        }
        return simplify_or(ctx, &terms, m);
    }

    // Otherwise rebuild the CASE from the surviving branches.
    let mut new_operands = Vec::new();
    for (cond, val) in &branches {
        if cond.is_always_true() {
            new_operands.push(val.clone());
        } else {
            new_operands.push(cond.clone());
            new_operands.push(val.clone());
        }
    }
    if new_operands.len() == 1 {
        return Ok(new_operands.into_iter().next().unwrap());
    }
    Ok(ExprImpl::call(ExprType::Case, new_operands, c.return_type.clone()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relexpr_common::{ScalarImpl, TypeKind};

    use super::*;
    use crate::builder::DefaultExprBuilder;
    use crate::coercion::DefaultTypeCoercion;
    use crate::executor::InterpretingExecutor;
    use crate::expr::InputRef;
    use crate::type_factory::DefaultTypeFactory;

    fn ctx() -> Simplifier {
        Simplifier::new(
            Arc::new(DefaultExprBuilder),
            Arc::new(DefaultTypeFactory),
            Arc::new(DefaultTypeCoercion),
            Arc::new(InterpretingExecutor),
        )
    }

    fn x(nullable: bool) -> ExprImpl {
        ExprImpl::InputRef(InputRef::new(0, DataType::new(TypeKind::Int32, nullable)))
    }

    fn lit(v: i32) -> ExprImpl {
        ExprImpl::literal(ScalarImpl::Int32(v), DataType::not_null(TypeKind::Int32))
    }

    fn eq(lhs: ExprImpl, rhs: ExprImpl) -> ExprImpl {
        ExprImpl::call(ExprType::Equals, vec![lhs, rhs], DataType::nullable(TypeKind::Boolean))
    }

    // `x = 1 OR NOT x = 1 OR x IS NULL` -> TRUE.
    #[test]
    fn or_with_complement_and_is_null_is_true() {
        let e1 = eq(x(true), lit(1));
        let e2 = e1.clone().not();
        let e3 = x(true).is_null();
        let r = ctx().simplify(&ExprImpl::disjunction(vec![e1, e2, e3])).unwrap();
        assert!(r.is_always_true());
    }

    // `x = 1 AND FALSE` -> FALSE.
    #[test]
    fn and_with_false_is_false() {
        let e = ExprImpl::and(eq(x(true), lit(1)), ExprImpl::literal_bool(false));
        let r = ctx().simplify(&e).unwrap();
        assert!(r.is_always_false());
    }

    // Scenario 3: `x >= 5 AND x BETWEEN 3 AND 10` (no predicates) folds to a
    // tightened range.
    #[test]
    fn and_merges_comparison_and_between_into_range() {
        let ge5 = ExprImpl::call(
            ExprType::GreaterThanOrEqual,
            vec![x(true), lit(5)],
            DataType::nullable(TypeKind::Boolean),
        );
        let between = ExprImpl::call(
            ExprType::Between,
            vec![x(true), lit(3), lit(10)],
            DataType::nullable(TypeKind::Boolean),
        );
        let r = ctx().simplify(&ExprImpl::and(ge5, between)).unwrap();
        // Expect either a tightened BETWEEN or SEARCH, never the original pair.
        assert!(matches!(r.op(), Some(&ExprType::Between) | Some(&ExprType::Search)));
    }

    // Scenario 6: `x <> 1 OR x <> 2` on nullable x -> `x IS NOT NULL OR NULL`.
    #[test]
    fn distinct_not_equals_collapses() {
        let ne1 = ExprImpl::call(ExprType::NotEquals, vec![x(true), lit(1)], DataType::nullable(TypeKind::Boolean));
        let ne2 = ExprImpl::call(ExprType::NotEquals, vec![x(true), lit(2)], DataType::nullable(TypeKind::Boolean));
        let r = ctx().simplify(&ExprImpl::disjunction(vec![ne1, ne2])).unwrap();
        assert_eq!(r.op(), Some(&ExprType::Or));
    }

    // Scenario 5: `CASE WHEN FALSE THEN 1 ELSE 2 END IS NULL` -> FALSE.
    #[test]
    fn case_with_false_branch_dropped_is_not_null() {
        let case = ExprImpl::call(
            ExprType::Case,
            vec![
                ExprImpl::literal_bool(false),
                lit(1),
                lit(2),
            ],
            DataType::not_null(TypeKind::Int32),
        );
        let e = case.is_null();
        let r = ctx().simplify(&e).unwrap();
        assert!(r.is_always_false());
    }

    #[test]
    fn case_single_surviving_branch_collapses_to_value() {
        let case = ExprImpl::call(
            ExprType::Case,
            vec![ExprImpl::literal_bool(false), lit(1), lit(2)],
            DataType::not_null(TypeKind::Int32),
        );
        let r = ctx().simplify(&case).unwrap();
        assert_eq!(r, lit(2));
    }

    #[test]
    fn and_with_x_and_not_x_is_false_when_nullable() {
        let e = ExprImpl::and(x(true).is_null(), x(true).is_null().not());
        let r = ctx().simplify(&e).unwrap();
        assert!(r.is_always_false());
    }

    #[test]
    fn or_flattens_nested_disjunctions() {
        let inner = ExprImpl::or(ExprImpl::literal_bool(false), ExprImpl::literal_bool(true));
        let e = ExprImpl::or(inner, ExprImpl::literal_bool(false));
        let r = ctx().simplify(&e).unwrap();
        assert!(r.is_always_true());
    }
}
