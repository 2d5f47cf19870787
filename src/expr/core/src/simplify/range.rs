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

//! Range & Sarg engine: coalesces repeated comparisons on a
//! shared reference into `SEARCH(ref, Sarg)`, and answers unsatisfiability /
//! redundancy / point-equality questions against that combined range.

use std::collections::HashMap;

use relexpr_common::{DataType, ScalarImpl, TypeKind};

use crate::builder::ExprBuilder;
use crate::error::Result;
use crate::expr::{Expr, ExprImpl, ExprType};
use crate::sarg::{Bound, Range, RangeSet, Sarg, UnknownAs};
use crate::simplify::views::{Comparison, IsPredicate};
use crate::simplify::Simplifier;

/// The per-kind range contribution table. `IS NULL`/
/// `IS NOT NULL` are handled by the caller (they carry no range, only a
/// `nullAs` update); this covers the comparison kinds.
fn range_for_kind(kind: &ExprType, v: &ScalarImpl) -> Option<RangeSet> {
    use ExprType::*;
    let r = match kind {
        LessThan => Range::less_than(v.clone()),
        LessThanOrEqual => Range::at_most(v.clone()),
        GreaterThan => Range::greater_than(v.clone()),
        GreaterThanOrEqual => Range::at_least(v.clone()),
        Equals => Range::point(v.clone()),
        NotEquals => return Some(RangeSet::single(Range::point(v.clone())).complement()),
        _ => return None,
    };
    Some(RangeSet::single(r))
}

/// One recognized term's contribution: a range restriction on the reference's
/// value plus a `nullAs` update. Plain comparisons and `BETWEEN` leave
/// `nullAs` at `Unknown` (the table only updates it for the two `IS [NOT]
/// NULL` rows) — that's the "3VL-natural" state: the term's own
/// truth value at a null input is itself null, not pinned true/false.
struct Contribution {
    range: RangeSet,
    null_as: UnknownAs,
}

fn contribution_of(term: &ExprImpl) -> Option<(ExprImpl, Contribution)> {
    if let Some(cmp) = Comparison::of(term) {
        let lit = cmp.literal.as_const_datum()?;
        let v = lit.as_ref()?;
        let range = range_for_kind(&cmp.kind, v)?;
        return Some((
            cmp.reference.clone(),
            Contribution {
                range,
                null_as: UnknownAs::Unknown,
            },
        ));
    }
    if let Some(isp) = IsPredicate::of(term) {
        let (range, null_as) = if isp.is_not_null {
            (RangeSet::all(), UnknownAs::False)
        } else {
            (RangeSet::empty(), UnknownAs::True)
        };
        return Some((isp.operand.clone(), Contribution { range, null_as }));
    }
    if let Some(call) = term.as_function_call() {
        if call.op == ExprType::Between && call.operands.len() == 3 {
            let lo = call.operands[1].as_const_datum()?.as_ref()?;
            let hi = call.operands[2].as_const_datum()?.as_ref()?;
            return Some((
                call.operands[0].clone(),
                Contribution {
                    range: RangeSet::single(Range {
                        lo: Bound::Included(lo.clone()),
                        hi: Bound::Included(hi.clone()),
                    }),
                    null_as: UnknownAs::Unknown,
                },
            ));
        }
        if call.op == ExprType::Search {
            let sarg = call.sarg()?;
            return Some((
                call.operands[0].clone(),
                Contribution {
                    range: sarg.range_set.clone(),
                    null_as: sarg.null_as,
                },
            ));
        }
    }
    None
}

/// Outcome of folding a conjunctive (AND) or disjunctive (OR) term list
/// through the range collector.
pub enum FoldOutcome {
    /// The merged range proved the AND unsatisfiable.
    Contradiction,
    /// `terms[i]` should be dropped (folded into a merge) when the value is
    /// `None`, or replaced by the given expression when `Some`.
    Replace(HashMap<usize, Option<ExprImpl>>),
}

/// Runs the collector + fix-up over a conjunction's terms.
/// Groups terms by reference, intersects their ranges, and — only where a
/// genuine merge of >= 2 terms occurred (fix-up condition (b)) — replaces
/// them with a single `SEARCH`/expanded-comparison term; lone terms are left
/// untouched.
pub fn fold_conjunction(ctx: &Simplifier, terms: &[ExprImpl]) -> Result<FoldOutcome> {
    fold_ranges(ctx, terms, true)
}

pub fn fold_disjunction(ctx: &Simplifier, terms: &[ExprImpl]) -> Result<FoldOutcome> {
    fold_ranges(ctx, terms, false)
}

fn fold_ranges(ctx: &Simplifier, terms: &[ExprImpl], conjunctive: bool) -> Result<FoldOutcome> {
    // `ExprImpl` is only `PartialEq` (its `Literal` payload embeds `f64`-like
    // scalars via `OrderedFloat`, but plumbing `Eq`/`Hash` through the whole
    // tree isn't worth it for a handful of terms), so group with a linear
    // scan rather than a `HashMap<ExprImpl, _>`.
    let mut groups: Vec<(ExprImpl, Vec<usize>)> = Vec::new();
    for (i, t) in terms.iter().enumerate() {
        if let Some((reference, _)) = contribution_of(t) {
            if let Some((_, idxs)) = groups.iter_mut().find(|(r, _)| *r == reference) {
                idxs.push(i);
            } else {
                groups.push((reference, vec![i]));
            }
        }
    }

    let mut replace = HashMap::new();
    for (reference, idxs) in groups {
        if idxs.len() < 2 {
            continue;
        }
        let ref_type = reference.return_type();
        let (mut range, mut null_as) = if conjunctive {
            (RangeSet::all(), UnknownAs::Unknown)
        } else {
            (RangeSet::empty(), UnknownAs::Unknown)
        };
        for &i in &idxs {
            let (_, c) = contribution_of(&terms[i]).expect("grouped by contribution_of");
            range = if conjunctive { range.intersect(&c.range) } else { range.union(&c.range) };
            null_as = null_as.join(c.null_as);
        }
        if conjunctive && range.is_empty() && null_as != UnknownAs::True {
            return Ok(FoldOutcome::Contradiction);
        }
        let sarg = Sarg::new(range, null_as);
        let new_term = simplify_search(ctx, reference.clone(), &sarg, &ref_type)?;
        for &i in &idxs {
            replace.insert(i, None);
        }
        replace.insert(*idxs.last().unwrap(), Some(new_term));
    }
    Ok(FoldOutcome::Replace(replace))
}

/// `SEARCH(x, Sarg)` simplification.
pub fn simplify_search(
    ctx: &Simplifier,
    reference: ExprImpl,
    sarg: &Sarg,
    ref_type: &DataType,
) -> Result<ExprImpl> {
    let effectively_not_null = !ref_type.nullable || ctx.predicates().is_effectively_not_null(&reference);

    if sarg.range_set.is_all() {
        return Ok(if effectively_not_null {
            ctx.builder().make_bool_literal(true)
        } else {
            match sarg.null_as {
                UnknownAs::True => ctx.builder().make_bool_literal(true),
                UnknownAs::False => reference.is_not_null(),
                UnknownAs::Unknown => ExprImpl::or(
                    reference.is_not_null(),
                    ctx.builder().make_null_literal(DataType::boolean()),
                ),
            }
        });
    }

    if sarg.range_set.is_empty() {
        return Ok(if effectively_not_null {
            ctx.builder().make_bool_literal(false)
        } else {
            match sarg.null_as {
                UnknownAs::True => reference.is_null(),
                UnknownAs::False => ctx.builder().make_bool_literal(false),
                UnknownAs::Unknown => ExprImpl::and(
                    ctx.builder().make_null_literal(DataType::boolean()),
                    reference.is_null(),
                ),
            }
        });
    }

    // A partial (neither-all-nor-empty) range only has a plain
    // comparison/IN/BETWEEN rendering when nullAs is "3VL-natural" (Unknown)
    // or moot (x can't be null anyway) — True/False pinning on a nontrivial
    // range has no equivalent without the SEARCH wrapper.
    if effectively_not_null || sarg.null_as == UnknownAs::Unknown {
        if let Some(points) = sarg.range_set.points() {
            let nullable = ref_type.nullable && !effectively_not_null;
            if points.len() == 1 {
                let v = points.into_iter().next().unwrap();
                let lit = ctx.builder().make_literal(Some(v), ref_type.with_nullable(false));
                return Ok(ExprImpl::call(
                    ExprType::Equals,
                    vec![reference, lit],
                    DataType::new(TypeKind::Boolean, nullable),
                ));
            }
            let mut operands = vec![reference];
            operands.extend(points.into_iter().map(|v| ctx.builder().make_literal(Some(v), ref_type.with_nullable(false))));
            return Ok(ExprImpl::call(ExprType::In, operands, DataType::new(TypeKind::Boolean, nullable)));
        }
        if sarg.is_complemented_points() {
            let excluded = sarg.range_set.complement().points().expect("is_complemented_points");
            let nullable = ref_type.nullable && !effectively_not_null;
            if excluded.len() == 1 {
                let v = excluded.into_iter().next().unwrap();
                let lit = ctx.builder().make_literal(Some(v), ref_type.with_nullable(false));
                return Ok(ExprImpl::call(
                    ExprType::NotEquals,
                    vec![reference, lit],
                    DataType::new(TypeKind::Boolean, nullable),
                ));
            }
            let mut operands = vec![reference];
            operands.extend(excluded.into_iter().map(|v| ctx.builder().make_literal(Some(v), ref_type.with_nullable(false))));
            return Ok(ExprImpl::call(ExprType::NotIn, operands, DataType::new(TypeKind::Boolean, nullable)));
        }
        if sarg.range_set.ranges().len() == 1 {
            let r = &sarg.range_set.ranges()[0];
            if let (Bound::Included(lo), Bound::Included(hi)) = (&r.lo, &r.hi) {
                let nullable = ref_type.nullable && !effectively_not_null;
                let lo_lit = ctx.builder().make_literal(Some(lo.clone()), ref_type.with_nullable(false));
                let hi_lit = ctx.builder().make_literal(Some(hi.clone()), ref_type.with_nullable(false));
                return Ok(ExprImpl::call(
                    ExprType::Between,
                    vec![reference, lo_lit, hi_lit],
                    DataType::new(TypeKind::Boolean, nullable),
                ));
            }
        }
    }

    Ok(ctx.builder().make_search_argument_literal(reference, sarg.clone()))
}

/// Residue computation: strengthens a single
/// `ref op literal` term against the constraints the predicate list already
/// implies for the same reference.
pub fn residue(ctx: &Simplifier, term: &ExprImpl) -> Result<ExprImpl> {
    let Some(cmp) = Comparison::of(term) else {
        return Ok(term.clone());
    };
    let Some(v) = cmp.literal.as_const_datum().and_then(|d| d.as_ref()) else {
        return Ok(term.clone());
    };
    let Some(term_range) = range_for_kind(&cmp.kind, v) else {
        return Ok(term.clone());
    };

    let mut implied = RangeSet::all();
    let mut saw_any = false;
    for p in ctx.predicates().pulled_up_predicates() {
        if let Some(pcmp) = Comparison::of(p) {
            if *pcmp.reference != *cmp.reference {
                continue;
            }
            let Some(pv) = pcmp.literal.as_const_datum().and_then(|d| d.as_ref()) else {
                continue;
            };
            if let Some(r) = range_for_kind(&pcmp.kind, pv) {
                implied = implied.intersect(&r);
                saw_any = true;
            }
        }
    }
    if !saw_any {
        return Ok(term.clone());
    }

    let intersected = term_range.intersect(&implied);
    if intersected.is_empty() {
        return Ok(ctx.builder().make_bool_literal(false));
    }
    if intersected.is_all() {
        return Ok(cmp.reference.clone().is_not_null());
    }
    if intersected.ranges().len() == 1 {
        if let Some(v) = intersected.ranges()[0].is_point() {
            let ty = cmp.reference.return_type();
            let lit = ctx.builder().make_literal(Some(v.clone()), ty.with_nullable(false));
            return Ok(ExprImpl::call(
                ExprType::Equals,
                vec![cmp.reference.clone(), lit],
                DataType::new(TypeKind::Boolean, ty.nullable),
            ));
        }
    }
    Ok(term.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DefaultExprBuilder;
    use crate::coercion::DefaultTypeCoercion;
    use crate::executor::InterpretingExecutor;
    use crate::expr::InputRef;
    use crate::simplify::predicates::PredicateList;
    use crate::type_factory::DefaultTypeFactory;

    fn ctx() -> Simplifier {
        Simplifier::new(
            std::sync::Arc::new(DefaultExprBuilder),
            std::sync::Arc::new(DefaultTypeFactory),
            std::sync::Arc::new(DefaultTypeCoercion),
            std::sync::Arc::new(InterpretingExecutor),
        )
    }

    fn x() -> ExprImpl {
        ExprImpl::InputRef(InputRef::new(0, DataType::nullable(TypeKind::Int32)))
    }

    fn lit(v: i32) -> ExprImpl {
        ExprImpl::literal(ScalarImpl::Int32(v), DataType::not_null(TypeKind::Int32))
    }

    #[test]
    fn fold_conjunction_merges_two_comparisons() {
        let ge5 = ExprImpl::call(ExprType::GreaterThanOrEqual, vec![x(), lit(5)], DataType::nullable(TypeKind::Boolean));
        let lt10 = ExprImpl::call(ExprType::LessThan, vec![x(), lit(10)], DataType::nullable(TypeKind::Boolean));
        let terms = vec![ge5, lt10];
        let ctx = ctx();
        match fold_conjunction(&ctx, &terms).unwrap() {
            FoldOutcome::Replace(r) => assert_eq!(r.len(), 2),
            FoldOutcome::Contradiction => panic!("should not contradict"),
        }
    }

    #[test]
    fn fold_conjunction_empty_range_is_contradiction() {
        let ge10 = ExprImpl::call(ExprType::GreaterThanOrEqual, vec![x(), lit(10)], DataType::nullable(TypeKind::Boolean));
        let lt5 = ExprImpl::call(ExprType::LessThan, vec![x(), lit(5)], DataType::nullable(TypeKind::Boolean));
        let ctx = ctx();
        match fold_conjunction(&ctx, &[ge10, lt5]).unwrap() {
            FoldOutcome::Contradiction => {}
            FoldOutcome::Replace(_) => panic!("should contradict"),
        }
    }

    #[test]
    fn fold_disjunction_of_not_equals_is_all_with_unknown_null() {
        let ne1 = ExprImpl::call(ExprType::NotEquals, vec![x(), lit(1)], DataType::nullable(TypeKind::Boolean));
        let ne2 = ExprImpl::call(ExprType::NotEquals, vec![x(), lit(2)], DataType::nullable(TypeKind::Boolean));
        let ctx = ctx();
        match fold_disjunction(&ctx, &[ne1, ne2]).unwrap() {
            FoldOutcome::Replace(r) => {
                let replaced = r.values().filter_map(|v| v.clone()).next().unwrap();
                // x IS NOT NULL OR NULL
                assert_eq!(replaced.op(), Some(&ExprType::Or));
            }
            FoldOutcome::Contradiction => panic!("disjunction never contradicts here"),
        }
    }

    #[test]
    fn fold_conjunction_of_not_equals_renders_as_not_in() {
        let ne1 = ExprImpl::call(ExprType::NotEquals, vec![x(), lit(1)], DataType::nullable(TypeKind::Boolean));
        let ne2 = ExprImpl::call(ExprType::NotEquals, vec![x(), lit(2)], DataType::nullable(TypeKind::Boolean));
        let ctx = ctx();
        match fold_conjunction(&ctx, &[ne1, ne2]).unwrap() {
            FoldOutcome::Replace(r) => {
                let replaced = r.values().filter_map(|v| v.clone()).next().unwrap();
                assert_eq!(replaced.op(), Some(&ExprType::NotIn));
            }
            FoldOutcome::Contradiction => panic!("should not contradict"),
        }
    }

    #[test]
    fn simplify_search_renders_single_complemented_point_as_not_equals() {
        let sarg = Sarg::new(RangeSet::single(Range::point(ScalarImpl::Int32(7))).complement(), UnknownAs::Unknown);
        let ctx = ctx();
        let r = simplify_search(&ctx, x(), &sarg, &DataType::nullable(TypeKind::Int32)).unwrap();
        assert_eq!(r.op(), Some(&ExprType::NotEquals));
    }

    #[test]
    fn residue_under_ge5_on_lt10_is_unchanged() {
        let preds = PredicateList::new(vec![ExprImpl::call(
            ExprType::GreaterThanOrEqual,
            vec![x(), lit(5)],
            DataType::nullable(TypeKind::Boolean),
        )]);
        let ctx = ctx().with_predicates(preds);
        let lt10 = ExprImpl::call(ExprType::LessThan, vec![x(), lit(10)], DataType::nullable(TypeKind::Boolean));
        let r = residue(&ctx, &lt10).unwrap();
        assert_eq!(r, lt10);
    }

    #[test]
    fn residue_under_ge5_on_lt5_is_false() {
        let preds = PredicateList::new(vec![ExprImpl::call(
            ExprType::GreaterThanOrEqual,
            vec![x(), lit(5)],
            DataType::nullable(TypeKind::Boolean),
        )]);
        let ctx = ctx().with_predicates(preds);
        let lt5 = ExprImpl::call(ExprType::LessThan, vec![x(), lit(5)], DataType::nullable(TypeKind::Boolean));
        let r = residue(&ctx, &lt5).unwrap();
        assert!(r.is_always_false());
    }

    #[test]
    fn residue_under_ge5_on_lt20_is_not_null() {
        let preds = PredicateList::new(vec![ExprImpl::call(
            ExprType::GreaterThanOrEqual,
            vec![x(), lit(5)],
            DataType::nullable(TypeKind::Boolean),
        )]);
        let ctx = ctx().with_predicates(preds);
        let lt20 = ExprImpl::call(ExprType::LessThan, vec![x(), lit(20)], DataType::nullable(TypeKind::Boolean));
        let r = residue(&ctx, &lt20).unwrap();
        assert_eq!(r.op(), Some(&ExprType::IsNotNull));
    }
}
