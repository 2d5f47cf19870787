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

//! The simplifier itself: dispatch over operator kind plus the per-kind
//! rules. Boolean connectives (`AND`/`OR`/`CASE`) live in
//! [`boolean`]; the range/Sarg collector lives in [`range`]; the strong-null
//! analyzer and shape classifiers live in [`strong`]/[`views`]; the paranoid
//! equivalence check lives in [`verifier`].

pub mod boolean;
pub mod predicates;
pub mod range;
pub mod strong;
pub mod verifier;
pub mod views;

use std::sync::Arc;

use itertools::Itertools;
use relexpr_common::{DataType, Datum, ScalarImpl, TypeFactory, TypeKind};

use crate::builder::ExprBuilder;
use crate::coercion::{is_lossless_cast, TypeCoercionRule};
use crate::error::{ExprError, Result};
use crate::executor::Executor;
use crate::expr::{Expr, ExprImpl, ExprType, FieldAccess, FunctionCall};
use crate::sarg::{RangeSet, Sarg, UnknownAs};
use crate::simplify::predicates::PredicateList;
use crate::simplify::strong::{Policy, Strong};
use crate::simplify::views::is_safe_expression;

/// The simplifier's collaborators plus its accumulated predicate context.
/// Cheaply `Clone`-able: every collaborator is held behind an `Arc`, and
/// `PredicateList` is itself `Arc`-backed.
#[derive(Clone)]
pub struct Simplifier {
    builder: Arc<dyn ExprBuilder + Send + Sync>,
    type_factory: Arc<dyn TypeFactory + Send + Sync>,
    coercion: Arc<dyn TypeCoercionRule + Send + Sync>,
    executor: Arc<dyn Executor + Send + Sync>,
    predicates: PredicateList,
    paranoid: bool,
}

static_assertions::assert_impl_all!(Simplifier: Send, Sync, Clone);

impl Simplifier {
    pub fn new(
        builder: Arc<dyn ExprBuilder + Send + Sync>,
        type_factory: Arc<dyn TypeFactory + Send + Sync>,
        coercion: Arc<dyn TypeCoercionRule + Send + Sync>,
        executor: Arc<dyn Executor + Send + Sync>,
    ) -> Self {
        Simplifier {
            builder,
            type_factory,
            coercion,
            executor,
            predicates: PredicateList::empty(),
            paranoid: false,
        }
    }

    pub fn builder(&self) -> &dyn ExprBuilder {
        self.builder.as_ref()
    }

    pub fn coercion(&self) -> &dyn TypeCoercionRule {
        self.coercion.as_ref()
    }

    pub fn type_factory(&self) -> &dyn TypeFactory {
        self.type_factory.as_ref()
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    pub fn predicates(&self) -> &PredicateList {
        &self.predicates
    }

    pub fn with_predicates(&self, predicates: PredicateList) -> Self {
        Simplifier {
            predicates,
            ..self.clone()
        }
    }

    pub fn with_paranoid(&self, paranoid: bool) -> Self {
        Simplifier { paranoid, ..self.clone() }
    }

    /// The general entry point: `m` governs how a boolean-typed `NULL`
    /// result is treated at the root.
    pub fn simplify_unknown_as(&self, e: &ExprImpl, m: UnknownAs) -> Result<ExprImpl> {
        let simplified = self.simplify_internal(e, m)?;
        if self.paranoid {
            verifier::verify(self, e, &simplified, m)?;
        }
        Ok(simplified)
    }

    /// `simplify_unknown_as(e, UnknownAs::Unknown)`: the result stays
    /// 3VL-faithful (a boolean `NULL` is never folded away).
    pub fn simplify(&self, e: &ExprImpl) -> Result<ExprImpl> {
        self.simplify_unknown_as(e, UnknownAs::Unknown)
    }

    /// `simplify_unknown_as(e, UnknownAs::False)`: the usual filter-position
    /// entry point (`WHERE`/`HAVING`/join condition), where SQL already
    /// treats an unknown predicate as excluding the row.
    pub fn simplify_unknown_as_false(&self, e: &ExprImpl) -> Result<ExprImpl> {
        self.simplify_unknown_as(e, UnknownAs::False)
    }

    /// Simplifies under `UnknownAs::False` but re-wraps the result so its
    /// static type still matches `e`'s (nullable boolean stays nullable),
    /// for positions that require type preservation despite knowing NULL
    /// behaves like FALSE at runtime.
    ///
    /// Paranoid mode cannot verify across the re-widening CAST this entry
    /// point may insert (the CAST changes the observable static type without
    /// itself being part of the 3VL rewrite being checked), so it is
    /// rejected outright here rather than silently skipped.
    pub fn simplify_preserving_type(&self, e: &ExprImpl) -> Result<ExprImpl> {
        if self.paranoid {
            return Err(ExprError::ParanoidUnsupported);
        }
        let original_type = e.return_type();
        let simplified = self.simplify_unknown_as_false(e)?;
        if !original_type.nullable || simplified.return_type() == original_type {
            return Ok(simplified);
        }
        Ok(self.builder.make_cast(simplified, original_type))
    }

    /// Simplifies a conjunction's terms independently under `UnknownAs::False`,
    /// threading each already-simplified term into the predicate context for
    /// the ones that follow — the usual shape of a join/scan's pushed-down
    /// filter list. A `FALSE` term short-circuits to `[FALSE]`.
    pub fn simplify_filter_predicates(&self, terms: &[ExprImpl]) -> Result<Vec<ExprImpl>> {
        let mut ctx = self.clone();
        let mut out = Vec::new();
        for t in terms {
            let s = ctx.simplify_unknown_as(t, UnknownAs::False)?;
            if s.is_always_false() {
                return Ok(vec![s]);
            }
            if s.is_always_true() {
                continue;
            }
            ctx = ctx.with_predicates(ctx.predicates.with_predicate(s.clone()));
            out.push(s);
        }
        Ok(out)
    }

    pub(crate) fn simplify_internal(&self, e: &ExprImpl, m: UnknownAs) -> Result<ExprImpl> {
        // A strong-null subtree collapses to a typed NULL, or — for a
        // boolean result under a pinned `m` — the corresponding boolean
        // constant. Gated on `is_safe_expression`: a strict operator over an
        // unsafe operand (e.g. a non-literal divisor) must not be folded away
        // just because one leg is provably NULL — evaluating it could still
        // be observable (an error) rather than a clean NULL propagation.
        if Strong::is_null(e) && is_safe_expression(e) {
            return Ok(if e.return_type().is_boolean() && m != UnknownAs::Unknown {
                self.builder.make_bool_literal(m.to_boolean().unwrap())
            } else {
                self.builder.make_null_literal(e.return_type())
            });
        }

        match e {
            ExprImpl::Literal(_) | ExprImpl::InputRef(_) => Ok(e.clone()),
            ExprImpl::FieldAccess(f) => {
                let parent = self.simplify_internal(&f.parent, UnknownAs::Unknown)?;
                Ok(ExprImpl::FieldAccess(FieldAccess {
                    parent: Box::new(parent),
                    field_index: f.field_index,
                    return_type: f.return_type.clone(),
                }))
            }
            ExprImpl::Over(_) => Ok(e.clone()),
            ExprImpl::Unsupported(u) => {
                // `CorrelatedInputRef` is the one opaque shape a correlated
                // subquery's own predicate pushdown still needs to see
                // through structurally in the surrounding optimizer; left
                // untouched here regardless, but worth a finer trace than
                // the other three catch-all kinds.
                if u.kind.is_correlated_input_ref() {
                    tracing::trace!(?u.return_type, "leaving correlated input ref opaque");
                } else {
                    tracing::trace!(kind = ?u.kind, "leaving unsupported expression opaque");
                }
                Ok(e.clone())
            }
            ExprImpl::FunctionCall(c) => self.simplify_call(e, c, m),
        }
    }

    fn simplify_call(&self, e: &ExprImpl, c: &FunctionCall, m: UnknownAs) -> Result<ExprImpl> {
        use ExprType::*;
        match &c.op {
            Not => self.simplify_not(c, m),
            And => boolean::simplify_and(self, &c.operands, m),
            Or => boolean::simplify_or(self, &c.operands, m),
            Case => boolean::simplify_case(self, c, m),
            Coalesce => self.simplify_coalesce(c),
            Cast | SafeCast => self.simplify_cast(c),
            IsNull | IsNotNull => self.simplify_is_null(c),
            IsTrue | IsNotTrue | IsFalse | IsNotFalse => self.simplify_is_truthy(c),
            Equals | NotEquals | LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
                self.simplify_comparison(c)
            }
            IsDistinctFrom | IsNotDistinctFrom => self.simplify_distinct(c),
            Search => self.simplify_search_call(c),
            Plus | Minus | Times | Divide | CheckedPlus | CheckedMinus | CheckedTimes | CheckedDivide => {
                self.simplify_arithmetic(c)
            }
            PlusPrefix => self.simplify_internal(&c.operands[0], UnknownAs::Unknown),
            MinusPrefix => self.simplify_minus_prefix(c),
            Ceil | Floor => self.simplify_roll_up(c),
            Trim | Ltrim | Rtrim => self.simplify_trim(c),
            Like => self.simplify_like(c),
            M2v => self.simplify_m2v(e, c),
            V2m => self.simplify_generic_node(e, c),
            In | NotIn | Between | Mod | Other(_) => self.simplify_generic_node(e, c),
        }
    }

    fn simplify_not(&self, c: &FunctionCall, m: UnknownAs) -> Result<ExprImpl> {
        let inner = &c.operands[0];
        if let Some(ic) = inner.as_function_call() {
            // NOT (NOT x) -> x
            if ic.op == ExprType::Not {
                return self.simplify_internal(&ic.operands[0], m);
            }
            // De Morgan: valid under 3VL (Kleene) negation, not just the
            // two-valued case.
            if ic.op == ExprType::And {
                let negated = ic.operands.iter().cloned().map(ExprImpl::not).collect_vec();
                return boolean::simplify_or(self, &negated, m);
            }
            if ic.op == ExprType::Or {
                let negated = ic.operands.iter().cloned().map(ExprImpl::not).collect_vec();
                return boolean::simplify_and(self, &negated, m);
            }
            // `NOT(x op y)` rewritten via the kind's null-safe negation is
            // always sound: the rewritten comparison and the explicit `NOT`
            // agree on every input, including NULL.
            if let Some(negated_kind) = ic.op.negate_null_safe() {
                let negated = ExprImpl::call(negated_kind, ic.operands.clone(), c.return_type.clone());
                return self.simplify_internal(&negated, m);
            }
        }
        let simplified_inner = self.simplify_internal(inner, UnknownAs::Unknown)?;
        if let Some(b) = simplified_inner.as_bool_literal() {
            return Ok(self.builder.make_bool_literal(!b));
        }
        if simplified_inner.is_null_literal() {
            return Ok(self.builder.make_null_literal(c.return_type.clone()));
        }
        Ok(ExprImpl::call(ExprType::Not, vec![simplified_inner], c.return_type.clone()))
    }

    fn simplify_comparison(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let lhs = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        let rhs = self.simplify_internal(&c.operands[1], UnknownAs::Unknown)?;

        if lhs.is_literal() && rhs.is_literal() {
            return self.fold_literal_call(c.op.clone(), vec![lhs, rhs], c.return_type.clone());
        }

        // `x op x`: every comparison on a reference with itself reduces to a
        // `SEARCH` over the universal or empty range, which `range::
        // simplify_search` already expresses in the right null-aware shape.
        if lhs == rhs && lhs.is_deterministic() {
            use ExprType::*;
            let is_universe = matches!(c.op, Equals | LessThanOrEqual | GreaterThanOrEqual);
            let range_set = if is_universe { RangeSet::all() } else { RangeSet::empty() };
            let ty = lhs.return_type();
            return range::simplify_search(self, lhs, &Sarg::new(range_set, UnknownAs::Unknown), &ty);
        }

        if let Some(collapsed) = simplify_bool_const_comparison(self, &c.op, &lhs, &rhs) {
            return Ok(collapsed);
        }

        let rebuilt = ExprImpl::call(c.op.clone(), vec![lhs, rhs], c.return_type.clone());
        if self.predicates.is_empty() {
            return Ok(rebuilt);
        }
        // residue: strengthen a `ref op literal` term against what the
        // predicate list already implies for the same reference.
        range::residue(self, &rebuilt)
    }

    fn simplify_distinct(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let lhs = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        let rhs = self.simplify_internal(&c.operands[1], UnknownAs::Unknown)?;
        // `x IS [NOT] DISTINCT FROM x`: NULL counts as equal to itself under
        // this operator, so the answer is a plain constant regardless of
        // nullability.
        if lhs == rhs && lhs.is_deterministic() {
            return Ok(self.builder.make_bool_literal(c.op == ExprType::IsNotDistinctFrom));
        }
        if lhs.is_literal() && rhs.is_literal() {
            return self.fold_literal_call(c.op.clone(), vec![lhs, rhs], c.return_type.clone());
        }
        Ok(ExprImpl::call(c.op.clone(), vec![lhs, rhs], c.return_type.clone()))
    }

    fn simplify_is_null(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let operand = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        let is_not_null = c.op == ExprType::IsNotNull;
        if operand.is_null_literal() || Strong::is_null(&operand) {
            return Ok(self.builder.make_bool_literal(!is_not_null));
        }
        // Every `IS [NOT] [NOT] TRUE/FALSE/NULL` predicate is itself declared
        // NOT NULL, so this branch also absorbs `IS_NULL(IS_NULL(x))` and
        // its siblings without a separate case.
        if !operand.return_type().nullable {
            return Ok(self.builder.make_bool_literal(is_not_null));
        }
        // The predicate list already settles this exact fact.
        if self.predicates.asserts_is_not_null(&operand) {
            return Ok(self.builder.make_bool_literal(is_not_null));
        }
        if self.predicates.asserts_is_null(&operand) {
            return Ok(self.builder.make_bool_literal(!is_not_null));
        }
        // `(NOT x) IS kind -> x IS kind.negateNullSafe()`: `IS NULL`/
        // `IS NOT NULL` is unaffected by a `NOT` wrapper.
        if let Some(inner) = operand.as_function_call() {
            if inner.op == ExprType::Not {
                let pushed = ExprImpl::call(c.op.clone(), vec![inner.operands[0].clone()], c.return_type.clone());
                return self.simplify_internal(&pushed, UnknownAs::Unknown);
            }
        }
        // Push through a strict (`Policy::Any`) operator as an OR (IS NULL)
        // / AND (IS NOT NULL) of the operand `IS [NOT] NULL`s. `CAST` and
        // `ITEM`/`FieldAccess` have their own nullability rules and are
        // deliberately excluded.
        if let Some(inner) = operand.as_function_call() {
            let pushable = !matches!(inner.op, ExprType::Cast | ExprType::SafeCast)
                && Strong::policy(&operand) == Policy::Any;
            if pushable {
                let per_operand: Vec<ExprImpl> = inner
                    .operands
                    .iter()
                    .map(|op| ExprImpl::call(c.op.clone(), vec![op.clone()], c.return_type.clone()))
                    .collect();
                return if is_not_null {
                    boolean::simplify_and(self, &per_operand, UnknownAs::Unknown)
                } else {
                    boolean::simplify_or(self, &per_operand, UnknownAs::Unknown)
                };
            }
        }
        Ok(ExprImpl::call(c.op.clone(), vec![operand], c.return_type.clone()))
    }

    fn simplify_is_truthy(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let operand = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        if let Some(b) = operand.as_bool_literal() {
            let result = match c.op {
                ExprType::IsTrue => b,
                ExprType::IsNotTrue => !b,
                ExprType::IsFalse => !b,
                ExprType::IsNotFalse => b,
                _ => unreachable!("dispatched only for IS_[NOT_]TRUE/FALSE"),
            };
            return Ok(self.builder.make_bool_literal(result));
        }
        if operand.is_null_literal() {
            let result = matches!(c.op, ExprType::IsNotTrue | ExprType::IsNotFalse);
            return Ok(self.builder.make_bool_literal(result));
        }
        if !operand.return_type().nullable {
            return Ok(match c.op {
                ExprType::IsTrue | ExprType::IsNotFalse => operand,
                ExprType::IsNotTrue | ExprType::IsFalse => operand.not(),
                _ => unreachable!("dispatched only for IS_[NOT_]TRUE/FALSE"),
            });
        }
        Ok(ExprImpl::call(c.op.clone(), vec![operand], c.return_type.clone()))
    }

    fn simplify_coalesce(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let mut kept: Vec<ExprImpl> = Vec::with_capacity(c.operands.len());
        for op in &c.operands {
            let s = self.simplify_internal(op, UnknownAs::Unknown)?;
            if s.is_null_literal() || kept.contains(&s) {
                continue;
            }
            let settles_it = !s.return_type().nullable;
            kept.push(s);
            if settles_it {
                break;
            }
        }
        match kept.len() {
            0 => Ok(self.builder.make_null_literal(c.return_type.clone())),
            1 => Ok(kept.into_iter().next().unwrap()),
            _ => Ok(ExprImpl::call(ExprType::Coalesce, kept, c.return_type.clone())),
        }
    }

    fn simplify_cast(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let operand = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        if operand.is_literal() {
            return self.fold_literal_call(c.op.clone(), vec![operand], c.return_type.clone());
        }
        if c.op == ExprType::Cast
            && !c.return_type.is_decimal()
            && operand.return_type().equal_sans_nullability(&c.return_type)
        {
            // A same-kind CAST only narrows nullability; widening NOT NULL
            // to nullable is a pure no-op, narrowing the other way still
            // needs the runtime NULL-check CAST performs. `DECIMAL` is
            // excluded: precision/scale live outside `TypeKind` here, so a
            // same-`Decimal`-kind CAST may still be a genuine narrowing the
            // executor must perform.
            if operand.return_type().nullable || !c.return_type.nullable {
                return Ok(operand);
            }
        }
        if let Some(inner) = operand.as_function_call() {
            if matches!(inner.op, ExprType::Cast | ExprType::SafeCast)
                && is_lossless_cast(&inner.operands[0].return_type(), &operand.return_type(), self.coercion.as_ref())
                && is_lossless_cast(&operand.return_type(), &c.return_type, self.coercion.as_ref())
            {
                return Ok(ExprImpl::call(c.op.clone(), vec![inner.operands[0].clone()], c.return_type.clone()));
            }
        }
        Ok(ExprImpl::call(c.op.clone(), vec![operand], c.return_type.clone()))
    }

    fn simplify_arithmetic(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let lhs = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        let rhs = self.simplify_internal(&c.operands[1], UnknownAs::Unknown)?;
        if lhs.is_literal() && rhs.is_literal() {
            if let Ok(folded) = self.fold_literal_call(c.op.clone(), vec![lhs.clone(), rhs.clone()], c.return_type.clone()) {
                return Ok(folded);
            }
        }

        use ExprType::*;
        let zero = zero_of(&c.return_type);
        let one = one_of(&c.return_type);
        match c.op.arithmetic_base().unwrap_or_else(|| c.op.clone()) {
            Plus => {
                if rhs.as_const_datum() == Some(&zero) {
                    return Ok(lhs);
                }
                if lhs.as_const_datum() == Some(&zero) {
                    return Ok(rhs);
                }
            }
            Minus => {
                if rhs.as_const_datum() == Some(&zero) {
                    return Ok(lhs);
                }
            }
            Times => {
                if rhs.as_const_datum() == Some(&one) {
                    return Ok(lhs);
                }
                if lhs.as_const_datum() == Some(&one) {
                    return Ok(rhs);
                }
                if !lhs.return_type().nullable && rhs.as_const_datum() == Some(&zero) {
                    return Ok(self.builder.make_literal(zero, c.return_type.with_nullable(false)));
                }
                if !rhs.return_type().nullable && lhs.as_const_datum() == Some(&zero) {
                    return Ok(self.builder.make_literal(zero, c.return_type.with_nullable(false)));
                }
            }
            Divide => {
                if rhs.as_const_datum() == Some(&one) {
                    return Ok(lhs);
                }
            }
            _ => {}
        }
        Ok(ExprImpl::call(c.op.clone(), vec![lhs, rhs], c.return_type.clone()))
    }

    fn simplify_minus_prefix(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let operand = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        if let Some(inner) = operand.as_function_call() {
            if inner.op == ExprType::MinusPrefix {
                return Ok(inner.operands[0].clone());
            }
        }
        if operand.is_literal() {
            return self.fold_literal_call(ExprType::MinusPrefix, vec![operand], c.return_type.clone());
        }
        Ok(ExprImpl::call(ExprType::MinusPrefix, vec![operand], c.return_type.clone()))
    }

    fn simplify_roll_up(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let operand = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        if let (Some(outer_unit), Some(inner)) = (c.time_unit(), operand.as_function_call()) {
            if inner.op == c.op {
                if let Some(inner_unit) = inner.time_unit() {
                    if outer_unit.rolls_up_from(inner_unit) {
                        let mut fc = FunctionCall::new(c.op.clone(), vec![inner.operands[0].clone()], c.return_type.clone());
                        fc.extra = c.extra.clone();
                        return Ok(ExprImpl::FunctionCall(fc));
                    }
                }
            }
        }
        let mut fc = FunctionCall::new(c.op.clone(), vec![operand], c.return_type.clone());
        fc.extra = c.extra.clone();
        Ok(ExprImpl::FunctionCall(fc))
    }

    fn simplify_trim(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let operand = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        let mut operands = vec![operand];
        for extra in &c.operands[1..] {
            operands.push(self.simplify_internal(extra, UnknownAs::Unknown)?);
        }
        // `TRIM(TRIM(x))` is idempotent only when both calls trim the same
        // side with the same trim characters; collapse it in that case.
        if let Some(inner) = operands[0].as_function_call() {
            let same_chars = match (operands.get(1), inner.operands.get(1)) {
                (None, None) => true,
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            if inner.op == c.op && same_chars {
                return Ok(inner.operands[0].clone());
            }
        }
        Ok(ExprImpl::call(c.op.clone(), operands, c.return_type.clone()))
    }

    fn simplify_like(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let lhs = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        let rhs = self.simplify_internal(&c.operands[1], UnknownAs::Unknown)?;
        if let Some(ScalarImpl::Utf8(pat)) = rhs.as_const_datum().and_then(|d| d.as_ref()) {
            if pat.as_ref() == "%" {
                // `x LIKE '%'` is true whenever `x` is non-null, and NULL
                // otherwise — exactly a universal `SEARCH` with a natural
                // (Unknown) null classification.
                let ty = lhs.return_type();
                return range::simplify_search(self, lhs, &Sarg::new(RangeSet::all(), UnknownAs::Unknown), &ty);
            }
        }
        if lhs.is_literal() && rhs.is_literal() {
            return self.fold_literal_call(ExprType::Like, vec![lhs, rhs], c.return_type.clone());
        }
        Ok(ExprImpl::call(ExprType::Like, vec![lhs, rhs], c.return_type.clone()))
    }

    fn simplify_search_call(&self, c: &FunctionCall) -> Result<ExprImpl> {
        let reference = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        let sarg = c
            .sarg()
            .ok_or_else(|| ExprError::Malformed("SEARCH call missing its Sarg payload".into()))?
            .clone();
        let ty = reference.return_type();
        range::simplify_search(self, reference, &sarg, &ty)
    }

    /// `M2V(V2M(x)) -> x`: strips the measure-lift round trip, rewriting
    /// any aggregate call found inside `x` to a
    /// single-row window aggregate (`OVER (ROWS CURRENT ROW)`) first, since
    /// an aggregate that used to run inside the `V2M` measure context is no
    /// longer inside one once the lift is gone.
    fn simplify_m2v(&self, e: &ExprImpl, c: &FunctionCall) -> Result<ExprImpl> {
        let operand = self.simplify_internal(&c.operands[0], UnknownAs::Unknown)?;
        if let Some(inner) = operand.as_function_call() {
            if inner.op == ExprType::V2m && inner.operands.len() == 1 {
                let rewritten = self.windowize_aggregates(&inner.operands[0]);
                return self.simplify_internal(&rewritten, UnknownAs::Unknown);
            }
        }
        self.simplify_generic_node(e, c)
    }

    /// Recursively rewrites every aggregate call in `e` to an equivalent
    /// single-row window aggregate, leaving everything else untouched.
    fn windowize_aggregates(&self, e: &ExprImpl) -> ExprImpl {
        match e {
            ExprImpl::FunctionCall(c) if c.is_aggregate => {
                let rewritten_operands = c.operands.iter().map(|op| self.windowize_aggregates(op)).collect_vec();
                let call = FunctionCall::new(c.op.clone(), rewritten_operands, c.return_type.clone());
                self.builder.make_window(call, vec![], vec![], crate::expr::WindowFrame::RowsCurrentRow)
            }
            ExprImpl::FunctionCall(c) => {
                let mut fc = FunctionCall::new(
                    c.op.clone(),
                    c.operands.iter().map(|op| self.windowize_aggregates(op)).collect_vec(),
                    c.return_type.clone(),
                );
                fc.deterministic = c.deterministic;
                fc.extra = c.extra.clone();
                ExprImpl::FunctionCall(fc)
            }
            ExprImpl::FieldAccess(f) => ExprImpl::FieldAccess(FieldAccess {
                parent: Box::new(self.windowize_aggregates(&f.parent)),
                field_index: f.field_index,
                return_type: f.return_type.clone(),
            }),
            _ => e.clone(),
        }
    }

    /// The fallthrough for every operator kind this simplifier does not
    /// special-case: recursively simplify operands, then constant-fold the
    /// node itself if every operand settled to a literal and the executor
    /// knows how to reduce it.
    fn simplify_generic_node(&self, _e: &ExprImpl, c: &FunctionCall) -> Result<ExprImpl> {
        let mut operands = Vec::with_capacity(c.operands.len());
        for op in &c.operands {
            operands.push(self.simplify_internal(op, UnknownAs::Unknown)?);
        }
        let all_literal = c.deterministic && operands.iter().all(|o| o.is_literal());
        let mut fc = FunctionCall::new(c.op.clone(), operands, c.return_type.clone());
        fc.deterministic = c.deterministic;
        fc.extra = c.extra.clone();
        let rebuilt = ExprImpl::FunctionCall(fc);
        if all_literal {
            if let Ok(folded) = self.fold_literal_node(&rebuilt) {
                return Ok(folded);
            }
        }
        Ok(rebuilt)
    }

    fn fold_literal_call(&self, op: ExprType, operands: Vec<ExprImpl>, return_type: DataType) -> Result<ExprImpl> {
        let call = ExprImpl::call(op, operands, return_type);
        self.fold_literal_node(&call)
    }

    fn fold_literal_node(&self, e: &ExprImpl) -> Result<ExprImpl> {
        let folded = self.executor.reduce(self.builder.as_ref(), std::slice::from_ref(e))?;
        Ok(folded.into_iter().next().expect("reduce preserves arity"))
    }
}

/// Collapses `x op TRUE/FALSE` (and its reversed `TRUE/FALSE op x` form).
/// Forms that preserve NULL propagation exactly
/// (`x = TRUE`, `x <> TRUE`, ...) hold unconditionally; forms that would
/// otherwise turn a NULL `x` into a non-NULL constant (`x < FALSE -> FALSE`,
/// ...) require `x` to be non-nullable.
fn simplify_bool_const_comparison(
    ctx: &Simplifier,
    op: &ExprType,
    lhs: &ExprImpl,
    rhs: &ExprImpl,
) -> Option<ExprImpl> {
    if !lhs.return_type().is_boolean() || !rhs.return_type().is_boolean() {
        return None;
    }
    let (x, b, op) = if let Some(b) = rhs.as_bool_literal() {
        (lhs.clone(), b, op.clone())
    } else if let Some(b) = lhs.as_bool_literal() {
        (rhs.clone(), b, reverse_comparison(op))
    } else {
        return None;
    };
    let non_nullable = !x.return_type().nullable;
    use ExprType::*;
    let result = match (&op, b) {
        (Equals, true) | (NotEquals, false) => x,
        (Equals, false) | (NotEquals, true) => x.not(),
        (LessThan, true) => x.not(),
        (GreaterThan, false) => x,
        (LessThanOrEqual, false) => x.not(),
        (GreaterThanOrEqual, true) => x,
        (LessThan, false) if non_nullable => ctx.builder.make_bool_literal(false),
        (GreaterThan, true) if non_nullable => ctx.builder.make_bool_literal(false),
        (LessThanOrEqual, true) if non_nullable => ctx.builder.make_bool_literal(true),
        (GreaterThanOrEqual, false) if non_nullable => ctx.builder.make_bool_literal(true),
        _ => return None,
    };
    Some(result)
}

fn reverse_comparison(op: &ExprType) -> ExprType {
    use ExprType::*;
    match op {
        LessThan => GreaterThan,
        LessThanOrEqual => GreaterThanOrEqual,
        GreaterThan => LessThan,
        GreaterThanOrEqual => LessThanOrEqual,
        other => other.clone(),
    }
}

fn zero_of(ty: &DataType) -> Datum {
    use num_traits::Zero;
    match ty.kind {
        TypeKind::Int16 => Some(ScalarImpl::Int16(i16::zero())),
        TypeKind::Int32 => Some(ScalarImpl::Int32(i32::zero())),
        TypeKind::Int64 => Some(ScalarImpl::Int64(i64::zero())),
        TypeKind::Decimal => Some(ScalarImpl::Decimal(rust_decimal::Decimal::zero())),
        TypeKind::Float32 => Some(ScalarImpl::Float32(ordered_float::OrderedFloat(f32::zero()))),
        TypeKind::Float64 => Some(ScalarImpl::Float64(ordered_float::OrderedFloat(f64::zero()))),
        _ => None,
    }
}

fn one_of(ty: &DataType) -> Datum {
    use num_traits::One;
    match ty.kind {
        TypeKind::Int16 => Some(ScalarImpl::Int16(i16::one())),
        TypeKind::Int32 => Some(ScalarImpl::Int32(i32::one())),
        TypeKind::Int64 => Some(ScalarImpl::Int64(i64::one())),
        TypeKind::Decimal => Some(ScalarImpl::Decimal(rust_decimal::Decimal::one())),
        TypeKind::Float32 => Some(ScalarImpl::Float32(ordered_float::OrderedFloat(f32::one()))),
        TypeKind::Float64 => Some(ScalarImpl::Float64(ordered_float::OrderedFloat(f64::one()))),
        _ => None,
    }
}

#[allow(unused)]
fn _assert_policy_exhaustive(_: Policy) {}

#[cfg(test)]
mod tests {
    use relexpr_common::TypeKind;

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

    fn bx(nullable: bool) -> ExprImpl {
        ExprImpl::InputRef(InputRef::new(1, DataType::new(TypeKind::Boolean, nullable)))
    }

    fn i(v: i32) -> ExprImpl {
        ExprImpl::literal(ScalarImpl::Int32(v), DataType::not_null(TypeKind::Int32))
    }

    #[test]
    fn literal_comparison_folds() {
        let e = ExprImpl::call(ExprType::LessThan, vec![i(1), i(2)], DataType::not_null(TypeKind::Boolean));
        let r = ctx().simplify(&e).unwrap();
        assert!(r.is_always_true());
    }

    #[test]
    fn self_equals_on_nullable_ref_is_not_null_or_null() {
        let e = ExprImpl::call(ExprType::Equals, vec![x(true), x(true)], DataType::nullable(TypeKind::Boolean));
        let r = ctx().simplify(&e).unwrap();
        assert_eq!(r.op(), Some(&ExprType::Or));
    }

    #[test]
    fn self_equals_on_not_null_ref_is_true() {
        let e = ExprImpl::call(ExprType::Equals, vec![x(false), x(false)], DataType::not_null(TypeKind::Boolean));
        let r = ctx().simplify(&e).unwrap();
        assert!(r.is_always_true());
    }

    #[test]
    fn double_not_cancels() {
        let inner = ExprImpl::call(ExprType::IsNull, vec![x(true)], DataType::not_null(TypeKind::Boolean));
        let e = inner.clone().not().not();
        let r = ctx().simplify(&e).unwrap();
        assert_eq!(r, inner);
    }

    #[test]
    fn not_of_comparison_uses_null_safe_negation() {
        let e = ExprImpl::call(ExprType::Equals, vec![x(true), i(1)], DataType::nullable(TypeKind::Boolean)).not();
        let r = ctx().simplify(&e).unwrap();
        assert_eq!(r.op(), Some(&ExprType::NotEquals));
    }

    #[test]
    fn bool_eq_true_collapses_to_operand() {
        let e = ExprImpl::call(
            ExprType::Equals,
            vec![bx(true), ExprImpl::literal_bool(true)],
            DataType::nullable(TypeKind::Boolean),
        );
        let r = ctx().simplify(&e).unwrap();
        assert_eq!(r, bx(true));
    }

    #[test]
    fn less_than_false_on_not_null_bool_is_false() {
        let e = ExprImpl::call(
            ExprType::LessThan,
            vec![bx(false), ExprImpl::literal_bool(false)],
            DataType::not_null(TypeKind::Boolean),
        );
        let r = ctx().simplify(&e).unwrap();
        assert!(r.is_always_false());
    }

    #[test]
    fn plus_zero_identity() {
        let e = ExprImpl::call(ExprType::Plus, vec![x(true), i(0)], DataType::nullable(TypeKind::Int32));
        let r = ctx().simplify(&e).unwrap();
        assert_eq!(r, x(true));
    }

    #[test]
    fn coalesce_drops_leading_null_and_settles_on_not_null() {
        let e = ExprImpl::call(
            ExprType::Coalesce,
            vec![ExprImpl::null_literal(DataType::nullable(TypeKind::Int32)), i(7), x(true)],
            DataType::nullable(TypeKind::Int32),
        );
        let r = ctx().simplify(&e).unwrap();
        assert_eq!(r, i(7));
    }

    #[test]
    fn is_null_on_not_null_ref_is_false() {
        let e = ExprImpl::call(ExprType::IsNull, vec![x(false)], DataType::not_null(TypeKind::Boolean));
        let r = ctx().simplify(&e).unwrap();
        assert!(r.is_always_false());
    }

    #[test]
    fn strict_null_pre_check_does_not_fold_unsafe_divide() {
        // `NULL / x` is strong-null (Divide is `Policy::Any`), but the
        // divisor is a column rather than a non-null literal, so
        // `isSafeExpression` rejects it and the top-level pre-check must not
        // collapse it to a typed NULL literal.
        let e = ExprImpl::call(
            ExprType::Divide,
            vec![ExprImpl::null_literal(DataType::nullable(TypeKind::Int32)), x(true)],
            DataType::nullable(TypeKind::Int32),
        );
        let r = ctx().simplify(&e).unwrap();
        assert!(!r.is_null_literal());
        assert_eq!(r.op(), Some(&ExprType::Divide));
    }

    #[test]
    fn coalesce_dedupes_repeated_operand() {
        let e = ExprImpl::call(
            ExprType::Coalesce,
            vec![x(true), x(true), i(7)],
            DataType::nullable(TypeKind::Int32),
        );
        let r = ctx().simplify(&e).unwrap();
        assert_eq!(r.op(), Some(&ExprType::Coalesce));
        assert_eq!(r.as_function_call().unwrap().operands.len(), 2);
    }
}
