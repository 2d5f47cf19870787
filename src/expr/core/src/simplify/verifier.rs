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

//! The paranoid verifier: a diagnostic-only, bounded-enumeration equivalence
//! check run after a rewrite when `Simplifier::with_paranoid(true)` is set.
//! It never changes the simplified result — it only raises
//! `ExprError::ParanoidMismatch` when it can *prove*, over a finite domain
//! it actually enumerated, that the rewrite disagrees with the original.
//!
//! Substantially slower than the simplifier itself and allowed to be: it
//! exists for development and CI, not the hot path.

use std::collections::BTreeMap;

use relexpr_common::{DataType, Datum, ScalarImpl, TypeKind};

use crate::error::{ExprError, Result};
use crate::eval::{self, Env};
use crate::expr::ExprImpl;
use crate::sarg::UnknownAs;
use crate::simplify::Simplifier;

/// How many variable-index-to-domain-value assignments the verifier is
/// willing to enumerate before giving up. Keeps a four- or five-variable
/// boolean expression tractable without risking a combinatorial blow-up on
/// a wider one.
const MAX_ASSIGNMENTS: usize = 20_000;

/// Verifies that `simplified` agrees with `original` on every row the
/// verifier can actually enumerate, given the predicates already known to
/// hold. A `Malformed`/unsupported construct anywhere in either tree, or a
/// variable domain this analyzer doesn't know how to enumerate, silently
/// skips verification rather than failing — the verifier proves
/// disagreement, it never proves agreement.
pub fn verify(ctx: &Simplifier, original: &ExprImpl, simplified: &ExprImpl, m: UnknownAs) -> Result<()> {
    // An unconditional check that doesn't need enumeration at all: a
    // rewrite that flips a provably-constant result is always wrong,
    // regardless of whether the rest of the tree is enumerable.
    if original.is_always_true() && simplified.is_always_false() {
        return Err(ExprError::ParanoidMismatch {
            assignment: "<none, constant>".into(),
            before: "TRUE".into(),
            after: "FALSE".into(),
        });
    }
    if original.is_always_false() && simplified.is_always_true() {
        return Err(ExprError::ParanoidMismatch {
            assignment: "<none, constant>".into(),
            before: "FALSE".into(),
            after: "TRUE".into(),
        });
    }

    let mut original_vars: BTreeMap<usize, DataType> = BTreeMap::new();
    let mut simplified_vars: BTreeMap<usize, DataType> = BTreeMap::new();
    if collect_refs(original, &mut original_vars).is_err() || collect_refs(simplified, &mut simplified_vars).is_err() {
        return Ok(());
    }

    // A rewrite must never introduce a reference the original didn't have —
    // there is no assignment over which such a variable's value is pinned by
    // anything the caller asserted about the original expression.
    if let Some(&extra) = simplified_vars.keys().find(|idx| !original_vars.contains_key(idx)) {
        return Err(ExprError::ParanoidMismatch {
            assignment: "<none, variable check>".into(),
            before: format!("references only {:?}", original_vars.keys().collect::<Vec<_>>()),
            after: format!("references new variable ${extra}"),
        });
    }

    let mut vars = original_vars;
    vars.extend(simplified_vars);

    let Some(domains) = domains_for(&vars) else {
        // At least one referenced variable's type has no enumerable finite
        // domain here; skip verification for this pair rather than guess.
        return Ok(());
    };

    let Some(assignments) = cartesian(&domains) else {
        // Too many combinations to bound; skip rather than pretend to have
        // checked it.
        return Ok(());
    };

    for assignment in assignments {
        let env = Env(assignment.iter().map(|(k, v)| (*k, v.clone())).collect());
        if !satisfies_predicates(ctx, &env) {
            continue;
        }

        let before = match eval::eval(original, &env) {
            Ok(v) => v,
            Err(_) => return Ok(()), // unsupported construct somewhere; skip
        };
        let after = match eval::eval(simplified, &env) {
            Ok(v) => v,
            Err(_) => return Ok(()),
        };

        let before = eval::project_unknown_as(&before, m);
        let after = eval::project_unknown_as(&after, m);
        if before != after {
            return Err(ExprError::ParanoidMismatch {
                assignment: describe_assignment(&assignment),
                before: describe_datum(&before),
                after: describe_datum(&after),
            });
        }
    }
    Ok(())
}

/// Records every `InputRef`'s type, failing (by returning `Err`) the moment
/// it encounters a construct the verifier can't evaluate at all.
fn collect_refs(e: &ExprImpl, out: &mut BTreeMap<usize, DataType>) -> std::result::Result<(), ()> {
    match e {
        ExprImpl::Literal(_) => Ok(()),
        ExprImpl::InputRef(r) => {
            out.entry(r.index).or_insert_with(|| r.return_type.clone());
            Ok(())
        }
        ExprImpl::FieldAccess(f) => collect_refs(&f.parent, out),
        ExprImpl::Over(_) | ExprImpl::Unsupported(_) => Err(()),
        ExprImpl::FunctionCall(c) => {
            for op in &c.operands {
                collect_refs(op, out)?;
            }
            Ok(())
        }
    }
}

/// A small, deliberately narrow finite domain per referenced variable
/// (spec.md §9 decision: "Boolean exhaustively, small Int16 ranges ...
/// skipping verification for other shapes").
fn domain_for(ty: &DataType) -> Option<Vec<Datum>> {
    let mut values = match ty.kind {
        TypeKind::Boolean => vec![Some(ScalarImpl::Bool(true)), Some(ScalarImpl::Bool(false))],
        TypeKind::Int16 => (-2..=2).map(|v| Some(ScalarImpl::Int16(v))).collect(),
        _ => return None,
    };
    if ty.nullable {
        values.push(None);
    }
    Some(values)
}

fn domains_for(vars: &BTreeMap<usize, DataType>) -> Option<BTreeMap<usize, Vec<Datum>>> {
    let mut out = BTreeMap::new();
    for (idx, ty) in vars {
        out.insert(*idx, domain_for(ty)?);
    }
    Some(out)
}

/// The cartesian product of every variable's domain, bounded by
/// `MAX_ASSIGNMENTS`.
fn cartesian(domains: &BTreeMap<usize, Vec<Datum>>) -> Option<Vec<BTreeMap<usize, Datum>>> {
    let total: usize = domains.values().map(|d| d.len().max(1)).product();
    if total > MAX_ASSIGNMENTS {
        return None;
    }

    let mut out = vec![BTreeMap::new()];
    for (&idx, values) in domains {
        let mut next = Vec::with_capacity(out.len() * values.len());
        for env in &out {
            for v in values {
                let mut env = env.clone();
                env.insert(idx, v.clone());
                next.push(env);
            }
        }
        out = next;
    }
    Some(out)
}

fn satisfies_predicates(ctx: &Simplifier, env: &Env) -> bool {
    for p in ctx.predicates().pulled_up_predicates() {
        match eval::eval(p, env) {
            Ok(Some(ScalarImpl::Bool(true))) => {}
            Ok(_) => return false,
            Err(_) => {} // can't evaluate this predicate under this assignment; don't let it gate
        }
    }
    true
}

fn describe_assignment(assignment: &BTreeMap<usize, Datum>) -> String {
    let mut parts: Vec<String> = assignment
        .iter()
        .map(|(idx, v)| format!("${idx}={}", describe_datum(v)))
        .collect();
    parts.sort();
    parts.join(", ")
}

fn describe_datum(d: &Datum) -> String {
    match d {
        None => "NULL".to_string(),
        Some(v) => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relexpr_common::{DataType, TypeKind};

    use super::*;
    use crate::builder::DefaultExprBuilder;
    use crate::coercion::DefaultTypeCoercion;
    use crate::executor::InterpretingExecutor;
    use crate::expr::{ExprType, InputRef};
    use crate::type_factory::DefaultTypeFactory;

    fn ctx() -> Simplifier {
        Simplifier::new(
            Arc::new(DefaultExprBuilder),
            Arc::new(DefaultTypeFactory),
            Arc::new(DefaultTypeCoercion),
            Arc::new(InterpretingExecutor),
        )
        .with_paranoid(true)
    }

    fn bx(nullable: bool) -> ExprImpl {
        ExprImpl::InputRef(InputRef::new(0, DataType::new(TypeKind::Boolean, nullable)))
    }

    #[test]
    fn sound_rewrite_passes() {
        let e = bx(true).clone().not().not();
        assert!(ctx().simplify(&e).is_ok());
    }

    #[test]
    fn unconditional_constant_flip_is_caught() {
        let c = ctx();
        let always_true = ExprImpl::literal_bool(true);
        let always_false = ExprImpl::literal_bool(false);
        let err = verify(&c, &always_true, &always_false, UnknownAs::Unknown).unwrap_err();
        assert!(matches!(err, ExprError::ParanoidMismatch { .. }));
    }

    #[test]
    fn identical_trees_always_agree() {
        let c = ctx();
        let e = ExprImpl::call(ExprType::Equals, vec![bx(true), ExprImpl::literal_bool(true)], DataType::nullable(TypeKind::Boolean));
        assert!(verify(&c, &e, &e, UnknownAs::Unknown).is_ok());
    }

    #[test]
    fn simplified_introducing_new_variable_is_caught() {
        let c = ctx();
        let original = ExprImpl::literal_bool(true);
        let simplified = ExprImpl::InputRef(InputRef::new(1, DataType::new(TypeKind::Boolean, false)));
        let err = verify(&c, &original, &simplified, UnknownAs::Unknown).unwrap_err();
        assert!(matches!(err, ExprError::ParanoidMismatch { .. }));
    }

    #[test]
    fn unsupported_construct_skips_rather_than_fails() {
        let c = ctx();
        let unsupported = ExprImpl::Unsupported(crate::expr::Unsupported {
            kind: crate::expr::UnsupportedKind::SubQuery,
            return_type: DataType::nullable(TypeKind::Boolean),
        });
        assert!(verify(&c, &unsupported, &unsupported, UnknownAs::Unknown).is_ok());
    }
}
