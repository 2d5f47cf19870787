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

//! A small three-valued interpreter.
//!
//! This is deliberately *not* the production constant-folding engine (that
//! is the opaque `Executor`) — it exists to back: `InterpretingExecutor` (a
//! test-only `Executor` impl), the literal-literal comparison rule, and the
//! paranoid verifier, which is allowed to be substantially slower and need
//! not be inlined into release builds.

use std::cmp::Ordering;
use std::collections::HashMap;

use relexpr_common::{DataType, Datum, ScalarImpl, TypeKind};

use crate::error::{ExprError, Result};
use crate::expr::{Expr, ExprImpl, ExprType};
use crate::sarg::UnknownAs;

/// A variable assignment: input-ref index -> value. Used by the paranoid
/// verifier's bounded enumeration.
#[derive(Clone, Debug, Default)]
pub struct Env(pub HashMap<usize, Datum>);

impl Env {
    pub fn get(&self, index: usize) -> Datum {
        self.0.get(&index).cloned().flatten()
    }
}

fn bool_of(d: &Datum) -> Option<bool> {
    match d {
        Some(ScalarImpl::Bool(b)) => Some(*b),
        _ => None,
    }
}

/// Evaluate `e` under `env`, with no `UnknownAs` projection (raw 3VL:
/// boolean `NULL` stays `None`). Fails on constructs the interpreter
/// doesn't model (window aggregates, subqueries, ...).
pub fn eval(e: &ExprImpl, env: &Env) -> Result<Datum> {
    match e {
        ExprImpl::Literal(l) => Ok(l.value.clone()),
        ExprImpl::InputRef(r) => Ok(env.get(r.index)),
        ExprImpl::FieldAccess(f) => {
            let parent = eval(&f.parent, env)?;
            match parent {
                Some(ScalarImpl::Struct(fields)) => Ok(fields
                    .get(f.field_index)
                    .cloned()
                    .flatten()),
                None => Ok(None),
                _ => Err(ExprError::Malformed("field access on non-struct".into())),
            }
        }
        ExprImpl::Over(_) | ExprImpl::Unsupported(_) => {
            Err(ExprError::Malformed("cannot evaluate opaque construct".into()))
        }
        ExprImpl::FunctionCall(c) => eval_call(c, env),
    }
}

fn eval_call(c: &crate::expr::FunctionCall, env: &Env) -> Result<Datum> {
    use ExprType::*;
    match &c.op {
        And => {
            let mut any_null = false;
            for op in &c.operands {
                match bool_of(&eval(op, env)?) {
                    Some(false) => return Ok(Some(ScalarImpl::Bool(false))),
                    None => any_null = true,
                    Some(true) => {}
                }
            }
            Ok(if any_null { None } else { Some(ScalarImpl::Bool(true)) })
        }
        Or => {
            let mut any_null = false;
            for op in &c.operands {
                match bool_of(&eval(op, env)?) {
                    Some(true) => return Ok(Some(ScalarImpl::Bool(true))),
                    None => any_null = true,
                    Some(false) => {}
                }
            }
            Ok(if any_null { None } else { Some(ScalarImpl::Bool(false)) })
        }
        Not => {
            let v = eval(&c.operands[0], env)?;
            Ok(bool_of(&v).map(|b| ScalarImpl::Bool(!b)))
        }
        IsNull => Ok(Some(ScalarImpl::Bool(eval(&c.operands[0], env)?.is_none()))),
        IsNotNull => Ok(Some(ScalarImpl::Bool(eval(&c.operands[0], env)?.is_some()))),
        IsTrue => Ok(Some(ScalarImpl::Bool(bool_of(&eval(&c.operands[0], env)?) == Some(true)))),
        IsNotTrue => Ok(Some(ScalarImpl::Bool(bool_of(&eval(&c.operands[0], env)?) != Some(true)))),
        IsFalse => Ok(Some(ScalarImpl::Bool(bool_of(&eval(&c.operands[0], env)?) == Some(false)))),
        IsNotFalse => Ok(Some(ScalarImpl::Bool(bool_of(&eval(&c.operands[0], env)?) != Some(false)))),
        Equals | NotEquals | LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
            let a = eval(&c.operands[0], env)?;
            let b = eval(&c.operands[1], env)?;
            match (a, b) {
                (Some(a), Some(b)) => {
                    let ord = a.partial_cmp(&b).ok_or_else(|| {
                        ExprError::Malformed("incomparable operands".into())
                    })?;
                    let result = match c.op {
                        Equals => ord == Ordering::Equal,
                        NotEquals => ord != Ordering::Equal,
                        LessThan => ord == Ordering::Less,
                        LessThanOrEqual => ord != Ordering::Greater,
                        GreaterThan => ord == Ordering::Greater,
                        GreaterThanOrEqual => ord != Ordering::Less,
                        _ => unreachable!(),
                    };
                    Ok(Some(ScalarImpl::Bool(result)))
                }
                _ => Ok(None),
            }
        }
        IsDistinctFrom | IsNotDistinctFrom => {
            let a = eval(&c.operands[0], env)?;
            let b = eval(&c.operands[1], env)?;
            let distinct = match (&a, &b) {
                (None, None) => false,
                (None, Some(_)) | (Some(_), None) => true,
                (Some(a), Some(b)) => a.partial_cmp(b) != Some(Ordering::Equal),
            };
            Ok(Some(ScalarImpl::Bool(if c.op == IsDistinctFrom {
                distinct
            } else {
                !distinct
            })))
        }
        Coalesce => {
            for op in &c.operands {
                let v = eval(op, env)?;
                if v.is_some() {
                    return Ok(v);
                }
            }
            Ok(None)
        }
        Plus | Minus | Times | Divide | CheckedPlus | CheckedMinus | CheckedTimes | CheckedDivide | Mod => {
            let a = eval(&c.operands[0], env)?;
            let b = eval(&c.operands[1], env)?;
            match (a, b) {
                (Some(a), Some(b)) => eval_arith(c.op.arithmetic_base().unwrap_or(c.op.clone()), &a, &b),
                _ => Ok(None),
            }
        }
        PlusPrefix => eval(&c.operands[0], env),
        MinusPrefix => {
            let v = eval(&c.operands[0], env)?;
            Ok(v.map(negate_scalar))
        }
        Cast | SafeCast => {
            let v = eval(&c.operands[0], env)?;
            cast_datum(&v, &c.return_type)
        }
        Case => {
            let mut i = 0;
            while i + 1 < c.operands.len() {
                if bool_of(&eval(&c.operands[i], env)?) == Some(true) {
                    return eval(&c.operands[i + 1], env);
                }
                i += 2;
            }
            if i < c.operands.len() {
                eval(&c.operands[i], env)
            } else {
                Ok(None)
            }
        }
        Search => {
            let v = eval(&c.operands[0], env)?;
            let sarg = c.sarg().ok_or_else(|| ExprError::Malformed("SEARCH missing sarg".into()))?;
            match v {
                None => Ok(sarg.null_as.to_boolean().map(ScalarImpl::Bool)),
                Some(v) => Ok(Some(ScalarImpl::Bool(sarg.range_set.contains(&v)))),
            }
        }
        Like => {
            let a = eval(&c.operands[0], env)?;
            let b = eval(&c.operands[1], env)?;
            match (a, b) {
                (Some(ScalarImpl::Utf8(a)), Some(ScalarImpl::Utf8(b))) => {
                    Ok(Some(ScalarImpl::Bool(like_match(&a, &b))))
                }
                _ => Ok(None),
            }
        }
        In | NotIn => {
            let needle = eval(&c.operands[0], env)?;
            let mut any_null = needle.is_none();
            let mut found = false;
            for op in &c.operands[1..] {
                let v = eval(op, env)?;
                match (&needle, &v) {
                    (Some(n), Some(v)) => {
                        if n.partial_cmp(v) == Some(Ordering::Equal) {
                            found = true;
                        }
                    }
                    _ => any_null = true,
                }
            }
            let result = if found {
                Some(true)
            } else if any_null {
                None
            } else {
                Some(false)
            };
            let result = if c.op == NotIn { result.map(|b| !b) } else { result };
            Ok(result.map(ScalarImpl::Bool))
        }
        Between => {
            // `v BETWEEN lo AND hi` is `v >= lo AND v <= hi`: each
            // comparison is three-valued, and the AND short-circuits on a
            // FALSE branch regardless of whether the other one is NULL.
            let v = eval(&c.operands[0], env)?;
            let lo = eval(&c.operands[1], env)?;
            let hi = eval(&c.operands[2], env)?;
            let ge_lo = compare_3vl(&v, &lo, |ord| ord != Ordering::Less)?;
            let le_hi = compare_3vl(&v, &hi, |ord| ord != Ordering::Greater)?;
            Ok(and_3vl(ge_lo, le_hi).map(ScalarImpl::Bool))
        }
        Ceil | Floor | Trim | Ltrim | Rtrim | M2v | V2m | Other(_) => {
            Err(ExprError::Malformed(format!("unsupported in evaluator: {:?}", c.op)))
        }
    }
}

/// Three-valued comparison: `None` (SQL NULL) if either side is NULL,
/// otherwise `f` applied to the two sides' ordering.
fn compare_3vl(a: &Datum, b: &Datum, f: impl Fn(Ordering) -> bool) -> Result<Option<bool>> {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(b).ok_or_else(|| ExprError::Malformed("incomparable operands".into()))?;
            Ok(Some(f(ord)))
        }
        _ => Ok(None),
    }
}

/// Three-valued AND of two already-evaluated operands: FALSE dominates
/// regardless of the other side's nullity, only TRUE/TRUE gives TRUE, and
/// anything else is NULL.
fn and_3vl(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn negate_scalar(v: ScalarImpl) -> ScalarImpl {
    match v {
        ScalarImpl::Int16(n) => ScalarImpl::Int16(-n),
        ScalarImpl::Int32(n) => ScalarImpl::Int32(-n),
        ScalarImpl::Int64(n) => ScalarImpl::Int64(-n),
        ScalarImpl::Decimal(n) => ScalarImpl::Decimal(-n),
        ScalarImpl::Float32(n) => ScalarImpl::Float32(-n),
        ScalarImpl::Float64(n) => ScalarImpl::Float64(-n),
        other => other,
    }
}

fn eval_arith(op: ExprType, a: &ScalarImpl, b: &ScalarImpl) -> Result<Datum> {
    use ScalarImpl::*;
    let result = match (a, b) {
        (Int32(a), Int32(b)) => Int32(match op {
            ExprType::Plus => a + b,
            ExprType::Minus => a - b,
            ExprType::Times => a * b,
            ExprType::Divide => {
                if *b == 0 {
                    return Err(ExprError::Malformed("division by zero".into()));
                }
                a / b
            }
            ExprType::Mod => a % b,
            _ => return Err(ExprError::Malformed("not arithmetic".into())),
        }),
        (Int64(a), Int64(b)) => Int64(match op {
            ExprType::Plus => a + b,
            ExprType::Minus => a - b,
            ExprType::Times => a * b,
            ExprType::Divide => {
                if *b == 0 {
                    return Err(ExprError::Malformed("division by zero".into()));
                }
                a / b
            }
            ExprType::Mod => a % b,
            _ => return Err(ExprError::Malformed("not arithmetic".into())),
        }),
        (Decimal(a), Decimal(b)) => Decimal(match op {
            ExprType::Plus => a + b,
            ExprType::Minus => a - b,
            ExprType::Times => a * b,
            ExprType::Divide => a / b,
            ExprType::Mod => a % b,
            _ => return Err(ExprError::Malformed("not arithmetic".into())),
        }),
        _ => return Err(ExprError::Malformed("mixed-type arithmetic".into())),
    };
    Ok(Some(result))
}

fn like_match(s: &str, pattern: &str) -> bool {
    if pattern == "%" {
        return true;
    }
    // Minimal SQL LIKE: '%' -> any run, '_' -> any one char. Sufficient for
    // the simplifier's own fold-constant needs; not a general LIKE engine.
    fn rec(s: &[u8], p: &[u8]) -> bool {
        match p.first() {
            None => s.is_empty(),
            Some(b'%') => rec(s, &p[1..]) || (!s.is_empty() && rec(&s[1..], p)),
            Some(b'_') => !s.is_empty() && rec(&s[1..], &p[1..]),
            Some(c) => s.first() == Some(c) && rec(&s[1..], &p[1..]),
        }
    }
    rec(s.as_bytes(), pattern.as_bytes())
}

/// Fold a variable-free expression to a literal datum (backs
/// `InterpretingExecutor`).
pub fn fold_constant(e: &ExprImpl) -> Result<Datum> {
    eval(e, &Env::default())
}

/// Cast a datum to `target`, used by CAST evaluation and literal-cast
/// folding.
pub fn cast_datum(value: &Datum, target: &DataType) -> Result<Datum> {
    let Some(v) = value else {
        return Ok(None);
    };
    use ScalarImpl::*;
    let casted = match (&v, &target.kind) {
        (Int16(n), TypeKind::Int32) => Int32(*n as i32),
        (Int16(n), TypeKind::Int64) => Int64(*n as i64),
        (Int32(n), TypeKind::Int64) => Int64(*n as i64),
        (Int32(n), TypeKind::Int16) => Int16(*n as i16),
        (Int64(n), TypeKind::Int32) => Int32(*n as i32),
        (Int64(n), TypeKind::Int16) => Int16(*n as i16),
        (Float32(n), TypeKind::Float64) => Float64(ordered_float::OrderedFloat(n.0 as f64)),
        (Float64(n), TypeKind::Float32) => Float32(ordered_float::OrderedFloat(n.0 as f32)),
        (a, k) if a.type_kind() == *k => (*a).clone(),
        _ => {
            return Err(ExprError::Executor(anyhow::anyhow!(
                "no constant cast rule from {:?} to {:?}",
                v.type_kind(),
                target.kind
            )))
        }
    };
    Ok(Some(casted))
}

/// Project a raw 3VL boolean result through an `UnknownAs` policy, i.e. what
/// the paranoid verifier compares at the root: under `UnknownAs::True` or
/// `UnknownAs::False` the NULL sentinel is folded to the corresponding
/// boolean.
pub fn project_unknown_as(result: &Datum, m: UnknownAs) -> Datum {
    match (result, m) {
        (None, UnknownAs::True) => Some(ScalarImpl::Bool(true)),
        (None, UnknownAs::False) => Some(ScalarImpl::Bool(false)),
        _ => result.clone(),
    }
}
