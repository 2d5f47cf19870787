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

//! The immutable typed scalar expression tree.
//!
//! `ExprImpl` is a plain owned tagged variant, not an arena-interned DAG:
//! rewrites that preserve identity on a no-op are implemented by
//! structural-equality comparison rather than pointer comparison, and rule
//! implementations are free to clone.

use enum_as_inner::EnumAsInner;
use relexpr_common::{DataType, Datum, ScalarImpl, TimeUnit, TypeKind};

use crate::sarg::Sarg;

/// A closed enum of operator shapes, used for dispatch over operator kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExprType {
    And,
    Or,
    Not,
    Case,
    Coalesce,
    Cast,
    SafeCast,
    IsNull,
    IsNotNull,
    IsTrue,
    IsNotTrue,
    IsFalse,
    IsNotFalse,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    IsDistinctFrom,
    IsNotDistinctFrom,
    Search,
    Like,
    In,
    NotIn,
    Between,
    Plus,
    Minus,
    Times,
    Divide,
    CheckedPlus,
    CheckedMinus,
    CheckedTimes,
    CheckedDivide,
    PlusPrefix,
    MinusPrefix,
    Ceil,
    Floor,
    Trim,
    Ltrim,
    Rtrim,
    Mod,
    /// Measure-to-value / value-to-measure lifting.
    M2v,
    V2m,
    /// Anything this simplifier does not special-case: an opaque,
    /// presumed-deterministic-unless-flagged function call. Dispatch falls
    /// through to `simplify_generic_node`.
    Other(Box<str>),
}

impl ExprType {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            ExprType::Equals
                | ExprType::NotEquals
                | ExprType::LessThan
                | ExprType::LessThanOrEqual
                | ExprType::GreaterThan
                | ExprType::GreaterThanOrEqual
                | ExprType::IsDistinctFrom
                | ExprType::IsNotDistinctFrom
        )
    }

    pub fn is_checked(&self) -> bool {
        matches!(
            self,
            ExprType::CheckedPlus
                | ExprType::CheckedMinus
                | ExprType::CheckedTimes
                | ExprType::CheckedDivide
        )
    }

    /// Strips the `Checked*` flag, if any, yielding the base arithmetic kind
    /// used to look up identities. Applies equally to the `Checked*`
    /// variants.
    pub fn arithmetic_base(&self) -> Option<ExprType> {
        match self {
            ExprType::Plus | ExprType::CheckedPlus => Some(ExprType::Plus),
            ExprType::Minus | ExprType::CheckedMinus => Some(ExprType::Minus),
            ExprType::Times | ExprType::CheckedTimes => Some(ExprType::Times),
            ExprType::Divide | ExprType::CheckedDivide => Some(ExprType::Divide),
            _ => None,
        }
    }

    /// The kind of `NOT (x op y)` when a null-safe negation exists: swapping
    /// to this kind preserves the original's truth table under NULL exactly,
    /// unlike a bare logical complement. `IN`/`NOT_IN` deliberately return
    /// `None` — negating those safely needs more than a kind swap.
    pub fn negate_null_safe(&self) -> Option<ExprType> {
        match self {
            ExprType::Equals => Some(ExprType::NotEquals),
            ExprType::NotEquals => Some(ExprType::Equals),
            ExprType::LessThan => Some(ExprType::GreaterThanOrEqual),
            ExprType::LessThanOrEqual => Some(ExprType::GreaterThan),
            ExprType::GreaterThan => Some(ExprType::LessThanOrEqual),
            ExprType::GreaterThanOrEqual => Some(ExprType::LessThan),
            ExprType::IsDistinctFrom => Some(ExprType::IsNotDistinctFrom),
            ExprType::IsNotDistinctFrom => Some(ExprType::IsDistinctFrom),
            ExprType::IsNull => Some(ExprType::IsNotNull),
            ExprType::IsNotNull => Some(ExprType::IsNull),
            ExprType::IsTrue => Some(ExprType::IsNotTrue),
            ExprType::IsNotTrue => Some(ExprType::IsTrue),
            ExprType::IsFalse => Some(ExprType::IsNotFalse),
            ExprType::IsNotFalse => Some(ExprType::IsFalse),
            _ => None,
        }
    }

    /// 3VL negation: flips the truth table without requiring a null-safe
    /// rewrite (used when `negate_null_safe` is unavailable). Comparisons
    /// negate to their *logical* complement, which under NULL differs from
    /// `negate_null_safe`'s swap only via `NOT`.
    pub fn logical_negate(&self) -> Option<ExprType> {
        self.negate_null_safe()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Literal {
    pub value: Datum,
    pub return_type: DataType,
}

impl Literal {
    pub fn new(value: Datum, return_type: DataType) -> Self {
        Literal { value, return_type }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InputRef {
    pub index: usize,
    pub return_type: DataType,
}

impl InputRef {
    pub fn new(index: usize, return_type: DataType) -> Self {
        InputRef { index, return_type }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldAccess {
    pub parent: Box<ExprImpl>,
    pub field_index: usize,
    pub return_type: DataType,
}

/// Kind-specific payload that does not fit the `(op, operands)` shape.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprExtra {
    /// Time-unit flag for `CEIL`/`FLOOR`.
    TimeUnit(TimeUnit),
    /// The packaged search argument of a `SEARCH` call; the sole operand is
    /// the reference being searched.
    Sarg(Sarg),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub op: ExprType,
    pub operands: Vec<ExprImpl>,
    pub return_type: DataType,
    /// Non-deterministic calls (e.g. `RANDOM()`) are never "safe" and are
    /// never duplicated by boolean rewrites.
    pub deterministic: bool,
    /// Marks an aggregate function call (`SUM`, `COUNT`, ...), as opposed to
    /// a plain scalar `Other(_)` call. Consulted only by the `M2V(V2M(x))`
    /// rewrite, which must single-row-window-wrap aggregates found inside
    /// `x`.
    pub is_aggregate: bool,
    pub extra: Option<ExprExtra>,
}

impl FunctionCall {
    pub fn new(op: ExprType, operands: Vec<ExprImpl>, return_type: DataType) -> Self {
        FunctionCall {
            op,
            operands,
            return_type,
            deterministic: true,
            is_aggregate: false,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: ExprExtra) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn non_deterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    pub fn aggregate(mut self) -> Self {
        self.is_aggregate = true;
        self
    }

    pub fn time_unit(&self) -> Option<TimeUnit> {
        match &self.extra {
            Some(ExprExtra::TimeUnit(u)) => Some(*u),
            _ => None,
        }
    }

    pub fn sarg(&self) -> Option<&Sarg> {
        match &self.extra {
            Some(ExprExtra::Sarg(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WindowFrame {
    /// `OVER (ROWS CURRENT ROW)`, used by the M2V/V2M rewrite of a
    /// measure-wrapped aggregate.
    RowsCurrentRow,
    Unbounded,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Window {
    pub partition_by: Vec<ExprImpl>,
    pub order_by: Vec<ExprImpl>,
    pub frame: WindowFrame,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Over {
    pub call: Box<FunctionCall>,
    pub window: Window,
    pub return_type: DataType,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, EnumAsInner)]
pub enum UnsupportedKind {
    SubQuery,
    DynamicParam,
    Lambda,
    CorrelatedInputRef,
}

/// Catch-all for constructs the simplifier treats opaquely: subqueries,
/// dynamic parameters, lambdas, and correlated input references carry a
/// type but no internal structure the rewriter may inspect.
#[derive(Clone, Debug, PartialEq)]
pub struct Unsupported {
    pub kind: UnsupportedKind,
    pub return_type: DataType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprImpl {
    Literal(Literal),
    InputRef(InputRef),
    FieldAccess(FieldAccess),
    FunctionCall(FunctionCall),
    Over(Over),
    Unsupported(Unsupported),
}

pub trait Expr {
    fn return_type(&self) -> DataType;

    /// Non-deterministic or otherwise side-effecting nodes (window
    /// aggregates, opaque constructs) are never deterministic.
    fn is_deterministic(&self) -> bool;
}

impl Expr for ExprImpl {
    fn return_type(&self) -> DataType {
        match self {
            ExprImpl::Literal(l) => l.return_type.clone(),
            ExprImpl::InputRef(r) => r.return_type.clone(),
            ExprImpl::FieldAccess(f) => f.return_type.clone(),
            ExprImpl::FunctionCall(c) => c.return_type.clone(),
            ExprImpl::Over(o) => o.return_type.clone(),
            ExprImpl::Unsupported(u) => u.return_type.clone(),
        }
    }

    fn is_deterministic(&self) -> bool {
        match self {
            ExprImpl::Literal(_) | ExprImpl::InputRef(_) => true,
            ExprImpl::FieldAccess(f) => f.parent.is_deterministic(),
            ExprImpl::FunctionCall(c) => {
                c.deterministic && c.operands.iter().all(Expr::is_deterministic)
            }
            ExprImpl::Over(_) | ExprImpl::Unsupported(_) => false,
        }
    }
}

impl ExprImpl {
    pub fn literal_bool(b: bool) -> Self {
        ExprImpl::Literal(Literal::new(
            Some(ScalarImpl::Bool(b)),
            DataType::not_null(TypeKind::Boolean),
        ))
    }

    pub fn null_literal(ty: DataType) -> Self {
        ExprImpl::Literal(Literal::new(None, ty.with_nullable(true)))
    }

    pub fn literal(value: ScalarImpl, ty: DataType) -> Self {
        ExprImpl::Literal(Literal::new(Some(value), ty))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, ExprImpl::Literal(_))
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            ExprImpl::Literal(l) => Some(l),
            _ => None,
        }
    }

    /// `None` for a non-literal; `Some(None)` for a literal `NULL`;
    /// `Some(Some(v))` for a concrete constant.
    pub fn as_const_datum(&self) -> Option<&Datum> {
        self.as_literal().map(|l| &l.value)
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.as_const_datum(), Some(None))
    }

    pub fn as_bool_literal(&self) -> Option<bool> {
        match self.as_const_datum() {
            Some(Some(ScalarImpl::Bool(b))) => Some(*b),
            _ => None,
        }
    }

    pub fn is_always_true(&self) -> bool {
        self.as_bool_literal() == Some(true)
    }

    pub fn is_always_false(&self) -> bool {
        self.as_bool_literal() == Some(false)
    }

    pub fn is_input_ref(&self) -> bool {
        matches!(self, ExprImpl::InputRef(_))
    }

    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            ExprImpl::FunctionCall(c) => Some(c),
            _ => None,
        }
    }

    pub fn op(&self) -> Option<&ExprType> {
        self.as_function_call().map(|c| &c.op)
    }

    pub fn is_op(&self, op: &ExprType) -> bool {
        self.op() == Some(op)
    }

    pub fn call(op: ExprType, operands: Vec<ExprImpl>, return_type: DataType) -> Self {
        ExprImpl::FunctionCall(FunctionCall::new(op, operands, return_type))
    }

    pub fn not(self) -> Self {
        let ty = self.return_type().with_nullable(self.return_type().nullable);
        ExprImpl::call(ExprType::Not, vec![self], ty)
    }

    pub fn and(a: Self, b: Self) -> Self {
        let nullable = a.return_type().nullable || b.return_type().nullable;
        ExprImpl::call(
            ExprType::And,
            vec![a, b],
            DataType::new(TypeKind::Boolean, nullable),
        )
    }

    pub fn or(a: Self, b: Self) -> Self {
        let nullable = a.return_type().nullable || b.return_type().nullable;
        ExprImpl::call(
            ExprType::Or,
            vec![a, b],
            DataType::new(TypeKind::Boolean, nullable),
        )
    }

    pub fn conjunction(terms: Vec<ExprImpl>) -> Self {
        let mut iter = terms.into_iter();
        let Some(mut acc) = iter.next() else {
            return ExprImpl::literal_bool(true);
        };
        for t in iter {
            acc = ExprImpl::and(acc, t);
        }
        acc
    }

    pub fn disjunction(terms: Vec<ExprImpl>) -> Self {
        let mut iter = terms.into_iter();
        let Some(mut acc) = iter.next() else {
            return ExprImpl::literal_bool(false);
        };
        for t in iter {
            acc = ExprImpl::or(acc, t);
        }
        acc
    }

    pub fn is_null(self) -> Self {
        ExprImpl::call(ExprType::IsNull, vec![self], DataType::not_null(TypeKind::Boolean))
    }

    pub fn is_not_null(self) -> Self {
        ExprImpl::call(
            ExprType::IsNotNull,
            vec![self],
            DataType::not_null(TypeKind::Boolean),
        )
    }
}
