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

//! `PredicateList`: an ordered multiset of expressions known to hold on
//! every input row. Stands in for metadata-provider output, which is
//! otherwise opaque to this crate.

use std::sync::Arc;

use crate::expr::{Expr, ExprImpl, ExprType};
use crate::simplify::strong::Strong;

/// Cheaply `Clone`-able (shared `Arc` storage), immutable snapshot.
#[derive(Clone, Debug, Default)]
pub struct PredicateList {
    predicates: Arc<Vec<ExprImpl>>,
}

impl PredicateList {
    pub fn new(predicates: Vec<ExprImpl>) -> Self {
        PredicateList {
            predicates: Arc::new(predicates),
        }
    }

    pub fn empty() -> Self {
        PredicateList::default()
    }

    pub fn pulled_up_predicates(&self) -> impl Iterator<Item = &ExprImpl> {
        self.predicates.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Duplicate-preserving append.
    pub fn union(&self, other: &PredicateList) -> PredicateList {
        let mut v = (*self.predicates).clone();
        v.extend(other.predicates.iter().cloned());
        PredicateList::new(v)
    }

    pub fn with_predicate(&self, e: ExprImpl) -> PredicateList {
        let mut v = (*self.predicates).clone();
        v.push(e);
        PredicateList::new(v)
    }

    /// True iff `e` has non-nullable type, or `IS NOT NULL(e)` is asserted,
    /// or `e` is a deterministic call whose strict structure forces
    /// non-null given what's already known not-null.
    pub fn is_effectively_not_null(&self, e: &ExprImpl) -> bool {
        if !e.return_type().nullable {
            return true;
        }
        if self.asserts_is_not_null(e) {
            return true;
        }
        if let Some(call) = e.as_function_call() {
            if call.deterministic && Strong::policy(e) == crate::simplify::strong::Policy::Any {
                return call
                    .operands
                    .iter()
                    .all(|op| self.is_effectively_not_null(op));
            }
        }
        false
    }

    pub fn asserts_is_not_null(&self, e: &ExprImpl) -> bool {
        self.predicates.iter().any(|p| {
            p.op() == Some(&ExprType::IsNotNull)
                && p.as_function_call().unwrap().operands[0] == *e
        })
    }

    pub fn asserts_is_null(&self, e: &ExprImpl) -> bool {
        self.predicates.iter().any(|p| {
            p.op() == Some(&ExprType::IsNull) && p.as_function_call().unwrap().operands[0] == *e
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExprImpl> {
        self.predicates.iter()
    }
}

#[cfg(test)]
mod tests {
    use relexpr_common::{DataType, TypeKind};

    use super::*;

    fn input_ref(i: usize, nullable: bool) -> ExprImpl {
        ExprImpl::InputRef(crate::expr::InputRef::new(
            i,
            DataType::new(TypeKind::Int32, nullable),
        ))
    }

    #[test]
    fn effectively_not_null_from_type() {
        let p = PredicateList::empty();
        assert!(p.is_effectively_not_null(&input_ref(0, false)));
        assert!(!p.is_effectively_not_null(&input_ref(0, true)));
    }

    #[test]
    fn effectively_not_null_from_predicate() {
        let x = input_ref(0, true);
        let p = PredicateList::new(vec![x.clone().is_not_null()]);
        assert!(p.is_effectively_not_null(&x));
    }

    #[test]
    fn union_is_duplicate_preserving() {
        let a = PredicateList::new(vec![ExprImpl::literal_bool(true)]);
        let b = PredicateList::new(vec![ExprImpl::literal_bool(true)]);
        assert_eq!(a.union(&b).iter().count(), 2);
    }
}
