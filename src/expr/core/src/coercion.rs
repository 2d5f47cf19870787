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

//! The type-coercion rule-set consumed as a black box. Used by the
//! CAST-collapsing rules to decide whether stripping or reordering nested
//! casts is lossless.

use relexpr_common::{DataType, TypeKind};

pub trait TypeCoercionRule {
    /// Whether a value of type `src` can be implicitly widened to `dst`
    /// without loss.
    fn can_apply_from(&self, src: &DataType, dst: &DataType) -> bool;
}

/// A conservative default: numeric widening within the same family, and any
/// type to itself (modulo nullability), are lossless; everything else
/// (including all `DECIMAL` involvement — a cast targeting `DECIMAL` is
/// never treated as a no-op) requires an explicit cast.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTypeCoercion;

impl TypeCoercionRule for DefaultTypeCoercion {
    fn can_apply_from(&self, src: &DataType, dst: &DataType) -> bool {
        if src.kind == dst.kind {
            return true;
        }
        use TypeKind::*;
        matches!(
            (&src.kind, &dst.kind),
            (Int16, Int32) | (Int16, Int64) | (Int32, Int64) | (Float32, Float64)
        )
    }
}

/// A cast is lossless — its source type embeds injectively into the target
/// type — when it is a narrowing-of-nullability-only cast, or a widening
/// coercion per `TypeCoercionRule`, and the target is not `DECIMAL`.
/// `DECIMAL` is never treated as a no-op target even when kinds match,
/// because decimal precision/scale are folded into `TypeKind::Decimal`
/// uniformly here and therefore cannot be compared for losslessness from
/// the kind alone.
pub fn is_lossless_cast(src: &DataType, dst: &DataType, coercion: &dyn TypeCoercionRule) -> bool {
    if dst.is_decimal() {
        return false;
    }
    src.equal_sans_nullability(dst) || coercion.can_apply_from(src, dst)
}
