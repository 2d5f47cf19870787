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

//! Minimal in-crate `TypeFactory`, sufficient for tests; a real engine
//! supplies its own.

use relexpr_common::{DataType, TypeFactory};

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTypeFactory;

impl TypeFactory for DefaultTypeFactory {
    fn least_restrictive(&self, types: &[DataType]) -> Option<DataType> {
        let first = types.first()?;
        let nullable = types.iter().any(|t| t.nullable);
        if types.iter().all(|t| t.kind == first.kind) {
            Some(first.with_nullable(nullable))
        } else {
            None
        }
    }
}
