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

//! `relexpr`: a typed scalar expression tree and a 3VL-aware algebraic
//! simplifier for it. Everything outside of `expr`/`sarg` is a consumed,
//! black-box collaborator (`builder`, `executor`, `coercion`,
//! `type_factory`) or the simplifier itself (`simplify`).

pub mod builder;
pub mod coercion;
pub mod error;
pub mod eval;
pub mod executor;
pub mod expr;
pub mod sarg;
pub mod simplify;
pub mod type_factory;

pub use error::{ExprError, Result};
pub use expr::{Expr, ExprImpl, ExprType};
pub use sarg::UnknownAs;
pub use simplify::Simplifier;

static_assertions::assert_impl_all!(ExprImpl: Send, Sync, Clone);
static_assertions::assert_impl_all!(sarg::Sarg: Send, Sync, Clone);
