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

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use enum_as_inner::EnumAsInner;
use ordered_float::OrderedFloat;
use rust_decimal::Decimal;

/// A time-granularity flag used by `CEIL`/`FLOOR` and friends. Ordered from
/// coarsest to finest so that roll-up checks are a plain `<` comparison,
/// with `Quarter` handled as a special case (it only rolls up to `Year`,
/// never to `Month`/`Day`/...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeUnit {
    Year,
    Quarter,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Milli,
    Micro,
}

impl TimeUnit {
    /// True if a `CEIL`/`FLOOR` at `outer` can subsume one already applied at
    /// `inner`.
    pub fn rolls_up_from(self, inner: TimeUnit) -> bool {
        if inner == TimeUnit::Quarter {
            return self == TimeUnit::Year;
        }
        self <= inner
    }
}

/// The nominal SQL type of an expression, plus its nullability.
///
/// A kind tag plus a nullability flag, nothing more. Struct/list element
/// types are boxed to keep `DataType` `Copy`-free but cheaply `Clone`-able.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DataType {
    pub kind: TypeKind,
    pub nullable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, EnumAsInner)]
pub enum TypeKind {
    Boolean,
    Int16,
    Int32,
    Int64,
    Decimal,
    Float32,
    Float64,
    Varchar,
    Bytea,
    Date,
    Time,
    Timestamp,
    Timestamptz,
    Interval,
    Jsonb,
    Struct(Vec<(String, DataType)>),
    List(Box<DataType>),
}

impl DataType {
    pub fn new(kind: TypeKind, nullable: bool) -> Self {
        DataType { kind, nullable }
    }

    pub fn not_null(kind: TypeKind) -> Self {
        DataType::new(kind, false)
    }

    pub fn nullable(kind: TypeKind) -> Self {
        DataType::new(kind, true)
    }

    pub fn boolean() -> Self {
        DataType::nullable(TypeKind::Boolean)
    }

    pub fn with_nullable(&self, nullable: bool) -> Self {
        DataType::new(self.kind.clone(), nullable)
    }

    /// Same kind as `other`, ignoring nullability — used throughout the
    /// simplifier to decide whether two literals/refs are comparable
    /// without a cast.
    pub fn equal_sans_nullability(&self, other: &DataType) -> bool {
        self.kind == other.kind
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.kind, TypeKind::Boolean)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Int16
                | TypeKind::Int32
                | TypeKind::Int64
                | TypeKind::Decimal
                | TypeKind::Float32
                | TypeKind::Float64
        )
    }

    pub fn is_decimal(&self) -> bool {
        matches!(self.kind, TypeKind::Decimal)
    }

    /// Totally-orderable scalar domain, i.e. usable as the comparable type
    /// `C` of a `Sarg<C>`. Struct/list/jsonb are excluded.
    pub fn is_sarg_comparable(&self) -> bool {
        if self.kind.is_struct() || self.kind.is_list() {
            return false;
        }
        matches!(
            self.kind,
            TypeKind::Int16
                | TypeKind::Int32
                | TypeKind::Int64
                | TypeKind::Decimal
                | TypeKind::Float32
                | TypeKind::Float64
                | TypeKind::Varchar
                | TypeKind::Date
                | TypeKind::Time
                | TypeKind::Timestamp
                | TypeKind::Timestamptz
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if self.nullable {
            write!(f, " NULL")
        } else {
            write!(f, " NOT NULL")
        }
    }
}

/// A concrete scalar value (never the SQL `NULL` sentinel — see [`Datum`]).
#[derive(Clone, Debug)]
pub enum ScalarImpl {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Decimal(Decimal),
    Float32(OrderedFloat<f32>),
    Float64(OrderedFloat<f64>),
    Utf8(Box<str>),
    Bytea(Box<[u8]>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Timestamptz(i64),
    Struct(Vec<Datum>),
    List(Vec<Datum>),
}

/// `None` is the SQL `NULL` sentinel.
pub type Datum = Option<ScalarImpl>;
pub type DatumRef<'a> = Option<&'a ScalarImpl>;

impl PartialEq for ScalarImpl {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl ScalarImpl {
    /// Same-variant comparison; cross-variant or non-ordered-variant pairs
    /// return `None`. The range/sarg engine only ever compares values
    /// collected for a single reference, which are always the same variant
    /// once the collector has unified types (see `relexpr::sarg::RangeSet`),
    /// so `None` there indicates a genuine malformed input rather than a
    /// type error to paper over.
    pub fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use ScalarImpl::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Int16(a), Int16(b)) => a.partial_cmp(b),
            (Int32(a), Int32(b)) => a.partial_cmp(b),
            (Int64(a), Int64(b)) => a.partial_cmp(b),
            (Decimal(a), Decimal(b)) => a.partial_cmp(b),
            (Float32(a), Float32(b)) => a.partial_cmp(b),
            (Float64(a), Float64(b)) => a.partial_cmp(b),
            (Utf8(a), Utf8(b)) => a.partial_cmp(b),
            (Bytea(a), Bytea(b)) => a.partial_cmp(b),
            (Date(a), Date(b)) => a.partial_cmp(b),
            (Time(a), Time(b)) => a.partial_cmp(b),
            (Timestamp(a), Timestamp(b)) => a.partial_cmp(b),
            (Timestamptz(a), Timestamptz(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarImpl::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn type_kind(&self) -> TypeKind {
        match self {
            ScalarImpl::Bool(_) => TypeKind::Boolean,
            ScalarImpl::Int16(_) => TypeKind::Int16,
            ScalarImpl::Int32(_) => TypeKind::Int32,
            ScalarImpl::Int64(_) => TypeKind::Int64,
            ScalarImpl::Decimal(_) => TypeKind::Decimal,
            ScalarImpl::Float32(_) => TypeKind::Float32,
            ScalarImpl::Float64(_) => TypeKind::Float64,
            ScalarImpl::Utf8(_) => TypeKind::Varchar,
            ScalarImpl::Bytea(_) => TypeKind::Bytea,
            ScalarImpl::Date(_) => TypeKind::Date,
            ScalarImpl::Time(_) => TypeKind::Time,
            ScalarImpl::Timestamp(_) => TypeKind::Timestamp,
            ScalarImpl::Timestamptz(_) => TypeKind::Timestamptz,
            ScalarImpl::Struct(_) => TypeKind::Struct(vec![]),
            ScalarImpl::List(_) => TypeKind::List(Box::new(DataType::nullable(TypeKind::Boolean))),
        }
    }
}

impl fmt::Display for ScalarImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarImpl::Bool(b) => write!(f, "{b}"),
            ScalarImpl::Int16(v) => write!(f, "{v}"),
            ScalarImpl::Int32(v) => write!(f, "{v}"),
            ScalarImpl::Int64(v) => write!(f, "{v}"),
            ScalarImpl::Decimal(v) => write!(f, "{v}"),
            ScalarImpl::Float32(v) => write!(f, "{v}"),
            ScalarImpl::Float64(v) => write!(f, "{v}"),
            ScalarImpl::Utf8(v) => write!(f, "'{v}'"),
            ScalarImpl::Bytea(_) => write!(f, "<bytea>"),
            ScalarImpl::Date(v) => write!(f, "{v}"),
            ScalarImpl::Time(v) => write!(f, "{v}"),
            ScalarImpl::Timestamp(v) => write!(f, "{v}"),
            ScalarImpl::Timestamptz(v) => write!(f, "{v}"),
            ScalarImpl::Struct(_) => write!(f, "<struct>"),
            ScalarImpl::List(_) => write!(f, "<list>"),
        }
    }
}

/// Raised when a would-be comparison or cast crosses incompatible type
/// families; see `DESIGN.md` Open Question 1.
#[derive(Debug, Clone, thiserror::Error)]
#[error("type mismatch: cannot relate {0} and {1}")]
pub struct TypeMismatch(pub String, pub String);

/// Consumed, never implemented here: the surrounding engine's type system.
/// A minimal in-crate implementation (`DefaultTypeFactory`) is provided in
/// `relexpr` for tests.
pub trait TypeFactory {
    fn least_restrictive(&self, types: &[DataType]) -> Option<DataType>;
    fn make_nullable(&self, ty: &DataType) -> DataType {
        ty.with_nullable(true)
    }
    fn equal_sans_nullability(&self, a: &DataType, b: &DataType) -> bool {
        a.equal_sans_nullability(b)
    }
}
