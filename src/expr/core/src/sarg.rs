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

//! `RangeSet`/`Sarg`/`UnknownAs`: search arguments over a comparable scalar
//! domain, paired with a tri-state policy for how a NULL probe is treated.
//!
//! The comparable domain is fixed to `relexpr_common::ScalarImpl` restricted
//! at runtime to [`relexpr_common::DataType::is_sarg_comparable`] variants:
//! mixing variants within one `RangeSet` is a malformed-input bug, never
//! silently coerced.

use std::cmp::Ordering;

use relexpr_common::ScalarImpl;

/// Tri-state policy describing how a boolean `NULL` is interpreted at the
/// point of use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnknownAs {
    Unknown,
    True,
    False,
}

impl UnknownAs {
    pub fn negate(self) -> Self {
        match self {
            UnknownAs::Unknown => UnknownAs::Unknown,
            UnknownAs::True => UnknownAs::False,
            UnknownAs::False => UnknownAs::True,
        }
    }

    /// Defined only for `True`/`False`. Callers must not invoke this under
    /// `Unknown`.
    pub fn to_boolean(self) -> Option<bool> {
        match self {
            UnknownAs::True => Some(true),
            UnknownAs::False => Some(false),
            UnknownAs::Unknown => None,
        }
    }

    /// Lattice join used while collecting a search argument from a set of
    /// predicates on the same reference: `Unknown` is the bottom element,
    /// `True`/`False` disagreement collapses
    /// to `Unknown` itself treated as "both" contributed — we keep the
    /// stronger (most recently observed) state since the collector only
    /// ever joins a single kind of null contribution (`IS NULL` or
    /// `IS NOT NULL`) per builder in practice; a genuine conflict is
    /// resolved by the caller via `nullAs` on the finished `Sarg`.
    pub fn join(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (UnknownAs::Unknown, x) | (x, UnknownAs::Unknown) => x,
            _ => other,
        }
    }
}

/// A half-open-free endpoint of an interval: either a finite bound (whose
/// inclusivity is tracked separately) or unbounded.
#[derive(Clone, Debug, PartialEq)]
pub enum Bound {
    Unbounded,
    Included(ScalarImpl),
    Excluded(ScalarImpl),
}

impl Bound {
    fn value(&self) -> Option<&ScalarImpl> {
        match self {
            Bound::Included(v) | Bound::Excluded(v) => Some(v),
            Bound::Unbounded => None,
        }
    }
}

/// A single closed/open/half-open interval `(lo, hi)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Range {
    pub lo: Bound,
    pub hi: Bound,
}

impl Range {
    pub fn all() -> Self {
        Range {
            lo: Bound::Unbounded,
            hi: Bound::Unbounded,
        }
    }

    pub fn none() -> Self {
        // An explicitly empty range: represented by a RangeSet with zero
        // ranges, not by a degenerate `Range` value; kept for symmetry in
        // helpers that build then discard empty results.
        Range {
            lo: Bound::Excluded(ScalarImpl::Bool(false)),
            hi: Bound::Excluded(ScalarImpl::Bool(false)),
        }
    }

    pub fn point(v: ScalarImpl) -> Self {
        Range {
            lo: Bound::Included(v.clone()),
            hi: Bound::Included(v),
        }
    }

    pub fn less_than(v: ScalarImpl) -> Self {
        Range {
            lo: Bound::Unbounded,
            hi: Bound::Excluded(v),
        }
    }

    pub fn at_most(v: ScalarImpl) -> Self {
        Range {
            lo: Bound::Unbounded,
            hi: Bound::Included(v),
        }
    }

    pub fn greater_than(v: ScalarImpl) -> Self {
        Range {
            lo: Bound::Excluded(v),
            hi: Bound::Unbounded,
        }
    }

    pub fn at_least(v: ScalarImpl) -> Self {
        Range {
            lo: Bound::Included(v),
            hi: Bound::Unbounded,
        }
    }

    pub fn is_point(&self) -> Option<&ScalarImpl> {
        match (&self.lo, &self.hi) {
            (Bound::Included(a), Bound::Included(b)) if a == b => Some(a),
            _ => None,
        }
    }

    fn contains(&self, v: &ScalarImpl) -> bool {
        let lo_ok = match &self.lo {
            Bound::Unbounded => true,
            Bound::Included(b) => b.partial_cmp(v).map(|o| o != Ordering::Greater).unwrap_or(false),
            Bound::Excluded(b) => b.partial_cmp(v) == Some(Ordering::Less),
        };
        let hi_ok = match &self.hi {
            Bound::Unbounded => true,
            Bound::Included(b) => v.partial_cmp(b).map(|o| o != Ordering::Greater).unwrap_or(false),
            Bound::Excluded(b) => v.partial_cmp(b) == Some(Ordering::Less),
        };
        lo_ok && hi_ok
    }

    /// Intersection, or `None` if disjoint.
    fn intersect(&self, other: &Range) -> Option<Range> {
        let lo = max_bound_lo(&self.lo, &other.lo);
        let hi = min_bound_hi(&self.hi, &other.hi);
        if range_empty(&lo, &hi) {
            None
        } else {
            Some(Range { lo, hi })
        }
    }

    /// Whether `self` immediately abuts or overlaps `other`, i.e. their
    /// union is a single interval (used by `RangeSet::canonicalize`).
    fn touches(&self, other: &Range) -> bool {
        let a_before_b_gap = match (&self.hi, &other.lo) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
            (Bound::Included(a), Bound::Included(b)) => a.partial_cmp(b) == Some(Ordering::Less),
            (Bound::Included(a), Bound::Excluded(b)) => a.partial_cmp(b) == Some(Ordering::Less),
            (Bound::Excluded(a), Bound::Included(b)) => {
                matches!(a.partial_cmp(b), Some(Ordering::Less) | Some(Ordering::Equal))
            }
            (Bound::Excluded(a), Bound::Excluded(b)) => {
                matches!(a.partial_cmp(b), Some(Ordering::Less) | Some(Ordering::Equal))
            }
        };
        !a_before_b_gap
    }
}

fn max_bound_lo(a: &Bound, b: &Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, x) | (x, Bound::Unbounded) => x.clone(),
        _ => {
            let av = a.value().unwrap();
            let bv = b.value().unwrap();
            match av.partial_cmp(bv) {
                Some(Ordering::Greater) => a.clone(),
                Some(Ordering::Less) => b.clone(),
                _ => {
                    // equal values: Excluded wins (tighter)
                    if matches!(a, Bound::Excluded(_)) {
                        a.clone()
                    } else {
                        b.clone()
                    }
                }
            }
        }
    }
}

fn min_bound_hi(a: &Bound, b: &Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, x) | (x, Bound::Unbounded) => x.clone(),
        _ => {
            let av = a.value().unwrap();
            let bv = b.value().unwrap();
            match av.partial_cmp(bv) {
                Some(Ordering::Less) => a.clone(),
                Some(Ordering::Greater) => b.clone(),
                _ => {
                    if matches!(a, Bound::Excluded(_)) {
                        a.clone()
                    } else {
                        b.clone()
                    }
                }
            }
        }
    }
}

fn range_empty(lo: &Bound, hi: &Bound) -> bool {
    match (lo, hi) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
        _ => {
            let lv = lo.value().unwrap();
            let hv = hi.value().unwrap();
            match lv.partial_cmp(hv) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => {
                    !matches!((lo, hi), (Bound::Included(_), Bound::Included(_)))
                }
                _ => false,
            }
        }
    }
}

/// A disjoint, sorted union of [`Range`]s, kept in canonical form.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct RangeSet {
    ranges: Vec<Range>,
}

impl RangeSet {
    pub fn empty() -> Self {
        RangeSet { ranges: vec![] }
    }

    pub fn all() -> Self {
        RangeSet {
            ranges: vec![Range::all()],
        }
    }

    pub fn single(r: Range) -> Self {
        let mut s = RangeSet::empty();
        s.add(r);
        s
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_all(&self) -> bool {
        self.ranges.len() == 1 && matches!(self.ranges[0], Range {
            lo: Bound::Unbounded,
            hi: Bound::Unbounded,
        })
    }

    /// Merges `r` into the set, coalescing with any touching/overlapping
    /// range and re-sorting so the set stays a disjoint union of intervals
    /// in canonical form.
    pub fn add(&mut self, r: Range) {
        self.ranges.push(r);
        self.canonicalize();
    }

    pub fn union(&self, other: &RangeSet) -> RangeSet {
        let mut out = self.clone();
        for r in &other.ranges {
            out.ranges.push(r.clone());
        }
        out.canonicalize();
        out
    }

    pub fn intersect(&self, other: &RangeSet) -> RangeSet {
        let mut out = vec![];
        for a in &self.ranges {
            for b in &other.ranges {
                if let Some(r) = a.intersect(b) {
                    out.push(r);
                }
            }
        }
        let mut s = RangeSet { ranges: out };
        s.canonicalize();
        s
    }

    pub fn complement(&self) -> RangeSet {
        if self.ranges.is_empty() {
            return RangeSet::all();
        }
        let mut out = vec![];
        let mut prev_hi: Bound = Bound::Unbounded;
        let mut have_prev = false;
        for r in &self.ranges {
            let lo = invert_hi_to_lo(&prev_hi, have_prev);
            if let Some(lo) = lo {
                let hi = invert_lo_to_hi(&r.lo);
                if !range_empty(&lo, &hi) {
                    out.push(Range { lo, hi });
                }
            }
            prev_hi = r.hi.clone();
            have_prev = true;
        }
        if have_prev {
            if let Some(lo) = invert_hi_to_lo(&prev_hi, true) {
                out.push(Range {
                    lo,
                    hi: Bound::Unbounded,
                });
            }
        }
        RangeSet { ranges: out }
    }

    pub fn contains(&self, v: &ScalarImpl) -> bool {
        self.ranges.iter().any(|r| r.contains(v))
    }

    /// Total endpoint count, used by `Sarg::complexity`.
    pub fn endpoint_count(&self) -> usize {
        self.ranges
            .iter()
            .map(|r| {
                (!matches!(r.lo, Bound::Unbounded)) as usize
                    + (!matches!(r.hi, Bound::Unbounded)) as usize
            })
            .sum()
    }

    /// All ranges are single points.
    pub fn is_points(&self) -> bool {
        !self.ranges.is_empty() && self.ranges.iter().all(|r| r.is_point().is_some())
    }

    pub fn points(&self) -> Option<Vec<ScalarImpl>> {
        if self.is_points() {
            Some(self.ranges.iter().map(|r| r.is_point().unwrap().clone()).collect())
        } else {
            None
        }
    }

    fn canonicalize(&mut self) {
        self.ranges
            .sort_by(|a, b| compare_bound_lo(&a.lo, &b.lo));
        let mut merged: Vec<Range> = vec![];
        for r in self.ranges.drain(..) {
            if let Some(last) = merged.last_mut() {
                if last.touches(&r) || last.intersect(&r).is_some() {
                    last.hi = min_bound_hi_for_union(&last.hi, &r.hi);
                    last.lo = max_bound_lo_for_union(&last.lo, &r.lo);
                    continue;
                }
            }
            merged.push(r);
        }
        self.ranges = merged;
    }
}

fn compare_bound_lo(a: &Bound, b: &Bound) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Less,
        (_, Bound::Unbounded) => Ordering::Greater,
        _ => {
            let av = a.value().unwrap();
            let bv = b.value().unwrap();
            av.partial_cmp(bv).unwrap_or(Ordering::Equal)
        }
    }
}

fn max_bound_lo_for_union(a: &Bound, b: &Bound) -> Bound {
    // For a union merge we want the *looser* (smaller) lower bound.
    match compare_bound_lo(a, b) {
        Ordering::Less | Ordering::Equal => a.clone(),
        Ordering::Greater => b.clone(),
    }
}

fn min_bound_hi_for_union(a: &Bound, b: &Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => Bound::Unbounded,
        _ => {
            let av = a.value().unwrap();
            let bv = b.value().unwrap();
            match av.partial_cmp(bv) {
                Some(Ordering::Greater) => a.clone(),
                Some(Ordering::Less) => b.clone(),
                _ => {
                    if matches!(a, Bound::Included(_)) {
                        a.clone()
                    } else {
                        b.clone()
                    }
                }
            }
        }
    }
}

fn invert_lo_to_hi(lo: &Bound) -> Bound {
    match lo {
        Bound::Unbounded => Bound::Unbounded,
        Bound::Included(v) => Bound::Excluded(v.clone()),
        Bound::Excluded(v) => Bound::Included(v.clone()),
    }
}

fn invert_hi_to_lo(hi: &Bound, have_prev: bool) -> Option<Bound> {
    if !have_prev {
        return Some(Bound::Unbounded);
    }
    match hi {
        Bound::Unbounded => None,
        Bound::Included(v) => Some(Bound::Excluded(v.clone())),
        Bound::Excluded(v) => Some(Bound::Included(v.clone())),
    }
}

/// A search argument: a `RangeSet` plus an independent null classification.
#[derive(Clone, Debug, PartialEq)]
pub struct Sarg {
    pub range_set: RangeSet,
    pub null_as: UnknownAs,
}

impl Sarg {
    pub fn new(range_set: RangeSet, null_as: UnknownAs) -> Self {
        Sarg { range_set, null_as }
    }

    pub fn complement(&self) -> Self {
        Sarg {
            range_set: self.range_set.complement(),
            null_as: self.null_as,
        }
    }

    /// Complements the ranges *and* flips `null_as`.
    pub fn negate(&self) -> Self {
        let null_as = match self.null_as {
            UnknownAs::True => UnknownAs::False,
            UnknownAs::False => UnknownAs::True,
            UnknownAs::Unknown => UnknownAs::Unknown,
        };
        Sarg {
            range_set: self.range_set.complement(),
            null_as,
        }
    }

    pub fn is_points(&self) -> bool {
        self.range_set.is_points()
    }

    pub fn is_complemented_points(&self) -> bool {
        self.range_set.complement().is_points()
    }

    pub fn is_all(&self) -> bool {
        self.range_set.is_all() && self.null_as == UnknownAs::True
    }

    pub fn is_none(&self) -> bool {
        self.range_set.is_empty() && self.null_as != UnknownAs::True
    }

    /// Endpoint count plus one if `null_as != False`.
    pub fn complexity(&self) -> usize {
        self.range_set.endpoint_count() + (self.null_as != UnknownAs::False) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i(v: i32) -> ScalarImpl {
        ScalarImpl::Int32(v)
    }

    #[test]
    fn range_set_merges_overlaps() {
        let mut rs = RangeSet::empty();
        rs.add(Range::at_least(i(5)));
        rs.add(Range::at_most(i(10)));
        assert!(rs.is_all());
    }

    #[test]
    fn range_set_intersection() {
        let a = RangeSet::single(Range::at_least(i(5)));
        let b = RangeSet::single(Range::at_most(i(10)));
        let got = a.intersect(&b);
        assert_eq!(got.ranges().len(), 1);
        assert!(got.contains(&i(7)));
        assert!(!got.contains(&i(11)));
    }

    #[test]
    fn complement_of_point_is_two_rays() {
        let rs = RangeSet::single(Range::point(i(5)));
        let comp = rs.complement();
        assert!(!comp.contains(&i(5)));
        assert!(comp.contains(&i(4)));
        assert!(comp.contains(&i(6)));
    }

    #[test]
    fn sarg_negate_flips_null_as() {
        let s = Sarg::new(RangeSet::single(Range::point(i(1))), UnknownAs::False);
        let n = s.negate();
        assert_eq!(n.null_as, UnknownAs::True);
        assert!(!n.range_set.contains(&i(1)));
    }

    #[test]
    fn complexity_counts_endpoints_and_null() {
        let s = Sarg::new(RangeSet::single(Range::point(i(1))), UnknownAs::False);
        assert_eq!(s.complexity(), 2);
        let s2 = Sarg::new(RangeSet::single(Range::point(i(1))), UnknownAs::True);
        assert_eq!(s2.complexity(), 3);
    }
}
