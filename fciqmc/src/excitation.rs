//! Excitation records and their permutational parity.
//!
//! An [`Excitation`] describes a 1- or 2-electron connection between two
//! determinants. Source and target orbitals are kept in ascending order and
//! paired positionally (`from[k]` → `to[k]`); `perm` records the sign of the
//! permutation that lines this pairing up with the determinants' own orbital
//! ordering, which is exactly the sign entering the Slater–Condon rules.

use crate::bitstring::BitString;
use arrayvec::ArrayVec;

/// A 1- or 2-electron connection between determinants.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Excitation {
    /// Source orbitals, ascending.
    pub from: ArrayVec<usize, 2>,
    /// Target orbitals, ascending.
    pub to: ArrayVec<usize, 2>,
    /// `true` when aligning the orbital orderings costs an odd permutation.
    pub perm: bool,
}

impl Excitation {
    /// Number of electrons moved.
    #[must_use]
    pub fn level(&self) -> usize {
        self.from.len()
    }

    /// The inverse connection. Applying an excitation and then its reverse
    /// restores the original determinant with overall parity `+1`, so the
    /// reverse carries the same `perm`.
    #[must_use]
    pub fn reverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            perm: self.perm,
        }
    }

    /// The sign `(-1)^perm` as a factor.
    #[must_use]
    pub const fn sign(&self) -> f64 {
        if self.perm {
            -1.0
        } else {
            1.0
        }
    }
}

/// Parity of moving one electron `i -> a` through the occupied orbitals of
/// `det`: odd iff an odd number of occupied orbitals lie strictly between.
fn single_parity(det: &BitString, i: usize, a: usize) -> bool {
    let (lo, hi) = if i < a { (i, a) } else { (a, i) };
    det.count_range(lo + 1, hi) % 2 == 1
}

/// Builds the single excitation `i -> a` on `det` and the excited
/// determinant.
///
/// # Panics
///
/// Panics in debug builds if `i` is unoccupied or `a` occupied.
#[must_use]
pub fn excite_single(det: &BitString, i: usize, a: usize) -> (Excitation, BitString) {
    debug_assert!(det.test(i) && !det.test(a));
    let mut from = ArrayVec::new();
    let mut to = ArrayVec::new();
    from.push(i);
    to.push(a);
    let perm = single_parity(det, i, a);
    let mut target = det.clone();
    target.clear(i);
    target.set(a);
    (Excitation { from, to, perm }, target)
}

/// Builds the double excitation `{i, j} -> {a, b}` on `det` and the excited
/// determinant. Orbital pairs are sorted ascending; the parity accounts for
/// the sort and for the electrons crossed while moving.
#[must_use]
pub fn excite_double(
    det: &BitString,
    i: usize,
    j: usize,
    a: usize,
    b: usize,
) -> (Excitation, BitString) {
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    debug_assert!(det.test(i) && det.test(j) && !det.test(a) && !det.test(b));

    let mut from = ArrayVec::new();
    let mut to = ArrayVec::new();
    from.push(i);
    from.push(j);
    to.push(a);
    to.push(b);

    // move the electrons one at a time, tracking the intermediate occupation
    let mut work = det.clone();
    let mut perm = single_parity(&work, i, a);
    work.clear(i);
    work.set(a);
    perm ^= single_parity(&work, j, b);
    work.clear(j);
    work.set(b);

    (Excitation { from, to, perm }, work)
}

/// Applies `exc` to `det` without recomputing parity.
///
/// # Panics
///
/// Panics in debug builds if the excitation does not fit `det`.
#[must_use]
pub fn apply(det: &BitString, exc: &Excitation) -> BitString {
    let mut out = det.clone();
    for &i in &exc.from {
        debug_assert!(out.test(i));
        out.clear(i);
    }
    for &a in &exc.to {
        debug_assert!(!out.test(a));
        out.set(a);
    }
    out
}

/// Recovers the excitation connecting `d1` to `d2`.
///
/// # Panics
///
/// Panics if the determinants differ by more than two electrons; callers
/// check the excitation level first.
#[must_use]
pub fn connection(d1: &BitString, d2: &BitString) -> Excitation {
    let from: ArrayVec<usize, 2> = d1.and_not(d2).iter_ones().collect();
    let to: ArrayVec<usize, 2> = d2.and_not(d1).iter_ones().collect();
    assert_eq!(from.len(), to.len());

    let mut work = d1.clone();
    let mut perm = false;
    for (&i, &a) in from.iter().zip(&to) {
        perm ^= single_parity(&work, i, a);
        work.clear(i);
        work.set(a);
    }
    Excitation { from, to, perm }
}
