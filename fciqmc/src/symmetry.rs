//! Abelian symmetry product tables.
//!
//! Both symmetry families the engine handles are Abelian: molecular point
//! groups (D2h and its subgroups, product = XOR of irrep labels) and the
//! crystal-momentum group of a lattice supercell (product = wavevector
//! addition modulo the cell). Either is captured by a dense product table
//! plus an inverse-element lookup.

use crate::error::{Error, Result};
use crate::lattice::LatticeSpec;
use ndarray::Array2;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Multiplication table of a finite Abelian symmetry group.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SymTable {
    nsym: usize,
    table: Array2<usize>,
    inv: Vec<usize>,
}

impl SymTable {
    /// Table for a group where the product is the XOR of the labels, as for
    /// the real irreps of D2h and its subgroups. Every element is its own
    /// inverse.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless `nsym` is a power of two.
    pub fn xor_group(nsym: usize) -> Result<Self> {
        if nsym == 0 || !nsym.is_power_of_two() {
            return Err(Error::Config(format!(
                "XOR symmetry group needs a power-of-two order, got {nsym}"
            )));
        }
        let table = Array2::from_shape_fn((nsym, nsym), |(i, j)| i ^ j);
        let inv = (0..nsym).collect();
        Ok(Self { nsym, table, inv })
    }

    /// Table for crystal momentum on an axis-aligned supercell with
    /// `lengths[d]` sites along each dimension. Wavevectors are indexed in
    /// mixed radix with dimension 0 fastest, matching the lattice site
    /// enumeration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty or zero-length dimension
    /// list.
    pub fn translation_group(lengths: &[usize]) -> Result<Self> {
        if lengths.is_empty() || lengths.iter().any(|&l| l == 0) {
            return Err(Error::Config(
                "translation group needs at least one non-zero dimension".into(),
            ));
        }
        let nsym = lengths.iter().product();

        let decode = |mut index: usize| -> Vec<usize> {
            lengths
                .iter()
                .map(|&l| {
                    let c = index % l;
                    index /= l;
                    c
                })
                .collect()
        };
        let encode = |k: &[usize]| -> usize {
            k.iter()
                .zip(lengths)
                .rev()
                .fold(0, |acc, (&c, &l)| acc * l + c)
        };

        let table = Array2::from_shape_fn((nsym, nsym), |(i, j)| {
            let ki = decode(i);
            let kj = decode(j);
            let sum: Vec<usize> = ki
                .iter()
                .zip(&kj)
                .zip(lengths)
                .map(|((&a, &b), &l)| (a + b) % l)
                .collect();
            encode(&sum)
        });
        let inv = (0..nsym)
            .map(|i| {
                let k = decode(i);
                let neg: Vec<usize> = k.iter().zip(lengths).map(|(&c, &l)| (l - c) % l).collect();
                encode(&neg)
            })
            .collect();

        Ok(Self { nsym, table, inv })
    }

    /// Group order.
    #[must_use]
    pub const fn nsym(&self) -> usize {
        self.nsym
    }

    /// Product of two elements.
    #[must_use]
    pub fn product(&self, a: usize, b: usize) -> usize {
        self.table[[a, b]]
    }

    /// Inverse element.
    #[must_use]
    pub fn inverse(&self, a: usize) -> usize {
        self.inv[a]
    }
}

/// Enumerates the distinct translation vectors mapping the supercell onto
/// itself: singles, pairs and triples of unit steps along the cell axes,
/// reduced into the cell and explicitly deduplicated (the identity appears
/// exactly once, first).
///
/// # Errors
///
/// Returns a configuration error if a lattice vector is not axis-aligned.
// TODO: tilted supercells need a Smith-normal-form reduction instead of the
// per-axis modulus.
pub fn translational_symmetry_vecs(spec: &LatticeSpec) -> Result<Vec<[i64; 3]>> {
    let mut lengths = [1_i64; 3];
    for v in &spec.vectors {
        let nonzero: Vec<usize> = (0..3).filter(|&c| v[c] != 0).collect();
        if nonzero.len() != 1 {
            return Err(Error::Config(
                "translational symmetry vectors require an axis-aligned supercell".into(),
            ));
        }
        lengths[nonzero[0]] = v[nonzero[0]].abs();
    }

    let steps: Vec<[i64; 3]> = (0..spec.dims)
        .map(|d| {
            let mut s = [0_i64; 3];
            s[d] = 1;
            s
        })
        .collect();

    // sums of one, two and three unit steps, reduced into the cell; the hash
    // set removes the identity images and collinear duplicates the raw
    // enumeration produces
    let mut seen = FxHashSet::default();
    let mut frontier: Vec<[i64; 3]> = vec![[0, 0, 0]];
    seen.insert([0, 0, 0]);
    for _ in 0..3 {
        let mut next = Vec::new();
        for base in &frontier {
            for s in &steps {
                let mut v = [0_i64; 3];
                for c in 0..3 {
                    v[c] = (base[c] + s[c]).rem_euclid(lengths[c]);
                }
                next.push(v);
                seen.insert(v);
            }
        }
        frontier = next;
    }

    let mut out: Vec<[i64; 3]> = seen.into_iter().collect();
    out.sort_unstable();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_group_products() {
        let sym = SymTable::xor_group(8).unwrap();
        assert_eq!(sym.product(3, 5), 6);
        assert_eq!(sym.product(0, 7), 7);
        for a in 0..8 {
            assert_eq!(sym.inverse(a), a);
            assert_eq!(sym.product(a, sym.inverse(a)), 0);
        }
    }

    #[test]
    fn xor_group_rejects_non_power_of_two() {
        assert!(SymTable::xor_group(3).is_err());
        assert!(SymTable::xor_group(0).is_err());
    }

    #[test]
    fn translation_group_adds_wavevectors() {
        let sym = SymTable::translation_group(&[4]).unwrap();
        assert_eq!(sym.nsym(), 4);
        assert_eq!(sym.product(1, 3), 0);
        assert_eq!(sym.product(2, 3), 1);
        assert_eq!(sym.inverse(1), 3);
        assert_eq!(sym.inverse(0), 0);
    }

    #[test]
    fn translation_group_mixed_radix() {
        // 3 x 2 cell: index = kx + 3 * ky
        let sym = SymTable::translation_group(&[3, 2]).unwrap();
        assert_eq!(sym.nsym(), 6);
        // (1, 0) + (2, 1) = (0, 1) -> index 3
        assert_eq!(sym.product(1, 5), 3);
        // -(1, 1) = (2, 1) -> index 5
        assert_eq!(sym.inverse(4), 5);
    }

    #[test]
    fn symmetry_vecs_deduplicated() {
        let spec = LatticeSpec::rectangular(&[2, 2], false, false).unwrap();
        let vecs = translational_symmetry_vecs(&spec).unwrap();
        // exactly the four cosets of a 2 x 2 cell, identity first
        assert_eq!(vecs.len(), 4);
        assert_eq!(vecs[0], [0, 0, 0]);
        let unique: FxHashSet<_> = vecs.iter().collect();
        assert_eq!(unique.len(), vecs.len());
    }

    #[test]
    fn symmetry_vecs_cover_a_chain() {
        let spec = LatticeSpec::rectangular(&[4], false, false).unwrap();
        let vecs = translational_symmetry_vecs(&spec).unwrap();
        // steps of up to three unit translations reach offsets 0..=3
        assert_eq!(vecs.len(), 4);
    }
}
