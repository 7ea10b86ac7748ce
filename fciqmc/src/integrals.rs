//! One- and two-electron integrals over spatial orbitals.
//!
//! Stored in the Mulliken `(ij|kl)` convention with the full eight-fold
//! permutational symmetry folded into a triangular compound index — the shape
//! of data an FCIDUMP reader hands over. Reading the file format itself is a
//! collaborator's job.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Compound index of an (unordered) orbital pair.
fn pair_index(p: usize, q: usize) -> usize {
    let (hi, lo) = if p >= q { (p, q) } else { (q, p) };
    hi * (hi + 1) / 2 + lo
}

/// Molecular integral store.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MolecularIntegrals {
    norb: usize,
    core: f64,
    one_e: Array2<f64>,
    two_e: Vec<f64>,
}

impl MolecularIntegrals {
    /// Empty store for `norb` spatial orbitals.
    #[must_use]
    pub fn new(norb: usize) -> Self {
        let npair = norb * (norb + 1) / 2;
        Self {
            norb,
            core: 0.0,
            one_e: Array2::zeros((norb, norb)),
            two_e: vec![0.0; npair * (npair + 1) / 2],
        }
    }

    /// Number of spatial orbitals.
    #[must_use]
    pub const fn norb(&self) -> usize {
        self.norb
    }

    /// Core (nuclear-repulsion plus frozen-core) energy.
    #[must_use]
    pub const fn core(&self) -> f64 {
        self.core
    }

    /// Sets the core energy.
    pub fn set_core(&mut self, value: f64) {
        self.core = value;
    }

    /// Sets `⟨i|h|j⟩`, storing both Hermitian partners.
    pub fn set_one_body(&mut self, i: usize, j: usize, value: f64) {
        self.one_e[[i, j]] = value;
        self.one_e[[j, i]] = value;
    }

    /// Returns `⟨i|h|j⟩`.
    #[must_use]
    pub fn one_body(&self, i: usize, j: usize) -> f64 {
        self.one_e[[i, j]]
    }

    /// Sets the Mulliken integral `(ij|kl)`; all eight permutational images
    /// share the slot.
    pub fn set_two_body(&mut self, i: usize, j: usize, k: usize, l: usize, value: f64) {
        let idx = pair_index(pair_index(i, j), pair_index(k, l));
        self.two_e[idx] = value;
    }

    /// Returns the Mulliken integral `(ij|kl)`.
    #[must_use]
    pub fn two_body(&self, i: usize, j: usize, k: usize, l: usize) -> f64 {
        self.two_e[pair_index(pair_index(i, j), pair_index(k, l))]
    }

    /// Coulomb integral `J_ij = (ii|jj)`.
    #[must_use]
    pub fn coulomb(&self, i: usize, j: usize) -> f64 {
        self.two_body(i, i, j, j)
    }

    /// Exchange integral `K_ij = (ij|ji)`.
    #[must_use]
    pub fn exchange(&self, i: usize, j: usize) -> f64 {
        self.two_body(i, j, j, i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_body_is_hermitian() {
        let mut ints = MolecularIntegrals::new(3);
        ints.set_one_body(0, 2, -1.25);
        assert_eq!(ints.one_body(0, 2), -1.25);
        assert_eq!(ints.one_body(2, 0), -1.25);
    }

    #[test]
    fn two_body_eight_fold_symmetry() {
        let mut ints = MolecularIntegrals::new(4);
        ints.set_two_body(0, 1, 2, 3, 0.5);
        for (i, j, k, l) in [
            (0, 1, 2, 3),
            (1, 0, 2, 3),
            (0, 1, 3, 2),
            (1, 0, 3, 2),
            (2, 3, 0, 1),
            (3, 2, 0, 1),
            (2, 3, 1, 0),
            (3, 2, 1, 0),
        ] {
            assert_eq!(ints.two_body(i, j, k, l), 0.5);
        }
        // distinct integrals stay distinct
        assert_eq!(ints.two_body(0, 0, 2, 3), 0.0);
    }

    #[test]
    fn coulomb_and_exchange_shortcuts() {
        let mut ints = MolecularIntegrals::new(2);
        ints.set_two_body(0, 0, 1, 1, 0.66);
        ints.set_two_body(0, 1, 1, 0, 0.18);
        assert_eq!(ints.coulomb(0, 1), 0.66);
        assert_eq!(ints.exchange(0, 1), 0.18);
        assert_eq!(ints.exchange(1, 0), 0.18);
    }
}
