//! Deterministic companion: exact diagonalisation of model Hamiltonians.
//!
//! Enumerates the full determinant space at fixed `(n_alpha, n_beta)`,
//! assembles the Hamiltonian into upper-triangle symmetric CSR storage and
//! finds the ground-state energy by Lanczos iteration with full
//! reorthogonalisation. The tridiagonal eigenvalue is extracted by Sturm
//! bisection, so the only heavy kernel is the parallel symmetric
//! matrix-vector product.

use crate::bitstring::BitString;
use crate::csr::CsrMatrix;
use crate::determinant::encode;
use crate::error::{Error, Result};
use crate::hamiltonian;
use crate::system::System;
use anyhow::anyhow;
use itertools::Itertools;
use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// All determinants with the system's `(n_alpha, n_beta)` occupation, in
/// ascending bit-string order.
#[must_use]
pub fn enumerate_determinants(sys: &System) -> Vec<BitString> {
    let nspatial = sys.n_basis / 2;
    let alpha_orbs: Vec<usize> = (0..nspatial).map(|s| 2 * s).collect();
    let beta_orbs: Vec<usize> = (0..nspatial).map(|s| 2 * s + 1).collect();

    let mut dets = Vec::new();
    for a_occ in alpha_orbs.into_iter().combinations(sys.n_alpha) {
        for b_occ in beta_orbs.iter().copied().combinations(sys.n_beta) {
            let mut occ = a_occ.clone();
            occ.extend(b_occ);
            occ.sort_unstable();
            dets.push(encode(&occ, sys.n_basis));
        }
    }
    dets.sort_unstable();
    dets
}

/// Assembles `⟨D_i|H|D_j⟩` over the enumerated determinant space into
/// upper-triangle symmetric CSR storage.
///
/// # Errors
///
/// Propagates CSR construction failures.
pub fn build_hamiltonian(sys: &System) -> Result<CsrMatrix> {
    let dets = enumerate_determinants(sys);
    let n = dets.len();

    let mut triplets = Vec::new();
    for (i, di) in dets.iter().enumerate() {
        for (j, dj) in dets.iter().enumerate().skip(i) {
            let element = hamiltonian::matrix_element(sys, di, dj);
            if i == j || element != 0.0 {
                triplets.push((i, j, element));
            }
        }
    }
    CsrMatrix::from_triplets(n, n, triplets, true)
}

/// Smallest eigenvalue of the symmetric tridiagonal matrix with diagonal
/// `alpha` and off-diagonal `beta`, by Sturm-sequence bisection.
fn tridiag_smallest(alpha: &[f64], beta: &[f64]) -> f64 {
    debug_assert_eq!(beta.len() + 1, alpha.len());

    // Gershgorin bounds
    let bound = |i: usize| {
        let left = if i > 0 { beta[i - 1].abs() } else { 0.0 };
        let right = if i < beta.len() { beta[i].abs() } else { 0.0 };
        (alpha[i] - left - right, alpha[i] + left + right)
    };
    let mut lo = (0..alpha.len()).map(|i| bound(i).0).fold(f64::INFINITY, f64::min);
    let mut hi = (0..alpha.len()).map(|i| bound(i).1).fold(f64::NEG_INFINITY, f64::max);

    // number of eigenvalues below x, from the Sturm sequence of leading
    // principal minors
    let count_below = |x: f64| {
        let mut count = 0;
        let mut d = alpha[0] - x;
        if d < 0.0 {
            count += 1;
        }
        for i in 1..alpha.len() {
            let denom = if d.abs() < f64::MIN_POSITIVE {
                -f64::MIN_POSITIVE
            } else {
                d
            };
            d = alpha[i] - x - beta[i - 1] * beta[i - 1] / denom;
            if d < 0.0 {
                count += 1;
            }
        }
        count
    };

    let scale = hi.abs().max(lo.abs()).max(1.0);
    while hi - lo > 1e-14 * scale {
        let mid = 0.5 * (lo + hi);
        if count_below(mid) >= 1 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Ground-state eigenvalue of a symmetric CSR matrix by Lanczos iteration.
///
/// The Krylov basis is fully reorthogonalised each step, so the usual ghost
/// eigenvalues of the bare three-term recurrence cannot appear; the start
/// vector is drawn from a fixed-seed generator to keep runs reproducible.
///
/// # Errors
///
/// Returns a configuration error for an empty or non-symmetric matrix, and a
/// convergence failure if `max_iter` steps do not settle within `tol`.
pub fn ground_state(matrix: &CsrMatrix, max_iter: usize, tol: f64) -> Result<f64> {
    let n = matrix.nrows();
    if n == 0 {
        return Err(Error::Config("cannot diagonalise an empty matrix".into()));
    }

    let mut rng = Pcg64::seed_from_u64(0x5eed_1234);
    let mut v = Array1::from_shape_fn(n, |_| rng.gen::<f64>() - 0.5);
    let norm = v.dot(&v).sqrt();
    v /= norm;

    let mut basis: Vec<Array1<f64>> = Vec::new();
    let mut alphas: Vec<f64> = Vec::new();
    let mut betas: Vec<f64> = Vec::new();
    let mut previous = f64::INFINITY;

    for _ in 0..max_iter.min(n) {
        let mut w = Array1::from_vec(matrix.symv(v.as_slice().unwrap_or_else(|| unreachable!()))?);
        let alpha = v.dot(&w);
        alphas.push(alpha);
        basis.push(v.clone());

        // full reorthogonalisation against every kept vector
        for u in &basis {
            let overlap = u.dot(&w);
            w.scaled_add(-overlap, u);
        }

        let theta = tridiag_smallest(&alphas, &betas);
        let exhausted = basis.len() == n;
        if (theta - previous).abs() < tol || exhausted {
            return Ok(theta);
        }
        previous = theta;

        let beta = w.dot(&w).sqrt();
        if beta < 1e-12 {
            // the Krylov space closed on an invariant subspace
            return Ok(theta);
        }
        betas.push(beta);
        v = w / beta;
    }

    Err(Error::Other(anyhow!(
        "Lanczos failed to converge within {max_iter} iterations"
    )))
}
