//! Slater–Condon matrix elements, specialised per system kind.
//!
//! All functions here are total over validly constructed inputs: there is no
//! error path, only zeros for symmetry-forbidden connections. Signs come in
//! through the excitation's permutational parity.

use crate::bitstring::BitString;
use crate::determinant::{self, double_occupancy};
use crate::excitation::{self, Excitation};
use crate::system::{Spin, System, SystemKind};

/// One-electron integral `⟨p|h|q⟩`.
///
/// For real-space lattices both `tmat` directions are tested independently,
/// so a doubly bonded pair or a self-image contributes the full `-2t`.
#[must_use]
pub fn one_e_int(sys: &System, p: usize, q: usize) -> f64 {
    match sys.kind {
        SystemKind::HubbardReal | SystemKind::Heisenberg | SystemKind::ChungLandau => {
            -sys.hubbard_t * f64::from(sys.tables().hops(p, q))
        }
        SystemKind::HubbardK => {
            if p == q {
                sys.basis_fns[p].sp_energy
            } else {
                0.0
            }
        }
        SystemKind::Molecular => {
            if Spin::of_orb(p) == Spin::of_orb(q) {
                sys.integrals()
                    .one_body(determinant::spatial_of(p), determinant::spatial_of(q))
            } else {
                0.0
            }
        }
    }
}

/// On-site repulsion of a real-space determinant: `U` per doubly occupied
/// site.
#[must_use]
pub fn coulomb_diagonal(sys: &System, det: &BitString) -> f64 {
    sys.hubbard_u * crate::convert::f64_from_usize(double_occupancy(det))
}

/// Diagonal matrix element `⟨D|H|D⟩`.
#[must_use]
pub fn diagonal_element(sys: &System, det: &BitString) -> f64 {
    match sys.kind {
        SystemKind::HubbardReal => {
            let kinetic: f64 = det.iter_ones().map(|p| one_e_int(sys, p, p)).sum();
            kinetic + coulomb_diagonal(sys, det)
        }
        SystemKind::HubbardK => {
            let mut kinetic = 0.0;
            let (mut na, mut nb) = (0_usize, 0_usize);
            for p in det.iter_ones() {
                kinetic += sys.basis_fns[p].sp_energy;
                match Spin::of_orb(p) {
                    Spin::Alpha => na += 1,
                    Spin::Beta => nb += 1,
                }
            }
            kinetic
                + sys.hubbard_u / crate::convert::f64_from_usize(sys.nsites)
                    * crate::convert::f64_from_usize(na * nb)
        }
        SystemKind::Molecular => {
            let ints = sys.integrals();
            let occ: Vec<usize> = det.iter_ones().collect();
            let mut energy = ints.core();
            for (n, &p) in occ.iter().enumerate() {
                let sp = determinant::spatial_of(p);
                energy += ints.one_body(sp, sp);
                for &q in &occ[n + 1..] {
                    let sq = determinant::spatial_of(q);
                    energy += ints.coulomb(sp, sq);
                    if Spin::of_orb(p) == Spin::of_orb(q) {
                        energy -= ints.exchange(sp, sq);
                    }
                }
            }
            energy
        }
        // the engine carries no evaluator for the spin models
        SystemKind::Heisenberg | SystemKind::ChungLandau => unreachable!(),
    }
}

/// Off-diagonal element `⟨D|H|D_i^a⟩` for a single excitation on `det`.
#[must_use]
pub fn slater_condon1(sys: &System, det: &BitString, exc: &Excitation) -> f64 {
    debug_assert_eq!(exc.level(), 1);
    let (i, a) = (exc.from[0], exc.to[0]);
    let element = match sys.kind {
        SystemKind::HubbardReal | SystemKind::Heisenberg | SystemKind::ChungLandau => {
            one_e_int(sys, i, a)
        }
        // single excitations never conserve crystal momentum
        SystemKind::HubbardK => 0.0,
        SystemKind::Molecular => {
            if Spin::of_orb(i) == Spin::of_orb(a) {
                let ints = sys.integrals();
                let (si, sa) = (determinant::spatial_of(i), determinant::spatial_of(a));
                let mut element = ints.one_body(si, sa);
                for k in det.iter_ones() {
                    if k == i {
                        continue;
                    }
                    let sk = determinant::spatial_of(k);
                    element += ints.two_body(si, sa, sk, sk);
                    if Spin::of_orb(k) == Spin::of_orb(i) {
                        element -= ints.two_body(si, sk, sk, sa);
                    }
                }
                element
            } else {
                0.0
            }
        }
    };
    element * exc.sign()
}

/// Off-diagonal element `⟨D|H|D_ij^ab⟩` for a double excitation.
#[must_use]
pub fn slater_condon2(sys: &System, exc: &Excitation) -> f64 {
    debug_assert_eq!(exc.level(), 2);
    let (i, j) = (exc.from[0], exc.from[1]);
    let (a, b) = (exc.to[0], exc.to[1]);
    let (spin_i, spin_j) = (Spin::of_orb(i), Spin::of_orb(j));
    let (spin_a, spin_b) = (Spin::of_orb(a), Spin::of_orb(b));

    let element = match sys.kind {
        // the on-site interaction is diagonal in real space
        SystemKind::HubbardReal | SystemKind::Heisenberg | SystemKind::ChungLandau => 0.0,
        SystemKind::HubbardK => {
            let sym = sys.sym_table();
            let momentum_ok = sym.product(sys.basis_fns[i].sym, sys.basis_fns[j].sym)
                == sym.product(sys.basis_fns[a].sym, sys.basis_fns[b].sym);
            if !momentum_ok || spin_i == spin_j {
                0.0
            } else {
                let g = sys.hubbard_u / crate::convert::f64_from_usize(sys.nsites);
                let mut element = 0.0;
                if spin_i == spin_a && spin_j == spin_b {
                    element += g;
                }
                if spin_i == spin_b && spin_j == spin_a {
                    element -= g;
                }
                element
            }
        }
        SystemKind::Molecular => {
            let ints = sys.integrals();
            let (si, sj) = (determinant::spatial_of(i), determinant::spatial_of(j));
            let (sa, sb) = (determinant::spatial_of(a), determinant::spatial_of(b));
            let mut element = 0.0;
            if spin_i == spin_a && spin_j == spin_b {
                element += ints.two_body(si, sa, sj, sb);
            }
            if spin_i == spin_b && spin_j == spin_a {
                element -= ints.two_body(si, sb, sj, sa);
            }
            element
        }
    };
    element * exc.sign()
}

/// General matrix element `⟨D1|H|D2⟩` between any two determinants of the
/// same electron count.
#[must_use]
pub fn matrix_element(sys: &System, d1: &BitString, d2: &BitString) -> f64 {
    if d1 == d2 {
        return diagonal_element(sys, d1);
    }
    match (d1 ^ d2).count_ones() {
        2 => slater_condon1(sys, d1, &excitation::connection(d1, d2)),
        4 => slater_condon2(sys, &excitation::connection(d1, d2)),
        _ => 0.0,
    }
}
