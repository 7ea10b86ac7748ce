#![allow(missing_docs)]

//! End-to-end checks for molecular systems using the H2/STO-3G integrals at
//! the equilibrium bond length (R = 1.4 a0), in the symmetry-adapted
//! molecular-orbital basis. The full-CI ground-state energy of this system
//! is -1.13727 hartree.

use fciqmc::determinant::encode;
use fciqmc::hamiltonian;
use fciqmc::integrals::MolecularIntegrals;
use fciqmc::lanczos::{build_hamiltonian, ground_state};
use fciqmc::qmc::{fciqmc, LoopControl, QmcOptions, QmcState};
use fciqmc::system::System;
use float_cmp::assert_approx_eq;

const H2_FCI_ENERGY: f64 = -1.13727;

/// H2 in STO-3G: one gerade and one ungerade orbital. Off-symmetry integrals
/// vanish and are left unset.
fn h2_integrals() -> MolecularIntegrals {
    let mut ints = MolecularIntegrals::new(2);
    ints.set_core(1.0 / 1.4);
    ints.set_one_body(0, 0, -1.2528);
    ints.set_one_body(1, 1, -0.4756);
    ints.set_two_body(0, 0, 0, 0, 0.6746);
    ints.set_two_body(1, 1, 1, 1, 0.6975);
    ints.set_two_body(0, 0, 1, 1, 0.6636);
    ints.set_two_body(0, 1, 0, 1, 0.1813);
    ints
}

fn h2_system() -> System {
    System::molecular(h2_integrals(), &[0, 5], 1, 1).unwrap()
}

#[test]
fn hartree_fock_determinant_energy() {
    let sys = h2_system();
    let reference = encode(&[0, 1], sys.n_basis);
    // E_HF = core + 2 h_11 + (11|11)
    let expected = 1.0 / 1.4 - 2.0 * 1.2528 + 0.6746;
    assert_approx_eq!(
        f64,
        hamiltonian::diagonal_element(&sys, &reference),
        expected,
        epsilon = 1e-12
    );
}

#[test]
fn full_ci_energy_by_exact_diagonalisation() {
    let sys = h2_system();
    let h = build_hamiltonian(&sys).unwrap();
    // four determinants at (1 alpha, 1 beta)
    assert_eq!(h.nrows(), 4);
    let e0 = ground_state(&h, 50, 1e-12).unwrap();
    assert_approx_eq!(f64, e0, H2_FCI_ENERGY, epsilon = 2e-4);
}

#[test]
fn fciqmc_reproduces_the_fci_energy() {
    let sys = h2_system();
    let reference = encode(&[0, 1], sys.n_basis);
    let e_ref = hamiltonian::diagonal_element(&sys, &reference);

    let opts = QmcOptions {
        tau: 0.05,
        ncycles: 20,
        nreport: 100,
        pattempt_single: 0.2,
        shift: H2_FCI_ENERGY,
        rng_seed: 31415,
        ..QmcOptions::default()
    };
    let mut state = QmcState::new(&sys, &opts, reference, 1000).unwrap();
    let reports = fciqmc(&sys, &opts, &mut state, |_, _, _| {}, |_| LoopControl::Continue).unwrap();

    let half = &reports[50..];
    let numerator: f64 = half.iter().map(|r| r.proj_energy).sum();
    let denominator: f64 = half.iter().map(|r| r.d0_population).sum();
    let energy = e_ref + numerator / denominator;
    assert!(
        (energy - H2_FCI_ENERGY).abs() < 0.05,
        "projected energy {energy} too far from {H2_FCI_ENERGY}"
    );
    assert!(state.total_population() > 100.0);
}

#[test]
fn no_renorm_generator_gives_the_same_physics() {
    let sys = h2_system();
    let reference = encode(&[0, 1], sys.n_basis);
    let e_ref = hamiltonian::diagonal_element(&sys, &reference);

    let opts = QmcOptions {
        tau: 0.05,
        ncycles: 20,
        nreport: 60,
        pattempt_single: 0.2,
        shift: H2_FCI_ENERGY,
        renorm_excits: false,
        rng_seed: 2718,
        ..QmcOptions::default()
    };
    let mut state = QmcState::new(&sys, &opts, reference, 1000).unwrap();
    let reports = fciqmc(&sys, &opts, &mut state, |_, _, _| {}, |_| LoopControl::Continue).unwrap();

    let half = &reports[30..];
    let numerator: f64 = half.iter().map(|r| r.proj_energy).sum();
    let denominator: f64 = half.iter().map(|r| r.d0_population).sum();
    let energy = e_ref + numerator / denominator;
    assert!(
        (energy - H2_FCI_ENERGY).abs() < 0.05,
        "projected energy {energy} too far from {H2_FCI_ENERGY}"
    );
}

#[test]
fn shift_update_controls_the_population() {
    // a crude population-control hook: damp the shift towards keeping the
    // total population at its previous value
    let sys = h2_system();
    let reference = encode(&[0, 1], sys.n_basis);

    let opts = QmcOptions {
        tau: 0.05,
        ncycles: 20,
        nreport: 80,
        pattempt_single: 0.2,
        shift: -1.0,
        rng_seed: 999,
        ..QmcOptions::default()
    };
    let mut state = QmcState::new(&sys, &opts, reference, 500).unwrap();
    let damping = 0.1;
    let reports = fciqmc(
        &sys,
        &opts,
        &mut state,
        |report, n_old, state| {
            if n_old > 0.0 {
                state.shift -=
                    damping / (0.05 * 20.0) * (report.n_particles / n_old).ln();
            }
        },
        |_| LoopControl::Continue,
    )
    .unwrap();

    // with the shift tracking the growth rate, the final population stays
    // within an order of magnitude of the target
    let final_pop = reports.last().unwrap().n_particles;
    assert!(final_pop > 50.0 && final_pop < 5000.0, "population {final_pop}");
    // and the converged shift estimates the ground-state energy loosely
    let tail_shift = reports[60..].iter().map(|r| r.shift).sum::<f64>() / 20.0;
    assert!(
        (tail_shift - H2_FCI_ENERGY).abs() < 0.2,
        "converged shift {tail_shift}"
    );
}
