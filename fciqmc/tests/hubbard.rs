#![allow(missing_docs)]

//! End-to-end checks for the Hubbard model: exact diagonalisation through the
//! CSR Lanczos path and stochastic runs against analytic references.

use fciqmc::determinant::encode;
use fciqmc::hamiltonian;
use fciqmc::lanczos::{build_hamiltonian, ground_state};
use fciqmc::lattice::LatticeSpec;
use fciqmc::qmc::{fciqmc, LoopControl, QmcOptions, QmcState};
use fciqmc::system::System;
use float_cmp::assert_approx_eq;

fn open_dimer(u: f64) -> System {
    let spec = LatticeSpec::rectangular(&[2], false, true).unwrap();
    System::hubbard_real(spec, 1, 1, u, 1.0).unwrap()
}

#[test]
fn noninteracting_ring_ground_state() {
    // 4-site periodic ring, U = 0, half filling: the exact energy fills the
    // band bottom, -2t + -2t
    let spec = LatticeSpec::rectangular(&[4], false, false).unwrap();
    let sys = System::hubbard_real(spec, 2, 2, 0.0, 1.0).unwrap();
    let h = build_hamiltonian(&sys).unwrap();
    assert_eq!(h.nrows(), 36);
    let e0 = ground_state(&h, 200, 1e-11).unwrap();
    assert_approx_eq!(f64, e0, -4.0, epsilon = 1e-8);
}

#[test]
fn open_dimer_exact_energy() {
    // two sites, one bond: E0 = U/2 - sqrt((U/2)^2 + 4 t^2)
    let sys = open_dimer(4.0);
    let h = build_hamiltonian(&sys).unwrap();
    assert_eq!(h.nrows(), 4);
    let e0 = ground_state(&h, 50, 1e-12).unwrap();
    assert_approx_eq!(f64, e0, 2.0 - 8.0_f64.sqrt(), epsilon = 1e-9);
}

#[test]
fn periodic_dimer_doubles_the_bond() {
    // the 2-site ring reaches its neighbour both ways round, so the
    // effective hopping is 2t: E0 = U/2 - sqrt((U/2)^2 + 16 t^2)
    let spec = LatticeSpec::rectangular(&[2], false, false).unwrap();
    let sys = System::hubbard_real(spec, 1, 1, 4.0, 1.0).unwrap();
    let h = build_hamiltonian(&sys).unwrap();
    let e0 = ground_state(&h, 50, 1e-12).unwrap();
    assert_approx_eq!(f64, e0, 2.0 - 20.0_f64.sqrt(), epsilon = 1e-9);
}

#[test]
fn momentum_and_real_space_spectra_agree() {
    // the same Hamiltonian in two bases: identical ground-state energy
    let spec = LatticeSpec::rectangular(&[4], false, false).unwrap();
    let real = System::hubbard_real(spec, 1, 1, 4.0, 1.0).unwrap();
    let momentum = System::hubbard_k(&[4], 1, 1, 4.0, 1.0).unwrap();

    let e_real = ground_state(&build_hamiltonian(&real).unwrap(), 100, 1e-11).unwrap();
    let e_momentum = ground_state(&build_hamiltonian(&momentum).unwrap(), 100, 1e-11).unwrap();
    assert_approx_eq!(f64, e_real, e_momentum, epsilon = 1e-7);
}

#[test]
fn fciqmc_open_dimer_projected_energy() {
    let sys = open_dimer(4.0);
    let exact = 2.0 - 8.0_f64.sqrt();
    let opts = QmcOptions {
        tau: 0.02,
        ncycles: 10,
        nreport: 100,
        shift: exact,
        rng_seed: 2024,
        ..QmcOptions::default()
    };
    // open-shell reference: site 0 alpha, site 1 beta
    let reference = encode(&[0, 3], sys.n_basis);
    let e_ref = hamiltonian::diagonal_element(&sys, &reference);
    assert_approx_eq!(f64, e_ref, 0.0, epsilon = 1e-12);

    let mut state = QmcState::new(&sys, &opts, reference, 500).unwrap();
    let reports = fciqmc(&sys, &opts, &mut state, |_, _, _| {}, |_| LoopControl::Continue).unwrap();

    // average the projected energy over the equilibrated second half
    let half = &reports[50..];
    let numerator: f64 = half.iter().map(|r| r.proj_energy).sum();
    let denominator: f64 = half.iter().map(|r| r.d0_population).sum();
    let energy = e_ref + numerator / denominator;
    assert!(
        (energy - exact).abs() < 0.25,
        "projected energy {energy} too far from {exact}"
    );
    // the population neither died out nor exploded with the shift pinned at
    // the exact energy
    assert!(state.total_population() > 50.0);
    assert!(state.total_population() < 50_000.0);
}

#[test]
fn fciqmc_momentum_space_runs_reproducibly() {
    let sys = System::hubbard_k(&[4], 2, 2, 4.0, 1.0).unwrap();
    let reference = sys.aufbau_reference();
    let e_ref = hamiltonian::diagonal_element(&sys, &reference);
    let opts = QmcOptions {
        tau: 0.005,
        ncycles: 10,
        nreport: 40,
        shift: e_ref - 3.5,
        rng_seed: 77,
        ..QmcOptions::default()
    };

    let mut state = QmcState::new(&sys, &opts, reference.clone(), 200).unwrap();
    let first = fciqmc(&sys, &opts, &mut state, |_, _, _| {}, |_| LoopControl::Continue).unwrap();

    let mut again = QmcState::new(&sys, &opts, reference, 200).unwrap();
    let second = fciqmc(&sys, &opts, &mut again, |_, _, _| {}, |_| LoopControl::Continue).unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.n_particles, b.n_particles);
        assert_eq!(a.proj_energy, b.proj_energy);
        assert_eq!(a.d0_population, b.d0_population);
    }
    for walker in &state.walkers {
        assert_eq!(walker.det.count_ones(), sys.n_el);
    }
}
