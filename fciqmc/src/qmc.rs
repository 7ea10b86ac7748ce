//! The FCIQMC and Hellmann–Feynman walker loops.
//!
//! The loop nesting is report / cycle / determinant / particle. Within a
//! cycle every walker attempts one spawn per particle and one collective
//! death step, appending progeny to the spawn buffer; annihilation folds the
//! buffer back into the main list at the cycle boundary. Reports carry the
//! projected-energy and reference-population accumulators to an external
//! estimator hook, and an interactivity hook may request a soft exit between
//! reports.

use crate::annihilation::{self, annihilate};
use crate::bitstring::BitString;
use crate::error::{Error, Result};
use crate::excitgen::{CurrentDet, EngineRng, ExcitGen, ExcitGenEnum, GenResult};
use crate::hamiltonian;
use crate::spawning::{attempt_spawn, stochastic_death, SpawnBuffer};
use crate::system::System;
use crate::walker::Walker;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::time::Instant;

/// Run parameters consumed by the walker loops.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QmcOptions {
    /// Imaginary-time step.
    pub tau: f64,
    /// Monte Carlo cycles per report.
    pub ncycles: usize,
    /// Number of reports.
    pub nreport: usize,
    /// Probability of attempting a single rather than a double excitation
    /// (molecular systems).
    pub pattempt_single: f64,
    /// Initial shift `S` entering the death probability `τ(H_ii − S)`.
    pub shift: f64,
    /// Spawn-buffer capacity.
    pub spawn_capacity: usize,
    /// Use the renormalised molecular excitation generators.
    pub renorm_excits: bool,
    /// RNG seed; identical seeds and partitions reproduce runs bitwise.
    pub rng_seed: u64,
}

impl Default for QmcOptions {
    fn default() -> Self {
        Self {
            tau: 1e-3,
            ncycles: 10,
            nreport: 100,
            pattempt_single: 0.05,
            shift: 0.0,
            spawn_capacity: 1 << 16,
            renorm_excits: true,
            rng_seed: 7,
        }
    }
}

/// One line of the report table.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Report {
    /// Report index, starting at 1.
    pub ireport: usize,
    /// Total cycles completed since the start of the run.
    pub ncycles_done: usize,
    /// Total unsigned walker population.
    pub n_particles: f64,
    /// Projected-energy numerator `Σ_{D≠D0} ⟨D0|H|D⟩ N_D`, accumulated over
    /// the report.
    pub proj_energy: f64,
    /// Reference population `N_0`, accumulated over the report.
    pub d0_population: f64,
    /// Shift at the end of the report.
    pub shift: f64,
    /// Wall-clock seconds since the run started.
    pub time: f64,
}

/// Decision returned by the interactivity hook between reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopControl {
    /// Keep running.
    Continue,
    /// Finish cleanly after the current report.
    SoftExit,
}

/// Mutable Monte Carlo state owned by the walker loop.
pub struct QmcState {
    /// Main walker list, sorted by determinant.
    pub walkers: Vec<Walker>,
    /// Population slots in use: 1 for plain FCIQMC, 2 for Hellmann–Feynman.
    pub sampling_size: usize,
    /// Current shift.
    pub shift: f64,
    /// Reference determinant for the projected energy.
    pub reference: BitString,
    /// Spawn buffer, drained by annihilation each cycle.
    pub spawned: SpawnBuffer,
    /// Seeded generator driving every stochastic decision.
    pub rng: EngineRng,
    /// Cycles completed so far.
    pub ncycles_done: usize,
    /// Total population at the previous report, for the estimator hook.
    pub n_particles_old: f64,
}

/// Restart snapshot: the full main list plus the counters needed to resume.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Snapshot {
    /// Main walker list.
    pub walkers: Vec<Walker>,
    /// Population slots in use.
    pub sampling_size: usize,
    /// Cycles completed.
    pub ncycles_done: usize,
    /// Population at the last report.
    pub n_particles_old: f64,
    /// Shift at the time of the snapshot.
    pub shift: f64,
}

impl QmcState {
    /// Fresh state seeded with `initial_pop` walkers on `reference`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the reference does not hold the
    /// system's electron count or the initial population is empty.
    pub fn new(
        sys: &System,
        opts: &QmcOptions,
        reference: BitString,
        initial_pop: i32,
    ) -> Result<Self> {
        if reference.count_ones() != sys.n_el {
            return Err(Error::Config(format!(
                "reference holds {} electrons, the system {}",
                reference.count_ones(),
                sys.n_el
            )));
        }
        if initial_pop == 0 {
            return Err(Error::Config("initial population must be non-zero".into()));
        }
        Ok(Self {
            walkers: vec![Walker::new(reference.clone(), initial_pop)],
            sampling_size: 1,
            shift: opts.shift,
            reference,
            spawned: SpawnBuffer::with_capacity(opts.spawn_capacity),
            rng: EngineRng::seed_from_u64(opts.rng_seed),
            ncycles_done: 0,
            n_particles_old: f64::from(initial_pop.abs()),
        })
    }

    /// Total unsigned population over the active sampling slots.
    // populations stay far below 2^52 in any feasible run
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn total_population(&self) -> f64 {
        annihilation::total_population(&self.walkers, self.sampling_size) as f64
    }

    /// Captures a restart snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            walkers: self.walkers.clone(),
            sampling_size: self.sampling_size,
            ncycles_done: self.ncycles_done,
            n_particles_old: self.n_particles_old,
            shift: self.shift,
        }
    }

    /// Rebuilds a state from a snapshot, with fresh scratch buffers and a
    /// reseeded generator.
    #[must_use]
    pub fn restore(snapshot: Snapshot, reference: BitString, opts: &QmcOptions) -> Self {
        Self {
            walkers: snapshot.walkers,
            sampling_size: snapshot.sampling_size,
            shift: snapshot.shift,
            reference,
            spawned: SpawnBuffer::with_capacity(opts.spawn_capacity),
            rng: EngineRng::seed_from_u64(opts.rng_seed),
            ncycles_done: snapshot.ncycles_done,
            n_particles_old: snapshot.n_particles_old,
        }
    }

    /// Serialises a snapshot to `writer`.
    ///
    /// # Errors
    ///
    /// Propagates serialisation failures.
    pub fn write_snapshot<W: Write>(&self, writer: W) -> Result<()> {
        bincode::serialize_into(writer, &self.snapshot()).map_err(anyhow::Error::new)?;
        Ok(())
    }

    /// Deserialises a snapshot from `reader`.
    ///
    /// # Errors
    ///
    /// Propagates deserialisation failures.
    pub fn read_snapshot<R: Read>(reader: R) -> Result<Snapshot> {
        let snapshot = bincode::deserialize_from(reader).map_err(anyhow::Error::new)?;
        Ok(snapshot)
    }
}

/// Per-report accumulators, zeroed at every report boundary.
#[derive(Default)]
struct Accumulators {
    proj_energy: f64,
    d0_population: f64,
    nattempts: u64,
    nspawned: u64,
}

fn check_options(opts: &QmcOptions) -> Result<()> {
    if opts.tau <= 0.0 {
        return Err(Error::Config(format!("timestep must be positive, got {}", opts.tau)));
    }
    if opts.ncycles == 0 || opts.nreport == 0 {
        return Err(Error::Config("cycle and report counts must be non-zero".into()));
    }
    if opts.spawn_capacity == 0 {
        return Err(Error::Config("spawn buffer needs a non-zero capacity".into()));
    }
    Ok(())
}

/// In-flight check that the generator's matrix element matches the direct
/// Slater–Condon evaluation; compiled out of release builds.
fn debug_check_matel(sys: &System, source: &BitString, result: &GenResult) {
    if cfg!(debug_assertions) {
        if let Some(target) = &result.target {
            let direct = hamiltonian::matrix_element(sys, source, target);
            debug_assert!(
                (result.hmatel - direct).abs() <= 1e-10 * direct.abs().max(1.0),
                "generator element {} disagrees with ⟨D|H|D'⟩ = {direct}",
                result.hmatel
            );
        }
    }
}

fn spawn_from_particles(
    sys: &System,
    opts: &QmcOptions,
    generator: &ExcitGenEnum,
    cdet: &CurrentDet,
    pop: i32,
    slot: usize,
    spawned: &mut SpawnBuffer,
    rng: &mut EngineRng,
    acc: &mut Accumulators,
) -> Result<()> {
    for _ in 0..pop.unsigned_abs() {
        let result = generator.gen_excit(sys, cdet, rng);
        debug_check_matel(sys, &cdet.bits, &result);
        let Some(target) = result.target else {
            continue;
        };
        let progeny = attempt_spawn(result.hmatel, result.pgen, pop, opts.tau, rng);
        if progeny != 0 {
            acc.nspawned += progeny.unsigned_abs() as u64;
            spawned.push(target, slot, progeny)?;
        }
    }
    Ok(())
}

fn run_cycle(
    sys: &System,
    opts: &QmcOptions,
    state: &mut QmcState,
    generator: &ExcitGenEnum,
    acc: &mut Accumulators,
) -> Result<()> {
    state.spawned.reset();
    // one spawn and one death attempt per particle this cycle
    acc.nattempts += 2 * annihilation::total_population(&state.walkers, 1);

    for w in 0..state.walkers.len() {
        let pop = state.walkers[w].pops[0];
        if pop == 0 {
            continue;
        }
        let cdet = CurrentDet::decode(&state.walkers[w].det);

        // projected-energy accumulators against the reference
        if cdet.bits == state.reference {
            acc.d0_population += f64::from(pop);
        } else {
            let coupling = hamiltonian::matrix_element(sys, &state.reference, &cdet.bits);
            if coupling != 0.0 {
                acc.proj_energy += coupling * f64::from(pop);
            }
        }

        spawn_from_particles(
            sys,
            opts,
            generator,
            &cdet,
            pop,
            0,
            &mut state.spawned,
            &mut state.rng,
            acc,
        )?;

        let hdiag = hamiltonian::diagonal_element(sys, &cdet.bits);
        state.walkers[w].pops[0] =
            stochastic_death(hdiag, state.shift, pop, opts.tau, &mut state.rng);
    }

    annihilate(&mut state.walkers, &mut state.spawned);
    state.ncycles_done += 1;
    Ok(())
}

/// Runs the FCIQMC loop.
///
/// `update_estimators` is called once per report with the fresh report and
/// the population total of the previous report; it may adjust the shift
/// through the state. `interact` runs between reports and may request a soft
/// exit, which finishes the current report and returns cleanly.
///
/// # Errors
///
/// Returns configuration errors for invalid run parameters and capacity
/// errors if the spawn buffer overflows.
pub fn fciqmc<E, I>(
    sys: &System,
    opts: &QmcOptions,
    state: &mut QmcState,
    mut update_estimators: E,
    mut interact: I,
) -> Result<Vec<Report>>
where
    E: FnMut(&Report, f64, &mut QmcState),
    I: FnMut(&Report) -> LoopControl,
{
    check_options(opts)?;
    let generator = ExcitGenEnum::for_system(sys, opts.pattempt_single, opts.renorm_excits)?;
    let start = Instant::now();
    let mut reports = Vec::with_capacity(opts.nreport);

    for ireport in 1..=opts.nreport {
        let mut acc = Accumulators::default();
        for _ in 0..opts.ncycles {
            run_cycle(sys, opts, state, &generator, &mut acc)?;
        }

        let report = Report {
            ireport,
            ncycles_done: state.ncycles_done,
            n_particles: state.total_population(),
            proj_energy: acc.proj_energy,
            d0_population: acc.d0_population,
            shift: state.shift,
            time: start.elapsed().as_secs_f64(),
        };
        let n_old = state.n_particles_old;
        state.n_particles_old = report.n_particles;
        update_estimators(&report, n_old, state);
        tracing::info!(
            ireport,
            n_particles = report.n_particles,
            proj_energy = report.proj_energy,
            d0_population = report.d0_population,
            shift = state.shift,
            attempts = acc.nattempts,
            spawned = acc.nspawned,
            "report"
        );
        reports.push(report);

        // UNWRAP: just pushed
        let last = reports.last().unwrap_or_else(|| unreachable!());
        if interact(last) == LoopControl::SoftExit {
            tracing::debug!(ireport, "soft exit requested");
            break;
        }
    }
    Ok(reports)
}

/// Operator sampled alongside the Hamiltonian in a Hellmann–Feynman run: a
/// capability record of function fields, bound once at initialisation.
#[derive(Clone, Copy)]
pub struct OperatorOps {
    /// Diagonal expectation `⟨D|O|D⟩`.
    pub diagonal: fn(&System, &BitString) -> f64,
    /// Off-diagonal sampler; `None` for purely diagonal operators.
    pub gen_excit: Option<fn(&System, &CurrentDet, &mut EngineRng) -> GenResult>,
}

/// The double-occupancy operator `dH/dU` for Hubbard Hamiltonians; purely
/// diagonal.
#[must_use]
pub fn double_occupancy_ops() -> OperatorOps {
    OperatorOps {
        diagonal: |_, det| crate::convert::f64_from_usize(crate::determinant::double_occupancy(det)),
        gen_excit: None,
    }
}

fn run_hf_cycle(
    sys: &System,
    opts: &QmcOptions,
    state: &mut QmcState,
    generator: &ExcitGenEnum,
    operator: &OperatorOps,
    acc: &mut Accumulators,
) -> Result<()> {
    state.spawned.reset();
    // one spawn and one death attempt per particle, in both sampling slots
    acc.nattempts += 2 * annihilation::total_population(&state.walkers, 2);

    for w in 0..state.walkers.len() {
        let [pop_h, pop_o] = state.walkers[w].pops;
        if pop_h == 0 && pop_o == 0 {
            continue;
        }
        let cdet = CurrentDet::decode(&state.walkers[w].det);

        if cdet.bits == state.reference {
            acc.d0_population += f64::from(pop_h);
        } else {
            let coupling = hamiltonian::matrix_element(sys, &state.reference, &cdet.bits);
            if coupling != 0.0 {
                acc.proj_energy += coupling * f64::from(pop_h);
            }
        }

        // Hamiltonian walkers spawn more Hamiltonian walkers ...
        spawn_from_particles(
            sys,
            opts,
            generator,
            &cdet,
            pop_h,
            0,
            &mut state.spawned,
            &mut state.rng,
            acc,
        )?;

        // ... and seed the operator population through the operator oracle,
        // not through a second Hamiltonian spawn
        if pop_h != 0 {
            let o_diag = (operator.diagonal)(sys, &cdet.bits);
            for _ in 0..pop_h.unsigned_abs() {
                let progeny = attempt_spawn(o_diag, 1.0, pop_h, opts.tau, &mut state.rng);
                if progeny != 0 {
                    state.spawned.push(cdet.bits.clone(), 1, progeny)?;
                }
                if let Some(op_gen) = operator.gen_excit {
                    let result = op_gen(sys, &cdet, &mut state.rng);
                    if let Some(target) = result.target {
                        let progeny =
                            attempt_spawn(result.hmatel, result.pgen, pop_h, opts.tau, &mut state.rng);
                        if progeny != 0 {
                            state.spawned.push(target, 1, progeny)?;
                        }
                    }
                }
            }
        }

        // operator walkers evolve under the Hamiltonian
        spawn_from_particles(
            sys,
            opts,
            generator,
            &cdet,
            pop_o,
            1,
            &mut state.spawned,
            &mut state.rng,
            acc,
        )?;

        let hdiag = hamiltonian::diagonal_element(sys, &cdet.bits);
        state.walkers[w].pops[0] =
            stochastic_death(hdiag, state.shift, pop_h, opts.tau, &mut state.rng);
        state.walkers[w].pops[1] =
            stochastic_death(hdiag, state.shift, pop_o, opts.tau, &mut state.rng);
    }

    annihilate(&mut state.walkers, &mut state.spawned);
    state.ncycles_done += 1;
    Ok(())
}

/// Runs the Hellmann–Feynman loop: sampling slot 0 evolves the Hamiltonian
/// ground state while slot 1 accumulates the operator-perturbed population.
///
/// # Errors
///
/// As for [`fciqmc`].
pub fn hellmann_feynman<E, I>(
    sys: &System,
    opts: &QmcOptions,
    state: &mut QmcState,
    operator: &OperatorOps,
    mut update_estimators: E,
    mut interact: I,
) -> Result<Vec<Report>>
where
    E: FnMut(&Report, f64, &mut QmcState),
    I: FnMut(&Report) -> LoopControl,
{
    check_options(opts)?;
    let generator = ExcitGenEnum::for_system(sys, opts.pattempt_single, opts.renorm_excits)?;
    state.sampling_size = 2;
    let start = Instant::now();
    let mut reports = Vec::with_capacity(opts.nreport);

    for ireport in 1..=opts.nreport {
        let mut acc = Accumulators::default();
        for _ in 0..opts.ncycles {
            run_hf_cycle(sys, opts, state, &generator, operator, &mut acc)?;
        }

        let report = Report {
            ireport,
            ncycles_done: state.ncycles_done,
            n_particles: state.total_population(),
            proj_energy: acc.proj_energy,
            d0_population: acc.d0_population,
            shift: state.shift,
            time: start.elapsed().as_secs_f64(),
        };
        let n_old = state.n_particles_old;
        state.n_particles_old = report.n_particles;
        update_estimators(&report, n_old, state);
        tracing::info!(
            ireport,
            n_particles = report.n_particles,
            proj_energy = report.proj_energy,
            shift = state.shift,
            "hf report"
        );
        reports.push(report);

        // UNWRAP: just pushed
        let last = reports.last().unwrap_or_else(|| unreachable!());
        if interact(last) == LoopControl::SoftExit {
            tracing::debug!(ireport, "soft exit requested");
            break;
        }
    }
    Ok(reports)
}
