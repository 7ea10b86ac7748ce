//! System descriptions consumed by the walker engine.
//!
//! A [`System`] bundles everything the inner loop needs to know about the
//! Hamiltonian: electron counts, the single-particle basis, and whichever of
//! the connectivity tables, symmetry table and integral store the system kind
//! calls for. It is immutable after construction; constructors validate their
//! inputs and fail with configuration errors rather than deferring problems
//! into the stochastic loop.

use crate::bitstring::BitString;
use crate::determinant;
use crate::error::{Error, Result};
use crate::integrals::MolecularIntegrals;
use crate::lattice::{ConnectivityTables, LatticeSpec};
use crate::symmetry::SymTable;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Spin projection of a single spin-orbital.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Spin {
    /// m_s = +1/2, even orbital indices.
    Alpha,
    /// m_s = -1/2, odd orbital indices.
    Beta,
}

impl Spin {
    /// Spin of the spin-orbital with index `orb`.
    #[must_use]
    pub const fn of_orb(orb: usize) -> Self {
        if orb % 2 == 0 {
            Self::Alpha
        } else {
            Self::Beta
        }
    }

    /// Index (0 for alpha, 1 for beta) used by per-spin lookup tables.
    #[must_use]
    pub const fn channel(self) -> usize {
        match self {
            Self::Alpha => 0,
            Self::Beta => 1,
        }
    }

    /// Twice the spin projection, +1 or -1.
    #[must_use]
    pub const fn ms2(self) -> i64 {
        match self {
            Self::Alpha => 1,
            Self::Beta => -1,
        }
    }
}

/// Hamiltonian family a [`System`] describes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SystemKind {
    /// Hubbard model in the momentum-space (Bloch) basis.
    HubbardK,
    /// Hubbard model in the real-space (site) basis.
    HubbardReal,
    /// Heisenberg spin model on a lattice.
    Heisenberg,
    /// Chung–Landau hard-core boson model.
    ChungLandau,
    /// Molecular system defined by an integral store.
    Molecular,
}

/// A single-particle basis function.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BasisFn {
    /// Wavevector in units of the reciprocal supercell vectors (lattice
    /// systems) or the site position (real space).
    pub k: [i64; 3],
    /// Spin channel.
    pub spin: Spin,
    /// Symmetry label: irrep index (molecular) or wavevector index (lattice).
    pub sym: usize,
    /// Single-particle energy; the kinetic dispersion for momentum-space
    /// systems, zero elsewhere.
    pub sp_energy: f64,
}

/// Everything the walker loop needs to know about one Hamiltonian.
#[derive(Clone, Debug)]
pub struct System {
    /// Hamiltonian family.
    pub kind: SystemKind,
    /// Total electron count.
    pub n_el: usize,
    /// Alpha electron count.
    pub n_alpha: usize,
    /// Beta electron count.
    pub n_beta: usize,
    /// Number of spin-orbitals.
    pub n_basis: usize,
    /// Number of spatial orbitals or lattice sites.
    pub nsites: usize,
    /// The single-particle basis, indexed by spin-orbital.
    pub basis_fns: Vec<BasisFn>,
    /// Hopping amplitude `t` (lattice systems).
    pub hubbard_t: f64,
    /// On-site repulsion `U` (lattice systems).
    pub hubbard_u: f64,
    /// Lattice geometry, for real-space systems.
    pub lattice: Option<LatticeSpec>,
    /// Connectivity tables, for real-space systems.
    pub tables: Option<ConnectivityTables>,
    /// Symmetry product table (crystal momentum or point group).
    pub sym_table: Option<SymTable>,
    /// Integral store, for molecular systems.
    pub integrals: Option<MolecularIntegrals>,
    /// Spin-orbitals grouped by `[sym][spin channel]`, for symmetry-aware
    /// generators.
    pub orbs_by_sym: Vec<[Vec<usize>; 2]>,
}

fn validate_fill(n_alpha: usize, n_beta: usize, nsites: usize) -> Result<()> {
    if n_alpha + n_beta == 0 {
        return Err(Error::Config("system needs at least one electron".into()));
    }
    if n_alpha > nsites || n_beta > nsites {
        return Err(Error::Config(format!(
            "cannot place {n_alpha} alpha / {n_beta} beta electrons on {nsites} orbitals"
        )));
    }
    Ok(())
}

impl System {
    /// Real-space Hubbard model on `spec` with `n_alpha + n_beta` electrons.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an over-filled lattice or a
    /// degenerate geometry.
    pub fn hubbard_real(
        spec: LatticeSpec,
        n_alpha: usize,
        n_beta: usize,
        u: f64,
        t: f64,
    ) -> Result<Self> {
        let nsites = spec.nsites();
        validate_fill(n_alpha, n_beta, nsites)?;
        let tables = ConnectivityTables::build(&spec, true)?;
        let n_basis = 2 * nsites;

        let basis_fns = (0..n_basis)
            .map(|orb| BasisFn {
                k: spec.sites[orb / 2],
                spin: Spin::of_orb(orb),
                sym: 0,
                sp_energy: 0.0,
            })
            .collect();

        Ok(Self {
            kind: SystemKind::HubbardReal,
            n_el: n_alpha + n_beta,
            n_alpha,
            n_beta,
            n_basis,
            nsites,
            basis_fns,
            hubbard_t: t,
            hubbard_u: u,
            lattice: Some(spec),
            tables: Some(tables),
            sym_table: None,
            integrals: None,
            orbs_by_sym: Vec::new(),
        })
    }

    /// Momentum-space Hubbard model on an axis-aligned supercell with
    /// `lengths[d]` sites along each dimension. The kinetic dispersion is
    /// `-2t Σ_d cos(2π k_d / l_d)`; wavevector indices double as symmetry
    /// labels under the translation group.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an over-filled cell or a degenerate
    /// dimension list.
    pub fn hubbard_k(
        lengths: &[usize],
        n_alpha: usize,
        n_beta: usize,
        u: f64,
        t: f64,
    ) -> Result<Self> {
        let sym_table = SymTable::translation_group(lengths)?;
        let nsites: usize = lengths.iter().product();
        validate_fill(n_alpha, n_beta, nsites)?;
        let n_basis = 2 * nsites;

        let mut basis_fns = Vec::with_capacity(n_basis);
        for ksite in 0..nsites {
            let mut k = [0_i64; 3];
            let mut index = ksite;
            let mut dispersion = 0.0;
            for (d, &l) in lengths.iter().enumerate() {
                let kd = index % l;
                index /= l;
                k[d] = i64::try_from(kd).unwrap_or_else(|_| unreachable!());
                dispersion += (2.0 * PI * crate::convert::f64_from_usize(kd)
                    / crate::convert::f64_from_usize(l))
                .cos();
            }
            let sp_energy = -2.0 * t * dispersion;
            for spin in [Spin::Alpha, Spin::Beta] {
                basis_fns.push(BasisFn {
                    k,
                    spin,
                    sym: ksite,
                    sp_energy,
                });
            }
        }

        Ok(Self {
            kind: SystemKind::HubbardK,
            n_el: n_alpha + n_beta,
            n_alpha,
            n_beta,
            n_basis,
            nsites,
            basis_fns,
            hubbard_t: t,
            hubbard_u: u,
            lattice: None,
            tables: None,
            sym_table: Some(sym_table),
            integrals: None,
            orbs_by_sym: Vec::new(),
        })
    }

    /// Molecular system over `integrals`, with `orbsym[m]` the irrep label of
    /// spatial orbital `m`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `orbsym` does not cover the orbital
    /// count or the electrons do not fit the basis.
    pub fn molecular(
        integrals: MolecularIntegrals,
        orbsym: &[usize],
        n_alpha: usize,
        n_beta: usize,
    ) -> Result<Self> {
        let norb = integrals.norb();
        if orbsym.len() != norb {
            return Err(Error::Config(format!(
                "orbital symmetry list covers {} of {norb} orbitals",
                orbsym.len()
            )));
        }
        validate_fill(n_alpha, n_beta, norb)?;

        let nsym = orbsym
            .iter()
            .max()
            .map_or(1, |&m| (m + 1).next_power_of_two());
        let sym_table = SymTable::xor_group(nsym)?;

        let n_basis = 2 * norb;
        let basis_fns: Vec<BasisFn> = (0..n_basis)
            .map(|orb| BasisFn {
                k: [0; 3],
                spin: Spin::of_orb(orb),
                sym: orbsym[orb / 2],
                sp_energy: 0.0,
            })
            .collect();

        let mut orbs_by_sym = vec![[Vec::new(), Vec::new()]; nsym];
        for (orb, basis_fn) in basis_fns.iter().enumerate() {
            orbs_by_sym[basis_fn.sym][basis_fn.spin.channel()].push(orb);
        }

        Ok(Self {
            kind: SystemKind::Molecular,
            n_el: n_alpha + n_beta,
            n_alpha,
            n_beta,
            n_basis,
            nsites: norb,
            basis_fns,
            hubbard_t: 0.0,
            hubbard_u: 0.0,
            lattice: None,
            tables: None,
            sym_table: Some(sym_table),
            integrals: Some(integrals),
            orbs_by_sym,
        })
    }

    /// Connectivity tables; present for real-space lattice systems.
    ///
    /// # Panics
    ///
    /// Panics if called on a system without tables.
    #[must_use]
    pub fn tables(&self) -> &ConnectivityTables {
        // UNWRAP: guaranteed by the lattice constructors
        self.tables.as_ref().unwrap_or_else(|| unreachable!())
    }

    /// Symmetry product table; present for momentum-space and molecular
    /// systems.
    ///
    /// # Panics
    ///
    /// Panics if called on a system without a symmetry table.
    #[must_use]
    pub fn sym_table(&self) -> &SymTable {
        // UNWRAP: guaranteed by the constructors
        self.sym_table.as_ref().unwrap_or_else(|| unreachable!())
    }

    /// Integral store; present for molecular systems.
    ///
    /// # Panics
    ///
    /// Panics if called on a non-molecular system.
    #[must_use]
    pub fn integrals(&self) -> &MolecularIntegrals {
        // UNWRAP: guaranteed by `Self::molecular`
        self.integrals.as_ref().unwrap_or_else(|| unreachable!())
    }

    /// Aufbau-style reference determinant: the `n_alpha`/`n_beta` lowest
    /// spin-orbitals, ordered by single-particle energy then index.
    #[must_use]
    pub fn aufbau_reference(&self) -> BitString {
        let mut by_energy: Vec<usize> = (0..self.n_basis).collect();
        by_energy.sort_by(|&a, &b| {
            self.basis_fns[a]
                .sp_energy
                .partial_cmp(&self.basis_fns[b].sp_energy)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        let mut occ = Vec::with_capacity(self.n_el);
        let (mut na, mut nb) = (0, 0);
        for orb in by_energy {
            match Spin::of_orb(orb) {
                Spin::Alpha if na < self.n_alpha => {
                    na += 1;
                    occ.push(orb);
                }
                Spin::Beta if nb < self.n_beta => {
                    nb += 1;
                    occ.push(orb);
                }
                _ => {}
            }
        }
        occ.sort_unstable();
        determinant::encode(&occ, self.n_basis)
    }
}
