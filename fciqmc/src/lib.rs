//! Walker-based stochastic samplers for lattice and molecular
//! electronic-structure Hamiltonians.
//!
//! The crate evolves a signed population of integer-weighted walkers over a
//! Hilbert space of Slater determinants (full configuration interaction
//! quantum Monte Carlo), together with the combinatorial machinery the inner
//! loop depends on: packed determinant bit strings, lattice connectivity
//! tables, excitation generators and Slater–Condon matrix elements. A
//! deterministic companion diagonalises small model Hamiltonians through the
//! same CSR kernels.

pub mod annihilation;
pub mod bitstring;
mod convert;
pub mod csr;
pub mod determinant;
pub mod error;
pub mod excitation;
pub mod excitgen;
pub mod hamiltonian;
pub mod hubbard_excit;
pub mod integrals;
pub mod lanczos;
pub mod lattice;
pub mod molecular_excit;
pub mod qmc;
pub mod spawning;
pub mod symmetry;
pub mod system;
pub mod walker;
