//! The excitation-generator contract shared by all system regimes.
//!
//! Generators are capability values selected once at initialisation and
//! passed explicitly into the walker loop; there is no module-scope mutable
//! dispatch. Every generator honours the same contract: draw a connected
//! determinant, report the probability of having drawn exactly that
//! determinant, and hand back the Hamiltonian matrix element. A draw that
//! lands on a forbidden excitation returns the null result with `pgen = 1`,
//! which keeps the spawning ratio finite without renormalising the
//! single/double attempt split.

use crate::bitstring::BitString;
use crate::determinant::DetOcc;
use crate::error::{Error, Result};
use crate::hubbard_excit::{HubbardKGen, HubbardRealGen};
use crate::molecular_excit::MolecularGen;
use crate::system::{System, SystemKind};
use enum_dispatch::enum_dispatch;

/// The engine's reproducible random-number generator.
pub type EngineRng = rand_pcg::Pcg64;

/// A walker's determinant decoded once per cycle and shared by every spawn
/// attempt from that walker.
#[derive(Clone, Debug)]
pub struct CurrentDet {
    /// The packed determinant.
    pub bits: BitString,
    /// Cached occupied-orbital lists.
    pub occ: DetOcc,
}

impl CurrentDet {
    /// Decodes `bits` into the cached lists.
    #[must_use]
    pub fn decode(bits: &BitString) -> Self {
        Self {
            bits: bits.clone(),
            occ: DetOcc::decode(bits),
        }
    }
}

/// Outcome of one excitation-generation attempt.
#[derive(Clone, Debug)]
pub struct GenResult {
    /// The connected determinant, or `None` when the draw was disallowed.
    pub target: Option<BitString>,
    /// Probability of having generated this excitation.
    pub pgen: f64,
    /// Hamiltonian matrix element `⟨D|H|D'⟩`, permutational sign included.
    pub hmatel: f64,
}

impl GenResult {
    /// The null excitation. `pgen = 1` keeps downstream ratios defined.
    #[must_use]
    pub const fn forbidden() -> Self {
        Self {
            target: None,
            pgen: 1.0,
            hmatel: 0.0,
        }
    }
}

/// Biased random draws of determinants connected to `cdet`.
#[enum_dispatch]
pub trait ExcitGen {
    /// Draws one connected determinant.
    fn gen_excit(&self, sys: &System, cdet: &CurrentDet, rng: &mut EngineRng) -> GenResult;
}

/// The available generator regimes.
#[enum_dispatch(ExcitGen)]
#[derive(Clone, Debug)]
pub enum ExcitGenEnum {
    /// Real-space Hubbard: nearest-neighbour singles.
    HubbardRealGen,
    /// Momentum-space Hubbard: momentum-conserving opposite-spin doubles.
    HubbardKGen,
    /// Molecular: symmetry-aware singles and doubles.
    MolecularGen,
}

impl ExcitGenEnum {
    /// Selects the generator for `sys`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for system kinds the engine cannot
    /// evolve, or for an attempt probability outside `[0, 1]`.
    pub fn for_system(sys: &System, pattempt_single: f64, renorm: bool) -> Result<Self> {
        if !(0.0..=1.0).contains(&pattempt_single) {
            return Err(Error::Config(format!(
                "single-excitation attempt probability must lie in [0, 1], got {pattempt_single}"
            )));
        }
        match sys.kind {
            SystemKind::HubbardReal => Ok(HubbardRealGen.into()),
            SystemKind::HubbardK => Ok(HubbardKGen.into()),
            SystemKind::Molecular => Ok(MolecularGen::new(pattempt_single, renorm).into()),
            SystemKind::Heisenberg | SystemKind::ChungLandau => Err(Error::Config(format!(
                "no excitation generator for {:?} systems in this engine",
                sys.kind
            ))),
        }
    }
}
