//! Walker records held in the main list.

use crate::bitstring::BitString;
use crate::spawning::SAMPLING_SLOTS;
use serde::{Deserialize, Serialize};

/// A signed walker population on one determinant. After annihilation every
/// determinant appears in the main list at most once.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Walker {
    /// The determinant this population lives on.
    pub det: BitString,
    /// Signed populations, one per sampling slot.
    pub pops: [i32; SAMPLING_SLOTS],
}

impl Walker {
    /// New walker with `pop` Hamiltonian particles.
    #[must_use]
    pub fn new(det: BitString, pop: i32) -> Self {
        let mut pops = [0; SAMPLING_SLOTS];
        pops[0] = pop;
        Self { det, pops }
    }

    /// Total unsigned population over the first `nslots` sampling slots.
    #[must_use]
    pub fn abs_pop(&self, nslots: usize) -> u64 {
        self.pops[..nslots].iter().map(|p| u64::from(p.unsigned_abs())).sum()
    }

    /// `true` when every slot is empty; such records are dropped by
    /// annihilation.
    #[must_use]
    pub fn is_unoccupied(&self) -> bool {
        self.pops.iter().all(|&p| p == 0)
    }
}
