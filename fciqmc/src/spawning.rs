//! Spawn and death kernels plus the per-cycle spawn buffer.

use crate::bitstring::BitString;
use crate::error::{Error, Result};
use crate::excitgen::EngineRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Population slots carried by every walker record: slot 0 holds Hamiltonian
/// walkers, slot 1 the operator walkers of a Hellmann–Feynman run.
pub const SAMPLING_SLOTS: usize = 2;

/// A spawned batch bound for one determinant.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SpawnEntry {
    /// Target determinant.
    pub det: BitString,
    /// Signed particle counts per sampling slot.
    pub pops: [i32; SAMPLING_SLOTS],
}

/// Pre-allocated append-only buffer filled during a cycle and drained by
/// annihilation at the cycle boundary.
#[derive(Clone, Debug)]
pub struct SpawnBuffer {
    entries: Vec<SpawnEntry>,
    capacity: usize,
    block_start: usize,
}

impl SpawnBuffer {
    /// Buffer holding at most `capacity` spawned batches.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            block_start: 0,
        }
    }

    /// Index of the last filled slot plus one.
    #[must_use]
    pub fn head(&self) -> usize {
        self.entries.len()
    }

    /// Per-process reset point; spawned batches below it belong to earlier
    /// exchange blocks and survive [`Self::reset`].
    #[must_use]
    pub const fn block_start(&self) -> usize {
        self.block_start
    }

    /// Moves the block boundary to the current head.
    pub fn start_block(&mut self) {
        self.block_start = self.entries.len();
    }

    /// Rewinds the head to the block start.
    pub fn reset(&mut self) {
        self.entries.truncate(self.block_start);
    }

    /// Appends `count` signed particles on `det` in sampling slot `slot`.
    ///
    /// # Errors
    ///
    /// Returns a capacity error when the buffer is full; the run should be
    /// relaunched with a larger cap.
    pub fn push(&mut self, det: BitString, slot: usize, count: i32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        if self.entries.len() >= self.capacity {
            return Err(Error::Capacity(format!(
                "spawn buffer full at {} entries",
                self.capacity
            )));
        }
        let mut pops = [0; SAMPLING_SLOTS];
        pops[slot] = count;
        self.entries.push(SpawnEntry { det, pops });
        Ok(())
    }

    /// The filled entries.
    #[must_use]
    pub fn entries(&self) -> &[SpawnEntry] {
        &self.entries
    }

    /// Mutable access for the annihilation sort.
    pub fn entries_mut(&mut self) -> &mut [SpawnEntry] {
        &mut self.entries
    }
}

/// Decides how many progeny a spawn attempt creates and with what sign.
///
/// The magnitude is the floor of `τ|H_ij|/p_gen` plus a Bernoulli draw on the
/// remainder; the sign follows the parent, flipped when `H_ij > 0`.
#[allow(clippy::cast_possible_truncation)]
pub fn attempt_spawn(
    hmatel: f64,
    pgen: f64,
    parent_sign: i32,
    tau: f64,
    rng: &mut EngineRng,
) -> i32 {
    let pspawn = tau * hmatel.abs() / pgen;
    let mut n = pspawn as i32;
    if rng.gen::<f64>() < pspawn - f64::from(n) {
        n += 1;
    }
    if n == 0 {
        return 0;
    }
    if hmatel > 0.0 {
        -parent_sign.signum() * n
    } else {
        parent_sign.signum() * n
    }
}

/// Applies the death/clone step to a whole population at once: each of the
/// `|pop|` particles dies with probability `τ(H_ii − S)` (clones on a
/// negative rate), using the same floor-plus-Bernoulli rounding as spawning.
/// Returns the new signed population, which may cross zero.
#[allow(clippy::cast_possible_truncation)]
pub fn stochastic_death(hdiag: f64, shift: f64, pop: i32, tau: f64, rng: &mut EngineRng) -> i32 {
    if pop == 0 {
        return 0;
    }
    let rate = tau * (hdiag - shift) * f64::from(pop.abs());
    let mut n = rate.abs() as i32;
    if rng.gen::<f64>() < rate.abs() - f64::from(n) {
        n += 1;
    }
    if rate >= 0.0 {
        pop - pop.signum() * n
    } else {
        pop + pop.signum() * n
    }
}
