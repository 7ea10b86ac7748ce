//! Annihilation: the cycle-boundary sort-merge of spawned walkers into the
//! main list.
//!
//! The spawn buffer is sorted by determinant, runs of identical determinants
//! are compressed into one signed batch, and the result is merge-joined with
//! the (always sorted) main list. Opposite signs cancel in the sum; records
//! whose every slot reaches zero are dropped. The whole pass is
//! `O(M log M + N)` in the spawn and main sizes.

use crate::bitstring::BitString;
use crate::spawning::{SpawnBuffer, SpawnEntry, SAMPLING_SLOTS};
use crate::walker::Walker;
use rustc_hash::FxHasher;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Deterministic owner assignment for the bulk-synchronous partition model:
/// each process owns the determinants hashing to its rank, and spawned
/// walkers are routed by the same hash before annihilation.
#[must_use]
pub fn owning_process(det: &BitString, nproc: usize) -> usize {
    let mut hasher = FxHasher::default();
    det.hash(&mut hasher);
    usize::try_from(hasher.finish() % nproc as u64).unwrap_or_else(|_| unreachable!())
}

/// Sorts and compresses the spawn buffer, folds it into `main`, and leaves
/// the buffer reset for the next cycle.
pub fn annihilate(main: &mut Vec<Walker>, spawned: &mut SpawnBuffer) {
    spawned.entries_mut().sort_unstable_by(|a, b| a.det.cmp(&b.det));

    // compress runs of identical determinants into single signed batches
    let mut compressed: Vec<SpawnEntry> = Vec::with_capacity(spawned.head());
    for entry in spawned.entries() {
        match compressed.last_mut() {
            Some(last) if last.det == entry.det => {
                for (acc, &p) in last.pops.iter_mut().zip(&entry.pops) {
                    *acc += p;
                }
            }
            _ => compressed.push(entry.clone()),
        }
    }

    // merge-join against the sorted main list
    let mut merged: Vec<Walker> = Vec::with_capacity(main.len() + compressed.len());
    let mut old = main.drain(..).peekable();
    let mut new = compressed.into_iter().peekable();
    loop {
        let order = match (old.peek(), new.peek()) {
            (Some(walker), Some(entry)) => walker.det.cmp(&entry.det),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };
        let walker = match order {
            Ordering::Less => old.next().unwrap_or_else(|| unreachable!()),
            Ordering::Greater => {
                let entry = new.next().unwrap_or_else(|| unreachable!());
                Walker {
                    det: entry.det,
                    pops: entry.pops,
                }
            }
            Ordering::Equal => {
                let mut walker = old.next().unwrap_or_else(|| unreachable!());
                let entry = new.next().unwrap_or_else(|| unreachable!());
                for (acc, &p) in walker.pops.iter_mut().zip(&entry.pops) {
                    *acc += p;
                }
                walker
            }
        };
        if !walker.is_unoccupied() {
            merged.push(walker);
        }
    }
    drop(old);

    *main = merged;
    spawned.reset();
}

/// Sums the unsigned populations of the first `nslots` slots over the list.
#[must_use]
pub fn total_population(main: &[Walker], nslots: usize) -> u64 {
    debug_assert!(nslots <= SAMPLING_SLOTS);
    main.iter().map(|w| w.abs_pop(nslots)).sum()
}
