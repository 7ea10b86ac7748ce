//! Real-space lattice geometry and connectivity tables.
//!
//! The builder walks every site pair against the nearest shell of periodic
//! images and records bonds in two complementary encodings: `tmat` keeps
//! intra-cell and across-boundary bonds apart (so a doubly bonded pair, or a
//! site bonded to its own image, contributes twice to the kinetic term), and
//! `connected_orbs` is the plain symmetric adjacency used by the excitation
//! generators. Tables are indexed by spin-orbital; both spin channels are
//! filled in lockstep.

use crate::bitstring::BitString;
use crate::error::{Error, Result};
use itertools::Itertools;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Geometry of the simulation supercell.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LatticeSpec {
    /// Dimensionality, 1 to 3.
    pub dims: usize,
    /// Lattice vectors spanning the supercell, one per dimension.
    pub vectors: Vec<[i64; 3]>,
    /// Site positions within the supercell.
    pub sites: Vec<[i64; 3]>,
    /// Add the (1,1)/(-1,-1) diagonal bonds of a triangular lattice (2D).
    pub triangular: bool,
    /// Open boundary conditions: no periodic images at all.
    pub finite_cluster: bool,
}

impl LatticeSpec {
    /// Axis-aligned supercell with `lengths[d]` sites along dimension `d`.
    /// Site positions are enumerated with dimension 0 varying fastest.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for zero or more than three dimensions,
    /// or a zero-length dimension.
    pub fn rectangular(lengths: &[usize], triangular: bool, finite_cluster: bool) -> Result<Self> {
        let dims = lengths.len();
        if dims == 0 || dims > 3 {
            return Err(Error::Config(format!(
                "lattice must span 1 to 3 dimensions, got {dims}"
            )));
        }
        if lengths.iter().any(|&l| l == 0) {
            return Err(Error::Config("lattice dimensions must be non-zero".into()));
        }
        if triangular && dims != 2 {
            return Err(Error::Config(
                "triangular bonds are only defined in two dimensions".into(),
            ));
        }

        let mut vectors = Vec::with_capacity(dims);
        for (d, &l) in lengths.iter().enumerate() {
            let mut v = [0_i64; 3];
            v[d] = i64::try_from(l).map_err(|e| Error::Config(e.to_string()))?;
            vectors.push(v);
        }

        // multi_cartesian_product varies its last factor fastest, so feed it
        // the dimensions in reverse to make dimension 0 the fast one
        let sites = lengths
            .iter()
            .rev()
            .map(|&l| 0..i64::try_from(l).unwrap_or_else(|_| unreachable!()))
            .multi_cartesian_product()
            .map(|coords| {
                let mut pos = [0_i64; 3];
                for (d, &c) in coords.iter().rev().enumerate() {
                    pos[d] = c;
                }
                pos
            })
            .collect();

        Ok(Self {
            dims,
            vectors,
            sites,
            triangular,
            finite_cluster,
        })
    }

    /// Number of lattice sites.
    #[must_use]
    pub fn nsites(&self) -> usize {
        self.sites.len()
    }
}

fn l1_norm(v: [i64; 3]) -> i64 {
    v.iter().map(|c| c.abs()).sum()
}

fn sub(a: [i64; 3], b: [i64; 3]) -> [i64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Connectivity tables derived from a [`LatticeSpec`], indexed by
/// spin-orbital. Immutable after construction.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConnectivityTables {
    nbasis: usize,
    tmat: Vec<BitString>,
    connected_orbs: Vec<BitString>,
    connected_sites: Vec<Vec<usize>>,
    next_nearest_orbs: Option<Array2<u32>>,
    t_self_images: bool,
}

impl ConnectivityTables {
    /// Builds the tables for `spec`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the spec has no sites or its vector
    /// count does not match its dimensionality.
    pub fn build(spec: &LatticeSpec, track_next_nearest: bool) -> Result<Self> {
        let nsites = spec.sites.len();
        if nsites == 0 {
            return Err(Error::Config("lattice has no sites".into()));
        }
        if spec.vectors.len() != spec.dims {
            return Err(Error::Config(format!(
                "expected {} lattice vectors, got {}",
                spec.dims,
                spec.vectors.len()
            )));
        }

        let nbasis = 2 * nsites;
        let mut tmat = vec![BitString::zero(nbasis); nbasis];
        let mut connected_orbs = vec![BitString::zero(nbasis); nbasis];

        // nearest shell of periodic images: all coefficient triples in
        // {-1, 0, 1}^dims applied to the supercell vectors
        let images: Vec<(bool, [i64; 3])> = (0..spec.dims)
            .map(|_| [-1_i64, 0, 1])
            .multi_cartesian_product()
            .map(|coeffs| {
                let mut delta = [0_i64; 3];
                for (c, v) in coeffs.iter().zip(&spec.vectors) {
                    for (out, comp) in delta.iter_mut().zip(v) {
                        *out += c * comp;
                    }
                }
                (coeffs.iter().all(|&c| c == 0), delta)
            })
            .collect();

        for i in 0..nsites {
            for j in i..nsites {
                let r = sub(spec.sites[i], spec.sites[j]);
                for &(intra, delta) in &images {
                    let dv = sub(r, delta);
                    let bonded = l1_norm(dv) == 1
                        || (spec.triangular && (dv == [1, 1, 0] || dv == [-1, -1, 0]));
                    if !bonded {
                        continue;
                    }
                    for spin in 0..2 {
                        let (oi, oj) = (2 * i + spin, 2 * j + spin);
                        if intra {
                            tmat[oi].set(oj);
                        } else if !spec.finite_cluster {
                            tmat[oj].set(oi);
                        }
                        if i != j && (intra || !spec.finite_cluster) {
                            connected_orbs[oi].set(oj);
                            connected_orbs[oj].set(oi);
                        }
                    }
                }
            }
        }

        let connected_sites = connected_orbs.iter().map(|orbs| orbs.iter_ones().collect()).collect();

        let next_nearest_orbs = track_next_nearest.then(|| {
            let mut counts = Array2::<u32>::zeros((nbasis, nbasis));
            for i in 0..nbasis {
                for j in connected_orbs[i].iter_ones() {
                    for k in connected_orbs[j].iter_ones() {
                        counts[[i, k]] += 1;
                    }
                }
                counts[[i, i]] = 0;
            }
            counts
        });

        let t_self_images = !spec.finite_cluster && spec.vectors.iter().any(|&v| l1_norm(v) == 1);

        Ok(Self {
            nbasis,
            tmat,
            connected_orbs,
            connected_sites,
            next_nearest_orbs,
            t_self_images,
        })
    }

    /// Number of spin-orbitals covered by the tables.
    #[must_use]
    pub const fn nbasis(&self) -> usize {
        self.nbasis
    }

    /// Number of hopping directions between orbitals `p` and `q`: the
    /// intra-cell and periodic-image flags are independent, so a doubly
    /// bonded pair (or a self-image) counts twice.
    #[must_use]
    pub fn hops(&self, p: usize, q: usize) -> u32 {
        u32::from(self.tmat[p].test(q)) + u32::from(self.tmat[q].test(p))
    }

    /// Symmetric adjacency of orbital `i`, excluding any self bond.
    #[must_use]
    pub fn connected_orbs(&self, i: usize) -> &BitString {
        &self.connected_orbs[i]
    }

    /// Decoded neighbour list of orbital `i`.
    #[must_use]
    pub fn connected_sites(&self, i: usize) -> &[usize] {
        &self.connected_sites[i]
    }

    /// Number of distinct two-bond paths from `i` to `k`, if tracking was
    /// requested at build time.
    #[must_use]
    pub fn next_nearest(&self, i: usize, k: usize) -> Option<u32> {
        self.next_nearest_orbs.as_ref().map(|m| m[[i, k]])
    }

    /// `true` when some supercell dimension has length 1, so every site is
    /// bonded to its own periodic copy.
    #[must_use]
    pub const fn t_self_images(&self) -> bool {
        self.t_self_images
    }
}
