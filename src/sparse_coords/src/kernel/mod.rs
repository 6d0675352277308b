//! Kernel geometry and kernel maps.
//!
//! A kernel map lists, for every kernel offset, the `(input row, output row)`
//! pairs that the offset connects. Numeric consumers gather input features
//! along `in_rows(k)`, multiply by the weight slice of offset `k` and scatter
//! into `out_rows(k)`; the backward pass walks the same lists the other way.

mod region;

pub use region::{KernelGeometry, KernelRegion, RegionType};

/// Pairs produced for one kernel offset, ordered by ascending output row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetPairs {
    pub in_rows: Vec<u32>,
    pub out_rows: Vec<u32>,
}

impl OffsetPairs {
    pub fn len(&self) -> usize {
        self.in_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_rows.is_empty()
    }

    /// Build from unordered pairs, sorting by `(out_row, in_row)`.
    pub(crate) fn from_unsorted(mut pairs: Vec<(u32, u32)>) -> Self {
        pairs.sort_unstable_by_key(|&(in_row, out_row)| (out_row, in_row));
        let (in_rows, out_rows) = pairs.into_iter().unzip();
        Self { in_rows, out_rows }
    }
}

/// Immutable per-offset correspondence table between two levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelMap {
    displacements: Vec<Vec<i64>>,
    pairs: Vec<OffsetPairs>,
}

impl KernelMap {
    pub(crate) fn new(displacements: Vec<Vec<i64>>, pairs: Vec<OffsetPairs>) -> Self {
        debug_assert_eq!(displacements.len(), pairs.len());
        Self {
            displacements,
            pairs,
        }
    }

    /// Number of kernel offsets, including offsets without pairs.
    pub fn num_offsets(&self) -> usize {
        self.pairs.len()
    }

    /// Displacement applied by offset `k`.
    ///
    /// Panics if `k >= num_offsets()`, as do the other per-offset accessors.
    pub fn displacement(&self, k: usize) -> &[i64] {
        &self.displacements[k]
    }

    /// Input rows of offset `k`. Panics if `k >= num_offsets()`.
    pub fn in_rows(&self, k: usize) -> &[u32] {
        &self.pairs[k].in_rows
    }

    /// Output rows of offset `k`, ascending. Panics if `k >= num_offsets()`.
    pub fn out_rows(&self, k: usize) -> &[u32] {
        &self.pairs[k].out_rows
    }

    /// Number of pairs for offset `k`. Panics if `k >= num_offsets()`.
    pub fn pair_count(&self, k: usize) -> usize {
        self.pairs[k].len()
    }

    /// Pair count of every offset, for consumers pre-allocating buffers.
    pub fn pair_counts(&self) -> Vec<usize> {
        self.pairs.iter().map(OffsetPairs::len).collect()
    }

    pub fn total_pairs(&self) -> usize {
        self.pairs.iter().map(OffsetPairs::len).sum()
    }

    /// `(input row, output row)` pairs of offset `k`.
    ///
    /// Panics if `k >= num_offsets()`.
    pub fn pairs(&self, k: usize) -> impl ExactSizeIterator<Item = (u32, u32)> + '_ {
        let pairs = &self.pairs[k];
        pairs
            .in_rows
            .iter()
            .copied()
            .zip(pairs.out_rows.iter().copied())
    }

    /// Iterate over `(displacement, pairs)` in kernel order.
    pub fn iter(&self) -> impl Iterator<Item = (&[i64], &OffsetPairs)> + '_ {
        self.displacements
            .iter()
            .map(Vec::as_slice)
            .zip(self.pairs.iter())
    }

    /// The same correspondence seen from the output side.
    ///
    /// Input and output rows trade places; each list is re-sorted by its new
    /// output row.
    pub fn swapped(&self) -> Self {
        let pairs = self
            .pairs
            .iter()
            .map(|p| {
                OffsetPairs::from_unsorted(
                    p.out_rows.iter().copied().zip(p.in_rows.iter().copied()).collect(),
                )
            })
            .collect();
        Self::new(self.displacements.clone(), pairs)
    }
}
