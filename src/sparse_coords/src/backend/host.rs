//! Host backend: concurrent hash claims and parallel probing over offsets and anchor rows.

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::trace;

use super::{check_region_width, Claim, CoordinateBackend, DedupPlan, Probe};
use crate::coordinate::{CoordinateBatch, CoordinateInt};
use crate::error::Result;
use crate::index::CoordinateIndex;
use crate::kernel::{KernelMap, KernelRegion, OffsetPairs};

/// Backend running on the rayon pool of the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostBackend;

impl HostBackend {
    pub fn new() -> Self {
        Self
    }
}

impl<T: CoordinateInt> CoordinateBackend<T> for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn dedup(&self, index: &CoordinateIndex<T>, batch: &CoordinateBatch<T>) -> Result<DedupPlan> {
        let n = batch.len();

        // Claim-or-find: every unknown coordinate keeps the smallest input row
        // that carries it, whichever thread gets there first.
        let heads: DashMap<&[T], u32> = DashMap::with_capacity(n);
        let existing: Vec<Option<u32>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let coordinate = batch.row(i);
                let found = index.lookup(coordinate);
                if found.is_none() {
                    heads
                        .entry(coordinate)
                        .and_modify(|head| *head = (*head).min(i as u32))
                        .or_insert(i as u32);
                }
                found
            })
            .collect();

        let mut new_rows: Vec<u32> = heads.iter().map(|entry| *entry.value()).collect();
        new_rows.par_sort_unstable();
        trace!(
            rows = n,
            new = new_rows.len(),
            "host dedup claimed first occurrences"
        );

        let claims = existing
            .par_iter()
            .enumerate()
            .map(|(i, found)| match *found {
                Some(row) => Claim::Existing(row),
                None => {
                    let head = heads.get(batch.row(i)).map_or(i as u32, |h| *h.value());
                    // Heads are unique, so the search always hits.
                    let rank = new_rows.binary_search(&head).unwrap_or_else(|r| r);
                    Claim::New(rank as u32)
                }
            })
            .collect();

        Ok(DedupPlan { new_rows, claims })
    }

    fn kernel_map(
        &self,
        input: &CoordinateIndex<T>,
        output: &CoordinateIndex<T>,
        region: &KernelRegion,
        batch_offset: usize,
        transpose: bool,
    ) -> Result<KernelMap> {
        check_region_width(input, output, region, batch_offset)?;

        // Anchors are always the rows of one side; probes land on the other.
        let (anchors, targets) = if transpose {
            (input, output)
        } else {
            (output, input)
        };

        let width = anchors.width();
        let pairs: Vec<OffsetPairs> = (0..region.len())
            .into_par_iter()
            .map(|k| {
                let found: Vec<(u32, u32)> = anchors
                    .coordinates()
                    .as_flat()
                    .par_chunks(width)
                    .enumerate()
                    .map_init(
                        || Probe::new(width),
                        |probe, (anchor_row, anchor)| {
                            let neighbor = probe.shift(region, anchor, k, batch_offset)?;
                            let target_row = targets.lookup(neighbor)?;
                            let anchor_row = anchor_row as u32;
                            Some(if transpose {
                                (anchor_row, target_row)
                            } else {
                                (target_row, anchor_row)
                            })
                        },
                    )
                    .flatten()
                    .collect();
                OffsetPairs::from_unsorted(found)
            })
            .collect();

        Ok(KernelMap::new(region.displacements.clone(), pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelGeometry;
    use crate::test_utils::make_random_coordinates;

    fn level(rows: &[[i32; 2]]) -> CoordinateIndex<i32> {
        CoordinateIndex::from_batch(&CoordinateBatch::from_rows(rows).unwrap(), &HostBackend)
            .unwrap()
            .0
    }

    #[test]
    fn test_dedup_against_index() {
        let index = level(&[[0, 0], [1, 1]]);
        let batch = CoordinateBatch::from_rows(&[[2, 2], [1, 1], [3, 3], [2, 2]]).unwrap();
        let plan = HostBackend.dedup(&index, &batch).unwrap();
        assert_eq!(plan.new_rows, vec![0, 2]);
        assert_eq!(
            plan.claims,
            vec![
                Claim::New(0),
                Claim::Existing(1),
                Claim::New(1),
                Claim::New(0)
            ]
        );
    }

    #[test]
    fn test_3x3_map_on_sparse_square() {
        let square = level(&[[0, 0], [0, 2], [2, 0], [2, 2]]);
        let region = KernelGeometry::cube(2, 3, 1, 1).region(2).unwrap();
        let map = HostBackend
            .kernel_map(&square, &square, &region, 0, false)
            .unwrap();

        assert_eq!(map.num_offsets(), 9);
        // Center offset: identity.
        assert_eq!(
            map.pairs(4).collect::<Vec<_>>(),
            vec![(0, 0), (1, 1), (2, 2), (3, 3)]
        );
        // No coordinate sits one step away from another.
        assert_eq!(map.total_pairs(), 4);
    }

    #[test]
    fn test_dense_grid_neighbors() {
        // 0 1 2 along one axis
        let line = CoordinateIndex::from_batch(
            &CoordinateBatch::from_rows(&[[0i32], [1], [2]]).unwrap(),
            &HostBackend,
        )
        .unwrap()
        .0;
        let region = KernelGeometry::cube(1, 3, 1, 1).region(1).unwrap();
        let map = HostBackend.kernel_map(&line, &line, &region, 0, false).unwrap();

        assert_eq!(map.pairs(0).collect::<Vec<_>>(), vec![(0, 1), (1, 2)]);
        assert_eq!(map.pairs(2).collect::<Vec<_>>(), vec![(1, 0), (2, 1)]);
        assert_eq!(map.pair_counts(), vec![2, 3, 2]);
    }

    #[test]
    fn test_single_offset_map_on_pool() {
        let batch = make_random_coordinates::<i32>(5000, 3, 30, 17);
        let (index, _) = CoordinateIndex::from_batch(&batch, &HostBackend).unwrap();
        let region = KernelGeometry::custom(vec![vec![0, 0, 0]], vec![1, 1, 1], vec![1, 1, 1])
            .region(3)
            .unwrap();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        let map = pool
            .install(|| HostBackend.kernel_map(&index, &index, &region, 0, false))
            .unwrap();

        let n = index.len() as u32;
        assert_eq!(map.num_offsets(), 1);
        assert_eq!(
            map.pairs(0).collect::<Vec<_>>(),
            (0..n).map(|r| (r, r)).collect::<Vec<_>>()
        );
    }
}
