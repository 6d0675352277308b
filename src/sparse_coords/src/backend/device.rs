//! Device backend: sort, segment, scan and compact.
//!
//! Every step works on flat buffers obtained from the backend's
//! [`Allocator`], so the whole pipeline can be budgeted the way a device
//! memory pool would be.
//!
//! # Dedup
//!
//! 1. **Sort**: input row ids ordered by `(coordinate, row)`.
//! 2. **Segment**: mark runs of equal coordinates; the first element of each
//!    run is the smallest input row carrying that coordinate.
//! 3. **Probe**: look every run head up in the existing index.
//! 4. **Compact**: exclusive scan over "unknown" flags, gather unknown heads,
//!    order them by first occurrence.
//! 5. **Scatter**: hand every input row the claim of its run.
//!
//! # Kernel maps
//!
//! Target rows are sorted by coordinate once. Per offset, every anchor
//! generates its candidate, binary-searches the sorted table, and the hits
//! are compacted with an exclusive scan.

use rayon::prelude::*;
use tracing::trace;

use super::{check_region_width, Claim, CoordinateBackend, DedupPlan, Probe};
use crate::allocator::{Allocator, DeviceVec};
use crate::coordinate::{CoordinateBatch, CoordinateInt};
use crate::error::Result;
use crate::index::CoordinateIndex;
use crate::kernel::{KernelMap, KernelRegion, OffsetPairs};

/// Elements handled per scan/compaction block.
const BLOCK_SIZE: usize = 4096;

const NOT_FOUND: u32 = u32::MAX;

/// Exclusive prefix sum of `values` into `out`; returns the total.
///
/// Block sums are computed in parallel, combined sequentially, then every
/// block is rescanned in parallel from its base.
pub fn exclusive_scan(values: &[u32], out: &mut [u32]) -> u32 {
    debug_assert_eq!(values.len(), out.len());
    let block_sums: Vec<u32> = values
        .par_chunks(BLOCK_SIZE)
        .map(|block| block.iter().sum())
        .collect();

    let mut bases = Vec::with_capacity(block_sums.len());
    let mut total = 0u32;
    for sum in block_sums {
        bases.push(total);
        total += sum;
    }

    out.par_chunks_mut(BLOCK_SIZE)
        .zip(values.par_chunks(BLOCK_SIZE))
        .zip(bases.par_iter())
        .for_each(|((out, values), &base)| {
            let mut acc = base;
            for (slot, &value) in out.iter_mut().zip(values) {
                *slot = acc;
                acc += value;
            }
        });

    total
}

/// Mark run boundaries of a sorted sequence and number the runs.
///
/// `same_as_previous(i)` is only called for `i >= 1`. On return
/// `flags[i] == 1` iff element `i` starts a run, and `segment_ids[i]` is the
/// run of element `i`. Returns the number of runs.
pub fn detect_segments<F>(same_as_previous: F, flags: &mut [u32], segment_ids: &mut [u32]) -> u32
where
    F: Fn(usize) -> bool + Sync,
{
    if flags.is_empty() {
        return 0;
    }

    flags.par_iter_mut().enumerate().for_each(|(i, flag)| {
        *flag = u32::from(i == 0 || !same_as_previous(i));
    });

    let num_segments = exclusive_scan(flags, segment_ids);
    // Exclusive scan counts earlier heads; a head belongs to the run it opens.
    segment_ids
        .par_iter_mut()
        .zip(flags.par_iter())
        .for_each(|(id, &flag)| *id = *id + flag - 1);

    num_segments
}

/// Gather `value(i)` for every flagged `i` into `out`, preserving order.
///
/// `positions` is the exclusive scan of `flags` and `out.len()` its total.
pub fn compact<V, F>(flags: &[u32], positions: &[u32], out: &mut [V], value: F)
where
    V: Send,
    F: Fn(usize) -> V + Sync,
{
    let total = out.len();
    let mut blocks = Vec::with_capacity(flags.len().div_ceil(BLOCK_SIZE));
    let mut rest = out;
    for start in (0..flags.len()).step_by(BLOCK_SIZE) {
        let end = (start + BLOCK_SIZE).min(flags.len());
        let block_end = positions.get(end).map_or(total, |&p| p as usize);
        let len = block_end - positions[start] as usize;
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
        blocks.push((start, end, head));
        rest = tail;
    }

    blocks.into_par_iter().for_each(|(start, end, slots)| {
        let mut slots = slots.iter_mut();
        for i in start..end {
            if flags[i] != 0 {
                if let Some(slot) = slots.next() {
                    *slot = value(i);
                }
            }
        }
    });
}

/// Backend whose buffers are all requested from an [`Allocator`].
#[derive(Debug)]
pub struct DeviceBackend<A> {
    allocator: A,
}

impl<A: Allocator> DeviceBackend<A> {
    pub fn new(allocator: A) -> Self {
        Self { allocator }
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }
}

impl<T: CoordinateInt, A: Allocator> CoordinateBackend<T> for DeviceBackend<A> {
    fn name(&self) -> &'static str {
        "device"
    }

    fn dedup(&self, index: &CoordinateIndex<T>, batch: &CoordinateBatch<T>) -> Result<DedupPlan> {
        let alloc = &self.allocator;
        let n = batch.len();
        let width = batch.width();

        let coordinates = DeviceVec::from_vec(alloc, batch.as_flat().to_vec())?;
        let flat: &[T] = &coordinates;
        let row = |i: u32| &flat[i as usize * width..(i as usize + 1) * width];

        // Sort
        let mut order = DeviceVec::from_vec(alloc, (0..n as u32).collect())?;
        order.par_sort_unstable_by(|&a, &b| row(a).cmp(row(b)).then(a.cmp(&b)));
        let order: &[u32] = &order;

        // Segment
        let mut flags = DeviceVec::filled(alloc, n, 0u32)?;
        let mut segment_ids = DeviceVec::filled(alloc, n, 0u32)?;
        let num_segments = detect_segments(
            |i| row(order[i]) == row(order[i - 1]),
            &mut flags,
            &mut segment_ids,
        ) as usize;

        let mut positions = DeviceVec::filled(alloc, n, 0u32)?;
        exclusive_scan(&flags, &mut positions);
        let mut heads = DeviceVec::filled(alloc, num_segments, 0u32)?;
        compact(&flags, &positions, &mut heads, |i| order[i]);

        // Probe
        let mut existing = DeviceVec::filled(alloc, num_segments, NOT_FOUND)?;
        existing
            .par_iter_mut()
            .zip(heads.par_iter())
            .for_each(|(slot, &head)| {
                if let Some(found) = index.lookup(row(head)) {
                    *slot = found;
                }
            });

        // Compact unknown heads
        let mut unknown = DeviceVec::filled(alloc, num_segments, 0u32)?;
        unknown
            .par_iter_mut()
            .zip(existing.par_iter())
            .for_each(|(flag, &found)| *flag = u32::from(found == NOT_FOUND));
        let mut unknown_positions = DeviceVec::filled(alloc, num_segments, 0u32)?;
        let num_new = exclusive_scan(&unknown, &mut unknown_positions) as usize;
        let mut new_rows = DeviceVec::filled(alloc, num_new, 0u32)?;
        compact(&unknown, &unknown_positions, &mut new_rows, |s| heads[s]);
        new_rows.par_sort_unstable();

        let mut segment_claims = DeviceVec::filled(alloc, num_segments, Claim::Existing(0))?;
        segment_claims
            .par_iter_mut()
            .enumerate()
            .for_each(|(s, claim)| {
                *claim = if existing[s] != NOT_FOUND {
                    Claim::Existing(existing[s])
                } else {
                    let rank = new_rows.binary_search(&heads[s]).unwrap_or_else(|r| r);
                    Claim::New(rank as u32)
                };
            });

        // Scatter
        let mut segment_of_row = DeviceVec::filled(alloc, n, 0u32)?;
        for (i, &input_row) in order.iter().enumerate() {
            segment_of_row[input_row as usize] = segment_ids[i];
        }
        let claims = segment_of_row
            .par_iter()
            .map(|&s| segment_claims[s as usize])
            .collect();

        trace!(
            rows = n,
            segments = num_segments,
            new = num_new,
            "device dedup finished"
        );
        Ok(DedupPlan {
            new_rows: new_rows.into_host(),
            claims,
        })
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
        let alloc = &self.allocator;

        let (anchors, targets) = if transpose {
            (input, output)
        } else {
            (output, input)
        };
        let width = anchors.width();
        let num_anchors = anchors.len();

        let target_coords = DeviceVec::from_vec(alloc, targets.coordinates().as_flat().to_vec())?;
        let target_flat: &[T] = &target_coords;
        let target_row = |i: u32| &target_flat[i as usize * width..(i as usize + 1) * width];

        let mut table = DeviceVec::from_vec(alloc, (0..targets.len() as u32).collect())?;
        table.par_sort_unstable_by(|&a, &b| target_row(a).cmp(target_row(b)));
        let table: &[u32] = &table;

        let anchor_coords = DeviceVec::from_vec(alloc, anchors.coordinates().as_flat().to_vec())?;
        let anchor_flat: &[T] = &anchor_coords;

        let mut pairs = Vec::with_capacity(region.len());
        for k in 0..region.len() {
            let mut hits = DeviceVec::filled(alloc, num_anchors, NOT_FOUND)?;
            hits.par_iter_mut()
                .zip(anchor_flat.par_chunks(width))
                .for_each_init(
                    || Probe::new(width),
                    |probe, (hit, anchor)| {
                        let Some(neighbor) = probe.shift(region, anchor, k, batch_offset) else {
                            return;
                        };
                        if let Ok(p) = table.binary_search_by(|&t| target_row(t).cmp(neighbor)) {
                            *hit = table[p];
                        }
                    },
                );

            let mut flags = DeviceVec::filled(alloc, num_anchors, 0u32)?;
            flags
                .par_iter_mut()
                .zip(hits.par_iter())
                .for_each(|(flag, &hit)| *flag = u32::from(hit != NOT_FOUND));
            let mut positions = DeviceVec::filled(alloc, num_anchors, 0u32)?;
            let count = exclusive_scan(&flags, &mut positions) as usize;

            let mut anchor_rows = DeviceVec::filled(alloc, count, 0u32)?;
            let mut target_rows = DeviceVec::filled(alloc, count, 0u32)?;
            compact(&flags, &positions, &mut anchor_rows, |a| a as u32);
            compact(&flags, &positions, &mut target_rows, |a| hits[a]);

            let offset_pairs = if transpose {
                OffsetPairs::from_unsorted(
                    anchor_rows
                        .iter()
                        .copied()
                        .zip(target_rows.iter().copied())
                        .collect(),
                )
            } else {
                // Anchors are output rows visited in ascending order, one hit
                // at most per anchor.
                OffsetPairs {
                    in_rows: target_rows.into_host(),
                    out_rows: anchor_rows.into_host(),
                }
            };
            pairs.push(offset_pairs);
        }

        Ok(KernelMap::new(region.displacements.clone(), pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{BudgetAllocator, HostAllocator};
    use crate::backend::HostBackend;
    use crate::error::CoordinateError;
    use crate::kernel::KernelGeometry;
    use crate::test_utils::make_random_coordinates;

    #[test]
    fn test_exclusive_scan() {
        let values = vec![1u32, 0, 2, 1, 0, 3];
        let mut out = vec![0u32; values.len()];
        assert_eq!(exclusive_scan(&values, &mut out), 7);
        assert_eq!(out, vec![0, 1, 1, 3, 4, 4]);
    }

    #[test]
    fn test_exclusive_scan_across_blocks() {
        let values = vec![1u32; BLOCK_SIZE * 3 + 17];
        let mut out = vec![0u32; values.len()];
        let total = exclusive_scan(&values, &mut out);
        assert_eq!(total as usize, values.len());
        assert!(out.iter().enumerate().all(|(i, &v)| v as usize == i));
    }

    #[test]
    fn test_segment_detection() {
        let sorted = [1u64, 1, 1, 5, 5, 9, 9, 9, 9];
        let mut flags = vec![0u32; sorted.len()];
        let mut ids = vec![0u32; sorted.len()];
        let num = detect_segments(|i| sorted[i] == sorted[i - 1], &mut flags, &mut ids);

        assert_eq!(num, 3);
        assert_eq!(flags, vec![1, 0, 0, 1, 0, 1, 0, 0, 0]);
        assert_eq!(ids, vec![0, 0, 0, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_segment_detection_empty() {
        let num = detect_segments(|_| true, &mut [], &mut []);
        assert_eq!(num, 0);
    }

    #[test]
    fn test_compact_keeps_order() {
        let n = BLOCK_SIZE * 2 + 5;
        let flags: Vec<u32> = (0..n).map(|i| u32::from(i % 3 == 0)).collect();
        let mut positions = vec![0u32; n];
        let total = exclusive_scan(&flags, &mut positions) as usize;
        let mut out = vec![0usize; total];
        compact(&flags, &positions, &mut out, |i| i);
        assert_eq!(out, (0..n).step_by(3).collect::<Vec<_>>());
    }

    #[test]
    fn test_dedup_matches_host() {
        let allocator = HostAllocator::new();
        let device = DeviceBackend::new(&allocator);
        let batch = make_random_coordinates::<i64>(5000, 3, 16, 99);
        let index = CoordinateIndex::new(3);

        let expected = HostBackend.dedup(&index, &batch).unwrap();
        let plan = device.dedup(&index, &batch).unwrap();
        assert_eq!(plan, expected);
        assert_eq!(allocator.live_bytes(), 0);
    }

    #[test]
    fn test_budget_exhaustion_is_reported() {
        let allocator = BudgetAllocator::new(64);
        let device = DeviceBackend::new(&allocator);
        let batch = make_random_coordinates::<i32>(100, 3, 4, 1);

        let err = device
            .dedup(&CoordinateIndex::new(3), &batch)
            .unwrap_err();
        assert!(matches!(err, CoordinateError::AllocationFailure { .. }));
        assert_eq!(allocator.live_bytes(), 0);
    }

    #[test]
    fn test_transpose_sorted_by_output_row() {
        let allocator = HostAllocator::new();
        let device = DeviceBackend::new(&allocator);
        let fine = CoordinateIndex::from_batch(
            &CoordinateBatch::from_rows(&[[3i32], [0], [2], [1]]).unwrap(),
            &device,
        )
        .unwrap()
        .0;
        let coarse = CoordinateIndex::from_batch(
            &CoordinateBatch::from_rows(&[[1i32], [0]]).unwrap(),
            &device,
        )
        .unwrap()
        .0;
        let region = KernelGeometry::cube(1, 2, 2, 1).region(1).unwrap();
        let map = device.kernel_map(&coarse, &fine, &region, 0, true).unwrap();

        // Offset 0 sends coarse c to fine 2c; offset 1 to 2c + 1.
        assert_eq!(map.pairs(0).collect::<Vec<_>>(), vec![(1, 1), (0, 2)]);
        assert_eq!(map.pairs(1).collect::<Vec<_>>(), vec![(0, 0), (1, 3)]);
    }
}
