//! Compute backends for dedup and kernel-map search.
//!
//! The manager is generic over a [`CoordinateBackend`], fixed at construction.
//! Two implementations are provided:
//!
//! - [`HostBackend`]: concurrent hash claims on the host thread pool.
//! - [`DeviceBackend`]: the sort / segment / scan / compact pipeline used by
//!   massively parallel devices, with every buffer accounted through an
//!   [`Allocator`](crate::allocator::Allocator).
//!
//! Both return identical results for identical inputs.

mod device;
mod host;

pub use device::{compact, detect_segments, exclusive_scan, DeviceBackend};
pub use host::HostBackend;

use crate::coordinate::{CoordinateBatch, CoordinateInt};
use crate::error::{CoordinateError, Result};
use crate::index::CoordinateIndex;
use crate::kernel::{KernelMap, KernelRegion};

/// Row assignment for one input coordinate, decided by the dedup phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Already in the index at this row.
    Existing(u32),
    /// Will be appended; rank into [`DedupPlan::new_rows`].
    New(u32),
}

/// Output of the dedup phase of an insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupPlan {
    /// Input rows of coordinates unknown to the index, one per distinct
    /// coordinate (its first occurrence), in ascending input order.
    pub new_rows: Vec<u32>,
    /// One claim per input row.
    pub claims: Vec<Claim>,
}

/// Parallel primitives behind coordinate insertion and kernel-map search.
pub trait CoordinateBackend<T: CoordinateInt>: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Deduplicate `batch` against itself and `index` without mutating either.
    fn dedup(&self, index: &CoordinateIndex<T>, batch: &CoordinateBatch<T>) -> Result<DedupPlan>;

    /// Pair rows of `input` and `output` for every offset of `region`.
    ///
    /// The first `batch_offset` components of each coordinate are copied
    /// through unchanged. Forward maps probe `input` from every output row;
    /// transposed maps probe `output` from every input row.
    fn kernel_map(
        &self,
        input: &CoordinateIndex<T>,
        output: &CoordinateIndex<T>,
        region: &KernelRegion,
        batch_offset: usize,
        transpose: bool,
    ) -> Result<KernelMap>;
}

/// Check that both levels carry `batch_offset + D` components.
pub(crate) fn check_region_width<T: CoordinateInt>(
    input: &CoordinateIndex<T>,
    output: &CoordinateIndex<T>,
    region: &KernelRegion,
    batch_offset: usize,
) -> Result<()> {
    let width = batch_offset + region.dimension();
    for level_width in [input.width(), output.width()] {
        if level_width != width {
            return Err(CoordinateError::GeometryMismatch(format!(
                "kernel covers {} spatial axes but the level has {level_width} components",
                region.dimension()
            )));
        }
    }
    Ok(())
}

/// Reusable scratch for computing neighbor coordinates of one anchor.
pub(crate) struct Probe<T> {
    anchor: Vec<i64>,
    wide: Vec<i64>,
    narrow: Vec<T>,
}

impl<T: CoordinateInt> Probe<T> {
    pub(crate) fn new(width: usize) -> Self {
        Self {
            anchor: vec![0; width],
            wide: vec![0; width],
            narrow: vec![T::ZERO; width],
        }
    }

    /// Neighbor of `anchor` under offset `k`, or `None` if it cannot be
    /// represented in `T`.
    #[inline]
    pub(crate) fn shift(
        &mut self,
        region: &KernelRegion,
        anchor: &[T],
        k: usize,
        batch_offset: usize,
    ) -> Option<&[T]> {
        for (wide, &value) in self.anchor.iter_mut().zip(anchor) {
            *wide = value.to_i64();
        }
        region.neighbor(&self.anchor, k, batch_offset, &mut self.wide)?;
        for (narrow, &value) in self.narrow.iter_mut().zip(&self.wide) {
            *narrow = T::from_i64(value)?;
        }
        Some(&self.narrow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::HostAllocator;
    use crate::kernel::KernelGeometry;
    use crate::test_utils::{make_grid_coordinates, make_random_coordinates};

    fn index_of(batch: &CoordinateBatch<i32>) -> CoordinateIndex<i32> {
        CoordinateIndex::from_batch(batch, &HostBackend::default())
            .unwrap()
            .0
    }

    #[test]
    fn test_probe_rejects_out_of_range() {
        let region = KernelGeometry::cube(1, 3, 1, 1).region(1).unwrap();
        let mut probe = Probe::<i32>::new(1);
        assert_eq!(probe.shift(&region, &[5], 0, 0), Some(&[4][..]));
        assert_eq!(probe.shift(&region, &[i32::MAX], 2, 0), None);
    }

    #[test]
    fn test_backends_agree_on_dedup() {
        let host = HostBackend::default();
        let allocator = HostAllocator::new();
        let device = DeviceBackend::new(&allocator);

        let existing = index_of(&make_random_coordinates::<i32>(300, 4, 6, 11));
        let batch = make_random_coordinates::<i32>(3000, 4, 8, 12);

        let a = host.dedup(&existing, &batch).unwrap();
        let b = device.dedup(&existing, &batch).unwrap();
        assert_eq!(a, b);
        assert_eq!(allocator.live_bytes(), 0);
    }

    #[test]
    fn test_backends_agree_on_kernel_maps() {
        let host = HostBackend::default();
        let allocator = HostAllocator::new();
        let device = DeviceBackend::new(&allocator);

        let fine = index_of(&make_random_coordinates::<i32>(1500, 4, 10, 3));
        let coarse = index_of(&make_grid_coordinates::<i32>(&[2, 5, 5, 5], 1));

        for (geometry, transpose) in [
            (KernelGeometry::cube(3, 3, 1, 1), false),
            (KernelGeometry::cube(3, 2, 2, 1), false),
            (KernelGeometry::cube(3, 2, 2, 1), true),
            (KernelGeometry::cross(3, 5, 2, 2), true),
        ] {
            let region = geometry.region(3).unwrap();
            let (input, output) = if transpose {
                (&coarse, &fine)
            } else {
                (&fine, &coarse)
            };
            let a = host.kernel_map(input, output, &region, 1, transpose).unwrap();
            let b = device
                .kernel_map(input, output, &region, 1, transpose)
                .unwrap();
            assert_eq!(a, b);
            assert_eq!(a.num_offsets(), geometry.num_offsets());
        }
        assert_eq!(allocator.live_bytes(), 0);
    }

    #[test]
    fn test_region_width_checked() {
        let host = HostBackend::default();
        let level = index_of(&make_grid_coordinates::<i32>(&[3, 3], 1));
        let region = KernelGeometry::cube(2, 3, 1, 1).region(2).unwrap();
        let err = host.kernel_map(&level, &level, &region, 1, false).unwrap_err();
        assert!(matches!(err, CoordinateError::GeometryMismatch(_)));
    }
}
