//! One-shot quantization of a raw coordinate batch.

use tracing::debug;

use crate::backend::CoordinateBackend;
use crate::coordinate::{CoordinateBatch, CoordinateInt};
use crate::error::Result;
use crate::index::CoordinateIndex;

/// Unique coordinates of a batch plus the maps between both row spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationResult<T> {
    /// Unique coordinates in order of first occurrence.
    pub coordinates: CoordinateBatch<T>,
    /// `mapping[i]`: input row that produced unique row `i`.
    pub mapping: Vec<u32>,
    /// `inverse[j]`: unique row of input row `j`.
    pub inverse: Vec<u32>,
}

impl<T: CoordinateInt> QuantizationResult<T> {
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// Deduplicate `batch` into a fresh index.
pub fn quantize<T, B>(batch: &CoordinateBatch<T>, backend: &B) -> Result<QuantizationResult<T>>
where
    T: CoordinateInt,
    B: CoordinateBackend<T>,
{
    let (index, outcome) = CoordinateIndex::from_batch(batch, backend)?;
    debug!(
        backend = backend.name(),
        input = batch.len(),
        unique = index.len(),
        "quantized coordinates"
    );
    Ok(QuantizationResult {
        coordinates: index.coordinates().clone(),
        mapping: outcome.mapping,
        inverse: outcome.rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::HostAllocator;
    use crate::backend::{DeviceBackend, HostBackend};
    use crate::test_utils::make_half_cubic_coordinates;

    #[test]
    fn test_quantize_small() {
        let batch = CoordinateBatch::from_rows(&[[1i32, 1], [0, 0], [1, 1], [2, 0]]).unwrap();
        let result = quantize(&batch, &HostBackend).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.mapping, vec![0, 1, 3]);
        assert_eq!(result.inverse, vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_quantize_maps_are_consistent() {
        let batch = make_half_cubic_coordinates::<i32>(20, 2);
        let result = quantize(&batch, &HostBackend).unwrap();

        // Edge points are shared by two planes, the origin by three.
        assert_eq!(result.len(), 3 * 11 * 11 - 3 * 11 + 1);
        for (unique, &input) in result.mapping.iter().enumerate() {
            assert_eq!(result.coordinates.row(unique), batch.row(input as usize));
        }
        for (input, &unique) in result.inverse.iter().enumerate() {
            assert_eq!(result.coordinates.row(unique as usize), batch.row(input));
        }
    }

    #[test]
    fn test_quantize_same_on_device() {
        let batch = make_half_cubic_coordinates::<i64>(30, 3);
        let allocator = HostAllocator::new();
        let host = quantize(&batch, &HostBackend).unwrap();
        let device = quantize(&batch, &DeviceBackend::new(&allocator)).unwrap();
        assert_eq!(host, device);
    }
}
