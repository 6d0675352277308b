//! Kernel geometry and offset enumeration.

use serde::{Deserialize, Serialize};

use crate::error::{CoordinateError, Result};

/// Shape of the neighborhood a kernel covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionType {
    /// Full cartesian product of per-axis offsets.
    HyperCube,
    /// Center plus offsets that move along a single axis.
    HyperCross,
    /// Caller-supplied offsets.
    Custom,
}

/// Kernel size, stride, dilation and region shape.
///
/// All per-axis vectors cover spatial axes only; the batch component of a
/// coordinate is never offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelGeometry {
    pub kernel_size: Vec<u32>,
    pub kernel_stride: Vec<u32>,
    pub kernel_dilation: Vec<u32>,
    pub region_type: RegionType,
    /// Centered offsets, only read for [`RegionType::Custom`].
    #[serde(default)]
    pub offsets: Vec<Vec<i64>>,
}

impl KernelGeometry {
    pub fn new(
        kernel_size: Vec<u32>,
        kernel_stride: Vec<u32>,
        kernel_dilation: Vec<u32>,
        region_type: RegionType,
    ) -> Self {
        Self {
            kernel_size,
            kernel_stride,
            kernel_dilation,
            region_type,
            offsets: Vec::new(),
        }
    }

    /// Hyper-cube kernel with the same size, stride and dilation on every axis.
    pub fn cube(dimension: usize, size: u32, stride: u32, dilation: u32) -> Self {
        Self::new(
            vec![size; dimension],
            vec![stride; dimension],
            vec![dilation; dimension],
            RegionType::HyperCube,
        )
    }

    /// Hyper-cross kernel with the same size, stride and dilation on every axis.
    pub fn cross(dimension: usize, size: u32, stride: u32, dilation: u32) -> Self {
        Self::new(
            vec![size; dimension],
            vec![stride; dimension],
            vec![dilation; dimension],
            RegionType::HyperCross,
        )
    }

    /// Kernel visiting exactly `offsets`.
    pub fn custom(
        offsets: Vec<Vec<i64>>,
        kernel_stride: Vec<u32>,
        kernel_dilation: Vec<u32>,
    ) -> Self {
        let dimension = kernel_stride.len();
        Self {
            kernel_size: vec![1; dimension],
            kernel_stride,
            kernel_dilation,
            region_type: RegionType::Custom,
            offsets,
        }
    }

    /// Number of kernel offsets the geometry defines.
    pub fn num_offsets(&self) -> usize {
        match self.region_type {
            RegionType::HyperCube => self.kernel_size.iter().map(|&k| k as usize).product(),
            RegionType::HyperCross => {
                1 + self
                    .kernel_size
                    .iter()
                    .map(|&k| (k as usize).saturating_sub(1))
                    .sum::<usize>()
            }
            RegionType::Custom => self.offsets.len(),
        }
    }

    /// Validate against a spatial dimension and enumerate displacements.
    pub fn region(&self, dimension: usize) -> Result<KernelRegion> {
        check_axis_vector("kernel_size", &self.kernel_size, dimension)?;
        check_axis_vector("kernel_stride", &self.kernel_stride, dimension)?;
        check_axis_vector("kernel_dilation", &self.kernel_dilation, dimension)?;

        let dilation: Vec<i64> = self.kernel_dilation.iter().map(|&d| d as i64).collect();
        let displacements = match self.region_type {
            RegionType::HyperCube => cube_displacements(&self.kernel_size, &dilation),
            RegionType::HyperCross => cross_displacements(&self.kernel_size, &dilation),
            RegionType::Custom => {
                if self.offsets.is_empty() {
                    return Err(CoordinateError::GeometryMismatch(
                        "custom region requires at least one offset".into(),
                    ));
                }
                self.offsets
                    .iter()
                    .map(|offset| {
                        if offset.len() != dimension {
                            return Err(CoordinateError::GeometryMismatch(format!(
                                "custom offset {offset:?} has {} components, expected {dimension}",
                                offset.len()
                            )));
                        }
                        offset
                            .iter()
                            .zip(&dilation)
                            .map(|(o, d)| o.checked_mul(*d))
                            .collect::<Option<Vec<i64>>>()
                            .ok_or_else(|| {
                                CoordinateError::GeometryMismatch(format!(
                                    "custom offset {offset:?} overflows under dilation {dilation:?}"
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };

        Ok(KernelRegion {
            stride: self.kernel_stride.iter().map(|&s| s as i64).collect(),
            displacements,
        })
    }
}

fn check_axis_vector(name: &str, values: &[u32], dimension: usize) -> Result<()> {
    if values.len() != dimension {
        return Err(CoordinateError::GeometryMismatch(format!(
            "{name} has {} entries, expected {dimension}",
            values.len()
        )));
    }
    if values.iter().any(|&v| v == 0) {
        return Err(CoordinateError::GeometryMismatch(format!(
            "{name} {values:?} must be positive"
        )));
    }
    Ok(())
}

/// Anchor of an axis of size `k`.
///
/// Odd kernels are centered; even kernels extend forward from the anchor.
#[inline]
fn center(k: u32) -> i64 {
    if k % 2 == 1 {
        ((k - 1) / 2) as i64
    } else {
        0
    }
}

fn cube_displacements(kernel_size: &[u32], dilation: &[i64]) -> Vec<Vec<i64>> {
    let total: usize = kernel_size.iter().map(|&k| k as usize).product();
    let dimension = kernel_size.len();
    (0..total)
        .map(|flat| {
            let mut displacement = vec![0i64; dimension];
            let mut rest = flat;
            // First axis varies slowest.
            for axis in (0..dimension).rev() {
                let k = kernel_size[axis] as usize;
                let o = (rest % k) as i64;
                rest /= k;
                displacement[axis] = (o - center(kernel_size[axis])) * dilation[axis];
            }
            displacement
        })
        .collect()
}

fn cross_displacements(kernel_size: &[u32], dilation: &[i64]) -> Vec<Vec<i64>> {
    let dimension = kernel_size.len();
    let mut displacements = vec![vec![0i64; dimension]];
    for (axis, &k) in kernel_size.iter().enumerate() {
        let c = center(k);
        for o in 0..k as i64 {
            if o == c {
                continue;
            }
            let mut displacement = vec![0i64; dimension];
            displacement[axis] = (o - c) * dilation[axis];
            displacements.push(displacement);
        }
    }
    displacements
}

/// Validated geometry ready for neighbor search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelRegion {
    /// Kernel stride per spatial axis.
    pub stride: Vec<i64>,
    /// Displacement of every kernel offset, in kernel order.
    pub displacements: Vec<Vec<i64>>,
}

impl KernelRegion {
    pub fn len(&self) -> usize {
        self.displacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displacements.is_empty()
    }

    /// Spatial dimension of the region.
    pub fn dimension(&self) -> usize {
        self.stride.len()
    }

    /// Write `anchor * stride + displacement[k]` into `out`.
    ///
    /// `anchor` and `out` carry `batch_offset` leading components that are
    /// copied through unchanged. Returns `None` if a component overflows.
    #[inline]
    pub(crate) fn neighbor(
        &self,
        anchor: &[i64],
        k: usize,
        batch_offset: usize,
        out: &mut [i64],
    ) -> Option<()> {
        out[..batch_offset].copy_from_slice(&anchor[..batch_offset]);
        let displacement = &self.displacements[k];
        for axis in 0..self.stride.len() {
            let scaled = anchor[batch_offset + axis].checked_mul(self.stride[axis])?;
            out[batch_offset + axis] = scaled.checked_add(displacement[axis])?;
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_3x3_offsets() {
        let region = KernelGeometry::cube(2, 3, 1, 1).region(2).unwrap();
        assert_eq!(region.len(), 9);
        assert_eq!(region.displacements[0], vec![-1, -1]);
        assert_eq!(region.displacements[1], vec![-1, 0]);
        assert_eq!(region.displacements[4], vec![0, 0]);
        assert_eq!(region.displacements[8], vec![1, 1]);
    }

    #[test]
    fn test_even_kernel_extends_forward() {
        let region = KernelGeometry::cube(2, 2, 2, 1).region(2).unwrap();
        assert_eq!(
            region.displacements,
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );
    }

    #[test]
    fn test_dilation_scales_displacements() {
        let region = KernelGeometry::cube(1, 3, 1, 2).region(1).unwrap();
        assert_eq!(region.displacements, vec![vec![-2], vec![0], vec![2]]);
    }

    #[test]
    fn test_cross_offsets() {
        let geometry = KernelGeometry::cross(3, 3, 1, 1);
        assert_eq!(geometry.num_offsets(), 7);

        let region = geometry.region(3).unwrap();
        assert_eq!(region.len(), 7);
        assert_eq!(region.displacements[0], vec![0, 0, 0]);
        assert_eq!(region.displacements[1], vec![-1, 0, 0]);
        assert_eq!(region.displacements[2], vec![1, 0, 0]);
        assert_eq!(region.displacements[6], vec![0, 0, 1]);
        for d in &region.displacements[1..] {
            assert_eq!(d.iter().filter(|&&v| v != 0).count(), 1);
        }
    }

    #[test]
    fn test_num_offsets_matches_region() {
        for geometry in [
            KernelGeometry::cube(3, 3, 1, 1),
            KernelGeometry::cube(4, 2, 2, 1),
            KernelGeometry::cross(4, 5, 1, 1),
            KernelGeometry::new(vec![3, 1, 2], vec![1, 1, 1], vec![1, 1, 1], RegionType::HyperCube),
        ] {
            let dimension = geometry.kernel_size.len();
            assert_eq!(geometry.num_offsets(), geometry.region(dimension).unwrap().len());
        }
    }

    #[test]
    fn test_custom_offsets() {
        let geometry =
            KernelGeometry::custom(vec![vec![0, 0], vec![1, -1]], vec![1, 1], vec![3, 1]);
        let region = geometry.region(2).unwrap();
        assert_eq!(region.displacements, vec![vec![0, 0], vec![3, -1]]);

        let bad = KernelGeometry::custom(vec![vec![0, 0, 0]], vec![1, 1], vec![1, 1]);
        assert!(matches!(bad.region(2), Err(CoordinateError::GeometryMismatch(_))));

        let empty = KernelGeometry::custom(Vec::new(), vec![1, 1], vec![1, 1]);
        assert!(matches!(empty.region(2), Err(CoordinateError::GeometryMismatch(_))));
    }

    #[test]
    fn test_custom_offset_overflow() {
        let geometry =
            KernelGeometry::custom(vec![vec![i64::MAX / 2, 0]], vec![1, 1], vec![3, 1]);
        assert!(matches!(
            geometry.region(2),
            Err(CoordinateError::GeometryMismatch(_))
        ));

        let fits = KernelGeometry::custom(vec![vec![i64::MAX / 4, 0]], vec![1, 1], vec![3, 1]);
        assert_eq!(fits.region(2).unwrap().displacements[0][0], i64::MAX / 4 * 3);
    }

    #[test]
    fn test_geometry_length_mismatch() {
        let geometry = KernelGeometry::cube(3, 3, 1, 1);
        assert!(matches!(
            geometry.region(2),
            Err(CoordinateError::GeometryMismatch(_))
        ));

        let zero_stride = KernelGeometry::cube(2, 3, 0, 1);
        assert!(matches!(
            zero_stride.region(2),
            Err(CoordinateError::GeometryMismatch(_))
        ));
    }

    #[test]
    fn test_neighbor_keeps_batch_component() {
        let region = KernelGeometry::cube(2, 3, 2, 1).region(2).unwrap();
        let mut out = [0i64; 3];
        region.neighbor(&[7, 1, 2], 0, 1, &mut out).unwrap();
        assert_eq!(out, [7, 1, 3]);

        assert!(region.neighbor(&[0, i64::MAX, 0], 0, 1, &mut out).is_none());
    }
}
