//! Sparse coordinate indexing and kernel-map generation.
//!
//! This library keeps the coordinate bookkeeping of sparse convolutional
//! networks: integer coordinates of occupied sites, the strided levels derived
//! from them, and the per-offset gather/scatter tables ("kernel maps") that
//! convolution, pooling and their transposes consume.
//!
//! # Architecture
//!
//! - [`coordinate`]: fixed-width integer coordinates and row-major batches
//! - [`index`]: deduplicating coordinate to dense-row index
//! - [`backend`]: host and device implementations of dedup and neighbor search
//! - [`kernel`]: kernel geometry and kernel maps
//! - [`manager`]: registry of levels with cached derivations and kernel maps
//! - [`quantize`]: one-shot dedup of a raw batch
//!
//! # Usage
//!
//! ```
//! use sparse_coords::{CoordinateBatch, CoordinateMapManager, KernelGeometry, ManagerConfig};
//!
//! let manager = CoordinateMapManager::<i32>::with_config(ManagerConfig::default())?;
//!
//! // Batch index followed by three spatial components.
//! let points = CoordinateBatch::from_rows(&[[0, 0, 0, 0], [0, 1, 0, 0], [0, 4, 4, 4]])?;
//! let fine = manager.insert(&points)?;
//! let coarse = manager.stride(&fine, &[2, 2, 2])?;
//!
//! // Size-2, stride-2 pooling kernel from the fine level onto the coarse one.
//! let map = manager.kernel_map(&fine, &coarse, &KernelGeometry::cube(3, 2, 2, 1), false)?;
//! assert_eq!(map.total_pairs(), 3);
//! # Ok::<(), sparse_coords::CoordinateError>(())
//! ```

pub mod allocator;
pub mod backend;
pub mod coordinate;
pub mod error;
pub mod index;
pub mod kernel;
pub mod key;
pub mod manager;
pub mod quantize;

#[cfg(test)]
pub(crate) mod test_utils;

pub use allocator::{Allocation, Allocator, BudgetAllocator, DeviceVec, HostAllocator};
pub use backend::{Claim, CoordinateBackend, DedupPlan, DeviceBackend, HostBackend};
pub use coordinate::{CoordinateBatch, CoordinateInt};
pub use error::{CoordinateError, Result};
pub use index::{CoordinateIndex, InsertOutcome};
pub use kernel::{KernelGeometry, KernelMap, KernelRegion, OffsetPairs, RegionType};
pub use key::{Provenance, StrideKey};
pub use manager::{CoordinateMapManager, ManagerBuilder, ManagerConfig, ManagerStats};
pub use quantize::{quantize, QuantizationResult};
