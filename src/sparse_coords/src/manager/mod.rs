//! Coordinate map manager.
//!
//! Owns every coordinate level of a sparse network and the kernel maps
//! between them. Levels are created by insertion or derived from other levels
//! (stride, prune, union, origin); each derivation and each kernel map is
//! computed at most once and then served from cache.
//!
//! # Example
//!
//! ```
//! use sparse_coords::{CoordinateBatch, KernelGeometry, ManagerBuilder};
//!
//! let manager = ManagerBuilder::new()
//!     .coordinate_size(2)
//!     .batch_dim(false)
//!     .build::<i32>()?;
//!
//! let points = CoordinateBatch::from_rows(&[[0, 0], [0, 2], [2, 0], [2, 2]])?;
//! let fine = manager.insert(&points)?;
//! let coarse = manager.stride(&fine, &[2, 2])?;
//! assert_eq!(manager.size(&coarse)?, 4);
//!
//! let map = manager.kernel_map(&fine, &fine, &KernelGeometry::cube(2, 3, 1, 1), false)?;
//! assert_eq!(map.num_offsets(), 9);
//! # Ok::<(), sparse_coords::CoordinateError>(())
//! ```
//!
//! # Concurrency
//!
//! All operations take `&self`. Levels live in an arena behind a read/write
//! lock and are immutable once registered; computation happens outside that
//! lock. Every cache entry is a slot with its own mutex, so concurrent first
//! requests for the same derivation or kernel map wait for one computation.

mod config;
mod registry;

pub use config::{ManagerBuilder, ManagerConfig};
pub use registry::LevelId;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::backend::{CoordinateBackend, HostBackend};
use crate::coordinate::{CoordinateBatch, CoordinateInt};
use crate::error::{CoordinateError, Result};
use crate::index::{CoordinateIndex, InsertOutcome};
use crate::kernel::{KernelGeometry, KernelMap, OffsetPairs};
use crate::key::{Provenance, StrideKey};
use registry::Registry;

/// Cache slot filled by the first caller that computes it.
type Slot<V> = Arc<Mutex<Option<V>>>;

/// Cache signature of a derived level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Derivation {
    Stride { input: LevelId, stride: Vec<u32> },
    /// The keep mask, packed 64 rows per word; its length is the level size.
    Prune { input: LevelId, bits: Vec<u64> },
    Union { inputs: Vec<LevelId> },
    Origin { input: LevelId },
}

impl Derivation {
    fn kind(&self) -> &'static str {
        match self {
            Derivation::Stride { .. } => "stride",
            Derivation::Prune { .. } => "prune",
            Derivation::Union { .. } => "union",
            Derivation::Origin { .. } => "origin",
        }
    }
}

/// Cache signature of a kernel map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MapSignature {
    Kernel {
        input: LevelId,
        output: LevelId,
        geometry: KernelGeometry,
        transpose: bool,
    },
    Origin {
        input: LevelId,
    },
}

impl MapSignature {
    fn input(&self) -> LevelId {
        match self {
            MapSignature::Kernel { input, .. } | MapSignature::Origin { input } => *input,
        }
    }
}

/// Counters exposed by [`CoordinateMapManager::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    /// Levels created by stride, prune, union or origin.
    pub levels_derived: usize,
    /// Kernel maps computed (origin maps included).
    pub kernel_maps_built: usize,
    /// Derivations answered from cache.
    pub derivation_cache_hits: usize,
    /// Kernel maps answered from cache.
    pub kernel_map_cache_hits: usize,
}

#[derive(Debug, Default)]
struct StatsCounters {
    levels_derived: AtomicUsize,
    kernel_maps_built: AtomicUsize,
    derivation_cache_hits: AtomicUsize,
    kernel_map_cache_hits: AtomicUsize,
}

impl StatsCounters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ManagerStats {
        ManagerStats {
            levels_derived: self.levels_derived.load(Ordering::Relaxed),
            kernel_maps_built: self.kernel_maps_built.load(Ordering::Relaxed),
            derivation_cache_hits: self.derivation_cache_hits.load(Ordering::Relaxed),
            kernel_map_cache_hits: self.kernel_map_cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// Registry of coordinate levels and the kernel maps between them.
pub struct CoordinateMapManager<T: CoordinateInt, B = HostBackend> {
    config: ManagerConfig,
    backend: B,
    pool: Option<rayon::ThreadPool>,
    registry: RwLock<Registry<T>>,
    derivations: Mutex<HashMap<Derivation, Slot<StrideKey>>>,
    kernel_maps: Mutex<HashMap<MapSignature, Slot<Arc<KernelMap>>>>,
    tag_counter: AtomicU64,
    stats: StatsCounters,
}

impl<T: CoordinateInt> CoordinateMapManager<T, HostBackend> {
    /// Manager on the host backend.
    pub fn with_config(config: ManagerConfig) -> Result<Self> {
        Self::new(config, HostBackend)
    }

    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }
}

impl<T: CoordinateInt, B: CoordinateBackend<T>> CoordinateMapManager<T, B> {
    pub fn new(config: ManagerConfig, backend: B) -> Result<Self> {
        config.validate()?;
        let pool = match config.num_threads {
            Some(num_threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .thread_name(|i| format!("sparse-coords-{i}"))
                    .build()
                    .map_err(|e| CoordinateError::InvalidConfig(e.to_string()))?,
            ),
            None => None,
        };
        debug!(
            backend = backend.name(),
            coordinate_size = config.coordinate_size,
            batch_dim = config.batch_dim,
            num_threads = ?config.num_threads,
            "created coordinate map manager"
        );
        Ok(Self {
            config,
            backend,
            pool,
            registry: RwLock::new(Registry::default()),
            derivations: Mutex::new(HashMap::new()),
            kernel_maps: Mutex::new(HashMap::new()),
            tag_counter: AtomicU64::new(0),
            stats: StatsCounters::default(),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn stats(&self) -> ManagerStats {
        self.stats.snapshot()
    }

    /// Run `f` on the manager's pool, if it has one.
    fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    fn resolve(&self, key: &StrideKey) -> Result<(LevelId, Arc<CoordinateIndex<T>>)> {
        let registry = self.registry.read();
        let id = registry
            .id(key)
            .ok_or_else(|| CoordinateError::UnknownCoordinateMapKey(key.clone()))?;
        Ok((id, Arc::clone(&registry.level(id).index)))
    }

    /// Shared view of the index behind `key`.
    pub fn index(&self, key: &StrideKey) -> Result<Arc<CoordinateIndex<T>>> {
        self.resolve(key).map(|(_, index)| index)
    }

    pub fn contains_key(&self, key: &StrideKey) -> bool {
        self.registry.read().contains(key)
    }

    /// Number of unique coordinates of a level.
    pub fn size(&self, key: &StrideKey) -> Result<usize> {
        Ok(self.index(key)?.len())
    }

    /// Coordinates of a level in row order.
    pub fn coordinates(&self, key: &StrideKey) -> Result<CoordinateBatch<T>> {
        Ok(self.index(key)?.coordinates().clone())
    }

    pub fn provenance(&self, key: &StrideKey) -> Result<Provenance> {
        self.registry
            .read()
            .get(key)
            .map(|level| level.provenance.clone())
            .ok_or_else(|| CoordinateError::UnknownCoordinateMapKey(key.clone()))
    }

    /// Every registered key, sorted.
    pub fn keys(&self) -> Vec<StrideKey> {
        self.registry
            .read()
            .sorted()
            .into_iter()
            .map(|level| level.key.clone())
            .collect()
    }

    /// Coordinates of a level, one `row: [c0, c1, ...]` line per row.
    pub fn print_level(&self, key: &StrideKey) -> Result<String> {
        use fmt::Write;

        let index = self.index(key)?;
        let mut out = format!("{key} ({} rows)\n", index.len());
        for (row, coordinate) in index.iter() {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "{row:>6}: {coordinate:?}");
        }
        Ok(out)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    fn next_tag_id(&self) -> u64 {
        self.tag_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register under `proposed`, suffixing the tag if the key is taken.
    fn register(
        &self,
        proposed: StrideKey,
        index: CoordinateIndex<T>,
        provenance: Provenance,
    ) -> StrideKey {
        let mut registry = self.registry.write();
        let mut key = proposed.clone();
        while registry.contains(&key) {
            key = proposed.with_tag(format!("{}~{}", proposed.tag(), self.next_tag_id()));
        }
        registry.register(key.clone(), index, provenance);
        key
    }

    /// Return the cached result of `derivation` or compute and register it.
    ///
    /// Callers validate their arguments first; `compute` only fails on
    /// backend errors, in which case nothing is registered or cached and the
    /// slot is left empty for the next caller.
    fn derive<F>(&self, derivation: Derivation, compute: F) -> Result<StrideKey>
    where
        F: FnOnce() -> Result<(StrideKey, CoordinateIndex<T>, Provenance)>,
    {
        let slot = Arc::clone(self.derivations.lock().entry(derivation.clone()).or_default());
        let mut guard = slot.lock();
        if let Some(key) = guard.as_ref() {
            StatsCounters::bump(&self.stats.derivation_cache_hits);
            trace!(kind = derivation.kind(), %key, "derivation cache hit");
            return Ok(key.clone());
        }

        // On error the slot stays empty; the next holder of its lock retries.
        let (proposed, index, provenance) = compute()?;
        let rows = index.len();
        let key = self.register(proposed, index, provenance);
        StatsCounters::bump(&self.stats.levels_derived);
        debug!(kind = derivation.kind(), %key, rows, "derived level");
        *guard = Some(key.clone());
        Ok(key)
    }

    /// Build a level from a batch on the manager's backend.
    fn build_index(
        &self,
        batch: &CoordinateBatch<T>,
    ) -> Result<(CoordinateIndex<T>, InsertOutcome)> {
        self.install(|| CoordinateIndex::from_batch(batch, &self.backend))
    }

    // ========================================================================
    // Levels
    // ========================================================================

    /// Insert raw coordinates as a new unit-stride level.
    pub fn insert(&self, coordinates: &CoordinateBatch<T>) -> Result<StrideKey> {
        self.insert_and_map(coordinates).map(|(key, _)| key)
    }

    /// Insert raw coordinates and also return the row maps of the insertion.
    pub fn insert_and_map(
        &self,
        coordinates: &CoordinateBatch<T>,
    ) -> Result<(StrideKey, InsertOutcome)> {
        if coordinates.width() != self.config.coordinate_size {
            return Err(CoordinateError::ArityMismatch {
                expected: self.config.coordinate_size,
                actual: coordinates.width(),
            });
        }
        if coordinates.is_empty() {
            warn!("inserting an empty coordinate batch");
        }

        let (index, outcome) = self.build_index(coordinates)?;
        let rows = index.len();
        let key = self.register(
            StrideKey::unit(self.config.spatial_dim()),
            index,
            Provenance::Inserted,
        );
        debug!(
            %key,
            input = coordinates.len(),
            rows,
            backend = self.backend.name(),
            "inserted coordinates"
        );
        Ok((key, outcome))
    }

    /// Level whose spatial components are floor-divided by `stride`.
    ///
    /// An all-ones stride returns `in_key` unchanged.
    pub fn stride(&self, in_key: &StrideKey, stride: &[u32]) -> Result<StrideKey> {
        let (input, source) = self.resolve(in_key)?;
        let dimension = self.config.spatial_dim();
        if stride.len() != dimension {
            return Err(CoordinateError::IncompatibleStride(format!(
                "stride {stride:?} has {} entries, expected {dimension}",
                stride.len()
            )));
        }
        if stride.iter().any(|&s| s == 0) {
            return Err(CoordinateError::IncompatibleStride(format!(
                "stride {stride:?} must be positive"
            )));
        }
        if stride.iter().all(|&s| s == 1) {
            return Ok(in_key.clone());
        }

        let divisors = stride
            .iter()
            .map(|&s| T::from_i64(i64::from(s)))
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| {
                CoordinateError::IncompatibleStride(format!(
                    "stride {stride:?} does not fit the coordinate type"
                ))
            })?;
        let tensor_stride = in_key
            .tensor_stride()
            .iter()
            .zip(stride)
            .map(|(&a, &b)| a.checked_mul(b))
            .collect::<Option<Vec<u32>>>()
            .ok_or_else(|| {
                CoordinateError::IncompatibleStride(format!(
                    "stride {stride:?} overflows tensor stride {:?}",
                    in_key.tensor_stride()
                ))
            })?;

        let derivation = Derivation::Stride {
            input,
            stride: stride.to_vec(),
        };
        self.derive(derivation, || {
            let width = source.width();
            let batch_offset = self.config.batch_offset();
            let divisors: &[T] = &divisors;
            let data: Vec<T> = self.install(|| {
                source
                    .coordinates()
                    .as_flat()
                    .par_chunks(width)
                    .flat_map_iter(move |row| {
                        row.iter().enumerate().map(move |(axis, &value)| {
                            if axis < batch_offset {
                                value
                            } else {
                                value.floor_div(divisors[axis - batch_offset])
                            }
                        })
                    })
                    .collect()
            });
            let (index, _) = self.build_index(&CoordinateBatch::from_flat(data, width)?)?;
            Ok((
                StrideKey::new(tensor_stride, in_key.tag()),
                index,
                Provenance::Strided {
                    source: in_key.clone(),
                    stride: stride.to_vec(),
                },
            ))
        })
    }

    /// Level keeping the rows of `in_key` where `keep` is set, in row order.
    pub fn prune(&self, in_key: &StrideKey, keep: &[bool]) -> Result<StrideKey> {
        let (input, source) = self.resolve(in_key)?;
        if keep.len() != source.len() {
            return Err(CoordinateError::MaskLengthMismatch {
                expected: source.len(),
                actual: keep.len(),
            });
        }

        self.derive(
            Derivation::Prune {
                input,
                bits: pack_mask(keep),
            },
            || {
                let mut kept = CoordinateBatch::empty(source.width());
                let rows = source.coordinates().rows().zip(keep);
                for (coordinate, _) in rows.filter(|(_, keep)| **keep) {
                    kept.push(coordinate);
                }
                let (index, _) = self.build_index(&kept)?;
                Ok((
                    in_key.with_tag("pruned"),
                    index,
                    Provenance::Pruned {
                        source: in_key.clone(),
                    },
                ))
            },
        )
    }

    /// Deduplicated union of levels sharing one tensor stride.
    ///
    /// Rows follow the argument order: all of the first level, then the new
    /// coordinates of the second, and so on.
    pub fn union(&self, in_keys: &[StrideKey]) -> Result<StrideKey> {
        let first = in_keys
            .first()
            .ok_or_else(|| CoordinateError::IncompatibleStride("union of zero levels".into()))?;
        let mut inputs = Vec::with_capacity(in_keys.len());
        let mut sources = Vec::with_capacity(in_keys.len());
        for key in in_keys {
            let (id, index) = self.resolve(key)?;
            if key.tensor_stride() != first.tensor_stride() {
                return Err(CoordinateError::IncompatibleStride(format!(
                    "cannot union {first} with {key}"
                )));
            }
            inputs.push(id);
            sources.push(index);
        }

        self.derive(Derivation::Union { inputs }, || {
            let width = self.config.coordinate_size;
            let mut all = CoordinateBatch::empty(width);
            for source in &sources {
                for coordinate in source.coordinates().rows() {
                    all.push(coordinate);
                }
            }
            let (index, _) = self.build_index(&all)?;
            Ok((
                first.with_tag("union"),
                index,
                Provenance::Unioned {
                    sources: in_keys.to_vec(),
                },
            ))
        })
    }

    /// Level with one row per batch index, spatial components zero.
    ///
    /// Without a batch dimension this is a single all-zero row (none for an
    /// empty input).
    pub fn origin(&self, in_key: &StrideKey) -> Result<StrideKey> {
        let (input, source) = self.resolve(in_key)?;
        self.derive(Derivation::Origin { input }, || {
            let width = source.width();
            let batch_offset = self.config.batch_offset();
            let mut origins = CoordinateBatch::empty(width);
            let mut zero = vec![T::ZERO; width];
            if batch_offset == 0 {
                if !source.is_empty() {
                    origins.push(&zero);
                }
            } else {
                for coordinate in source.coordinates().rows() {
                    zero[..batch_offset].copy_from_slice(&coordinate[..batch_offset]);
                    origins.push(&zero);
                }
            }
            let (index, _) = self.build_index(&origins)?;
            Ok((
                in_key.with_tag("origin"),
                index,
                Provenance::Origin {
                    source: in_key.clone(),
                },
            ))
        })
    }

    /// Number of rows of the origin level of `in_key`.
    pub fn origin_map_size(&self, in_key: &StrideKey) -> Result<usize> {
        let out_key = self.origin(in_key)?;
        self.size(&out_key)
    }

    // ========================================================================
    // Kernel maps
    // ========================================================================

    /// Return the cached map for `signature` or build it.
    fn cached_map<F>(&self, signature: MapSignature, build: F) -> Result<Arc<KernelMap>>
    where
        F: FnOnce() -> Result<KernelMap>,
    {
        let slot = Arc::clone(self.kernel_maps.lock().entry(signature.clone()).or_default());
        let mut guard = slot.lock();
        if let Some(map) = guard.as_ref() {
            StatsCounters::bump(&self.stats.kernel_map_cache_hits);
            trace!(?signature, "kernel map cache hit");
            return Ok(Arc::clone(map));
        }

        let map = Arc::new(build()?);
        StatsCounters::bump(&self.stats.kernel_maps_built);
        debug!(
            ?signature,
            offsets = map.num_offsets(),
            pairs = map.total_pairs(),
            "built kernel map"
        );
        *guard = Some(Arc::clone(&map));
        Ok(map)
    }

    /// Gather/scatter pairs between two levels for every kernel offset.
    ///
    /// Forward maps (`transpose == false`) anchor the kernel on each output
    /// row at `output * kernel_stride`. Transposed maps anchor it on each
    /// input row and look the result up in the output level.
    pub fn kernel_map(
        &self,
        in_key: &StrideKey,
        out_key: &StrideKey,
        geometry: &KernelGeometry,
        transpose: bool,
    ) -> Result<Arc<KernelMap>> {
        let (input, in_index) = self.resolve(in_key)?;
        let (output, out_index) = self.resolve(out_key)?;
        let region = geometry.region(self.config.spatial_dim())?;

        let signature = MapSignature::Kernel {
            input,
            output,
            geometry: geometry.clone(),
            transpose,
        };
        self.cached_map(signature, || {
            self.install(|| {
                self.backend.kernel_map(
                    &in_index,
                    &out_index,
                    &region,
                    self.config.batch_offset(),
                    transpose,
                )
            })
        })
    }

    /// Origin level of `in_key` and the single-offset map sending every input
    /// row to its origin row.
    pub fn origin_map(&self, in_key: &StrideKey) -> Result<(StrideKey, Arc<KernelMap>)> {
        let out_key = self.origin(in_key)?;
        let (input, in_index) = self.resolve(in_key)?;
        let out_index = self.index(&out_key)?;

        let map = self.cached_map(MapSignature::Origin { input }, || {
            let pairs = collect_pairs(&self.install(|| {
                match_rows(&in_index, &out_index, |coordinate, scratch| {
                    scratch.copy_from_slice(coordinate);
                    for value in &mut scratch[self.config.batch_offset()..] {
                        *value = T::ZERO;
                    }
                })
            }));
            Ok(KernelMap::new(
                vec![vec![0; self.config.spatial_dim()]],
                vec![pairs],
            ))
        })?;
        Ok((out_key, map))
    }

    /// For each of `in_keys`, the single-offset map sending its rows into the
    /// union level `out_key`.
    pub fn union_map(
        &self,
        in_keys: &[StrideKey],
        out_key: &StrideKey,
    ) -> Result<Vec<KernelMap>> {
        let (_, out_index) = self.resolve(out_key)?;
        let inputs = in_keys
            .iter()
            .map(|key| {
                if key.tensor_stride() != out_key.tensor_stride() {
                    return Err(CoordinateError::IncompatibleStride(format!(
                        "cannot map {key} into {out_key}"
                    )));
                }
                self.index(key)
            })
            .collect::<Result<Vec<_>>>()?;

        let zero = vec![0; self.config.spatial_dim()];
        Ok(self.install(|| {
            inputs
                .par_iter()
                .map(|in_index| {
                    let pairs = match_rows(in_index, &out_index, |coordinate, scratch| {
                        scratch.copy_from_slice(coordinate)
                    });
                    KernelMap::new(vec![zero.clone()], vec![collect_pairs(&pairs)])
                })
                .collect()
        }))
    }
}

/// For every row of `input`, the row of `output` holding `project(coordinate)`.
fn match_rows<T, F>(
    input: &CoordinateIndex<T>,
    output: &CoordinateIndex<T>,
    project: F,
) -> Vec<Option<u32>>
where
    T: CoordinateInt,
    F: Fn(&[T], &mut [T]) + Sync,
{
    let width = input.width();
    input
        .coordinates()
        .as_flat()
        .par_chunks(width)
        .map_init(
            || vec![T::ZERO; width],
            |scratch, coordinate| {
                project(coordinate, scratch);
                output.lookup(scratch)
            },
        )
        .collect()
}

/// Pack a boolean mask into 64-bit words, least significant bit first.
fn pack_mask(mask: &[bool]) -> Vec<u64> {
    mask.chunks(64)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .filter(|(_, &keep)| keep)
                .fold(0u64, |word, (bit, _)| word | (1 << bit))
        })
        .collect()
}

fn collect_pairs(matches: &[Option<u32>]) -> OffsetPairs {
    OffsetPairs::from_unsorted(
        matches
            .iter()
            .enumerate()
            .filter_map(|(in_row, out_row)| out_row.map(|out_row| (in_row as u32, out_row)))
            .collect(),
    )
}

impl<T: CoordinateInt, B: CoordinateBackend<T>> fmt::Display for CoordinateMapManager<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut maps_per_level: HashMap<LevelId, usize> = HashMap::new();
        for (signature, slot) in self.kernel_maps.lock().iter() {
            // A slot held by a running build is not finished yet.
            if slot.try_lock().is_some_and(|map| map.is_some()) {
                *maps_per_level.entry(signature.input()).or_default() += 1;
            }
        }

        let registry = self.registry.read();
        writeln!(
            f,
            "CoordinateMapManager(backend={}, coordinate_size={}, batch_dim={}, levels={}, kernel_maps={})",
            self.backend.name(),
            self.config.coordinate_size,
            self.config.batch_dim,
            registry.len(),
            maps_per_level.values().sum::<usize>(),
        )?;
        for level in registry.sorted() {
            let maps = registry
                .id(&level.key)
                .and_then(|id| maps_per_level.get(&id))
                .copied()
                .unwrap_or(0);
            writeln!(
                f,
                "  {}: {} rows, {}, {} kernel maps",
                level.key,
                level.index.len(),
                level.provenance,
                maps
            )?;
        }
        Ok(())
    }
}

impl<T: CoordinateInt, B: CoordinateBackend<T>> fmt::Debug for CoordinateMapManager<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinateMapManager")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("levels", &self.registry.read().len())
            .field("stats", &self.stats())
            .finish()
    }
}
