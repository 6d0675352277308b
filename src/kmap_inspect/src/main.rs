//! Inspect coordinate levels and kernel maps.
//!
//! Loads a coordinate file, inserts it into a coordinate map manager, derives
//! one strided level per `--stride`, and reports the kernel maps between
//! consecutive levels.
//!
//! ## Usage
//!
//! ```bash
//! kmap_inspect points.txt --batch-dim --stride 2 --stride 2 --kernel-size 3
//! RUST_LOG=sparse_coords=debug kmap_inspect points.txt --backend device --threads 4
//! ```

mod input;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sparse_coords::{
    BudgetAllocator, CoordinateBackend, CoordinateBatch, CoordinateMapManager, DeviceBackend,
    HostAllocator, HostBackend, KernelGeometry, KernelMap, ManagerConfig, StrideKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Region {
    Cube,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Host,
    Device,
}

/// Build coordinate levels from a file and report their kernel maps
#[derive(Parser, Debug)]
#[command(name = "kmap_inspect")]
#[command(about = "Build coordinate levels from a file and report their kernel maps")]
struct Args {
    /// Coordinate file: one coordinate per line, whitespace or comma separated
    coords: PathBuf,

    /// Stride of each derived level, applied on every spatial axis (repeatable)
    #[arg(long = "stride")]
    strides: Vec<u32>,

    /// Kernel size on every spatial axis
    #[arg(long, default_value = "3")]
    kernel_size: u32,

    /// Kernel region shape
    #[arg(long, value_enum, default_value = "cube")]
    region: Region,

    /// Compute backend
    #[arg(long, value_enum, default_value = "host")]
    backend: Backend,

    /// Byte budget of the device allocator (unbounded if omitted)
    #[arg(long)]
    device_budget: Option<usize>,

    /// Treat the first component as a batch index
    #[arg(long)]
    batch_dim: bool,

    /// Size of a dedicated thread pool
    #[arg(long)]
    threads: Option<usize>,

    /// Manager configuration as JSON; flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the coordinates of every level
    #[arg(long)]
    print_levels: bool,

    /// Print manager statistics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let coordinates = input::load_coordinates(&args.coords)?;
    info!(
        rows = coordinates.len(),
        width = coordinates.width(),
        file = %args.coords.display(),
        "loaded coordinates"
    );

    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str::<ManagerConfig>(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => ManagerConfig {
            batch_dim: false,
            ..ManagerConfig::default()
        },
    };
    config.coordinate_size = coordinates.width();
    config.batch_dim |= args.batch_dim;
    if args.threads.is_some() {
        config.num_threads = args.threads;
    }

    match (args.backend, args.device_budget) {
        (Backend::Host, _) => run(
            CoordinateMapManager::new(config, HostBackend)?,
            &args,
            &coordinates,
        ),
        (Backend::Device, None) => {
            let allocator = Arc::new(HostAllocator::new());
            run(
                CoordinateMapManager::new(config, DeviceBackend::new(Arc::clone(&allocator)))?,
                &args,
                &coordinates,
            )?;
            info!(live_bytes = allocator.live_bytes(), "device allocator released");
            Ok(())
        }
        (Backend::Device, Some(budget)) => {
            let allocator = Arc::new(BudgetAllocator::new(budget));
            run(
                CoordinateMapManager::new(config, DeviceBackend::new(Arc::clone(&allocator)))?,
                &args,
                &coordinates,
            )?;
            info!(
                peak_bytes = allocator.peak_bytes(),
                allocations = allocator.allocations(),
                budget = allocator.budget(),
                "device allocator usage"
            );
            Ok(())
        }
    }
}

fn run<B: CoordinateBackend<i64>>(
    manager: CoordinateMapManager<i64, B>,
    args: &Args,
    coordinates: &CoordinateBatch<i64>,
) -> Result<()> {
    let dimension = manager.config().spatial_dim();
    let geometry = |stride: u32| match args.region {
        Region::Cube => KernelGeometry::cube(dimension, args.kernel_size, stride, 1),
        Region::Cross => KernelGeometry::cross(dimension, args.kernel_size, stride, 1),
    };

    let base = manager.insert(coordinates).context("failed to insert coordinates")?;
    let map = manager
        .kernel_map(&base, &base, &geometry(1), false)
        .context("failed to build the base kernel map")?;
    report(&base, &base, "forward", &map);

    let mut levels = vec![base];
    for &stride in &args.strides {
        let previous = levels[levels.len() - 1].clone();
        let next = manager
            .stride(&previous, &vec![stride; dimension])
            .with_context(|| format!("failed to stride {previous} by {stride}"))?;

        let forward = manager.kernel_map(&previous, &next, &geometry(stride), false)?;
        report(&previous, &next, "forward", &forward);
        let transposed = manager.kernel_map(&next, &previous, &geometry(stride), true)?;
        report(&next, &previous, "transpose", &transposed);
        levels.push(next);
    }

    let (origin, origin_map) = manager.origin_map(&levels[0])?;
    report(&levels[0], &origin, "origin", &origin_map);

    println!();
    print!("{manager}");
    if args.print_levels {
        for key in manager.keys() {
            println!();
            print!("{}", manager.print_level(&key)?);
        }
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&manager.stats())?);
    }
    Ok(())
}

fn report(input: &StrideKey, output: &StrideKey, kind: &str, map: &KernelMap) {
    let counts = map.pair_counts();
    let min = counts.iter().copied().min().unwrap_or(0);
    let max = counts.iter().copied().max().unwrap_or(0);
    let empty = counts.iter().filter(|&&c| c == 0).count();
    println!(
        "{kind:>9} {input} -> {output}: {} offsets, {} pairs (per offset min {min}, max {max}, {empty} empty)",
        map.num_offsets(),
        map.total_pairs(),
    );
}
