//! Run command - Exercise the PLL lifecycle end to end
//!
//! Loads `0..rows` into a leaf PLL, derives `x * 2` and keeps the multiples
//! of `--modulo`, then:
//! 1. caches the derived PLL on the worker pool, showing progress
//! 2. reports partition sizes and the element count
//! 3. evicts the cache and checks that recomputation through lineage
//!    yields the same content

use anyhow::{bail, Context, Result};
use pll_config::PllConfig;
use pll_core::{lineage_depth, FutureStatus, Pll, PllExt, PllNode};
use tracing::debug;

use super::{create_context, print_info};
use crate::progress;
use crate::GlobalOptions;

/// Arguments for the run command
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Number of elements to load
    #[arg(long, default_value_t = 1_000_000)]
    rows: u64,

    /// Number of partitions (defaults to the configured partition count)
    #[arg(long, short = 'p', allow_negative_numbers = true)]
    partitions: Option<i64>,

    /// Keep doubled values divisible by this number
    #[arg(long, short = 'm', default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    modulo: u64,
}

/// Execute the run command
pub fn execute(args: RunArgs, global: GlobalOptions, config: &PllConfig) -> Result<()> {
    let ctx = create_context(config)?;
    debug!(workers = ctx.parallelism(), "execution context ready");

    let leaf = match args.partitions {
        Some(partitions) => ctx.parallelize_with(0..args.rows, partitions),
        None => ctx.parallelize(0..args.rows),
    }
    .context("Failed to load rows")?;

    let modulo = args.modulo;
    let pipeline = leaf.map(|x| x * 2).filter(move |x| x % modulo == 0);

    print_info(
        &format!(
            "Caching '{}' ({} partitions, lineage depth {})",
            pipeline.label(),
            pipeline.num_partitions(),
            lineage_depth(&*pipeline)
        ),
        global.quiet,
    );

    let bar = progress::percent_bar("Caching", global.quiet);
    let future = pipeline.clone().cache_async();
    let status = progress::track(&future, bar.as_ref());
    progress::finish_progress(bar);
    if status != FutureStatus::Succeeded {
        debug!(?status, "cache run did not succeed");
    }
    future.wait().context("Failed to cache pipeline")?;

    let sizes = pipeline.compute_partition_sizes()?;
    let count: u64 = sizes.iter().sum();
    println!("Partitions: {}", sizes.len());
    println!("Partition sizes: {:?}", sizes);
    println!("Elements: {}", count);

    let cached = pipeline.collect()?;
    let spinner = progress::spinner("Evicting and recomputing through lineage", global.quiet);
    pipeline.uncache();
    let recomputed = pipeline.collect()?;

    if recomputed != cached {
        progress::finish_spinner_error(spinner, "Recomputed content differs");
        bail!(
            "Recomputed content differs from cached content ({} vs {} elements)",
            recomputed.len(),
            cached.len()
        );
    }
    progress::finish_spinner(spinner, "Recomputed content matches");
    println!("Recomputed after eviction: ok");

    let metrics = pipeline.cache_metrics();
    debug!(
        hits = metrics.hits,
        misses = metrics.misses,
        materializations = metrics.materializations,
        "cache metrics"
    );
    Ok(())
}
